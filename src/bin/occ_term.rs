use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::select;

use occ_playground::terminal::{Mode, Terminal};
use occ_playground::{init_tracing, SessionState};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut uploads: Vec<PathBuf> = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--upload" => {
                let path = args.next().context("--upload requires a file")?;
                uploads.push(PathBuf::from(path));
            }
            flag => bail!("unknown flag: {flag} (usage: occ-term [--upload <file>]...)"),
        }
    }

    let session = SessionState::from_env().context("create session")?;
    let mut term = Terminal::new(session);
    // stdin is line-buffered, so the typed line is already on screen.
    term.set_echo(false);
    for path in &uploads {
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        term.upload(&path.to_string_lossy(), bytes);
    }
    term.banner();
    flush(&mut term)?;

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        let mut interrupted = false;
        let mut input: Option<String> = None;
        let mut eof = false;

        if term.mode() == Mode::Running {
            select! {
                _ = term.pump() => {}
                res = tokio::signal::ctrl_c() => {
                    res.context("listen for ctrl-c")?;
                    interrupted = true;
                }
                // Lines typed while a command runs are discarded.
                line = lines.next_line() => {
                    eof = line.context("read stdin")?.is_none();
                }
            }
        } else {
            select! {
                line = lines.next_line() => match line.context("read stdin")? {
                    Some(line) => input = Some(line),
                    None => eof = true,
                },
                res = tokio::signal::ctrl_c() => {
                    res.context("listen for ctrl-c")?;
                    interrupted = true;
                }
            }
        }

        if interrupted {
            term.feed("\x03").await;
        }
        if let Some(line) = input {
            term.feed(&line).await;
            term.feed("\r").await;
        }
        if eof {
            term.run_until_idle().await;
            flush(&mut term)?;
            break;
        }
        flush(&mut term)?;
    }
    println!();
    Ok(())
}

fn flush(term: &mut Terminal) -> Result<()> {
    let out = term.take_output();
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(out.as_bytes()).context("write stdout")?;
    stdout.flush().context("flush stdout")
}
