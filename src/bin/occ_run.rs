use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tokio::select;

use occ_playground::commands::{export_files, import_dir};
use occ_playground::{
    command_cancel, init_tracing, run_command, CommandFinal, CommandJobSpec, CommandOutcome, FileStore,
    OutputStream, SessionEvent, SessionState,
};

const USAGE: &str = "usage: occ-run --dir <input dir> [--out <output dir>] [--cwd </path>] -- <occ args>...";

struct Args {
    dir: PathBuf,
    out: Option<PathBuf>,
    cwd: String,
    command: Vec<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut dir: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;
    let mut cwd = "/".to_string();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dir" => dir = Some(PathBuf::from(args.next().context("--dir requires a value")?)),
            "--out" => out = Some(PathBuf::from(args.next().context("--out requires a value")?)),
            "--cwd" => cwd = args.next().context("--cwd requires a value")?,
            "--" => break,
            flag => bail!("unknown flag: {flag}\n{USAGE}"),
        }
    }
    let command: Vec<String> = args.collect();
    if command.is_empty() {
        bail!("missing occ arguments\n{USAGE}");
    }
    Ok(Args {
        dir: dir.context(USAGE)?,
        out,
        cwd,
        command,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let args = parse_args(std::env::args().skip(1))?;
    let files = import_dir(&args.dir)?;
    let session = SessionState::from_env().context("create session")?;
    let store: &FileStore = &session.store;
    store.merge(files);

    let spec = CommandJobSpec::new(args.command.join(" "), args.cwd.clone(), store.get_all());
    let mut running = run_command(&session, spec).await.context("dispatch command")?;
    let job_id = running.job_id.clone();

    let outcome = loop {
        select! {
            event = running.next_event() => match event {
                Some(SessionEvent::CommandResultPartial(p)) => match p.stream {
                    OutputStream::Stdout => println!("{}", p.text),
                    OutputStream::Stderr => eprintln!("{}", p.text),
                },
                Some(SessionEvent::CommandResultFinal(CommandFinal::Ok(ok))) => {
                    break CommandOutcome::Exited(ok);
                }
                Some(SessionEvent::CommandResultFinal(CommandFinal::Err(err))) => {
                    break CommandOutcome::Failed(err);
                }
                Some(SessionEvent::CommandInterrupted { .. }) | None => {
                    break CommandOutcome::Interrupted { job_id: job_id.clone() };
                }
                Some(SessionEvent::CommandReady { .. }) => {}
            },
            res = tokio::signal::ctrl_c() => {
                res.context("listen for ctrl-c")?;
                command_cancel(&session, &job_id).await;
            }
        }
    };

    match outcome {
        CommandOutcome::Exited(ok) => {
            let dest = args.out.as_ref().unwrap_or(&args.dir);
            let written = export_files(store, &ok.generated, dest)?;
            eprintln!("exit code {}; {written} new file(s) written to {}", ok.exit_code, dest.display());
            Ok(ExitCode::from(u8::try_from(ok.exit_code).unwrap_or(1)))
        }
        CommandOutcome::Failed(err) => {
            eprintln!("{}: {}", err.code, err.message);
            Ok(ExitCode::from(2))
        }
        CommandOutcome::Interrupted { .. } => {
            eprintln!("[Command interrupted by user]");
            Ok(ExitCode::from(130))
        }
    }
}
