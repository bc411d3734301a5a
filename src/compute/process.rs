//! Native executor: drives the `occ` binary as a child process rooted in the
//! sandbox directory.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::{Executor, Invocation, OutputSink, WorkerError};
use crate::config::limits::MAX_EVENT_TEXT_BYTES;
use crate::events::OutputStream;

pub struct ProcessExecutor {
    program: PathBuf,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

/// Forward each line from `reader` to `out` until EOF. Bytes are decoded
/// lossily so invalid UTF-8 never stops the pipe from draining. Overlong
/// lines are truncated at a char boundary.
async fn pump<R>(reader: R, stream: OutputStream, out: OutputSink)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                let mut line = String::from_utf8_lossy(&buf).into_owned();
                if line.len() > MAX_EVENT_TEXT_BYTES {
                    let mut cut = MAX_EVENT_TEXT_BYTES;
                    while !line.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    line.truncate(cut);
                }
                match stream {
                    OutputStream::Stdout => out.stdout(line),
                    OutputStream::Stderr => out.stderr(line),
                }
            }
            Err(err) => {
                tracing::warn!(target: "occ", error = %err, "output stream read failed");
                break;
            }
        }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn run(&self, invocation: Invocation, out: OutputSink) -> Result<i32, WorkerError> {
        let program = self.program.display().to_string();
        let mut child = Command::new(&self.program)
            .args(&invocation.args)
            .current_dir(invocation.host_cwd())
            .env("OCC_SANDBOX_ROOT", &invocation.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // WHY: cancellation drops this future; the child must not outlive it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::Spawn {
                program: program.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(target: "occ", program = %program, pid = ?child.id(), "occ process started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_pump = async {
            if let Some(s) = stdout {
                pump(s, OutputStream::Stdout, out.clone()).await;
            }
        };
        let err_pump = async {
            if let Some(s) = stderr {
                pump(s, OutputStream::Stderr, out.clone()).await;
            }
        };
        futures_util::future::join(out_pump, err_pump).await;

        let status = child.wait().await.map_err(|e| WorkerError::NoExit(e.to_string()))?;
        // A signal-terminated process has no code; report it as a generic failure.
        Ok(status.code().unwrap_or(-1))
    }
}
