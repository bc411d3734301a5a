//! In-process executor that replays a scripted run instead of launching a
//! program. Used by the `scripted` executor kind for demos and by tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Executor, Invocation, OutputSink, WorkerError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Stdout(String),
    Stderr(String),
    WriteFile(String, Vec<u8>),
    Sleep(u64),
    Exit(i32),
    Crash(String),
    Hang,
}

/// Ordered steps for one scripted run. A script without an explicit ending
/// exits with code 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(mut self, line: impl Into<String>) -> Self {
        self.steps.push(Step::Stdout(line.into()));
        self
    }

    pub fn stderr(mut self, line: impl Into<String>) -> Self {
        self.steps.push(Step::Stderr(line.into()));
        self
    }

    /// Write a file; relative paths resolve against the invocation cwd.
    pub fn write_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.steps.push(Step::WriteFile(path.into(), contents.into()));
        self
    }

    pub fn sleep_ms(mut self, ms: u64) -> Self {
        self.steps.push(Step::Sleep(ms));
        self
    }

    pub fn exit(mut self, code: i32) -> Self {
        self.steps.push(Step::Exit(code));
        self
    }

    /// End without an exit code, as a crashed worker would.
    pub fn crash(mut self, reason: impl Into<String>) -> Self {
        self.steps.push(Step::Crash(reason.into()));
        self
    }

    /// Never finish; only cancellation ends the run.
    pub fn hang(mut self) -> Self {
        self.steps.push(Step::Hang);
        self
    }
}

type Router = dyn Fn(&Invocation) -> Script + Send + Sync;

pub struct ScriptedExecutor {
    router: Arc<Router>,
}

impl ScriptedExecutor {
    /// Replay the same script for every invocation.
    pub fn single(script: Script) -> Self {
        Self::routed(move |_| script.clone())
    }

    /// Pick a script per invocation.
    pub fn routed<F>(router: F) -> Self
    where
        F: Fn(&Invocation) -> Script + Send + Sync + 'static,
    {
        Self {
            router: Arc::new(router),
        }
    }

    /// Small stand-in for `occ` so the terminal can be tried without the real
    /// program: `--version`, `scf <file>` and `echo <words>`.
    pub fn demo() -> Self {
        Self::routed(demo_script)
    }
}

fn demo_script(inv: &Invocation) -> Script {
    let args: Vec<&str> = inv.args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["--version"] | ["version"] => Script::new().stdout("occ 0.0.0 (scripted)").exit(0),
        ["echo", rest @ ..] => Script::new().stdout(rest.join(" ")).exit(0),
        ["scf", input, ..] => {
            let stem = input.rsplit_once('.').map(|(s, _)| s).unwrap_or(*input);
            let host = inv.host_cwd().join(input);
            if !host.is_file() {
                return Script::new()
                    .stderr(format!("error: input file not found: {input}"))
                    .exit(1);
            }
            Script::new()
                .stdout(format!("reading {input}"))
                .stdout("scf converged")
                .write_file(format!("{stem}.owf.json"), b"{\"method\":\"rhf\"}".to_vec())
                .exit(0)
        }
        _ => Script::new()
            .stderr(format!("error: unrecognized arguments: {}", inv.args.join(" ")))
            .stderr("usage: occ <subcommand> [args]")
            .exit(1),
    }
}

fn resolve(inv: &Invocation, path: &str) -> PathBuf {
    if let Some(abs) = path.strip_prefix('/') {
        inv.root.join(abs)
    } else {
        inv.host_cwd().join(path)
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(&self, invocation: Invocation, out: OutputSink) -> Result<i32, WorkerError> {
        let script = (self.router)(&invocation);
        for step in script.steps {
            match step {
                Step::Stdout(line) => out.stdout(line),
                Step::Stderr(line) => out.stderr(line),
                Step::WriteFile(path, bytes) => {
                    let host = resolve(&invocation, &path);
                    if let Some(parent) = host.parent() {
                        tokio::fs::create_dir_all(parent)
                            .await
                            .map_err(|e| WorkerError::Sandbox(e.to_string()))?;
                    }
                    tokio::fs::write(&host, bytes)
                        .await
                        .map_err(|e| WorkerError::Sandbox(format!("write {path}: {e}")))?;
                }
                Step::Sleep(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                Step::Exit(code) => return Ok(code),
                Step::Crash(reason) => return Err(WorkerError::NoExit(reason)),
                Step::Hang => std::future::pending::<()>().await,
            }
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn invocation(args: &[&str], root: PathBuf) -> Invocation {
        Invocation {
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: "/".into(),
            root,
        }
    }

    #[tokio::test]
    async fn demo_scf_writes_wavefunction_next_to_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("water.xyz"), crate::samples::WATER_XYZ).expect("seed");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let code = ScriptedExecutor::demo()
            .run(invocation(&["scf", "water.xyz"], dir.path().into()), OutputSink::new(tx))
            .await
            .expect("run");
        assert_eq!(code, 0);
        assert!(dir.path().join("water.owf.json").is_file());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn demo_rejects_unknown_subcommands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (tx, _rx) = mpsc::unbounded_channel();
        let code = ScriptedExecutor::demo()
            .run(invocation(&["frobnicate"], dir.path().into()), OutputSink::new(tx))
            .await
            .expect("run");
        assert_eq!(code, 1);
    }
}
