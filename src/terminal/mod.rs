//! Line-oriented session terminal.
//!
//! Raw terminal input is parsed into keys and edited into a line. Submitted
//! lines run as built-ins against the private [`Vfs`] or, for `occ`, as a job
//! through the command host. While a job runs every key except interrupt is
//! ignored. Output accumulates in a screen buffer drained with
//! [`Terminal::take_output`].

pub mod builtins;
pub mod history;
pub mod vfs;

use std::path::Path;
use std::sync::Arc;

use crate::commands::{command_cancel, run_command, RunningCommand};
use crate::config::paths::PROGRAM_NAME;
use crate::core::SessionState;
use crate::events::{CommandFinal, OutputStream, SessionEvent};
use crate::policy::CommandJobSpec;

pub use builtins::{Builtin, Out};
pub use history::History;
pub use vfs::{Listing, Vfs, VfsError};

const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Enter,
    Backspace,
    Interrupt,
    Char(char),
}

/// Split raw terminal input into keys. Unknown escape sequences and other
/// control bytes are dropped.
pub fn parse_keys(data: &str) -> Vec<Key> {
    let mut keys = Vec::new();
    let mut chars = data.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => {
                if chars.next_if_eq(&'[').is_some() {
                    match chars.next() {
                        Some('A') => keys.push(Key::Up),
                        Some('B') => keys.push(Key::Down),
                        _ => {}
                    }
                }
            }
            '\r' | '\n' => keys.push(Key::Enter),
            '\x7f' | '\x08' => keys.push(Key::Backspace),
            '\x03' => keys.push(Key::Interrupt),
            ' '..='~' => keys.push(Key::Char(c)),
            _ => {}
        }
    }
    keys
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Running,
}

pub struct Terminal {
    session: Arc<SessionState>,
    vfs: Vfs,
    history: History,
    line: String,
    running: Option<RunningCommand>,
    echo: bool,
    screen: String,
}

impl Terminal {
    /// New terminal over `session` with a freshly seeded VFS.
    pub fn new(session: Arc<SessionState>) -> Self {
        Self {
            session,
            vfs: Vfs::seeded(),
            history: History::new(),
            line: String::new(),
            running: None,
            echo: true,
            screen: String::new(),
        }
    }

    /// Echo typed characters back to the screen. Line-buffered front ends
    /// that already show the input turn this off.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn mode(&self) -> Mode {
        if self.running.is_some() {
            Mode::Running
        } else {
            Mode::Idle
        }
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Line currently being edited.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn running_job(&self) -> Option<&str> {
        self.running.as_ref().map(|r| r.job_id.as_str())
    }

    /// Drain everything written since the last call.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.screen)
    }

    pub fn banner(&mut self) {
        self.writeln("Welcome to the OCC interactive terminal");
        self.writeln("");
        self.writeln("Try these example commands:");
        self.writeln("  ls              - List pre-loaded files");
        self.writeln("  cat water.xyz   - View water molecule structure");
        self.writeln("  cat urea.cif    - View urea crystal structure");
        self.writeln("  help            - Show all available commands");
        self.write_prompt();
    }

    pub async fn feed(&mut self, data: &str) {
        for key in parse_keys(data) {
            self.press(key).await;
        }
    }

    pub async fn press(&mut self, key: Key) {
        if self.running.is_some() {
            if key == Key::Interrupt {
                self.interrupt().await;
            }
            return;
        }
        match key {
            Key::Up => {
                if let Some(entry) = self.history.previous() {
                    self.line = entry.to_string();
                    self.redraw_line();
                }
            }
            Key::Down => {
                if let Some(entry) = self.history.next() {
                    self.line = entry.to_string();
                    self.redraw_line();
                }
            }
            Key::Enter => {
                if self.echo {
                    self.screen.push_str("\r\n");
                }
                let line = std::mem::take(&mut self.line);
                self.submit(line.trim()).await;
            }
            Key::Backspace => {
                if self.line.pop().is_some() && self.echo {
                    self.screen.push_str("\x08 \x08");
                }
            }
            Key::Interrupt => {
                self.screen.push_str("^C\r\n");
                self.line.clear();
                self.history.reset();
                self.write_prompt();
            }
            Key::Char(c) => {
                self.line.push(c);
                if self.echo {
                    self.screen.push(c);
                }
            }
        }
    }

    /// Store an uploaded file in the current directory of the private VFS
    /// under its base name. Returns the stored path.
    pub fn upload(&mut self, file_name: &str, bytes: Vec<u8>) -> Option<String> {
        let Some(base) = Path::new(file_name)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.trim().is_empty())
        else {
            self.error(&format!("Error: invalid file name {file_name:?}"));
            return None;
        };
        let path = self.vfs.write(&base, bytes);
        tracing::debug!(target: "occ", path = %path, "terminal upload");
        self.writeln(&format!("Uploaded: {base}"));
        Some(path)
    }

    /// Handle the next event of the running job. Returns `false` when idle.
    pub async fn pump(&mut self) -> bool {
        let Some(running) = self.running.as_mut() else {
            return false;
        };
        let event = running.next_event().await;
        self.on_event(event);
        true
    }

    pub async fn run_until_idle(&mut self) {
        while self.pump().await {}
    }

    async fn submit(&mut self, line: &str) {
        if line.is_empty() {
            self.write_prompt();
            return;
        }
        self.history.push(line);
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            self.write_prompt();
            return;
        };
        let args: Vec<&str> = parts.collect();

        if cmd == PROGRAM_NAME {
            self.start_occ(&args).await;
            return;
        }
        match Builtin::parse(cmd) {
            Some(builtin) => {
                tracing::debug!(target: "occ", command = cmd, "terminal builtin");
                for out in builtins::run(&mut self.vfs, builtin, &args) {
                    match out {
                        Out::Line(text) => self.writeln(&text),
                        Out::Error(text) => self.error(&text),
                        Out::ClearScreen => self.screen.push_str(CLEAR_SCREEN),
                    }
                }
            }
            None => {
                self.error(&format!("Command not found: {cmd}"));
                self.writeln("Type \"help\" for available commands");
                self.writeln("");
            }
        }
        self.write_prompt();
    }

    async fn start_occ(&mut self, args: &[&str]) {
        let spec = CommandJobSpec::new(args.join(" "), self.vfs.cwd(), self.vfs.files());
        match run_command(&self.session, spec).await {
            Ok(running) => {
                tracing::info!(target: "occ", job_id = %running.job_id, "terminal command dispatched");
                self.running = Some(running);
            }
            Err(e) => {
                self.error(&format!("Error: {e}"));
                self.writeln("");
                self.write_prompt();
            }
        }
    }

    async fn interrupt(&mut self) {
        let Some(job_id) = self.running.as_ref().map(|r| r.job_id.clone()) else {
            return;
        };
        self.screen.push_str("^C\r\n");
        command_cancel(&self.session, &job_id).await;
    }

    fn on_event(&mut self, event: Option<SessionEvent>) {
        match event {
            Some(SessionEvent::CommandReady { .. }) => {}
            Some(SessionEvent::CommandResultPartial(p)) => match p.stream {
                OutputStream::Stdout => self.writeln(&p.text),
                OutputStream::Stderr => self.error(&p.text),
            },
            Some(SessionEvent::CommandResultFinal(CommandFinal::Ok(ok))) => {
                // The command host already merged user files into the store;
                // the private VFS takes the complete returned set.
                self.vfs.sync(&ok.files);
                self.finish();
            }
            Some(SessionEvent::CommandResultFinal(CommandFinal::Err(err))) => {
                self.error(&format!("Worker error: {}", err.message));
                self.finish();
            }
            Some(SessionEvent::CommandInterrupted { .. }) | None => self.finish(),
        }
    }

    fn finish(&mut self) {
        self.running = None;
        self.write_prompt();
    }

    fn writeln(&mut self, text: &str) {
        self.screen.push_str(text);
        self.screen.push_str("\r\n");
    }

    fn error(&mut self, text: &str) {
        self.screen.push_str(RED);
        self.screen.push_str(text);
        self.screen.push_str(RESET);
        self.screen.push_str("\r\n");
    }

    fn write_prompt(&mut self) {
        let prompt = self.prompt();
        self.screen.push_str("\r\n");
        self.screen.push_str(&prompt);
    }

    fn redraw_line(&mut self) {
        if !self.echo {
            return;
        }
        let prompt = self.prompt();
        self.screen.push_str("\r\x1b[K");
        self.screen.push_str(&prompt);
        self.screen.push_str(&self.line);
    }

    pub fn prompt(&self) -> String {
        format!("{} $ ", self.vfs.cwd())
    }
}
