//! Shell built-ins. They act on the private VFS only and never start a job.

use super::vfs::{Listing, Vfs};
use crate::samples::{UREA_CIF_PATH, WATER_XYZ_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Ls,
    Cd,
    Pwd,
    Cat,
    Mkdir,
    Clear,
    Help,
}

impl Builtin {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "ls" => Self::Ls,
            "cd" => Self::Cd,
            "pwd" => Self::Pwd,
            "cat" => Self::Cat,
            "mkdir" => Self::Mkdir,
            "clear" => Self::Clear,
            "help" => Self::Help,
            _ => return None,
        })
    }
}

/// One unit of built-in output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Out {
    Line(String),
    Error(String),
    ClearScreen,
}

pub fn run(vfs: &mut Vfs, builtin: Builtin, args: &[&str]) -> Vec<Out> {
    match builtin {
        Builtin::Ls => ls(vfs, args.first().copied()),
        Builtin::Cd => cd(vfs, args.first().copied()),
        Builtin::Pwd => vec![Out::Line(vfs.cwd().to_string()), Out::Line(String::new())],
        Builtin::Cat => match args.first() {
            None => vec![Out::Line("cat: missing operand".into()), Out::Line(String::new())],
            Some(path) => cat(vfs, path),
        },
        Builtin::Mkdir => match args.first() {
            None => vec![Out::Line("mkdir: missing operand".into()), Out::Line(String::new())],
            Some(path) => mkdir(vfs, path),
        },
        Builtin::Clear => vec![Out::ClearScreen],
        Builtin::Help => help(),
    }
}

fn ls(vfs: &Vfs, target: Option<&str>) -> Vec<Out> {
    let target = target.unwrap_or_else(|| vfs.cwd());
    match vfs.list(target) {
        Ok(Listing::Dir(names)) => names
            .into_iter()
            .map(Out::Line)
            .chain(std::iter::once(Out::Line(String::new())))
            .collect(),
        Ok(Listing::File(name)) => vec![Out::Line(name), Out::Line(String::new())],
        Err(_) => vec![Out::Error(format!(
            "ls: cannot access '{target}': No such file or directory"
        ))],
    }
}

fn cd(vfs: &mut Vfs, target: Option<&str>) -> Vec<Out> {
    let target = match target {
        None => "/".to_string(),
        Some(t) => vfs.resolve(t),
    };
    match vfs.chdir(&target) {
        Ok(_) => Vec::new(),
        Err(_) => vec![Out::Error(format!("cd: {target}: No such file or directory"))],
    }
}

fn cat(vfs: &Vfs, path: &str) -> Vec<Out> {
    let abs = vfs.resolve(path);
    let bytes = match vfs.read(&abs) {
        Ok(bytes) => bytes,
        Err(_) => return vec![Out::Error(format!("cat: {abs}: No such file or directory"))],
    };
    let text = String::from_utf8_lossy(bytes);
    let mut out: Vec<Out> = text.split('\n').map(|l| Out::Line(l.to_string())).collect();
    if matches!(out.last(), Some(Out::Line(l)) if l.is_empty()) {
        out.pop();
    }
    out.push(Out::Line(String::new()));
    out
}

fn mkdir(vfs: &mut Vfs, path: &str) -> Vec<Out> {
    let abs = vfs.resolve(path);
    match vfs.mkdir(&abs) {
        Ok(()) => Vec::new(),
        Err(e) => vec![Out::Error(format!(
            "mkdir: cannot create directory '{abs}': {}",
            e.reason()
        ))],
    }
}

fn help() -> Vec<Out> {
    let water = WATER_XYZ_PATH.trim_start_matches('/');
    let urea = UREA_CIF_PATH.trim_start_matches('/');
    [
        "Available commands:".to_string(),
        "  occ <args>  - Run OCC with arguments".to_string(),
        "  ls [dir]    - List directory contents".to_string(),
        "  cd <dir>    - Change directory".to_string(),
        "  pwd         - Print working directory".to_string(),
        "  cat <file>  - Display file contents".to_string(),
        "  mkdir <dir> - Create directory".to_string(),
        "  clear       - Clear the terminal".to_string(),
        "  help        - Show this help".to_string(),
        String::new(),
        "Pre-loaded sample files:".to_string(),
        format!("  {water:<11} - Water molecule (XYZ format)"),
        format!("  {urea:<11} - Urea crystal structure (CIF format)"),
        String::new(),
        "Tip: Use Up/Down arrows for command history".to_string(),
        "Tip: Upload files into the current directory".to_string(),
        String::new(),
    ]
    .into_iter()
    .map(Out::Line)
    .collect()
}
