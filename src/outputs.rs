//! Captured command output, keyed by the id of the widget that ran it, and
//! snippet extraction over that output.
//!
//! Consumers subscribe to a version counter instead of polling; every `set`
//! bumps it.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use tokio::sync::watch;

use crate::config::limits::DEFAULT_SNIPPET_MAX_LINES;

#[derive(Clone)]
pub struct CommandOutputs {
    outputs: Arc<RwLock<HashMap<String, String>>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for CommandOutputs {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandOutputs {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            outputs: Arc::new(RwLock::new(HashMap::new())),
            version: Arc::new(tx),
        }
    }

    pub fn set(&self, id: &str, output: impl Into<String>) {
        self.outputs.write().insert(id.to_string(), output.into());
        self.version.send_modify(|v| *v += 1);
    }

    pub fn get(&self, id: &str) -> Option<String> {
        self.outputs.read().get(id).cloned()
    }

    pub fn clear(&self, id: &str) {
        if self.outputs.write().remove(id).is_some() {
            self.version.send_modify(|v| *v += 1);
        }
    }

    /// Receiver that observes a change after every `set`/`clear`.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Extract a snippet for `id` with `spec`. `None` while nothing has been
    /// captured yet.
    pub fn snippet(&self, id: &str, spec: &SnippetSpec) -> Option<Snippet> {
        let output = self.get(id)?;
        if output.is_empty() {
            return None;
        }
        Some(spec.extract(&output))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid snippet pattern `{pattern}`: {source}")]
pub struct SnippetPatternError {
    pattern: String,
    #[source]
    source: regex::Error,
}

/// How to cut a snippet out of command output. Selection precedence: pattern
/// range, then match pattern, then line range, then the whole output.
#[derive(Debug, Clone, Default)]
pub struct SnippetSpec {
    pub start_pattern: Option<Regex>,
    pub end_pattern: Option<Regex>,
    pub pattern: Option<Regex>,
    /// 1-based first line.
    pub start_line: Option<usize>,
    /// 1-based last line, inclusive. Defaults to `start_line`.
    pub end_line: Option<usize>,
    pub max_lines: Option<usize>,
}

fn compile(pattern: &str) -> Result<Regex, SnippetPatternError> {
    regex::RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|source| SnippetPatternError {
            pattern: pattern.to_string(),
            source,
        })
}

impl SnippetSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern(mut self, pattern: &str) -> Result<Self, SnippetPatternError> {
        self.pattern = Some(compile(pattern)?);
        Ok(self)
    }

    pub fn between(
        mut self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self, SnippetPatternError> {
        self.start_pattern = start.map(compile).transpose()?;
        self.end_pattern = end.map(compile).transpose()?;
        Ok(self)
    }

    pub fn lines(mut self, start: usize, end: Option<usize>) -> Self {
        self.start_line = Some(start);
        self.end_line = end;
        self
    }

    pub fn max_lines(mut self, max: usize) -> Self {
        self.max_lines = Some(max);
        self
    }

    pub fn extract(&self, output: &str) -> Snippet {
        let extracted = if self.start_pattern.is_some() || self.end_pattern.is_some() {
            self.extract_range(output)
        } else if let Some(re) = &self.pattern {
            re.find_iter(output)
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        } else if let Some(start_line) = self.start_line {
            let lines: Vec<&str> = output.split('\n').collect();
            let start = start_line.saturating_sub(1).min(lines.len());
            let end = self.end_line.unwrap_or(start + 1).clamp(start, lines.len());
            lines[start..end].join("\n")
        } else {
            output.to_string()
        };
        truncate(extracted, self.max_lines)
    }

    /// Start at the first line matching `start_pattern` (or line 0); stop
    /// before the first later line matching `end_pattern` (or at the end).
    fn extract_range(&self, output: &str) -> String {
        let lines: Vec<&str> = output.split('\n').collect();
        let start = self
            .start_pattern
            .as_ref()
            .and_then(|re| lines.iter().position(|l| re.is_match(l)))
            .unwrap_or(0);
        let end = self
            .end_pattern
            .as_ref()
            .and_then(|re| lines.iter().skip(start + 1).position(|l| re.is_match(l)))
            .map(|offset| start + 1 + offset)
            .unwrap_or(lines.len());
        lines[start..end].join("\n")
    }
}

fn truncate(extracted: String, max_lines: Option<usize>) -> Snippet {
    match max_lines {
        Some(max) if max > 0 && !extracted.is_empty() => {
            let lines: Vec<&str> = extracted.split('\n').collect();
            if lines.len() > max {
                Snippet {
                    text: lines[..max].join("\n"),
                    truncated: true,
                }
            } else {
                Snippet {
                    text: extracted,
                    truncated: false,
                }
            }
        }
        _ => Snippet {
            text: extracted,
            truncated: false,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub text: String,
    pub truncated: bool,
}

impl Snippet {
    /// Byte ranges of `highlight` matches inside the snippet text.
    pub fn highlights(&self, highlight: &Regex) -> Vec<Range<usize>> {
        highlight.find_iter(&self.text).map(|m| m.range()).collect()
    }
}

/// Default snippet for a full transcript: the first few hundred lines.
pub fn transcript_spec() -> SnippetSpec {
    SnippetSpec::new().max_lines(DEFAULT_SNIPPET_MAX_LINES)
}
