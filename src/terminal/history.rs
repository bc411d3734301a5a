//! Command history with index-based recall.

/// Append-only list of submitted lines. Navigation moves a cursor counted
/// back from the newest entry and never mutates the entries.
#[derive(Debug, Default, Clone)]
pub struct History {
    entries: Vec<String>,
    // Offset from the newest entry; `None` while editing a fresh line.
    cursor: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted line and reset navigation. Blank lines are not
    /// recorded. Resubmitting a recalled entry appends a new copy.
    pub fn push(&mut self, line: &str) {
        let line = line.trim();
        self.cursor = None;
        if line.is_empty() {
            return;
        }
        self.entries.push(line.to_string());
    }

    /// Step to the next older entry. `None` when there is nothing older.
    pub fn previous(&mut self) -> Option<&str> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.entries.len() {
            return None;
        }
        self.cursor = Some(next);
        Some(self.at(next))
    }

    /// Step to the next newer entry. Stepping past the newest entry returns
    /// the empty line; `None` when navigation is not active.
    pub fn next(&mut self) -> Option<&str> {
        match self.cursor {
            None => None,
            Some(0) => {
                self.cursor = None;
                Some("")
            }
            Some(c) => {
                self.cursor = Some(c - 1);
                Some(self.at(c - 1))
            }
        }
    }

    pub fn reset(&mut self) {
        self.cursor = None;
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn at(&self, offset: usize) -> &str {
        &self.entries[self.entries.len() - 1 - offset]
    }
}
