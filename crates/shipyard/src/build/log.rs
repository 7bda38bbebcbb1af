//! Bounded capture of build output.

use std::collections::VecDeque;
use std::fmt;

/// Number of trailing output lines retained for diagnostics.
pub const DEFAULT_TAIL_LINES: usize = 40;

/// The last lines of a build's combined output.
///
/// Older lines are discarded once the capacity is reached; `total_lines`
/// keeps counting so callers can tell how much was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTail {
    lines: VecDeque<String>,
    capacity: usize,
    total_lines: usize,
}

impl Default for LogTail {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TAIL_LINES)
    }
}

impl LogTail {
    /// Creates an empty tail retaining at most `capacity` lines.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            total_lines: 0,
        }
    }

    /// Appends a line, evicting the oldest one when full.
    pub fn push(&mut self, line: impl Into<String>) {
        self.total_lines = self.total_lines.saturating_add(1);
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Retained lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Total number of lines observed, including evicted ones.
    #[must_use]
    pub const fn total_lines(&self) -> usize {
        self.total_lines
    }

    /// Returns `true` when no output was captured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_lines == 0
    }
}

impl fmt::Display for LogTail {
    /// Renders nothing for an empty tail, otherwise a header line followed
    /// by the retained output, each on its own line.
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.is_empty() {
            return Ok(());
        }
        write!(
            formatter,
            "\n--- last {} of {} output lines ---",
            self.lines.len(),
            self.total_lines
        )?;
        for line in &self.lines {
            write!(formatter, "\n{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_lines_past_capacity() {
        let mut tail = LogTail::with_capacity(2);
        tail.push("one");
        tail.push("two");
        tail.push("three");
        assert_eq!(tail.lines().collect::<Vec<_>>(), vec!["two", "three"]);
        assert_eq!(tail.total_lines(), 3);
    }

    #[test]
    fn empty_tail_renders_nothing() {
        assert_eq!(LogTail::default().to_string(), "");
    }

    #[test]
    fn renders_header_and_lines() {
        let mut tail = LogTail::with_capacity(1);
        tail.push("[INFO] compiling");
        tail.push("[ERROR] cannot find symbol");
        assert_eq!(
            tail.to_string(),
            "\n--- last 1 of 2 output lines ---\n[ERROR] cannot find symbol"
        );
    }
}
