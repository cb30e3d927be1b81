//! Formatter configuration.

use serde::{Deserialize, Serialize};

/// Controls how SQL is laid out by [`super::SqlFormatter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    indent_size: usize,
    uppercase_keywords: bool,
    lines_between_queries: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            indent_size: 2,
            uppercase_keywords: true,
            lines_between_queries: 1,
        }
    }
}

impl FormatterConfig {
    /// Creates a config with the default layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many spaces one indent level takes.
    pub fn with_indent_size(mut self, indent_size: usize) -> Self {
        self.indent_size = indent_size;
        self
    }

    /// Sets whether keywords are uppercased.
    pub fn with_uppercase_keywords(mut self, uppercase: bool) -> Self {
        self.uppercase_keywords = uppercase;
        self
    }

    /// Sets how many blank lines separate formatted statements.
    pub fn with_lines_between_queries(mut self, lines: usize) -> Self {
        self.lines_between_queries = lines;
        self
    }

    pub fn indent_size(&self) -> usize {
        self.indent_size
    }

    pub fn uppercase_keywords(&self) -> bool {
        self.uppercase_keywords
    }

    pub fn lines_between_queries(&self) -> usize {
        self.lines_between_queries
    }

    /// Dense output for one-line previews.
    pub fn compact() -> Self {
        Self {
            indent_size: 0,
            uppercase_keywords: true,
            lines_between_queries: 0,
        }
    }

    /// Wide output for reading long statements.
    pub fn verbose() -> Self {
        Self {
            indent_size: 4,
            uppercase_keywords: true,
            lines_between_queries: 2,
        }
    }
}
