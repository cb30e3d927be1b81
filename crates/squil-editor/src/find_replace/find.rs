//! Text search with literal, whole-word, and regex modes.
//!
//! A pattern compiles once into a [`SearchQuery`] and is then reusable
//! across document snapshots. Literal patterns are escaped before they reach
//! the regex engine; whole-word searches get `\b` anchors; case folding is
//! done by the engine rather than by lowercasing the haystack.

use regex::{Regex, RegexBuilder};
use std::ops::Range;
use thiserror::Error;

/// Options controlling how a pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FindOptions {
    /// Match case exactly instead of folding.
    pub case_sensitive: bool,
    /// Only match at word boundaries.
    pub whole_word: bool,
    /// Treat the pattern as a regular expression instead of literal text.
    pub regex: bool,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    pub fn whole_word(mut self, value: bool) -> Self {
        self.whole_word = value;
        self
    }

    pub fn regex(mut self, value: bool) -> Self {
        self.regex = value;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindError {
    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),
}

/// One occurrence of the pattern. Offsets are byte positions into the
/// searched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Match {
    fn from_regex(found: regex::Match<'_>) -> Self {
        Self {
            start: found.start(),
            end: found.end(),
            text: found.as_str().to_string(),
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A compiled search. An empty pattern is a valid query that matches
/// nothing.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub(crate) regex: Option<Regex>,
}

impl SearchQuery {
    pub fn new(pattern: &str, options: FindOptions) -> Result<Self, FindError> {
        if pattern.is_empty() {
            return Ok(Self { regex: None });
        }
        let source = if options.regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let anchored = if options.whole_word {
            format!(r"\b(?:{source})\b")
        } else {
            source
        };
        let regex = RegexBuilder::new(&anchored)
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|error| FindError::InvalidPattern(error.to_string()))?;
        Ok(Self { regex: Some(regex) })
    }

    /// Every match, in order of occurrence.
    pub fn find_all(&self, text: &str) -> Vec<Match> {
        match &self.regex {
            Some(regex) => regex.find_iter(text).map(Match::from_regex).collect(),
            None => Vec::new(),
        }
    }

    pub fn find_first(&self, text: &str) -> Option<Match> {
        self.regex.as_ref()?.find(text).map(Match::from_regex)
    }

    /// The first match starting at or after byte offset `start`, which must
    /// lie on a char boundary. Word boundaries still see the full text, so
    /// an anchor at `start` behaves the same as in [`find_all`].
    pub fn find_after(&self, text: &str, start: usize) -> Option<Match> {
        let regex = self.regex.as_ref()?;
        if start >= text.len() {
            return None;
        }
        regex.find_at(text, start).map(Match::from_regex)
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.regex {
            Some(regex) => regex.find_iter(text).count(),
            None => 0,
        }
    }
}
