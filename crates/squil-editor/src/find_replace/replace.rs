//! Replacement built on [`SearchQuery`].
//!
//! Templates use the regex crate's expansion syntax: `$1` or `${name}`
//! insert capture groups, `$0` the whole match, and `$$` a literal dollar
//! sign. Literal queries have no capture groups, so their templates are
//! plain text apart from `$$`.

use super::find::SearchQuery;
use regex::Captures;

/// Outcome of a replace operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceResult {
    /// The text after replacement.
    pub text: String,
    /// How many matches were replaced.
    pub count: usize,
}

impl SearchQuery {
    /// Replaces every match in `text`.
    pub fn replace_all(&self, text: &str, template: &str) -> ReplaceResult {
        let Some(regex) = &self.regex else {
            return unchanged(text);
        };
        let mut count = 0;
        let replaced = regex.replace_all(text, |caps: &Captures| {
            count += 1;
            expand(caps, template)
        });
        ReplaceResult {
            text: replaced.into_owned(),
            count,
        }
    }

    /// Replaces only the first match.
    pub fn replace_first(&self, text: &str, template: &str) -> ReplaceResult {
        let Some(regex) = &self.regex else {
            return unchanged(text);
        };
        let mut count = 0;
        let replaced = regex.replacen(text, 1, |caps: &Captures| {
            count += 1;
            expand(caps, template)
        });
        ReplaceResult {
            text: replaced.into_owned(),
            count,
        }
    }

    /// Replaces the first match starting at or after byte offset `from`,
    /// which must lie on a char boundary.
    pub fn replace_after(&self, text: &str, from: usize, template: &str) -> ReplaceResult {
        let Some(regex) = &self.regex else {
            return unchanged(text);
        };
        if from >= text.len() {
            return unchanged(text);
        }
        let Some(caps) = regex.captures_at(text, from) else {
            return unchanged(text);
        };
        let Some(whole) = caps.get(0) else {
            return unchanged(text);
        };
        let mut result = String::with_capacity(text.len());
        result.push_str(&text[..whole.start()]);
        result.push_str(&expand(&caps, template));
        result.push_str(&text[whole.end()..]);
        ReplaceResult { text: result, count: 1 }
    }
}

fn unchanged(text: &str) -> ReplaceResult {
    ReplaceResult {
        text: text.to_string(),
        count: 0,
    }
}

fn expand(caps: &Captures<'_>, template: &str) -> String {
    let mut out = String::new();
    caps.expand(template, &mut out);
    out
}
