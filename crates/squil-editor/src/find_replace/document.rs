//! Find and replace across a whole [`SqlDocument`].
//!
//! Matches are reported per line in display columns so the surface can
//! underline them directly. Replacement goes through
//! [`SqlDocument::apply_edit`], which reissues line commands, requeues
//! highlighting, and marks the document modified.

use squil_document::{coords, SqlDocument, StatementSpan};

use super::find::{FindError, FindOptions, SearchQuery};

/// A match located inside a document, in display coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMatch {
    /// Line index the match sits on.
    pub line: usize,
    /// Display column of the first matched cell.
    pub start_col: usize,
    /// Display column one past the last matched cell.
    pub end_col: usize,
    /// The matched text.
    pub text: String,
}

/// Finds every match of `pattern` in the document, line by line.
pub fn find_in_document(
    document: &SqlDocument,
    pattern: &str,
    options: FindOptions,
) -> Result<Vec<DocumentMatch>, FindError> {
    let query = SearchQuery::new(pattern, options)?;
    let tab_width = document.config().tab_width;
    let mut matches = Vec::new();
    for line in 0..document.line_count() {
        let Some(text) = document.line_text(line) else {
            continue;
        };
        for found in query.find_all(text) {
            matches.push(to_document_match(line, text, &found, tab_width));
        }
    }
    Ok(matches)
}

/// Finds matches restricted to the lines a statement spans. A match on a
/// shared line counts even when it sits outside the statement's columns.
pub fn find_in_statement(
    document: &SqlDocument,
    statement: &StatementSpan,
    pattern: &str,
    options: FindOptions,
) -> Result<Vec<DocumentMatch>, FindError> {
    let matches = find_in_document(document, pattern, options)?;
    Ok(matches
        .into_iter()
        .filter(|found| (statement.start_line..=statement.end_line).contains(&found.line))
        .collect())
}

/// Replaces every match in the document and returns how many were replaced.
/// The document is left untouched when nothing matches.
pub fn replace_all_in_document(
    document: &mut SqlDocument,
    pattern: &str,
    template: &str,
    options: FindOptions,
) -> Result<usize, FindError> {
    let query = SearchQuery::new(pattern, options)?;
    let result = query.replace_all(&document.text(), template);
    if result.count > 0 {
        document.apply_edit(&result.text);
    }
    Ok(result.count)
}

/// Replaces the first match at or after the cursor. Returns whether a
/// replacement happened.
pub fn replace_at_cursor(
    document: &mut SqlDocument,
    pattern: &str,
    template: &str,
    options: FindOptions,
) -> Result<bool, FindError> {
    let query = SearchQuery::new(pattern, options)?;
    let text = document.text();
    let from = coords::byte_offset(&text, document.cursor_offset());
    let result = query.replace_after(&text, from, template);
    if result.count > 0 {
        document.apply_edit(&result.text);
    }
    Ok(result.count > 0)
}

fn to_document_match(
    line: usize,
    text: &str,
    found: &super::find::Match,
    tab_width: usize,
) -> DocumentMatch {
    let start_char = text[..found.start].chars().count();
    let end_char = start_char + found.text.chars().count();
    DocumentMatch {
        line,
        start_col: coords::display_column(text, start_char, tab_width),
        end_col: coords::display_column(text, end_char, tab_width),
        text: found.text.clone(),
    }
}
