//! Formatting applied to a live [`SqlDocument`].

use squil_document::{coords, statement_at, SqlDocument};

use super::config::FormatterConfig;
use super::format::{FormatError, SqlFormatter};

/// Reformats the whole document. Returns whether the text changed.
/// A document with no SQL in it is left alone.
pub fn format_document(
    document: &mut SqlDocument,
    config: FormatterConfig,
) -> Result<bool, FormatError> {
    let text = document.text();
    if text.trim().is_empty() {
        return Ok(false);
    }
    let formatted = SqlFormatter::new(config).format(&text)?;
    if formatted == text {
        return Ok(false);
    }
    document.apply_edit(&formatted);
    Ok(true)
}

/// Reformats only the statement containing char `offset`, leaving the rest
/// of the document byte for byte intact. Returns whether the text changed.
pub fn format_statement_at(
    document: &mut SqlDocument,
    offset: usize,
    config: FormatterConfig,
) -> Result<bool, FormatError> {
    let Some(span) = statement_at(document.statements(), offset).copied() else {
        return Ok(false);
    };
    let text = document.text();
    let start = coords::byte_offset(&text, span.start);
    let end = coords::byte_offset(&text, span.end);
    let formatted = SqlFormatter::new(config).format(&text[start..end])?;

    let mut replaced = String::with_capacity(text.len());
    replaced.push_str(&text[..start]);
    replaced.push_str(formatted.trim_end());
    replaced.push_str(&text[end..]);
    if replaced == text {
        return Ok(false);
    }
    document.apply_edit(&replaced);
    Ok(true)
}
