//! SQUIL Editor Utilities - query-pane features layered on the document engine
//!
//! This crate adds the editing features that sit beside the
//! [`squil_document`] engine:
//! - SQL formatting with configurable layout
//! - Find and replace, both on plain text and across a document

pub mod find_replace;
pub mod formatter;

pub use find_replace::{
    find_in_document, find_in_statement, replace_all_in_document, replace_at_cursor,
    DocumentMatch, FindError, FindOptions, Match, ReplaceResult, SearchQuery,
};
pub use formatter::{
    format_document, format_sql, format_sql_with_config, format_statement_at, FormatError,
    FormatterConfig, SqlFormatter,
};
