//! SQL formatting.
//!
//! Wraps the sqlformat crate behind a small config surface and adds
//! document-level entry points that reformat either the whole buffer or a
//! single statement.

mod config;
mod document;
mod format;


pub use config::FormatterConfig;
pub use document::{format_document, format_statement_at};
pub use format::{format_sql, format_sql_with_config, FormatError, SqlFormatter};
