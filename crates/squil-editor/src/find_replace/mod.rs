//! Find and replace for SQL documents.
//!
//! - [`find`] compiles search patterns into reusable queries
//! - [`replace`] expands templates against those queries
//! - [`document`] runs both against a [`squil_document::SqlDocument`]

pub mod document;
pub mod find;
pub mod replace;

pub use document::{
    find_in_document, find_in_statement, replace_all_in_document, replace_at_cursor,
    DocumentMatch,
};
pub use find::{FindError, FindOptions, Match, SearchQuery};
pub use replace::ReplaceResult;
