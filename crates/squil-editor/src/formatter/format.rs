//! SQL formatting on top of the sqlformat crate.

use thiserror::Error;

use super::config::FormatterConfig;

/// Errors produced while formatting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// The input contained no SQL to format.
    #[error("empty SQL input")]
    EmptyInput,
}

/// Reformats SQL text according to a [`FormatterConfig`].
#[derive(Debug, Clone, Default)]
pub struct SqlFormatter {
    config: FormatterConfig,
}

impl SqlFormatter {
    /// Creates a formatter with the given config.
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    /// Creates a formatter with the default config.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// The active configuration.
    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Formats `sql`, returning text that ends in exactly one newline.
    pub fn format(&self, sql: &str) -> Result<String, FormatError> {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(FormatError::EmptyInput);
        }
        let options = sqlformat::FormatOptions {
            indent: sqlformat::Indent::Spaces(self.config.indent_size() as u8),
            uppercase: Some(self.config.uppercase_keywords()),
            lines_between_queries: self.config.lines_between_queries() as u8,
            ..Default::default()
        };
        let formatted = sqlformat::format(trimmed, &Default::default(), &options);
        Ok(normalize(formatted))
    }
}

/// Formats `sql` with the default configuration.
pub fn format_sql(sql: &str) -> Result<String, FormatError> {
    SqlFormatter::with_defaults().format(sql)
}

/// Formats `sql` with an explicit configuration.
pub fn format_sql_with_config(sql: &str, config: FormatterConfig) -> Result<String, FormatError> {
    SqlFormatter::new(config).format(sql)
}

fn normalize(formatted: String) -> String {
    let mut text = formatted.replace("\r\n", "\n");
    while text.ends_with('\n') {
        text.pop();
    }
    text.push('\n');
    text
}
