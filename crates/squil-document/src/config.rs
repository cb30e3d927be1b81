//! Document engine configuration.

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Tunables the host passes when opening a document.
///
/// All fields have defaults, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Width of a tab stop in display columns.
    pub tab_width: usize,
    /// Quiet period before document changes are reported to the host.
    pub debounce_ms: u64,
    /// Language tag forwarded to the highlighter.
    pub language: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            tab_width: 4,
            debounce_ms: 300,
            language: "sql".to_string(),
        }
    }
}

impl DocumentConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse document configuration")
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize document configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = DocumentConfig::default();
        assert_eq!(config.tab_width, 4);
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.language, "sql");
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = DocumentConfig::from_json("{}").unwrap();
        assert_eq!(config, DocumentConfig::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = DocumentConfig::from_json(r#"{"tab_width": 8}"#).unwrap();
        assert_eq!(config.tab_width, 8);
        assert_eq!(config.debounce_ms, 300);
    }

    #[test]
    fn test_round_trip() {
        let config = DocumentConfig {
            tab_width: 2,
            debounce_ms: 100,
            language: "sql".to_string(),
        };
        let json = config.to_json().unwrap();
        assert_eq!(DocumentConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(DocumentConfig::from_json("{").is_err());
    }
}
