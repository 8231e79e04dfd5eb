//! Render configuration, optionally loaded from TOML

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Configuration for rendering
///
/// ```toml
/// autoescape = true
/// debug = false
/// template_dirs = ["templates"]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// HTML-escape interpolated values that are not marked safe
    pub autoescape: bool,
    /// Dump the compiled tree before rendering
    pub debug: bool,
    /// Base directories searched by the template loader
    pub template_dirs: Vec<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            autoescape: true,
            debug: false,
            template_dirs: Vec::new(),
        }
    }
}

impl RenderConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string; missing keys take defaults
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_autoescape(mut self, autoescape: bool) -> Self {
        self.autoescape = autoescape;
        self
    }

    /// Enable or disable the tree dump
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_template_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.template_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert!(config.autoescape);
        assert!(!config.debug);
        assert!(config.template_dirs.is_empty());
    }

    #[test]
    fn test_from_str_partial() {
        let config = RenderConfig::from_str("debug = true").unwrap();
        assert!(config.autoescape);
        assert!(config.debug);
    }

    #[test]
    fn test_from_str_full() {
        let config = RenderConfig::from_str(
            r#"
            autoescape = false
            template_dirs = ["templates", "shared"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            RenderConfig::new()
                .with_autoescape(false)
                .with_template_dirs(["templates", "shared"])
        );
    }

    #[test]
    fn test_unknown_key_is_error() {
        assert!(matches!(
            RenderConfig::from_str("autoescap = false"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
