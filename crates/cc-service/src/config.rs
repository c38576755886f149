//! Service configuration.
//!
//! ```json
//! {
//!   "protection_enabled": true,
//!   "annotation_enabled": false,
//!   "block_list_urls": ["https://lists.example/block.txt"],
//!   "annotation_list_urls": "https://lists.example/a.txt|https://lists.example/b.txt"
//! }
//! ```
//!
//! List URL fields accept either a JSON array or the pipe-separated string
//! form used by older configurations.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Block lists are loaded and `classify_for_block` is served
    pub protection_enabled: bool,
    /// Annotation lists are loaded and `classify_for_annotate` is served
    pub annotation_enabled: bool,
    #[serde(deserialize_with = "list_urls")]
    pub block_list_urls: Vec<String>,
    #[serde(deserialize_with = "list_urls")]
    pub annotation_list_urls: Vec<String>,
}

impl ServiceConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Either purpose is switched on.
    pub fn is_enabled(&self) -> bool {
        self.protection_enabled || self.annotation_enabled
    }

    /// Block list URLs to load; empty when protection is off.
    pub fn active_block_lists(&self) -> &[String] {
        if self.protection_enabled {
            &self.block_list_urls
        } else {
            &[]
        }
    }

    /// Annotation list URLs to load; empty when annotation is off.
    pub fn active_annotation_lists(&self) -> &[String] {
        if self.annotation_enabled {
            &self.annotation_list_urls
        } else {
            &[]
        }
    }
}

/// Split a `|`-separated URL list, dropping empty entries.
pub fn parse_list_urls(value: &str) -> Vec<String> {
    value
        .split('|')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

fn list_urls<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListUrls {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match ListUrls::deserialize(deserializer)? {
        ListUrls::Joined(joined) => parse_list_urls(&joined),
        ListUrls::List(urls) => urls.into_iter().filter(|url| !url.trim().is_empty()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_urls() {
        assert_eq!(
            parse_list_urls("https://a.example/l.txt||https://b.example/l.txt|"),
            vec!["https://a.example/l.txt", "https://b.example/l.txt"]
        );
        assert!(parse_list_urls("").is_empty());
    }

    #[test]
    fn test_config_accepts_both_url_forms() {
        let config = ServiceConfig::from_json(
            r#"{
                "protection_enabled": true,
                "block_list_urls": ["https://a.example/l.txt", ""],
                "annotation_list_urls": "https://b.example/1.txt|https://b.example/2.txt"
            }"#,
        )
        .expect("valid config");

        assert!(config.protection_enabled);
        assert!(!config.annotation_enabled);
        assert_eq!(config.block_list_urls, vec!["https://a.example/l.txt"]);
        assert_eq!(config.annotation_list_urls.len(), 2);
        assert!(config.active_annotation_lists().is_empty());
        assert_eq!(config.active_block_lists().len(), 1);
    }

    #[test]
    fn test_empty_config_is_disabled() {
        let config = ServiceConfig::from_json("{}").expect("valid config");
        assert_eq!(config, ServiceConfig::default());
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ServiceConfig::from_json("{\"protection_enabled\": 3}"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ServiceConfig::load("/nonexistent/cc-service.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
