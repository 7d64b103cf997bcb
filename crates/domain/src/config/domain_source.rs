use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use crate::domain_selector::DomainSelector;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// One name per line, `#` comments.
    Plaintext,
    /// Protobuf geosite bundle keyed by country/category code.
    Geosite,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "plaintext",
            Self::Geosite => "geosite",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainSourceConfig {
    /// Filesystem path or `http(s)://` URL.
    pub locator: String,

    #[serde(default)]
    pub format: Option<SourceFormat>,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl DomainSourceConfig {
    pub fn is_remote(&self) -> bool {
        self.locator.starts_with("http://") || self.locator.starts_with("https://")
    }

    /// Explicit format, else plaintext for URLs and geosite for paths.
    pub fn effective_format(&self) -> SourceFormat {
        self.format.unwrap_or(if self.is_remote() {
            SourceFormat::Plaintext
        } else {
            SourceFormat::Geosite
        })
    }

    pub fn selectors(&self) -> Result<Vec<DomainSelector>, ConfigError> {
        self.include
            .iter()
            .map(|s| {
                s.parse::<DomainSelector>()
                    .map_err(|e| ConfigError::Validation(format!("include '{}': {}", s, e)))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locator.trim().is_empty() {
            return Err(ConfigError::Validation(
                "domain_source.locator cannot be empty".to_string(),
            ));
        }
        let selectors = self.selectors()?;
        match self.effective_format() {
            SourceFormat::Plaintext => {
                if let Some(sel) = selectors.iter().find(|s| s.is_geosite()) {
                    return Err(ConfigError::Validation(format!(
                        "selector '{}' requires format = \"geosite\"",
                        sel
                    )));
                }
            }
            SourceFormat::Geosite => {
                if selectors.is_empty() {
                    return Err(ConfigError::Validation(
                        "geosite source needs at least one include selector".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn default_fetch_timeout_secs() -> u64 {
    30
}
