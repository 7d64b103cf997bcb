#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    FileRead(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for crate::errors::DomainError {
    fn from(e: ConfigError) -> Self {
        crate::errors::DomainError::ConfigError(e.to_string())
    }
}
