use thiserror::Error;

/// DNS response codes the serving surface writes on the error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorRcode {
    FormErr,
    ServFail,
}

impl ErrorRcode {
    pub fn code(self) -> u8 {
        match self {
            Self::FormErr => 1,
            Self::ServFail => 2,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Domain name exceeds {max} bytes: {name}")]
    DomainNameTooLong { name: String, max: usize },

    #[error("Invalid DNS message: {0}")]
    InvalidDnsMessage(String),

    #[error("Invalid DNS response: {0}")]
    InvalidDnsResponse(String),

    #[error("Response does not match query: {0}")]
    ResponseMismatch(String),

    #[error("Transport timeout connecting to {server}")]
    TransportTimeout { server: String },

    #[error("Transport connection refused by {server}")]
    TransportConnectionRefused { server: String },

    #[error("Transport connection reset by {server}")]
    TransportConnectionReset { server: String },

    #[error("Transport I/O error with {server}: {message}")]
    TransportIo { server: String, message: String },

    #[error("Cached connection was closed by peer")]
    CachedConnectionClosed,

    #[error("No healthy upstream servers available")]
    TransportNoHealthyServers,

    #[error("No upstream servers defined for pool '{0}'")]
    NoUpstreamDefined(&'static str),

    #[error("Concurrent queries exceeded maximum {limit}")]
    ConcurrencyLimitExceeded { limit: u64 },

    #[error("Domain source fetch error: {0}")]
    DomainSourceFetch(String),

    #[error("Domain source parse error: {0}")]
    DomainSourceParse(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl DomainError {
    /// Response code written back to the client when serving fails with this error.
    pub fn response_code(&self) -> ErrorRcode {
        match self {
            Self::ResponseMismatch(_) | Self::InvalidDnsMessage(_) => ErrorRcode::FormErr,
            _ => ErrorRcode::ServFail,
        }
    }

    /// True for failures that are charged against a single upstream endpoint.
    pub fn is_upstream_error(&self) -> bool {
        matches!(
            self,
            Self::TransportTimeout { .. }
                | Self::TransportConnectionRefused { .. }
                | Self::TransportConnectionReset { .. }
                | Self::TransportIo { .. }
                | Self::InvalidDnsResponse(_)
        )
    }
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::IoError(e.to_string())
    }
}
