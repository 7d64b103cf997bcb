pub mod domain_source;
pub mod errors;
pub mod logging;
pub mod root;
pub mod router;
pub mod server;
pub mod tls;

pub use domain_source::{DomainSourceConfig, SourceFormat};
pub use errors::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use root::{CliOverrides, Config};
pub use router::{RouterConfig, MAX_UPSTREAMS};
pub use server::ServerConfig;
pub use tls::TlsConfig;
