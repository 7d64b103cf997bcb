//! bypass-dns domain layer
pub mod config;
pub mod dns_protocol;
pub mod domain_selector;
pub mod errors;
pub mod fqdn;
pub mod selection_policy;

pub use config::{Config, ConfigError, RouterConfig};
pub use dns_protocol::{DnsProtocol, Transport};
pub use domain_selector::DomainSelector;
pub use errors::{DomainError, ErrorRcode};
pub use selection_policy::PolicyKind;
