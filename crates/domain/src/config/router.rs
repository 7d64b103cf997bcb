use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::domain_source::DomainSourceConfig;
use super::errors::ConfigError;
use super::tls::TlsConfig;
use crate::dns_protocol::DnsProtocol;
use crate::fqdn;
use crate::selection_policy::PolicyKind;

/// Upper bound on upstreams per pool.
pub const MAX_UPSTREAMS: usize = 15;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Zone the router answers for; queries outside it go to `forward`.
    #[serde(default = "default_zone")]
    pub zone: String,

    /// Upstreams for names found in the domain list.
    #[serde(default)]
    pub pass: Vec<String>,

    /// Upstreams for everything else.
    #[serde(default)]
    pub forward: Vec<String>,

    #[serde(default)]
    pub policy: PolicyKind,

    /// Consecutive failures before an endpoint is skipped; 0 disables gating.
    #[serde(default = "default_max_fails")]
    pub max_fails: u32,

    #[serde(default = "default_health_check_ms")]
    pub health_check_ms: u64,

    #[serde(default = "default_true")]
    pub health_check_recursion_desired: bool,

    /// Domain list change check interval; 0 disables reloading.
    #[serde(default = "default_reload_secs")]
    pub reload_secs: u64,

    #[serde(default)]
    pub force_tcp: bool,

    #[serde(default)]
    pub prefer_udp: bool,

    /// Idle lifetime of cached upstream connections.
    #[serde(default = "default_expire_secs")]
    pub expire_secs: u64,

    /// Per-exchange timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// In-flight query ceiling; 0 means unlimited.
    #[serde(default)]
    pub max_concurrent: u64,

    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default)]
    pub domain_source: Option<DomainSourceConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            zone: default_zone(),
            pass: Vec::new(),
            forward: Vec::new(),
            policy: PolicyKind::default(),
            max_fails: default_max_fails(),
            health_check_ms: default_health_check_ms(),
            health_check_recursion_desired: true,
            reload_secs: default_reload_secs(),
            force_tcp: false,
            prefer_udp: false,
            expire_secs: default_expire_secs(),
            timeout_ms: default_timeout_ms(),
            max_concurrent: 0,
            tls: TlsConfig::default(),
            domain_source: None,
        }
    }
}

impl RouterConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_ms)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_secs)
    }

    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Normalized, dot-terminated zone.
    pub fn normalized_zone(&self) -> Result<String, ConfigError> {
        fqdn::normalize(&self.zone)
            .map_err(|e| ConfigError::Validation(format!("zone '{}': {}", self.zone, e)))
    }

    pub fn pass_endpoints(&self) -> Result<Vec<DnsProtocol>, ConfigError> {
        self.parse_pool("pass", &self.pass)
    }

    pub fn forward_endpoints(&self) -> Result<Vec<DnsProtocol>, ConfigError> {
        self.parse_pool("forward", &self.forward)
    }

    fn parse_pool(&self, name: &str, entries: &[String]) -> Result<Vec<DnsProtocol>, ConfigError> {
        entries
            .iter()
            .map(|entry| {
                let protocol: DnsProtocol = entry
                    .parse()
                    .map_err(|e| ConfigError::Validation(format!("{} upstream: {}", name, e)))?;
                Ok(match &self.tls.server_name {
                    Some(server_name) => protocol.with_server_name(server_name),
                    None => protocol,
                })
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.normalized_zone()?;

        for (name, pool) in [("pass", &self.pass), ("forward", &self.forward)] {
            if pool.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "No {} upstream servers configured",
                    name
                )));
            }
            if pool.len() > MAX_UPSTREAMS {
                return Err(ConfigError::Validation(format!(
                    "more than {} {} upstreams configured: {}",
                    MAX_UPSTREAMS,
                    name,
                    pool.len()
                )));
            }
        }
        self.pass_endpoints()?;
        self.forward_endpoints()?;

        if self.tls.cert.is_some() != self.tls.key.is_some() {
            return Err(ConfigError::Validation(
                "tls.cert and tls.key must be set together".to_string(),
            ));
        }

        if let Some(source) = &self.domain_source {
            source.validate()?;
        }

        Ok(())
    }
}

fn default_zone() -> String {
    ".".to_string()
}

fn default_max_fails() -> u32 {
    2
}

fn default_health_check_ms() -> u64 {
    500
}

fn default_reload_secs() -> u64 {
    86400
}

fn default_expire_secs() -> u64 {
    10
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}
