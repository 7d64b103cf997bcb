use std::fmt;
use std::str::FromStr;

use crate::fqdn;

/// One `include` entry of the domain source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DomainSelector {
    /// `geosite:<CODE>`; the code is stored upper-cased.
    Geosite(String),
    /// `domain:<name>`; the name is stored normalized.
    Domain(String),
}

impl DomainSelector {
    pub fn is_geosite(&self) -> bool {
        matches!(self, Self::Geosite(_))
    }
}

impl FromStr for DomainSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(code) = s.strip_prefix("geosite:") {
            if code.is_empty() {
                return Err("empty geosite code".to_string());
            }
            return Ok(Self::Geosite(code.to_ascii_uppercase()));
        }
        if let Some(name) = s.strip_prefix("domain:") {
            if name.is_empty() {
                return Err("empty domain selector".to_string());
            }
            return fqdn::normalize(name)
                .map(Self::Domain)
                .map_err(|e| e.to_string());
        }
        Err(format!(
            "unknown selector '{}'. Expected 'geosite:CODE' or 'domain:NAME'",
            s
        ))
    }
}

impl fmt::Display for DomainSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geosite(code) => write!(f, "geosite:{}", code),
            Self::Domain(name) => write!(f, "domain:{}", name),
        }
    }
}
