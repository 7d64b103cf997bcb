//! Geosite bundles: protobuf lists of domain rules keyed by country or
//! category code.

use super::domain_set::DomainSet;
use bypass_dns_domain::{DomainError, DomainSelector};
use prost::Message;
use tracing::warn;

#[derive(Clone, PartialEq, prost::Message)]
pub struct GeoSiteList {
    #[prost(message, repeated, tag = "1")]
    pub entry: Vec<GeoSite>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GeoSite {
    #[prost(string, tag = "1")]
    pub country_code: String,

    #[prost(message, repeated, tag = "2")]
    pub domain: Vec<DomainRule>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DomainRule {
    #[prost(enumeration = "RuleType", tag = "1")]
    pub r#type: i32,

    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum RuleType {
    /// Keyword match.
    Plain = 0,
    Regex = 1,
    /// Name and all of its subdomains.
    Domain = 2,
    /// Exact name.
    Full = 3,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GeositeStats {
    pub added: usize,
    /// Keyword/regex rules and rules whose value is not a valid name.
    pub skipped: usize,
}

/// Adds the rules picked by `selectors` from an encoded `GeoSiteList`.
pub fn parse_geosite(
    data: &[u8],
    selectors: &[DomainSelector],
    set: &mut DomainSet,
) -> Result<GeositeStats, DomainError> {
    let list = GeoSiteList::decode(data)
        .map_err(|e| DomainError::DomainSourceParse(format!("geosite decode failed: {}", e)))?;

    let mut stats = GeositeStats::default();
    for selector in selectors {
        match selector {
            DomainSelector::Geosite(code) => {
                let mut found = false;
                for entry in list
                    .entry
                    .iter()
                    .filter(|e| e.country_code.eq_ignore_ascii_case(code))
                {
                    found = true;
                    for rule in &entry.domain {
                        add_rule(rule, set, &mut stats);
                    }
                }
                if !found {
                    warn!(code = %code, "Geosite code not present in list");
                }
            }
            DomainSelector::Domain(name) => {
                if set.insert(name)? {
                    stats.added += 1;
                }
            }
        }
    }
    Ok(stats)
}

fn add_rule(rule: &DomainRule, set: &mut DomainSet, stats: &mut GeositeStats) {
    match RuleType::try_from(rule.r#type) {
        Ok(RuleType::Domain) | Ok(RuleType::Full) => match set.insert(&rule.value) {
            Ok(true) => stats.added += 1,
            Ok(false) => {}
            Err(_) => stats.skipped += 1,
        },
        _ => stats.skipped += 1,
    }
}
