//! Helpers for dot-terminated domain names.

use crate::errors::DomainError;

/// Longest dot-terminated name the domain set stores.
pub const MAX_DOMAIN_LEN: usize = 256;

const MAX_LABEL_LEN: usize = 63;

/// Appends the root dot when missing. `""` becomes `"."`.
pub fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        let mut out = String::with_capacity(name.len() + 1);
        out.push_str(name);
        out.push('.');
        out
    }
}

/// Trims, lower-cases ASCII and dot-terminates `name`, then validates it.
pub fn normalize(name: &str) -> Result<String, DomainError> {
    let mut name = fqdn(name.trim());
    name.make_ascii_lowercase();
    validate(&name)?;
    Ok(name)
}

/// Checks label structure of a dot-terminated name.
pub fn validate(name: &str) -> Result<(), DomainError> {
    if name.len() > MAX_DOMAIN_LEN {
        return Err(DomainError::DomainNameTooLong {
            name: name.to_string(),
            max: MAX_DOMAIN_LEN,
        });
    }
    if name == "." {
        return Ok(());
    }
    let Some(body) = name.strip_suffix('.') else {
        return Err(DomainError::InvalidDomainName(format!(
            "'{}' is not dot-terminated",
            name
        )));
    };
    for label in body.split('.') {
        if label.is_empty() {
            return Err(DomainError::InvalidDomainName(format!(
                "'{}' contains an empty label",
                name
            )));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(DomainError::InvalidDomainName(format!(
                "'{}' has a label longer than {} bytes",
                name, MAX_LABEL_LEN
            )));
        }
        if label
            .bytes()
            .any(|b| b.is_ascii_whitespace() || b.is_ascii_control() || b == 0)
        {
            return Err(DomainError::InvalidDomainName(format!(
                "'{}' contains whitespace or control bytes",
                name
            )));
        }
    }
    Ok(())
}

/// Byte offsets at which each label of `name` starts, most specific first.
///
/// The root name yields no offsets.
pub fn label_offsets(name: &str) -> impl Iterator<Item = usize> + '_ {
    let bytes = name.as_bytes();
    let root = name == ".";
    std::iter::once(0)
        .filter(move |_| !root && !bytes.is_empty())
        .chain(
            bytes
                .iter()
                .enumerate()
                .filter(|&(i, &b)| b == b'.' && i + 1 < bytes.len())
                .map(|(i, _)| i + 1),
        )
}

/// True when `name` equals `zone` or sits below it at a label boundary.
/// Comparison ignores ASCII case; both sides are expected dot-terminated.
pub fn is_subdomain_of(name: &str, zone: &str) -> bool {
    if zone == "." {
        return true;
    }
    if name.len() < zone.len() {
        return false;
    }
    let split = name.len() - zone.len();
    let (head, tail) = name.split_at(split);
    if !tail.eq_ignore_ascii_case(zone) {
        return false;
    }
    head.is_empty() || head.ends_with('.')
}
