use super::domain_set::DomainSet;
use bypass_dns_domain::DomainError;

/// Adds every name of a newline-delimited list to `set`.
///
/// Blank lines and `#` comments are skipped; any other line that is not a
/// valid domain name fails the whole load.
pub fn parse_plaintext(data: &[u8], set: &mut DomainSet) -> Result<usize, DomainError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| DomainError::DomainSourceParse(format!("list is not UTF-8: {}", e)))?;

    let mut added = 0;
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let inserted = set.insert(line).map_err(|e| {
            DomainError::DomainSourceParse(format!(
                "invalid domain [{}] at line {}: {}",
                line,
                lineno + 1,
                e
            ))
        })?;
        if inserted {
            added += 1;
        }
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
        let mut set = DomainSet::new();
        let added = parse_plaintext(
            b"# bypass list\n\nexample.com\n  google.cn.  \n# trailing\nexample.com\n",
            &mut set,
        )
        .unwrap();
        assert_eq!(added, 2);
        assert!(set.contains("www.google.cn."));
    }

    #[test]
    fn invalid_line_fails_load() {
        let mut set = DomainSet::new();
        let err = parse_plaintext(b"ok.com\nbad..name\n", &mut set).unwrap_err();
        match err {
            DomainError::DomainSourceParse(msg) => assert!(msg.contains("line 2")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let mut set = DomainSet::new();
        parse_plaintext(b"a.com\r\nb.com\r\n", &mut set).unwrap();
        assert_eq!(set.len(), 2);
    }
}
