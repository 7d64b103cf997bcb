use bypass_dns_domain::config::{CliOverrides, Config, ConfigError, RouterConfig, SourceFormat};
use bypass_dns_domain::{DnsProtocol, PolicyKind};

fn minimal_toml() -> &'static str {
    r#"
        [router]
        pass = ["114.114.114.114"]
        forward = ["tls://1.1.1.1"]
    "#
}

#[test]
fn test_router_defaults() {
    let config = RouterConfig::default();

    assert_eq!(config.zone, ".");
    assert_eq!(config.policy, PolicyKind::Random);
    assert_eq!(config.max_fails, 2);
    assert_eq!(config.health_check_ms, 500);
    assert!(config.health_check_recursion_desired);
    assert_eq!(config.reload_secs, 86400);
    assert!(!config.force_tcp);
    assert!(!config.prefer_udp);
    assert_eq!(config.expire_secs, 10);
    assert_eq!(config.timeout_ms, 2000);
    assert_eq!(config.max_concurrent, 0);
    assert!(config.domain_source.is_none());
}

#[test]
fn test_minimal_config_validates() {
    let config = Config::from_toml(minimal_toml()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.server.dns_port, 53);
}

#[test]
fn test_default_config_has_no_upstreams() {
    let err = Config::default().validate().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_policy_parses_snake_case() {
    let config = Config::from_toml(
        r#"
        [router]
        pass = ["1.1.1.1"]
        forward = ["8.8.8.8"]
        policy = "round_robin"
    "#,
    )
    .unwrap();
    assert_eq!(config.router.policy, PolicyKind::RoundRobin);
}

#[test]
fn test_unknown_policy_is_parse_error() {
    let err = Config::from_toml(
        r#"
        [router]
        policy = "weighted"
    "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_negative_duration_is_parse_error() {
    let err = Config::from_toml(
        r#"
        [router]
        health_check_ms = -5
    "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_too_many_upstreams_rejected() {
    let mut config = RouterConfig {
        pass: vec!["1.1.1.1".to_string()],
        ..RouterConfig::default()
    };
    config.forward = (1..=16).map(|i| format!("10.0.0.{}", i)).collect();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("more than 15"));
}

#[test]
fn test_invalid_upstream_rejected() {
    let config = RouterConfig {
        pass: vec!["not-an-ip".to_string()],
        forward: vec!["8.8.8.8".to_string()],
        ..RouterConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_tls_server_name_applied_to_tls_upstreams() {
    let config = Config::from_toml(
        r#"
        [router]
        pass = ["1.1.1.1"]
        forward = ["tls://1.1.1.1", "8.8.8.8"]

        [router.tls]
        server_name = "cloudflare-dns.com"
    "#,
    )
    .unwrap();
    let forward = config.router.forward_endpoints().unwrap();
    assert_eq!(forward[0].hostname(), Some("cloudflare-dns.com"));
    assert!(matches!(forward[1], DnsProtocol::Udp { .. }));
}

#[test]
fn test_tls_cert_without_key_rejected() {
    let mut config = Config::from_toml(minimal_toml()).unwrap();
    config.router.tls.cert = Some("/etc/ssl/client.pem".to_string());
    assert!(config.router.validate().is_err());
}

#[test]
fn test_zone_is_normalized() {
    let config = RouterConfig {
        zone: "Example.ORG".to_string(),
        ..RouterConfig::default()
    };
    assert_eq!(config.normalized_zone().unwrap(), "example.org.");
}

#[test]
fn test_domain_source_format_defaults() {
    let config = Config::from_toml(
        r#"
        [router]
        pass = ["1.1.1.1"]
        forward = ["8.8.8.8"]

        [router.domain_source]
        locator = "https://example.com/list.txt"
    "#,
    )
    .unwrap();
    let source = config.router.domain_source.as_ref().unwrap();
    assert_eq!(source.effective_format(), SourceFormat::Plaintext);
    assert_eq!(source.fetch_timeout_secs, 30);
    config.validate().unwrap();
}

#[test]
fn test_geosite_selector_rejected_for_plaintext() {
    let config = Config::from_toml(
        r#"
        [router]
        pass = ["1.1.1.1"]
        forward = ["8.8.8.8"]

        [router.domain_source]
        locator = "https://example.com/list.txt"
        include = ["geosite:cn"]
    "#,
    )
    .unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_geosite_without_include_rejected() {
    let config = Config::from_toml(
        r#"
        [router]
        pass = ["1.1.1.1"]
        forward = ["8.8.8.8"]

        [router.domain_source]
        locator = "/usr/share/v2ray/geosite.dat"
    "#,
    )
    .unwrap();
    let source = config.router.domain_source.as_ref().unwrap();
    assert_eq!(source.effective_format(), SourceFormat::Geosite);
    assert!(config.validate().is_err());
}

#[test]
fn test_load_from_file_applies_cli_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bypass-dns.toml");
    std::fs::write(&path, minimal_toml()).unwrap();

    let overrides = CliOverrides {
        dns_port: Some(5353),
        log_level: Some("debug".to_string()),
        ..CliOverrides::default()
    };
    let config = Config::load(path.to_str(), overrides).unwrap();

    assert_eq!(config.server.dns_port, 5353);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.router.pass, vec!["114.114.114.114".to_string()]);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_missing_file_is_file_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let result = Config::load(path.to_str(), CliOverrides::default());

    assert!(matches!(result, Err(ConfigError::FileRead(..))));
}
