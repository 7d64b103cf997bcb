use anyhow::Context;
use bypass_dns_domain::config::CliOverrides;
use bypass_dns_domain::Config;
use std::net::{IpAddr, SocketAddr};
use tracing::info;

pub fn load_config(
    config_path: Option<&str>,
    cli_overrides: CliOverrides,
) -> anyhow::Result<Config> {
    let config = Config::load(config_path, cli_overrides)?;
    config.validate()?;

    info!(
        config_file = config_path.unwrap_or("default"),
        dns_port = config.server.dns_port,
        bind = %config.server.bind_address,
        zone = %config.router.zone,
        pass = config.router.pass.len(),
        forward = config.router.forward.len(),
        "Configuration loaded"
    );

    Ok(config)
}

pub fn bind_address(config: &Config) -> anyhow::Result<SocketAddr> {
    let ip: IpAddr = config
        .server
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind_address))?;
    Ok(SocketAddr::new(ip, config.server.dns_port))
}
