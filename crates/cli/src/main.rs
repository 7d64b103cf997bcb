use bypass_dns_domain::config::CliOverrides;
use clap::Parser;
use mimalloc::MiMalloc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod bootstrap;
mod di;
mod server;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "bypass-dns")]
#[command(version)]
#[command(about = "bypass-dns - DNS forwarder that routes listed domains to a separate upstream pool")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// DNS server port
    #[arg(short = 'd', long)]
    dns_port: Option<u16>,

    /// Bind address
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        dns_port: cli.dns_port,
        bind_address: cli.bind.clone(),
        log_level: cli.log_level.clone(),
    };
    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config);
    info!("Starting bypass-dns v{}", env!("CARGO_PKG_VERSION"));

    let services = di::RouterServices::new(&config).await?;
    let shutdown = CancellationToken::new();
    let jobs = services.job_runner(&config, shutdown.clone()).start().await;

    let dns_server = server::DnsServer::bind(bootstrap::bind_address(&config)?)?;
    let mut dns_task = tokio::spawn(dns_server.run(
        services.router.clone(),
        Duration::from_secs(config.server.tcp_idle_timeout_secs),
        shutdown.clone(),
    ));

    tokio::select! {
        result = &mut dns_task => {
            match result {
                Ok(Ok(())) => info!("DNS server stopped"),
                Ok(Err(e)) => error!(error = %e, "DNS server error"),
                Err(e) => error!(error = %e, "DNS server task failed"),
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, initiating shutdown"),
        _ = wait_for_sigterm() => info!("Received SIGTERM, initiating shutdown"),
    }

    shutdown.cancel();
    if !dns_task.is_finished() {
        let _ = dns_task.await;
    }
    jobs.shutdown().await;
    services.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to register SIGTERM handler");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
