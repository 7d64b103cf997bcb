//! DNS-over-TLS (RFC 7858) connection setup.
//!
//! Without a CA bundle or client certificate every endpoint shares one
//! `ClientConfig` built from the web PKI roots, so rustls session
//! resumption works across endpoints.

use super::tcp::{dial_tcp, StreamConnection};
use super::{io_error, timeout_error};
use bypass_dns_domain::config::TlsConfig;
use bypass_dns_domain::DomainError;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

static SHARED_TLS_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    install_crypto_provider();
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(web_pki_roots())
        .with_no_client_auth();
    Arc::new(config)
});

fn web_pki_roots() -> rustls::RootCertStore {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    root_store
}

fn read_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, DomainError> {
    let file = File::open(path)
        .map_err(|e| DomainError::TlsConfig(format!("cannot open {}: {}", path, e)))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DomainError::TlsConfig(format!("invalid PEM in {}: {}", path, e)))?;
    if certs.is_empty() {
        return Err(DomainError::TlsConfig(format!(
            "no certificates found in {}",
            path
        )));
    }
    Ok(certs)
}

fn read_key(path: &str) -> Result<PrivateKeyDer<'static>, DomainError> {
    let file = File::open(path)
        .map_err(|e| DomainError::TlsConfig(format!("cannot open {}: {}", path, e)))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| DomainError::TlsConfig(format!("invalid PEM in {}: {}", path, e)))?
        .ok_or_else(|| DomainError::TlsConfig(format!("no private key found in {}", path)))
}

/// Opens TLS connections for `tls://` endpoints.
#[derive(Clone)]
pub struct TlsDialer {
    connector: TlsConnector,
}

impl Default for TlsDialer {
    fn default() -> Self {
        Self {
            connector: TlsConnector::from(Arc::clone(&SHARED_TLS_CONFIG)),
        }
    }
}

impl TlsDialer {
    pub fn from_config(config: &TlsConfig) -> Result<Self, DomainError> {
        if config.ca.is_none() && !config.has_client_auth() {
            return Ok(Self::default());
        }

        let roots = match &config.ca {
            Some(ca) => {
                let mut store = rustls::RootCertStore::empty();
                for cert in read_certs(ca)? {
                    store
                        .add(cert)
                        .map_err(|e| DomainError::TlsConfig(format!("bad CA in {}: {}", ca, e)))?;
                }
                store
            }
            None => web_pki_roots(),
        };

        install_crypto_provider();
        let builder = rustls::ClientConfig::builder().with_root_certificates(roots);
        let client_config = match (&config.cert, &config.key) {
            (Some(cert), Some(key)) => builder
                .with_client_auth_cert(read_certs(cert)?, read_key(key)?)
                .map_err(|e| DomainError::TlsConfig(format!("client certificate: {}", e)))?,
            _ => builder.with_no_client_auth(),
        };

        Ok(Self {
            connector: TlsConnector::from(Arc::new(client_config)),
        })
    }

    pub async fn connect(
        &self,
        server: SocketAddr,
        server_name: &str,
        timeout: Duration,
    ) -> Result<StreamConnection<TlsStream<TcpStream>>, DomainError> {
        let name = ServerName::try_from(server_name.to_string()).map_err(|e| {
            DomainError::TlsConfig(format!("invalid TLS server name '{}': {}", server_name, e))
        })?;

        let tcp = dial_tcp(server, timeout).await?;
        let tls = tokio::time::timeout(timeout, self.connector.connect(name, tcp))
            .await
            .map_err(|_| timeout_error(server))?
            .map_err(|e| io_error(server, e))?;

        debug!(server = %server, server_name = %server_name, "TLS connection established");
        Ok(StreamConnection::new(tls, server))
    }
}
