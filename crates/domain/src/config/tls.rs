use serde::{Deserialize, Serialize};

/// Client-side TLS parameters for `tls://` upstreams.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM client certificate chain.
    #[serde(default)]
    pub cert: Option<String>,

    /// PEM private key matching `cert`.
    #[serde(default)]
    pub key: Option<String>,

    /// PEM CA bundle; the bundled web PKI roots are used when unset.
    #[serde(default)]
    pub ca: Option<String>,

    /// Overrides the SNI / verification name for every TLS upstream.
    #[serde(default)]
    pub server_name: Option<String>,
}

impl TlsConfig {
    pub fn has_client_auth(&self) -> bool {
        self.cert.is_some() && self.key.is_some()
    }
}
