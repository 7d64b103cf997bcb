use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

pub const DNS_PORT: u16 = 53;
pub const TLS_PORT: u16 = 853;

/// Wire transport actually used for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Udp,
    Tcp,
    Tls,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
            Self::Tls => "tls",
        }
    }

    pub fn is_stream(&self) -> bool {
        !matches!(self, Self::Udp)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured upstream: address plus the transport family it speaks.
///
/// `Udp` endpoints are plain DNS and may be upgraded to TCP per query;
/// `Tcp` and `Tls` endpoints always use their own transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DnsProtocol {
    Udp { addr: SocketAddr },
    Tcp { addr: SocketAddr },
    Tls { addr: SocketAddr, hostname: Arc<str> },
}

impl DnsProtocol {
    pub fn socket_addr(&self) -> SocketAddr {
        match self {
            DnsProtocol::Udp { addr } | DnsProtocol::Tcp { addr } | DnsProtocol::Tls { addr, .. } => {
                *addr
            }
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        match self {
            DnsProtocol::Tls { hostname, .. } => Some(hostname),
            _ => None,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            DnsProtocol::Udp { .. } => "UDP",
            DnsProtocol::Tcp { .. } => "TCP",
            DnsProtocol::Tls { .. } => "TLS",
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, DnsProtocol::Tls { .. })
    }

    /// Replaces the TLS server name (from `tls.server_name`); other variants are unchanged.
    pub fn with_server_name(self, server_name: &str) -> Self {
        match self {
            DnsProtocol::Tls { addr, .. } => DnsProtocol::Tls {
                addr,
                hostname: server_name.into(),
            },
            other => other,
        }
    }
}

fn parse_ip_with_default_port(s: &str, default_port: u16) -> Option<SocketAddr> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Some(addr);
    }
    let bare = s
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(s);
    bare.parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, default_port))
}

impl FromStr for DnsProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("tls://") {
            let addr = parse_ip_with_default_port(rest, TLS_PORT).ok_or_else(|| {
                format!(
                    "Invalid TLS format '{}'. Expected 'tls://IP' or 'tls://IP:PORT'",
                    s
                )
            })?;
            return Ok(DnsProtocol::Tls {
                addr,
                hostname: addr.ip().to_string().into(),
            });
        }
        if let Some(rest) = s.strip_prefix("tcp://") {
            let addr = parse_ip_with_default_port(rest, DNS_PORT)
                .ok_or_else(|| format!("Invalid TCP address '{}'", rest))?;
            return Ok(DnsProtocol::Tcp { addr });
        }
        let rest = s
            .strip_prefix("udp://")
            .or_else(|| s.strip_prefix("dns://"))
            .unwrap_or(s);
        parse_ip_with_default_port(rest, DNS_PORT)
            .map(|addr| DnsProtocol::Udp { addr })
            .ok_or_else(|| {
                format!(
                    "Invalid DNS endpoint format: '{}'. Expected: dns://IP[:PORT], udp://IP[:PORT], tcp://IP[:PORT], tls://IP[:PORT], or IP[:PORT]",
                    s
                )
            })
    }
}

impl fmt::Display for DnsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DnsProtocol::Udp { addr } => write!(f, "udp://{}", addr),
            DnsProtocol::Tcp { addr } => write!(f, "tcp://{}", addr),
            DnsProtocol::Tls { addr, hostname } => write!(f, "tls://{}@{}", addr, hostname),
        }
    }
}
