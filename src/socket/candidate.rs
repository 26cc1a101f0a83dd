//! Dial targets: transport kind plus endpoint.

use crate::base::neterror::NetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use url::Url;

/// Transport kinds the dialer understands, named as in `"tcp"`, `"tcp4"`
/// and `"tcp6"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Stream socket over IPv4 or IPv6.
    #[default]
    Tcp,
    /// Stream socket over IPv4 only.
    Tcp4,
    /// Stream socket over IPv6 only.
    Tcp6,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
        }
    }

    /// Whether `addr` belongs to an address family this network may use.
    pub fn accepts(&self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }
}

impl FromStr for Network {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(NetError::UnknownNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a fan-out race.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub network: Network,
    /// `host:port`, IPv6 literals in brackets. The port may also be a
    /// well-known service name such as `http`.
    pub address: String,
}

impl Candidate {
    pub fn new(network: Network, address: impl Into<String>) -> Self {
        Self {
            network,
            address: address.into(),
        }
    }

    pub fn tcp(address: impl Into<String>) -> Self {
        Self::new(Network::Tcp, address)
    }

    /// Build from a network name such as `"tcp4"`.
    pub fn parse(network: &str, address: impl Into<String>) -> Result<Self, NetError> {
        Ok(Self::new(network.parse()?, address))
    }

    /// Dial target for a URL: its host and explicit or scheme-default port.
    pub fn from_url(url: &Url) -> Result<Self, NetError> {
        match (url.host_str(), url.port_or_known_default()) {
            (Some(host), Some(port)) => Ok(Self::tcp(format!("{}:{}", host, port))),
            _ => Err(NetError::AddressInvalid),
        }
    }
}

impl From<SocketAddr> for Candidate {
    fn from(addr: SocketAddr) -> Self {
        Self::tcp(addr.to_string())
    }
}

impl From<&str> for Candidate {
    fn from(address: &str) -> Self {
        Self::tcp(address)
    }
}

impl From<String> for Candidate {
    fn from(address: String) -> Self {
        Self::tcp(address)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.address)
    }
}

/// Split `host:port`. Bracketed IPv6 hosts keep their brackets so they can
/// be handed straight to [`SocketAddrs::try_parse`](crate::dns::SocketAddrs::try_parse).
///
/// The port is either a number or a well-known service name (`http`,
/// `https`, `ws`, `wss`, `ftp`).
pub(crate) fn split_host_port(address: &str) -> Result<(&str, u16), NetError> {
    let (host, port) = address.rsplit_once(':').ok_or(NetError::AddressInvalid)?;

    if host.is_empty() {
        return Err(NetError::AddressInvalid);
    }
    let bracketed = host.starts_with('[');
    if bracketed != host.ends_with(']') {
        return Err(NetError::AddressInvalid);
    }
    // An unbracketed host with colons is an IPv6 literal missing its brackets.
    if !bracketed && host.contains(':') {
        return Err(NetError::AddressInvalid);
    }

    let port = match port.parse::<u16>() {
        Ok(port) => port,
        Err(_) => service_port(port).ok_or(NetError::AddressInvalid)?,
    };
    Ok((host, port))
}

/// Port of a well-known service, taken from the URL scheme defaults.
fn service_port(name: &str) -> Option<u16> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    Url::parse(&format!("{}://service", name))
        .ok()?
        .port_or_known_default()
}
