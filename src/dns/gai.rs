//! System resolver using getaddrinfo.
//!
//! Lookups run on `tokio::task::spawn_blocking`. Dropping the returned
//! future abandons the result; the blocking lookup itself finishes in the
//! background because getaddrinfo cannot be interrupted.

use super::{Addrs, Name, Resolve, Resolving};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use std::{
    io,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
};

/// System resolver using `getaddrinfo` in a thread pool.
#[derive(Clone, Debug, Default)]
pub struct GaiResolver;

impl GaiResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let domain = host.clone();

            let result = tokio::task::spawn_blocking(move || {
                tracing::debug!(host = %host, "resolving via getaddrinfo");
                (host.as_str(), 0u16)
                    .to_socket_addrs()
                    .map(|iter| iter.collect::<Vec<_>>())
            })
            .await;

            let addrs = result
                .map_err(|e| {
                    tracing::error!(error = %e, "DNS resolution task failed");
                    NetError::NameNotResolved
                })?
                .dns_context(&domain)?;

            if addrs.is_empty() {
                return Err(NetError::dns_failed(
                    domain,
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        "No addresses returned by getaddrinfo",
                    ),
                ));
            }

            tracing::debug!(domain = %domain, count = addrs.len(), "DNS resolution complete");
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

/// An ordered list of addresses to dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketAddrs {
    addrs: Vec<SocketAddr>,
}

impl SocketAddrs {
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self { addrs }
    }

    /// Parse `host` as an IP literal, bypassing resolution.
    ///
    /// Returns `None` for host names. Surrounding brackets of IPv6
    /// literals are accepted.
    pub fn try_parse(host: &str, port: u16) -> Option<Self> {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let ip = host.parse::<IpAddr>().ok()?;
        Some(Self {
            addrs: vec![SocketAddr::new(ip, port)],
        })
    }

    /// Build from resolver output, applying `port` to every address.
    pub fn with_port(addrs: Addrs, port: u16) -> Self {
        Self {
            addrs: addrs
                .map(|mut addr| {
                    addr.set_port(port);
                    addr
                })
                .collect(),
        }
    }

    /// Keep only the addresses accepted by `keep`, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&SocketAddr) -> bool) {
        self.addrs.retain(keep);
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn as_slice(&self) -> &[SocketAddr] {
        &self.addrs
    }
}

impl IntoIterator for SocketAddrs {
    type Item = SocketAddr;
    type IntoIter = std::vec::IntoIter<SocketAddr>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.into_iter()
    }
}
