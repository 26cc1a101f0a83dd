//! Single-attempt dialing under an [`ExecutionScope`].
//!
//! Roughly equivalent to the TCP step of net::ConnectJob: resolve the host,
//! then connect to the resolved addresses in order until one answers. Every
//! step waits on three things at once (the step itself, the scope's
//! cancellation, the deadline) and the first one to finish decides.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::base::scope::ExecutionScope;
use crate::dns::{GaiResolver, Name, Resolve, SocketAddrs};
use crate::socket::candidate::{split_host_port, Candidate, Network};
use crate::socket::connect::{Connect, TcpConnector};
use crate::socket::connection::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Dialer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialerConfig {
    /// Upper bound for one dial in milliseconds, on top of the scope's
    /// deadline. Its expiry is reported as a timeout.
    pub timeout_ms: Option<u64>,
    /// Set TCP_NODELAY on the returned connection (default: true).
    pub nodelay: bool,
    /// Local IP to bind before connecting.
    pub local_address: Option<IpAddr>,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            nodelay: true,
            local_address: None,
        }
    }
}

impl DialerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Opens one connection to one address, honoring a scope.
///
/// Cheap to clone; clones share the resolver and connector.
#[derive(Clone)]
pub struct Dialer {
    config: DialerConfig,
    resolver: Arc<dyn Resolve>,
    connector: Arc<dyn Connect>,
}

impl Default for Dialer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dialer {
    /// System resolver, plain TCP, default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> DialerBuilder {
        DialerBuilder::default()
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    /// Dial `address` over `network` within `scope`.
    ///
    /// Fails fast, without resolving or connecting, when the scope has
    /// already stopped. On success the connection has no deadlines set.
    pub async fn dial(
        &self,
        scope: &ExecutionScope,
        network: Network,
        address: &str,
    ) -> Result<Connection, NetError> {
        scope.check()?;
        let (host, port) = split_host_port(address)?;

        let scope = match self.config.timeout() {
            Some(timeout) => scope.child_with_timeout(timeout),
            None => scope.clone(),
        };

        tracing::debug!(network = %network, address = %address, "dialing");

        let mut addrs = match SocketAddrs::try_parse(host, port) {
            Some(addrs) => addrs,
            None => {
                let resolving = self.resolver.resolve(Name::new(host));
                let resolved = within(&scope, resolving).await?;
                SocketAddrs::with_port(resolved, port)
            }
        };
        addrs.retain(|addr| network.accepts(addr));
        if addrs.is_empty() {
            return Err(NetError::NoSuitableAddress(address.to_string()));
        }

        let mut first_error = None;
        for addr in addrs {
            let target = addr.to_string();
            let connecting = self.connector.connect(addr, self.config.local_address);
            let attempt = async { connecting.await.connection_context(&target) };

            match within(&scope, attempt).await {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(self.config.nodelay) {
                        tracing::warn!(address = %target, error = %e, "tcp set_nodelay error");
                    }
                    tracing::debug!(network = %network, address = %target, "connected");
                    return Ok(Connection::new(stream));
                }
                Err(e) if scope.is_done() => {
                    tracing::debug!(address = %target, error = %e, "dial abandoned");
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!(address = %target, error = %e, "connect failed");
                    // Only keep the first error; later addresses are fallbacks,
                    // including after a connect that timed out on its own.
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.unwrap_or(NetError::ConnectionFailed))
    }

    /// Dial a [`Candidate`].
    pub async fn dial_candidate(
        &self,
        scope: &ExecutionScope,
        candidate: &Candidate,
    ) -> Result<Connection, NetError> {
        self.dial(scope, candidate.network, &candidate.address).await
    }
}

/// Run `step` until it finishes or the scope stops, whichever is first.
/// Losing to the scope drops `step` and with it any half-open socket.
async fn within<T, F>(scope: &ExecutionScope, step: F) -> Result<T, NetError>
where
    F: Future<Output = Result<T, NetError>>,
{
    tokio::select! {
        biased;
        reason = scope.done() => Err(reason.into_error()),
        result = step => result,
    }
}

/// Builder for a [`Dialer`].
#[derive(Default)]
pub struct DialerBuilder {
    config: DialerConfig,
    resolver: Option<Arc<dyn Resolve>>,
    connector: Option<Arc<dyn Connect>>,
}

impl DialerBuilder {
    /// Replace all settings at once.
    pub fn config(mut self, config: DialerConfig) -> Self {
        self.config = config;
        self
    }

    /// Upper bound for a single dial.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    pub fn local_address(mut self, ip: IpAddr) -> Self {
        self.config.local_address = Some(ip);
        self
    }

    pub fn resolver<R: Resolve + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn connector<C: Connect + 'static>(mut self, connector: C) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn build(self) -> Dialer {
        Dialer {
            config: self.config,
            resolver: self.resolver.unwrap_or_else(|| Arc::new(GaiResolver)),
            connector: self.connector.unwrap_or_else(|| Arc::new(TcpConnector)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DialerConfig::default();
        assert!(config.nodelay);
        assert!(config.timeout().is_none());
        assert!(config.local_address.is_none());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{"timeout_ms": 250, "local_address": "127.0.0.1"}"#;
        let config = DialerConfig::from_json(json).unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.local_address, Some(IpAddr::from([127, 0, 0, 1])));
        // Missing fields keep their defaults
        assert!(config.nodelay);
    }

    #[test]
    fn test_builder_applies_settings() {
        let dialer = Dialer::builder()
            .timeout(Duration::from_secs(3))
            .nodelay(false)
            .build();
        assert_eq!(dialer.config().timeout_ms, Some(3000));
        assert!(!dialer.config().nodelay);
    }
}
