//! Core resolution types and traits.

use crate::base::neterror::NetError;
use std::{
    borrow::Cow, collections::HashMap, fmt, future::Future, net::SocketAddr, pin::Pin, sync::Arc,
};

/// A host name to resolve into IP addresses.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    /// Creates a new [`Name`] from any string-like type.
    #[inline]
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self { host: host.into() }
    }

    /// View the hostname as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Alias for an `Iterator` trait object over `SocketAddr`.
pub type Addrs = Box<dyn Iterator<Item = SocketAddr> + Send>;

/// Alias for the `Future` type returned by a resolver.
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, NetError>> + Send>>;

/// Resolves host names for the dialer.
///
/// The dialer races the returned future against its scope, so a resolver
/// does not need to handle cancellation itself: dropping the future must be
/// enough to abandon the lookup.
///
/// Returned ports are ignored; the dialer applies the port from the address
/// it was asked to dial.
pub trait Resolve: Send + Sync {
    fn resolve(&self, name: Name) -> Resolving;
}

impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, name: Name) -> Resolving {
        (**self).resolve(name)
    }
}

/// Resolver wrapper that answers some hosts from a fixed table.
///
/// Hosts found in the table never reach the inner resolver. Useful for
/// tests and for pinning a host to known addresses.
///
/// # Example
///
/// ```rust,ignore
/// use racenet::dns::{DnsResolverWithOverrides, GaiResolver};
/// use std::collections::HashMap;
///
/// let mut overrides = HashMap::new();
/// overrides.insert("api.local".into(), vec!["127.0.0.1:0".parse().unwrap()]);
///
/// let resolver = DnsResolverWithOverrides::new(Arc::new(GaiResolver::new()), overrides);
/// ```
pub struct DnsResolverWithOverrides {
    inner: Arc<dyn Resolve>,
    overrides: Arc<HashMap<Cow<'static, str>, Vec<SocketAddr>>>,
}

impl DnsResolverWithOverrides {
    pub fn new(
        inner: Arc<dyn Resolve>,
        overrides: HashMap<Cow<'static, str>, Vec<SocketAddr>>,
    ) -> Self {
        Self {
            inner,
            overrides: Arc::new(overrides),
        }
    }

    /// Returns the number of configured overrides.
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

impl Resolve for DnsResolverWithOverrides {
    fn resolve(&self, name: Name) -> Resolving {
        if let Some(addrs) = self.overrides.get(name.as_str()) {
            tracing::trace!(domain = %name, count = addrs.len(), "resolved from override table");
            let addrs: Addrs = Box::new(addrs.clone().into_iter());
            return Box::pin(std::future::ready(Ok(addrs)));
        }
        self.inner.resolve(name)
    }
}

impl fmt::Debug for DnsResolverWithOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsResolverWithOverrides")
            .field("override_count", &self.overrides.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_name_conversions() {
        let name = Name::from("example.com");
        assert_eq!(name.as_str(), "example.com");
        assert_eq!(name.to_string(), "example.com");
        assert_eq!(Name::from(String::from("example.com")), name);
        assert_ne!(Name::new("other.com"), name);
    }

    struct MockResolver {
        response: Vec<SocketAddr>,
    }

    impl Resolve for MockResolver {
        fn resolve(&self, _name: Name) -> Resolving {
            let addrs = self.response.clone();
            Box::pin(async move { Ok(Box::new(addrs.into_iter()) as Addrs) })
        }
    }

    #[tokio::test]
    async fn test_override_resolver_hit_and_miss() {
        let mock = Arc::new(MockResolver {
            response: vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 0)],
        });

        let mut overrides = HashMap::new();
        overrides.insert(
            Cow::Borrowed("override.local"),
            vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)],
        );
        let resolver = DnsResolverWithOverrides::new(mock, overrides);
        assert_eq!(resolver.override_count(), 1);

        let hit: Vec<_> = resolver
            .resolve(Name::new("override.local"))
            .await
            .unwrap()
            .collect();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));

        let miss: Vec<_> = resolver
            .resolve(Name::new("other.com"))
            .await
            .unwrap()
            .collect();
        assert_eq!(miss[0].ip(), IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    }
}
