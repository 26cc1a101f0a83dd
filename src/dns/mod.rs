//! Address resolution seam for the dialer.
//!
//! The dialer only needs "host → IP addresses"; which resolver answers is
//! the caller's choice. Two implementations ship with the crate:
//! - [`GaiResolver`]: the system resolver (getaddrinfo on the blocking pool)
//! - [`DnsResolverWithOverrides`]: a fixed host table in front of another resolver
//!
//! IP literals never reach a resolver; see [`SocketAddrs::try_parse`].
//!
//! # Example
//!
//! ```rust,ignore
//! use racenet::dns::{GaiResolver, Name, Resolve};
//!
//! let resolver = GaiResolver::new();
//! let addrs = resolver.resolve(Name::new("localhost")).await?;
//! for addr in addrs {
//!     println!("Resolved: {}", addr);
//! }
//! ```

mod gai;
mod resolve;

pub use gai::{GaiResolver, SocketAddrs};
pub use resolve::{Addrs, DnsResolverWithOverrides, Name, Resolve, Resolving};
