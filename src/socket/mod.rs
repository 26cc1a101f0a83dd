//! Dialing and connections.
//!
//! - [`dialer`]: one connection attempt under a scope (resolve → connect)
//! - [`racer`]: concurrent attempts, first success wins
//! - [`connection`]: the returned stream, with read/write deadlines
//! - [`connect`]: the raw connect primitive, swappable for tests
//! - [`candidate`]: network kinds and dial targets
//! - [`attempt`]: per-attempt bookkeeping of a race

pub mod attempt;
pub mod candidate;
pub mod connect;
pub mod connection;
pub mod dialer;
pub mod racer;

pub use attempt::{AttemptState, DialAttempt};
pub use candidate::{Candidate, Network};
pub use connect::{Connect, Connecting, TcpConnector};
pub use connection::Connection;
pub use dialer::{Dialer, DialerBuilder, DialerConfig};
pub use racer::{FanoutRacer, RaceReport};
