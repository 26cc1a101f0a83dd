//! # racenet
//!
//! Context-aware connection dialing for Rust.
//!
//! `racenet` opens outbound stream connections under explicit deadline and
//! cancellation control, and races several dial attempts against each
//! other, keeping the first connection and closing the rest.
//!
//! ## Features
//!
//! - **Execution scopes**: deadlines and cancellation that propagate to
//!   derived scopes and remember whether the deadline or a cancel stopped them
//! - **Dialer**: single attempts that fail fast on a stopped scope and tell
//!   timeouts, cancellations and transport failures apart
//! - **Fan-out racing**: first success wins, losers are cancelled, late
//!   connections are closed, and nothing keeps running after the call returns
//! - **Connections**: independent read and write deadlines
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use racenet::{ExecutionScope, FanoutRacer};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let scope = ExecutionScope::with_timeout(Duration::from_secs(2));
//!     let conn = FanoutRacer::default()
//!         .race(&scope, ["10.0.0.1:443", "10.0.0.2:443", "10.0.0.3:443"])
//!         .await
//!         .unwrap();
//!     println!("Connected to {:?}", conn.peer_addr());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Errors and execution scopes
//! - [`dns`] - Host name resolution seam
//! - [`socket`] - Dialer, racer and connections

pub mod base;
pub mod dns;
pub mod socket;

pub use base::neterror::{ErrorKind, NetError};
pub use base::scope::{ExecutionScope, StopReason};
pub use socket::{
    AttemptState, Candidate, Connection, DialAttempt, Dialer, DialerBuilder, DialerConfig,
    FanoutRacer, Network, RaceReport,
};
