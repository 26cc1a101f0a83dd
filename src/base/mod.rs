//! Base types and error handling.
//!
//! Provides foundational types shared by the dialing layers:
//! - [`NetError`](neterror::NetError): Network error codes matching `net_error_list.h`
//! - [`ExecutionScope`](scope::ExecutionScope): cancellation and deadline propagation

pub mod context;
pub mod neterror;
pub mod scope;
