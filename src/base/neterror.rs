use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Coarse classification of a [`NetError`].
///
/// Timeout and Canceled both mean "gave up early"; they are kept apart so
/// callers can tell an elapsed deadline from an explicit cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A deadline elapsed before the operation finished, or the connect
    /// itself timed out.
    Timeout,
    /// The owning scope was cancelled before the operation finished.
    Canceled,
    /// Refused, unreachable, reset, unresolvable and similar failures.
    Transport,
    /// Every candidate of a fan-out race failed without a scope-level cause.
    Aggregate,
}

#[derive(Debug, Error, Clone)]
pub enum NetError {
    // Scope errors
    #[error("Operation timed out")]
    TimedOut,
    #[error("Operation canceled")]
    Canceled,

    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Internet disconnected")]
    InternetDisconnected,
    #[error("Address invalid")]
    AddressInvalid,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Socket not connected")]
    SocketNotConnected,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Network access denied")]
    NetworkAccessDenied,
    #[error("Address in use")]
    AddressInUse,

    // Errors with context
    #[error("Connection to {address} failed: {source}")]
    ConnectionFailedTo {
        address: String,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Name not resolved for {domain}: {source}")]
    NameNotResolvedFor {
        domain: String,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
    #[error("No suitable address found for {0}")]
    NoSuitableAddress(String),

    // Fan-out errors
    #[error("No dial candidates")]
    NoCandidates,
    #[error("All {} dial attempts failed", .errors.len())]
    AllAttemptsFailed { errors: Vec<NetError> },

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    /// Wrap an io error with the address it happened on.
    pub fn connection_failed_to(address: impl Into<String>, source: io::Error) -> Self {
        NetError::ConnectionFailedTo {
            address: address.into(),
            source: Arc::new(source),
        }
    }

    /// Wrap a resolution failure with the domain being resolved.
    pub fn dns_failed(domain: impl Into<String>, source: io::Error) -> Self {
        NetError::NameNotResolvedFor {
            domain: domain.into(),
            source: Arc::new(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::TimedOut | NetError::ConnectionTimedOut => ErrorKind::Timeout,
            NetError::ConnectionFailedTo { source, .. }
                if source.kind() == io::ErrorKind::TimedOut =>
            {
                ErrorKind::Timeout
            }
            NetError::Canceled => ErrorKind::Canceled,
            NetError::AllAttemptsFailed { .. } => ErrorKind::Aggregate,
            _ => ErrorKind::Transport,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub fn is_canceled(&self) -> bool {
        self.kind() == ErrorKind::Canceled
    }

    /// The failures collected by a fan-out race, empty for any other error.
    pub fn attempt_errors(&self) -> &[NetError] {
        match self {
            NetError::AllAttemptsFailed { errors } => errors,
            _ => &[],
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Canceled => -3,
            NetError::TimedOut => -7,

            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::NameNotResolved => -105,
            NetError::InternetDisconnected => -106,
            NetError::AddressInvalid => -108,
            NetError::AddressUnreachable => -109,
            NetError::SocketNotConnected => -112,
            NetError::ConnectionTimedOut => -118,
            NetError::NetworkAccessDenied => -138,
            NetError::AddressInUse => -147,

            NetError::ConnectionFailedTo { source, .. } => code_for_io_kind(source.kind()),
            NetError::NameNotResolvedFor { .. } => -105,
            NetError::UnknownNetwork(_) => -108,
            NetError::NoSuitableAddress(_) => -109,

            // Custom codes, kept clear of Chromium's -900 blob range
            NetError::NoCandidates => -10000,
            NetError::AllAttemptsFailed { .. } => -10001,
            NetError::Unknown(code) => *code,
        }
    }
}

fn code_for_io_kind(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::ConnectionRefused => -102,
        io::ErrorKind::ConnectionReset => -101,
        io::ErrorKind::ConnectionAborted => -103,
        io::ErrorKind::NotConnected => -112,
        io::ErrorKind::AddrInUse => -147,
        io::ErrorKind::AddrNotAvailable => -108,
        io::ErrorKind::PermissionDenied => -138,
        io::ErrorKind::TimedOut => -118,
        io::ErrorKind::UnexpectedEof => -100,
        _ => -104,
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -3 => NetError::Canceled,
            -7 => NetError::TimedOut,
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -106 => NetError::InternetDisconnected,
            -108 => NetError::AddressInvalid,
            -109 => NetError::AddressUnreachable,
            -112 => NetError::SocketNotConnected,
            -118 => NetError::ConnectionTimedOut,
            -138 => NetError::NetworkAccessDenied,
            -147 => NetError::AddressInUse,
            -10000 => NetError::NoCandidates,
            _ => NetError::Unknown(code),
        }
    }
}

/// Maps io errors surfaced by a [`Connection`](crate::socket::Connection).
///
/// `TimedOut` is what a connection reports when a read or write deadline
/// elapses, so it classifies as a timeout rather than a transport failure.
impl From<io::Error> for NetError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => NetError::TimedOut,
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::NotConnected => NetError::SocketNotConnected,
            io::ErrorKind::UnexpectedEof => NetError::ConnectionClosed,
            _ => NetError::ConnectionFailed,
        }
    }
}
