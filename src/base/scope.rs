//! Cancellation and deadline scopes.
//!
//! An [`ExecutionScope`] is handed to every dial. It carries an optional
//! absolute deadline and a cancellation signal, and it remembers *why* it
//! stopped so that callers can report an elapsed deadline and an explicit
//! cancel differently.
//!
//! Scopes form a tree: [`ExecutionScope::child`] derives a scope that stops
//! whenever its parent stops (with the parent's reason), while stopping the
//! child leaves the parent untouched. A child's deadline is never later than
//! its parent's.
//!
//! # Example
//!
//! ```rust,ignore
//! use racenet::base::scope::ExecutionScope;
//! use std::time::Duration;
//!
//! let scope = ExecutionScope::with_timeout(Duration::from_secs(5));
//! let race = scope.child();
//! race.cancel(); // parent keeps running
//! assert!(scope.err().is_none());
//! ```

use crate::base::neterror::NetError;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

const ACTIVE: u8 = 0;
const CANCELED: u8 = 1;
const DEADLINE_EXCEEDED: u8 = 2;

/// Why a scope stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// `cancel()` was called on the scope or one of its ancestors.
    Canceled,
    /// The scope's deadline elapsed.
    DeadlineExceeded,
}

impl StopReason {
    pub fn into_error(self) -> NetError {
        match self {
            StopReason::Canceled => NetError::Canceled,
            StopReason::DeadlineExceeded => NetError::TimedOut,
        }
    }

    fn encode(self) -> u8 {
        match self {
            StopReason::Canceled => CANCELED,
            StopReason::DeadlineExceeded => DEADLINE_EXCEEDED,
        }
    }

    fn decode(state: u8) -> Option<Self> {
        match state {
            CANCELED => Some(StopReason::Canceled),
            DEADLINE_EXCEEDED => Some(StopReason::DeadlineExceeded),
            _ => None,
        }
    }
}

impl From<StopReason> for NetError {
    fn from(reason: StopReason) -> Self {
        reason.into_error()
    }
}

struct ScopeState {
    state: AtomicU8,
    deadline: Option<Instant>,
    notify: Notify,
    children: Mutex<Vec<Weak<ScopeState>>>,
}

impl ScopeState {
    fn new(deadline: Option<Instant>) -> Self {
        Self {
            state: AtomicU8::new(ACTIVE),
            deadline,
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    fn lock_children(&self) -> MutexGuard<'_, Vec<Weak<ScopeState>>> {
        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reason(&self) -> Option<StopReason> {
        StopReason::decode(self.state.load(Ordering::Acquire))
    }

    /// Moves the scope out of the active state. Only the first call wins;
    /// descendants are stopped with the same reason.
    fn stop(&self, reason: StopReason) -> bool {
        if self
            .state
            .compare_exchange(ACTIVE, reason.encode(), Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.notify.notify_waiters();

        let children = std::mem::take(&mut *self.lock_children());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.stop(reason);
        }
        true
    }
}

/// A cancellable, deadline-bearing execution scope.
///
/// Cloning is cheap and clones share state: cancelling any clone cancels
/// them all. Use [`child`](Self::child) for an independently cancellable
/// scope.
#[derive(Clone)]
pub struct ExecutionScope {
    inner: Arc<ScopeState>,
}

impl Default for ExecutionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionScope {
    /// A root scope with no deadline. It only stops when cancelled.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeState::new(None)),
        }
    }

    /// A root scope that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(ScopeState::new(Some(deadline))),
        }
    }

    /// A root scope that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Derive a child scope that inherits this scope's deadline.
    pub fn child(&self) -> Self {
        self.derive(self.inner.deadline)
    }

    /// Derive a child scope expiring at `deadline` or at the parent's
    /// deadline, whichever comes first.
    pub fn child_with_deadline(&self, deadline: Instant) -> Self {
        let effective = match self.inner.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        self.derive(Some(effective))
    }

    /// Derive a child scope expiring `timeout` from now (or earlier, if the
    /// parent expires first).
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        self.child_with_deadline(Instant::now() + timeout)
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        let child = Arc::new(ScopeState::new(deadline));
        {
            let mut children = self.inner.lock_children();
            // A concurrent stop() takes the list only after flipping the
            // state, so reading the state under the lock cannot miss it.
            match self.inner.reason() {
                Some(reason) => {
                    child.stop(reason);
                }
                None => {
                    children.retain(|c| c.strong_count() > 0);
                    children.push(Arc::downgrade(&child));
                }
            }
        }
        Self { inner: child }
    }

    /// Cancel this scope and every scope derived from it.
    ///
    /// Returns `true` if this call stopped the scope, `false` if it had
    /// already stopped (cancelled or expired). Repeated calls are no-ops.
    pub fn cancel(&self) -> bool {
        let stopped = self.inner.stop(StopReason::Canceled);
        if stopped {
            tracing::trace!("execution scope canceled");
        }
        stopped
    }

    /// The absolute deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left until the deadline; `Some(ZERO)` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Why the scope stopped, or `None` while it is still active.
    ///
    /// The first observation of an elapsed deadline records
    /// [`StopReason::DeadlineExceeded`], unless a cancel got there first.
    pub fn err(&self) -> Option<StopReason> {
        if let Some(reason) = self.inner.reason() {
            return Some(reason);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.inner.stop(StopReason::DeadlineExceeded);
                self.inner.reason()
            }
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Fail with the matching [`NetError`] if the scope has stopped.
    pub fn check(&self) -> Result<(), NetError> {
        match self.err() {
            Some(reason) => Err(reason.into_error()),
            None => Ok(()),
        }
    }

    /// Wait until the scope stops, by cancellation or by deadline.
    pub async fn done(&self) -> StopReason {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(reason) = self.err() {
                return reason;
            }

            match self.inner.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }
}

impl fmt::Debug for ExecutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionScope")
            .field("deadline", &self.inner.deadline)
            .field("stopped", &self.inner.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_idempotent() {
        let scope = ExecutionScope::new();
        assert!(scope.err().is_none());

        assert!(scope.cancel());
        assert!(!scope.cancel());
        assert!(!scope.cancel());
        assert_eq!(scope.err(), Some(StopReason::Canceled));
        assert!(scope.check().unwrap_err().is_canceled());
    }

    #[test]
    fn test_child_cancel_leaves_parent_running() {
        let parent = ExecutionScope::new();
        let child = parent.child();

        child.cancel();
        assert_eq!(child.err(), Some(StopReason::Canceled));
        assert!(parent.err().is_none());
    }

    #[test]
    fn test_parent_cancel_reaches_grandchildren() {
        let root = ExecutionScope::new();
        let child = root.child();
        let grandchild = child.child();

        root.cancel();
        assert_eq!(child.err(), Some(StopReason::Canceled));
        assert_eq!(grandchild.err(), Some(StopReason::Canceled));
    }

    #[test]
    fn test_child_of_stopped_parent_starts_stopped() {
        let parent = ExecutionScope::new();
        parent.cancel();
        let child = parent.child();
        assert_eq!(child.err(), Some(StopReason::Canceled));
        assert!(!child.cancel());
    }

    #[test]
    fn test_dropped_children_are_pruned() {
        let parent = ExecutionScope::new();
        for _ in 0..16 {
            drop(parent.child());
        }
        let _live = parent.child();
        let children = parent.inner.children.lock().unwrap();
        assert_eq!(children.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_records_deadline_exceeded() {
        let scope = ExecutionScope::with_timeout(Duration::from_millis(100));
        assert!(scope.err().is_none());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(scope.err(), Some(StopReason::DeadlineExceeded));
        assert!(scope.check().unwrap_err().is_timeout());
        // Cancelling an expired scope does not rewrite the reason.
        assert!(!scope.cancel());
        assert_eq!(scope.err(), Some(StopReason::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_deadline_stays_canceled() {
        let scope = ExecutionScope::with_timeout(Duration::from_millis(100));
        scope.cancel();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(scope.err(), Some(StopReason::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_deadline_capped_by_parent() {
        let parent = ExecutionScope::with_timeout(Duration::from_millis(50));
        let child = parent.child_with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let shorter = parent.child_with_timeout(Duration::from_millis(10));
        assert!(shorter.deadline() < parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_wakes_on_deadline() {
        let scope = ExecutionScope::with_timeout(Duration::from_millis(100));
        let start = Instant::now();
        let reason = scope.done().await;
        assert_eq!(reason, StopReason::DeadlineExceeded);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_done_wakes_on_cancel_from_other_task() {
        let scope = ExecutionScope::with_timeout(Duration::from_secs(10));
        let child = scope.child();

        let canceller = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let reason = tokio::time::timeout(Duration::from_secs(2), child.done())
            .await
            .expect("child scope never observed the cancel");
        assert_eq!(reason, StopReason::Canceled);
    }
}
