use crate::base::neterror::NetError;
use crate::socket::candidate::Candidate;
use crate::socket::connection::Connection;
use std::time::Duration;
use tokio::time::Instant;

/// Where a dial attempt is in its life.
///
/// `Pending` moves to exactly one terminal state and stays there. An
/// attempt abandoned because its scope was cancelled ends as
/// `Failed(NetError::Canceled)`.
#[derive(Debug, Clone)]
pub enum AttemptState {
    Pending,
    Succeeded,
    Failed(NetError),
}

/// Bookkeeping for one dial of a fan-out race.
///
/// The task running the dial is the only writer of the state; the racer
/// reads it once the attempt is terminal and records what it did with the
/// connection.
#[derive(Debug, Clone)]
pub struct DialAttempt {
    index: usize,
    candidate: Candidate,
    started_at: Instant,
    finished_at: Option<Instant>,
    state: AttemptState,
    winner: bool,
    discarded: bool,
}

impl DialAttempt {
    pub(crate) fn start(index: usize, candidate: Candidate) -> Self {
        Self {
            index,
            candidate,
            started_at: Instant::now(),
            finished_at: None,
            state: AttemptState::Pending,
            winner: false,
            discarded: false,
        }
    }

    /// Record the dial's outcome and hand back the connection, if any.
    /// Terminal attempts ignore further results.
    pub(crate) fn finish(&mut self, result: Result<Connection, NetError>) -> Option<Connection> {
        if self.is_terminal() {
            return None;
        }
        self.finished_at = Some(Instant::now());
        match result {
            Ok(conn) => {
                self.state = AttemptState::Succeeded;
                Some(conn)
            }
            Err(e) => {
                self.state = AttemptState::Failed(e);
                None
            }
        }
    }

    pub(crate) fn mark_winner(&mut self) {
        self.winner = true;
    }

    pub(crate) fn mark_discarded(&mut self) {
        self.discarded = true;
    }

    /// Position of the candidate in the race's input.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// How long the attempt ran, once terminal.
    pub fn elapsed(&self) -> Option<Duration> {
        self.finished_at.map(|end| end.duration_since(self.started_at))
    }

    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, AttemptState::Pending)
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.state, AttemptState::Succeeded)
    }

    pub fn error(&self) -> Option<&NetError> {
        match &self.state {
            AttemptState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// This attempt's connection was returned to the caller.
    pub fn is_winner(&self) -> bool {
        self.winner
    }

    /// This attempt connected after the race was decided and its
    /// connection was closed.
    pub fn was_discarded(&self) -> bool {
        self.discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_attempt_is_final() {
        let mut attempt = DialAttempt::start(2, Candidate::tcp("127.0.0.1:1"));
        assert!(!attempt.is_terminal());
        assert!(attempt.elapsed().is_none());

        assert!(attempt.finish(Err(NetError::Canceled)).is_none());
        assert!(attempt.is_terminal());
        assert!(attempt.error().unwrap().is_canceled());

        // A second outcome does not overwrite the first.
        attempt.finish(Err(NetError::ConnectionRefused));
        assert!(attempt.error().unwrap().is_canceled());
        assert!(attempt.elapsed().is_some());
        assert_eq!(attempt.index(), 2);
    }
}
