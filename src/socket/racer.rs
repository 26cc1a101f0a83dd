//! First-success-wins fan-out dialing.
//!
//! [`FanoutRacer`] dials every candidate at once under one shared child
//! scope. The first attempt to connect wins and cancels the shared scope so
//! the others give up. Connections that still complete afterwards are closed
//! before the race returns, and the race only returns once every attempt has
//! finished.

use crate::base::neterror::NetError;
use crate::base::scope::ExecutionScope;
use crate::socket::attempt::DialAttempt;
use crate::socket::candidate::Candidate;
use crate::socket::connection::Connection;
use crate::socket::dialer::Dialer;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;

/// Races dial attempts and keeps the first connection.
#[derive(Debug, Clone, Default)]
pub struct FanoutRacer {
    dialer: Dialer,
}

/// Result of a race plus the record of every attempt, ordered by
/// candidate index.
#[derive(Debug)]
pub struct RaceReport {
    result: Result<Connection, NetError>,
    attempts: Vec<DialAttempt>,
}

impl RaceReport {
    pub fn result(&self) -> &Result<Connection, NetError> {
        &self.result
    }

    pub fn into_result(self) -> Result<Connection, NetError> {
        self.result
    }

    pub fn into_parts(self) -> (Result<Connection, NetError>, Vec<DialAttempt>) {
        (self.result, self.attempts)
    }

    pub fn attempts(&self) -> &[DialAttempt] {
        &self.attempts
    }

    pub fn winner(&self) -> Option<&DialAttempt> {
        self.attempts.iter().find(|a| a.is_winner())
    }

    /// Attempts that opened a connection, winner included.
    pub fn successes(&self) -> usize {
        self.attempts.iter().filter(|a| a.succeeded()).count()
    }

    /// Connections opened after the race was decided and closed by the racer.
    pub fn discarded(&self) -> usize {
        self.attempts.iter().filter(|a| a.was_discarded()).count()
    }
}

impl FanoutRacer {
    pub fn new(dialer: Dialer) -> Self {
        Self { dialer }
    }

    pub fn dialer(&self) -> &Dialer {
        &self.dialer
    }

    /// Dial all candidates concurrently and return the first connection.
    ///
    /// If every attempt fails and at least one of them was stopped by the
    /// scope, a stopped `parent` is reported as [`NetError::TimedOut`] or
    /// [`NetError::Canceled`]; otherwise the individual failures come back
    /// as [`NetError::AllAttemptsFailed`].
    pub async fn race<I>(
        &self,
        parent: &ExecutionScope,
        candidates: I,
    ) -> Result<Connection, NetError>
    where
        I: IntoIterator,
        I::Item: Into<Candidate>,
    {
        self.race_with_report(parent, candidates)
            .await
            .into_result()
    }

    /// Like [`race`](Self::race), also returning every attempt's record.
    pub async fn race_with_report<I>(&self, parent: &ExecutionScope, candidates: I) -> RaceReport
    where
        I: IntoIterator,
        I::Item: Into<Candidate>,
    {
        let candidates: Vec<Candidate> = candidates.into_iter().map(Into::into).collect();
        if candidates.is_empty() {
            return RaceReport {
                result: Err(NetError::NoCandidates),
                attempts: Vec::new(),
            };
        }

        let total = candidates.len();
        let scope = parent.child();
        // Dropping the set aborts every attempt, so nothing outlives a
        // caller that stops polling the race.
        let mut set = JoinSet::new();
        for (index, candidate) in candidates.iter().cloned().enumerate() {
            let attempt = run_attempt(self.dialer.clone(), scope.clone(), index, candidate);
            set.spawn(attempt);
        }
        tracing::debug!(candidates = total, "race started");

        let mut winner: Option<Connection> = None;
        let mut attempts = Vec::with_capacity(total);

        while let Some(joined) = set.join_next().await {
            let (mut attempt, conn) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(error = %e, "dial attempt task failed");
                    continue;
                }
            };

            if let Some(conn) = conn {
                if winner.is_none() {
                    scope.cancel();
                    attempt.mark_winner();
                    tracing::debug!(
                        index = attempt.index(),
                        candidate = %attempt.candidate(),
                        "race won"
                    );
                    winner = Some(conn);
                } else {
                    attempt.mark_discarded();
                    if let Err(e) = conn.close().await {
                        tracing::trace!(
                            index = attempt.index(),
                            error = %e,
                            "close of late connection failed"
                        );
                    }
                    tracing::debug!(index = attempt.index(), "closed late connection");
                }
            }
            attempts.push(attempt);
        }
        // Every attempt is terminal here; stopping the child only detaches it.
        scope.cancel();
        record_lost_attempts(&mut attempts, candidates);
        attempts.sort_by_key(DialAttempt::index);

        let result = match winner {
            Some(conn) => Ok(conn),
            None => {
                let err = classify_failure(parent, &attempts);
                tracing::debug!(error = %err, "race lost");
                Err(err)
            }
        };
        RaceReport { result, attempts }
    }
}

/// One attempt, run on its own task. A panicking connector or resolver
/// fails the attempt instead of the race.
async fn run_attempt(
    dialer: Dialer,
    scope: ExecutionScope,
    index: usize,
    candidate: Candidate,
) -> (DialAttempt, Option<Connection>) {
    let mut attempt = DialAttempt::start(index, candidate);
    let dial = dialer.dial_candidate(&scope, attempt.candidate());
    let result = match AssertUnwindSafe(dial).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(index, "dial attempt panicked");
            Err(NetError::ConnectionAborted)
        }
    };
    let conn = attempt.finish(result);
    (attempt, conn)
}

/// Give every candidate whose task ended without reporting a failed record,
/// so the report always holds one attempt per candidate.
fn record_lost_attempts(attempts: &mut Vec<DialAttempt>, candidates: Vec<Candidate>) {
    if attempts.len() == candidates.len() {
        return;
    }
    let reported: HashSet<usize> = attempts.iter().map(DialAttempt::index).collect();
    for (index, candidate) in candidates.into_iter().enumerate() {
        if !reported.contains(&index) {
            let mut attempt = DialAttempt::start(index, candidate);
            attempt.finish(Err(NetError::ConnectionAborted));
            attempts.push(attempt);
        }
    }
}

/// A stopped parent scope explains the failure better than the individual
/// errors, but only when it actually cut an attempt short.
fn classify_failure(parent: &ExecutionScope, attempts: &[DialAttempt]) -> NetError {
    let cut_short = attempts
        .iter()
        .filter_map(DialAttempt::error)
        .any(|e| matches!(e, NetError::TimedOut | NetError::Canceled));
    if cut_short {
        if let Some(reason) = parent.err() {
            return reason.into_error();
        }
    }

    let errors = attempts.iter().filter_map(|a| a.error().cloned());
    NetError::AllAttemptsFailed {
        errors: errors.collect(),
    }
}
