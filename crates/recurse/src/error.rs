//! Error types for poll sequences

use std::time::Duration;
use thiserror::Error;

/// Terminal failure of a poll sequence.
///
/// `Timeout` is the only soft outcome: the awaited condition did not hold
/// within the deadline. Every other variant wraps an error raised by one of
/// the caller's closures and is returned unchanged.
#[derive(Error, Debug)]
pub enum PollError<T, E> {
    #[error("Timed out after {elapsed:?} ({iterations} iterations) waiting for {label}")]
    Timeout {
        label: String,
        elapsed: Duration,
        iterations: usize,
        /// Last successfully probed value, if any probe succeeded
        last: Option<T>,
        /// Last tolerated probe error, if the final probe failed
        last_probe_error: Option<E>,
    },

    #[error("Stop predicate failed: {0}")]
    Predicate(E),

    #[error("Probe failed: {0}")]
    Probe(E),

    #[error("Continuation failed: {0}")]
    Continuation(E),
}

impl<T, E> PollError<T, E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }

    /// Last probed value carried by a timeout
    pub fn last(&self) -> Option<&T> {
        match self {
            PollError::Timeout { last, .. } => last.as_ref(),
            _ => None,
        }
    }

    /// Unwrap the caller's error, or `None` for a timeout
    pub fn into_inner(self) -> Option<E> {
        match self {
            PollError::Predicate(e) | PollError::Probe(e) | PollError::Continuation(e) => Some(e),
            PollError::Timeout { .. } => None,
        }
    }
}
