//! Error types for E2E scenarios

use std::fmt::Debug;
use std::time::Duration;

use backoffice_recurse::PollError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Timed out after {elapsed:?} waiting for {what} (last observed: {last})")]
    Timeout {
        what: String,
        elapsed: Duration,
        last: String,
    },

    #[error("Request @{0} not observed yet")]
    NotYetObserved(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Fixture not found: {0}")]
    FixtureNotFound(String),

    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidRoute { pattern: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl E2eError {
    /// Timeouts are the expected way a poll gives up; scenarios may assert on them
    pub fn is_timeout(&self) -> bool {
        matches!(self, E2eError::Timeout { .. })
    }
}

impl<T: Debug> From<PollError<T, E2eError>> for E2eError {
    fn from(e: PollError<T, E2eError>) -> Self {
        match e {
            PollError::Timeout {
                label,
                elapsed,
                last,
                last_probe_error,
                ..
            } => {
                let last = match (last, last_probe_error) {
                    (_, Some(err)) => err.to_string(),
                    (Some(value), None) => format!("{:?}", value),
                    (None, None) => "nothing".to_string(),
                };
                E2eError::Timeout {
                    what: label,
                    elapsed,
                    last,
                }
            }
            PollError::Predicate(e) | PollError::Probe(e) | PollError::Continuation(e) => e,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
