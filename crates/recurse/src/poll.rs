//! The poll loop and its configuration

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::PollError;

/// What a failing probe means to the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorPolicy {
    /// The awaited event has not happened yet; retry until the deadline
    #[default]
    Tolerant,
    /// Abort the sequence with the probe's error
    Strict,
}

/// Timing and error policy for one poll sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Budget for the whole sequence, not per iteration
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum spacing between probes (0 = probe again right away)
    #[serde(default)]
    pub interval_ms: u64,

    #[serde(default)]
    pub probe_errors: ProbeErrorPolicy,
}

fn default_timeout_ms() -> u64 {
    4000
}

fn ceil_millis(duration: Duration) -> u64 {
    let partial = duration.subsec_nanos() % 1_000_000 != 0;
    let millis = duration.as_millis() + u128::from(partial);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            interval_ms: 0,
            probe_errors: ProbeErrorPolicy::default(),
        }
    }
}

impl PollConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Sub-millisecond remainders round up
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = ceil_millis(timeout);
        self
    }

    /// Sub-millisecond remainders round up
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = ceil_millis(interval);
        self
    }

    pub fn with_probe_errors(mut self, policy: ProbeErrorPolicy) -> Self {
        self.probe_errors = policy;
        self
    }
}

/// Runs probe / predicate / continuation cycles until the predicate holds
/// or the deadline passes.
///
/// A `Poller` carries only its label and configuration; every call to
/// [`Poller::until`] or [`Poller::until_with`] starts a fresh sequence. One
/// sequence never overlaps with itself: each iteration is awaited to
/// completion before the next one starts.
#[derive(Debug, Clone)]
pub struct Poller {
    label: String,
    config: PollConfig,
}

impl Poller {
    pub fn new(label: impl Into<String>, config: PollConfig) -> Self {
        Self {
            label: label.into(),
            config,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Probe until `stop` holds, with nothing to do between probes
    pub async fn until<T, E, P, PF, S>(&self, probe: P, stop: S) -> Result<T, PollError<T, E>>
    where
        E: std::fmt::Display,
        P: FnMut() -> PF,
        PF: Future<Output = Result<T, E>>,
        S: FnMut(&T) -> Result<bool, E>,
    {
        self.until_with(probe, stop, |_: &T| std::future::ready(Ok::<(), E>(())))
            .await
    }

    /// Probe until `stop` holds, running `post` after every unsatisfied probe.
    ///
    /// The first iteration always runs, so a zero timeout still gets one
    /// probe. Once the deadline has passed no new iteration is started; an
    /// iteration already in flight finishes first.
    pub async fn until_with<T, E, P, PF, S, C, CF>(
        &self,
        mut probe: P,
        mut stop: S,
        mut post: C,
    ) -> Result<T, PollError<T, E>>
    where
        E: std::fmt::Display,
        P: FnMut() -> PF,
        PF: Future<Output = Result<T, E>>,
        S: FnMut(&T) -> Result<bool, E>,
        C: FnMut(&T) -> CF,
        CF: Future<Output = Result<(), E>>,
    {
        let timeout = self.config.timeout();
        let interval = self.config.interval();
        let start = Instant::now();

        let mut iterations = 0usize;
        let mut last: Option<T> = None;
        let mut last_probe_error: Option<E> = None;

        loop {
            if iterations > 0 && start.elapsed() >= timeout {
                let elapsed = start.elapsed();
                debug!(label = %self.label, iterations, ?elapsed, "Poll deadline exceeded");
                return Err(PollError::Timeout {
                    label: self.label.clone(),
                    elapsed,
                    iterations,
                    last,
                    last_probe_error,
                });
            }
            iterations += 1;

            match probe().await {
                Ok(value) => {
                    last_probe_error = None;

                    match stop(&value) {
                        Ok(true) => {
                            debug!(label = %self.label, iterations, "Poll condition met");
                            return Ok(value);
                        }
                        Ok(false) => {}
                        Err(e) => return Err(PollError::Predicate(e)),
                    }

                    trace!(label = %self.label, iteration = iterations, "Condition not met, continuing");
                    if let Err(e) = post(&value).await {
                        return Err(PollError::Continuation(e));
                    }
                    last = Some(value);
                }
                Err(e) => match self.config.probe_errors {
                    ProbeErrorPolicy::Strict => return Err(PollError::Probe(e)),
                    ProbeErrorPolicy::Tolerant => {
                        debug!(label = %self.label, iteration = iterations, error = %e, "Probe not ready, retrying");
                        last_probe_error = Some(e);
                    }
                },
            }

            let pause = interval.min(timeout.saturating_sub(start.elapsed()));
            if pause.is_zero() {
                // Always-ready probes must not starve the runtime.
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(pause).await;
            }
        }
    }
}
