//! Bounded polling for eventually-consistent state
//!
//! `recurse`-style control flow: probe the current state, test a stop
//! predicate, and when it does not hold yet run a continuation that nudges the
//! system forward (click "next page", pick the next filter option). The loop
//! ends on the first true predicate or fails once the deadline passes.
//!
//! ```text
//!   ┌──────────┐   T    ┌───────────┐ false ┌──────────────┐
//!   │  probe   │──────▶│ predicate │──────▶│ continuation │──┐
//!   └──────────┘        └───────────┘       └──────────────┘  │
//!        ▲                    │ true                          │
//!        │                    ▼                               │
//!        │                 Ok(T)          sleep(interval)     │
//!        └──────────────── deadline? ◀────────────────────────┘
//! ```

pub mod error;
pub mod poll;

pub use error::PollError;
pub use poll::{PollConfig, Poller, ProbeErrorPolicy};
