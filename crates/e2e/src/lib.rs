//! Back-office dashboard E2E harness
//!
//! Scenarios for the login, balance, transaction and exchange-rate screens
//! run against a mocked backend. This crate supplies the plumbing those
//! scenarios share:
//! - A network interceptor that stubs backend replies and records aliased
//!   requests for later waits
//! - A per-scenario `TestContext` (fixtures, interceptor, poll budgets)
//! - Table flows (pagination walk, filter cycling) driven by the bounded
//!   poller from `backoffice-recurse`
//! - A runner that executes registered scenarios and writes JSON results
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ScenarioRunner                                             │
//! │    └── per scenario: TestContext::new() → run → teardown()  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestContext                                                │
//! │    ├── Interceptor   route / handle / wait(@alias)          │
//! │    ├── Fixtures      users.json, balances.json, ...         │
//! │    └── PollBudgets   pagination / filters / alias_wait      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  flows                                                      │
//! │    ├── walk_pages(Paginated, Poller, check)                 │
//! │    └── cycle_filters(FilterMenu, Poller, max, expected)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod fixtures;
pub mod flows;
pub mod intercept;
pub mod runner;

pub use backoffice_recurse::{PollConfig, PollError, Poller, ProbeErrorPolicy};
pub use config::SuiteConfig;
pub use context::{Flow, TestContext};
pub use error::{E2eError, E2eResult};
pub use intercept::{Interceptor, Route};
pub use runner::ScenarioRunner;
