//! Per-scenario test context
//!
//! Everything a scenario touches (backend stubs, fixtures, poll budgets) hangs
//! off a `TestContext` built right before the scenario and torn down right
//! after it. Clones share the same interceptor.

use std::sync::Arc;

use backoffice_recurse::{PollConfig, Poller};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{PollBudgets, SuiteConfig};
use crate::error::E2eResult;
use crate::fixtures::Fixtures;
use crate::intercept::{Exchange, Interceptor, Route};

/// Which poll budget a flow draws on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Pagination,
    Filters,
    AliasWait,
}

#[derive(Debug, Clone)]
pub struct TestContext {
    scenario: String,
    base_url: String,
    interceptor: Arc<Interceptor>,
    fixtures: Arc<Fixtures>,
    budgets: PollBudgets,
}

impl TestContext {
    /// Build a fresh context, loading fixtures from the suite's directory
    pub fn new(scenario: &str, config: &SuiteConfig) -> E2eResult<Self> {
        let fixtures = Fixtures::load(&config.fixtures_dir)?;
        Ok(Self::with_fixtures(scenario, config, fixtures))
    }

    pub fn with_fixtures(scenario: &str, config: &SuiteConfig, fixtures: Fixtures) -> Self {
        debug!(scenario, fixtures = fixtures.len(), "Creating test context");
        Self {
            scenario: scenario.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            interceptor: Arc::new(Interceptor::new()),
            fixtures: Arc::new(fixtures),
            budgets: config.poll.clone(),
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a dashboard path such as `/home/balance`
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.interceptor
    }

    pub fn intercept(&self, route: Route) {
        self.interceptor.route(route);
    }

    pub fn fixture<T: DeserializeOwned>(&self, name: &str) -> E2eResult<T> {
        self.fixtures.get(name)
    }

    pub fn poll_config(&self, flow: Flow) -> &PollConfig {
        match flow {
            Flow::Pagination => &self.budgets.pagination,
            Flow::Filters => &self.budgets.filters,
            Flow::AliasWait => &self.budgets.alias_wait,
        }
    }

    pub fn poller(&self, flow: Flow, label: impl Into<String>) -> Poller {
        Poller::new(label, self.poll_config(flow).clone())
    }

    /// Next exchange recorded under `alias`, within the alias-wait budget
    pub async fn wait(&self, alias: &str) -> E2eResult<Exchange> {
        self.interceptor
            .wait(alias, self.poll_config(Flow::AliasWait))
            .await
    }

    /// Drop every route and recorded exchange
    pub fn teardown(&self) {
        debug!(scenario = %self.scenario, "Tearing down test context");
        self.interceptor.reset();
    }
}
