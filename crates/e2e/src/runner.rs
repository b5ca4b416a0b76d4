//! Scenario runner: fresh context per scenario, aggregated results

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::{FutureExt, LocalBoxFuture};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::SuiteConfig;
use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::fixtures::Fixtures;

type ScenarioFn = Box<dyn Fn(TestContext) -> LocalBoxFuture<'static, E2eResult<()>>>;

struct Scenario {
    name: String,
    tags: Vec<String>,
    run: ScenarioFn,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    /// Failed because a poll or wait ran out of time
    pub timed_out: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

/// Registry of named scenarios sharing one suite configuration
pub struct ScenarioRunner {
    config: SuiteConfig,
    fixtures: Option<Fixtures>,
    scenarios: Vec<Scenario>,
}

impl ScenarioRunner {
    pub fn new(config: SuiteConfig) -> Self {
        Self {
            config,
            fixtures: None,
            scenarios: Vec::new(),
        }
    }

    /// Use these fixtures instead of reading `fixtures_dir`
    pub fn with_fixtures(mut self, fixtures: Fixtures) -> Self {
        self.fixtures = Some(fixtures);
        self
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Register a scenario under `name`
    pub fn scenario<F, Fut>(&mut self, name: &str, tags: &[&str], f: F) -> &mut Self
    where
        F: Fn(TestContext) -> Fut + 'static,
        Fut: Future<Output = E2eResult<()>> + 'static,
    {
        self.scenarios.push(Scenario {
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            run: Box::new(move |ctx| f(ctx).boxed_local()),
        });
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        self.run_matching(|_| true).await
    }

    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        self.run_matching(|s| s.tags.iter().any(|t| t == tag)).await
    }

    /// Run a specific scenario by name
    pub async fn run_test(&self, name: &str) -> E2eResult<TestResult> {
        let scenario = self
            .scenarios
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::StepFailed {
                step: format!("run:{}", name),
                reason: "no scenario registered under this name".to_string(),
            })?;
        self.run_scenario(scenario).await
    }

    async fn run_matching<F>(&self, filter: F) -> E2eResult<TestSuiteResult>
    where
        F: Fn(&Scenario) -> bool,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let selected: Vec<&Scenario> = self.scenarios.iter().filter(|s| filter(s)).collect();

        info!("Running {} scenario(s)...", selected.len());

        let mut results = Vec::with_capacity(selected.len());
        let mut passed = 0;
        let mut failed = 0;

        for scenario in selected {
            match self.run_scenario(scenario).await {
                Ok(result) => {
                    if result.success {
                        passed += 1;
                        info!("✓ {} ({} ms)", result.name, result.duration_ms);
                    } else {
                        failed += 1;
                        error!(
                            "✗ {} - {}",
                            result.name,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    results.push(result);
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} - {}", scenario.name, e);
                    results.push(TestResult {
                        name: scenario.name.clone(),
                        success: false,
                        timed_out: false,
                        duration_ms: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        Ok(TestSuiteResult {
            started_at,
            total: results.len(),
            passed,
            failed,
            duration_ms,
            results,
        })
    }

    /// Scenario errors become a failed result; `Err` means the context could
    /// not be built
    async fn run_scenario(&self, scenario: &Scenario) -> E2eResult<TestResult> {
        let ctx = match &self.fixtures {
            Some(fixtures) => TestContext::with_fixtures(&scenario.name, &self.config, fixtures.clone()),
            None => TestContext::new(&scenario.name, &self.config)?,
        };

        debug!("Running scenario: {}", scenario.name);
        let start = Instant::now();
        let outcome = (scenario.run)(ctx.clone()).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        ctx.teardown();

        Ok(TestResult {
            name: scenario.name.clone(),
            success: outcome.is_ok(),
            timed_out: outcome.as_ref().err().map(E2eError::is_timeout).unwrap_or(false),
            duration_ms,
            error: outcome.err().map(|e| e.to_string()),
        })
    }

    /// Write suite results to `test-results.json` under the output directory
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
