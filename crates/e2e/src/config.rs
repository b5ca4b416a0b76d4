//! Suite configuration parsed from YAML

use std::path::{Path, PathBuf};

use backoffice_recurse::PollConfig;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Settings shared by every scenario in a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Dashboard under test
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Directory of JSON fixtures, keyed by file stem
    #[serde(default = "default_fixtures_dir")]
    pub fixtures_dir: PathBuf,

    /// Where `test-results.json` is written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub poll: PollBudgets,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_fixtures_dir() -> PathBuf {
    PathBuf::from("tests/fixtures")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("test-results")
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fixtures_dir: default_fixtures_dir(),
            output_dir: default_output_dir(),
            poll: PollBudgets::default(),
        }
    }
}

/// Poll budgets per kind of flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollBudgets {
    #[serde(default = "default_pagination")]
    pub pagination: PollConfig,

    #[serde(default = "default_filters")]
    pub filters: PollConfig,

    #[serde(default = "default_alias_wait")]
    pub alias_wait: PollConfig,
}

fn default_pagination() -> PollConfig {
    PollConfig {
        timeout_ms: 60_000,
        interval_ms: 50,
        ..Default::default()
    }
}

fn default_filters() -> PollConfig {
    PollConfig {
        timeout_ms: 200_000,
        interval_ms: 50,
        ..Default::default()
    }
}

fn default_alias_wait() -> PollConfig {
    PollConfig {
        timeout_ms: 100_000,
        interval_ms: 50,
        ..Default::default()
    }
}

impl Default for PollBudgets {
    fn default() -> Self {
        Self {
            pagination: default_pagination(),
            filters: default_filters(),
            alias_wait: default_alias_wait(),
        }
    }
}

impl SuiteConfig {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> E2eResult<()> {
        if self.base_url.is_empty() {
            return Err(E2eError::Config("base_url must not be empty".to_string()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(E2eError::Config(format!(
                "base_url must be an http(s) URL: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}
