//! JSON fixtures shared by a suite

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// Fixture documents keyed by file stem (`users.json` is `users`)
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    entries: HashMap<String, Value>,
}

impl Fixtures {
    /// Load every `*.json` file under `dir`. A missing directory yields an
    /// empty set.
    pub fn load(dir: &Path) -> E2eResult<Self> {
        let mut entries = HashMap::new();
        if !dir.exists() {
            debug!("No fixtures directory at {}", dir.display());
            return Ok(Self { entries });
        }

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "json")
                    .unwrap_or(false)
            })
        {
            let Some(stem) = entry.path().file_stem() else {
                continue;
            };
            let content = std::fs::read_to_string(entry.path())?;
            let value: Value = serde_json::from_str(&content)?;
            entries.insert(stem.to_string_lossy().to_string(), value);
        }

        debug!("Loaded {} fixture(s) from {}", entries.len(), dir.display());
        Ok(Self { entries })
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    pub fn raw(&self, name: &str) -> E2eResult<&Value> {
        self.entries
            .get(name.trim_end_matches(".json"))
            .ok_or_else(|| E2eError::FixtureNotFound(name.to_string()))
    }

    /// Typed view of a fixture. Accepts `users` or `users.json`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> E2eResult<T> {
        let value = self.raw(name)?.clone();
        Ok(serde_json::from_value(value)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
