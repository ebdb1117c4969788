#![forbid(unsafe_code)]

use super::StoreError;
use crate::delta::{CompareOptions, DeltaEngine};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DATABASE_FILE: &str = "revisions.db";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub storage_dir: PathBuf,
    pub database_file: String,
    pub busy_timeout_ms: u64,
    pub max_branch_depth: usize,
    pub max_delta_chain_depth: usize,
    pub max_diff_input_bytes: usize,
    pub diff_deadline_ms: Option<u64>,
    pub verify_deltas: bool,
    pub compare: CompareOptions,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("."),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            busy_timeout_ms: 5_000,
            max_branch_depth: 64,
            max_delta_chain_depth: 100_000,
            max_diff_input_bytes: 64 * 1024 * 1024,
            diff_deadline_ms: None,
            verify_deltas: true,
            compare: CompareOptions::exact(),
        }
    }
}

impl StoreConfig {
    pub fn with_storage_dir(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: storage_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, StoreError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| StoreError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.database_file.trim().is_empty() {
            return Err(StoreError::Config("database_file must not be empty".into()));
        }
        if self.database_file.contains(['/', '\\']) {
            return Err(StoreError::Config(
                "database_file must be a bare file name".into(),
            ));
        }
        if self.busy_timeout_ms == 0 {
            return Err(StoreError::Config("busy_timeout_ms must be positive".into()));
        }
        if self.max_branch_depth == 0 {
            return Err(StoreError::Config("max_branch_depth must be positive".into()));
        }
        if self.max_delta_chain_depth == 0 {
            return Err(StoreError::Config(
                "max_delta_chain_depth must be positive".into(),
            ));
        }
        if self.max_diff_input_bytes == 0 {
            return Err(StoreError::Config(
                "max_diff_input_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(&self.database_file)
    }

    pub(in crate::store) fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub(in crate::store) fn delta_engine(&self) -> DeltaEngine {
        DeltaEngine::new(self.compare)
            .with_max_input_bytes(self.max_diff_input_bytes)
            .with_deadline(self.diff_deadline_ms.map(Duration::from_millis))
            .with_verification(self.verify_deltas)
    }
}
