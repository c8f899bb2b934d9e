// src/baseline.rs
//! Previously seen items, persisted as a JSON array between runs.

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::ingest::types::Item;
use crate::store::{read_optional, write_atomic};

pub const BASELINE_FILE: &str = "baseline.json";

#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(BASELINE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means first run: empty baseline.
    pub async fn load(&self) -> Result<Vec<Item>, StoreError> {
        let Some(raw) = read_optional(&self.path).await? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Replace the persisted baseline with `items`, all or nothing.
    pub async fn save(&self, items: &[Item]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(items)?;
        write_atomic(&self.path, &bytes).await
    }
}
