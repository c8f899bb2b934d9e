// src/silence.rs
//! Consecutive-empty-run counter that drives the weekly fallback message.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::{read_optional, write_atomic};

pub const SILENCE_FILE: &str = "silence.json";

/// One check per day, so seven empty runs make a quiet week.
pub const DEFAULT_THRESHOLD: u32 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceCounter {
    pub silent_runs: u32,
}

/// Apply one run outcome. Returns the next counter and whether the fallback fires.
/// Firing resets the counter in the same step.
pub fn advance(counter: SilenceCounter, had_new_items: bool, threshold: u32) -> (SilenceCounter, bool) {
    if had_new_items {
        return (SilenceCounter::default(), false);
    }
    let n = counter.silent_runs.saturating_add(1);
    if n >= threshold.max(1) {
        (SilenceCounter::default(), true)
    } else {
        (SilenceCounter { silent_runs: n }, false)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CounterRecord {
    silent_runs: u32,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CounterStore {
    path: PathBuf,
}

impl CounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(SILENCE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absent state equals zero. A bare integer is accepted too.
    pub async fn load(&self) -> Result<SilenceCounter, StoreError> {
        let Some(raw) = read_optional(&self.path).await? else {
            return Ok(SilenceCounter::default());
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(SilenceCounter::default());
        }
        if let Ok(n) = raw.parse::<u32>() {
            return Ok(SilenceCounter { silent_runs: n });
        }
        serde_json::from_str::<CounterRecord>(raw)
            .map(|r| SilenceCounter {
                silent_runs: r.silent_runs,
            })
            .map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    pub async fn save(&self, counter: SilenceCounter, now: DateTime<Utc>) -> Result<(), StoreError> {
        let rec = CounterRecord {
            silent_runs: counter.silent_runs,
            updated_at: Some(now),
        };
        write_atomic(&self.path, &serde_json::to_vec_pretty(&rec)?).await
    }
}
