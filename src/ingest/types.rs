// src/ingest/types.rs
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// One promotional unit as seen on a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub source_id: String,    // config id of the page/profile
    pub identity_key: String, // canonical URL, guid or content digest
    pub content: String,      // normalized caption/title
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Retailer promotion page (HTML).
    Page,
    /// Profile feed exposed as RSS.
    Feed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th failed try (1-based): initial * 2^(attempt-1), capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    pub id: String,
    pub kind: SourceKind,
    pub target: String,
    pub recency_window_secs: u64,
    pub item_delay_ms: u64,
    pub source_delay_ms: u64,
    pub retry: RetryPolicy,
    /// Case-insensitive; empty keeps everything.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl FetchConfig {
    pub fn recency_window(&self) -> chrono::Duration {
        // Capped at ~100 years so the conversion never overflows.
        let secs = self.recency_window_secs.min(3_153_600_000) as i64;
        chrono::Duration::seconds(secs)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.source_delay_ms)
    }

    pub fn matches_keywords(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .any(|k| lower.contains(&k.to_lowercase()))
    }
}

/// Produces the current items for one source, newest first.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, cfg: &FetchConfig) -> Result<Vec<Item>, FetchError>;
    fn name(&self) -> &'static str;
}

// --- Test helper ---

/// Adapter that replays queued responses per source id.
/// An exhausted queue answers with a permanent error.
#[derive(Default)]
pub struct ScriptedAdapter {
    responses: std::sync::Mutex<HashMap<String, VecDeque<Result<Vec<Item>, FetchError>>>>,
    calls: std::sync::Mutex<HashMap<String, usize>>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, source_id: &str, response: Result<Vec<Item>, FetchError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(source_id.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self, source_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(source_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for ScriptedAdapter {
    async fn fetch(&self, cfg: &FetchConfig) -> Result<Vec<Item>, FetchError> {
        *self.calls.lock().unwrap().entry(cfg.id.clone()).or_default() += 1;
        self.responses
            .lock()
            .unwrap()
            .get_mut(&cfg.id)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| {
                Err(FetchError::Permanent(format!(
                    "no scripted response for {}",
                    cfg.id
                )))
            })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
        };
        assert_eq!(p.backoff_for(1), Duration::from_millis(100));
        assert_eq!(p.backoff_for(2), Duration::from_millis(200));
        assert_eq!(p.backoff_for(3), Duration::from_millis(350));
        assert_eq!(p.backoff_for(64), Duration::from_millis(350));
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let cfg = FetchConfig {
            id: "shop".into(),
            kind: SourceKind::Page,
            target: "https://example.com".into(),
            recency_window_secs: 60,
            item_delay_ms: 0,
            source_delay_ms: 0,
            retry: RetryPolicy::default(),
            keywords: vec!["Promotion".into()],
        };
        assert!(cfg.matches_keywords("Big PROMOTION today"));
        assert!(!cfg.matches_keywords("New arrivals"));
    }
}
