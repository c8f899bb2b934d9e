//! # Change Detector
//! One batch run: fetch every source, diff against the persisted baseline,
//! persist the new baseline, notify, then advance the silence counter.
//!
//! Ordering is fixed: the baseline is saved *before* the digest goes out, and
//! the counter is persisted even when delivery fails.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};

use crate::baseline::BaselineStore;
use crate::config::AppConfig;
use crate::diff::diff;
use crate::error::{DeliveryError, RunError};
use crate::ingest::types::{FetchConfig, Item, SourceAdapter};
use crate::ingest::{ensure_metrics_described, fetch_all};
use crate::notify::{digest_message, fallback_message, Notifier};
use crate::silence::{advance, CounterStore, SilenceCounter, DEFAULT_THRESHOLD};

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub recipients: Vec<String>,
    pub silence_threshold: u32,
    pub subject: String,
    pub fallback_subject: String,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            silence_threshold: DEFAULT_THRESHOLD,
            subject: "New Promotions Detected".to_string(),
            fallback_subject: "No new promotions this week".to_string(),
        }
    }
}

/// What one run did.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub fetched: usize,
    pub new_items: Vec<Item>,
    pub skipped_sources: Vec<String>,
    pub silent_runs: u32,
    pub digest_sent: bool,
    pub fallback_sent: bool,
}

pub struct ChangeDetector {
    adapter: Arc<dyn SourceAdapter>,
    notifier: Arc<dyn Notifier>,
    sources: Vec<FetchConfig>,
    baseline: BaselineStore,
    counter: CounterStore,
    settings: DetectorSettings,
}

impl ChangeDetector {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        notifier: Arc<dyn Notifier>,
        sources: Vec<FetchConfig>,
        state_dir: &Path,
        settings: DetectorSettings,
    ) -> Self {
        Self {
            adapter,
            notifier,
            sources,
            baseline: BaselineStore::in_dir(state_dir),
            counter: CounterStore::in_dir(state_dir),
            settings,
        }
    }

    pub fn from_config(
        cfg: &AppConfig,
        adapter: Arc<dyn SourceAdapter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let settings = DetectorSettings {
            recipients: cfg.recipients.clone(),
            silence_threshold: cfg.silence_threshold,
            subject: cfg.subject.clone(),
            fallback_subject: cfg.fallback_subject.clone(),
        };
        Self::new(adapter, notifier, cfg.sources.clone(), &cfg.state_dir, settings)
    }

    async fn load_baseline(&self) -> Vec<Item> {
        match self.baseline.load().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(target: "detector", error = %e, "baseline unreadable, starting empty");
                Vec::new()
            }
        }
    }

    async fn load_counter(&self) -> SilenceCounter {
        match self.counter.load().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "detector", error = %e, "silence counter unreadable, starting at 0");
                SilenceCounter::default()
            }
        }
    }

    async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let res = self
            .notifier
            .notify(subject, body, &self.settings.recipients)
            .await;
        match &res {
            Ok(()) => counter!("promo_notifications_total").increment(1),
            Err(e) => tracing::error!(target: "detector", error = %e, subject, "notification failed"),
        }
        res
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunReport, RunError> {
        ensure_metrics_described();
        gauge!("promo_last_run_ts").set(now.timestamp() as f64);

        let baseline = self.load_baseline().await;
        let silence = self.load_counter().await;

        let fetched = fetch_all(self.adapter.as_ref(), &self.sources, now).await;
        if fetched.all_failed(self.sources.len()) {
            tracing::error!(target: "detector", sources = self.sources.len(), "every source failed");
            return Err(RunError::AllSourcesFailed {
                count: self.sources.len(),
            });
        }

        let new_items = diff(&baseline, &fetched.items);
        counter!("promo_new_items_total").increment(new_items.len() as u64);
        tracing::info!(
            target: "detector",
            baseline = baseline.len(),
            fetched = fetched.items.len(),
            new = new_items.len(),
            skipped = fetched.skipped.len(),
            "diff computed"
        );

        let mut report = RunReport {
            fetched: fetched.items.len(),
            skipped_sources: fetched.skipped,
            ..RunReport::default()
        };
        let mut delivery_err: Option<DeliveryError> = None;

        if !new_items.is_empty() {
            // Collapse repeated keys so the persisted set stays unique.
            let next_baseline = diff(&[], &fetched.items);
            self.baseline.save(&next_baseline).await?;

            let msg = digest_message(&self.settings.subject, &new_items);
            match self.send(&msg.subject, &msg.body).await {
                Ok(()) => report.digest_sent = true,
                Err(e) => delivery_err = Some(e),
            }
        }

        let (next, fire) = advance(silence, !new_items.is_empty(), self.settings.silence_threshold);
        if fire {
            tracing::info!(
                target: "detector",
                threshold = self.settings.silence_threshold,
                "silence threshold reached, sending fallback"
            );
            let msg = fallback_message(&self.settings.fallback_subject, self.settings.silence_threshold);
            match self.send(&msg.subject, &msg.body).await {
                Ok(()) => report.fallback_sent = true,
                Err(e) => {
                    delivery_err.get_or_insert(e);
                }
            }
        }

        if let Err(e) = self.counter.save(next, now).await {
            tracing::error!(target: "detector", error = %e, "persisting silence counter failed");
            if delivery_err.is_none() {
                return Err(e.into());
            }
        }
        gauge!("promo_silent_runs").set(next.silent_runs as f64);

        if let Some(e) = delivery_err {
            return Err(e.into());
        }

        report.silent_runs = next.silent_runs;
        report.new_items = new_items;
        Ok(report)
    }
}
