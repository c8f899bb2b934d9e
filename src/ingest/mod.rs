// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

use crate::error::FetchError;
use crate::ingest::types::{FetchConfig, Item, SourceAdapter};

/// One-time metrics registration (so series show up in the exposition dump).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "promo_fetch_attempts_total",
            "Adapter fetch calls, retries included."
        );
        describe_counter!("promo_fetch_errors_total", "Failed adapter fetch calls.");
        describe_counter!(
            "promo_sources_skipped_total",
            "Sources skipped after permanent error or exhausted retries."
        );
        describe_counter!(
            "promo_items_kept_total",
            "Items kept after keyword and recency filtering."
        );
        describe_counter!(
            "promo_items_stale_total",
            "Keyword-matching items dropped by the recency window."
        );
        describe_counter!("promo_new_items_total", "Items not present in the baseline.");
        describe_counter!("promo_notifications_total", "Messages handed to the notifier.");
        describe_histogram!("promo_fetch_ms", "Adapter fetch time in milliseconds.");
        describe_histogram!("promo_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("promo_silent_runs", "Consecutive runs without new items.");
        describe_gauge!("promo_last_run_ts", "Unix ts when the detector last ran.");
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Fallback identity for items without a stable URL or guid.
pub fn content_digest(source_id: &str, text: &str) -> String {
    let mut h = Sha256::new();
    h.update(source_id.as_bytes());
    h.update([0u8]);
    h.update(text.as_bytes());
    format!("sha256:{:x}", h.finalize())
}

/// Keyword filter + recency window over one source's newest-first sequence.
/// Scanning stops at the first matching item outside the window.
/// Returns (kept, stale_count); stale counts only keyword matches cut off by the window.
pub fn filter_recent(cfg: &FetchConfig, raw: Vec<Item>, now: DateTime<Utc>) -> (Vec<Item>, usize) {
    let window = cfg.recency_window();
    let mut kept = Vec::with_capacity(raw.len());

    let mut matching = raw.into_iter().filter(|it| cfg.matches_keywords(&it.content));
    while let Some(it) = matching.next() {
        if now.signed_duration_since(it.timestamp) > window {
            return (kept, 1 + matching.count());
        }
        kept.push(it);
    }
    (kept, 0)
}

#[derive(Debug, Default)]
pub struct FetchReport {
    /// Aggregate over all sources that answered, in config order.
    pub items: Vec<Item>,
    /// Ids of sources skipped after a permanent error or exhausted retries.
    pub skipped: Vec<String>,
    pub stale: usize,
}

impl FetchReport {
    pub fn all_failed(&self, configured: usize) -> bool {
        configured > 0 && self.skipped.len() >= configured
    }
}

/// Retry one source's fetch with exponential backoff. Permanent errors return at once.
async fn fetch_with_retry(
    adapter: &dyn SourceAdapter,
    cfg: &FetchConfig,
) -> Result<Vec<Item>, FetchError> {
    let max_attempts = cfg.retry.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        counter!("promo_fetch_attempts_total").increment(1);

        let t0 = Instant::now();
        let res = adapter.fetch(cfg).await;
        histogram!("promo_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let err = match res {
            Ok(items) => return Ok(items),
            Err(e) => e,
        };
        counter!("promo_fetch_errors_total").increment(1);

        if !err.is_transient() || attempt >= max_attempts {
            return Err(err);
        }

        let wait = cfg.retry.backoff_for(attempt);
        tracing::warn!(
            target: "ingest",
            source = %cfg.id,
            attempt,
            max_attempts,
            wait_ms = wait.as_millis() as u64,
            error = %err,
            "fetch failed, backing off"
        );
        tokio::time::sleep(wait).await;
    }
}

/// Fetch every configured source one at a time and aggregate what passes the filters.
/// A failing source is logged and skipped; it never aborts the batch.
pub async fn fetch_all(
    adapter: &dyn SourceAdapter,
    configs: &[FetchConfig],
    now: DateTime<Utc>,
) -> FetchReport {
    ensure_metrics_described();

    let mut report = FetchReport::default();
    for cfg in configs {
        match fetch_with_retry(adapter, cfg).await {
            Ok(raw) => {
                let raw_len = raw.len();
                let (kept, stale) = filter_recent(cfg, raw, now);
                tracing::info!(
                    target: "ingest",
                    source = %cfg.id,
                    adapter = adapter.name(),
                    raw = raw_len,
                    kept = kept.len(),
                    stale,
                    "source fetched"
                );
                counter!("promo_items_kept_total").increment(kept.len() as u64);
                counter!("promo_items_stale_total").increment(stale as u64);
                report.stale += stale;

                for it in kept {
                    report.items.push(it);
                    tokio::time::sleep(cfg.item_delay()).await;
                }
            }
            Err(e) => {
                tracing::error!(target: "ingest", source = %cfg.id, error = %e, "source skipped");
                counter!("promo_sources_skipped_total").increment(1);
                report.skipped.push(cfg.id.clone());
            }
        }
        tokio::time::sleep(cfg.source_delay()).await;
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{RetryPolicy, SourceKind};
    use chrono::{Duration, TimeZone};

    fn cfg(window_secs: u64) -> FetchConfig {
        FetchConfig {
            id: "insta".into(),
            kind: SourceKind::Feed,
            target: "https://example.com/feed".into(),
            recency_window_secs: window_secs,
            item_delay_ms: 0,
            source_delay_ms: 0,
            retry: RetryPolicy::default(),
            keywords: vec![],
        }
    }

    fn item(key: &str, ts: DateTime<Utc>) -> Item {
        Item {
            source_id: "insta".into(),
            identity_key: key.into(),
            content: format!("post {key}"),
            timestamp: ts,
            url: None,
        }
    }

    #[test]
    fn normalize_text_collapses_ws_and_tags() {
        let s = "  <b>20%&nbsp;off</b>\n\n  everything  ";
        assert_eq!(normalize_text(s), "20% off everything");
    }

    #[test]
    fn digest_depends_on_source() {
        assert_ne!(content_digest("a", "sale"), content_digest("b", "sale"));
        assert_eq!(content_digest("a", "sale"), content_digest("a", "sale"));
    }

    #[test]
    fn recency_scan_stops_at_first_stale_item() {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
        let raw = vec![
            item("p3", now - Duration::hours(1)),
            item("p2", now - Duration::hours(30)),
            item("p1", now - Duration::hours(2)),
        ];
        let (kept, stale) = filter_recent(&cfg(24 * 3600), raw, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].identity_key, "p3");
        assert_eq!(stale, 2);
    }

    #[test]
    fn item_exactly_at_window_edge_is_kept() {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
        let raw = vec![item("edge", now - Duration::seconds(600))];
        let (kept, stale) = filter_recent(&cfg(600), raw, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(stale, 0);
    }

    #[test]
    fn off_keyword_items_are_not_counted_stale() {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
        let mut c = cfg(24 * 3600);
        c.keywords = vec!["post".into()];
        let mut off_topic = item("o1", now - Duration::hours(40));
        off_topic.content = "behind the scenes".into();
        let raw = vec![
            item("p3", now - Duration::hours(1)),
            item("p2", now - Duration::hours(30)),
            off_topic,
            item("p1", now - Duration::hours(50)),
        ];
        let (kept, stale) = filter_recent(&c, raw, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(stale, 2);
    }
}
