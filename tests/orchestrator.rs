// tests/orchestrator.rs
use chrono::{DateTime, Duration, TimeZone, Utc};
use promo_watch::ingest::fetch_all;
use promo_watch::ingest::types::ScriptedAdapter;
use promo_watch::{FetchConfig, FetchError, Item, RetryPolicy, SourceKind};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap()
}

fn cfg(id: &str) -> FetchConfig {
    FetchConfig {
        id: id.into(),
        kind: SourceKind::Feed,
        target: format!("https://bridge.example/{id}.rss"),
        recency_window_secs: 24 * 3600,
        item_delay_ms: 0,
        source_delay_ms: 0,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        },
        keywords: vec![],
    }
}

fn item(source: &str, key: &str, age_hours: i64) -> Item {
    Item {
        source_id: source.into(),
        identity_key: key.into(),
        content: format!("promotion {key}"),
        timestamp: now() - Duration::hours(age_hours),
        url: None,
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_transient_source_is_skipped_and_others_survive() {
    let adapter = ScriptedAdapter::new();
    for _ in 0..3 {
        adapter.push("a", Err(FetchError::Transient("503".into())));
    }
    adapter.push("b", Ok(vec![item("b", "b1", 1), item("b", "b2", 2)]));

    let started = tokio::time::Instant::now();
    let report = fetch_all(&adapter, &[cfg("a"), cfg("b")], now()).await;

    assert_eq!(adapter.calls("a"), 3);
    assert_eq!(adapter.calls("b"), 1);
    assert_eq!(report.skipped, vec!["a".to_string()]);
    let keys: Vec<_> = report.items.iter().map(|i| i.identity_key.as_str()).collect();
    assert_eq!(keys, vec!["b1", "b2"]);
    assert!(!report.all_failed(2));
    // 500ms + 1000ms of backoff between the three attempts.
    let waited = started.elapsed();
    assert!(waited >= std::time::Duration::from_millis(1_500), "{waited:?}");
    assert!(waited < std::time::Duration::from_millis(1_600), "{waited:?}");
}

#[tokio::test(start_paused = true)]
async fn transient_then_success_is_retried() {
    let adapter = ScriptedAdapter::new();
    adapter.push("a", Err(FetchError::Transient("timeout".into())));
    adapter.push("a", Ok(vec![item("a", "a1", 0)]));

    let report = fetch_all(&adapter, &[cfg("a")], now()).await;
    assert_eq!(adapter.calls("a"), 2);
    assert!(report.skipped.is_empty());
    assert_eq!(report.items.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn permanent_error_skips_without_retry() {
    let adapter = ScriptedAdapter::new();
    adapter.push("a", Err(FetchError::Permanent("404".into())));
    adapter.push("a", Ok(vec![item("a", "never", 0)]));

    let report = fetch_all(&adapter, &[cfg("a")], now()).await;
    assert_eq!(adapter.calls("a"), 1);
    assert!(report.items.is_empty());
    assert!(report.all_failed(1));
}

#[tokio::test]
async fn stale_items_are_excluded() {
    let adapter = ScriptedAdapter::new();
    adapter.push(
        "a",
        Ok(vec![
            item("a", "fresh", 1),
            item("a", "old", 48),
            item("a", "older", 72),
        ]),
    );

    let report = fetch_all(&adapter, &[cfg("a")], now()).await;
    let keys: Vec<_> = report.items.iter().map(|i| i.identity_key.as_str()).collect();
    assert_eq!(keys, vec!["fresh"]);
    assert_eq!(report.stale, 2);
}

#[tokio::test]
async fn keyword_filter_drops_non_matching_items() {
    let adapter = ScriptedAdapter::new();
    let mut off_topic = item("a", "p2", 1);
    off_topic.content = "Behind the scenes".into();
    adapter.push("a", Ok(vec![item("a", "p1", 1), off_topic, item("a", "p3", 2)]));

    let mut c = cfg("a");
    c.keywords = vec!["PROMOTION".into()];
    let report = fetch_all(&adapter, &[c], now()).await;
    let keys: Vec<_> = report.items.iter().map(|i| i.identity_key.as_str()).collect();
    assert_eq!(keys, vec!["p1", "p3"]);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_pauses_after_items_and_sources() {
    let adapter = ScriptedAdapter::new();
    adapter.push("a", Ok(vec![item("a", "a1", 0), item("a", "a2", 0)]));
    adapter.push("b", Err(FetchError::Permanent("gone".into())));

    let mut a = cfg("a");
    a.item_delay_ms = 100;
    a.source_delay_ms = 1_000;
    let mut b = cfg("b");
    b.source_delay_ms = 1_000;

    let started = tokio::time::Instant::now();
    let report = fetch_all(&adapter, &[a, b], now()).await;

    assert_eq!(report.items.len(), 2);
    // 2 x item pause + one source pause per source, skipped ones included.
    let waited = started.elapsed();
    assert!(waited >= std::time::Duration::from_millis(2_200), "{waited:?}");
    assert!(waited < std::time::Duration::from_millis(2_300), "{waited:?}");
}
