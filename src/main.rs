//! promo-watch — batch entrypoint.
//! One invocation = one check. Schedule it (cron, systemd timer) without overlap.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use promo_watch::config::load_config_default;
use promo_watch::ingest::providers::HttpAdapter;
use promo_watch::metrics::{Metrics, ENV_METRICS_TEXTFILE};
use promo_watch::notify::email::EmailNotifier;
use promo_watch::{ChangeDetector, DEFAULT_LOG_FILTER};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; `PROMO_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("PROMO_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn run() -> anyhow::Result<()> {
    let metrics = match std::env::var(ENV_METRICS_TEXTFILE) {
        Ok(p) => Some((Metrics::install()?, PathBuf::from(p))),
        Err(_) => None,
    };

    let cfg = load_config_default()?;
    tracing::info!(
        sources = cfg.sources.len(),
        recipients = cfg.recipients.len(),
        state_dir = %cfg.state_dir.display(),
        "config loaded"
    );

    let adapter = HttpAdapter::new(&cfg.user_agent, cfg.http_timeout)?;
    let notifier = EmailNotifier::from_env()?;
    let detector = ChangeDetector::from_config(&cfg, Arc::new(adapter), Arc::new(notifier));

    let outcome = detector.run_once(chrono::Utc::now()).await;

    if let Some((m, path)) = metrics {
        if let Err(e) = m.write_textfile(&path).await {
            tracing::warn!("metrics textfile: {e:#}");
        }
    }

    let report = outcome?;
    tracing::info!(
        fetched = report.fetched,
        new = report.new_items.len(),
        skipped = report.skipped_sources.len(),
        silent_runs = report.silent_runs,
        digest_sent = report.digest_sent,
        fallback_sent = report.fallback_sent,
        "run finished"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("run failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
