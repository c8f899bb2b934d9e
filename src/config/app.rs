// src/config/app.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::types::{FetchConfig, RetryPolicy, SourceKind};
use crate::silence::DEFAULT_THRESHOLD;

pub const ENV_CONFIG_PATH: &str = "PROMO_CONFIG_PATH";
pub const ENV_RECIPIENTS: &str = "NOTIFY_EMAIL_TO";

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}
fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}
fn default_subject() -> String {
    "New Promotions Detected".to_string()
}
fn default_fallback_subject() -> String {
    "No new promotions this week".to_string()
}
fn default_user_agent() -> String {
    concat!("promo-watch/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_http_timeout_secs() -> u64 {
    20
}

// Per-source fallbacks when neither the source nor [defaults] set a value.
const FALLBACK_RECENCY_SECS: u64 = 7 * 24 * 3600;
const FALLBACK_ITEM_DELAY_MS: u64 = 2_000;
const FALLBACK_SOURCE_DELAY_MS: u64 = 10_000;

#[derive(Debug, Clone, Default, Deserialize)]
struct RawRetry {
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SourceOverrides {
    recency_window_secs: Option<u64>,
    item_delay_ms: Option<u64>,
    source_delay_ms: Option<u64>,
    retry: Option<RawRetry>,
    keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSource {
    id: String,
    kind: SourceKind,
    target: String,
    recency_window_secs: Option<u64>,
    item_delay_ms: Option<u64>,
    source_delay_ms: Option<u64>,
    retry: Option<RawRetry>,
    keywords: Option<Vec<String>>,
}

impl RawSource {
    fn overrides(&self) -> SourceOverrides {
        SourceOverrides {
            recency_window_secs: self.recency_window_secs,
            item_delay_ms: self.item_delay_ms,
            source_delay_ms: self.source_delay_ms,
            retry: self.retry.clone(),
            keywords: self.keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(default = "default_state_dir")]
    state_dir: PathBuf,
    #[serde(default)]
    recipients: Vec<String>,
    #[serde(default = "default_threshold")]
    silence_threshold: u32,
    #[serde(default = "default_subject")]
    subject: String,
    #[serde(default = "default_fallback_subject")]
    fallback_subject: String,
    #[serde(default = "default_user_agent")]
    user_agent: String,
    #[serde(default = "default_http_timeout_secs")]
    http_timeout_secs: u64,
    #[serde(default)]
    defaults: SourceOverrides,
    #[serde(default)]
    sources: Vec<RawSource>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub state_dir: PathBuf,
    pub recipients: Vec<String>,
    pub silence_threshold: u32,
    pub subject: String,
    pub fallback_subject: String,
    pub user_agent: String,
    pub http_timeout: Duration,
    pub sources: Vec<FetchConfig>,
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str()).with_context(|| format!("in {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $PROMO_CONFIG_PATH
/// 2) config/promo_watch.toml
/// 3) config/promo_watch.json
pub fn load_config_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
        }
        return load_config_from(&pb);
    }
    for candidate in ["config/promo_watch.toml", "config/promo_watch.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_config_from(&p);
        }
    }
    Err(anyhow!(
        "no config found (set {ENV_CONFIG_PATH} or create config/promo_watch.toml)"
    ))
}

pub fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    let raw: RawConfig = if hint_ext == "json" {
        serde_json::from_str(s).context("parsing JSON config")?
    } else {
        match toml::from_str(s) {
            Ok(v) => v,
            // Unknown extension: give JSON a chance before reporting the TOML error.
            Err(e) if hint_ext != "toml" => {
                serde_json::from_str(s).map_err(|_| anyhow!(e).context("parsing TOML config"))?
            }
            Err(e) => return Err(anyhow!(e).context("parsing TOML config")),
        }
    };
    resolve(raw)
}

fn resolve(raw: RawConfig) -> Result<AppConfig> {
    if raw.sources.is_empty() {
        bail!("at least one [[sources]] entry is required");
    }

    let mut ids = HashSet::new();
    let mut sources = Vec::with_capacity(raw.sources.len());
    for src in raw.sources {
        let id = src.id.trim().to_string();
        if id.is_empty() {
            bail!("source id must not be empty");
        }
        if !ids.insert(id.clone()) {
            bail!("duplicate source id: {id}");
        }
        if src.target.trim().is_empty() {
            bail!("source {id}: target must not be empty");
        }
        let own = src.overrides();
        sources.push(resolve_source(id, src.kind, src.target.trim(), &own, &raw.defaults)?);
    }

    let mut recipients = clean_list(raw.recipients);
    if recipients.is_empty() {
        if let Ok(v) = std::env::var(ENV_RECIPIENTS) {
            recipients = clean_list(v.split(',').map(str::to_string).collect());
        }
    }
    if recipients.is_empty() {
        bail!("no recipients configured (config `recipients` or {ENV_RECIPIENTS})");
    }

    Ok(AppConfig {
        state_dir: raw.state_dir,
        recipients,
        silence_threshold: raw.silence_threshold.max(1),
        subject: raw.subject,
        fallback_subject: raw.fallback_subject,
        user_agent: raw.user_agent,
        http_timeout: Duration::from_secs(raw.http_timeout_secs.max(1)),
        sources,
    })
}

fn resolve_source(
    id: String,
    kind: SourceKind,
    target: &str,
    own: &SourceOverrides,
    defaults: &SourceOverrides,
) -> Result<FetchConfig> {
    let base = RetryPolicy::default();
    let own_retry = own.retry.clone().unwrap_or_default();
    let def_retry = defaults.retry.clone().unwrap_or_default();
    let retry = RetryPolicy {
        max_attempts: own_retry
            .max_attempts
            .or(def_retry.max_attempts)
            .unwrap_or(base.max_attempts),
        initial_backoff_ms: own_retry
            .initial_backoff_ms
            .or(def_retry.initial_backoff_ms)
            .unwrap_or(base.initial_backoff_ms),
        max_backoff_ms: own_retry
            .max_backoff_ms
            .or(def_retry.max_backoff_ms)
            .unwrap_or(base.max_backoff_ms),
    };
    if retry.max_attempts == 0 {
        bail!("source {id}: retry.max_attempts must be at least 1");
    }

    Ok(FetchConfig {
        kind,
        target: target.to_string(),
        recency_window_secs: own
            .recency_window_secs
            .or(defaults.recency_window_secs)
            .unwrap_or(FALLBACK_RECENCY_SECS),
        item_delay_ms: own
            .item_delay_ms
            .or(defaults.item_delay_ms)
            .unwrap_or(FALLBACK_ITEM_DELAY_MS),
        source_delay_ms: own
            .source_delay_ms
            .or(defaults.source_delay_ms)
            .unwrap_or(FALLBACK_SOURCE_DELAY_MS),
        retry,
        keywords: clean_list(
            own.keywords
                .clone()
                .or_else(|| defaults.keywords.clone())
                .unwrap_or_default(),
        ),
        id,
    })
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}
