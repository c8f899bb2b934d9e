//! Error types at the engine seams.
//! Config loading and the binary edge use `anyhow`; these are the typed
//! failures the detector has to branch on.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of one `SourceAdapter::fetch` call.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network hiccup, 5xx, 429, timeout: worth retrying.
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// Bad target, 4xx, unparseable payload: retrying will not help.
    #[error("permanent fetch error: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let permanent = e.is_builder()
            || e.is_decode()
            || e.status().is_some_and(|s| {
                s.is_client_error() && s != reqwest::StatusCode::TOO_MANY_REQUESTS
            });
        if permanent {
            FetchError::Permanent(e.to_string())
        } else {
            FetchError::Transient(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt state in {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("encoding state failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("notifier misconfigured: {0}")]
    Config(String),

    #[error("building message failed: {0}")]
    Build(String),

    #[error("delivery failed: {0}")]
    Transport(String),
}

/// Terminal error of one detector run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("all {count} configured sources failed; nothing to compare")]
    AllSourcesFailed { count: usize },

    #[error("state store error")]
    Store(#[from] StoreError),

    #[error("notification failed")]
    Delivery(#[from] DeliveryError),
}
