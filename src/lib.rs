// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod baseline;
pub mod change_detector;
pub mod config;
pub mod diff;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod silence;

mod store;

// ---- Re-exports for stable public API ----
pub use crate::change_detector::{ChangeDetector, DetectorSettings, RunReport};
pub use crate::error::{DeliveryError, FetchError, RunError, StoreError};
pub use crate::ingest::types::{FetchConfig, Item, RetryPolicy, SourceAdapter, SourceKind};
pub use crate::notify::Notifier;

/// `RUST_LOG` fallback. Events are logged under the crate name and the
/// `ingest`, `detector` and `notify` targets; everything else at warn.
pub const DEFAULT_LOG_FILTER: &str = "promo_watch=info,ingest=info,detector=info,notify=info,warn";

#[cfg(test)]
mod tests {
    use super::DEFAULT_LOG_FILTER;
    use tracing_subscriber::EnvFilter;

    #[test]
    fn default_log_filter_parses_and_covers_event_targets() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
        for target in ["promo_watch=info", "ingest=info", "detector=info", "notify=info"] {
            assert!(DEFAULT_LOG_FILTER.split(',').any(|d| d == target), "{target}");
        }
        assert!(DEFAULT_LOG_FILTER.ends_with(",warn"));
    }
}
