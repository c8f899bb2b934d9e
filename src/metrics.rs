use std::path::Path;

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::store::write_atomic;

pub const ENV_METRICS_TEXTFILE: &str = "PROMO_METRICS_TEXTFILE";

/// Batch jobs have no scrape endpoint; the snapshot goes to a file picked up by
/// node-exporter's textfile collector.
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    pub fn install() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub async fn write_textfile(&self, path: &Path) -> anyhow::Result<()> {
        write_atomic(path, self.render().as_bytes())
            .await
            .with_context(|| format!("writing metrics to {}", path.display()))
    }
}
