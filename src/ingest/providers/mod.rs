// src/ingest/providers/mod.rs
pub mod feed;
pub mod page;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::FetchError;
use crate::ingest::types::{FetchConfig, Item, SourceAdapter, SourceKind};

/// HTTP adapter for both source kinds. The client timeout bounds every call.
#[derive(Clone)]
pub struct HttpAdapter {
    client: reqwest::Client,
}

impl HttpAdapter {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl SourceAdapter for HttpAdapter {
    async fn fetch(&self, cfg: &FetchConfig) -> Result<Vec<Item>, FetchError> {
        let body = self.get_text(&cfg.target).await?;
        let fetched_at = Utc::now();
        match cfg.kind {
            SourceKind::Page => Ok(page::parse_page(&cfg.id, &cfg.target, &body, fetched_at)),
            SourceKind::Feed => feed::parse_feed(&cfg.id, &body, fetched_at),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
