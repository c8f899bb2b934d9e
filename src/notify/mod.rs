pub mod email;

use std::sync::Mutex;

use crate::error::DeliveryError;
use crate::ingest::types::Item;

/// Delivers one message to a fixed recipient list.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: String,
}

/// Digest of new items: one line per item, link underneath when known.
pub fn digest_message(subject: &str, items: &[Item]) -> OutgoingMessage {
    let noun = if items.len() == 1 { "promotion" } else { "promotions" };
    let mut body = format!("{} new {noun} detected:\n\n", items.len());
    for it in items {
        body.push_str(&format!(
            "[{}] {} ({})\n",
            it.source_id,
            it.content,
            it.timestamp.format("%Y-%m-%d %H:%M UTC")
        ));
        if let Some(url) = &it.url {
            body.push_str(&format!("    {url}\n"));
        }
    }
    OutgoingMessage {
        subject: format!("{subject} ({})", items.len()),
        body,
    }
}

/// Summary sent after `quiet_runs` consecutive checks found nothing.
pub fn fallback_message(subject: &str, quiet_runs: u32) -> OutgoingMessage {
    OutgoingMessage {
        subject: subject.to_string(),
        body: format!(
            "No new promotions were detected in the last {quiet_runs} checks.\n\
             The watcher is still running; this is a periodic heartbeat.\n"
        ),
    }
}

// --- Test helper ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

/// Notifier that records every call; optionally fails each one.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SentMessage>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(SentMessage {
            subject: subject.to_string(),
            body: body.to_string(),
            recipients: recipients.to_vec(),
        });
        if self.fail {
            return Err(DeliveryError::Transport("smtp relay refused".into()));
        }
        Ok(())
    }
}
