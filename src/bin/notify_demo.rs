//! Sends a sample digest through the configured SMTP relay to verify delivery settings.

use chrono::Utc;
use promo_watch::config::load_config_default;
use promo_watch::notify::{digest_message, email::EmailNotifier, Notifier};
use promo_watch::Item;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = load_config_default()?;
    let notifier = EmailNotifier::from_env()?;

    let sample = vec![Item {
        source_id: "demo".into(),
        identity_key: "demo:1".into(),
        content: "Sample promotion: this is a delivery test".into(),
        timestamp: Utc::now(),
        url: None,
    }];
    let msg = digest_message(&format!("[test] {}", cfg.subject), &sample);
    notifier.notify(&msg.subject, &msg.body, &cfg.recipients).await?;

    println!("notify-demo sent to {} recipient(s)", cfg.recipients.len());
    Ok(())
}
