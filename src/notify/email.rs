use std::time::Duration;

use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::Notifier;
use crate::error::DeliveryError;

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn env_required(key: &str) -> Result<String, DeliveryError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DeliveryError::Config(format!("{key} missing")))
}

impl EmailNotifier {
    /// STARTTLS relay configured from `SMTP_HOST`, `SMTP_PORT` (optional),
    /// `SMTP_USER`, `SMTP_PASS` and `NOTIFY_EMAIL_FROM`.
    pub fn from_env() -> Result<Self, DeliveryError> {
        let host = env_required("SMTP_HOST")?;
        let user = env_required("SMTP_USER")?;
        let pass = env_required("SMTP_PASS")?;
        let from_addr = env_required("NOTIFY_EMAIL_FROM")?;
        let port = match std::env::var("SMTP_PORT") {
            Ok(p) => Some(
                p.trim()
                    .parse::<u16>()
                    .map_err(|_| DeliveryError::Config(format!("invalid SMTP_PORT: {p}")))?,
            ),
            Err(_) => None,
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
            .map_err(|e| DeliveryError::Config(format!("invalid SMTP_HOST: {e}")))?
            .credentials(Credentials::new(user, pass))
            .timeout(Some(Duration::from_secs(30)));
        if let Some(port) = port {
            builder = builder.port(port);
        }

        let from = from_addr
            .parse()
            .map_err(|e| DeliveryError::Config(format!("invalid NOTIFY_EMAIL_FROM: {e}")))?;

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

/// One plain-text message addressed to every recipient.
pub fn build_message(
    from: &Mailbox,
    subject: &str,
    body: &str,
    recipients: &[String],
) -> Result<Message, DeliveryError> {
    if recipients.is_empty() {
        return Err(DeliveryError::Config("no recipients".into()));
    }
    let mut b = Message::builder()
        .from(from.clone())
        .subject(subject)
        .header(header::ContentType::TEXT_PLAIN);
    for r in recipients {
        let to: Mailbox = r
            .parse()
            .map_err(|e| DeliveryError::Build(format!("invalid recipient {r}: {e}")))?;
        b = b.to(to);
    }
    b.body(body.to_string())
        .map_err(|e| DeliveryError::Build(e.to_string()))
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn notify(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<(), DeliveryError> {
        let msg = build_message(&self.from, subject, body, recipients)?;
        self.mailer
            .send(msg)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        tracing::info!(target: "notify", recipients = recipients.len(), subject, "email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_empty_and_bad_recipients() {
        let from: Mailbox = "watcher@example.com".parse().unwrap();
        assert!(matches!(
            build_message(&from, "s", "b", &[]),
            Err(DeliveryError::Config(_))
        ));
        assert!(matches!(
            build_message(&from, "s", "b", &["not an address".into()]),
            Err(DeliveryError::Build(_))
        ));
    }

    #[test]
    fn build_addresses_all_recipients() {
        let from: Mailbox = "watcher@example.com".parse().unwrap();
        let msg = build_message(
            &from,
            "New Promotions Detected",
            "body",
            &["a@example.com".into(), "b@example.com".into()],
        )
        .unwrap();
        assert_eq!(msg.envelope().to().len(), 2);
    }
}
