use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::templates::EmailTemplate;
use crate::{Alert, NotificationChannel, NotificationConfig, NotificationError, SmtpTls};

const SENDER_NAME: &str = "Market Monitor";
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Mails each alert once to every configured recipient as a plain-text/HTML pair.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_HOST not set".into()))?;
        let sender = config
            .smtp_from
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_FROM_ADDRESS not set".into()))?;
        let from = Mailbox::new(
            Some(SENDER_NAME.to_string()),
            sender
                .parse()
                .map_err(|e| NotificationError::Config(format!("bad sender '{}': {}", sender, e)))?,
        );

        let mut to = Vec::with_capacity(config.smtp_to.len());
        for addr in &config.smtp_to {
            match addr.parse::<Mailbox>() {
                Ok(mailbox) => to.push(mailbox),
                Err(e) => tracing::warn!("Skipping recipient '{}': {}", addr, e),
            }
        }
        if to.is_empty() {
            return Err(NotificationError::Config(
                "NOTIFICATION_EMAIL_TO has no usable address".into(),
            ));
        }

        Ok(Self {
            transport: build_transport(config, host)?,
            from,
            to,
        })
    }

    /// One message addressed to all recipients.
    fn compose(&self, alert: &Alert) -> Result<Message, NotificationError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject(alert));
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .multipart(MultiPart::alternative_plain_html(
                EmailTemplate::render_text(alert),
                EmailTemplate::render(alert),
            ))
            .map_err(|e| NotificationError::Smtp(format!("cannot build message: {}", e)))
    }
}

fn build_transport(
    config: &NotificationConfig,
    host: &str,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
    let builder = match config.smtp_tls {
        SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
        SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
        SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
    }
    .map_err(|e| NotificationError::Smtp(format!("relay {}: {}", host, e)))?
    .port(config.smtp_port)
    .timeout(Some(SEND_TIMEOUT));

    Ok(match (&config.smtp_username, &config.smtp_password) {
        (Some(user), Some(pass)) => builder
            .credentials(Credentials::new(user.clone(), pass.clone()))
            .build(),
        _ => builder.build(),
    })
}

/// `Market Alert` for a single rule, `Market Alert (3 rules)` otherwise.
fn subject(alert: &Alert) -> String {
    match alert.rules.len() {
        0 | 1 => alert.title.clone(),
        n => format!("{} ({} rules)", alert.title, n),
    }
}

#[async_trait]
impl NotificationChannel for SmtpNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let message = self.compose(alert)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Smtp(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
