mod smtp;
mod templates;

pub use smtp::SmtpNotifier;
pub use templates::EmailTemplate;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One triggered market rule as it appears in a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule_id: String,
    pub warning: String,
    pub recommendation: String,
}

/// Intraday move of one basket asset. `None` when the asset had no data this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMove {
    pub name: String,
    pub change_percent: Option<f64>,
}

/// A market alert to be dispatched. Several rules may be bundled into one alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub title: String,
    pub rules: Vec<TriggeredRule>,
    pub safe_havens: Vec<AssetMove>,
    pub risk_assets: Vec<AssetMove>,
}

impl Alert {
    pub fn new(
        title: impl Into<String>,
        rules: Vec<TriggeredRule>,
        safe_havens: Vec<AssetMove>,
        risk_assets: Vec<AssetMove>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            title: title.into(),
            rules,
            safe_havens,
            risk_assets,
        }
    }

    /// True when any listed asset fell this session.
    pub fn has_losses(&self) -> bool {
        self.safe_havens
            .iter()
            .chain(&self.risk_assets)
            .any(|a| a.change_percent.is_some_and(|c| c < 0.0))
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for the notification service.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub smtp_tls: SmtpTls,
    pub discord_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let smtp_to = get("NOTIFICATION_EMAIL_TO")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let smtp_tls = match get("SMTP_TLS").unwrap_or_default().to_ascii_lowercase().as_str() {
            "tls" => SmtpTls::Tls,
            "none" => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Self {
            smtp_host: get("SMTP_HOST"),
            smtp_port: get("SMTP_PORT").and_then(|s| s.parse().ok()).unwrap_or(587),
            smtp_username: get("SMTP_USERNAME"),
            smtp_password: get("SMTP_PASSWORD"),
            smtp_from: get("SMTP_FROM_ADDRESS"),
            smtp_to,
            smtp_tls,
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
        }
    }

    pub fn smtp_enabled(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_from.is_some() && !self.smtp_to.is_empty()
    }
}

/// Dispatches alerts to all configured channels.
pub struct NotificationService {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if config.smtp_enabled() {
            match SmtpNotifier::new(config) {
                Ok(notifier) => {
                    tracing::info!(
                        "Email notifications enabled (SMTP -> {} recipients)",
                        config.smtp_to.len()
                    );
                    channels.push(Box::new(notifier));
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP notifier: {}", e);
                }
            }
        }

        if let Some(ref webhook_url) = config.discord_webhook_url {
            channels.push(Box::new(DiscordWebhookNotifier {
                webhook_url: webhook_url.clone(),
                client: reqwest::Client::new(),
            }));
            tracing::info!("Discord webhook notifications enabled");
        }

        if channels.is_empty() {
            tracing::warn!(
                "No notification channels configured (set SMTP_HOST or DISCORD_WEBHOOK_URL); alerts will only be logged"
            );
        }

        Self { channels }
    }

    pub fn with_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Sends to every channel in turn and returns how many accepted the alert.
    /// A failing channel does not stop the others.
    pub async fn send_alert_async(&self, alert: &Alert) -> usize {
        let mut delivered = 0;
        for channel in &self.channels {
            match channel.send(alert).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::debug!("Sent notification via {}", channel.name());
                }
                Err(e) => {
                    tracing::warn!("Failed to send notification via {}: {}", channel.name(), e)
                }
            }
        }
        delivered
    }
}

/// Discord webhook notifier.
struct DiscordWebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let color = if alert.has_losses() { 0xff6600 } else { 0x0099ff };

        let payload = serde_json::json!({
            "embeds": [{
                "title": alert.title,
                "description": EmailTemplate::render_text(alert),
                "color": color,
                "timestamp": alert.timestamp.to_rfc3339(),
            }]
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Discord(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Discord(format!("HTTP {}", response.status())));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}
