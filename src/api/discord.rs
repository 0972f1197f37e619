use crate::api::Notifier;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Discord webhook client
#[derive(Clone)]
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, message: &str) {
        let payload = WebhookMessage { content: message };

        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("Discord notification delivered");
            }
            Ok(resp) => {
                tracing::warn!("Discord webhook returned {}", resp.status());
            }
            Err(e) => {
                tracing::warn!("Discord send failed: {}", e);
            }
        }
    }
}

/// Used when no webhook is configured: messages only reach the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) {
        tracing::info!("[NOTIFY] {}", message);
    }
}
