use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::service::NotificationChannel;
use crate::types::{NotificationError, TelegramConfig};

/// Posts the report to a webhook2telegram middleman bot.
///
/// The middleman relays the message to whichever Telegram chat the
/// recipient token was issued for.
#[derive(Debug)]
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    /// Build a notifier for the configured middleman endpoint.
    pub fn new(config: TelegramConfig) -> Result<Self, NotificationError> {
        if config.recipient_token.is_empty() {
            return Err(NotificationError::Config(
                "Telegram recipient token is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                NotificationError::Config(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl NotificationChannel for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        debug!("Posting report to {}", self.config.url);

        let payload = json!({
            "recipient_token": self.config.recipient_token,
            "text": text,
            "origin": "trailhead-tracker",
        });

        let response = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Telegram(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(NotificationError::Telegram(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> TelegramConfig {
        TelegramConfig {
            enabled: true,
            url: format!("{}/api/messages", server.uri()),
            recipient_token: "chat-token".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_middleman_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/messages"))
            .and(body_partial_json(json!({
                "recipient_token": "chat-token",
                "text": "2 permits for Happy Isles",
                "origin": "trailhead-tracker"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(test_config(&server)).unwrap();
        notifier.send("2 permits for Happy Isles").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_surfaces_http_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/messages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(test_config(&server)).unwrap();
        let err = notifier.send("report").await.unwrap_err();
        assert!(matches!(err, NotificationError::Telegram(msg) if msg.contains("500")));
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let err = TelegramNotifier::new(TelegramConfig::default()).unwrap_err();
        assert!(matches!(err, NotificationError::Config(_)));
    }
}
