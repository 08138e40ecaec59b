use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::service::NotificationChannel;
use crate::types::{IftttConfig, NotificationError};

/// Triggers an IFTTT webhook event carrying the report as `value1`.
#[derive(Debug)]
pub struct IftttNotifier {
    client: Client,
    config: IftttConfig,
}

impl IftttNotifier {
    /// Build a notifier for the configured webhook event.
    pub fn new(config: IftttConfig) -> Result<Self, NotificationError> {
        if config.event.is_empty() || config.key.is_empty() {
            return Err(NotificationError::Config(
                "IFTTT event and key are required".to_string(),
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

    fn trigger_url(&self) -> String {
        format!(
            "{}/trigger/{}/with/key/{}",
            self.config.hostname, self.config.event, self.config.key
        )
    }
}

#[async_trait]
impl NotificationChannel for IftttNotifier {
    fn name(&self) -> &'static str {
        "ifttt"
    }

    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        debug!("Triggering IFTTT event {}", self.config.event);

        // IFTTT renders value1 as HTML, which collapses plain newlines.
        let value1 = text.replace('\n', "<br>");

        let response = self
            .client
            .post(self.trigger_url())
            .form(&[("value1", value1.as_str())])
            .send()
            .await
            .map_err(|e| NotificationError::Ifttt(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(NotificationError::Ifttt(format!(
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
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> IftttConfig {
        IftttConfig {
            enabled: true,
            hostname: server.uri(),
            event: "permits_available".to_string(),
            key: "webhook-key".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_substitutes_line_breaks() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/trigger/permits_available/with/key/webhook-key"))
            .and(body_string_contains("value1=line+one%3Cbr%3Eline+two"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = IftttNotifier::new(test_config(&server)).unwrap();
        notifier.send("line one\nline two").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_surfaces_http_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let notifier = IftttNotifier::new(test_config(&server)).unwrap();
        let err = notifier.send("report").await.unwrap_err();
        assert!(matches!(err, NotificationError::Ifttt(msg) if msg.contains("404")));
    }

    #[test]
    fn test_missing_event_or_key_is_rejected() {
        let err = IftttNotifier::new(IftttConfig::default()).unwrap_err();
        assert!(matches!(err, NotificationError::Config(_)));
    }
}
