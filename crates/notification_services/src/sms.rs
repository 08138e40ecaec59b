use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::service::NotificationChannel;
use crate::types::{NotificationError, SmsConfig};

/// Sends the report through a Twilio-compatible SMS gateway, one message
/// per configured recipient.
#[derive(Debug)]
pub struct SmsNotifier {
    client: Client,
    config: SmsConfig,
}

#[derive(Debug, Deserialize)]
struct BalancePayload {
    balance: String,
    currency: String,
}

impl SmsNotifier {
    /// Build a notifier for the configured gateway account.
    pub fn new(config: SmsConfig) -> Result<Self, NotificationError> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            return Err(NotificationError::Config(
                "SMS gateway credentials are not configured".to_string(),
            ));
        }
        if config.from.is_empty() || config.recipients.is_empty() {
            return Err(NotificationError::Config(
                "SMS sender number and at least one recipient are required".to_string(),
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

    async fn check_balance(&self) -> Result<(), NotificationError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Balance.json",
            self.config.api_base, self.config.account_sid
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
            .await
            .map_err(|e| NotificationError::Sms(format!("Balance request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(NotificationError::Sms(format!(
                "Balance check returned HTTP {}",
                response.status()
            )));
        }

        let payload: BalancePayload = response
            .json()
            .await
            .map_err(|e| NotificationError::Sms(format!("Unreadable balance response: {e}")))?;

        let balance: f64 = payload.balance.parse().map_err(|e| {
            NotificationError::Sms(format!("Bad balance {:?}: {e}", payload.balance))
        })?;

        if balance < self.config.low_balance_threshold {
            warn!(
                "SMS account balance is low: {} {}",
                payload.balance, payload.currency
            );
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for SmsNotifier {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base, self.config.account_sid
        );

        for recipient in &self.config.recipients {
            debug!("Sending SMS to {}", recipient);

            let response = self
                .client
                .post(&url)
                .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
                .form(&[
                    ("To", recipient.as_str()),
                    ("From", self.config.from.as_str()),
                    ("Body", text),
                ])
                .send()
                .await
                .map_err(|e| NotificationError::Sms(format!("Request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(NotificationError::Sms(format!(
                    "HTTP {} sending to {}",
                    response.status(),
                    recipient
                )));
            }
        }

        // Messages are already out at this point; balance trouble only warns.
        if let Err(e) = self.check_balance().await {
            warn!("Balance check failed: {}", e);
        }
        Ok(())
    }
}
