use serde::Deserialize;

/// Errors raised while delivering the report.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Telegram middleman bot errors.
    #[error("Telegram error: {0}")]
    Telegram(String),

    /// IFTTT webhook errors.
    #[error("IFTTT error: {0}")]
    Ifttt(String),

    /// SMS gateway errors.
    #[error("SMS error: {0}")]
    Sms(String),

    /// Missing or unusable channel configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Settings for the Telegram middleman bot channel
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether the channel is active
    pub enabled: bool,

    /// Middleman bot endpoint messages are posted to
    pub url: String,

    /// Recipient token issued by the middleman bot
    pub recipient_token: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "https://apps.muetsch.io/webhook2telegram/api/messages".to_string(),
            recipient_token: String::new(),
        }
    }
}

/// Settings for the IFTTT webhook channel
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IftttConfig {
    /// Whether the channel is active
    pub enabled: bool,

    /// Webhook host
    pub hostname: String,

    /// Event name baked into the trigger URL
    pub event: String,

    /// Webhook maker key
    pub key: String,
}

impl Default for IftttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hostname: "https://maker.ifttt.com".to_string(),
            event: String::new(),
            key: String::new(),
        }
    }
}

/// Settings for the SMS gateway channel
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// Whether the channel is active
    pub enabled: bool,

    /// Gateway API base URL
    pub api_base: String,

    /// Gateway account identifier
    pub account_sid: String,

    /// Gateway auth token
    pub auth_token: String,

    /// Number messages are sent from
    pub from: String,

    /// Numbers that receive the report
    pub recipients: Vec<String>,

    /// Balance below which a warning is logged after sending
    pub low_balance_threshold: f64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "https://api.twilio.com".to_string(),
            account_sid: String::new(),
            auth_token: String::new(),
            from: String::new(),
            recipients: Vec::new(),
            low_balance_threshold: 5.0,
        }
    }
}
