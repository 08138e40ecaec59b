use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use notification_services::{IftttConfig, SmsConfig, TelegramConfig};
use trailhead_scan::{ApiConfig, CaptchaConfig, NotifyPolicy, ScanCriteria, SessionConfig};

/// Complete runtime configuration, loaded from one TOML file.
///
/// Every section and every field has a default, so an empty or missing
/// file yields a usable (if notification-less) configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Search window, exclusions, and minimum spaces
    pub scan: ScanCriteria,

    /// Upstream endpoints and retry budget
    pub api: ApiConfig,

    /// Session establishment against the permit website
    pub session: SessionConfig,

    /// Anti-Captcha solver account
    pub captcha: CaptchaConfig,

    /// Notification gating and delivery channels
    pub notify: NotifySettings,

    /// Rendered report persistence and display
    pub output: OutputConfig,
}

/// Notification gating plus per-channel settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    /// When notifications fire at all
    #[serde(flatten)]
    pub policy: NotifyPolicy,

    /// Telegram middleman bot channel
    pub telegram: TelegramConfig,

    /// IFTTT webhook channel
    pub ifttt: IftttConfig,

    /// SMS gateway channel
    pub sms: SmsConfig,
}

/// Where the rendered report lives between runs, and how it is displayed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File the rendered report is persisted to
    pub path: PathBuf,

    /// Whether to persist the report at all
    pub persist: bool,

    /// Timezone name used for the "last updated" line
    pub display_timezone: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("trailhead-report.txt"),
            persist: true,
            display_timezone: "America/Los_Angeles".to_string(),
        }
    }
}

impl OutputConfig {
    /// Path the report is persisted to, when persistence is on.
    pub fn persist_path(&self) -> Option<&Path> {
        self.persist.then_some(self.path.as_path())
    }
}

impl TrackerConfig {
    /// Load configuration from `path`. A missing file is not an error;
    /// the built-in defaults cover every field.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "No configuration file at {}; using defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Could not read {}", path.display()));
            }
        };

        toml::from_str(&raw)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }
}
