//! # Notification Services
//!
//! Delivery channels for the rendered availability report. Each channel
//! wraps one messaging backend; `dispatch_all` fans the report out to the
//! enabled channels in order.

/// IFTTT webhook channel.
pub mod ifttt;
/// Channel trait and ordered dispatch.
pub mod service;
/// SMS gateway channel.
pub mod sms;
/// Telegram middleman bot channel.
pub mod telegram;
/// Errors and per-channel configuration.
pub mod types;

pub use ifttt::IftttNotifier;
pub use service::{NotificationChannel, dispatch_all};
pub use sms::SmsNotifier;
pub use telegram::TelegramNotifier;
pub use types::{IftttConfig, NotificationError, SmsConfig, TelegramConfig};
