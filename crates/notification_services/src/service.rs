use async_trait::async_trait;
use tracing::info;

use crate::types::NotificationError;

/// A delivery backend for the rendered availability report.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver the rendered report text.
    async fn send(&self, text: &str) -> Result<(), NotificationError>;
}

/// Send `text` through every channel in order.
///
/// Delivery stops at the first failure so a broken channel is noticed
/// rather than silently skipped.
pub async fn dispatch_all(
    channels: &[Box<dyn NotificationChannel>],
    text: &str,
) -> Result<(), NotificationError> {
    for channel in channels {
        info!("Sending notification via {}", channel.name());
        channel.send(text).await?;
        info!("{} notification delivered", channel.name());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingChannel {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, _text: &str) -> Result<(), NotificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotificationError::Telegram("delivery refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn channel(calls: &Arc<AtomicUsize>, fail: bool) -> Box<dyn NotificationChannel> {
        Box::new(RecordingChannel {
            calls: Arc::clone(calls),
            fail,
        })
    }

    #[tokio::test]
    async fn test_dispatch_reaches_every_channel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let channels = vec![channel(&calls, false), channel(&calls, false)];

        dispatch_all(&channels, "report").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dispatch_stops_at_first_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let channels = vec![
            channel(&calls, false),
            channel(&calls, true),
            channel(&calls, false),
        ];

        let err = dispatch_all(&channels, "report").await.unwrap_err();
        assert!(matches!(err, NotificationError::Telegram(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dispatch_with_no_channels() {
        dispatch_all(&[], "report").await.unwrap();
    }
}
