use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use tracing::{info, warn};

use notification_services::{
    IftttNotifier, NotificationChannel, SmsNotifier, TelegramNotifier, dispatch_all,
};
use trailhead_scan::{
    AntiCaptchaClient, SessionManager, WildTrailsClient, compute_availability,
    decide_notification, load_prior_report, render_report, write_report,
};

use crate::config::{NotifySettings, TrackerConfig};

/// Execute one poll cycle end to end.
pub async fn run_once(config: &TrackerConfig, dry_run: bool) -> anyhow::Result<()> {
    let display_tz: Tz = config.output.display_timezone.parse().map_err(|e| {
        anyhow!(
            "Invalid display timezone {:?}: {e}",
            config.output.display_timezone
        )
    })?;

    let session = SessionManager::new(config.session.clone())?;
    let captcha = AntiCaptchaClient::new(config.captcha.clone())?;
    let mut client = WildTrailsClient::new(config.api.clone(), session, captcha);

    let trailheads = client
        .fetch_trailheads()
        .await
        .context("Could not fetch trailhead metadata")?;
    info!("Loaded {} trailheads", trailheads.len());

    let report = client
        .fetch_report()
        .await
        .context("Could not fetch the reservation report")?;

    let result = compute_availability(&report, &trailheads, &config.scan)?;
    let rendered = render_report(report.updated_at, &result, &trailheads, display_tz)?;
    println!("{rendered}");

    let prior = match config.output.persist_path() {
        Some(path) => load_prior_report(path)?,
        None => None,
    };

    let decision = decide_notification(
        &rendered,
        &result,
        report.updated_at,
        prior.as_deref(),
        &config.notify.policy,
    );

    if dry_run {
        info!("Dry run; skipping persistence and notifications");
        return Ok(());
    }

    if decision.write_output {
        if let Some(path) = config.output.persist_path() {
            write_report(path, &rendered)?;
            info!("Wrote report to {}", path.display());
        }
    }

    if !decision.notify {
        info!("Report unchanged or below the notification bar; not notifying");
        return Ok(());
    }

    let channels = build_channels(&config.notify)?;
    if channels.is_empty() {
        warn!("Notification warranted but no channels are enabled");
        return Ok(());
    }

    dispatch_all(&channels, &rendered).await?;
    info!("Notified {} channels", channels.len());
    Ok(())
}

/// Construct the enabled notification channels in dispatch order.
fn build_channels(notify: &NotifySettings) -> anyhow::Result<Vec<Box<dyn NotificationChannel>>> {
    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

    if notify.telegram.enabled {
        channels.push(Box::new(TelegramNotifier::new(notify.telegram.clone())?));
    }
    if notify.ifttt.enabled {
        channels.push(Box::new(IftttNotifier::new(notify.ifttt.clone())?));
    }
    if notify.sms.enabled {
        channels.push(Box::new(SmsNotifier::new(notify.sms.clone())?));
    }

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_channels_when_none_enabled() {
        let channels = build_channels(&NotifySettings::default()).unwrap();
        assert!(channels.is_empty());
    }

    #[test]
    fn test_enabled_channel_without_credentials_is_an_error() {
        let mut notify = NotifySettings::default();
        notify.telegram.enabled = true;

        assert!(build_channels(&notify).is_err());
    }

    #[test]
    fn test_channels_follow_dispatch_order() {
        let mut notify = NotifySettings::default();
        notify.telegram.enabled = true;
        notify.telegram.recipient_token = "chat-token".to_string();
        notify.ifttt.enabled = true;
        notify.ifttt.event = "permits".to_string();
        notify.ifttt.key = "webhook-key".to_string();

        let channels = build_channels(&notify).unwrap();
        let names: Vec<_> = channels.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["telegram", "ifttt"]);
    }
}
