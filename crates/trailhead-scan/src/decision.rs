use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::scan_types::*;

/// Report-date floor below which notifications are suppressed; refreshes
/// older than this are presumed stale upstream test data.
pub const DEFAULT_MIN_REPORT_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2019, 1, 1) {
    Some(date) => date,
    None => NaiveDate::MIN,
};

/// Gating rules for turning a changed report into a notification
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyPolicy {
    /// Reports refreshed before this date never notify
    pub min_report_date: NaiveDate,

    /// Whether an empty report is still worth announcing
    pub notify_if_no_permits: bool,
}

impl Default for NotifyPolicy {
    fn default() -> Self {
        Self {
            min_report_date: DEFAULT_MIN_REPORT_DATE,
            notify_if_no_permits: false,
        }
    }
}

/// Outcome of comparing a freshly rendered report with the prior one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationDecision {
    /// Whether the persisted output file should be rewritten
    pub write_output: bool,

    /// Whether notification channels should fire
    pub notify: bool,
}

/// Decide whether this run's report warrants writing and notifying.
///
/// The rendered text is compared byte-for-byte with the prior persisted
/// text; an unchanged report never re-notifies, no matter how much
/// availability it shows. A missing prior text reads as "first run".
pub fn decide_notification(
    rendered: &str,
    result: &AvailabilityResult,
    timestamp: ReportTimestamp,
    prior: Option<&str>,
    policy: &NotifyPolicy,
) -> NotificationDecision {
    let write_output = match prior {
        None => true,
        Some(prior) => rendered != prior,
    };

    let notify = (!result.is_empty() || policy.notify_if_no_permits)
        && write_output
        && timestamp.date() >= policy.min_report_date;

    debug!(
        "Notification decision: write_output={}, notify={}",
        write_output, notify
    );
    NotificationDecision { write_output, notify }
}

/// Read the previously persisted report text, if any.
///
/// A missing file is the ordinary first-run case, not an error.
pub fn load_prior_report(path: &Path) -> Result<Option<String>, ScanError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replace the persisted report wholesale with this run's rendering.
pub fn write_report(path: &Path, rendered: &str) -> Result<(), ScanError> {
    fs::write(path, rendered)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> ReportTimestamp {
        ReportTimestamp::from_naive_pacific(raw.parse().unwrap()).unwrap()
    }

    fn nonempty_result() -> AvailabilityResult {
        let mut result = AvailabilityResult::default();
        result.push(
            "2021-06-15".parse().unwrap(),
            AvailabilitySlot {
                trailhead_id: "sunrise-lakes".to_string(),
                available: 3,
            },
        );
        result
    }

    #[test]
    fn test_first_run_writes_and_notifies() {
        let decision = decide_notification(
            "fresh text",
            &nonempty_result(),
            ts("2021-06-20T11:00:00"),
            None,
            &NotifyPolicy::default(),
        );
        assert!(decision.write_output);
        assert!(decision.notify);
    }

    #[test]
    fn test_unchanged_text_never_renotifies() {
        let decision = decide_notification(
            "same text",
            &nonempty_result(),
            ts("2021-06-20T11:00:00"),
            Some("same text"),
            &NotifyPolicy::default(),
        );
        assert!(!decision.write_output);
        assert!(!decision.notify);
    }

    #[test]
    fn test_changed_text_notifies() {
        let decision = decide_notification(
            "new text",
            &nonempty_result(),
            ts("2021-06-20T11:00:00"),
            Some("old text"),
            &NotifyPolicy::default(),
        );
        assert!(decision.write_output);
        assert!(decision.notify);
    }

    #[test]
    fn test_stale_report_suppresses_notification() {
        let decision = decide_notification(
            "new text",
            &nonempty_result(),
            ts("2018-12-31T23:59:59"),
            None,
            &NotifyPolicy::default(),
        );
        // The file is still refreshed; only the notification is gated.
        assert!(decision.write_output);
        assert!(!decision.notify);
    }

    #[test]
    fn test_empty_result_notifies_only_when_asked() {
        let timestamp = ts("2021-06-20T11:00:00");
        let empty = AvailabilityResult::default();

        let silent = decide_notification("no spaces", &empty, timestamp, None, &NotifyPolicy::default());
        assert!(silent.write_output);
        assert!(!silent.notify);

        let chatty = decide_notification(
            "no spaces",
            &empty,
            timestamp,
            None,
            &NotifyPolicy {
                notify_if_no_permits: true,
                ..NotifyPolicy::default()
            },
        );
        assert!(chatty.notify);
    }

    #[test]
    fn test_prior_report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");

        assert_eq!(load_prior_report(&path).unwrap(), None);

        write_report(&path, "first rendering\n").unwrap();
        assert_eq!(
            load_prior_report(&path).unwrap().as_deref(),
            Some("first rendering\n")
        );

        // Overwrites replace the whole file, shorter content included.
        write_report(&path, "x\n").unwrap();
        assert_eq!(load_prior_report(&path).unwrap().as_deref(), Some("x\n"));
    }
}
