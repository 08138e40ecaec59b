use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::header;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::captcha_client::AntiCaptchaClient;
use crate::retry::RetryPolicy;
use crate::scan_types::{
    ReportDay, ReportTimestamp, ReservationReport, ScanError, TrailheadDescriptor,
    TrailheadDirectory,
};
use crate::session_manager::SessionManager;

/// Endpoints and retry settings for the Wild Trails plugin API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Trailhead metadata endpoint
    pub trailheads_url: String,

    /// Reservation report endpoint
    pub report_url: String,

    /// Attempt budget for each fetch, counting the first try
    pub max_retry_attempts: u32,

    /// Seconds between attempts
    pub retry_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            trailheads_url:
                "https://yosemite.org/wp-content/plugins/wildtrails/query.php?resource=trailheads"
                    .to_string(),
            report_url:
                "https://yosemite.org/wp-content/plugins/wildtrails/query.php?resource=report&region=jm"
                    .to_string(),
            max_retry_attempts: 5,
            retry_interval_secs: 15,
        }
    }
}

impl ApiConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retry_attempts,
            Duration::from_secs(self.retry_interval_secs),
        )
    }
}

/// Envelope wrapping every Wild Trails payload. The plugin signals a
/// missing or expired session with a `null` response body.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TrailheadsPayload {
    values: Vec<TrailheadDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ReportPayload {
    timestamp: String,
    values: Vec<Map<String, Value>>,
}

/// Client for the Wild Trails plugin endpoints behind the permit website
pub struct WildTrailsClient {
    api: ApiConfig,
    session: SessionManager,
    captcha: AntiCaptchaClient,
    retry: RetryPolicy,
}

impl WildTrailsClient {
    /// Create a client around an existing session and captcha solver
    pub fn new(api: ApiConfig, session: SessionManager, captcha: AntiCaptchaClient) -> Self {
        let retry = api.retry_policy();
        Self {
            api,
            session,
            captcha,
            retry,
        }
    }

    /// Fetch trailhead metadata and index it by identifier
    pub async fn fetch_trailheads(&mut self) -> Result<TrailheadDirectory, ScanError> {
        debug!("Fetching trailhead metadata from {}", self.api.trailheads_url);

        let url = self.api.trailheads_url.clone();
        let payload: TrailheadsPayload = self.fetch_with_retry(&url).await?;

        Ok(TrailheadDirectory::from_values(payload.values))
    }

    /// Fetch the reservation report and parse its rows into dated counts
    pub async fn fetch_report(&mut self) -> Result<ReservationReport, ScanError> {
        debug!("Fetching reservation report from {}", self.api.report_url);

        let url = self.api.report_url.clone();
        let payload: ReportPayload = self.fetch_with_retry(&url).await?;

        let updated_at = parse_report_timestamp(&payload.timestamp)?;
        let days = payload
            .values
            .into_iter()
            .map(parse_report_day)
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Report updated {} covers {} days",
            payload.timestamp,
            days.len()
        );

        Ok(ReservationReport { updated_at, days })
    }

    async fn fetch_with_retry<T: DeserializeOwned>(&mut self, url: &str) -> Result<T, ScanError> {
        let mut attempt = 0;
        loop {
            match self.fetch_payload(url).await {
                Ok(payload) => return Ok(payload),
                Err(e) if self.retry.should_retry(attempt, &e) => {
                    warn!("Fetch attempt {} failed: {}", attempt + 1, e);
                    if matches!(e, ScanError::AuthenticationFailed) {
                        self.session.invalidate()?;
                    }
                    attempt += 1;
                    self.retry.pause().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_payload<T: DeserializeOwned>(&mut self, url: &str) -> Result<T, ScanError> {
        if !self.session.is_authenticated() {
            self.session.authenticate(&self.captcha).await?;
        }

        let response = self
            .session
            .client()
            .get(url)
            .header(header::REFERER, self.session.referrer_url())
            .send()
            .await
            .map_err(|e| ScanError::Network(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            match status.as_u16() {
                429 => return Err(ScanError::RateLimited),
                401 | 403 => return Err(ScanError::AuthenticationFailed),
                _ => return Err(ScanError::ApiError(format!("HTTP {status}"))),
            }
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ScanError::DataFormat(format!("Failed to parse response: {e}")))?;

        // A well-formed envelope with no payload means the session expired.
        envelope.response.ok_or(ScanError::AuthenticationFailed)
    }
}

fn parse_report_timestamp(raw: &str) -> Result<ReportTimestamp, ScanError> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map_err(|e| ScanError::DataFormat(format!("Bad report timestamp {raw:?}: {e}")))?;
    ReportTimestamp::from_naive_pacific(naive)
}

/// Split one report row into its date and the per-identifier counts,
/// keeping the counts in the order the row listed them.
fn parse_report_day(row: Map<String, Value>) -> Result<ReportDay, ScanError> {
    let mut date = None;
    let mut counts = Vec::with_capacity(row.len().saturating_sub(1));

    for (key, value) in row {
        if key == "date" {
            date = Some(parse_row_date(&value)?);
            continue;
        }

        let count = value
            .as_i64()
            .ok_or_else(|| ScanError::DataFormat(format!("Count for {key} is not an integer")))?;
        counts.push((key, count));
    }

    let date = date.ok_or_else(|| ScanError::DataFormat("Report row has no date".to_string()))?;
    Ok(ReportDay { date, counts })
}

fn parse_row_date(value: &Value) -> Result<NaiveDate, ScanError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ScanError::DataFormat("Report row date is not a string".to_string()))?;

    // Rows have carried both plain dates and full datetimes over the years.
    if let Ok(date) = raw.parse::<NaiveDate>() {
        return Ok(date);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.date())
        .map_err(|e| ScanError::DataFormat(format!("Bad report date {raw:?}: {e}")))
}
