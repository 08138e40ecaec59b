use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::America::Los_Angeles;
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};

/// Identifier of the shared Donohue Pass exit-quota pool.
pub const DONOHUE_EXIT_POOL: &str = "donohue-exit";

/// Identifier of the Lyell Canyon share of the Donohue exit quota.
pub const LYELL_DONOHUE_EXIT_POOL: &str = "lyell-donohue-exit";

/// Trailheads that draw on a pool other than the default Donohue pool.
const ALTERNATE_POOL_LINKS: &[(&str, &str)] = &[("lyell-canyon", LYELL_DONOHUE_EXIT_POOL)];

/// Whether an identifier names an exit-quota pool rather than a trailhead.
///
/// Pool identifiers appear alongside trailhead identifiers in every report
/// row but must never be treated as destinations themselves.
pub fn is_exit_pool(id: &str) -> bool {
    id == DONOHUE_EXIT_POOL || id == LYELL_DONOHUE_EXIT_POOL
}

/// The exit-quota pool a trailhead draws on.
pub fn exit_pool_for(trailhead_id: &str) -> &'static str {
    ALTERNATE_POOL_LINKS
        .iter()
        .find(|(id, _)| *id == trailhead_id)
        .map(|(_, pool)| *pool)
        .unwrap_or(DONOHUE_EXIT_POOL)
}

/// A single trailhead (or exit-quota pool) as described by the upstream
/// trailheads endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TrailheadDescriptor {
    /// Stable identifier used as the key in report rows
    pub id: String,

    /// Display name shown to the user
    pub name: String,

    /// Daily entry quota (or pool capacity, for exit pools)
    pub quota: i64,

    /// Latitude of the trailhead, when upstream provides one
    #[serde(default)]
    pub lat: Option<f64>,

    /// Longitude of the trailhead, when upstream provides one
    #[serde(default)]
    pub lng: Option<f64>,

    /// Free-text notes from the permit office
    #[serde(default)]
    pub notes: Option<String>,
}

/// Reference data for one run: every descriptor keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct TrailheadDirectory {
    entries: HashMap<String, TrailheadDescriptor>,
}

impl TrailheadDirectory {
    /// Build the directory from the descriptors the upstream endpoint returned.
    pub fn from_values(values: Vec<TrailheadDescriptor>) -> Self {
        let entries = values.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self { entries }
    }

    /// Look up a descriptor by identifier.
    pub fn get(&self, id: &str) -> Option<&TrailheadDescriptor> {
        self.entries.get(id)
    }

    /// Look up a descriptor, treating absence as upstream schema drift.
    pub fn require(&self, id: &str) -> Result<&TrailheadDescriptor, ScanError> {
        self.entries
            .get(id)
            .ok_or_else(|| ScanError::UnknownTrailhead(id.to_string()))
    }

    /// Number of descriptors in the directory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A recurring calendar day such as a season boundary, written `MM-DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthDay {
    /// Month component (1-12)
    pub month: u32,
    /// Day component (1-31)
    pub day: u32,
}

impl MonthDay {
    /// Build a month-day pair without range validation.
    pub const fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    /// Resolve this boundary against a concrete year.
    pub fn in_year(&self, year: i32) -> Result<NaiveDate, ScanError> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).ok_or_else(|| {
            ScanError::ConfigError(format!("Invalid season boundary {} for year {year}", self))
        })
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

impl FromStr for MonthDay {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_once('-')
            .and_then(|(month, day)| {
                Some(MonthDay {
                    month: month.parse().ok()?,
                    day: day.parse().ok()?,
                })
            })
            .filter(|md| (1..=12).contains(&md.month) && (1..=31).contains(&md.day))
            .ok_or_else(|| ScanError::ConfigError(format!("Invalid month-day '{s}', expected MM-DD")))
    }
}

impl<'de> Deserialize<'de> for MonthDay {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The instant the upstream report was last refreshed.
///
/// Upstream sends a naive Pacific wall-clock time; it is localized here at
/// the fetch boundary so the rest of the crate works with a real instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportTimestamp(DateTime<Tz>);

impl ReportTimestamp {
    /// Localize the upstream naive Pacific wall-clock time.
    pub fn from_naive_pacific(naive: NaiveDateTime) -> Result<Self, ScanError> {
        Los_Angeles
            .from_local_datetime(&naive)
            .earliest()
            .map(Self)
            .ok_or_else(|| {
                ScanError::DataFormat(format!("Report timestamp {naive} does not exist in Pacific time"))
            })
    }

    /// Calendar date of the report refresh, in Pacific time.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Year of the report refresh; anchors the permit season boundaries.
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// The same instant expressed in another timezone.
    pub fn with_timezone(&self, tz: Tz) -> DateTime<Tz> {
        self.0.with_timezone(&tz)
    }
}

/// Reserved counts for one calendar date, in upstream document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDay {
    /// The entry date these counts apply to
    pub date: NaiveDate,
    /// (identifier, reserved count) pairs as they appeared in the row
    pub counts: Vec<(String, i64)>,
}

impl ReportDay {
    /// Reserved count for a trailhead or pool identifier, if present.
    pub fn count_for(&self, id: &str) -> Option<i64> {
        self.counts
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, count)| *count)
    }
}

/// The full reservation report for one run
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationReport {
    /// When the permit office last refreshed the report
    pub updated_at: ReportTimestamp,
    /// Per-date reserved counts, in upstream document order
    pub days: Vec<ReportDay>,
}

impl ReservationReport {
    /// Earliest date covered by the report.
    pub fn earliest_date(&self) -> Option<NaiveDate> {
        self.days.iter().map(|day| day.date).min()
    }

    /// Latest date covered by the report.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.days.iter().map(|day| day.date).max()
    }

    /// The report row for a specific date, if the report covers it.
    pub fn day(&self, date: NaiveDate) -> Option<&ReportDay> {
        self.days.iter().find(|day| day.date == date)
    }
}

/// Free capacity found for one trailhead on one date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilitySlot {
    /// Identifier of the trailhead with space
    pub trailhead_id: String,
    /// Permits actually obtainable (bounded by the exit pool)
    pub available: i64,
}

/// Everything the scan found: dates in chronological order, trailheads
/// within a date in the order the report listed them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityResult {
    days: BTreeMap<NaiveDate, Vec<AvailabilitySlot>>,
}

impl AvailabilityResult {
    /// Record capacity for a (date, trailhead) pair.
    pub fn push(&mut self, date: NaiveDate, slot: AvailabilitySlot) {
        self.days.entry(date).or_default().push(slot);
    }

    /// Whether the scan found nothing.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Iterate dates chronologically, with slots in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[AvailabilitySlot])> {
        self.days.iter().map(|(date, slots)| (*date, slots.as_slice()))
    }
}

/// Custom error type for scan operations
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// API error
    #[error("API error: {0}")]
    ApiError(String),

    /// Rate limited by external API
    #[error("Rate limited by external API")]
    RateLimited,

    /// Session rejected or expired; re-authentication required
    #[error("Authentication failed with external service")]
    AuthenticationFailed,

    /// Captcha solving failed
    #[error("Captcha error: {0}")]
    Captcha(String),

    /// Data format error
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// Report references a trailhead id with no descriptor
    #[error("No trailhead descriptor for report id '{0}'")]
    UnknownTrailhead(String),

    /// Report day lacks a reserved count for a linked exit pool
    #[error("Report for {date} has no count for exit pool '{pool}'")]
    MissingPoolCount {
        /// Entry date of the incomplete row
        date: NaiveDate,
        /// The pool identifier that should have been present
        pool: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Filesystem error on the output or cookie cache file
    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),
}

impl ScanError {
    /// Whether a retry with the same inputs could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScanError::ApiError(_)
                | ScanError::RateLimited
                | ScanError::AuthenticationFailed
                | ScanError::Captcha(_)
                | ScanError::Network(_)
        )
    }
}
