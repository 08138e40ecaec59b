use chrono::{Days, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use crate::scan_types::*;

/// Search criteria for one availability scan
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanCriteria {
    /// Smallest number of free permits worth reporting
    pub min_spaces: i64,

    /// Earliest acceptable entry date
    pub start_date: Option<NaiveDate>,

    /// Latest acceptable entry date
    pub end_date: Option<NaiveDate>,

    /// Display names of trailheads the user does not want to start from
    pub exclude: Vec<String>,

    /// Days of notice the permit office requires for a reservation
    pub min_reserve_days: u64,

    /// Days ahead beyond which reservations are not accepted
    pub max_reserve_days: u64,

    /// First calendar day permits are issued (MM-DD)
    pub season_open: MonthDay,

    /// Last calendar day permits are issued (MM-DD)
    pub season_close: MonthDay,
}

impl Default for ScanCriteria {
    fn default() -> Self {
        Self {
            min_spaces: 2,
            start_date: None,
            end_date: None,
            exclude: Vec::new(),
            min_reserve_days: 2,
            max_reserve_days: 168,
            season_open: MonthDay::new(6, 15),
            season_close: MonthDay::new(9, 30),
        }
    }
}

/// Derive the inclusive date window the scan is allowed to consider.
///
/// The window is bounded by the user's configured dates, the dates the
/// report actually covers, the permit office's reservation notice rules
/// anchored at the report timestamp, and the permit season for the
/// timestamp's year. Returns `None` when the bounds leave no dates, which
/// is an ordinary empty scan rather than an error.
pub fn derive_window(
    report: &ReservationReport,
    criteria: &ScanCriteria,
) -> Result<Option<(NaiveDate, NaiveDate)>, ScanError> {
    let (Some(earliest), Some(latest)) = (report.earliest_date(), report.latest_date()) else {
        return Ok(None);
    };

    let ts_date = report.updated_at.date();
    let year = report.updated_at.year();

    let not_before = add_days(ts_date, criteria.min_reserve_days)?;
    let not_after = add_days(ts_date, criteria.max_reserve_days)?;

    let mut start = earliest.max(not_before).max(criteria.season_open.in_year(year)?);
    if let Some(user_start) = criteria.start_date {
        start = start.max(user_start);
    }

    let mut end = latest.min(not_after).min(criteria.season_close.in_year(year)?);
    if let Some(user_end) = criteria.end_date {
        end = end.min(user_end);
    }

    if start > end {
        return Ok(None);
    }
    Ok(Some((start, end)))
}

/// Compute every (date, trailhead) pair with reportable free capacity.
///
/// A trailhead's usable capacity on a date is bounded both by its own entry
/// quota and by the exit-quota pool it draws on:
/// `available = max(0, min(quota - reserved, pool_quota - pool_reserved))`.
/// A pair is reported when `available >= max(min_spaces, 1)`; a configured
/// minimum of 0 behaves as 1.
pub fn compute_availability(
    report: &ReservationReport,
    trailheads: &TrailheadDirectory,
    criteria: &ScanCriteria,
) -> Result<AvailabilityResult, ScanError> {
    let mut result = AvailabilityResult::default();

    let Some((start, end)) = derive_window(report, criteria)? else {
        debug!("Scan window is empty; nothing to check");
        return Ok(result);
    };
    debug!("Scanning report dates {} through {}", start, end);

    let threshold = criteria.min_spaces.max(1);

    let mut date = start;
    while date <= end {
        if let Some(day) = report.day(date) {
            for (id, reserved) in &day.counts {
                if is_exit_pool(id) {
                    continue;
                }

                let trailhead = trailheads.require(id)?;
                if criteria.exclude.iter().any(|name| name == &trailhead.name) {
                    continue;
                }

                let entry_free = trailhead.quota - reserved;

                let pool_id = exit_pool_for(id);
                let pool = trailheads.require(pool_id)?;
                let pool_reserved = day.count_for(pool_id).ok_or_else(|| ScanError::MissingPoolCount {
                    date,
                    pool: pool_id.to_string(),
                })?;
                let exit_free = pool.quota - pool_reserved;

                let available = entry_free.min(exit_free).max(0);
                if available >= threshold {
                    debug!("{} spaces for {} on {}", available, trailhead.name, date);
                    result.push(
                        date,
                        AvailabilitySlot {
                            trailhead_id: id.clone(),
                            available,
                        },
                    );
                }
            }
        }

        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    Ok(result)
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate, ScanError> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| ScanError::ConfigError(format!("Reserve window of {days} days overflows the calendar")))
}
