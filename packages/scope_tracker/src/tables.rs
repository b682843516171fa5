//! Result settings and the structured result tables.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::site::Site;

/// Caller-supplied knobs for a result computation.
///
/// # Examples
///
/// ```
/// use scope_tracker::ResultSettings;
///
/// let settings = ResultSettings {
///     non_center_percent: 5,
///     ..ResultSettings::default()
/// };
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResultSettings {
    /// Percent of events trimmed off each end of the sorted durations when
    /// forming the center bracket. Must be in `1..=49`.
    pub non_center_percent: u32,

    /// Sites whose center exclusive time contributes less than this percent
    /// of the tracked total are dropped from the tables. In `0.0..=100.0`.
    pub min_percent_active_exclusive: f64,

    /// Percent of each site's fastest events excluded from the bracket
    /// statistics (call counts and accumulated time keep counting them).
    /// In `0.0..=100.0`.
    pub percent_exclude_fastest_active_exclusive: f64,
}

impl Default for ResultSettings {
    fn default() -> Self {
        Self {
            non_center_percent: 1,
            min_percent_active_exclusive: 0.0,
            percent_exclude_fastest_active_exclusive: 0.0,
        }
    }
}

impl ResultSettings {
    /// Checks every field against its documented range.
    ///
    /// Out-of-range settings are rejected before any buffer is drained, so a
    /// failed validation never consumes events.
    pub fn validate(&self) -> Result<()> {
        if !(1..=49).contains(&self.non_center_percent) {
            return Err(Error::InvalidSettings {
                problem: format!(
                    "non_center_percent must be in 1..=49, got {}",
                    self.non_center_percent
                ),
            });
        }

        if !(0.0..=100.0).contains(&self.min_percent_active_exclusive) {
            return Err(Error::InvalidSettings {
                problem: format!(
                    "min_percent_active_exclusive must be in 0.0..=100.0, got {}",
                    self.min_percent_active_exclusive
                ),
            });
        }

        if !(0.0..=100.0).contains(&self.percent_exclude_fastest_active_exclusive) {
            return Err(Error::InvalidSettings {
                problem: format!(
                    "percent_exclude_fastest_active_exclusive must be in 0.0..=100.0, got {}",
                    self.percent_exclude_fastest_active_exclusive
                ),
            });
        }

        Ok(())
    }
}

/// One summary table row: per-site totals across the whole measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryRow {
    /// The instrumentation site this row describes.
    pub site: Arc<Site>,

    /// Number of scope executions recorded for the site.
    pub calls: u64,

    /// Number of distinct threads that executed the site.
    pub threads: u32,

    /// Sum of inclusive (enter-to-exit) durations, nanoseconds.
    pub time_active_all: u64,

    /// Sum of exclusive durations (inclusive minus direct children), nanoseconds.
    pub time_active_exclusive_all: u64,

    /// Share of this site's center-bracket exclusive time among all rows, percent.
    pub percent_ae_bracket: f64,

    /// Share of this site's exclusive time among all rows, percent.
    pub percent_ae_all: f64,
}

/// One detail table entry: percentile-bracketed statistics for a site.
///
/// The fastest/center/slowest brackets partition the site's events after
/// sorting by exclusive duration; statistics are over exclusive durations
/// unless the field name says otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailStats {
    /// The instrumentation site this entry describes.
    pub site: Arc<Site>,

    /// Minimum of the fastest bracket, nanoseconds. Zero if the bracket is empty.
    pub fastest_min: u64,
    /// Mean of the fastest bracket, nanoseconds.
    pub fastest_mean: f64,

    /// Minimum of the center bracket, nanoseconds.
    pub center_min: u64,
    /// Mean of the center bracket, nanoseconds.
    pub center_mean: f64,
    /// Median of the center bracket, nanoseconds.
    pub center_median: f64,
    /// Maximum of the center bracket, nanoseconds.
    pub center_max: u64,

    /// Mean of the slowest bracket, nanoseconds. Zero if the bracket is empty.
    pub slowest_mean: f64,
    /// Maximum of the slowest bracket, nanoseconds.
    pub slowest_max: u64,

    /// Sum of inclusive durations over the center bracket, nanoseconds.
    pub center_time_active: u64,
    /// Sum of exclusive durations over the center bracket, nanoseconds.
    pub center_time_active_exclusive: u64,

    /// Sum of inclusive durations over every call, nanoseconds.
    pub time_accumulated: u64,

    /// Population standard deviation of the center bracket, nanoseconds.
    pub standard_deviation: f64,
    /// Coefficient of variation of the center bracket (sd / mean, 0 when
    /// the bracket has at most one event or a zero mean).
    pub coefficient_of_variation: f64,

    /// Lower bracket boundary as configured: `non_center_percent`.
    pub fastest_range: u32,
    /// Upper bracket boundary as configured: `100 - non_center_percent`.
    pub slowest_range: u32,
}

/// Diagnostics accumulated during capture and aggregation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResultMeta {
    /// Events dropped because a thread's log could not grow.
    pub lost_events: u64,

    /// Timestamps clamped because the clock appeared to run backwards.
    pub clock_anomalies: u64,

    /// Threads whose event stream violated scope nesting. When nonzero the
    /// tables carry no rows: the aggregation is diagnostic only.
    pub malformed_threads: u64,
}

/// The aggregator's output: summary and detail tables plus the measurement window.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTables {
    /// Per-site totals, ordered by exclusive time descending.
    pub summary: Vec<SummaryRow>,

    /// Per-site bracket statistics, same order as `summary`.
    pub details: Vec<DetailStats>,

    /// Start of the measurement window, nanoseconds on the profiler clock.
    pub start_time: i64,

    /// End of the measurement window (the drain instant), nanoseconds.
    pub end_time: i64,

    /// Wall-clock length of the measurement window, nanoseconds.
    pub time_total: u64,

    /// Exclusive nanoseconds attributable to instrumented code: the sum over
    /// root events (events with no instrumented parent) of their exclusive time.
    pub time_tracked: u64,

    /// The settings this result was computed with.
    pub settings: ResultSettings,

    /// Capture and aggregation diagnostics.
    pub meta: ResultMeta,
}
