//! Percentile bracketing and per-site statistics.

/// Per-event measurement: exclusive duration paired with the inclusive
/// duration of the same event, so bracket membership (decided by exclusive
/// time) carries the matching inclusive time along.
pub(crate) type DurationPair = (u64, u64);

/// Bracketed statistics for one site, all durations in nanoseconds.
///
/// Statistics are over exclusive durations unless the field name says
/// otherwise. An empty bracket yields zeros.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct BracketStats {
    pub(crate) fastest_min: u64,
    pub(crate) fastest_mean: f64,

    pub(crate) center_min: u64,
    pub(crate) center_mean: f64,
    pub(crate) center_median: f64,
    pub(crate) center_max: u64,

    pub(crate) slowest_mean: f64,
    pub(crate) slowest_max: u64,

    pub(crate) center_time_active: u64,
    pub(crate) center_time_active_exclusive: u64,

    pub(crate) standard_deviation: f64,
    pub(crate) coefficient_of_variation: f64,
}

/// Computes bracketed statistics over a site's `(exclusive, inclusive)` pairs.
///
/// The pairs are sorted by exclusive duration ascending (ties broken by
/// inclusive duration, so equal inputs produce equal outputs regardless of
/// thread interleaving). The fastest `exclude_fastest_percent` of events is
/// removed before bracketing; the remaining events are partitioned into
/// fastest `[0, p%)`, center `[p%, (100-p)%)` and slowest `[(100-p)%, 100%)`
/// by integer-floor arithmetic.
pub(crate) fn bracketed_stats(
    pairs: &mut [DurationPair],
    non_center_percent: u32,
    exclude_fastest_percent: f64,
) -> BracketStats {
    pairs.sort_unstable();

    let excluded = excluded_prefix(pairs.len(), exclude_fastest_percent);
    let working = &pairs[excluded..];
    if working.is_empty() {
        return BracketStats::default();
    }

    let count = working.len();
    #[expect(
        clippy::integer_division,
        reason = "bracket boundaries are defined by integer-floor partitioning"
    )]
    let non_center = count * non_center_percent as usize / 100;

    let fastest = &working[..non_center];
    let center = &working[non_center..count - non_center];
    let slowest = &working[count - non_center..];

    // The center bracket is never empty: non_center_percent <= 49 leaves at
    // least one event in the middle for any nonzero count.
    debug_assert!(!center.is_empty());

    let center_excl_sum: u64 = center.iter().map(|&(excl, _)| excl).sum();
    let center_incl_sum: u64 = center.iter().map(|&(_, incl)| incl).sum();

    let center_mean = mean_of(center_excl_sum, center.len());
    let standard_deviation = population_sd(center, center_mean);
    let coefficient_of_variation = if center.len() <= 1 || center_mean == 0.0 {
        0.0
    } else {
        standard_deviation / center_mean
    };

    let (fastest_min, fastest_mean, slowest_mean, slowest_max) = if non_center > 0 {
        let fastest_sum: u64 = fastest.iter().map(|&(excl, _)| excl).sum();
        let slowest_sum: u64 = slowest.iter().map(|&(excl, _)| excl).sum();
        (
            fastest[0].0,
            mean_of(fastest_sum, fastest.len()),
            mean_of(slowest_sum, slowest.len()),
            slowest[slowest.len() - 1].0,
        )
    } else {
        (0, 0.0, 0.0, 0)
    };

    BracketStats {
        fastest_min,
        fastest_mean,
        center_min: center[0].0,
        center_mean,
        center_median: median_of(center),
        center_max: center[center.len() - 1].0,
        slowest_mean,
        slowest_max,
        center_time_active: center_incl_sum,
        center_time_active_exclusive: center_excl_sum,
        standard_deviation,
        coefficient_of_variation,
    }
}

/// Number of fastest events dropped before bracketing.
fn excluded_prefix(count: usize, exclude_fastest_percent: f64) -> usize {
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "event counts are far below 2^52 and the product is clamped to the array length"
    )]
    let excluded = (count as f64 * exclude_fastest_percent / 100.0).floor() as usize;
    excluded.min(count)
}

#[expect(
    clippy::cast_precision_loss,
    reason = "durations are far below 2^52 nanoseconds"
)]
fn mean_of(sum: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Median of the exclusive durations: middle element, or the mean of the two
/// middle elements for an even count.
#[expect(
    clippy::cast_precision_loss,
    reason = "durations are far below 2^52 nanoseconds"
)]
fn median_of(sorted: &[DurationPair]) -> f64 {
    let count = sorted.len();
    if count == 0 {
        return 0.0;
    }

    let middle = count / 2;
    if count % 2 == 1 {
        sorted[middle].0 as f64
    } else {
        (sorted[middle - 1].0 as f64 + sorted[middle].0 as f64) / 2.0
    }
}

/// Population standard deviation, two-pass form.
///
/// The naive `E[x^2] - E[x]^2` form cancels catastrophically for large
/// nanosecond magnitudes, so the mean is computed first and the squared
/// deviations summed in a second pass.
#[expect(
    clippy::cast_precision_loss,
    reason = "durations are far below 2^52 nanoseconds"
)]
fn population_sd(pairs: &[DurationPair], mean: f64) -> f64 {
    if pairs.len() <= 1 {
        return 0.0;
    }

    let squared_sum: f64 = pairs
        .iter()
        .map(|&(excl, _)| {
            let delta = excl as f64 - mean;
            delta * delta
        })
        .sum();

    (squared_sum / pairs.len() as f64).sqrt()
}
