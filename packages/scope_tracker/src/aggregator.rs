//! Cross-thread aggregation: call-tree attribution, grouping and table assembly.

use std::sync::Arc;

use foldhash::{HashMap, HashMapExt, HashSet};

use crate::buffer::{RawEvent, ThreadEvents};
use crate::site::{Site, SiteId};
use crate::stats::{DurationPair, bracketed_stats};
use crate::tables::{DetailStats, ResultMeta, ResultSettings, ResultTables, SummaryRow};

/// One event with its call-tree attribution resolved.
#[derive(Clone, Copy, Debug, PartialEq)]
struct AttributedEvent {
    site: SiteId,
    /// Inclusive (enter-to-exit) duration, nanoseconds.
    duration: u64,
    /// Inclusive duration minus the inclusive durations of direct children.
    exclusive: u64,
    /// Whether the event has no instrumented parent on its thread.
    root: bool,
}

/// A completed event waiting on the reconstruction stack for its parent.
#[derive(Clone, Copy, Debug)]
struct Pending {
    out_index: usize,
    t_enter: i64,
    t_exit: i64,
    duration: u64,
}

/// The event stream of one thread violated the nesting invariants.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct MalformedStream;

/// Reconstructs scope nesting for one thread's event stream.
///
/// Events arrive in scope-exit order, which for properly nested scopes is
/// post-order of the call tree: children precede their parent. A stack holds
/// completed events whose parent has not arrived yet. For each new event, the
/// stack entries its interval contains are exactly its direct children (their
/// own children were claimed earlier); entries that lie fully before it are
/// earlier siblings awaiting a common ancestor and stay put. Anything else is
/// a partial overlap, which nested scopes cannot produce.
///
/// Entries still on the stack at the end never found a parent: those are the
/// thread's root events.
fn attribute_thread(events: &[RawEvent]) -> Result<Vec<AttributedEvent>, MalformedStream> {
    let mut out: Vec<AttributedEvent> = Vec::with_capacity(events.len());
    let mut stack: Vec<Pending> = Vec::new();
    let mut last_exit = i64::MIN;

    for event in events {
        if event.t_exit < event.t_enter || event.t_exit < last_exit {
            return Err(MalformedStream);
        }
        last_exit = event.t_exit;

        #[expect(
            clippy::cast_sign_loss,
            reason = "t_exit >= t_enter was just checked, so the difference is non-negative"
        )]
        let duration = (event.t_exit - event.t_enter) as u64;

        let mut children_ns: u64 = 0;
        while let Some(top) = stack.last().copied() {
            if top.t_enter >= event.t_enter && top.t_exit <= event.t_exit {
                // Contained: a direct child of the current event.
                children_ns = children_ns.saturating_add(top.duration);
                stack.pop();
            } else if top.t_exit <= event.t_enter {
                // Fully before the current event: an earlier sibling.
                break;
            } else {
                return Err(MalformedStream);
            }
        }

        let Some(exclusive) = duration.checked_sub(children_ns) else {
            return Err(MalformedStream);
        };

        out.push(AttributedEvent {
            site: event.site,
            duration,
            exclusive,
            root: false,
        });
        stack.push(Pending {
            out_index: out.len() - 1,
            t_enter: event.t_enter,
            t_exit: event.t_exit,
            duration,
        });
    }

    for pending in stack {
        out[pending.out_index].root = true;
    }

    Ok(out)
}

/// Per-site accumulation across threads.
#[derive(Debug, Default)]
struct SiteGroup {
    calls: u64,
    thread_ids: HashSet<u64>,
    /// `(exclusive, inclusive)` per event.
    pairs: Vec<DurationPair>,
}

/// Computes the result tables from drained per-thread event streams.
///
/// `sites` is a site-table snapshot indexable by [`SiteId::index`];
/// `settings` must already be validated. A nesting violation in any thread
/// turns the whole aggregation into a diagnostic result: no site rows,
/// `meta.malformed_threads` counts the offenders.
pub(crate) fn compute_tables(
    sites: &[Arc<Site>],
    threads: Vec<ThreadEvents>,
    settings: ResultSettings,
    start_time: i64,
    end_time: i64,
    mut meta: ResultMeta,
) -> ResultTables {
    #[expect(
        clippy::cast_sign_loss,
        reason = "the drain records end_time after start_time on a monotonic clock"
    )]
    let time_total = end_time.saturating_sub(start_time).max(0) as u64;

    let mut groups: HashMap<SiteId, SiteGroup> = HashMap::new();
    let mut time_tracked: u64 = 0;

    for thread in &threads {
        let attributed = match attribute_thread(&thread.events) {
            Ok(attributed) => attributed,
            Err(MalformedStream) => {
                meta.malformed_threads += 1;
                continue;
            }
        };

        for event in attributed {
            if event.root {
                time_tracked = time_tracked.saturating_add(event.exclusive);
            }

            let group = groups.entry(event.site).or_default();
            group.calls += 1;
            group.thread_ids.insert(thread.thread_id);
            group.pairs.push((event.exclusive, event.duration));
        }
    }

    if meta.malformed_threads > 0 {
        // Diagnostic result: the computation is not trustworthy, so no rows.
        return ResultTables {
            summary: Vec::new(),
            details: Vec::new(),
            start_time,
            end_time,
            time_total,
            time_tracked: 0,
            settings,
            meta,
        };
    }

    let mut rows: Vec<(SiteId, SummaryRow, DetailStats)> = Vec::with_capacity(groups.len());

    for (site_id, mut group) in groups {
        let site = Arc::clone(&sites[site_id.index()]);

        let time_accumulated: u64 = group.pairs.iter().map(|&(_, incl)| incl).sum();
        let time_active_exclusive_all: u64 = group.pairs.iter().map(|&(excl, _)| excl).sum();

        let stats = bracketed_stats(
            &mut group.pairs,
            settings.non_center_percent,
            settings.percent_exclude_fastest_active_exclusive,
        );

        // Site-level percent filter against the tracked total.
        let center_percent = if time_tracked == 0 {
            0.0
        } else {
            #[expect(
                clippy::cast_precision_loss,
                reason = "durations are far below 2^52 nanoseconds"
            )]
            let percent =
                100.0 * stats.center_time_active_exclusive as f64 / time_tracked as f64;
            percent
        };
        if center_percent < settings.min_percent_active_exclusive {
            continue;
        }

        let summary = SummaryRow {
            site: Arc::clone(&site),
            calls: group.calls,
            threads: u32::try_from(group.thread_ids.len()).unwrap_or(u32::MAX),
            time_active_all: time_accumulated,
            time_active_exclusive_all,
            // Percent columns are filled in after filtering, once the
            // denominators over the surviving rows are known.
            percent_ae_bracket: 0.0,
            percent_ae_all: 0.0,
        };

        let details = DetailStats {
            site,
            fastest_min: stats.fastest_min,
            fastest_mean: stats.fastest_mean,
            center_min: stats.center_min,
            center_mean: stats.center_mean,
            center_median: stats.center_median,
            center_max: stats.center_max,
            slowest_mean: stats.slowest_mean,
            slowest_max: stats.slowest_max,
            center_time_active: stats.center_time_active,
            center_time_active_exclusive: stats.center_time_active_exclusive,
            time_accumulated,
            standard_deviation: stats.standard_deviation,
            coefficient_of_variation: stats.coefficient_of_variation,
            fastest_range: settings.non_center_percent,
            slowest_range: 100 - settings.non_center_percent,
        };

        rows.push((site_id, summary, details));
    }

    rows.sort_by(|(a_id, a, _), (b_id, b, _)| {
        b.time_active_exclusive_all
            .cmp(&a.time_active_exclusive_all)
            .then_with(|| a_id.cmp(b_id))
    });

    let exclusive_total: u64 = rows
        .iter()
        .map(|(_, summary, _)| summary.time_active_exclusive_all)
        .sum();
    let center_exclusive_total: u64 = rows
        .iter()
        .map(|(_, _, details)| details.center_time_active_exclusive)
        .sum();

    #[expect(
        clippy::cast_precision_loss,
        reason = "durations are far below 2^52 nanoseconds"
    )]
    for (_, summary, details) in &mut rows {
        summary.percent_ae_all = if exclusive_total == 0 {
            0.0
        } else {
            100.0 * summary.time_active_exclusive_all as f64 / exclusive_total as f64
        };
        summary.percent_ae_bracket = if center_exclusive_total == 0 {
            0.0
        } else {
            100.0 * details.center_time_active_exclusive as f64 / center_exclusive_total as f64
        };
    }

    let (summary, details) = rows
        .into_iter()
        .map(|(_, summary, details)| (summary, details))
        .unzip();

    ResultTables {
        summary,
        details,
        start_time,
        end_time,
        time_total,
        time_tracked,
        settings,
        meta,
    }
}


#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::site::SiteRegistry;

    fn event(site: u32, t_enter: i64, t_exit: i64) -> RawEvent {
        RawEvent {
            site: SiteId::from_raw(site),
            t_enter,
            t_exit,
        }
    }

    /// A site table with `count` sites whose ids are `0..count`.
    fn sites(count: u32) -> Vec<Arc<Site>> {
        let registry = SiteRegistry::new();
        for i in 0..count {
            registry.intern("src/lib.rs", &format!("site_{i}"), i);
        }
        registry.snapshot()
    }

    fn compute(
        sites_table: &[Arc<Site>],
        threads: Vec<ThreadEvents>,
        settings: ResultSettings,
    ) -> ResultTables {
        let end_time = threads
            .iter()
            .flat_map(|t| t.events.iter().map(|e| e.t_exit))
            .max()
            .unwrap_or(0);
        compute_tables(
            sites_table,
            threads,
            settings,
            0,
            end_time,
            ResultMeta::default(),
        )
    }

    mod attribution {
        use super::*;

        #[test]
        fn single_event_is_a_root_with_full_exclusive() {
            let attributed = attribute_thread(&[event(0, 10, 30)]).unwrap();

            assert_eq!(attributed.len(), 1);
            assert_eq!(attributed[0].duration, 20);
            assert_eq!(attributed[0].exclusive, 20);
            assert!(attributed[0].root);
        }

        #[test]
        fn child_time_is_subtracted_from_parent() {
            // Child [10, 20] inside parent [0, 30]; child exits first.
            let attributed =
                attribute_thread(&[event(1, 10, 20), event(0, 0, 30)]).unwrap();

            let child = attributed[0];
            let parent = attributed[1];

            assert_eq!(child.duration, 10);
            assert_eq!(child.exclusive, 10);
            assert!(!child.root);

            assert_eq!(parent.duration, 30);
            assert_eq!(parent.exclusive, 20);
            assert!(parent.root);
        }

        #[test]
        fn sequential_siblings_are_both_children_of_the_parent() {
            // Parent [0, 100] runs child A [10, 20] then child B [30, 50].
            let attributed =
                attribute_thread(&[event(1, 10, 20), event(2, 30, 50), event(0, 0, 100)])
                    .unwrap();

            assert_eq!(attributed[2].exclusive, 100 - 10 - 20);
            assert!(attributed[2].root);
            assert!(!attributed[0].root);
            assert!(!attributed[1].root);
        }

        #[test]
        fn grandchildren_are_not_double_counted() {
            // grandchild [20, 30] in child [10, 50] in parent [0, 100].
            let attributed = attribute_thread(&[
                event(2, 20, 30),
                event(1, 10, 50),
                event(0, 0, 100),
            ])
            .unwrap();

            assert_eq!(attributed[0].exclusive, 10);
            assert_eq!(attributed[1].exclusive, 40 - 10);
            // The parent subtracts only its direct child's inclusive time.
            assert_eq!(attributed[2].exclusive, 100 - 40);
        }

        #[test]
        fn recursion_chain_attributes_each_level() {
            // Four nested calls of the same site, each doing 5 units of its
            // own work before recursing; every level returns at t = 20.
            // Inclusive times are 5, 10, 15, 20; exclusive is 5 at each level.
            let attributed = attribute_thread(&[
                event(0, 15, 20),
                event(0, 10, 20),
                event(0, 5, 20),
                event(0, 0, 20),
            ])
            .unwrap();

            let durations: Vec<u64> = attributed.iter().map(|e| e.duration).collect();
            assert_eq!(durations, vec![5, 10, 15, 20]);
            assert!(attributed.iter().all(|e| e.exclusive == 5));
            assert_eq!(attributed.iter().filter(|e| e.root).count(), 1);
            assert!(attributed[3].root);
        }

        #[test]
        fn multiple_roots_on_one_thread() {
            let attributed =
                attribute_thread(&[event(0, 0, 10), event(0, 20, 30), event(0, 40, 50)])
                    .unwrap();

            assert_eq!(attributed.iter().filter(|e| e.root).count(), 3);
        }

        #[test]
        fn zero_duration_events_are_valid() {
            let attributed = attribute_thread(&[event(1, 5, 5), event(0, 0, 10)]).unwrap();

            assert_eq!(attributed[0].duration, 0);
            assert_eq!(attributed[1].exclusive, 10);
        }

        #[test]
        fn partial_overlap_is_malformed() {
            // [5, 15] and [10, 20] overlap without nesting.
            assert_eq!(
                attribute_thread(&[event(0, 5, 15), event(1, 10, 20)]),
                Err(MalformedStream)
            );
        }

        #[test]
        fn exit_order_violation_is_malformed() {
            assert_eq!(
                attribute_thread(&[event(0, 0, 30), event(1, 5, 10)]),
                Err(MalformedStream)
            );
        }

        #[test]
        fn exit_before_enter_is_malformed() {
            assert_eq!(
                attribute_thread(&[event(0, 10, 5)]),
                Err(MalformedStream)
            );
        }

        #[test]
        fn empty_stream_attributes_to_nothing() {
            assert_eq!(attribute_thread(&[]).unwrap().len(), 0);
        }
    }

    mod table_computation {
        use super::*;

        #[test]
        fn groups_calls_and_threads_per_site() {
            let sites_table = sites(1);
            let threads = vec![
                ThreadEvents {
                    thread_id: 0,
                    events: vec![event(0, 0, 10), event(0, 20, 30)],
                },
                ThreadEvents {
                    thread_id: 1,
                    events: vec![event(0, 0, 10)],
                },
            ];

            let tables = compute(&sites_table, threads, ResultSettings::default());

            assert_eq!(tables.summary.len(), 1);
            let row = &tables.summary[0];
            assert_eq!(row.calls, 3);
            assert_eq!(row.threads, 2);
            assert_eq!(row.time_active_all, 30);
            assert_eq!(row.time_active_exclusive_all, 30);
        }

        #[test]
        fn time_tracked_sums_root_exclusives_across_threads() {
            let sites_table = sites(2);
            let threads = vec![
                ThreadEvents {
                    thread_id: 0,
                    // Child [10, 20] inside root [0, 30]: root exclusive 20.
                    events: vec![event(1, 10, 20), event(0, 0, 30)],
                },
                ThreadEvents {
                    thread_id: 1,
                    // Lone root: exclusive 40.
                    events: vec![event(0, 0, 40)],
                },
            ];

            let tables = compute(&sites_table, threads, ResultSettings::default());

            assert_eq!(tables.time_tracked, 20 + 40);
        }

        #[test]
        fn nested_pair_produces_expected_rows() {
            // Parent sleeps then calls child, five times over.
            let sites_table = sites(2);
            let mut events = Vec::new();
            for i in 0..5_i64 {
                let base = i * 100;
                events.push(event(1, base + 5, base + 10));
                events.push(event(0, base, base + 10));
            }
            let threads = vec![ThreadEvents {
                thread_id: 0,
                events,
            }];

            let tables = compute(&sites_table, threads, ResultSettings::default());

            assert_eq!(tables.summary.len(), 2);
            let parent = tables
                .summary
                .iter()
                .find(|r| r.site.function_name() == "site_0")
                .unwrap();
            let child = tables
                .summary
                .iter()
                .find(|r| r.site.function_name() == "site_1")
                .unwrap();

            assert_eq!(parent.calls, 5);
            assert_eq!(parent.time_active_all, 50);
            assert_eq!(parent.time_active_exclusive_all, 25);
            assert_eq!(child.time_active_all, 25);
            assert_eq!(child.time_active_exclusive_all, 25);
        }

        #[test]
        fn rows_sort_by_exclusive_time_descending() {
            let sites_table = sites(3);
            let threads = vec![ThreadEvents {
                thread_id: 0,
                events: vec![
                    event(2, 0, 10),
                    event(1, 20, 120),
                    event(0, 200, 250),
                ],
            }];

            let tables = compute(&sites_table, threads, ResultSettings::default());

            let order: Vec<_> = tables
                .summary
                .iter()
                .map(|r| r.time_active_exclusive_all)
                .collect();
            assert_eq!(order, vec![100, 50, 10]);
        }

        #[test]
        fn tie_on_exclusive_time_breaks_by_site_id() {
            let sites_table = sites(2);
            let threads = vec![ThreadEvents {
                thread_id: 0,
                events: vec![event(1, 0, 10), event(0, 20, 30)],
            }];

            let tables = compute(&sites_table, threads, ResultSettings::default());

            assert_eq!(tables.summary[0].site.function_name(), "site_0");
            assert_eq!(tables.summary[1].site.function_name(), "site_1");
        }

        #[test]
        fn percent_filter_drops_small_contributors() {
            // 5 x 5 units of "small" plus 10 x 10 units of "large".
            let sites_table = sites(2);
            let mut events = Vec::new();
            for i in 0..5_i64 {
                events.push(event(0, i * 20, i * 20 + 5));
            }
            for i in 0..10_i64 {
                events.push(event(1, 1_000 + i * 20, 1_000 + i * 20 + 10));
            }
            let threads = vec![ThreadEvents {
                thread_id: 0,
                events,
            }];

            let settings = ResultSettings {
                min_percent_active_exclusive: 25.0,
                ..ResultSettings::default()
            };
            let tables = compute(&sites_table, threads, settings);

            assert_eq!(tables.summary.len(), 1);
            assert_eq!(tables.summary[0].site.function_name(), "site_1");
            assert_eq!(tables.details.len(), 1);
        }

        #[test]
        fn percent_columns_cover_surviving_rows() {
            let sites_table = sites(2);
            let threads = vec![ThreadEvents {
                thread_id: 0,
                events: vec![event(0, 0, 75), event(1, 100, 125)],
            }];

            let tables = compute(&sites_table, threads, ResultSettings::default());

            let total: f64 = tables.summary.iter().map(|r| r.percent_ae_all).sum();
            assert!((total - 100.0).abs() < 1e-9);
            assert!((tables.summary[0].percent_ae_all - 75.0).abs() < 1e-9);

            let bracket_total: f64 = tables.summary.iter().map(|r| r.percent_ae_bracket).sum();
            assert!((bracket_total - 100.0).abs() < 1e-9);
        }

        #[test]
        fn malformed_thread_yields_diagnostic_empty_result() {
            let sites_table = sites(2);
            let threads = vec![
                ThreadEvents {
                    thread_id: 0,
                    events: vec![event(0, 0, 10)],
                },
                ThreadEvents {
                    thread_id: 1,
                    // Partial overlap: malformed.
                    events: vec![event(0, 5, 15), event(1, 10, 20)],
                },
            ];

            let tables = compute(&sites_table, threads, ResultSettings::default());

            assert!(tables.summary.is_empty());
            assert!(tables.details.is_empty());
            assert_eq!(tables.meta.malformed_threads, 1);
            assert_eq!(tables.time_tracked, 0);
        }

        #[test]
        fn sites_with_zero_exclusive_time_remain() {
            let sites_table = sites(2);
            // The parent's time is fully consumed by the child.
            let threads = vec![ThreadEvents {
                thread_id: 0,
                events: vec![event(1, 0, 10), event(0, 0, 10)],
            }];

            let tables = compute(&sites_table, threads, ResultSettings::default());

            assert_eq!(tables.summary.len(), 2);
            let parent = tables
                .summary
                .iter()
                .find(|r| r.site.function_name() == "site_0")
                .unwrap();
            assert_eq!(parent.time_active_exclusive_all, 0);
        }

        #[test]
        fn empty_drain_produces_empty_tables() {
            let sites_table = sites(1);
            let tables = compute_tables(
                &sites_table,
                Vec::new(),
                ResultSettings::default(),
                0,
                1_000,
                ResultMeta::default(),
            );

            assert!(tables.summary.is_empty());
            assert_eq!(tables.time_total, 1_000);
            assert_eq!(tables.time_tracked, 0);
        }

        #[test]
        fn meta_counters_pass_through() {
            let sites_table = sites(1);
            let meta = ResultMeta {
                lost_events: 3,
                clock_anomalies: 2,
                malformed_threads: 0,
            };

            let tables = compute_tables(
                &sites_table,
                vec![ThreadEvents {
                    thread_id: 0,
                    events: vec![event(0, 0, 10)],
                }],
                ResultSettings::default(),
                0,
                10,
                meta,
            );

            assert_eq!(tables.meta.lost_events, 3);
            assert_eq!(tables.meta.clock_anomalies, 2);
            assert_eq!(tables.summary.len(), 1);
        }

        #[test]
        fn detail_statistics_match_bracket_rules() {
            let sites_table = sites(1);
            // 100 events with exclusive durations 1..=100.
            let events: Vec<RawEvent> = (0..100_i64)
                .map(|i| event(0, i * 1_000, i * 1_000 + i + 1))
                .collect();
            let threads = vec![ThreadEvents {
                thread_id: 0,
                events,
            }];

            let settings = ResultSettings {
                non_center_percent: 10,
                ..ResultSettings::default()
            };
            let tables = compute(&sites_table, threads, settings);

            let details = &tables.details[0];
            assert_eq!(details.fastest_range, 10);
            assert_eq!(details.slowest_range, 90);
            assert_eq!(details.fastest_min, 1);
            assert_eq!(details.center_min, 11);
            assert_eq!(details.center_max, 90);
            assert_eq!(details.slowest_max, 100);
            assert_eq!(details.time_accumulated, (1..=100).sum::<u64>());
        }
    }
}
