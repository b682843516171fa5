#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! # scope_tracker
//!
//! Mark scopes with a macro, get percentile-bracketed timing statistics
//! across every thread that executed them.
//!
//! The capture path is built to disappear into the application: a scope
//! records two clock reads and one append into a lock-free thread-local
//! event log - a slot write published by a single release-store - with no
//! locks and no allocation in the steady state. All the work happens later,
//! when results are requested: the per-thread logs are drained, scope
//! nesting is reconstructed from the timestamps, inclusive and exclusive
//! times are attributed, and per-site statistics are computed over the
//! fastest/center/slowest percentile brackets.
//!
//! # Example
//!
//! ```
//! use scope_tracker::scope;
//!
//! fn process_batch(items: &[u32]) -> u32 {
//!     scope!();
//!     items.iter().map(|item| transform(*item)).sum()
//! }
//!
//! fn transform(item: u32) -> u32 {
//!     scope!();
//!     item * 2
//! }
//!
//! for batch in [[1, 2, 3], [4, 5, 6]] {
//!     process_batch(&batch);
//! }
//!
//! // Render and print the aggregated statistics; this drains the buffers.
//! scope_tracker::print_results();
//! ```
//!
//! # Inclusive and exclusive time
//!
//! Every event carries its inclusive time (enter to exit) and its exclusive
//! time (inclusive minus the inclusive times of directly nested instrumented
//! scopes). When `transform()` above runs inside `process_batch()`, the
//! batch's exclusive time does not double-count the transforms. Scopes nest
//! per thread; work handed to another thread is attributed to that thread.
//!
//! # Structured results
//!
//! [`collect_tables`] returns the same data [`print_results`] renders:
//! a summary row and a detail-statistics entry per site, plus the
//! measurement window and capture diagnostics. Computing results consumes
//! the recorded events, so consecutive computations measure consecutive
//! windows.
//!
//! ```
//! use scope_tracker::{ResultSettings, scope};
//!
//! {
//!     scope!("interesting_work");
//! }
//!
//! let tables = scope_tracker::collect_tables(ResultSettings::default()).unwrap();
//! for row in &tables.summary {
//!     println!(
//!         "{} ran {} times over {} ns",
//!         row.site.function_name(),
//!         row.calls,
//!         row.time_active_all
//!     );
//! }
//! ```
//!
//! # Persistence
//!
//! [`save_to_file`] writes the raw drained events to a checksummed binary
//! file; [`tables_from_file`] and [`print_results_from_file`] replay such a
//! file through the aggregator, in the recording process or a different one.
//!
//! # Overhead
//!
//! An instrumented scope costs tens of nanoseconds on typical hardware; the
//! included `capture_overhead` benchmark measures it on yours. Instrument
//! scopes that do meaningful work rather than single arithmetic operations,
//! or the measurement overhead will dominate the numbers.

mod aggregator;
mod buffer;
mod clock;
mod codec;
mod error;
mod guard;
mod macros;
mod pal;
mod profiler;
mod report;
mod site;
mod stats;
mod tables;
mod thread_registry;

pub use error::{Error, Result};
pub use guard::ScopeGuard;
pub use profiler::{
    collect_tables, intern_site, print_results, print_results_from_file, reset,
    results_to_string, save_to_file, tables_from_file,
};
pub use site::{Site, SiteId};
pub use tables::{DetailStats, ResultMeta, ResultSettings, ResultTables, SummaryRow};
