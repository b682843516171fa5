//! The process-wide profiler context and the public entry points.

use std::mem;
use std::path::Path;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::aggregator::compute_tables;
use crate::buffer::{RawEvent, ThreadEvents};
use crate::clock::Clock;
use crate::codec;
use crate::error::Result;
use crate::pal::PlatformFacade;
use crate::site::{SiteId, SiteRegistry};
use crate::tables::{ResultMeta, ResultSettings, ResultTables};
use crate::thread_registry::{RegisteredLog, ThreadRegistry};

/// Process-wide profiler state: the clock, both registries, the measurement
/// window and the capture diagnostics.
///
/// There is exactly one instance for the process, created lazily on first
/// use. Computing results (or saving events) drains the buffers and restarts
/// the measurement window, so consecutive computations measure consecutive
/// windows; [`reset`] does the same while discarding the events.
#[derive(Debug)]
pub(crate) struct Profiler {
    clock: Clock,
    sites: SiteRegistry,
    threads: ThreadRegistry,
    window_start: Mutex<i64>,
    lost_events: AtomicU64,
    clock_anomalies: AtomicU64,
}

/// Everything taken out of the buffers by one drain.
struct Drained {
    threads: Vec<ThreadEvents>,
    start_time: i64,
    end_time: i64,
    meta: ResultMeta,
}

impl Profiler {
    fn new(pal: &PlatformFacade) -> Self {
        let clock = Clock::from_pal(pal);
        let window_start = clock.now_ns();

        Self {
            clock,
            sites: SiteRegistry::new(),
            threads: ThreadRegistry::new(),
            window_start: Mutex::new(window_start),
            lost_events: AtomicU64::new(0),
            clock_anomalies: AtomicU64::new(0),
        }
    }

    pub(crate) fn global() -> &'static Self {
        static GLOBAL: OnceLock<Profiler> = OnceLock::new();
        GLOBAL.get_or_init(|| Self::new(&PlatformFacade::real()))
    }

    /// Drains every thread's events and closes the measurement window.
    ///
    /// The next window starts at this drain's end timestamp, so consecutive
    /// result computations measure consecutive windows.
    fn drain(&self) -> Drained {
        let threads = self.threads.drain_all();
        let end_time = self.clock.now_ns();
        let start_time = mem::replace(&mut *self.window_start.lock(), end_time);

        let meta = ResultMeta {
            lost_events: self.lost_events.swap(0, Ordering::Relaxed),
            clock_anomalies: self.clock_anomalies.swap(0, Ordering::Relaxed),
            malformed_threads: 0,
        };

        Drained {
            threads,
            start_time,
            end_time,
            meta,
        }
    }

    fn compute(&self, settings: ResultSettings) -> Result<ResultTables> {
        settings.validate()?;

        let drained = self.drain();
        let sites = self.sites.snapshot();

        Ok(compute_tables(
            &sites,
            drained.threads,
            settings,
            drained.start_time,
            drained.end_time,
            drained.meta,
        ))
    }
}

thread_local! {
    static LOCAL_LOG: LocalLog = LocalLog::new();
}

/// A thread's registration with the global profiler, created lazily on the
/// thread's first event and retired when the thread exits.
#[derive(Debug)]
struct LocalLog {
    registration: RegisteredLog,
}

impl LocalLog {
    fn new() -> Self {
        Self {
            registration: Profiler::global().threads.register(),
        }
    }
}

impl Drop for LocalLog {
    fn drop(&mut self) {
        // Events this thread produced but nobody drained move to the orphan
        // holding area; the next aggregation merges them.
        Profiler::global()
            .threads
            .retire(self.registration.thread_id, &self.registration.log);
    }
}

/// Current timestamp on the profiler clock.
#[inline]
pub(crate) fn now_ns() -> i64 {
    Profiler::global().clock.now_ns()
}

/// Records one closed scope into the current thread's event log.
///
/// An exit timestamp before the enter timestamp is clamped to the enter
/// timestamp and counted as a clock anomaly rather than surfaced as an error.
#[inline]
pub(crate) fn record_scope(site: SiteId, t_enter: i64, t_exit: i64) {
    let profiler = Profiler::global();

    let t_exit = if t_exit < t_enter {
        profiler.clock_anomalies.fetch_add(1, Ordering::Relaxed);
        t_enter
    } else {
        t_exit
    };

    let event = RawEvent {
        site,
        t_enter,
        t_exit,
    };

    let appended = LOCAL_LOG.try_with(|local| {
        local
            .registration
            .log
            .append(event, &profiler.lost_events);
    });

    if appended.is_err() {
        // The thread is tearing down its locals; the log is already retired.
        profiler.lost_events.fetch_add(1, Ordering::Relaxed);
    }
}

/// Interns an instrumentation site, returning its stable handle.
///
/// Subsequent calls with the same (filename, name, line) return the same
/// handle. The [`scope!`](crate::scope) macro calls this once per occurrence
/// and caches the result; call it directly when creating
/// [`ScopeGuard`](crate::ScopeGuard)s by hand.
pub fn intern_site(filename: &str, function_name: &str, line: u32) -> SiteId {
    Profiler::global().sites.intern(filename, function_name, line)
}

/// Computes the result tables for the current measurement window.
///
/// Drains and consumes every thread's recorded events: a second call right
/// after returns empty tables for the next window.
///
/// # Errors
///
/// Returns [`Error::InvalidSettings`](crate::Error::InvalidSettings) when a
/// setting is outside its documented range; no events are consumed then.
///
/// # Examples
///
/// ```
/// use scope_tracker::{ResultSettings, scope};
///
/// {
///     scope!("tracked_work");
/// }
///
/// let tables = scope_tracker::collect_tables(ResultSettings::default()).unwrap();
/// assert_eq!(tables.summary.len(), 1);
/// assert_eq!(tables.summary[0].calls, 1);
/// ```
pub fn collect_tables(settings: ResultSettings) -> Result<ResultTables> {
    Profiler::global().compute(settings)
}

/// Computes results with default settings and renders them as text.
///
/// Drains and consumes the recorded events, like [`collect_tables`].
#[must_use]
pub fn results_to_string() -> String {
    Profiler::global()
        .compute(ResultSettings::default())
        .expect("default settings are always valid")
        .to_string()
}

/// Computes results with default settings and prints them to stdout.
///
/// Drains and consumes the recorded events, like [`collect_tables`].
#[cfg_attr(test, mutants::skip)] // Stdout output is verified manually.
pub fn print_results() {
    let tables = Profiler::global()
        .compute(ResultSettings::default())
        .expect("default settings are always valid");
    print!("{tables}");
}

/// Persists the raw recorded events to a binary file.
///
/// Drains and consumes the events (a subsequent in-memory computation sees
/// an empty window); the file can be loaded later with [`tables_from_file`]
/// or [`print_results_from_file`], in this process or another one.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn save_to_file(path: impl AsRef<Path>) -> Result<()> {
    let profiler = Profiler::global();
    let drained = profiler.drain();
    let sites = profiler.sites.snapshot();

    codec::write_events(
        path.as_ref(),
        &sites,
        &drained.threads,
        drained.start_time,
        drained.end_time,
    )
}

/// Loads persisted events and computes result tables from them.
///
/// The file's sites are re-interned into this process's site registry, so a
/// file can be analyzed by a process that never executed the instrumented
/// code. In-memory recorded events are not touched.
///
/// # Errors
///
/// Returns [`Error::InvalidSettings`](crate::Error::InvalidSettings) for
/// out-of-range settings, or a format error ([`BadMagic`], [`UnsupportedVersion`],
/// [`Truncated`], [`ChecksumMismatch`], [`MalformedEventStream`]) when the
/// file is not a well-formed event file; nothing is merged in that case.
///
/// [`BadMagic`]: crate::Error::BadMagic
/// [`UnsupportedVersion`]: crate::Error::UnsupportedVersion
/// [`Truncated`]: crate::Error::Truncated
/// [`ChecksumMismatch`]: crate::Error::ChecksumMismatch
/// [`MalformedEventStream`]: crate::Error::MalformedEventStream
pub fn tables_from_file(path: impl AsRef<Path>, settings: ResultSettings) -> Result<ResultTables> {
    settings.validate()?;

    let file = codec::read_events(path.as_ref())?;

    let profiler = Profiler::global();
    let site_mapping: Vec<SiteId> = file
        .sites
        .iter()
        .map(|site| {
            profiler
                .sites
                .intern(&site.filename, &site.function_name, site.line)
        })
        .collect();

    let threads = file
        .threads
        .into_iter()
        .map(|thread| ThreadEvents {
            thread_id: thread.thread_id,
            events: thread
                .events
                .into_iter()
                .map(|event| RawEvent {
                    site: site_mapping[event.site_index],
                    t_enter: event.t_enter,
                    t_exit: event.t_exit,
                })
                .collect(),
        })
        .collect();

    let sites = profiler.sites.snapshot();

    Ok(compute_tables(
        &sites,
        threads,
        settings,
        file.start_time,
        file.end_time,
        ResultMeta::default(),
    ))
}

/// Loads persisted events, computes results with default settings and prints
/// them to stdout.
///
/// # Errors
///
/// Same as [`tables_from_file`].
#[cfg_attr(test, mutants::skip)] // Stdout output is verified manually.
pub fn print_results_from_file(path: impl AsRef<Path>) -> Result<()> {
    let tables = tables_from_file(path, ResultSettings::default())?;
    print!("{tables}");
    Ok(())
}

/// Discards all pending events and restarts the measurement window.
///
/// Interned sites are kept: site handles stay valid for the process
/// lifetime. Intended for tests and for applications that want to exclude a
/// warm-up phase from the first measurement.
pub fn reset() {
    let _ = Profiler::global().drain();
}
