//! The scope guard: the capture path of the profiler.

use std::marker::PhantomData;

use crate::profiler;
use crate::site::SiteId;

/// A guard that times a scope: enter timestamp at construction, exit
/// timestamp and event emission on drop.
///
/// Exactly one event is recorded per guard, on every exit path of the scope
/// (normal fallthrough, early `return`, `?`, and unwinding), because drop
/// glue runs in all of those cases. The cost is two clock reads and one
/// append to the current thread's event log.
///
/// Normally created through the [`scope!`](crate::scope) macro, which interns
/// the site once and caches the handle; constructing guards directly is
/// useful when the site handle is obtained dynamically.
///
/// # Examples
///
/// ```
/// use scope_tracker::ScopeGuard;
///
/// let site = scope_tracker::intern_site("src/lib.rs", "manual_scope", 7);
/// {
///     let _guard = ScopeGuard::enter(site);
///     // Work measured from here until the end of the block.
/// }
/// ```
#[derive(Debug)]
#[must_use = "the scope is timed between creation and drop"]
pub struct ScopeGuard {
    site: SiteId,
    t_enter: i64,

    _single_threaded: PhantomData<*const ()>,
}

impl ScopeGuard {
    /// Starts timing a scope for the given site.
    #[inline]
    pub fn enter(site: SiteId) -> Self {
        Self {
            site,
            t_enter: profiler::now_ns(),
            _single_threaded: PhantomData,
        }
    }
}

impl Drop for ScopeGuard {
    #[inline]
    fn drop(&mut self) {
        let t_exit = profiler::now_ns();
        profiler::record_scope(self.site, self.t_enter, t_exit);
    }
}
