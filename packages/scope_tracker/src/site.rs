//! Instrumentation sites and the process-wide site registry.

use std::fmt;
use std::sync::Arc;

use foldhash::{HashMap, HashMapExt};
use parking_lot::Mutex;

/// Handle of an instrumentation site.
///
/// Handles are small integers, stable for the lifetime of the process, and
/// index into an append-only site table. The `scope!` macro caches the handle
/// per call site, so after the first execution the capture path only ever
/// copies this integer.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SiteId(u32);

impl SiteId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("more than u32::MAX instrumentation sites in one process"))
    }

    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub(crate) fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An instrumentation site: one `scope!` occurrence in the source.
///
/// Sites are identified by (filename, line, name); two occurrences that
/// differ only by location are distinct sites. The default name is the
/// enclosing function; an explicit name passed to `scope!` overrides it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Site {
    filename: String,
    function_name: String,
    line: u32,
}

impl Site {
    /// Source file containing the site.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Display name of the site (enclosing function unless overridden).
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Source line of the site.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.filename, self.line, self.function_name)
    }
}

/// Append-only table of instrumentation sites, keyed by (filename, line, name).
///
/// Interning locks a mutex, which is acceptable because each call site goes
/// through it once and caches the returned handle. Everything after that is
/// handle-indexed reads on snapshots.
#[derive(Debug)]
pub(crate) struct SiteRegistry {
    inner: Mutex<SiteTable>,
}

#[derive(Debug)]
struct SiteTable {
    by_key: HashMap<(String, String, u32), SiteId>,
    sites: Vec<Arc<Site>>,
}

impl SiteRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(SiteTable {
                by_key: HashMap::new(),
                sites: Vec::new(),
            }),
        }
    }

    /// Returns the handle for the given site, creating it on first use.
    pub(crate) fn intern(&self, filename: &str, function_name: &str, line: u32) -> SiteId {
        let mut table = self.inner.lock();

        if let Some(id) = table
            .by_key
            .get(&(filename.to_string(), function_name.to_string(), line))
        {
            return *id;
        }

        let id = SiteId::new(table.sites.len());
        table.sites.push(Arc::new(Site {
            filename: filename.to_string(),
            function_name: function_name.to_string(),
            line,
        }));
        table
            .by_key
            .insert((filename.to_string(), function_name.to_string(), line), id);

        id
    }

    /// Snapshot of the site table, indexable by [`SiteId::index`].
    pub(crate) fn snapshot(&self) -> Vec<Arc<Site>> {
        self.inner.lock().sites.clone()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(SiteRegistry: Send, Sync);
    assert_impl_all!(Site: Send, Sync);

    #[test]
    fn intern_returns_stable_handles() {
        let registry = SiteRegistry::new();

        let a = registry.intern("src/lib.rs", "alpha", 10);
        let b = registry.intern("src/lib.rs", "beta", 20);
        let a_again = registry.intern("src/lib.rs", "alpha", 10);

        assert_eq!(a, a_again);
        assert_ne!(a, b);
    }

    #[test]
    fn sites_differing_only_by_line_are_distinct() {
        let registry = SiteRegistry::new();

        let first = registry.intern("src/lib.rs", "work", 5);
        let second = registry.intern("src/lib.rs", "work", 6);

        assert_ne!(first, second);
    }

    #[test]
    fn snapshot_is_indexable_by_handle() {
        let registry = SiteRegistry::new();

        let id = registry.intern("src/main.rs", "run", 42);
        let sites = registry.snapshot();

        let site = &sites[id.index()];
        assert_eq!(site.filename(), "src/main.rs");
        assert_eq!(site.function_name(), "run");
        assert_eq!(site.line(), 42);
    }

    #[test]
    fn concurrent_first_use_interns_once() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(SiteRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.intern("src/lib.rs", "contended", 1))
            })
            .collect();

        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(registry.snapshot().len(), 1);
    }
}
