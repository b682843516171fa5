//! Platform abstraction trait definitions.

use std::fmt::Debug;

/// Provides monotonic timestamps for the capture path.
///
/// This trait abstracts the underlying platform clock, allowing for both the
/// real implementation (backed by the operating system's monotonic clock)
/// and a fake implementation whose time is controlled by tests.
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Current timestamp in nanoseconds since an arbitrary per-platform epoch.
    ///
    /// Values returned by one platform instance never decrease.
    fn monotonic_nanos(&self) -> i64;
}
