//! Real platform implementation backed by the standard library clock.

use std::time::Instant;

use crate::pal::abstractions::Platform;

/// The clock of the build target platform.
///
/// `std::time::Instant` is documented as monotonic on every supported target,
/// so a single anchor captured at construction gives us a strictly
/// non-decreasing nanosecond count.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform {
    anchor: Instant,
}

impl BuildTargetPlatform {
    pub(crate) fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Platform for BuildTargetPlatform {
    fn monotonic_nanos(&self) -> i64 {
        // A process would need to run for ~292 years to overflow i64 here.
        i64::try_from(self.anchor.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}
