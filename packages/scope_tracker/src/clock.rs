//! Monotonic nanosecond clock over the platform abstraction.

use crate::pal::{Platform, PlatformFacade};

/// A clock producing monotonic `i64` nanosecond timestamps.
///
/// This is the only time source on the capture path, so it is queried twice
/// per instrumented scope and must stay cheap. Timestamps count nanoseconds
/// since an arbitrary epoch fixed at clock construction; only differences
/// between timestamps from the same clock are meaningful.
#[derive(Clone, Debug)]
pub(crate) struct Clock {
    inner: PlatformFacade,
}

impl Clock {
    pub(crate) fn from_pal(pal: &PlatformFacade) -> Self {
        Self { inner: pal.clone() }
    }

    /// Current timestamp in nanoseconds since this clock's epoch.
    #[inline]
    pub(crate) fn now_ns(&self) -> i64 {
        self.inner.monotonic_nanos()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::pal::FakePlatform;

    #[test]
    fn real_clock_is_non_decreasing() {
        let clock = Clock::from_pal(&PlatformFacade::real());

        let first = clock.now_ns();
        let second = clock.now_ns();

        assert!(second >= first);
    }

    #[test]
    fn fake_clock_reports_controlled_time() {
        let fake = FakePlatform::new();
        let clock = Clock::from_pal(&PlatformFacade::fake(fake.clone()));

        assert_eq!(clock.now_ns(), 0);

        fake.advance(1_000);
        assert_eq!(clock.now_ns(), 1_000);
    }

    #[test]
    fn clones_share_the_epoch() {
        let fake = FakePlatform::new();
        fake.set_nanos(77);

        let clock = Clock::from_pal(&PlatformFacade::fake(fake));
        let clone = clock.clone();

        assert_eq!(clock.now_ns(), clone.now_ns());
    }
}
