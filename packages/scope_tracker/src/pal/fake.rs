//! Fake platform implementation for testing.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::pal::abstractions::Platform;

/// Fake implementation of the platform abstraction for testing.
///
/// Tests control the timestamp value instead of relying on the real clock.
/// Multiple clones of the same `FakePlatform` share the same underlying time
/// state, allowing tests to advance time after platform creation to simulate
/// time progression during measurement.
#[derive(Clone, Debug)]
pub(crate) struct FakePlatform {
    nanos: Arc<Mutex<i64>>,
}

impl FakePlatform {
    /// Creates a new fake platform with the timestamp at zero.
    pub(crate) fn new() -> Self {
        Self {
            nanos: Arc::new(Mutex::new(0)),
        }
    }

    /// Sets the current timestamp value, affecting all clones of this platform.
    pub(crate) fn set_nanos(&self, nanos: i64) {
        *self.nanos.lock() = nanos;
    }

    /// Advances the current timestamp value, affecting all clones of this platform.
    pub(crate) fn advance(&self, nanos: i64) {
        *self.nanos.lock() += nanos;
    }
}

impl Platform for FakePlatform {
    fn monotonic_nanos(&self) -> i64 {
        *self.nanos.lock()
    }
}
