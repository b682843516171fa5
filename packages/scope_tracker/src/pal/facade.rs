//! Facade dispatching platform calls to the real or fake implementation.

use std::sync::Arc;

#[cfg(test)]
use crate::pal::FakePlatform;
use crate::pal::{BuildTargetPlatform, Platform};

/// Enum facade over the available platform implementations.
///
/// Clones share the underlying platform instance, so every clone observes
/// the same epoch and, for fakes, the same controlled time.
#[derive(Clone, Debug)]
pub(crate) enum PlatformFacade {
    Real(Arc<BuildTargetPlatform>),

    #[cfg(test)]
    Fake(FakePlatform),
}

impl PlatformFacade {
    pub(crate) fn real() -> Self {
        Self::Real(Arc::new(BuildTargetPlatform::new()))
    }

    #[cfg(test)]
    pub(crate) fn fake(platform: FakePlatform) -> Self {
        Self::Fake(platform)
    }
}

impl Platform for PlatformFacade {
    fn monotonic_nanos(&self) -> i64 {
        match self {
            Self::Real(platform) => platform.monotonic_nanos(),

            #[cfg(test)]
            Self::Fake(platform) => platform.monotonic_nanos(),
        }
    }
}
