use std::time::Duration;

#[cfg(test)]
use crate::pal::FakePlatform;
use crate::pal::{Platform, RealPlatform};

/// Dispatches clock reads either to the operating system or, in tests, to a fake platform.
#[derive(Clone, Debug)]
pub(crate) enum PlatformFacade {
    Real(RealPlatform),

    #[cfg(test)]
    Fake(FakePlatform),
}

impl PlatformFacade {
    pub(crate) fn real() -> Self {
        Self::Real(RealPlatform::new())
    }

    #[cfg(test)]
    pub(crate) fn fake(platform: FakePlatform) -> Self {
        Self::Fake(platform)
    }
}

impl Platform for PlatformFacade {
    fn real_time(&self) -> Duration {
        match self {
            Self::Real(p) => p.real_time(),
            #[cfg(test)]
            Self::Fake(p) => p.real_time(),
        }
    }

    fn thread_cpu_time(&self) -> Duration {
        match self {
            Self::Real(p) => p.thread_cpu_time(),
            #[cfg(test)]
            Self::Fake(p) => p.thread_cpu_time(),
        }
    }
}
