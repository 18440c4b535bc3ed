//! Platform abstraction layer for benchmark timing.
//!
//! The engine reads two clocks: a monotonic wall clock and the processor time consumed by
//! the calling thread. The real platform reads them from the operating system (the latter via
//! the `cpu_time` package), while tests substitute a fake platform whose clocks only move when
//! the test says so.

mod abstractions;
mod facade;
#[cfg(test)]
mod fake;
mod real;

pub(crate) use abstractions::Platform;
pub(crate) use facade::PlatformFacade;
#[cfg(test)]
pub(crate) use fake::FakePlatform;
pub(crate) use real::RealPlatform;
