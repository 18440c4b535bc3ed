//! Platform abstraction trait definitions.

use std::fmt::Debug;
use std::time::Duration;

/// Provides the clocks that benchmark timers read.
///
/// Both clocks return the time elapsed since some arbitrary fixed origin. Only differences
/// between two readings taken on the same thread are meaningful.
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Reads the monotonic wall clock.
    fn real_time(&self) -> Duration;

    /// Reads the processor time consumed so far by the calling thread.
    fn thread_cpu_time(&self) -> Duration;
}
