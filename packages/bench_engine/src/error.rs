use thiserror::Error;

/// Errors that can occur when configuring the benchmark engine.
///
/// Misuse of the benchmark body contract (for example, calling
/// [`State::pause_timing()`][crate::State::pause_timing] while the timer is already paused) is
/// a programming error and panics instead of surfacing here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A configuration option had an unknown name or an unusable value.
    #[error("invalid option '{key}': {problem}")]
    InvalidOption {
        /// The name of the option as it appeared in the configuration.
        key: String,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// The configuration text was not valid TOML.
    #[error("configuration is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A specialized `Result` type for benchmark engine operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
