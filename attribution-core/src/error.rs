use std::{
    backtrace::Backtrace,
    fmt::{Debug, Display},
};

use thiserror::Error;

use crate::helpers::transport::OpTag;

/// An error raised by the attribution protocol.
///
/// There are other error types for some of the other modules:
///  * `attribution_core::helpers::Error`, for the channel between parties
///  * `config::ConfigError`, for configuration sources
///
/// Configuration errors and contract violations are raised before any secure operation is issued.
/// Desynchronization and infrastructure errors are fatal to the run and are never retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid attribution rule name: {0}")]
    InvalidRuleName(String),
    #[error(transparent)]
    Length(#[from] LengthError),
    #[error("lane count mismatch: expected {expected} lanes, got {actual}")]
    LaneMismatch { expected: usize, actual: usize },
    #[error("{0} must be supplied by its owner")]
    MissingInput(&'static str),
    #[error("value {value} does not fit into {bits} bits")]
    FieldValueTruncation { value: u128, bits: usize },
    #[error("protocol desynchronization: expected {expected}, peer sent {actual}")]
    ProtocolDesynchronization { expected: OpTag, actual: OpTag },
    #[error("channel error: {0}")]
    Transport(#[from] crate::helpers::Error),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("failed to parse json: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("runtime error")]
    RuntimeError(#[from] tokio::task::JoinError),
}

impl Error {
    /// Returns `true` if the error leaves the peers in an unknown state, i.e. a fresh session
    /// coordinated by all parties is needed before anything else can be computed.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ProtocolDesynchronization { .. } | Error::Transport(_) | Error::RuntimeError(_)
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct LengthError {
    pub expected: usize,
    pub actual: usize,
}

impl Display for LengthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expected {} items, got {}", self.expected, self.actual)
    }
}

impl std::error::Error for LengthError {}

impl LengthError {
    /// Returns `Ok(())` when `actual == expected`.
    ///
    /// ## Errors
    /// If the two lengths differ.
    pub fn check(expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self { expected, actual })
        }
    }
}

/// Set up a global panic hook that dumps the panic information to our tracing subsystem if it is
/// available and duplicates that to standard error output.
///
/// Note that it is not possible to reliably test panic hooks because Rust test runner uses more
/// than one thread by default.
///
/// ## Panics
/// If caller thread is panicking while calling this function.
pub fn set_global_panic_hook() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let backtrace = Backtrace::force_capture();

        let cur_thread = std::thread::current();
        tracing::error!(
            "{thread_id:?} \"{thread_name}\" {panic_info}\nstack trace:\n{backtrace}",
            thread_id = cur_thread.id(),
            thread_name = cur_thread.name().unwrap_or("<no_name>")
        );
        (default_hook)(panic_info);
    }));
}

#[cfg(all(test, unit_test))]
mod tests {
    use super::{Error, LengthError};

    #[test]
    fn length_check() {
        assert_eq!(Ok(()), LengthError::check(3, 3));
        assert_eq!(
            Err(LengthError {
                expected: 3,
                actual: 2
            }),
            LengthError::check(3, 2)
        );
    }

    #[test]
    fn configuration_errors_are_not_fatal() {
        assert!(!Error::InvalidRuleName("last_view_1d".into()).is_fatal());
        assert!(
            !Error::Length(LengthError {
                expected: 1,
                actual: 0
            })
            .is_fatal()
        );
        assert!(Error::Transport(crate::helpers::Error::PeerDisconnected).is_fatal());
    }
}
