//! Extension traits for containing failures at a unit boundary.
//!
//! Reconciliation favours forward progress: a failure inside one principal,
//! group, scope or cluster is logged and the loop moves on. These helpers are
//! the one place where that swallowing happens, so every swallowed error is
//! logged the same way.

use crate::error::Error;

/// Extension trait providing logged conversions for warden results.
pub trait ResultExt<T> {
    /// Convert to an Option, logging the error at `error` with context.
    fn log_failure(self, context: &str) -> Option<T>;

    /// Convert to an Option, logging the error at `warn` with context.
    fn log_warning(self, context: &str) -> Option<T>;

    /// Get the value or a default, logging the error if present.
    fn or_default_logged(self, default: T, context: &str) -> T;
}

impl<T> ResultExt<T> for Result<T, Error> {
    fn log_failure(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(error = %e, "{context}");
                None
            }
        }
    }

    fn log_warning(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "{context}");
                None
            }
        }
    }

    fn or_default_logged(self, default: T, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "{context}, using default");
                default
            }
        }
    }
}
