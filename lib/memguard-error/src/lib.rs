//! Shared error plumbing for the workspace.
//!
//! Most failures are modeled as dedicated `snafu` enums next to the code that produces them. For the seams where a
//! caller hands us something opaque (a host-provided limit source, a configuration provider), errors are carried as a
//! [`GenericError`] instead.
#![deny(warnings)]
#![deny(missing_docs)]

use std::fmt::Display;

/// An opaque, type-erased error.
pub type GenericError = anyhow::Error;

/// Constructs a [`GenericError`].
///
/// Accepts a string literal, a format string followed by its arguments, or an existing value implementing `Debug` and
/// `Display`. When given a value implementing `std::error::Error`, its source chain is preserved.
#[macro_export]
macro_rules! generic_error {
    ($msg:literal $(,)?) => { $crate::__private_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::__private_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::__private_anyhow!($fmt, $($arg)*) };
}

#[doc(hidden)]
pub use anyhow::anyhow as __private_anyhow;

mod private {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

/// Extension methods for attaching context to fallible results.
///
/// This mirrors `anyhow::Context` under different method names, so it can be imported alongside `snafu::ResultExt`
/// without the two colliding.
pub trait ErrorContext<T, E>: private::Sealed {
    /// Wraps the error value, if any, with the given context.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Wraps the error value, if any, with context built lazily by `f`.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        anyhow::Context::context(self, context)
    }

    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        anyhow::Context::with_context(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorContext as _, GenericError};

    #[test]
    fn macro_forms() {
        let literal: GenericError = generic_error!("limit source unavailable");
        assert_eq!(literal.to_string(), "limit source unavailable");

        let formatted: GenericError = generic_error!("missing key '{}'", "memory_limit");
        assert_eq!(formatted.to_string(), "missing key 'memory_limit'");
    }

    #[test]
    fn context_wraps_source() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = result.error_context("Failed to read limit.").unwrap_err();
        assert_eq!(err.to_string(), "Failed to read limit.");
        assert_eq!(err.root_cause().to_string(), "gone");

        let lazy: Result<(), std::io::Error> = Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = lazy.with_error_context(|| format!("attempt {}", 2)).unwrap_err();
        assert_eq!(err.to_string(), "attempt 2");
    }
}
