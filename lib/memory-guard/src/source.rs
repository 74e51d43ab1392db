//! Where the guard gets its figures from.
//!
//! A [`LimitSource`] hands back the configured memory limit as a raw, unparsed string, and a [`UsageSource`] reports
//! the process's peak memory usage. Closures implement both traits, which is mostly useful in tests.

use std::sync::{Mutex, PoisonError};

use memguard_config::{ConfigurationLoader, GenericConfiguration};
use memguard_error::{ErrorContext as _, GenericError};
use process_memory::Querier;
use serde::Deserialize;

/// Configuration key holding the memory limit.
pub const MEMORY_LIMIT_KEY: &str = "memory_limit";

/// A source of the configured memory limit.
pub trait LimitSource: Send + Sync {
    /// Reads the raw memory limit, such as `512M` or `1073741824`.
    ///
    /// # Errors
    ///
    /// If the limit is not configured, or cannot be read, an error is returned.
    fn raw_memory_limit(&self) -> Result<String, GenericError>;
}

impl<F> LimitSource for F
where
    F: Fn() -> Result<String, GenericError> + Send + Sync,
{
    fn raw_memory_limit(&self) -> Result<String, GenericError> {
        self()
    }
}

/// A source of the process's peak memory usage.
pub trait UsageSource: Send + Sync {
    /// Gets the peak memory usage of the process, in bytes.
    ///
    /// Returns `None` if it cannot be determined.
    fn peak_memory_usage(&self) -> Option<u64>;
}

impl<F> UsageSource for F
where
    F: Fn() -> Option<u64> + Send + Sync,
{
    fn peak_memory_usage(&self) -> Option<u64> {
        self()
    }
}

// YAML, JSON and environment variables surface bare numbers as integers or floats rather than strings. Every scalar is
// turned back into text so that the size parser alone decides what is valid.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLimit {
    Bytes(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl RawLimit {
    fn into_string(self) -> String {
        match self {
            RawLimit::Bytes(bytes) => bytes.to_string(),
            RawLimit::Unsigned(bytes) => bytes.to_string(),
            // `Debug` always keeps the decimal point or exponent, so `1e3` is not mistaken for the integer `1000`.
            RawLimit::Float(value) => format!("{:?}", value),
            RawLimit::Text(text) => text,
        }
    }
}

fn read_limit(config: &GenericConfiguration) -> Result<String, GenericError> {
    let raw = config.get_typed::<RawLimit>(MEMORY_LIMIT_KEY)?;
    Ok(raw.into_string())
}

/// Reads the memory limit from an already-loaded configuration.
#[derive(Clone, Debug)]
pub struct ConfigLimitSource {
    config: GenericConfiguration,
}

impl ConfigLimitSource {
    /// Creates a new `ConfigLimitSource` reading `memory_limit` from `config`.
    pub fn new(config: GenericConfiguration) -> Self {
        Self { config }
    }
}

impl LimitSource for ConfigLimitSource {
    fn raw_memory_limit(&self) -> Result<String, GenericError> {
        read_limit(&self.config)
    }
}

/// Reads the memory limit from prefixed environment variables at the time the limit is requested.
///
/// With a prefix of `MEMGUARD`, the limit is read from `MEMGUARD_MEMORY_LIMIT`.
#[derive(Clone, Debug)]
pub struct EnvironmentLimitSource {
    prefix: String,
}

impl EnvironmentLimitSource {
    /// Creates a new `EnvironmentLimitSource` for the given variable prefix.
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl LimitSource for EnvironmentLimitSource {
    fn raw_memory_limit(&self) -> Result<String, GenericError> {
        let config = ConfigurationLoader::default()
            .from_environment(&self.prefix)
            .with_error_context(|| format!("Failed to load environment variables with prefix '{}'.", self.prefix))?
            .into_generic();

        read_limit(&config)
    }
}

/// Reports the peak resident set size of the current process.
pub struct ProcessUsageSource {
    querier: Mutex<Querier>,
}

impl Default for ProcessUsageSource {
    fn default() -> Self {
        Self {
            querier: Mutex::new(Querier::default()),
        }
    }
}

impl UsageSource for ProcessUsageSource {
    fn peak_memory_usage(&self) -> Option<u64> {
        let mut querier = self.querier.lock().unwrap_or_else(PoisonError::into_inner);
        querier.peak_resident_set_size().map(|bytes| bytes as u64)
    }
}
