use std::{
    fmt,
    sync::{Mutex, OnceLock, PoisonError},
};

use bytesize::ByteSize;
use memguard_config::GenericConfiguration;
use memguard_error::GenericError;
use snafu::{OptionExt as _, ResultExt as _, Snafu};
use tracing::{debug, warn};

use crate::{
    size::{parse_size, SizeParseError},
    source::{ConfigLimitSource, EnvironmentLimitSource, LimitSource, ProcessUsageSource, UsageSource},
};

/// Environment variable prefix used by [`MemoryGuard::global`].
pub const GLOBAL_ENV_PREFIX: &str = "MEMGUARD";

/// A memory guard error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum GuardError {
    /// The raw memory limit could not be read from its source.
    #[snafu(display("Failed to read the memory limit: {}", source))]
    ReadLimit {
        /// Error source.
        source: GenericError,
    },

    /// The raw memory limit is not a valid size.
    #[snafu(display("Failed to parse the memory limit: {}", source))]
    InvalidLimit {
        /// Error source.
        source: SizeParseError,
    },

    /// The peak memory usage of the process could not be determined.
    #[snafu(display("Peak memory usage cannot be determined on this system."))]
    UsageUnavailable,

    /// The peak memory usage has reached the memory limit.
    #[snafu(display("Execution is out of the memory limit. Increase the limit of memory."))]
    LimitExceeded,
}

/// Compares the memory usage of the process against a configured limit.
///
/// The limit is read and parsed the first time it's needed, and then cached for the lifetime of the guard: later changes
/// to the underlying configuration are not observed. Usage, on the other hand, is queried fresh on every call.
///
/// `MemoryGuard` only reports. It never throttles work or terminates the process; callers decide what to do when
/// [`validate_memory`][Self::validate_memory] fails.
pub struct MemoryGuard {
    limit_source: Box<dyn LimitSource>,
    usage_source: Box<dyn UsageSource>,
    limit: OnceLock<i64>,
    limit_init: Mutex<()>,
}

impl MemoryGuard {
    /// Creates a new `MemoryGuard` with the given limit and usage sources.
    pub fn new<L, U>(limit_source: L, usage_source: U) -> Self
    where
        L: LimitSource + 'static,
        U: UsageSource + 'static,
    {
        Self {
            limit_source: Box::new(limit_source),
            usage_source: Box::new(usage_source),
            limit: OnceLock::new(),
            limit_init: Mutex::new(()),
        }
    }

    /// Creates a new `MemoryGuard` that reads `memory_limit` from the given configuration and measures the current
    /// process.
    pub fn from_configuration(config: GenericConfiguration) -> Self {
        Self::new(ConfigLimitSource::new(config), ProcessUsageSource::default())
    }

    /// Gets the process-wide `MemoryGuard`.
    ///
    /// The guard is created on first use. It reads its limit from the `MEMGUARD_MEMORY_LIMIT` environment variable and
    /// measures the current process.
    pub fn global() -> &'static MemoryGuard {
        static GLOBAL: OnceLock<MemoryGuard> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            Self::new(
                EnvironmentLimitSource::new(GLOBAL_ENV_PREFIX),
                ProcessUsageSource::default(),
            )
        })
    }

    /// Gets the memory limit, in bytes.
    ///
    /// The first successful call reads and parses the limit, and every later call returns that same value. If reading
    /// or parsing fails, nothing is cached and the next call tries again.
    ///
    /// # Errors
    ///
    /// If the limit cannot be read, or is not a valid size, an error is returned.
    pub fn memory_limit(&self) -> Result<i64, GuardError> {
        if let Some(limit) = self.limit.get() {
            return Ok(*limit);
        }

        // Serialize initialization so concurrent first callers parse exactly once.
        let _init = self.limit_init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(limit) = self.limit.get() {
            return Ok(*limit);
        }

        let raw_limit = self.limit_source.raw_memory_limit().context(ReadLimit)?;
        let limit = parse_size(raw_limit.trim()).context(InvalidLimit)?;
        debug!(
            limit_bytes = limit,
            limit = %ByteSize::b(limit.max(0) as u64),
            "Resolved memory limit."
        );

        Ok(*self.limit.get_or_init(|| limit))
    }

    /// Gets the peak memory usage of the process, in bytes.
    ///
    /// # Errors
    ///
    /// If the peak memory usage cannot be determined, an error is returned.
    pub fn memory_usage(&self) -> Result<i64, GuardError> {
        let usage = self.usage_source.peak_memory_usage().context(UsageUnavailable)?;
        Ok(i64::try_from(usage).unwrap_or(i64::MAX))
    }

    /// Returns `true` if the memory usage has reached or exceeded the memory limit.
    ///
    /// # Errors
    ///
    /// If either the usage or the limit cannot be determined, an error is returned.
    pub fn is_out_of_memory_limit(&self) -> Result<bool, GuardError> {
        let (usage, limit) = self.usage_and_limit()?;
        Ok(usage >= limit)
    }

    /// Validates that the memory usage is below the memory limit.
    ///
    /// # Errors
    ///
    /// If the memory usage has reached or exceeded the memory limit, [`GuardError::LimitExceeded`] is returned. If
    /// either the usage or the limit cannot be determined, the corresponding error is returned instead.
    pub fn validate_memory(&self) -> Result<(), GuardError> {
        let (usage, limit) = self.usage_and_limit()?;
        if usage >= limit {
            warn!(
                usage_bytes = usage,
                limit_bytes = limit,
                "Memory usage reached the configured limit."
            );
            return Err(GuardError::LimitExceeded);
        }

        Ok(())
    }

    fn usage_and_limit(&self) -> Result<(i64, i64), GuardError> {
        let usage = self.memory_usage()?;
        let limit = self.memory_limit()?;
        Ok((usage, limit))
    }
}

impl fmt::Debug for MemoryGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryGuard").field("limit", &self.limit.get()).finish()
    }
}
