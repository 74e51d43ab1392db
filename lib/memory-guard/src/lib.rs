//! Human-readable memory sizes, and a guard comparing process memory usage against a configured limit.
//!
//! ## Sizes
//!
//! [`parse_size`] converts strings such as `42`, `42KB` or `42 m` into an exact number of bytes. Units are binary:
//! `1KB` is 1024 bytes, `1MB` is 1024 `KB`, and so on up to `PB`.
//!
//! ## Guarding memory
//!
//! [`MemoryGuard`] reads a memory limit once, from configuration or any other [`LimitSource`], and compares it against
//! the peak memory usage of the process as reported by a [`UsageSource`]:
//!
//! ```no_run
//! use memory_guard::MemoryGuard;
//!
//! // Reads `MEMGUARD_MEMORY_LIMIT`, e.g. `512M`.
//! let guard = MemoryGuard::global();
//! if let Err(e) = guard.validate_memory() {
//!     eprintln!("{}", e);
//! }
//! ```
#![deny(warnings)]
#![deny(missing_docs)]

mod guard;
pub use self::guard::{GuardError, MemoryGuard, GLOBAL_ENV_PREFIX};

pub mod size;
pub use self::size::{parse_size, SizeParseError};

pub mod source;
pub use self::source::{
    ConfigLimitSource, EnvironmentLimitSource, LimitSource, ProcessUsageSource, UsageSource, MEMORY_LIMIT_KEY,
};
