//! Process-wide guard.
//!
//! Note: this lives in its own integration test binary, as the global guard caches its limit for the lifetime of the
//! process and would otherwise leak between tests.

use memory_guard::{MemoryGuard, GLOBAL_ENV_PREFIX};

#[test]
fn global_guard_reads_environment_once() {
    let variable = format!("{}_MEMORY_LIMIT", GLOBAL_ENV_PREFIX);
    std::env::set_var(&variable, "4 GB");

    let guard = MemoryGuard::global();
    assert!(std::ptr::eq(guard, MemoryGuard::global()));
    assert_eq!(guard.memory_limit().unwrap(), 4 * 1024 * 1024 * 1024);

    std::env::set_var(&variable, "1K");
    assert_eq!(MemoryGuard::global().memory_limit().unwrap(), 4 * 1024 * 1024 * 1024);
    assert!(!MemoryGuard::global().is_out_of_memory_limit().unwrap());
    MemoryGuard::global().validate_memory().unwrap();
}
