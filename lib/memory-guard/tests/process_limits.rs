//! Guard checks against the real memory usage of the test process.

use std::io::Write as _;

use memguard_config::ConfigurationLoader;
use memory_guard::{
    EnvironmentLimitSource, GuardError, MemoryGuard, ProcessUsageSource, SizeParseError, UsageSource as _,
};

// Headroom above the current peak usage, so that allocations made by the test harness between reading the usage and
// checking it can't push us over.
const HEADROOM_BYTES: u64 = 64 * 1024 * 1024;

fn guard_with_limit(limit: String) -> MemoryGuard {
    let config = ConfigurationLoader::default().add_value("memory_limit", limit).into_generic();
    MemoryGuard::from_configuration(config)
}

fn current_peak_usage() -> u64 {
    ProcessUsageSource::default()
        .peak_memory_usage()
        .expect("peak memory usage should be available")
}

#[test]
fn reports_usage() {
    let guard = guard_with_limit("1G".to_string());
    assert!(guard.memory_usage().unwrap() > 0);
    assert!(guard.memory_limit().unwrap() > 0);
}

#[test]
fn limit_above_usage() {
    let limit = current_peak_usage() + HEADROOM_BYTES;
    let guard = guard_with_limit(limit.to_string());

    assert!(!guard.is_out_of_memory_limit().unwrap());
    guard.validate_memory().unwrap();
}

#[test]
fn degenerate_limits() {
    for limit in ["0", "1", "1B"] {
        let guard = guard_with_limit(limit.to_string());
        assert!(guard.is_out_of_memory_limit().unwrap(), "limit: {}", limit);
        assert!(matches!(guard.validate_memory(), Err(GuardError::LimitExceeded)));
    }
}

#[test]
fn limit_from_yaml_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "memory_limit: 16 GB").unwrap();

    let config = ConfigurationLoader::default()
        .from_yaml(file.path())
        .unwrap()
        .into_generic();
    let guard = MemoryGuard::from_configuration(config);

    assert_eq!(guard.memory_limit().unwrap(), 16 * 1024 * 1024 * 1024);
    assert!(!guard.is_out_of_memory_limit().unwrap());
}

#[test]
fn limit_from_json_bytes() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{ "memory_limit": 2048 }}"#).unwrap();

    let config = ConfigurationLoader::default()
        .from_json(file.path())
        .unwrap()
        .into_generic();
    let guard = MemoryGuard::from_configuration(config);

    assert_eq!(guard.memory_limit().unwrap(), 2048);
}

#[test]
fn missing_limit() {
    let guard = MemoryGuard::from_configuration(ConfigurationLoader::default().into_generic());
    assert!(matches!(guard.memory_limit(), Err(GuardError::ReadLimit { .. })));
    assert!(matches!(guard.validate_memory(), Err(GuardError::ReadLimit { .. })));
}

fn guard_from_yaml(contents: &str) -> MemoryGuard {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "{}", contents).unwrap();

    let config = ConfigurationLoader::default()
        .from_yaml(file.path())
        .unwrap()
        .into_generic();
    MemoryGuard::from_configuration(config)
}

#[test]
fn fractional_yaml_limit_is_a_format_error() {
    let guard = guard_from_yaml("memory_limit: 42.5");
    match guard.memory_limit() {
        Err(GuardError::InvalidLimit {
            source: SizeParseError::InvalidFormat { input },
        }) => assert_eq!(input, "42.5"),
        other => panic!("expected invalid format, got {:?}", other),
    }
}

#[test]
fn oversized_yaml_limit_is_too_large() {
    let guard = guard_from_yaml("memory_limit: 9223372036854775808");
    match guard.memory_limit() {
        Err(GuardError::InvalidLimit {
            source: SizeParseError::TooLarge { input },
        }) => assert_eq!(input, "9223372036854775808"),
        other => panic!("expected too large, got {:?}", other),
    }
}

#[test]
fn fractional_environment_limit_is_a_format_error() {
    std::env::set_var("MEMGUARD_FRACTIONAL_TEST_MEMORY_LIMIT", "42.5");
    let guard = MemoryGuard::new(
        EnvironmentLimitSource::new("MEMGUARD_FRACTIONAL_TEST"),
        ProcessUsageSource::default(),
    );

    let err = guard.memory_limit().unwrap_err();
    assert!(matches!(
        err,
        GuardError::InvalidLimit {
            source: SizeParseError::InvalidFormat { .. }
        }
    ));
    assert_eq!(
        err.to_string(),
        "Failed to parse the memory limit: The value \"42.5\" is not a human representation of size"
    );
}
