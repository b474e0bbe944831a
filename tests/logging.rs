//! Global subscriber installation.
//!
//! Kept in its own test binary: `tracing-test` installs a global subscriber in the unit
//! test binary and panics if one is already present.

use tracing::Level;
use tsm_sessions::config::TsmConfig;
use tsm_sessions::logging::{self, LoggingConfig, OutputFormat};

#[test]
fn test_init_is_idempotent() {
    logging::init(LoggingConfig::new(Level::DEBUG)).unwrap();
    assert!(tracing::dispatcher::has_been_set());

    // A second subscriber, even with another format, is silently skipped
    logging::init(LoggingConfig::new(Level::INFO).with_format(OutputFormat::Json)).unwrap();

    let mut config = TsmConfig::new("device.toml");
    config.log_level = "warn".to_string();
    logging::init_from_config(&config).unwrap();

    tracing::info!("Subscriber installed");
}
