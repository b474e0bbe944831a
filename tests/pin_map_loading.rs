//! Integration tests for loading pin maps and building contexts from configuration.

mod common;

use common::pin_map_path;
use std::fs;
use tempfile::tempdir;
use tsm_sessions::config::TsmConfig;
use tsm_sessions::pin_map::PinKind;
use tsm_sessions::{InstrumentType, PinMap, TsmContext, TsmError};

#[test]
fn test_load_fixture_pin_map() {
    let pin_map = PinMap::load(pin_map_path("nidcpower.toml")).unwrap();

    assert_eq!(pin_map.site_count(), 2);
    assert_eq!(pin_map.instruments(InstrumentType::NiDcPower).count(), 5);
    assert_eq!(pin_map.instruments(InstrumentType::NiDmm).count(), 1);
    assert_eq!(pin_map.pin_kind("DUTPin2"), Some(PinKind::Dut));
    assert_eq!(pin_map.pin_kind("SystemPin1"), Some(PinKind::System));
    assert_eq!(pin_map.pin_kind("PinGroup1"), None);
    assert_eq!(pin_map.pin_groups().len(), 1);
}

#[test]
fn test_missing_pin_map() {
    let dir = tempdir().unwrap();
    let result = PinMap::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(TsmError::PinMapNotFound(_))));
}

#[test]
fn test_malformed_pin_map() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "site_count = \"two\"\n").unwrap();

    let result = PinMap::load(&path);
    assert!(matches!(result, Err(TsmError::PinMapLoad(_))));
}

#[test]
fn test_inconsistent_pin_map() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("inconsistent.toml");
    fs::write(
        &path,
        r#"
            system_pins = ["SystemPin1"]

            [[pin_groups]]
            name = "Group"
            pins = ["SystemPin1", "Ghost"]
        "#,
    )
    .unwrap();

    let result = PinMap::load(&path);
    assert!(matches!(result, Err(TsmError::PinMapValidation(msg)) if msg.contains("Ghost")));
}

#[test]
fn test_context_from_config() {
    let mut config = TsmConfig::new(pin_map_path("nidcpower.toml"));
    config.sites = Some(vec![1]);
    config.validate().unwrap();

    let context = TsmContext::from_config(&config).unwrap();
    assert_eq!(context.sites(), &[1]);
    assert_eq!(context.pin_map().site_count(), 2);

    config.sites = Some(vec![2]);
    assert!(matches!(
        TsmContext::from_config(&config),
        Err(TsmError::InvalidSite { site: 2, .. })
    ));
}
