//! Shared fixtures for the session registry and pin resolver integration tests.
//!
//! - `standalone_context`: context over a pin map from `tests/pin_maps/`, recording
//!   deprecation notices instead of logging them
//! - `open_sessions_with_channel_strings` / `open_sessions_with_resource_strings`: open
//!   one simulated DC power session per declared identifier and register it

#![allow(dead_code)] // Not every helper is used by every test file

use std::path::PathBuf;
use std::sync::Arc;
use tsm_sessions::{
    DcPowerSession, DriverOptions, InstrumentSession, InstrumentType, RecordingSink,
    SessionRegistry, TsmContext,
};

/// Path of a fixture pin map
pub fn pin_map_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("pin_maps")
        .join(name)
}

/// Context over a fixture pin map with a recording diagnostics sink
pub fn standalone_context(pin_map: &str) -> (TsmContext, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let context = TsmContext::load(pin_map_path(pin_map))
        .unwrap()
        .with_diagnostics(sink.clone());
    (context, sink)
}

/// Empty DC power registry of a context
pub fn dcpower_registry(context: &TsmContext) -> SessionRegistry<DcPowerSession> {
    context.registry(InstrumentType::NiDcPower)
}

/// Open and register one simulated session per instrument name / channel string pair.
pub fn open_sessions_with_channel_strings(
    registry: &mut SessionRegistry<DcPowerSession>,
) -> Vec<Arc<DcPowerSession>> {
    let (instrument_names, channel_strings) = registry.instrument_names_and_channels();
    instrument_names
        .iter()
        .zip(&channel_strings)
        .map(|(instrument, channels)| {
            let session = Arc::new(
                DcPowerSession::open(instrument, channels, &DriverOptions::simulated()).unwrap(),
            );
            registry
                .register_with_channel_string(instrument, channels, session.clone())
                .unwrap();
            session
        })
        .collect()
}

/// Open and register one simulated session per resource string.
pub fn open_sessions_with_resource_strings(
    registry: &mut SessionRegistry<DcPowerSession>,
) -> Vec<Arc<DcPowerSession>> {
    registry
        .resource_strings()
        .iter()
        .map(|resource| {
            let session = Arc::new(
                DcPowerSession::open_resource(resource, &DriverOptions::simulated()).unwrap(),
            );
            registry.register_resource(resource, session.clone()).unwrap();
            session
        })
        .collect()
}

/// Whether `session` is one of `sessions` by identity
pub fn contains_session(sessions: &[Arc<DcPowerSession>], session: &Arc<DcPowerSession>) -> bool {
    sessions.iter().any(|s| Arc::ptr_eq(s, session))
}

/// Close every session
pub fn close_all(sessions: &[Arc<DcPowerSession>]) {
    for session in sessions {
        session.close().unwrap();
    }
}
