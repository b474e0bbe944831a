//! Session Registry
//!
//! Maps the channel identifiers a pin map declares for one instrument category to the
//! driver sessions a test program opened for them. The registry never opens sessions and
//! only closes them when asked to through [`SessionRegistry::close_all`]; callers own the
//! session lifecycle.
//!
//! # Keys
//!
//! Sessions are stored per session entry of the pin map (see
//! [`PinMap::session_entries`]). Both identifier forms resolve to the entry listing exactly
//! the same channels, so `("DCPower1", "0,1")` and `"DCPower1/0,DCPower1/1"` address the
//! same slot and re-registering under either overwrites it.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! let mut registry = context.registry::<DcPowerSession>(InstrumentType::NiDcPower);
//! for resource in registry.resource_strings() {
//!     let session = DcPowerSession::open_resource(&resource, &DriverOptions::simulated())?;
//!     registry.register_resource(&resource, Arc::new(session))?;
//! }
//! ```

use crate::channel::{ChannelId, InstrumentType};
use crate::diagnostics::{DeprecationNotice, DiagnosticsSink};
use crate::driver::InstrumentSession;
use crate::error::{TsmError, TsmResult};
use crate::pin_map::{EntrySource, PinMap};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

const GET_ALL_INSTRUMENT_NAMES: DeprecationNotice = DeprecationNotice::new(
    "SessionRegistry::get_all_instrument_names",
    "SessionRegistry::resource_strings",
);

const REGISTER_WITH_CHANNEL_STRING: DeprecationNotice = DeprecationNotice::new(
    "SessionRegistry::register_with_channel_string",
    "SessionRegistry::register_resource",
);

/// Sessions of one instrument category, keyed by pin map session entry.
pub struct SessionRegistry<S> {
    instrument_type: InstrumentType,
    pin_map: Arc<PinMap>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    /// Entry index -> session; ordered so enumeration follows the pin map
    sessions: BTreeMap<usize, Arc<S>>,
}

impl<S> SessionRegistry<S> {
    /// Create an empty registry bound to a pin map and an instrument category
    #[must_use]
    pub fn new(
        instrument_type: InstrumentType,
        pin_map: Arc<PinMap>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            instrument_type,
            pin_map,
            diagnostics,
            sessions: BTreeMap::new(),
        }
    }

    /// Instrument category this registry holds sessions for
    #[must_use]
    pub fn instrument_type(&self) -> InstrumentType {
        self.instrument_type
    }

    /// Pin map the registry resolves identifiers against
    #[must_use]
    pub fn pin_map(&self) -> &Arc<PinMap> {
        &self.pin_map
    }

    /// Register a session under an identifier, replacing any previous session.
    ///
    /// # Errors
    /// `InvalidIdentifier` if the identifier is empty, malformed, or does not address a
    /// session entry of this registry's category.
    pub fn register(&mut self, identifier: ChannelId, session: Arc<S>) -> TsmResult<()> {
        let index = self
            .pin_map
            .entry_for_identifier(self.instrument_type, &identifier)?;
        if self.sessions.insert(index, session).is_some() {
            debug!(%identifier, entry = index, "Replaced registered session");
        } else {
            debug!(%identifier, entry = index, "Registered session");
        }
        Ok(())
    }

    /// Register a session under a resource string.
    pub fn register_resource(&mut self, resource: &str, session: Arc<S>) -> TsmResult<()> {
        self.register(ChannelId::resource(resource), session)
    }

    /// Register a session under an instrument name and channel string.
    ///
    /// Deprecated: use [`register_resource`](Self::register_resource). The deprecation
    /// notice is reported before the identifier is validated, so a rejected call still
    /// reports it exactly once.
    pub fn register_with_channel_string(
        &mut self,
        instrument: &str,
        channels: &str,
        session: Arc<S>,
    ) -> TsmResult<()> {
        self.diagnostics.deprecated(&REGISTER_WITH_CHANNEL_STRING);
        self.register(ChannelId::channels(instrument, channels), session)
    }

    /// Session registered under an identifier, if any
    #[must_use]
    pub fn session(&self, identifier: &ChannelId) -> Option<Arc<S>> {
        let index = self
            .pin_map
            .entry_for_identifier(self.instrument_type, identifier)
            .ok()?;
        self.sessions.get(&index).cloned()
    }

    pub(crate) fn session_at(&self, index: usize) -> TsmResult<&Arc<S>> {
        self.sessions.get(&index).ok_or_else(|| {
            let identifier = self.pin_map.session_entries(self.instrument_type)[index].identifier();
            TsmError::UnregisteredSession(identifier.to_string())
        })
    }

    /// Every registered session, in entry order, each listed once even when registered
    /// under several identifiers.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<S>> {
        let mut unique: Vec<Arc<S>> = Vec::with_capacity(self.sessions.len());
        for session in self.sessions.values() {
            if !unique.iter().any(|s| Arc::ptr_eq(s, session)) {
                unique.push(Arc::clone(session));
            }
        }
        unique
    }

    /// Canonical identifiers of every session entry, in pin map declaration order.
    #[must_use]
    pub fn identifiers(&self) -> Vec<ChannelId> {
        self.pin_map
            .session_entries(self.instrument_type)
            .iter()
            .map(|entry| entry.identifier())
            .collect()
    }

    /// Instrument names and channel strings of the per-instrument session entries, as two
    /// sequences of equal length.
    #[must_use]
    pub fn instrument_names_and_channels(&self) -> (Vec<String>, Vec<String>) {
        self.pin_map
            .session_entries(self.instrument_type)
            .iter()
            .filter(|entry| matches!(entry.source(), EntrySource::Instrument(_)))
            .filter_map(|entry| match entry.identifier() {
                ChannelId::Channels {
                    instrument,
                    channels,
                } => Some((instrument, channels)),
                ChannelId::Resource(_) => None,
            })
            .unzip()
    }

    /// Deprecated: use [`resource_strings`](Self::resource_strings).
    ///
    /// Returns the same value as
    /// [`instrument_names_and_channels`](Self::instrument_names_and_channels) and reports
    /// one deprecation notice. Channel group entries have no instrument name form, so they
    /// are absent here; `resource_strings` lists every entry.
    #[must_use]
    pub fn get_all_instrument_names(&self) -> (Vec<String>, Vec<String>) {
        self.diagnostics.deprecated(&GET_ALL_INSTRUMENT_NAMES);
        self.instrument_names_and_channels()
    }

    /// One resource string per session entry, in declaration order.
    #[must_use]
    pub fn resource_strings(&self) -> Vec<String> {
        self.pin_map
            .session_entries(self.instrument_type)
            .iter()
            .map(|entry| entry.resource_string())
            .collect()
    }

    /// Number of occupied session entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Forget every registered session without closing it
    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

impl<S: InstrumentSession> SessionRegistry<S> {
    /// Close every distinct registered session and clear the registry.
    ///
    /// All sessions are closed even if some fail; the first failure is returned.
    pub fn close_all(&mut self) -> TsmResult<()> {
        let mut first_error = None;
        for session in self.sessions() {
            if let Err(e) = session.close() {
                warn!(resource = session.resource_name(), error = %e, "Failed to close session");
                first_error.get_or_insert(e);
            }
        }
        self.sessions.clear();
        first_error.map_or(Ok(()), Err)
    }
}

impl<S> std::fmt::Debug for SessionRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("instrument_type", &self.instrument_type)
            .field("registered", &self.sessions.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use std::sync::atomic::{AtomicBool, Ordering};

    const PIN_MAP: &str = r#"
        system_pins = ["Vdd"]

        [[instruments]]
        name = "SMU1"
        type = "nidcpower"
        channels = ["0", "1"]

        [[instruments]]
        name = "SMU2"
        type = "nidcpower"
        channels = ["0"]

        [[connections]]
        pin = "Vdd"
        instrument = "SMU1"
        channel = "0"
    "#;

    #[derive(Debug)]
    struct FakeSession;

    /// Session recording whether `close` ran, optionally failing it
    #[derive(Debug)]
    struct ClosableSession {
        resource: &'static str,
        fail_close: bool,
        closed: AtomicBool,
    }

    impl ClosableSession {
        fn new(resource: &'static str, fail_close: bool) -> Arc<Self> {
            Arc::new(Self {
                resource,
                fail_close,
                closed: AtomicBool::new(false),
            })
        }
    }

    impl InstrumentSession for ClosableSession {
        fn resource_name(&self) -> &str {
            self.resource
        }

        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        fn close(&self) -> TsmResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            if self.fail_close {
                Err(TsmError::Driver(format!("{} refused to close", self.resource)))
            } else {
                Ok(())
            }
        }
    }

    fn registry() -> (SessionRegistry<FakeSession>, Arc<RecordingSink>) {
        let pin_map = Arc::new(PinMap::from_toml_str(PIN_MAP).unwrap());
        let sink = Arc::new(RecordingSink::new());
        (
            SessionRegistry::new(InstrumentType::NiDcPower, pin_map, sink.clone()),
            sink,
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let (mut registry, _) = registry();
        let session = Arc::new(FakeSession);

        registry
            .register(ChannelId::channels("SMU1", "0,1"), session.clone())
            .unwrap();

        let by_resource = registry
            .session(&ChannelId::resource("SMU1/1,SMU1/0"))
            .unwrap();
        assert!(Arc::ptr_eq(&by_resource, &session));
        assert!(registry.session(&ChannelId::channels("SMU2", "0")).is_none());
    }

    #[test]
    fn test_reregistration_overwrites() {
        let (mut registry, _) = registry();
        let first = Arc::new(FakeSession);
        let second = Arc::new(FakeSession);

        registry.register_resource("SMU2/0", first).unwrap();
        registry.register_resource("SMU2/0", second.clone()).unwrap();

        assert_eq!(registry.len(), 1);
        let stored = registry.session(&ChannelId::resource("SMU2/0")).unwrap();
        assert!(Arc::ptr_eq(&stored, &second));
    }

    #[test]
    fn test_sessions_deduplicated_by_identity() {
        let (mut registry, _) = registry();
        let shared = Arc::new(FakeSession);

        registry
            .register_resource("SMU1/0,SMU1/1", shared.clone())
            .unwrap();
        registry.register_resource("SMU2/0", shared.clone()).unwrap();

        let sessions = registry.sessions();
        assert_eq!(sessions.len(), 1);
        assert!(Arc::ptr_eq(&sessions[0], &shared));
    }

    #[test]
    fn test_invalid_identifiers() {
        let (mut registry, _) = registry();
        let session = Arc::new(FakeSession);

        for id in [
            ChannelId::channels("", ""),
            ChannelId::resource(""),
            ChannelId::channels("SMU1", "0"),
            ChannelId::channels("SMU9", "0"),
        ] {
            let result = registry.register(id, session.clone());
            assert!(matches!(result, Err(TsmError::InvalidIdentifier { .. })));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_enumeration() {
        let (registry, _) = registry();

        assert_eq!(
            registry.identifiers(),
            vec![
                ChannelId::channels("SMU1", "0,1"),
                ChannelId::channels("SMU2", "0")
            ]
        );
        assert_eq!(
            registry.instrument_names_and_channels(),
            (
                vec!["SMU1".to_string(), "SMU2".to_string()],
                vec!["0,1".to_string(), "0".to_string()]
            )
        );
        assert_eq!(registry.resource_strings(), vec!["SMU1/0,SMU1/1", "SMU2/0"]);
    }

    #[test]
    fn test_deprecated_alias_matches_canonical() {
        let (registry, sink) = registry();

        let canonical = registry.instrument_names_and_channels();
        assert!(sink.notices().is_empty());

        let deprecated = registry.get_all_instrument_names();
        assert_eq!(canonical, deprecated);
        assert_eq!(sink.take(), vec![GET_ALL_INSTRUMENT_NAMES]);
    }

    #[test]
    fn test_deprecated_registration_notifies_before_validation() {
        let (mut registry, sink) = registry();

        let result =
            registry.register_with_channel_string("", "", Arc::new(FakeSession));
        assert!(matches!(result, Err(TsmError::InvalidIdentifier { .. })));
        assert_eq!(sink.take(), vec![REGISTER_WITH_CHANNEL_STRING]);

        registry
            .register_with_channel_string("SMU2", "0", Arc::new(FakeSession))
            .unwrap();
        assert_eq!(sink.take().len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear() {
        let (mut registry, _) = registry();
        registry
            .register_resource("SMU2/0", Arc::new(FakeSession))
            .unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.sessions().is_empty());
    }

    #[test]
    fn test_close_all_reports_first_failure() {
        let pin_map = Arc::new(PinMap::from_toml_str(PIN_MAP).unwrap());
        let mut registry: SessionRegistry<ClosableSession> = SessionRegistry::new(
            InstrumentType::NiDcPower,
            pin_map,
            Arc::new(RecordingSink::new()),
        );
        let failing = ClosableSession::new("SMU1/0,SMU1/1", true);
        let healthy = ClosableSession::new("SMU2/0", false);
        registry
            .register_resource("SMU1/0,SMU1/1", failing.clone())
            .unwrap();
        registry.register_resource("SMU2/0", healthy.clone()).unwrap();

        let result = registry.close_all();
        assert!(matches!(result, Err(TsmError::Driver(msg)) if msg.contains("SMU1/0,SMU1/1")));
        assert!(!failing.is_open());
        assert!(!healthy.is_open());
        assert!(registry.is_empty());

        // Nothing left to close
        assert!(registry.close_all().is_ok());
    }
}
