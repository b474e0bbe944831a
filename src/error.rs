//! Custom error types for the crate.
//!
//! This module defines the primary error type, `TsmError`, shared by the pin map, the
//! session registry, the pin resolver and the simulated driver. Using the `thiserror`
//! crate, it provides a centralized and consistent way to report everything that can go
//! wrong between loading a pin map and resolving pins to sessions.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidIdentifier`**: A registration key is empty, malformed, or addresses no
//!   session entry declared by the pin map.
//! - **`AmbiguousChannel`**: A single-session resolution was requested but the pins span
//!   more than one session entry.
//! - **`UnregisteredSession`**: A pin resolved to a session entry nobody registered a
//!   session for yet.
//! - **`UnknownPin`**: A pin or pin group name is not declared in the pin map.
//! - **`PinMapLoad` / `PinMapValidation`**: The pin map file could not be parsed, or parsed
//!   but is internally inconsistent.
//! - **`Driver` / `SessionClosed`**: Failures reported by the driver collaborator.
//!
//! All errors are reported synchronously at the offending call and are never retried here.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type TsmResult<T> = std::result::Result<T, TsmError>;

/// Errors raised while loading pin maps, registering sessions and resolving pins.
#[derive(Error, Debug)]
pub enum TsmError {
    #[error("Invalid channel identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("Pins {pins:?} resolve to {count} sessions, expected exactly one")]
    AmbiguousChannel { pins: Vec<String>, count: usize },

    #[error("No session registered for '{0}'")]
    UnregisteredSession(String),

    #[error("Pin or pin group '{0}' is not declared in the pin map")]
    UnknownPin(String),

    #[error("Pins {pins:?} have no {instrument_type} channels")]
    NoChannels {
        pins: Vec<String>,
        instrument_type: String,
    },

    #[error("Site {site} is out of range (pin map declares {site_count} sites)")]
    InvalidSite { site: u32, site_count: u32 },

    #[error("Pin map file not found: {0}")]
    PinMapNotFound(String),

    #[error("Pin map load error: {0}")]
    PinMapLoad(#[source] Box<figment::Error>),

    #[error("Pin map validation error: {0}")]
    PinMapValidation(String),

    #[error("Configuration error: {0}")]
    Config(#[source] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Session '{0}' is closed")]
    SessionClosed(String),

    #[error("Measurement shape mismatch: {0}")]
    MeasurementShape(String),
}

impl TsmError {
    pub(crate) fn invalid_identifier(
        identifier: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TsmError::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error is caused by caller ordering rather than bad input
    /// (e.g. resolving before registering), so the caller can fix it and call again.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TsmError::UnregisteredSession(_) | TsmError::SessionClosed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TsmError::invalid_identifier("", "identifier is empty");
        assert_eq!(
            err.to_string(),
            "Invalid channel identifier '': identifier is empty"
        );

        let err = TsmError::AmbiguousChannel {
            pins: vec!["DUTPin1".into(), "SystemPin1".into()],
            count: 2,
        };
        assert!(err.to_string().contains("2 sessions"));
    }

    #[test]
    fn test_recoverable() {
        assert!(TsmError::UnregisteredSession("DCPower1".into()).is_recoverable());
        assert!(!TsmError::UnknownPin("Nope".into()).is_recoverable());
    }
}
