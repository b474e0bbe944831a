//! Driver collaborator seam.
//!
//! The registry and resolver only need sessions to be shareable and closable; everything
//! else (opening, configuring, measuring) belongs to the concrete driver. [`dcpower`]
//! provides a simulated source-measure-unit driver so the whole flow can run without
//! hardware.

pub mod dcpower;

use crate::error::TsmResult;

/// Behaviour every driver session exposes to this crate.
pub trait InstrumentSession: Send + Sync {
    /// Resource the session was opened on (e.g. "DCPower1/0,DCPower1/1")
    fn resource_name(&self) -> &str;

    /// Whether `close` has not been called yet
    fn is_open(&self) -> bool;

    /// Release driver resources. Closing twice is a no-op.
    fn close(&self) -> TsmResult<()>;
}

/// Options applied when opening a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Open a simulated session that performs no hardware I/O
    pub simulate: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self { simulate: true }
    }
}

impl DriverOptions {
    /// Options for a simulated session
    #[must_use]
    pub fn simulated() -> Self {
        Self { simulate: true }
    }
}
