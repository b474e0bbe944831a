//! # TSM Session Bindings
//!
//! This crate binds instrument driver sessions to a semiconductor test context. A pin
//! map declares instruments, DUT and system pins, and how pins are wired to instrument
//! channels on each site. Test code opens one driver session per channel identifier the
//! pin map declares, registers it, and later asks for the sessions behind a pin or a pin
//! group.
//!
//! ## Crate Structure
//!
//! - **`channel`**: Instrument categories, physical channels and the `ChannelId` forms
//!   sessions are registered under.
//! - **`pin_map`**: TOML pin map loading, validation and wiring lookups.
//! - **`context`**: `TsmContext`, the owner of one test execution's pin map, active sites
//!   and diagnostics sink.
//! - **`registry`**: `SessionRegistry`, channel identifier to session mapping.
//! - **`resolver`**: `PinResolver`, pin and pin group resolution to sessions.
//! - **`query_context`**: `PinQueryContext`, the scope returned by every resolution.
//! - **`diagnostics`**: Deprecation notices and the sinks that receive them.
//! - **`driver`**: The session seam plus a simulated DC power driver.
//! - **`config`** / **`logging`**: Figment configuration and tracing setup.
//! - **`error`**: The `TsmError` enum shared by every module.

pub mod channel;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod logging;
pub mod pin_map;
pub mod query_context;
pub mod registry;
pub mod resolver;

pub use channel::{ChannelId, InstrumentType, PhysicalChannel};
pub use context::TsmContext;
pub use diagnostics::{DeprecationNotice, DiagnosticsSink, RecordingSink, TracingSink};
pub use driver::dcpower::DcPowerSession;
pub use driver::{DriverOptions, InstrumentSession};
pub use error::{TsmError, TsmResult};
pub use pin_map::PinMap;
pub use query_context::PinQueryContext;
pub use registry::SessionRegistry;
pub use resolver::{PinQuery, PinResolver};
