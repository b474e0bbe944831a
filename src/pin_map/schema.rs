//! Schema definitions for TOML pin map files.
//!
//! # Schema Structure
//!
//! ```toml
//! site_count = 2
//! dut_pins = ["DUTPin1", "DUTPin2"]
//! system_pins = ["SystemPin1"]
//!
//! [[instruments]]
//! name = "DCPower1"
//! type = "nidcpower"
//! channels = ["0", "1"]
//!
//! [[pin_groups]]
//! name = "PinGroup1"
//! pins = ["DUTPin1", "SystemPin1"]
//!
//! [[channel_groups]]          # optional, merges channels into one session
//! name = "CommonGroup"
//! type = "nidcpower"
//! channels = ["DCPower1/0", "DCPower2/0"]
//!
//! [[connections]]
//! pin = "DUTPin1"
//! site = 0                    # omitted for system pins
//! instrument = "DCPower1"
//! channel = "0"
//! ```
//!
//! These types mirror the file one to one; cross-references are checked when the
//! file is turned into a [`PinMap`](super::PinMap).

use crate::channel::InstrumentType;
use serde::{Deserialize, Serialize};

/// Complete pin map document as read from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinMapFile {
    /// Number of DUT sites
    #[serde(default = "default_site_count")]
    pub site_count: u32,

    /// Instruments and the channels they expose
    #[serde(default)]
    pub instruments: Vec<InstrumentDecl>,

    /// Pins connected once per site
    #[serde(default)]
    pub dut_pins: Vec<String>,

    /// Pins connected once, shared by all sites
    #[serde(default)]
    pub system_pins: Vec<String>,

    /// Named lists of pins
    #[serde(default)]
    pub pin_groups: Vec<PinGroupDecl>,

    /// Channels (possibly across instruments) driven by a single session
    #[serde(default)]
    pub channel_groups: Vec<ChannelGroupDecl>,

    /// Pin to channel wiring
    #[serde(default)]
    pub connections: Vec<ConnectionDecl>,
}

/// Instrument declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentDecl {
    /// Instrument name (e.g. "DCPower1")
    pub name: String,
    /// Instrument category
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
    /// Channel names in declaration order
    pub channels: Vec<String>,
}

/// Pin group declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinGroupDecl {
    /// Group name
    pub name: String,
    /// Member pin names
    pub pins: Vec<String>,
}

/// Channel group declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelGroupDecl {
    /// Group name
    pub name: String,
    /// Instrument category of every member channel
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
    /// Member channels as `instrument/channel` tokens
    pub channels: Vec<String>,
}

/// Wiring of one pin (on one site) to one instrument channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionDecl {
    /// Pin name
    pub pin: String,
    /// Site number, required for DUT pins and absent for system pins
    #[serde(default)]
    pub site: Option<u32>,
    /// Instrument name
    pub instrument: String,
    /// Channel name on the instrument
    pub channel: String,
}

fn default_site_count() -> u32 {
    1
}
