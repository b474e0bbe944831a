//! Pin Map Model
//!
//! A pin map declares the instruments available to a test, the pins of the device under
//! test (DUT) and how each pin is wired to instrument channels on each site. This module
//! loads pin maps from TOML (see [`schema`]) and answers the lookups the session registry
//! and the pin resolver need:
//!
//! - **Session entries**: the partition of an instrument category's channels into driver
//!   sessions. Channels listed in a channel group share one entry; the remaining channels of
//!   an instrument form a per-instrument entry.
//! - **Identifier lookup**: which entry a `ChannelId` addresses.
//! - **Wiring lookup**: which channels a pin is connected to on a given site.
//!
//! # Entry Order
//!
//! Entries follow declaration order: instruments in file order, channels in instrument
//! order. A channel group entry takes the position of the first member channel met while
//! walking that order.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use tsm_sessions::{InstrumentType, PinMap};
//!
//! let pin_map = PinMap::load("tests/pin_maps/nidcpower.toml")?;
//! for entry in pin_map.session_entries(InstrumentType::NiDcPower) {
//!     println!("{} -> {}", entry.identifier(), entry.resource_string());
//! }
//! ```

pub mod schema;

use crate::channel::{join_channels, ChannelId, InstrumentType, PhysicalChannel};
use crate::error::{TsmError, TsmResult};
use figment::{
    providers::{Format, Toml},
    Figment,
};
use schema::PinMapFile;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

// =============================================================================
// Declarations
// =============================================================================

/// An instrument declared in the pin map.
#[derive(Debug, Clone)]
pub struct Instrument {
    /// Instrument name
    pub name: String,
    /// Instrument category
    pub instrument_type: InstrumentType,
    /// Channel names in declaration order
    pub channels: Vec<String>,
}

/// Whether a pin is replicated per site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKind {
    /// Connected once per site
    Dut,
    /// Connected once, shared by all sites
    System,
}

/// A declared pin.
#[derive(Debug, Clone)]
pub struct Pin {
    /// Pin name
    pub name: String,
    /// DUT or system pin
    pub kind: PinKind,
}

/// A named list of pins.
#[derive(Debug, Clone)]
pub struct PinGroup {
    /// Group name
    pub name: String,
    /// Member pins in declaration order
    pub pins: Vec<String>,
}

/// Wiring of a pin to a channel.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Pin name
    pub pin: String,
    /// Site, `None` for system pins
    pub site: Option<u32>,
    /// Wired channel
    pub channel: PhysicalChannel,
    /// Category of the wired instrument
    pub instrument_type: InstrumentType,
}

// =============================================================================
// Session Entries
// =============================================================================

/// How a session entry was formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Ungrouped channels of one instrument
    Instrument(String),
    /// A declared channel group
    ChannelGroup(String),
}

/// A set of channels driven by one session.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    source: EntrySource,
    channels: Vec<PhysicalChannel>,
}

impl SessionEntry {
    /// How the entry was formed
    #[must_use]
    pub fn source(&self) -> &EntrySource {
        &self.source
    }

    /// Channels in entry order
    #[must_use]
    pub fn channels(&self) -> &[PhysicalChannel] {
        &self.channels
    }

    /// Canonical identifier: instrument form for per-instrument entries, resource form
    /// for channel groups.
    #[must_use]
    pub fn identifier(&self) -> ChannelId {
        match &self.source {
            EntrySource::Instrument(name) => ChannelId::channels(
                name.clone(),
                join_channels(self.channels.iter().map(|c| c.channel.as_str())),
            ),
            EntrySource::ChannelGroup(_) => ChannelId::resource(self.resource_string()),
        }
    }

    /// Resource string listing every channel of the entry
    #[must_use]
    pub fn resource_string(&self) -> String {
        join_channels(self.channels.iter().map(|c| c.to_string()))
    }

    /// Channel string for a subset of this entry's channels, in entry order.
    ///
    /// Per-instrument entries use bare channel names (`"0,1"`); channel group entries use
    /// `instrument/channel` tokens since they may span instruments.
    #[must_use]
    pub fn channel_string<'a, I>(&self, subset: I) -> String
    where
        I: IntoIterator<Item = &'a PhysicalChannel>,
    {
        let subset: HashSet<&PhysicalChannel> = subset.into_iter().collect();
        let selected = self.channels.iter().filter(|c| subset.contains(c));
        match self.source {
            EntrySource::Instrument(_) => join_channels(selected.map(|c| c.channel.as_str())),
            EntrySource::ChannelGroup(_) => join_channels(selected.map(|c| c.to_string())),
        }
    }

    fn matches(&self, channels: &[PhysicalChannel]) -> bool {
        self.channels.len() == channels.len() && channels.iter().all(|c| self.channels.contains(c))
    }
}

// =============================================================================
// Pin Map
// =============================================================================

/// Validated, read-only pin map.
#[derive(Debug, Clone)]
pub struct PinMap {
    site_count: u32,
    instruments: Vec<Instrument>,
    pins: Vec<Pin>,
    pin_groups: Vec<PinGroup>,
    connections: Vec<Connection>,
    entries: HashMap<InstrumentType, Vec<SessionEntry>>,
    channel_entries: HashMap<PhysicalChannel, (InstrumentType, usize)>,
}

impl PinMap {
    /// Load a pin map from a TOML file.
    ///
    /// # Errors
    /// Returns error if:
    /// - The file does not exist
    /// - The TOML does not match the pin map schema
    /// - The declarations reference each other inconsistently
    pub fn load<P: AsRef<Path>>(path: P) -> TsmResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TsmError::PinMapNotFound(path.display().to_string()));
        }

        debug!("Loading pin map from: {}", path.display());
        let file: PinMapFile = Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| TsmError::PinMapLoad(Box::new(e)))?;

        let pin_map = Self::from_file(file)?;
        info!(
            path = %path.display(),
            instruments = pin_map.instruments.len(),
            pins = pin_map.pins.len(),
            sites = pin_map.site_count,
            "Loaded pin map"
        );
        Ok(pin_map)
    }

    /// Parse a pin map from TOML text.
    pub fn from_toml_str(toml: &str) -> TsmResult<Self> {
        let file: PinMapFile = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .map_err(|e| TsmError::PinMapLoad(Box::new(e)))?;
        Self::from_file(file)
    }

    /// Validate a parsed document and build the lookup tables.
    pub fn from_file(file: PinMapFile) -> TsmResult<Self> {
        let mut names = HashSet::new();
        let mut claim = |kind: &str, name: &str| -> TsmResult<()> {
            if name.trim().is_empty() {
                return Err(invalid(format!("{} with an empty name", kind)));
            }
            if !names.insert(name.to_string()) {
                return Err(invalid(format!("duplicate name '{}'", name)));
            }
            Ok(())
        };

        // Instruments
        let mut instruments = Vec::with_capacity(file.instruments.len());
        for decl in file.instruments {
            claim("instrument", &decl.name)?;
            if decl.channels.is_empty() {
                return Err(invalid(format!(
                    "instrument '{}' declares no channels",
                    decl.name
                )));
            }
            let mut seen = HashSet::new();
            for channel in &decl.channels {
                if channel.trim().is_empty() || channel.contains([',', '/']) {
                    return Err(invalid(format!(
                        "instrument '{}' declares invalid channel name '{}'",
                        decl.name, channel
                    )));
                }
                if !seen.insert(channel.as_str()) {
                    return Err(invalid(format!(
                        "instrument '{}' declares channel '{}' twice",
                        decl.name, channel
                    )));
                }
            }
            instruments.push(Instrument {
                name: decl.name,
                instrument_type: decl.instrument_type,
                channels: decl.channels,
            });
        }

        // Pins
        let mut pins = Vec::new();
        for name in file.dut_pins {
            claim("DUT pin", &name)?;
            pins.push(Pin {
                name,
                kind: PinKind::Dut,
            });
        }
        for name in file.system_pins {
            claim("system pin", &name)?;
            pins.push(Pin {
                name,
                kind: PinKind::System,
            });
        }

        let mut pin_groups = Vec::new();
        for decl in file.pin_groups {
            claim("pin group", &decl.name)?;
            if decl.pins.is_empty() {
                return Err(invalid(format!("pin group '{}' is empty", decl.name)));
            }
            for member in &decl.pins {
                if !pins.iter().any(|p| &p.name == member) {
                    return Err(invalid(format!(
                        "pin group '{}' references undeclared pin '{}'",
                        decl.name, member
                    )));
                }
            }
            pin_groups.push(PinGroup {
                name: decl.name,
                pins: decl.pins,
            });
        }

        let find_channel = |instrument: &str, channel: &str| -> TsmResult<InstrumentType> {
            let inst = instruments
                .iter()
                .find(|i| i.name == instrument)
                .ok_or_else(|| invalid(format!("undeclared instrument '{}'", instrument)))?;
            if !inst.channels.iter().any(|c| c == channel) {
                return Err(invalid(format!(
                    "instrument '{}' has no channel '{}'",
                    instrument, channel
                )));
            }
            Ok(inst.instrument_type)
        };

        // Channel groups
        let mut grouped: HashMap<PhysicalChannel, usize> = HashMap::new();
        let mut channel_groups = Vec::new();
        for (index, decl) in file.channel_groups.into_iter().enumerate() {
            claim("channel group", &decl.name)?;
            if decl.channels.is_empty() {
                return Err(invalid(format!("channel group '{}' is empty", decl.name)));
            }
            let mut members = Vec::with_capacity(decl.channels.len());
            for token in &decl.channels {
                let channel = PhysicalChannel::parse_token(token).map_err(|_| {
                    invalid(format!(
                        "channel group '{}' has malformed channel '{}'",
                        decl.name, token
                    ))
                })?;
                let instrument_type = find_channel(&channel.instrument, &channel.channel)?;
                if instrument_type != decl.instrument_type {
                    return Err(invalid(format!(
                        "channel group '{}' is {} but '{}' is {}",
                        decl.name, decl.instrument_type, channel, instrument_type
                    )));
                }
                if grouped.insert(channel.clone(), index).is_some() {
                    return Err(invalid(format!(
                        "channel '{}' belongs to more than one channel group",
                        channel
                    )));
                }
                members.push(channel);
            }
            channel_groups.push((decl.name, members));
        }

        // Connections
        let mut connections: Vec<Connection> = Vec::with_capacity(file.connections.len());
        for decl in file.connections {
            let pin = pins.iter().find(|p| p.name == decl.pin).ok_or_else(|| {
                invalid(format!("connection references undeclared pin '{}'", decl.pin))
            })?;
            match (pin.kind, decl.site) {
                (PinKind::Dut, None) => {
                    return Err(invalid(format!(
                        "connection for DUT pin '{}' needs a site",
                        decl.pin
                    )))
                }
                (PinKind::Dut, Some(site)) if site >= file.site_count => {
                    return Err(invalid(format!(
                        "connection for DUT pin '{}' uses site {} but the pin map declares {} sites",
                        decl.pin, site, file.site_count
                    )))
                }
                (PinKind::System, Some(_)) => {
                    return Err(invalid(format!(
                        "connection for system pin '{}' must not name a site",
                        decl.pin
                    )))
                }
                _ => {}
            }
            let instrument_type = find_channel(&decl.instrument, &decl.channel)?;
            let channel = PhysicalChannel::new(decl.instrument, decl.channel);
            if connections
                .iter()
                .any(|c| c.pin == decl.pin && c.site == decl.site && c.channel == channel)
            {
                return Err(invalid(format!(
                    "connection of pin '{}' to '{}' is declared twice",
                    decl.pin, channel
                )));
            }
            connections.push(Connection {
                pin: decl.pin,
                site: decl.site,
                channel,
                instrument_type,
            });
        }

        // Session entries
        let mut entries: HashMap<InstrumentType, Vec<SessionEntry>> = HashMap::new();
        let mut channel_entries = HashMap::new();
        let mut group_entries: HashMap<usize, usize> = HashMap::new();
        for instrument in &instruments {
            let list = entries.entry(instrument.instrument_type).or_default();
            let mut instrument_entry: Option<usize> = None;
            for channel_name in &instrument.channels {
                let channel = PhysicalChannel::new(instrument.name.clone(), channel_name.clone());
                let entry_index = match grouped.get(&channel) {
                    Some(&group) => *group_entries.entry(group).or_insert_with(|| {
                        let (name, members) = &channel_groups[group];
                        list.push(SessionEntry {
                            source: EntrySource::ChannelGroup(name.clone()),
                            channels: members.clone(),
                        });
                        list.len() - 1
                    }),
                    None => {
                        let index = *instrument_entry.get_or_insert_with(|| {
                            list.push(SessionEntry {
                                source: EntrySource::Instrument(instrument.name.clone()),
                                channels: Vec::new(),
                            });
                            list.len() - 1
                        });
                        list[index].channels.push(channel.clone());
                        index
                    }
                };
                channel_entries.insert(channel, (instrument.instrument_type, entry_index));
            }
        }

        Ok(Self {
            site_count: file.site_count,
            instruments,
            pins,
            pin_groups,
            connections,
            entries,
            channel_entries,
        })
    }

    /// Number of DUT sites
    #[must_use]
    pub fn site_count(&self) -> u32 {
        self.site_count
    }

    /// Instruments of a category in declaration order
    pub fn instruments(
        &self,
        instrument_type: InstrumentType,
    ) -> impl Iterator<Item = &Instrument> {
        self.instruments
            .iter()
            .filter(move |i| i.instrument_type == instrument_type)
    }

    /// All declared pins, DUT pins first
    #[must_use]
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// All declared pin groups
    #[must_use]
    pub fn pin_groups(&self) -> &[PinGroup] {
        &self.pin_groups
    }

    /// All declared connections
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Session entries of a category in declaration order
    #[must_use]
    pub fn session_entries(&self, instrument_type: InstrumentType) -> &[SessionEntry] {
        self.entries
            .get(&instrument_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Find the entry an identifier addresses.
    ///
    /// Either identifier form addresses an entry when it lists exactly the entry's
    /// channels, in any order.
    ///
    /// # Errors
    /// `InvalidIdentifier` if the identifier is malformed or matches no entry.
    pub fn entry_for_identifier(
        &self,
        instrument_type: InstrumentType,
        identifier: &ChannelId,
    ) -> TsmResult<usize> {
        let channels = identifier.physical_channels()?;
        self.session_entries(instrument_type)
            .iter()
            .position(|entry| entry.matches(&channels))
            .ok_or_else(|| {
                TsmError::invalid_identifier(
                    identifier.to_string(),
                    format!(
                        "does not address a {} session declared in the pin map",
                        instrument_type
                    ),
                )
            })
    }

    /// Entry index holding a channel, if the channel is of the given category
    #[must_use]
    pub fn entry_for_channel(
        &self,
        instrument_type: InstrumentType,
        channel: &PhysicalChannel,
    ) -> Option<usize> {
        match self.channel_entries.get(channel) {
            Some(&(ty, index)) if ty == instrument_type => Some(index),
            _ => None,
        }
    }

    /// Kind of a declared pin
    #[must_use]
    pub fn pin_kind(&self, name: &str) -> Option<PinKind> {
        self.pins.iter().find(|p| p.name == name).map(|p| p.kind)
    }

    /// Expand pin group names into member pins.
    ///
    /// The result keeps first-appearance order and lists each pin once.
    ///
    /// # Errors
    /// `UnknownPin` for a name that is neither a pin nor a pin group.
    pub fn expand_pins<S: AsRef<str>>(&self, names: &[S]) -> TsmResult<Vec<String>> {
        let mut expanded: Vec<String> = Vec::new();
        let mut push = |pin: &str| {
            if !expanded.iter().any(|p| p == pin) {
                expanded.push(pin.to_string());
            }
        };

        for name in names {
            let name = name.as_ref();
            if let Some(group) = self.pin_groups.iter().find(|g| g.name == name) {
                group.pins.iter().for_each(|pin| push(pin));
            } else if self.pin_kind(name).is_some() {
                push(name);
            } else {
                return Err(TsmError::UnknownPin(name.to_string()));
            }
        }

        Ok(expanded)
    }

    /// Connections of a pin on a site to instruments of a category.
    ///
    /// System pin connections carry no site and are returned for any `site`.
    pub fn connections_of<'a>(
        &'a self,
        pin: &'a str,
        site: Option<u32>,
        instrument_type: InstrumentType,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| {
            c.pin == pin
                && c.instrument_type == instrument_type
                && (c.site.is_none() || c.site == site)
        })
    }
}

fn invalid(message: String) -> TsmError {
    TsmError::PinMapValidation(message)
}
