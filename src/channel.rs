//! Channel addressing: instrument categories, physical channels and the two
//! identifier forms sessions are registered under.
//!
//! ```text
//! ChannelId::Channels { instrument: "DCPower1", channels: "0,1" }
//! ChannelId::Resource("DCPower1/0, DCPower2/0")
//! ```

use crate::error::{TsmError, TsmResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Instrument Type
// =============================================================================

/// Hardware category a pin map instrument belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentType {
    /// Source measure units and power supplies
    NiDcPower,
    /// Digital multimeters
    NiDmm,
    /// Digital pattern instruments
    NiDigital,
    /// Oscilloscopes and digitizers
    NiScope,
    /// Function and arbitrary waveform generators
    NiFgen,
}

impl InstrumentType {
    /// Name used in pin map files (e.g. "nidcpower")
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::NiDcPower => "nidcpower",
            InstrumentType::NiDmm => "nidmm",
            InstrumentType::NiDigital => "nidigital",
            InstrumentType::NiScope => "niscope",
            InstrumentType::NiFgen => "nifgen",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Physical Channel
// =============================================================================

/// One channel of one instrument, as declared in the pin map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalChannel {
    /// Instrument name (e.g. "DCPower1")
    pub instrument: String,
    /// Channel name within the instrument (e.g. "0")
    pub channel: String,
}

impl PhysicalChannel {
    /// Create a channel reference
    #[must_use]
    pub fn new(instrument: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            channel: channel.into(),
        }
    }

    /// Parse an `instrument/channel` resource token.
    pub fn parse_token(token: &str) -> TsmResult<Self> {
        let token = token.trim();
        match token.split_once('/') {
            Some((instrument, channel))
                if !instrument.trim().is_empty() && !channel.trim().is_empty() =>
            {
                Ok(Self::new(instrument.trim(), channel.trim()))
            }
            _ => Err(TsmError::invalid_identifier(
                token,
                "expected a token of the form 'instrument/channel'",
            )),
        }
    }
}

impl fmt::Display for PhysicalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instrument, self.channel)
    }
}

// =============================================================================
// Channel Identifier
// =============================================================================

/// Key a session is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// Instrument name plus a comma separated channel list of that instrument
    Channels {
        /// Instrument name
        instrument: String,
        /// Comma separated channel list (e.g. "0,1")
        channels: String,
    },
    /// Comma separated `instrument/channel` tokens, possibly spanning instruments
    Resource(String),
}

impl ChannelId {
    /// Identifier for channels of a single instrument
    #[must_use]
    pub fn channels(instrument: impl Into<String>, channels: impl Into<String>) -> Self {
        ChannelId::Channels {
            instrument: instrument.into(),
            channels: channels.into(),
        }
    }

    /// Identifier for a resource string
    #[must_use]
    pub fn resource(resource: impl Into<String>) -> Self {
        ChannelId::Resource(resource.into())
    }

    /// Expand the identifier into the physical channels it addresses.
    ///
    /// # Errors
    /// `InvalidIdentifier` if the identifier is empty, contains an empty channel or
    /// token, or lists the same channel twice.
    pub fn physical_channels(&self) -> TsmResult<Vec<PhysicalChannel>> {
        let parsed = match self {
            ChannelId::Channels {
                instrument,
                channels,
            } => {
                if instrument.trim().is_empty() {
                    return Err(TsmError::invalid_identifier(
                        self.to_string(),
                        "instrument name is empty",
                    ));
                }
                split_list(channels)
                    .map(|channel| {
                        if channel.is_empty() {
                            Err(TsmError::invalid_identifier(
                                self.to_string(),
                                "channel string contains an empty channel",
                            ))
                        } else {
                            Ok(PhysicalChannel::new(instrument.trim(), channel))
                        }
                    })
                    .collect::<TsmResult<Vec<_>>>()?
            }
            ChannelId::Resource(resource) => split_list(resource)
                .map(PhysicalChannel::parse_token)
                .collect::<TsmResult<Vec<_>>>()?,
        };

        for (i, channel) in parsed.iter().enumerate() {
            if parsed[..i].contains(channel) {
                return Err(TsmError::invalid_identifier(
                    self.to_string(),
                    format!("channel '{}' is listed twice", channel),
                ));
            }
        }

        Ok(parsed)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Channels {
                instrument,
                channels,
            } => write!(f, "{}[{}]", instrument, channels),
            ChannelId::Resource(resource) => f.write_str(resource),
        }
    }
}

/// Split a comma separated list, trimming entries. An empty or blank input yields a
/// single empty entry so callers can reject it.
fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim)
}

/// Join channel names with commas, the format drivers accept as a channel string.
#[must_use]
pub fn join_channels<I, S>(channels: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    channels
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}
