//! Pin Resolver
//!
//! Turns pin and pin group names into the sessions registered for the channels those
//! pins are wired to.
//!
//! # Algorithm
//!
//! 1. Expand pin groups (each pin once, first appearance order); unknown names fail.
//! 2. For every DUT pin on every active site, and every system pin once, follow the pin
//!    map connections to channels of the registry's instrument category.
//! 3. Map each channel to its session entry and look the entry up in the registry.
//! 4. Emit one session and one channel string per touched entry, in entry order. A
//!    channel string lists only the touched channels of the entry.
//!
//! Pins without a connection of the category are skipped; a query touching no channel at
//! all fails with `NoChannels`.

use crate::channel::PhysicalChannel;
use crate::context::TsmContext;
use crate::error::{TsmError, TsmResult};
use crate::pin_map::PinKind;
use crate::query_context::{ChannelLocation, PinQueryContext};
use crate::registry::SessionRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// Pin Query
// =============================================================================

/// One pin name or a list of pin and pin group names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinQuery(Vec<String>);

impl PinQuery {
    /// Names as given by the caller
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for PinQuery {
    fn from(pin: &str) -> Self {
        PinQuery(vec![pin.to_string()])
    }
}

impl From<String> for PinQuery {
    fn from(pin: String) -> Self {
        PinQuery(vec![pin])
    }
}

impl From<&[&str]> for PinQuery {
    fn from(pins: &[&str]) -> Self {
        PinQuery(pins.iter().map(|p| p.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PinQuery {
    fn from(pins: [&str; N]) -> Self {
        PinQuery(pins.iter().map(|p| p.to_string()).collect())
    }
}

impl From<&[String]> for PinQuery {
    fn from(pins: &[String]) -> Self {
        PinQuery(pins.to_vec())
    }
}

impl From<Vec<String>> for PinQuery {
    fn from(pins: Vec<String>) -> Self {
        PinQuery(pins)
    }
}

impl From<Vec<&str>> for PinQuery {
    fn from(pins: Vec<&str>) -> Self {
        pins.as_slice().into()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves pins to sessions of one registry, scoped to a context's active sites.
#[derive(Debug)]
pub struct PinResolver<'a, S> {
    context: &'a TsmContext,
    registry: &'a SessionRegistry<S>,
}

/// Channel touched by a `(pin, site)`.
struct Hit {
    pin_index: usize,
    site: Option<u32>,
    channel: PhysicalChannel,
    entry: usize,
}

/// Sessions and channel strings for a query, before the single/multiple split.
struct Resolution<S> {
    context: PinQueryContext,
    entries: Vec<usize>,
    sessions: Vec<Arc<S>>,
    channel_strings: Vec<String>,
}

impl<'a, S> PinResolver<'a, S> {
    /// Create a resolver over a registry
    #[must_use]
    pub fn new(context: &'a TsmContext, registry: &'a SessionRegistry<S>) -> Self {
        Self { context, registry }
    }

    /// Resolve pins that share exactly one session.
    ///
    /// # Errors
    /// - `UnknownPin` for undeclared pin or pin group names
    /// - `NoChannels` if no pin is wired to the registry's category
    /// - `AmbiguousChannel` if the pins span more than one session entry
    /// - `UnregisteredSession` if the entry has no registered session
    pub fn resolve_one(
        &self,
        pins: impl Into<PinQuery>,
    ) -> TsmResult<(PinQueryContext, Arc<S>, String)> {
        let query = pins.into();
        let mut resolution = self.resolve(&query, true)?;
        if resolution.entries.len() != 1 {
            return Err(TsmError::AmbiguousChannel {
                pins: query.0,
                count: resolution.entries.len(),
            });
        }
        match (resolution.sessions.pop(), resolution.channel_strings.pop()) {
            (Some(session), Some(channel_string)) => {
                Ok((resolution.context, session, channel_string))
            }
            _ => Err(TsmError::NoChannels {
                pins: query.0,
                instrument_type: self.registry.instrument_type().to_string(),
            }),
        }
    }

    /// Resolve pins to every session they touch.
    ///
    /// The session and channel string lists have equal length and follow pin map
    /// declaration order of the session entries.
    pub fn resolve_many(
        &self,
        pins: impl Into<PinQuery>,
    ) -> TsmResult<(PinQueryContext, Vec<Arc<S>>, Vec<String>)> {
        let query = pins.into();
        let resolution = self.resolve(&query, false)?;
        Ok((
            resolution.context,
            resolution.sessions,
            resolution.channel_strings,
        ))
    }

    fn resolve(&self, query: &PinQuery, single: bool) -> TsmResult<Resolution<S>> {
        let instrument_type = self.registry.instrument_type();
        let pin_map = self.registry.pin_map();
        let pins = pin_map.expand_pins(query.names())?;

        let mut hits = Vec::new();
        for (pin_index, pin) in pins.iter().enumerate() {
            let sites: Vec<Option<u32>> = match pin_map.pin_kind(pin) {
                Some(PinKind::Dut) => self.context.sites().iter().copied().map(Some).collect(),
                Some(PinKind::System) => vec![None],
                None => return Err(TsmError::UnknownPin(pin.clone())),
            };
            for site in sites {
                for connection in pin_map.connections_of(pin, site, instrument_type) {
                    let Some(entry) =
                        pin_map.entry_for_channel(instrument_type, &connection.channel)
                    else {
                        continue;
                    };
                    hits.push(Hit {
                        pin_index,
                        site: connection.site,
                        channel: connection.channel.clone(),
                        entry,
                    });
                }
            }
        }

        if hits.is_empty() {
            return Err(TsmError::NoChannels {
                pins: query.names().to_vec(),
                instrument_type: instrument_type.to_string(),
            });
        }

        // Touched channels per entry, in entry order
        let entries = pin_map.session_entries(instrument_type);
        let mut touched: BTreeMap<usize, Vec<&PhysicalChannel>> = BTreeMap::new();
        for hit in &hits {
            touched.entry(hit.entry).or_default();
        }
        for (&entry, channels) in touched.iter_mut() {
            channels.extend(
                entries[entry]
                    .channels()
                    .iter()
                    .filter(|c| hits.iter().any(|h| h.entry == entry && &h.channel == *c)),
            );
        }
        let entry_indices: Vec<usize> = touched.keys().copied().collect();

        if single && entry_indices.len() != 1 {
            return Ok(Resolution {
                context: PinQueryContext::new(
                    instrument_type,
                    pins,
                    self.context.sites().to_vec(),
                    Vec::new(),
                ),
                entries: entry_indices,
                sessions: Vec::new(),
                channel_strings: Vec::new(),
            });
        }

        let sessions = entry_indices
            .iter()
            .map(|&entry| self.registry.session_at(entry).map(Arc::clone))
            .collect::<TsmResult<Vec<_>>>()?;
        let channel_strings = touched
            .iter()
            .map(|(&entry, channels)| entries[entry].channel_string(channels.iter().copied()))
            .collect();

        // Hits with the same (pin, site, channel) collapse to one location
        let mut locations: Vec<ChannelLocation> = Vec::with_capacity(hits.len());
        for hit in &hits {
            let session_index = entry_indices
                .iter()
                .position(|&e| e == hit.entry)
                .unwrap_or_default();
            let channel_index = touched[&hit.entry]
                .iter()
                .position(|c| **c == hit.channel)
                .unwrap_or_default();
            let location = ChannelLocation {
                pin_index: hit.pin_index,
                site: hit.site,
                session_index,
                channel_index,
            };
            if !locations.contains(&location) {
                locations.push(location);
            }
        }

        debug!(
            instrument_type = %instrument_type,
            pins = ?pins,
            sessions = sessions.len(),
            "Resolved pins to sessions"
        );

        Ok(Resolution {
            context: PinQueryContext::new(
                instrument_type,
                pins,
                self.context.sites().to_vec(),
                locations,
            ),
            entries: entry_indices,
            sessions,
            channel_strings,
        })
    }
}
