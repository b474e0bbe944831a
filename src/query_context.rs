//! Pin Query Context
//!
//! Returned alongside the sessions of every resolution call. It remembers which pins and
//! sites were resolved and where each `(pin, site)` landed in the returned session and
//! channel lists, so per-channel driver results can be regrouped per site and pin.

use crate::channel::InstrumentType;
use crate::error::{TsmError, TsmResult};

/// Position of one `(pin, site)` in the resolved sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLocation {
    /// Index into the resolved pin list
    pub pin_index: usize,
    /// Site, `None` for system pins
    pub site: Option<u32>,
    /// Index into the returned sessions
    pub session_index: usize,
    /// Index into that session's channel string
    pub channel_index: usize,
}

/// Scope of one resolution call.
#[derive(Debug, Clone)]
pub struct PinQueryContext {
    instrument_type: InstrumentType,
    pins: Vec<String>,
    sites: Vec<u32>,
    locations: Vec<ChannelLocation>,
}

impl PinQueryContext {
    pub(crate) fn new(
        instrument_type: InstrumentType,
        pins: Vec<String>,
        sites: Vec<u32>,
        locations: Vec<ChannelLocation>,
    ) -> Self {
        Self {
            instrument_type,
            pins,
            sites,
            locations,
        }
    }

    /// Instrument category the pins were resolved against
    #[must_use]
    pub fn instrument_type(&self) -> InstrumentType {
        self.instrument_type
    }

    /// Resolved pins, pin groups expanded
    #[must_use]
    pub fn pins(&self) -> &[String] {
        &self.pins
    }

    /// Active sites at resolution time
    #[must_use]
    pub fn sites(&self) -> &[u32] {
        &self.sites
    }

    /// Every resolved `(pin, site)` location
    #[must_use]
    pub fn locations(&self) -> &[ChannelLocation] {
        &self.locations
    }

    /// `(session_index, channel_index)` of a pin on a site.
    ///
    /// System pins are found for any site. When a pin is wired to several channels of the
    /// category on one site, the first declared connection wins.
    #[must_use]
    pub fn channel_location(&self, pin: &str, site: u32) -> Option<(usize, usize)> {
        let pin_index = self.pins.iter().position(|p| p == pin)?;
        self.location(pin_index, site)
            .map(|l| (l.session_index, l.channel_index))
    }

    fn location(&self, pin_index: usize, site: u32) -> Option<&ChannelLocation> {
        self.locations
            .iter()
            .find(|l| l.pin_index == pin_index && (l.site.is_none() || l.site == Some(site)))
    }

    /// Regroup per-session, per-channel values into rows per site and columns per pin.
    ///
    /// `per_session[i][j]` is the value for channel `j` of session `i`, in the order of the
    /// channel strings returned by the resolution call. System pin values are repeated on
    /// every site.
    ///
    /// # Errors
    /// `MeasurementShape` if a resolved pin has no channel on an active site or a value is
    /// missing from `per_session`.
    pub fn per_site_per_pin<T: Clone>(&self, per_session: &[Vec<T>]) -> TsmResult<Vec<Vec<T>>> {
        self.sites
            .iter()
            .map(|&site| {
                (0..self.pins.len())
                    .map(|pin_index| {
                        let location = self.location(pin_index, site).ok_or_else(|| {
                            TsmError::MeasurementShape(format!(
                                "pin '{}' has no {} channel on site {}",
                                self.pins[pin_index], self.instrument_type, site
                            ))
                        })?;
                        per_session
                            .get(location.session_index)
                            .and_then(|values| values.get(location.channel_index))
                            .cloned()
                            .ok_or_else(|| {
                                TsmError::MeasurementShape(format!(
                                    "no value for session {} channel {}",
                                    location.session_index, location.channel_index
                                ))
                            })
                    })
                    .collect()
            })
            .collect()
    }

    /// [`per_site_per_pin`](Self::per_site_per_pin) for contexts resolved to a single session.
    pub fn per_site_per_pin_single<T: Clone>(&self, values: &[T]) -> TsmResult<Vec<Vec<T>>> {
        self.per_site_per_pin(&[values.to_vec()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> PinQueryContext {
        // A on two sites (session 0), Vdd system pin (session 1)
        PinQueryContext::new(
            InstrumentType::NiDcPower,
            vec!["A".into(), "Vdd".into()],
            vec![0, 1],
            vec![
                ChannelLocation {
                    pin_index: 0,
                    site: Some(0),
                    session_index: 0,
                    channel_index: 0,
                },
                ChannelLocation {
                    pin_index: 0,
                    site: Some(1),
                    session_index: 0,
                    channel_index: 1,
                },
                ChannelLocation {
                    pin_index: 1,
                    site: None,
                    session_index: 1,
                    channel_index: 0,
                },
            ],
        )
    }

    #[test]
    fn test_channel_location() {
        let ctx = context();
        assert_eq!(ctx.channel_location("A", 1), Some((0, 1)));
        assert_eq!(ctx.channel_location("Vdd", 0), Some((1, 0)));
        assert_eq!(ctx.channel_location("Vdd", 1), Some((1, 0)));
        assert_eq!(ctx.channel_location("B", 0), None);
    }

    #[test]
    fn test_per_site_per_pin() {
        let ctx = context();
        let per_session = vec![vec![1.0, 2.0], vec![5.0]];

        let grouped = ctx.per_site_per_pin(&per_session).unwrap();
        assert_eq!(grouped, vec![vec![1.0, 5.0], vec![2.0, 5.0]]);
    }

    #[test]
    fn test_per_site_per_pin_shape_mismatch() {
        let ctx = context();
        let result = ctx.per_site_per_pin(&[vec![1.0, 2.0]]);
        assert!(matches!(result, Err(TsmError::MeasurementShape(_))));
    }
}
