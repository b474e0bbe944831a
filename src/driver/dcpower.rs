//! Simulated DC power (source measure unit) driver.
//!
//! Sessions are opened either on channels of one instrument or on a resource string
//! spanning several instruments, mirroring how vendor drivers accept both forms. Only
//! simulated operation is available: every channel sources the last configured voltage
//! level and measures it back exactly.
//!
//! # Example
//!
//! ```rust,ignore
//! let session = DcPowerSession::open("DCPower1", "0,1", &DriverOptions::simulated())?;
//! session.configure_voltage_level("0", 1.8)?;
//! assert_eq!(session.measure_voltage("0,1")?, vec![1.8, 0.0]);
//! session.close()?;
//! ```

use crate::channel::{ChannelId, PhysicalChannel};
use crate::driver::{DriverOptions, InstrumentSession};
use crate::error::{TsmError, TsmResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Simulated DC power session.
#[derive(Debug)]
pub struct DcPowerSession {
    resource: String,
    /// Instrument name when opened on a single instrument; channel strings are then bare
    /// channel names instead of `instrument/channel` tokens.
    instrument: Option<String>,
    channels: Vec<PhysicalChannel>,
    levels: Mutex<Vec<f64>>,
    open: AtomicBool,
}

impl DcPowerSession {
    /// Open a session on channels of one instrument.
    ///
    /// # Arguments
    /// * `instrument` - Instrument name (e.g. "DCPower1")
    /// * `channels` - Comma separated channel list (e.g. "0,1")
    /// * `options` - Driver options; only simulated sessions are supported
    pub fn open(instrument: &str, channels: &str, options: &DriverOptions) -> TsmResult<Self> {
        let id = ChannelId::channels(instrument, channels);
        Self::open_channels(&id, Some(instrument.trim().to_string()), options)
    }

    /// Open a session on a resource string (`instrument/channel` tokens).
    pub fn open_resource(resource: &str, options: &DriverOptions) -> TsmResult<Self> {
        Self::open_channels(&ChannelId::resource(resource), None, options)
    }

    fn open_channels(
        id: &ChannelId,
        instrument: Option<String>,
        options: &DriverOptions,
    ) -> TsmResult<Self> {
        if !options.simulate {
            return Err(TsmError::Driver(format!(
                "cannot open '{}': hardware access is not available, open with simulate = true",
                id
            )));
        }
        let channels = id
            .physical_channels()
            .map_err(|e| TsmError::Driver(e.to_string()))?;
        let resource = channels
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");

        debug!(resource = %resource, "Opened simulated DC power session");
        Ok(Self {
            resource,
            instrument,
            levels: Mutex::new(vec![0.0; channels.len()]),
            channels,
            open: AtomicBool::new(true),
        })
    }

    /// Channels the session controls
    #[must_use]
    pub fn channels(&self) -> &[PhysicalChannel] {
        &self.channels
    }

    /// Set the voltage level sourced on the listed channels.
    pub fn configure_voltage_level(&self, channels: &str, volts: f64) -> TsmResult<()> {
        let indices = self.channel_indices(channels)?;
        let mut levels = self.levels.lock();
        for index in indices {
            levels[index] = volts;
        }
        Ok(())
    }

    /// Measure voltage on the listed channels, in the order given.
    pub fn measure_voltage(&self, channels: &str) -> TsmResult<Vec<f64>> {
        let indices = self.channel_indices(channels)?;
        let levels = self.levels.lock();
        Ok(indices.into_iter().map(|index| levels[index]).collect())
    }

    fn channel_indices(&self, channels: &str) -> TsmResult<Vec<usize>> {
        if !self.is_open() {
            return Err(TsmError::SessionClosed(self.resource.clone()));
        }
        let requested = match &self.instrument {
            Some(instrument) => ChannelId::channels(instrument.clone(), channels),
            None => ChannelId::resource(channels),
        }
        .physical_channels()
        .map_err(|e| TsmError::Driver(e.to_string()))?;

        requested
            .iter()
            .map(|channel| {
                self.channels.iter().position(|c| c == channel).ok_or_else(|| {
                    TsmError::Driver(format!(
                        "channel '{}' is not part of session '{}'",
                        channel, self.resource
                    ))
                })
            })
            .collect()
    }
}

impl InstrumentSession for DcPowerSession {
    fn resource_name(&self) -> &str {
        &self.resource
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) -> TsmResult<()> {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!(resource = %self.resource, "Closed simulated DC power session");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_on_instrument_channels() {
        let session = DcPowerSession::open("DCPower1", "0,1", &DriverOptions::simulated()).unwrap();
        assert_eq!(session.resource_name(), "DCPower1/0,DCPower1/1");
        assert_eq!(session.channels().len(), 2);
        assert!(session.is_open());
    }

    #[test]
    fn test_hardware_mode_unavailable() {
        let options = DriverOptions { simulate: false };
        let result = DcPowerSession::open("DCPower1", "0", &options);
        assert!(matches!(result, Err(TsmError::Driver(_))));
    }

    #[test]
    fn test_voltage_round_trip() {
        let session =
            DcPowerSession::open_resource("DCPower1/0, DCPower2/0", &DriverOptions::simulated())
                .unwrap();
        session.configure_voltage_level("DCPower2/0", 3.3).unwrap();

        let measured = session.measure_voltage("DCPower2/0,DCPower1/0").unwrap();
        assert_eq!(measured, vec![3.3, 0.0]);

        assert!(session.measure_voltage("DCPower3/0").is_err());
    }

    #[test]
    fn test_closed_session_rejects_operations() {
        let session = DcPowerSession::open("DCPower1", "0", &DriverOptions::simulated()).unwrap();
        session.close().unwrap();
        session.close().unwrap();

        assert!(!session.is_open());
        assert!(matches!(
            session.measure_voltage("0"),
            Err(TsmError::SessionClosed(_))
        ));
    }
}
