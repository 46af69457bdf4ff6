use std::io;

use thiserror::Error;
#[cfg(target_os = "linux")]
use tracing::info;
use tracing::{debug, warn};

use crate::DacBus;

/// Full-scale code of the 12-bit DAC.
pub const DAC_MAX: u16 = 4095;

/// DAC driven by the signal line.
pub const SIGNAL_CHANNEL: u8 = 0x60;

/// DAC driven by the MACD line.
pub const MACD_CHANNEL: u8 = 0x61;

/// "Write DAC register" command byte.
const WRITE_DAC_REGISTER: u8 = 0x40;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("value {value} is outside the DAC range 0..=4095")]
    OutOfRange { value: f64 },

    #[error("I2C write to 0x{address:02X} failed: {source}")]
    Bus {
        address: u8,
        #[source]
        source: io::Error,
    },
}

/// What a successful `OutputSink::write` did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteStatus {
    /// The code was sent to the DAC.
    Written { code: u16 },
    /// No hardware; `value` is what would have been written.
    Skipped { value: f64 },
}

enum Mode {
    Enabled(Box<dyn DacBus>),
    Disabled,
}

/// Analog output for the oscillator values.
///
/// Built once at startup. When the bus is absent the sink is disabled and
/// every write reports `Skipped`, so callers never branch on hardware
/// presence.
pub struct OutputSink {
    mode: Mode,
}

impl OutputSink {
    pub fn enabled(bus: Box<dyn DacBus>) -> Self {
        Self {
            mode: Mode::Enabled(bus),
        }
    }

    pub fn disabled() -> Self {
        Self {
            mode: Mode::Disabled,
        }
    }

    /// Open the I2C bus at `path`, falling back to a disabled sink.
    #[cfg(target_os = "linux")]
    pub fn detect(path: &str) -> Self {
        match crate::I2cDevBus::open(path) {
            Ok(bus) => {
                info!(path, "I2C bus available, DAC output enabled");
                Self::enabled(Box::new(bus))
            }
            Err(e) => {
                warn!(path, error = %e, "I2C bus not available, DAC output disabled");
                Self::disabled()
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn detect(path: &str) -> Self {
        warn!(path, "I2C is only supported on Linux, DAC output disabled");
        Self::disabled()
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.mode, Mode::Enabled(_))
    }

    /// Write `value` to the DAC at `address`.
    ///
    /// Enabled sinks reject values outside `0..=4095` (NaN included) and
    /// truncate the rest to a 12-bit code. Disabled sinks skip the write.
    pub fn write(&mut self, address: u8, value: f64) -> Result<WriteStatus, HardwareError> {
        let bus = match &mut self.mode {
            Mode::Enabled(bus) => bus,
            Mode::Disabled => {
                debug!(address, value, "DAC write skipped, no hardware");
                return Ok(WriteStatus::Skipped { value });
            }
        };

        let code = to_code(value)?;
        bus.write_block(address, WRITE_DAC_REGISTER, encode(code))
            .map_err(|source| HardwareError::Bus { address, source })?;
        debug!(address, value, code, "Wrote DAC value");
        Ok(WriteStatus::Written { code })
    }
}

fn to_code(value: f64) -> Result<u16, HardwareError> {
    if !(0.0..=f64::from(DAC_MAX)).contains(&value) {
        return Err(HardwareError::OutOfRange { value });
    }
    Ok(value as u16)
}

/// Upper eight bits in the first byte, lower four in the high nibble of the second.
fn encode(code: u16) -> [u8; 2] {
    [((code >> 4) & 0xFF) as u8, ((code << 4) & 0xFF) as u8]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(u8, u8, [u8; 2])>>>;

    struct RecordingBus {
        writes: Log,
        fail: bool,
    }

    impl DacBus for RecordingBus {
        fn write_block(&mut self, address: u8, command: u8, data: [u8; 2]) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::Other, "nack"));
            }
            self.writes.lock().unwrap().push((address, command, data));
            Ok(())
        }
    }

    fn recording_sink(fail: bool) -> (OutputSink, Log) {
        let writes = Log::default();
        let bus = RecordingBus {
            writes: writes.clone(),
            fail,
        };
        (OutputSink::enabled(Box::new(bus)), writes)
    }

    #[test]
    fn rejects_values_outside_range() {
        let (mut sink, writes) = recording_sink(false);
        for value in [4096.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = sink.write(SIGNAL_CHANNEL, value).unwrap_err();
            assert!(matches!(err, HardwareError::OutOfRange { .. }));
        }
        assert!(writes.lock().unwrap().is_empty());
    }

    #[test]
    fn accepts_range_bounds() {
        let (mut sink, writes) = recording_sink(false);
        assert_eq!(
            sink.write(SIGNAL_CHANNEL, 4095.0).unwrap(),
            WriteStatus::Written { code: 4095 }
        );
        assert_eq!(
            sink.write(MACD_CHANNEL, 0.0).unwrap(),
            WriteStatus::Written { code: 0 }
        );

        let writes = writes.lock().unwrap();
        assert_eq!(writes[0], (0x60, 0x40, [0xFF, 0xF0]));
        assert_eq!(writes[1], (0x61, 0x40, [0x00, 0x00]));
    }

    #[test]
    fn encodes_twelve_bit_code_across_two_bytes() {
        assert_eq!(encode(0xABC), [0xAB, 0xC0]);
        assert_eq!(encode(1), [0x00, 0x10]);
        assert_eq!(encode(2048), [0x80, 0x00]);
    }

    #[test]
    fn fractional_values_truncate() {
        let (mut sink, _) = recording_sink(false);
        assert_eq!(
            sink.write(SIGNAL_CHANNEL, 0.73).unwrap(),
            WriteStatus::Written { code: 0 }
        );
        assert_eq!(
            sink.write(SIGNAL_CHANNEL, 1234.9).unwrap(),
            WriteStatus::Written { code: 1234 }
        );
    }

    #[test]
    fn bus_failures_are_reported() {
        let (mut sink, _) = recording_sink(true);
        let err = sink.write(MACD_CHANNEL, 10.0).unwrap_err();
        assert!(matches!(err, HardwareError::Bus { address: 0x61, .. }));
    }

    #[test]
    fn disabled_sink_skips_and_keeps_value() {
        let mut sink = OutputSink::disabled();
        assert!(!sink.is_enabled());
        assert_eq!(
            sink.write(SIGNAL_CHANNEL, -3.5).unwrap(),
            WriteStatus::Skipped { value: -3.5 }
        );
    }

    #[test]
    fn missing_bus_degrades_to_disabled() {
        let sink = OutputSink::detect("/nonexistent/i2c-99");
        assert!(!sink.is_enabled());
    }
}
