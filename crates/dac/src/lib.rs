pub mod bus;
pub mod sink;

pub use bus::DacBus;
#[cfg(target_os = "linux")]
pub use bus::I2cDevBus;
pub use sink::{HardwareError, OutputSink, WriteStatus, DAC_MAX, MACD_CHANNEL, SIGNAL_CHANNEL};
