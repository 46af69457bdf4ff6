use std::io;

/// Byte-level transport to the DAC chips.
///
/// The sink owns its bus for the lifetime of the stream loop, so writes take
/// `&mut self` and no locking is involved.
pub trait DacBus: Send {
    /// Write `command` followed by `data` to the device at `address`.
    fn write_block(&mut self, address: u8, command: u8, data: [u8; 2]) -> io::Result<()>;
}

#[cfg(target_os = "linux")]
pub use linux::I2cDevBus;

#[cfg(target_os = "linux")]
mod linux {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Write};
    use std::os::fd::AsRawFd;
    use std::path::Path;

    use tracing::debug;

    use super::DacBus;

    /// `I2C_SLAVE` from `linux/i2c-dev.h`.
    const I2C_SLAVE: u16 = 0x0703;

    nix::ioctl_write_int_bad!(i2c_select_slave, I2C_SLAVE);

    /// I2C bus exposed by the kernel's i2c-dev driver (e.g. `/dev/i2c-1`).
    pub struct I2cDevBus {
        file: File,
        selected: Option<u8>,
    }

    impl I2cDevBus {
        pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
            let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
            debug!(path = %path.as_ref().display(), "Opened I2C bus");
            Ok(Self {
                file,
                selected: None,
            })
        }

        fn select(&mut self, address: u8) -> io::Result<()> {
            if self.selected == Some(address) {
                return Ok(());
            }
            // SAFETY: the fd is owned by `self.file` and stays open for the call;
            // I2C_SLAVE takes the 7-bit address by value.
            let res = unsafe { i2c_select_slave(self.file.as_raw_fd(), i32::from(address)) };
            res.map_err(io::Error::from)?;
            self.selected = Some(address);
            Ok(())
        }
    }

    impl DacBus for I2cDevBus {
        fn write_block(&mut self, address: u8, command: u8, data: [u8; 2]) -> io::Result<()> {
            self.select(address)?;
            self.file.write_all(&[command, data[0], data[1]])
        }
    }
}
