/*
 * This file is part of lm83.
 *
 * Copyright (C) 2025 lm83 contributors
 *
 * lm83 is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * lm83 is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with lm83. If not, see <https://www.gnu.org/licenses/>.
 */

//! Linux i2c-dev transport
//!
//! Built on the `i2cdev` crate. Each chip address gets its own
//! [`LinuxI2CDevice`], opened on first use and closed again when the client
//! is detached. The adapter's functionality word is read once at open time.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use lm83_error::{BusError, Lm83Error, Result};
use parking_lot::Mutex;
use tracing::debug;

use crate::bus::Bus;

// <linux/i2c-dev.h>, not exposed by i2cdev
const I2C_FUNCS: libc::c_ulong = 0x0705;

// <linux/i2c.h>
const I2C_FUNC_SMBUS_READ_BYTE_DATA: libc::c_ulong = 0x0008_0000;
const I2C_FUNC_SMBUS_WRITE_BYTE_DATA: libc::c_ulong = 0x0010_0000;

/// An i2c-dev adapter such as `/dev/i2c-1`
pub struct I2cDevBus {
    path: PathBuf,
    funcs: libc::c_ulong,
    devices: Mutex<HashMap<u8, LinuxI2CDevice>>,
}

impl I2cDevBus {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let adapter = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Lm83Error::FileRead { path: path.clone(), source })?;

        let mut funcs: libc::c_ulong = 0;
        // SAFETY: I2C_FUNCS writes one c_ulong through the pointer, which
        // refers to a live local.
        let rc = unsafe { libc::ioctl(adapter.as_raw_fd(), I2C_FUNCS as _, &mut funcs as *mut libc::c_ulong) };
        if rc < 0 {
            return Err(Lm83Error::Io(io::Error::last_os_error()));
        }
        debug!("opened i2c adapter {} (funcs {:#010x})", path.display(), funcs);

        Ok(Self {
            path,
            funcs,
            devices: Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one transfer against the device for `address`, opening it if needed
    fn with_device<T>(
        &self,
        address: u8,
        register: u8,
        transfer: impl FnOnce(&mut LinuxI2CDevice) -> std::result::Result<T, LinuxI2CError>,
    ) -> std::result::Result<T, BusError> {
        let mut devices = self.devices.lock();
        let device = match devices.entry(address) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let device = LinuxI2CDevice::new(&self.path, u16::from(address))
                    .map_err(|err| classify(address, register, err.into()))?;
                entry.insert(device)
            }
        };
        transfer(device).map_err(|err| classify(address, register, err.into()))
    }
}

/// Map errno onto the transport error taxonomy
fn classify(address: u8, register: u8, err: io::Error) -> BusError {
    match err.raw_os_error() {
        Some(libc::ENXIO) | Some(libc::EREMOTEIO) => BusError::Nack { address, register },
        Some(libc::ETIMEDOUT) => BusError::Timeout { address },
        Some(libc::EOPNOTSUPP) => BusError::Unsupported(err.to_string()),
        _ => BusError::io(address, err),
    }
}

impl Bus for I2cDevBus {
    fn supports_byte_reads(&self, _address: u8) -> bool {
        self.funcs & I2C_FUNC_SMBUS_READ_BYTE_DATA != 0
    }

    fn read_byte(&self, address: u8, register: u8) -> std::result::Result<u8, BusError> {
        self.with_device(address, register, |device| device.smbus_read_byte_data(register))
    }

    fn write_byte(&self, address: u8, register: u8, value: u8) -> std::result::Result<(), BusError> {
        if self.funcs & I2C_FUNC_SMBUS_WRITE_BYTE_DATA == 0 {
            return Err(BusError::Unsupported(format!(
                "{} cannot write byte data",
                self.path.display()
            )));
        }
        self.with_device(address, register, |device| device.smbus_write_byte_data(register, value))
    }

    fn detach_client(&self, address: u8) {
        if self.devices.lock().remove(&address).is_some() {
            debug!("closed i2c device 0x{:02x} on {}", address, self.path.display());
        }
    }
}
