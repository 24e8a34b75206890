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

//! Bus access
//!
//! The host transport is injected through [`Bus`]; everything else in the
//! driver goes through [`ChipBus`], which pins one chip address and only
//! accepts typed read and write registers.

use std::sync::Arc;

use lm83_error::BusError;
use tracing::trace;

use crate::registers::{ReadRegister, WriteRegister};

/// Byte-register transport provided by the host (SMBus byte-data transfers)
///
/// Implementations must be safe to call from several threads at once; each
/// call is one complete, blocking bus transaction.
#[cfg_attr(test, mockall::automock)]
pub trait Bus: Send + Sync {
    /// Whether the adapter can issue single-byte register reads to `address`
    fn supports_byte_reads(&self, address: u8) -> bool;

    fn read_byte(&self, address: u8, register: u8) -> Result<u8, BusError>;

    fn write_byte(&self, address: u8, register: u8, value: u8) -> Result<(), BusError>;

    /// Tell the bus layer a client now owns `address`
    fn attach_client(&self, _address: u8, _name: &str) -> Result<(), BusError> {
        Ok(())
    }

    /// Release an address previously claimed with [`Bus::attach_client`]
    fn detach_client(&self, _address: u8) {}
}

/// A [`Bus`] bound to one chip address
#[derive(Clone)]
pub struct ChipBus {
    bus: Arc<dyn Bus>,
    address: u8,
}

impl ChipBus {
    pub fn new(bus: Arc<dyn Bus>, address: u8) -> Self {
        Self { bus, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn read(&self, reg: ReadRegister) -> Result<u8, BusError> {
        let value = self.bus.read_byte(self.address, reg.addr())?;
        trace!(address = self.address, ?reg, value, "register read");
        Ok(value)
    }

    pub fn write(&self, reg: WriteRegister, value: u8) -> Result<(), BusError> {
        trace!(address = self.address, ?reg, value, "register write");
        self.bus.write_byte(self.address, reg.addr(), value)
    }
}

impl std::fmt::Debug for ChipBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChipBus(0x{:02x})", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_reads_use_read_address() {
        let mut bus = MockBus::new();
        bus.expect_read_byte()
            .with(eq(0x4c), eq(0x38))
            .times(1)
            .returning(|_, _| Ok(0x55));

        let chip = ChipBus::new(Arc::new(bus), 0x4c);
        assert_eq!(chip.read(ReadRegister::Remote1High).unwrap(), 0x55);
    }

    #[test]
    fn test_writes_use_write_address() {
        let mut bus = MockBus::new();
        bus.expect_write_byte()
            .with(eq(0x2a), eq(0x50), eq(85))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let chip = ChipBus::new(Arc::new(bus), 0x2a);
        chip.write(WriteRegister::Remote1High, 85).unwrap();
    }

    #[test]
    fn test_errors_pass_through() {
        let mut bus = MockBus::new();
        bus.expect_read_byte()
            .returning(|address, register| Err(BusError::Nack { address, register }));

        let chip = ChipBus::new(Arc::new(bus), 0x18);
        let err = chip.read(ReadRegister::LocalTemp).unwrap_err();
        assert!(matches!(err, BusError::Nack { address: 0x18, register: 0x00 }));
    }
}
