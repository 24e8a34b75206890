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

//! Simulated LM83 bus and a hand-driven clock
//!
//! `SimBus` models any number of chips as 256-byte register files. Writes to
//! a limit's write address land in the matching read register, the same way
//! the silicon behaves, and every transfer is counted so callers can check
//! exactly what reached the bus. Used by the test suite and by
//! `lm83 --simulate`.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use lm83_error::BusError;
use parking_lot::Mutex;

use crate::bus::Bus;
use crate::clock::Clock;
use crate::registers::{ReadRegister, WriteRegister, MANUFACTURER_NATIONAL};

/// Register file and transfer log of one simulated chip
#[derive(Debug, Clone)]
pub struct SimChip {
    regs: [u8; 256],
    reads: [usize; 256],
    writes: Vec<(u8, u8)>,
    failing_reads: HashSet<u8>,
    fail_writes: bool,
}

impl SimChip {
    /// A device that answers every register with zero
    pub fn blank() -> Self {
        Self {
            regs: [0; 256],
            reads: [0; 256],
            writes: Vec::new(),
            failing_reads: HashSet::new(),
            fail_writes: false,
        }
    }

    /// A freshly powered LM83: clean status, National manufacturer ID
    pub fn lm83() -> Self {
        Self::blank().with(ReadRegister::ManufacturerId, MANUFACTURER_NATIONAL)
    }

    pub fn with(mut self, reg: ReadRegister, value: u8) -> Self {
        self.regs[reg.addr() as usize] = value;
        self
    }

    /// Read register backing a write register
    fn read_alias(register: u8) -> Option<ReadRegister> {
        let reg = match register {
            r if r == WriteRegister::Config.addr() => ReadRegister::Config,
            r if r == WriteRegister::LocalHigh.addr() => ReadRegister::LocalHigh,
            r if r == WriteRegister::Remote1High.addr() => ReadRegister::Remote1High,
            r if r == WriteRegister::Remote2High.addr() => ReadRegister::Remote2High,
            r if r == WriteRegister::Remote3High.addr() => ReadRegister::Remote3High,
            _ => return None,
        };
        Some(reg)
    }
}

#[derive(Debug, Default)]
struct SimState {
    chips: HashMap<u8, SimChip>,
    attached: HashSet<u8>,
    refuse_attach: HashSet<u8>,
    no_byte_reads: bool,
}

/// Simulated SMBus adapter
#[derive(Debug, Default)]
pub struct SimBus {
    state: Mutex<SimState>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chip(&self, address: u8, chip: SimChip) {
        self.state.lock().chips.insert(address, chip);
    }

    /// Make the adapter report no byte-data read capability
    pub fn disable_byte_reads(&self) {
        self.state.lock().no_byte_reads = true;
    }

    /// Make the bus layer refuse to attach a client at `address`
    pub fn refuse_attach(&self, address: u8) {
        self.state.lock().refuse_attach.insert(address);
    }

    pub fn set_register(&self, address: u8, reg: ReadRegister, value: u8) {
        if let Some(chip) = self.state.lock().chips.get_mut(&address) {
            chip.regs[reg.addr() as usize] = value;
        }
    }

    pub fn register(&self, address: u8, reg: ReadRegister) -> u8 {
        self.state
            .lock()
            .chips
            .get(&address)
            .map_or(0, |chip| chip.regs[reg.addr() as usize])
    }

    pub fn fail_reads(&self, address: u8, reg: ReadRegister) {
        if let Some(chip) = self.state.lock().chips.get_mut(&address) {
            chip.failing_reads.insert(reg.addr());
        }
    }

    pub fn fail_writes(&self, address: u8) {
        if let Some(chip) = self.state.lock().chips.get_mut(&address) {
            chip.fail_writes = true;
        }
    }

    pub fn clear_failures(&self, address: u8) {
        if let Some(chip) = self.state.lock().chips.get_mut(&address) {
            chip.failing_reads.clear();
            chip.fail_writes = false;
        }
    }

    /// Number of reads of one register
    pub fn reads(&self, address: u8, reg: ReadRegister) -> usize {
        self.state
            .lock()
            .chips
            .get(&address)
            .map_or(0, |chip| chip.reads[reg.addr() as usize])
    }

    pub fn total_reads(&self, address: u8) -> usize {
        self.state
            .lock()
            .chips
            .get(&address)
            .map_or(0, |chip| chip.reads.iter().sum())
    }

    /// Every successful write as `(register, value)`, oldest first
    pub fn writes(&self, address: u8) -> Vec<(u8, u8)> {
        self.state
            .lock()
            .chips
            .get(&address)
            .map(|chip| chip.writes.clone())
            .unwrap_or_default()
    }

    pub fn last_write(&self, address: u8) -> Option<(u8, u8)> {
        self.writes(address).last().copied()
    }

    pub fn is_attached(&self, address: u8) -> bool {
        self.state.lock().attached.contains(&address)
    }
}

impl Bus for SimBus {
    fn supports_byte_reads(&self, _address: u8) -> bool {
        !self.state.lock().no_byte_reads
    }

    fn read_byte(&self, address: u8, register: u8) -> Result<u8, BusError> {
        let mut state = self.state.lock();
        let chip = state
            .chips
            .get_mut(&address)
            .ok_or(BusError::Nack { address, register })?;
        if chip.failing_reads.contains(&register) {
            return Err(BusError::Timeout { address });
        }
        chip.reads[register as usize] += 1;
        Ok(chip.regs[register as usize])
    }

    fn write_byte(&self, address: u8, register: u8, value: u8) -> Result<(), BusError> {
        let mut state = self.state.lock();
        let chip = state
            .chips
            .get_mut(&address)
            .ok_or(BusError::Nack { address, register })?;
        let target = SimChip::read_alias(register).ok_or(BusError::Nack { address, register })?;
        if chip.fail_writes {
            return Err(BusError::Timeout { address });
        }
        chip.regs[target.addr() as usize] = value;
        chip.writes.push((register, value));
        Ok(())
    }

    fn attach_client(&self, address: u8, _name: &str) -> Result<(), BusError> {
        let mut state = self.state.lock();
        if state.refuse_attach.contains(&address) || !state.attached.insert(address) {
            return Err(BusError::Unsupported(format!("address 0x{:02x} is busy", address)));
        }
        Ok(())
    }

    fn detach_client(&self, address: u8) {
        self.state.lock().attached.remove(&address);
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        // Start well past the origin so the clock can also be wound back.
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::from_secs(3600)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    pub fn rewind(&self, by: Duration) {
        let mut offset = self.offset.lock();
        *offset = offset.saturating_sub(by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// A bus with one LM83 at 0x4c and plausible readings on every channel
pub fn demo_bus() -> SimBus {
    let bus = SimBus::new();
    bus.add_chip(
        0x4c,
        SimChip::lm83()
            .with(ReadRegister::LocalTemp, 34)
            .with(ReadRegister::Remote1Temp, 52)
            .with(ReadRegister::Remote2Temp, 47)
            .with(ReadRegister::Remote3Temp, 0xF6),
    );
    bus
}
