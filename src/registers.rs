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

//! LM83 register map
//!
//! The chip reads and writes some logical registers at different addresses
//! (the high limits and the configuration byte). The two directions are kept
//! as separate types so a write can never be aimed at a read address.

use std::ops::RangeInclusive;

/// Manufacturer ID reported by National Semiconductor parts
pub const MANUFACTURER_NATIONAL: u8 = 0x01;

/// Bits of status register 1 that may be set on a genuine LM83
pub const STATUS1_MASK: u8 = 0xA8;
/// Bits of status register 2 that may be set on a genuine LM83
pub const STATUS2_MASK: u8 = 0x48;
/// Bits of the configuration register that may be set on a genuine LM83
pub const CONFIG_MASK: u8 = 0x41;

/// Addresses selectable with the two three-level address pins
pub const NORMAL_ADDRESS_RANGES: [RangeInclusive<u8>; 3] = [0x18..=0x1A, 0x29..=0x2B, 0x4C..=0x4E];

/// Registers read over the bus
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ReadRegister {
    LocalTemp = 0x00,
    Remote2Temp = 0x01,
    Status1 = 0x02,
    Config = 0x03,
    LocalHigh = 0x05,
    Remote2High = 0x07,
    Remote1Temp = 0x30,
    Remote3Temp = 0x31,
    Status2 = 0x35,
    Remote1High = 0x38,
    Remote3High = 0x3A,
    ManufacturerId = 0xFE,
}

/// Registers written over the bus
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum WriteRegister {
    Config = 0x09,
    LocalHigh = 0x0B,
    Remote2High = 0x0D,
    Remote1High = 0x50,
    Remote3High = 0x52,
}

impl ReadRegister {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

impl WriteRegister {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// Every address the normal scan visits, in ascending order
pub fn normal_addresses() -> impl Iterator<Item = u8> {
    NORMAL_ADDRESS_RANGES.into_iter().flatten()
}
