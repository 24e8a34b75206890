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

//! Temperature channel table
//!
//! All four channels behave identically; they differ only in the registers
//! bound to them and the name they are exposed under.

use crate::registers::{ReadRegister, WriteRegister};

pub const CHANNEL_COUNT: usize = 4;

/// Registers and display name of one temperature channel
#[derive(Debug, PartialEq, Eq)]
pub struct Channel {
    pub index: usize,
    /// Stable attribute name (`temp1`..`temp4`)
    pub name: &'static str,
    pub label: &'static str,
    pub temp: ReadRegister,
    pub high_read: ReadRegister,
    pub high_write: WriteRegister,
}

pub static CHANNELS: [Channel; CHANNEL_COUNT] = [
    Channel {
        index: 0,
        name: "temp1",
        label: "local",
        temp: ReadRegister::LocalTemp,
        high_read: ReadRegister::LocalHigh,
        high_write: WriteRegister::LocalHigh,
    },
    Channel {
        index: 1,
        name: "temp2",
        label: "remote1",
        temp: ReadRegister::Remote1Temp,
        high_read: ReadRegister::Remote1High,
        high_write: WriteRegister::Remote1High,
    },
    Channel {
        index: 2,
        name: "temp3",
        label: "remote2",
        temp: ReadRegister::Remote2Temp,
        high_read: ReadRegister::Remote2High,
        high_write: WriteRegister::Remote2High,
    },
    Channel {
        index: 3,
        name: "temp4",
        label: "remote3",
        temp: ReadRegister::Remote3Temp,
        high_read: ReadRegister::Remote3High,
        high_write: WriteRegister::Remote3High,
    },
];

/// Look up a channel by attribute name or label (`temp2`, `remote1`)
pub fn channel_by_name(name: &str) -> Option<&'static Channel> {
    CHANNELS
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name) || c.label.eq_ignore_ascii_case(name))
}
