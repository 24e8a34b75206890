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

//! In-process attribute table
//!
//! Publishes each attached chip's channels under their stable names
//! (`temp1`..`temp4`) and routes get/set requests to the channel accessors.
//! Values are whole degrees, so every attribute reports a magnitude of 0.

use std::collections::BTreeMap;
use std::sync::Arc;

use lm83_error::{Lm83Error, Result};
use parking_lot::RwLock;
use tracing::debug;

use crate::channels::Channel;
use crate::chip::{Lm83, Reading};
use crate::driver::AttributeLayer;

/// Decimal places of every published value
pub const MAGNITUDE: u32 = 0;

struct Entry {
    chip: Arc<Lm83>,
    channels: &'static [Channel],
}

impl Entry {
    fn channel(&self, name: &str) -> Result<&'static Channel> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Lm83Error::UnknownChannel(name.to_string()))
    }
}

#[derive(Default)]
pub struct AttributeTable {
    entries: RwLock<BTreeMap<u8, Entry>>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered chip addresses, ascending
    pub fn addresses(&self) -> Vec<u8> {
        self.entries.read().keys().copied().collect()
    }

    /// Attribute names published for `address`
    pub fn names(&self, address: u8) -> Result<Vec<&'static str>> {
        let entries = self.entries.read();
        let entry = entries.get(&address).ok_or(Lm83Error::NotAttached(address))?;
        Ok(entry.channels.iter().map(|c| c.name).collect())
    }

    /// Read handler: `(current, high)` of one channel
    pub fn get(&self, address: u8, name: &str) -> Result<Reading> {
        let (chip, channel) = self.lookup(address, name)?;
        Ok(chip.read(channel)?)
    }

    /// Decimal places of the value behind `name`
    pub fn magnitude(&self, address: u8, name: &str) -> Result<u32> {
        self.lookup(address, name)?;
        Ok(MAGNITUDE)
    }

    /// Write handler: set one channel's high limit
    pub fn set(&self, address: u8, name: &str, high: i32) -> Result<()> {
        let (chip, channel) = self.lookup(address, name)?;
        Ok(chip.set_high(channel, high)?)
    }

    fn lookup(&self, address: u8, name: &str) -> Result<(Arc<Lm83>, &'static Channel)> {
        let entries = self.entries.read();
        let entry = entries.get(&address).ok_or(Lm83Error::NotAttached(address))?;
        Ok((entry.chip.clone(), entry.channel(name)?))
    }
}

impl AttributeLayer for AttributeTable {
    fn register(&self, chip: &Arc<Lm83>, channels: &'static [Channel]) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&chip.address()) {
            return Err(Lm83Error::Registration(format!(
                "0x{:02x} is already registered",
                chip.address()
            )));
        }
        debug!(address = chip.address(), name = chip.name(), "registering attributes");
        entries.insert(
            chip.address(),
            Entry {
                chip: chip.clone(),
                channels,
            },
        );
        Ok(())
    }

    fn deregister(&self, address: u8) {
        self.entries.write().remove(&address);
    }
}
