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

//! LM83 detection and identification
//!
//! The LM83 shares its address range with many other sensors, so a device
//! answering at one of its addresses proves nothing. Detection checks that
//! the status and configuration registers have no bits set that an LM83
//! would never set; identification then requires the National Semiconductor
//! manufacturer ID. An operator can force a chip kind, which skips both.

use std::fmt;

use lm83_error::ProbeError;
use tracing::debug;

use crate::bus::ChipBus;
use crate::registers::{
    ReadRegister, CONFIG_MASK, MANUFACTURER_NATIONAL, STATUS1_MASK, STATUS2_MASK,
};

/// Chip kind requested by the operator when forcing a probe
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ChipKind(pub u8);

impl ChipKind {
    /// "A supported chip is there, don't probe it"
    pub const ANY: ChipKind = ChipKind(0);
    /// The only kind this driver handles
    pub const LM83: ChipKind = ChipKind(1);
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ChipKind::ANY => write!(f, "any"),
            ChipKind::LM83 => write!(f, "lm83"),
            ChipKind(other) => write!(f, "kind {}", other),
        }
    }
}

/// Decide whether the device behind `bus` is an LM83
///
/// Returns the resolved kind, which is always [`ChipKind::LM83`] on success.
pub fn detect(bus: &ChipBus, forced_kind: Option<ChipKind>) -> Result<ChipKind, ProbeError> {
    match forced_kind {
        None => {
            check_signature(bus)?;
            identify(bus)
        }
        Some(kind @ (ChipKind::ANY | ChipKind::LM83)) => {
            debug!(address = bus.address(), %kind, "forced, skipping detection");
            Ok(ChipKind::LM83)
        }
        Some(ChipKind(other)) => Err(ProbeError::UnsupportedKind(other)),
    }
}

fn check_signature(bus: &ChipBus) -> Result<(), ProbeError> {
    let checks = [
        (ReadRegister::Status1, STATUS1_MASK),
        (ReadRegister::Status2, STATUS2_MASK),
        (ReadRegister::Config, CONFIG_MASK),
    ];

    for (reg, mask) in checks {
        let value = bus.read(reg).map_err(|err| {
            debug!(address = bus.address(), ?reg, error = %err, "detection read failed");
            ProbeError::SignatureMismatch
        })?;
        if value & !mask != 0 {
            debug!(address = bus.address(), ?reg, value, "LM83 detection failed");
            return Err(ProbeError::SignatureMismatch);
        }
    }
    Ok(())
}

fn identify(bus: &ChipBus) -> Result<ChipKind, ProbeError> {
    let man_id = bus.read(ReadRegister::ManufacturerId).map_err(|err| {
        debug!(address = bus.address(), error = %err, "manufacturer id read failed");
        ProbeError::SignatureMismatch
    })?;

    if man_id != MANUFACTURER_NATIONAL {
        debug!(address = bus.address(), man_id, "unsupported chip");
        return Err(ProbeError::UnknownManufacturer(man_id));
    }
    Ok(ChipKind::LM83)
}
