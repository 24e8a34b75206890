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

//! lm83 - driver for the National Semiconductor LM83 temperature sensor
//!
//! The LM83 reports its own temperature plus up to three remote diodes, each
//! with a high alarm limit, over SMBus. This crate finds LM83s on a bus,
//! tells them apart from other chips sharing the address range, and serves
//! readings through a short-lived cache so polling doesn't saturate the bus.
//!
//! The host transport and the attribute layer are injected ([`Bus`],
//! [`AttributeLayer`]); [`I2cDevBus`] drives a real Linux adapter and
//! [`sim::SimBus`] a simulated one.
//!
//! ```no_run
//! use std::sync::Arc;
//! use lm83::{AttributeTable, Driver, MonotonicClock, ScanPlan, CHANNELS};
//!
//! let bus = Arc::new(lm83::I2cDevBus::open("/dev/i2c-1").unwrap());
//! let driver = Driver::new(bus, Arc::new(MonotonicClock), Arc::new(AttributeTable::new()));
//! driver.scan(&ScanPlan::default());
//! for chip in driver.chips() {
//!     let local = chip.read(&CHANNELS[0]).unwrap();
//!     println!("0x{:02x}: {}°C (high {}°C)", chip.address(), local.current, local.high);
//! }
//! ```

pub mod attributes;
pub mod bus;
pub mod channels;
pub mod chip;
pub mod clock;
pub mod codec;
pub mod config;
pub mod detect;
pub mod driver;
#[cfg(target_os = "linux")]
pub mod i2cdev;
pub mod logger;
pub mod registers;
pub mod sim;

pub use attributes::AttributeTable;
pub use bus::{Bus, ChipBus};
pub use channels::{channel_by_name, Channel, CHANNELS};
pub use chip::{Lm83, Reading, STALENESS_WINDOW};
pub use clock::{Clock, MonotonicClock};
pub use config::{load_config, Lm83Config};
pub use detect::{detect, ChipKind};
pub use driver::{AttributeLayer, Driver, ScanPlan, ScanReport};
#[cfg(target_os = "linux")]
pub use i2cdev::I2cDevBus;
pub use lm83_error::{BusError, Lm83Error, ProbeError, Result};
