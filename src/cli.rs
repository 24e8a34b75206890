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

//! Command line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lm83::config::parse_address;
use lm83::ScanPlan;

#[derive(Parser)]
#[command(name = "lm83")]
#[command(version)]
#[command(about = "Detect and read LM83 temperature sensors")]
#[command(long_about = "Detect and read LM83 temperature sensors

Scans an i2c-dev adapter for LM83 chips (addresses 0x18-0x1a, 0x29-0x2b,
0x4c-0x4e), then reports or configures their four temperature channels:
temp1 (local), temp2..temp4 (remote diodes 1-3).

EXAMPLES:
    lm83 scan                          List attached chips
    lm83 scan --init-limits            Attach and reset high limits to 127°C
    lm83 --bus /dev/i2c-3 read         Read every channel
    lm83 read --json                   Machine-readable output
    lm83 scan --force-lm83 0x4c        Attach without detection
    lm83 set-high 0x4c temp2 85        Set remote1 high limit to 85°C
    lm83 --simulate read               Run against a simulated chip

ENVIRONMENT VARIABLES:
    LM83_LOG=debug         Log filter (overrides log_level)

FILES:
    ~/.config/lm83/config.json   bus, force/force_lm83/probe/ignore, log_level")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: ~/.config/lm83/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// i2c-dev adapter, overrides the config file
    #[arg(long, global = true)]
    pub bus: Option<PathBuf>,

    /// Use a simulated LM83 at 0x4c instead of hardware
    #[arg(long, global = true)]
    pub simulate: bool,

    #[command(flatten)]
    pub scan: ScanArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Default)]
pub struct ScanArgs {
    /// Attach at ADDR without detection or identification
    #[arg(long, value_name = "ADDR", value_parser = parse_address, global = true)]
    pub force: Vec<u8>,

    /// Attach at ADDR as an LM83 without detection
    #[arg(long, value_name = "ADDR", value_parser = parse_address, global = true)]
    pub force_lm83: Vec<u8>,

    /// Also autodetect at ADDR
    #[arg(long, value_name = "ADDR", value_parser = parse_address, global = true)]
    pub probe: Vec<u8>,

    /// Never autodetect at ADDR
    #[arg(long, value_name = "ADDR", value_parser = parse_address, global = true)]
    pub ignore: Vec<u8>,
}

impl ScanArgs {
    pub fn into_plan(self) -> ScanPlan {
        ScanPlan {
            force: self.force,
            force_lm83: self.force_lm83,
            probe: self.probe,
            ignore: self.ignore,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the bus and list attached chips
    Scan {
        /// Program every high limit to 127°C while attaching
        #[arg(long)]
        init_limits: bool,
    },

    /// Print every channel of every attached chip
    Read {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Set a channel's high alarm limit
    SetHigh {
        /// Chip address, e.g. 0x4c
        #[arg(value_parser = parse_address)]
        address: u8,
        /// Channel name (temp1..temp4, local, remote1..remote3)
        channel: String,
        /// Limit in degrees Celsius (-128..127)
        #[arg(allow_negative_numbers = true)]
        degrees: i32,
    },
}
