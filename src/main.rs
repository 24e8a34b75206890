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

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;

use lm83::{channel_by_name, logger, sim, AttributeTable, Bus, Driver, MonotonicClock, CHANNELS};

use cli::{Cli, Commands};

#[derive(Serialize)]
struct ChannelReport {
    name: &'static str,
    label: &'static str,
    current: i32,
    high: i32,
    magnitude: u32,
}

#[derive(Serialize)]
struct ChipReport {
    address: String,
    chip: &'static str,
    channels: Vec<ChannelReport>,
}

#[cfg(target_os = "linux")]
fn open_bus(path: &Path) -> anyhow::Result<Arc<dyn Bus>> {
    let bus = lm83::I2cDevBus::open(path)
        .with_context(|| format!("cannot open {} (is i2c-dev loaded, are you root?)", path.display()))?;
    Ok(Arc::new(bus))
}

#[cfg(not(target_os = "linux"))]
fn open_bus(path: &Path) -> anyhow::Result<Arc<dyn Bus>> {
    bail!("{}: i2c-dev is only available on Linux; use --simulate", path.display())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = lm83::load_config(cli.config.as_deref())?;
    logger::init_logging(&config.log_level);

    let mut plan = config.scan_plan();
    plan.merge(cli.scan.into_plan());

    let bus: Arc<dyn Bus> = if cli.simulate {
        Arc::new(sim::demo_bus())
    } else {
        let path = cli.bus.as_deref().unwrap_or(&config.bus);
        open_bus(path)?
    };

    // Limits survive between runs unless the operator asks for a reset.
    let init_limits = matches!(cli.command, Commands::Scan { init_limits: true });
    let attributes = Arc::new(AttributeTable::new());
    let driver = Driver::new(bus, Arc::new(MonotonicClock), attributes.clone()).with_limit_init(init_limits);
    let report = driver.scan(&plan);
    for (address, err) in report.errors() {
        eprintln!("warning: 0x{:02x}: {}", address, err);
    }

    let result = run(&cli.command, &driver, &attributes);
    driver.detach_all();
    result
}

fn run(command: &Commands, driver: &Driver, attributes: &AttributeTable) -> anyhow::Result<()> {
    match command {
        Commands::Scan { .. } => {
            let chips = driver.chips();
            if chips.is_empty() {
                println!("No LM83 found");
            }
            for chip in chips {
                println!("0x{:02x}  {}", chip.address(), chip.name());
            }
        }
        Commands::Read { json } => {
            let mut reports = Vec::new();
            for address in attributes.addresses() {
                let mut channels = Vec::new();
                for name in attributes.names(address)? {
                    let reading = attributes
                        .get(address, name)
                        .with_context(|| format!("reading 0x{:02x} {}", address, name))?;
                    let label = channel_by_name(name).map_or("", |c| c.label);
                    channels.push(ChannelReport {
                        name,
                        label,
                        current: reading.current,
                        high: reading.high,
                        magnitude: attributes.magnitude(address, name)?,
                    });
                }
                reports.push(ChipReport {
                    address: format!("0x{:02x}", address),
                    chip: "lm83",
                    channels,
                });
            }

            if *json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for chip in &reports {
                    println!("{} @ {}", chip.chip, chip.address);
                    for ch in &chip.channels {
                        println!("  {:<6} {:<8} {:>4}°C  (high {:>4}°C)", ch.name, ch.label, ch.current, ch.high);
                    }
                }
            }
        }
        Commands::SetHigh { address, channel, degrees } => {
            let Some(channel) = channel_by_name(channel) else {
                bail!("unknown channel '{}' (expected one of {})", channel, channel_names());
            };
            if driver.get(*address).is_none() {
                bail!("no LM83 attached at 0x{:02x}", address);
            }
            attributes.set(*address, channel.name, *degrees)?;
            let reading = attributes.get(*address, channel.name)?;
            println!("0x{:02x} {} high limit now {}°C", address, channel.name, reading.high);
        }
    }
    Ok(())
}

fn channel_names() -> String {
    CHANNELS.iter().map(|c| c.name).collect::<Vec<_>>().join(", ")
}
