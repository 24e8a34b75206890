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

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use lm83_error::{Lm83Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::driver::ScanPlan;

/// Lowest and highest 7-bit addresses a scan may touch
pub const ADDRESS_RANGE: std::ops::RangeInclusive<u8> = 0x03..=0x77;

fn default_bus() -> PathBuf {
    PathBuf::from("/dev/i2c-0")
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Lm83Config {
    /// i2c-dev adapter to scan
    #[serde(default = "default_bus")]
    pub bus: PathBuf,
    /// Addresses to attach without detection or identification
    #[serde(default, deserialize_with = "deserialize_addresses")]
    pub force: Vec<u8>,
    /// Addresses to attach as an LM83 without detection
    #[serde(default, deserialize_with = "deserialize_addresses")]
    pub force_lm83: Vec<u8>,
    /// Extra addresses to autodetect
    #[serde(default, deserialize_with = "deserialize_addresses")]
    pub probe: Vec<u8>,
    /// Addresses never to autodetect
    #[serde(default, deserialize_with = "deserialize_addresses")]
    pub ignore: Vec<u8>,
    /// tracing filter used when LM83_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Lm83Config {
    fn default() -> Self {
        Self {
            bus: default_bus(),
            force: Vec::new(),
            force_lm83: Vec::new(),
            probe: Vec::new(),
            ignore: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

impl Lm83Config {
    pub fn scan_plan(&self) -> ScanPlan {
        ScanPlan {
            force: self.force.clone(),
            force_lm83: self.force_lm83.clone(),
            probe: self.probe.clone(),
            ignore: self.ignore.clone(),
        }
    }
}

/// Parse `0x4c`, `0X4C` or `76`
pub fn parse_address(s: &str) -> std::result::Result<u8, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

/// JSON has no hex literals, so accept both numbers and "0x.." strings
fn deserialize_addresses<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAddress {
        Number(u8),
        Text(String),
    }

    Vec::<RawAddress>::deserialize(deserializer)?
        .into_iter()
        .map(|raw| match raw {
            RawAddress::Number(n) => Ok(n),
            RawAddress::Text(s) => parse_address(&s).map_err(serde::de::Error::custom),
        })
        .collect()
}

pub fn config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("lm83").join("config.json");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home).join(".config").join("lm83").join("config.json");
    }
    PathBuf::from("/etc/lm83/config.json")
}

pub fn validate_config(cfg: &Lm83Config) -> Result<()> {
    let lists = [
        ("force", &cfg.force),
        ("force_lm83", &cfg.force_lm83),
        ("probe", &cfg.probe),
        ("ignore", &cfg.ignore),
    ];
    for (field, addresses) in lists {
        if let Some(bad) = addresses.iter().find(|a| !ADDRESS_RANGE.contains(*a)) {
            return Err(Lm83Error::config(format!(
                "{}: address 0x{:02x} outside 0x03..0x77",
                field, bad
            )));
        }
    }
    if cfg.log_level.trim().is_empty() {
        return Err(Lm83Error::config("log_level must not be empty"));
    }
    Ok(())
}

/// Load and validate a config file
///
/// With no explicit path, a missing file at [`config_path`] yields defaults.
pub fn load_config(path: Option<&Path>) -> Result<Lm83Config> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (config_path(), false),
    };

    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Lm83Config::default());
        }
        Err(source) => return Err(Lm83Error::FileRead { path, source }),
    };

    let cfg: Lm83Config = serde_json::from_str(&data)?;
    validate_config(&cfg)?;
    Ok(cfg)
}
