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

//! Per-chip state, cached updates and channel access
//!
//! Every attached LM83 owns one [`Lm83`]. Reads go through a cache that is
//! refreshed at most once per [`STALENESS_WINDOW`]; a single mutex covers the
//! staleness check, the refresh and the copy-out so concurrent readers never
//! trigger overlapping bus refreshes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lm83_error::BusError;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bus::ChipBus;
use crate::channels::{Channel, CHANNELS, CHANNEL_COUNT};
use crate::clock::Clock;
use crate::codec::{temp_from_reg, temp_to_reg, TEMP_MAX};

/// Maximum age of cached readings before the next read goes to the bus
pub const STALENESS_WINDOW: Duration = Duration::from_millis(1500);

/// High limit written at attach time; keeps alarms quiet until configured
pub const DEFAULT_HIGH_LIMIT: i32 = TEMP_MAX;

/// Decoded state of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// Current temperature, degrees Celsius
    pub current: i32,
    /// High alarm limit, degrees Celsius
    pub high: i32,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelRegs {
    temp: u8,
    high: u8,
}

#[derive(Debug, Default)]
struct Cache {
    channels: [ChannelRegs; CHANNEL_COUNT],
    valid: bool,
    last_updated: Option<Instant>,
}

impl Cache {
    /// A clock that appears to run backwards invalidates the cache too
    fn is_stale(&self, now: Instant) -> bool {
        if !self.valid {
            return true;
        }
        match self.last_updated.map(|last| now.checked_duration_since(last)) {
            Some(Some(elapsed)) => elapsed > STALENESS_WINDOW,
            _ => true,
        }
    }

    fn reading(&self, channel: &Channel) -> Reading {
        let regs = self.channels[channel.index];
        Reading {
            current: temp_from_reg(regs.temp),
            high: temp_from_reg(regs.high),
        }
    }
}

/// One attached LM83
pub struct Lm83 {
    bus: ChipBus,
    clock: Arc<dyn Clock>,
    cache: Mutex<Cache>,
}

impl Lm83 {
    pub(crate) fn new(bus: ChipBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            bus,
            clock,
            cache: Mutex::new(Cache::default()),
        }
    }

    pub fn address(&self) -> u8 {
        self.bus.address()
    }

    pub fn name(&self) -> &'static str {
        "lm83"
    }

    /// Whether a refresh has ever completed
    pub fn is_cache_valid(&self) -> bool {
        self.cache.lock().valid
    }

    /// Program every high limit to [`DEFAULT_HIGH_LIMIT`]
    pub(crate) fn init_limits(&self) -> Result<(), BusError> {
        for channel in CHANNELS.iter() {
            self.set_high(channel, DEFAULT_HIGH_LIMIT)?;
        }
        Ok(())
    }

    /// Seed the cached high limits from the chip; writes nothing
    pub(crate) fn load_limits(&self) -> Result<(), BusError> {
        let mut highs = [0u8; CHANNEL_COUNT];
        for channel in CHANNELS.iter() {
            highs[channel.index] = self.bus.read(channel.high_read)?;
        }

        let mut cache = self.cache.lock();
        for (regs, high) in cache.channels.iter_mut().zip(highs) {
            regs.high = high;
        }
        Ok(())
    }

    /// Re-read the temperature registers if the cache has aged out
    ///
    /// A failed transfer abandons the refresh and leaves the previous cache
    /// contents and validity untouched.
    pub fn refresh_if_stale(&self) -> Result<(), BusError> {
        let mut cache = self.cache.lock();
        self.refresh_locked(&mut cache)
    }

    fn refresh_locked(&self, cache: &mut Cache) -> Result<(), BusError> {
        let now = self.clock.now();
        if !cache.is_stale(now) {
            return Ok(());
        }

        debug!(address = self.address(), "updating LM83 data");
        let mut temps = [0u8; CHANNEL_COUNT];
        for channel in CHANNELS.iter() {
            temps[channel.index] = self.bus.read(channel.temp)?;
        }

        for (regs, temp) in cache.channels.iter_mut().zip(temps) {
            regs.temp = temp;
        }
        cache.last_updated = Some(now);
        cache.valid = true;
        Ok(())
    }

    /// Current temperature and high limit of one channel
    ///
    /// Fails only when no refresh has ever succeeded; afterwards a failed
    /// refresh serves the last good values.
    pub fn read(&self, channel: &Channel) -> Result<Reading, BusError> {
        let mut cache = self.cache.lock();
        self.refresh_cached(&mut cache)?;
        Ok(cache.reading(channel))
    }

    /// All four channels from a single refresh
    pub fn read_all(&self) -> Result<[Reading; CHANNEL_COUNT], BusError> {
        let mut cache = self.cache.lock();
        self.refresh_cached(&mut cache)?;
        Ok(std::array::from_fn(|i| cache.reading(&CHANNELS[i])))
    }

    fn refresh_cached(&self, cache: &mut Cache) -> Result<(), BusError> {
        match self.refresh_locked(cache) {
            Err(err) if cache.valid => {
                warn!(address = self.address(), error = %err, "refresh failed, serving cached values");
                Ok(())
            }
            other => other,
        }
    }

    /// Write a channel's high limit; the cached limit follows the hardware
    pub fn set_high(&self, channel: &Channel, degrees: i32) -> Result<(), BusError> {
        let raw = temp_to_reg(degrees);
        let mut cache = self.cache.lock();
        if let Err(err) = self.bus.write(channel.high_write, raw) {
            warn!(address = self.address(), channel = channel.name, error = %err, "high limit write failed");
            return Err(err);
        }
        cache.channels[channel.index].high = raw;
        Ok(())
    }
}

impl std::fmt::Debug for Lm83 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lm83")
            .field("address", &format_args!("0x{:02x}", self.address()))
            .field("valid", &self.cache.try_lock().map(|cache| cache.valid))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{ReadRegister, WriteRegister};
    use crate::sim::{ManualClock, SimBus, SimChip};
    use std::thread;

    const ADDR: u8 = 0x4c;

    fn setup() -> (Arc<SimBus>, Arc<ManualClock>, Lm83) {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(ADDR, SimChip::lm83());
        let clock = Arc::new(ManualClock::new());
        let chip = Lm83::new(ChipBus::new(bus.clone(), ADDR), clock.clone());
        (bus, clock, chip)
    }

    #[test]
    fn test_first_read_always_refreshes() {
        let (bus, _clock, chip) = setup();
        assert!(!chip.is_cache_valid());

        chip.read(&CHANNELS[0]).unwrap();
        assert!(chip.is_cache_valid());
        for channel in CHANNELS.iter() {
            assert_eq!(bus.reads(ADDR, channel.temp), 1);
        }
    }

    #[test]
    fn test_reads_inside_window_share_one_refresh() {
        let (bus, clock, chip) = setup();
        chip.read(&CHANNELS[0]).unwrap();
        clock.advance(Duration::from_millis(1000));
        chip.read(&CHANNELS[2]).unwrap();
        chip.read_all().unwrap();
        assert_eq!(bus.reads(ADDR, ReadRegister::LocalTemp), 1);
    }

    #[test]
    fn test_reads_past_window_refresh_again() {
        let (bus, clock, chip) = setup();
        chip.read(&CHANNELS[0]).unwrap();
        clock.advance(STALENESS_WINDOW + Duration::from_millis(1));
        chip.read(&CHANNELS[0]).unwrap();
        assert_eq!(bus.reads(ADDR, ReadRegister::LocalTemp), 2);
    }

    #[test]
    fn test_exact_window_is_still_fresh() {
        let (bus, clock, chip) = setup();
        chip.read(&CHANNELS[0]).unwrap();
        clock.advance(STALENESS_WINDOW);
        chip.read(&CHANNELS[0]).unwrap();
        assert_eq!(bus.reads(ADDR, ReadRegister::LocalTemp), 1);
    }

    #[test]
    fn test_clock_rewind_forces_refresh() {
        let (bus, clock, chip) = setup();
        chip.read(&CHANNELS[0]).unwrap();
        clock.rewind(Duration::from_millis(10));
        chip.read(&CHANNELS[0]).unwrap();
        assert_eq!(bus.reads(ADDR, ReadRegister::LocalTemp), 2);
    }

    #[test]
    fn test_decodes_negative_temperatures() {
        let (bus, _clock, chip) = setup();
        bus.set_register(ADDR, ReadRegister::Remote2Temp, 0xF6);
        let reading = chip.read(&CHANNELS[2]).unwrap();
        assert_eq!(reading.current, -10);
    }

    #[test]
    fn test_first_refresh_failure_is_reported() {
        let (bus, _clock, chip) = setup();
        bus.fail_reads(ADDR, ReadRegister::Remote2Temp);

        assert!(chip.read(&CHANNELS[0]).is_err());
        assert!(!chip.is_cache_valid());
        // Aborted after the failing read; remote3 is never reached.
        assert_eq!(bus.reads(ADDR, ReadRegister::Remote3Temp), 0);

        bus.clear_failures(ADDR);
        assert!(chip.read(&CHANNELS[0]).is_ok());
        assert!(chip.is_cache_valid());
    }

    #[test]
    fn test_later_refresh_failure_serves_stale_values() {
        let (bus, clock, chip) = setup();
        bus.set_register(ADDR, ReadRegister::Remote1Temp, 40);
        assert_eq!(chip.read(&CHANNELS[1]).unwrap().current, 40);

        bus.set_register(ADDR, ReadRegister::LocalTemp, 30);
        bus.set_register(ADDR, ReadRegister::Remote1Temp, 45);
        bus.fail_reads(ADDR, ReadRegister::Remote1Temp);
        clock.advance(Duration::from_secs(2));

        // Nothing from the aborted refresh is visible, not even the local reading
        // that was read before the failure.
        assert_eq!(chip.read(&CHANNELS[1]).unwrap().current, 40);
        assert_eq!(chip.read(&CHANNELS[0]).unwrap().current, 0);
        assert!(chip.is_cache_valid());
    }

    #[test]
    fn test_set_high_updates_cache_without_bus_read() {
        let (bus, _clock, chip) = setup();
        chip.read(&CHANNELS[1]).unwrap();

        chip.set_high(&CHANNELS[1], 85).unwrap();
        assert_eq!(bus.register(ADDR, ReadRegister::Remote1High), 85);
        assert_eq!(bus.last_write(ADDR), Some((WriteRegister::Remote1High.addr(), 85)));

        let reading = chip.read(&CHANNELS[1]).unwrap();
        assert_eq!(reading.high, 85);
        assert_eq!(bus.reads(ADDR, ReadRegister::Remote1High), 0);
        assert_eq!(bus.reads(ADDR, ReadRegister::Remote1Temp), 1);
    }

    #[test]
    fn test_set_high_failure_keeps_cached_limit() {
        let (bus, _clock, chip) = setup();
        chip.init_limits().unwrap();
        bus.fail_writes(ADDR);

        assert!(chip.set_high(&CHANNELS[3], 60).is_err());
        assert_eq!(chip.read(&CHANNELS[3]).unwrap().high, DEFAULT_HIGH_LIMIT);
    }

    #[test]
    fn test_set_high_clamps() {
        let (bus, _clock, chip) = setup();
        chip.set_high(&CHANNELS[0], -400).unwrap();
        assert_eq!(bus.register(ADDR, ReadRegister::LocalHigh), 0x80);
        assert_eq!(chip.read(&CHANNELS[0]).unwrap().high, -128);
    }

    #[test]
    fn test_init_limits_writes_every_channel() {
        let (bus, _clock, chip) = setup();
        chip.init_limits().unwrap();

        let writes = bus.writes(ADDR);
        assert_eq!(
            writes,
            vec![(0x0B, 127), (0x50, 127), (0x0D, 127), (0x52, 127)]
        );
        assert_eq!(bus.total_reads(ADDR), 0);
    }

    #[test]
    fn test_load_limits_reads_without_writing() {
        let (bus, _clock, chip) = setup();
        bus.set_register(ADDR, ReadRegister::LocalHigh, 70);
        bus.set_register(ADDR, ReadRegister::Remote1High, 85);
        bus.set_register(ADDR, ReadRegister::Remote3High, 0xEC);
        chip.load_limits().unwrap();

        assert!(bus.writes(ADDR).is_empty());
        assert!(!chip.is_cache_valid());
        let highs: Vec<i32> = chip.read_all().unwrap().iter().map(|r| r.high).collect();
        assert_eq!(highs, vec![70, 85, 0, -20]);
        assert_eq!(bus.reads(ADDR, ReadRegister::Remote1High), 1);
    }

    #[test]
    fn test_load_limits_failure_leaves_cache_alone() {
        let (bus, _clock, chip) = setup();
        bus.set_register(ADDR, ReadRegister::LocalHigh, 70);
        bus.fail_reads(ADDR, ReadRegister::Remote2High);

        assert!(matches!(chip.load_limits(), Err(BusError::Timeout { address: ADDR })));
        bus.clear_failures(ADDR);
        assert_eq!(chip.read(&CHANNELS[0]).unwrap().high, 0);
    }

    #[test]
    fn test_concurrent_readers_refresh_once() {
        let (bus, _clock, chip) = setup();
        let chip = Arc::new(chip);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let chip = chip.clone();
                thread::spawn(move || chip.read(&CHANNELS[i % CHANNEL_COUNT]).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(bus.reads(ADDR, ReadRegister::LocalTemp), 1);
    }
}
