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

//! Driver registry: probing, attaching and detaching chips
//!
//! A [`Driver`] owns every attached [`Lm83`], keyed by bus address. The bus
//! management layer calls [`Driver::probe`] once per candidate address, or
//! [`Driver::scan`] to walk the normal address ranges plus any operator
//! overrides. Attribute exposure is delegated to an [`AttributeLayer`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use lm83_error::{Lm83Error, ProbeError, Result};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::bus::{Bus, ChipBus};
use crate::channels::{Channel, CHANNELS};
use crate::chip::Lm83;
use crate::clock::Clock;
use crate::detect::{detect, ChipKind};
use crate::registers::normal_addresses;

/// Client name announced to the bus layer
pub const CLIENT_NAME: &str = "LM83 chip";

/// Exposes attached chips to operators (sysfs-style attribute files, a UI, ...)
pub trait AttributeLayer: Send + Sync {
    /// Publish `channels` of `chip`; called once per successful probe
    fn register(&self, chip: &Arc<Lm83>, channels: &'static [Channel]) -> Result<()>;

    /// Withdraw everything published for `address`
    fn deregister(&self, address: u8);
}

/// Which addresses to probe, and how
///
/// Mirrors the classic `force`, `force_lm83`, `probe` and `ignore` module
/// parameters. Forced addresses are probed even when listed in `ignore`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPlan {
    /// Probe with [`ChipKind::ANY`]: skip detection and identification
    pub force: Vec<u8>,
    /// Probe with [`ChipKind::LM83`]
    pub force_lm83: Vec<u8>,
    /// Extra addresses to autodetect beyond the normal ranges
    pub probe: Vec<u8>,
    /// Normal or extra addresses to leave alone
    pub ignore: Vec<u8>,
}

impl ScanPlan {
    /// Addresses in ascending order with the kind each is probed with
    pub fn targets(&self) -> Vec<(u8, Option<ChipKind>)> {
        let mut targets: BTreeMap<u8, Option<ChipKind>> = normal_addresses()
            .chain(self.probe.iter().copied())
            .filter(|addr| !self.ignore.contains(addr))
            .map(|addr| (addr, None))
            .collect();
        for &addr in &self.force {
            targets.insert(addr, Some(ChipKind::ANY));
        }
        for &addr in &self.force_lm83 {
            targets.insert(addr, Some(ChipKind::LM83));
        }
        targets.into_iter().collect()
    }

    pub fn merge(&mut self, other: ScanPlan) {
        self.force.extend(other.force);
        self.force_lm83.extend(other.force_lm83);
        self.probe.extend(other.probe);
        self.ignore.extend(other.ignore);
    }
}

/// Outcome of a bus scan
#[derive(Debug, Default)]
pub struct ScanReport {
    pub attached: Vec<u8>,
    /// Addresses that already had a client
    pub skipped: Vec<u8>,
    pub failures: Vec<(u8, ProbeError)>,
}

impl ScanReport {
    /// Failures other than "no LM83 here"
    pub fn errors(&self) -> impl Iterator<Item = &(u8, ProbeError)> {
        self.failures.iter().filter(|(_, err)| !err.is_silent())
    }
}

#[derive(Default)]
struct Registry {
    attached: HashMap<u8, Arc<Lm83>>,
    /// Addresses with a probe in flight
    probing: HashSet<u8>,
}

/// Holds an address for one probe; released on drop
struct Claim<'a> {
    registry: &'a Mutex<Registry>,
    address: u8,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.registry.lock().probing.remove(&self.address);
    }
}

/// The LM83 driver and its registry of attached chips
pub struct Driver {
    bus: Arc<dyn Bus>,
    clock: Arc<dyn Clock>,
    attributes: Arc<dyn AttributeLayer>,
    init_limits: bool,
    registry: Mutex<Registry>,
}

impl Driver {
    pub fn new(bus: Arc<dyn Bus>, clock: Arc<dyn Clock>, attributes: Arc<dyn AttributeLayer>) -> Self {
        Self {
            bus,
            clock,
            attributes,
            init_limits: true,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Choose whether a probe programs the default high limits
    ///
    /// On by default. When off, the limits already in the chip are read into
    /// the cache and nothing is written.
    pub fn with_limit_init(mut self, enabled: bool) -> Self {
        self.init_limits = enabled;
        self
    }

    fn claim(&self, address: u8) -> std::result::Result<Claim<'_>, ProbeError> {
        let mut registry = self.registry.lock();
        if registry.attached.contains_key(&address) || !registry.probing.insert(address) {
            return Err(ProbeError::AddressBusy(address));
        }
        Ok(Claim {
            registry: &self.registry,
            address,
        })
    }

    /// Probe one address and attach the chip if it is an LM83
    ///
    /// The address is claimed up front; the registry lock is not held across
    /// bus transfers. Any partially attached state is unwound before an
    /// error is returned.
    pub fn probe(&self, address: u8, forced_kind: Option<ChipKind>) -> std::result::Result<Arc<Lm83>, ProbeError> {
        if !self.bus.supports_byte_reads(address) {
            debug!(address, "bus doesn't support byte read mode, skipping");
            return Err(ProbeError::UnsupportedTransport);
        }

        let _claim = self.claim(address)?;

        let chip_bus = ChipBus::new(self.bus.clone(), address);
        detect(&chip_bus, forced_kind)?;

        self.registry
            .lock()
            .attached
            .try_reserve(1)
            .map_err(|_| ProbeError::AllocationFailed)?;
        let chip = Arc::new(Lm83::new(chip_bus, self.clock.clone()));

        self.bus.attach_client(address, CLIENT_NAME).map_err(|err| {
            debug!(address, error = %err, "failed attaching client");
            ProbeError::RegistrationFailed(err.to_string())
        })?;

        let limits = if self.init_limits {
            chip.init_limits()
        } else {
            chip.load_limits()
        };
        if let Err(err) = limits {
            self.bus.detach_client(address);
            return Err(ProbeError::InitFailed(err));
        }

        if let Err(err) = self.attributes.register(&chip, &CHANNELS) {
            debug!(address, error = %err, "failed registering attributes");
            self.bus.detach_client(address);
            return Err(ProbeError::RegistrationFailed(err.to_string()));
        }

        {
            let mut registry = self.registry.lock();
            registry.probing.remove(&address);
            registry.attached.insert(address, chip.clone());
        }
        info!("LM83 attached at 0x{:02x}", address);
        Ok(chip)
    }

    /// Release the chip at `address`; its handle must not be used afterwards
    pub fn detach(&self, address: u8) -> Result<()> {
        let chip = self
            .registry
            .lock()
            .attached
            .remove(&address)
            .ok_or(Lm83Error::NotAttached(address))?;
        self.attributes.deregister(chip.address());
        self.bus.detach_client(chip.address());
        info!("LM83 detached from 0x{:02x}", address);
        Ok(())
    }

    pub fn detach_all(&self) {
        for address in self.addresses() {
            // Only fails if another thread detached it first.
            let _ = self.detach(address);
        }
    }

    /// Probe every target of `plan`; one address failing never stops the scan
    pub fn scan(&self, plan: &ScanPlan) -> ScanReport {
        let mut report = ScanReport::default();
        for (address, forced_kind) in plan.targets() {
            match self.probe(address, forced_kind) {
                Ok(_) => report.attached.push(address),
                Err(ProbeError::AddressBusy(_)) => report.skipped.push(address),
                Err(err) => {
                    if err.is_silent() {
                        debug!(address, error = %err, "no LM83");
                    } else {
                        warn!(error = %err, "LM83 probe at 0x{:02x} failed", address);
                    }
                    report.failures.push((address, err));
                }
            }
        }
        report
    }

    pub fn get(&self, address: u8) -> Option<Arc<Lm83>> {
        self.registry.lock().attached.get(&address).cloned()
    }

    /// Attached addresses, ascending
    pub fn addresses(&self) -> Vec<u8> {
        let mut addresses: Vec<u8> = self.registry.lock().attached.keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }

    /// Attached chips ordered by address
    pub fn chips(&self) -> Vec<Arc<Lm83>> {
        let mut list: Vec<Arc<Lm83>> = self.registry.lock().attached.values().cloned().collect();
        list.sort_by_key(|chip| chip.address());
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeTable;
    use crate::bus::MockBus;
    use crate::registers::ReadRegister;
    use crate::sim::{ManualClock, SimBus, SimChip};
    use lm83_error::BusError;
    use std::sync::mpsc;
    use std::thread;

    fn driver_with(bus: Arc<SimBus>) -> (Driver, Arc<AttributeTable>) {
        let attributes = Arc::new(AttributeTable::new());
        let driver = Driver::new(bus, Arc::new(ManualClock::new()), attributes.clone());
        (driver, attributes)
    }

    struct RefusingAttributes;

    impl AttributeLayer for RefusingAttributes {
        fn register(&self, chip: &Arc<Lm83>, _channels: &'static [Channel]) -> Result<()> {
            Err(Lm83Error::Registration(format!("no room for 0x{:02x}", chip.address())))
        }

        fn deregister(&self, _address: u8) {}
    }

    #[test]
    fn test_probe_attaches_and_registers() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x4c, SimChip::lm83());
        let (driver, attributes) = driver_with(bus.clone());

        let chip = driver.probe(0x4c, None).unwrap();
        assert_eq!(chip.address(), 0x4c);
        assert!(!chip.is_cache_valid());
        assert!(bus.is_attached(0x4c));
        assert_eq!(attributes.addresses(), vec![0x4c]);
        assert_eq!(driver.addresses(), vec![0x4c]);
    }

    #[test]
    fn test_probe_refuses_busy_address() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x4c, SimChip::lm83());
        let (driver, _attributes) = driver_with(bus);

        driver.probe(0x4c, None).unwrap();
        assert!(matches!(
            driver.probe(0x4c, Some(ChipKind::ANY)),
            Err(ProbeError::AddressBusy(0x4c))
        ));
    }

    #[test]
    fn test_unsupported_transport_touches_nothing() {
        let mut bus = MockBus::new();
        bus.expect_supports_byte_reads().times(1).return_const(false);
        let driver = Driver::new(
            Arc::new(bus),
            Arc::new(ManualClock::new()),
            Arc::new(AttributeTable::new()),
        );

        assert!(matches!(
            driver.probe(0x18, Some(ChipKind::ANY)),
            Err(ProbeError::UnsupportedTransport)
        ));
    }

    #[test]
    fn test_init_failure_unwinds_bus_client() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x2a, SimChip::lm83());
        bus.fail_writes(0x2a);
        let (driver, attributes) = driver_with(bus.clone());

        assert!(matches!(driver.probe(0x2a, None), Err(ProbeError::InitFailed(_))));
        assert!(!bus.is_attached(0x2a));
        assert!(attributes.addresses().is_empty());
        assert!(driver.get(0x2a).is_none());
    }

    #[test]
    fn test_registration_failure_unwinds_bus_client() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x2a, SimChip::lm83());
        let driver = Driver::new(bus.clone(), Arc::new(ManualClock::new()), Arc::new(RefusingAttributes));

        let err = driver.probe(0x2a, None).unwrap_err();
        assert!(matches!(err, ProbeError::RegistrationFailed(ref msg) if msg.contains("0x2a")));
        assert!(!bus.is_attached(0x2a));
        assert!(driver.addresses().is_empty());
    }

    #[test]
    fn test_bus_attach_failure_is_registration_failure() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x2a, SimChip::lm83());
        bus.refuse_attach(0x2a);
        let (driver, attributes) = driver_with(bus.clone());

        assert!(matches!(
            driver.probe(0x2a, None),
            Err(ProbeError::RegistrationFailed(_))
        ));
        assert!(bus.writes(0x2a).is_empty());
        assert!(attributes.addresses().is_empty());
    }

    #[test]
    fn test_detach_releases_everything() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x19, SimChip::lm83());
        let (driver, attributes) = driver_with(bus.clone());

        driver.probe(0x19, None).unwrap();
        driver.detach(0x19).unwrap();
        assert!(!bus.is_attached(0x19));
        assert!(attributes.addresses().is_empty());
        assert!(matches!(driver.detach(0x19), Err(Lm83Error::NotAttached(0x19))));

        // The address can be probed again once released.
        driver.probe(0x19, None).unwrap();
    }

    #[test]
    fn test_preserve_limits_attach_writes_nothing() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x4c, SimChip::lm83().with(ReadRegister::Remote1High, 85));
        let attributes = Arc::new(AttributeTable::new());
        let driver = Driver::new(bus.clone(), Arc::new(ManualClock::new()), attributes)
            .with_limit_init(false);

        let chip = driver.probe(0x4c, None).unwrap();
        assert!(bus.writes(0x4c).is_empty());
        assert_eq!(chip.read(&CHANNELS[1]).unwrap().high, 85);
    }

    #[test]
    fn test_preserve_limits_read_failure_unwinds() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x4c, SimChip::lm83());
        bus.fail_reads(0x4c, ReadRegister::Remote3High);
        let (driver, attributes) = driver_with(bus.clone());
        let driver = driver.with_limit_init(false);

        assert!(matches!(driver.probe(0x4c, None), Err(ProbeError::InitFailed(_))));
        assert!(!bus.is_attached(0x4c));
        assert!(attributes.addresses().is_empty());
    }

    /// Stalls the first read at one address until released
    struct StallingBus {
        inner: SimBus,
        stalled: u8,
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl Bus for StallingBus {
        fn supports_byte_reads(&self, address: u8) -> bool {
            self.inner.supports_byte_reads(address)
        }

        fn read_byte(&self, address: u8, register: u8) -> std::result::Result<u8, BusError> {
            if address == self.stalled {
                if let Some(entered) = self.entered.lock().take() {
                    entered.send(()).unwrap();
                    let release = self.release.lock().take().unwrap();
                    release.recv().unwrap();
                }
            }
            self.inner.read_byte(address, register)
        }

        fn write_byte(&self, address: u8, register: u8, value: u8) -> std::result::Result<(), BusError> {
            self.inner.write_byte(address, register, value)
        }

        fn attach_client(&self, address: u8, name: &str) -> std::result::Result<(), BusError> {
            self.inner.attach_client(address, name)
        }

        fn detach_client(&self, address: u8) {
            self.inner.detach_client(address)
        }
    }

    #[test]
    fn test_registry_usable_during_slow_attach() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let inner = SimBus::new();
        inner.add_chip(0x18, SimChip::lm83());
        inner.add_chip(0x4c, SimChip::lm83());
        let bus = Arc::new(StallingBus {
            inner,
            stalled: 0x4c,
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(Some(release_rx)),
        });
        let driver = Arc::new(Driver::new(
            bus,
            Arc::new(ManualClock::new()),
            Arc::new(AttributeTable::new()),
        ));
        driver.probe(0x18, None).unwrap();

        let slow = {
            let driver = driver.clone();
            thread::spawn(move || driver.probe(0x4c, None).map(|chip| chip.address()))
        };
        entered_rx.recv().unwrap();

        // 0x4c is mid-detection: other chips stay reachable and the address is claimed.
        assert_eq!(driver.addresses(), vec![0x18]);
        assert!(driver.get(0x18).is_some());
        assert!(matches!(driver.probe(0x4c, None), Err(ProbeError::AddressBusy(0x4c))));
        driver.detach(0x18).unwrap();

        release_tx.send(()).unwrap();
        assert_eq!(slow.join().unwrap().unwrap(), 0x4c);
        assert_eq!(driver.addresses(), vec![0x4c]);
    }

    #[test]
    fn test_failed_attach_releases_claim() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x4c, SimChip::lm83().with(ReadRegister::Status1, 0xFF));
        let (driver, _attributes) = driver_with(bus.clone());

        assert!(matches!(driver.probe(0x4c, None), Err(ProbeError::SignatureMismatch)));
        bus.set_register(0x4c, ReadRegister::Status1, 0);
        driver.probe(0x4c, None).unwrap();
    }

    #[test]
    fn test_scan_plan_targets() {
        let plan = ScanPlan {
            force: vec![0x4c],
            force_lm83: vec![0x50],
            probe: vec![0x20],
            ignore: vec![0x18, 0x4c],
        };
        let targets = plan.targets();
        assert_eq!(targets.first(), Some(&(0x19, None)));
        assert!(targets.contains(&(0x20, None)));
        assert!(targets.contains(&(0x4c, Some(ChipKind::ANY))));
        assert!(targets.contains(&(0x50, Some(ChipKind::LM83))));
        assert!(!targets.iter().any(|(addr, _)| *addr == 0x18));
        assert_eq!(targets.len(), 10);
    }

    #[test]
    fn test_scan_continues_past_failures() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x18, SimChip::lm83().with(ReadRegister::Status1, 0xFF));
        bus.add_chip(0x29, SimChip::lm83().with(ReadRegister::ManufacturerId, 0x41));
        bus.add_chip(0x2b, SimChip::lm83());
        bus.add_chip(0x4e, SimChip::lm83());
        let (driver, _attributes) = driver_with(bus);

        let report = driver.scan(&ScanPlan::default());
        assert_eq!(report.attached, vec![0x2b, 0x4e]);
        assert_eq!(report.failures.len(), 7);
        assert_eq!(report.errors().count(), 0);

        let again = driver.scan(&ScanPlan::default());
        assert!(again.attached.is_empty());
        assert_eq!(again.skipped, vec![0x2b, 0x4e]);
    }

    #[test]
    fn test_detach_all() {
        let bus = Arc::new(SimBus::new());
        bus.add_chip(0x18, SimChip::lm83());
        bus.add_chip(0x4d, SimChip::lm83());
        let (driver, _attributes) = driver_with(bus.clone());

        driver.scan(&ScanPlan::default());
        assert_eq!(driver.chips().len(), 2);
        driver.detach_all();
        assert!(driver.chips().is_empty());
        assert!(!bus.is_attached(0x18));
        assert!(!bus.is_attached(0x4d));
    }
}
