//! Discovery and identification of devices behind one of the switch's gateway ports.
//!
//! For every candidate address the [`Scanner`] first probes with a one register read
//! to learn whether anything answers, then asks for the device's identification
//! conformity and walks all identification objects that level gives access to.
//!
//! Nothing that happens at one address stops the scan. Every address ends up with a
//! [`ScanOutcome`]; only failing to open the session in the first place is fatal, and
//! that happens before a `Scanner` exists.

use std::{
    collections::BTreeMap,
    ops::RangeInclusive,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info, warn};

use crate::{
    error::TransportError,
    ident::{ConformityLevel, DeviceIdResponse, ObjectValue, ReadCode},
    transport::{Bus, ExceptionCode, ExceptionReason, UnitId},
};

/// Upper bound on requests spent walking one object range of a streaming device.
///
/// A range holds at most 128 objects, so a well behaved device never gets near it.
pub const DEFAULT_MAX_STEPS: usize = 256;

/// Register read used to find out whether anything answers at an address.
const PROBE_REGISTER: u16 = 1;

/// What was found at one address.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The gateway got no reply from this address.
    Absent,
    /// The gateway cannot route to this address.
    Unreachable,
    /// The exchange failed below the Modbus layer.
    Failed(TransportError),
    /// A device answered, but refused to identify itself.
    IdentificationUnsupported(ExceptionCode),
    /// A device answered with a conformity level outside 1-3.
    UnsupportedConformity(u8),
    Identified(Identification),
}

/// Identification objects collected from one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub level: ConformityLevel,
    pub streaming: bool,
    pub objects: BTreeMap<u8, ObjectValue>,
    /// Categories whose walk was cut short; `objects` holds what was read before that.
    pub incomplete: Vec<ReadCode>,
}

#[derive(Debug)]
pub struct ScanReport {
    pub address: UnitId,
    pub outcome: ScanOutcome,
}

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Completed,
    Cancelled,
}

/// Position of a streaming walk through one object range.
#[derive(Debug)]
struct StreamCursor {
    range: RangeInclusive<u8>,
    next: Option<u8>,
    steps: usize,
}

impl StreamCursor {
    fn new(range: RangeInclusive<u8>) -> Self {
        Self {
            next: Some(*range.start()),
            range,
            steps: 0,
        }
    }

    /// The object id to request next, or `None` once the range is exhausted.
    fn current(&self) -> Option<u8> {
        self.next
    }

    /// Follow the continuation of `reply`.
    fn advance(&mut self, reply: &DeviceIdResponse) {
        self.steps += 1;
        let Some(current) = self.next else { return };
        self.next = if !reply.more_follows {
            None
        } else if reply.next_object_id <= current {
            warn!(
                "Continuation cursor did not advance ({current:#04x} -> {:#04x}), stopping",
                reply.next_object_id
            );
            None
        } else if !self.range.contains(&reply.next_object_id) {
            None
        } else {
            Some(reply.next_object_id)
        };
    }
}

/// Walks a range of device addresses over one gateway session.
pub struct Scanner<B: Bus> {
    bus: B,
    max_steps: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl<B: Bus> Scanner<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            max_steps: DEFAULT_MAX_STEPS,
            cancel: None,
        }
    }

    /// Limit the requests spent on one object range of a streaming device.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Stop before the next address once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Scan `addresses` in order and collect the reports.
    pub fn scan(&mut self, addresses: impl IntoIterator<Item = UnitId>) -> Vec<ScanReport> {
        let mut reports = Vec::new();
        self.scan_with(addresses, |report| reports.push(report));
        reports
    }

    /// Scan `addresses` in order, handing each report to `on_report` as soon as it is ready.
    pub fn scan_with(
        &mut self,
        addresses: impl IntoIterator<Item = UnitId>,
        mut on_report: impl FnMut(ScanReport),
    ) -> ScanStatus {
        for address in addresses {
            if self.cancelled() {
                info!("Scan cancelled before address {address}");
                return ScanStatus::Cancelled;
            }
            let outcome = self.scan_address(address);
            on_report(ScanReport { address, outcome });
        }
        ScanStatus::Completed
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Probe and identify the device at `address`.
    pub fn scan_address(&mut self, address: UnitId) -> ScanOutcome {
        match self.bus.read_holding_registers(address, PROBE_REGISTER, 1) {
            Ok(Err(code)) if code.reason() == Some(ExceptionReason::GatewayNoResponse) => {
                debug!("{address}: absent");
                return ScanOutcome::Absent;
            }
            Ok(Err(code)) if code.reason() == Some(ExceptionReason::GatewayPathUnavailable) => {
                debug!("{address}: unreachable");
                return ScanOutcome::Unreachable;
            }
            Ok(Err(code)) => debug!("{address}: present, probe answered with {code}"),
            Ok(Ok(_)) => debug!("{address}: present"),
            Err(err) => {
                warn!("{address}: probe failed: {err}");
                return ScanOutcome::Failed(err);
            }
        }

        let reply = match self.bus.read_device_identification(address, ReadCode::Basic, 0) {
            Ok(Ok(reply)) => reply,
            Ok(Err(code)) => {
                info!("{address}: identification not supported ({code})");
                return ScanOutcome::IdentificationUnsupported(code);
            }
            Err(err) => {
                warn!("{address}: identification request failed: {err}");
                return ScanOutcome::Failed(err);
            }
        };

        let streaming = reply.conformity.streaming();
        let level = match ConformityLevel::try_from(reply.conformity) {
            Ok(level) => level,
            Err(raw) => {
                warn!("{address}: unsupported conformity level {raw}");
                return ScanOutcome::UnsupportedConformity(raw);
            }
        };
        info!(
            "{address}: {level} identification{}",
            if streaming { ", streaming" } else { "" }
        );

        let mut identification = Identification {
            level,
            streaming,
            objects: BTreeMap::new(),
            incomplete: Vec::new(),
        };
        for (read_code, range) in level.ranges() {
            let complete = if streaming {
                self.walk_stream(address, read_code, range, &mut identification.objects)
            } else {
                self.walk_individual(address, range, &mut identification.objects);
                true
            };
            if !complete {
                identification.incomplete.push(read_code);
            }
        }
        ScanOutcome::Identified(identification)
    }

    /// Follow the continuation cursor through `range` with the stream access `read_code`
    /// (basic, regular or extended) of that range. Returns whether the range was exhausted.
    fn walk_stream(
        &mut self,
        address: UnitId,
        read_code: ReadCode,
        range: RangeInclusive<u8>,
        objects: &mut BTreeMap<u8, ObjectValue>,
    ) -> bool {
        let mut cursor = StreamCursor::new(range);
        while let Some(object_id) = cursor.current() {
            if cursor.steps >= self.max_steps {
                warn!("{address}: {read_code} objects still not exhausted after {} requests", cursor.steps);
                return false;
            }
            let reply = match self.bus.read_device_identification(address, read_code, object_id) {
                Ok(Ok(reply)) => reply,
                Ok(Err(code)) => {
                    warn!("{address}: reading {read_code} objects from {object_id:#04x} failed: {code}");
                    return false;
                }
                Err(err) => {
                    warn!("{address}: reading {read_code} objects from {object_id:#04x} failed: {err}");
                    return false;
                }
            };
            record(objects, &reply);
            cursor.advance(&reply);
        }
        true
    }

    /// Read every id of `range` on its own, skipping the ones that fail.
    fn walk_individual(
        &mut self,
        address: UnitId,
        range: RangeInclusive<u8>,
        objects: &mut BTreeMap<u8, ObjectValue>,
    ) {
        for object_id in range {
            match self
                .bus
                .read_device_identification(address, ReadCode::Individual, object_id)
            {
                Ok(Ok(reply)) => record(objects, &reply),
                Ok(Err(code)) => debug!("{address}: object {object_id:#04x}: {code}"),
                Err(err) => debug!("{address}: object {object_id:#04x}: {err}"),
            }
        }
    }
}

/// Keep every object of `reply` not seen before.
fn record(objects: &mut BTreeMap<u8, ObjectValue>, reply: &DeviceIdResponse) {
    for object in &reply.objects {
        objects
            .entry(object.id)
            .or_insert_with(|| ObjectValue::from(object.value.clone()));
    }
}
