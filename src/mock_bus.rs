//! We use this mocking module in unit tests to emulate the switch and the devices behind it.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::TransportError,
    ident::{Conformity, DeviceIdObject, DeviceIdResponse, ReadCode},
    register::{HoldingRegister, RESET_COUNTERS_MAGIC, TELEMETRY_BLOCK_LEN},
    transport::{Bus, BusResult, ExceptionCode, ExceptionReason, UnitId},
};

const PORTS: u8 = 8;

/// Every request the mock has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRequest {
    ReadHolding { unit: UnitId, addr: u16, count: u16 },
    ReadInput { unit: UnitId, addr: u16, count: u16 },
    WriteSingle { unit: UnitId, addr: u16, value: u16 },
    WriteMultiple { unit: UnitId, addr: u16, values: Vec<u16> },
    ReadDeviceId { unit: UnitId, read_code: ReadCode, object_id: u8 },
}

/// Register bank of one switch port.
#[derive(Debug, Clone)]
pub struct MockPort {
    /// Holding registers 1-8.
    pub holding: [u16; 8],
    /// Input registers 1-17.
    pub input: [u16; TELEMETRY_BLOCK_LEN as usize],
}

impl Default for MockPort {
    fn default() -> Self {
        Self {
            // 115200 baud, no parity, powered, 100 ms, "        ".
            holding: [1152, 0, 1, 100, 0x2020, 0x2020, 0x2020, 0x2020],
            input: [0; TELEMETRY_BLOCK_LEN as usize],
        }
    }
}

/// A device on a gateway-relayed sub-bus.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    /// Exception returned by the register probe, if any.
    pub probe_exception: Option<ExceptionCode>,
    /// Replies to identification requests, keyed by read code and object id.
    /// Anything not listed answers with "illegal data address".
    pub replies: BTreeMap<(ReadCode, u8), Result<DeviceIdResponse, ExceptionCode>>,
}

impl MockDevice {
    /// A device whose identification requests are all refused with `code`.
    pub fn without_identification(code: ExceptionCode) -> Self {
        let mut device = Self::default();
        device.replies.insert((ReadCode::Basic, 0), Err(code));
        device
    }

    /// A device declaring `conformity`, answering the initial basic request.
    pub fn with_conformity(conformity: u8) -> Self {
        let mut device = Self::default();
        device.replies.insert(
            (ReadCode::Basic, 0),
            Ok(reply(ReadCode::Basic, conformity, None, &[(0, b"Vendor")])),
        );
        device
    }

    pub fn reply(mut self, read_code: ReadCode, object_id: u8, response: DeviceIdResponse) -> Self {
        self.replies.insert((read_code, object_id), Ok(response));
        self
    }

    pub fn refuse(mut self, read_code: ReadCode, object_id: u8, code: ExceptionCode) -> Self {
        self.replies.insert((read_code, object_id), Err(code));
        self
    }
}

/// Build a reply carrying `objects`; `next` set means "more follows, continue at `next`".
pub fn reply(read_code: ReadCode, conformity: u8, next: Option<u8>, objects: &[(u8, &[u8])]) -> DeviceIdResponse {
    DeviceIdResponse {
        read_code: read_code as u8,
        conformity: Conformity::from_byte(conformity),
        more_follows: next.is_some(),
        next_object_id: next.unwrap_or(0),
        objects: objects
            .iter()
            .map(|(id, value)| DeviceIdObject { id: *id, value: value.to_vec() })
            .collect(),
    }
}

/// Our mock type used to emulate the management bus or a gateway port.
#[derive(Debug, Default)]
pub struct MockBus {
    pub ports: BTreeMap<UnitId, MockPort>,
    pub devices: BTreeMap<UnitId, MockDevice>,
    /// Addresses the gateway cannot route to.
    pub unreachable: BTreeSet<UnitId>,
    /// Holding register writes to refuse, with the exception to answer.
    pub refuse_writes: BTreeMap<u16, ExceptionCode>,
    /// Units whose requests fail below the Modbus layer.
    pub dead_units: BTreeSet<UnitId>,
    /// Answer like a gateway port rather than the management bus.
    pub gateway: bool,
    pub requests: Vec<MockRequest>,
}

impl MockBus {
    /// A switch with all eight ports at their defaults.
    pub fn switch() -> Self {
        Self {
            ports: (1..=PORTS).map(|port| (port, MockPort::default())).collect(),
            ..Default::default()
        }
    }

    /// A gateway port with nothing attached yet.
    pub fn gateway() -> Self {
        Self {
            gateway: true,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, address: UnitId, device: MockDevice) -> Self {
        self.devices.insert(address, device);
        self
    }

    pub fn port(&self, unit: UnitId) -> &MockPort {
        &self.ports[&unit]
    }

    pub fn port_mut(&mut self, unit: UnitId) -> &mut MockPort {
        self.ports.get_mut(&unit).unwrap()
    }

    /// Identification requests seen for `unit`.
    pub fn id_requests(&self, unit: UnitId) -> Vec<(ReadCode, u8)> {
        self.requests
            .iter()
            .filter_map(|request| match request {
                MockRequest::ReadDeviceId { unit: u, read_code, object_id } if *u == unit => {
                    Some((*read_code, *object_id))
                }
                _ => None,
            })
            .collect()
    }

    fn check_unit(&self, unit: UnitId) -> Result<(), TransportError> {
        if self.dead_units.contains(&unit) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "simulated timeout",
            )));
        }
        Ok(())
    }

    /// Route a request the way the switch daemon does.
    fn route(&self, unit: UnitId) -> Result<(), ExceptionCode> {
        if self.unreachable.contains(&unit) {
            return Err(ExceptionReason::GatewayPathUnavailable.into());
        }
        if self.ports.contains_key(&unit) || self.devices.contains_key(&unit) {
            Ok(())
        } else if self.gateway {
            Err(ExceptionReason::GatewayNoResponse.into())
        } else {
            Err(ExceptionReason::GatewayPathUnavailable.into())
        }
    }

    fn block(regs: &[u16], addr: u16, count: u16) -> Result<Vec<u16>, ExceptionCode> {
        let start = usize::from(addr).checked_sub(1);
        let end = start.map(|start| start + usize::from(count));
        match (start, end) {
            (Some(start), Some(end)) if end <= regs.len() => Ok(regs[start..end].to_vec()),
            _ => Err(ExceptionReason::IllegalDataAddress.into()),
        }
    }

    /// Validate a holding register write like the firmware does.
    fn store(port: &mut MockPort, addr: u16, value: u16) -> Result<(), ExceptionCode> {
        let valid = match addr {
            1 => (12..=1152).contains(&value),
            2 => value <= 2,
            3 => value <= 1,
            4 | 5..=8 => true,
            _ => return Err(ExceptionReason::IllegalDataAddress.into()),
        };
        if !valid {
            return Err(ExceptionReason::SlaveDeviceFailure.into());
        }
        port.holding[usize::from(addr) - 1] = value;
        Ok(())
    }
}

impl Bus for MockBus {
    fn read_holding_registers(&mut self, unit: UnitId, addr: u16, count: u16) -> BusResult<Vec<u16>> {
        self.requests.push(MockRequest::ReadHolding { unit, addr, count });
        self.check_unit(unit)?;
        if let Err(code) = self.route(unit) {
            return Ok(Err(code));
        }
        if let Some(device) = self.devices.get(&unit) {
            return Ok(match device.probe_exception {
                Some(code) => Err(code),
                None => Ok(vec![0; usize::from(count)]),
            });
        }
        Ok(Self::block(&self.port(unit).holding, addr, count))
    }

    fn read_input_registers(&mut self, unit: UnitId, addr: u16, count: u16) -> BusResult<Vec<u16>> {
        self.requests.push(MockRequest::ReadInput { unit, addr, count });
        self.check_unit(unit)?;
        if let Err(code) = self.route(unit) {
            return Ok(Err(code));
        }
        Ok(Self::block(&self.port(unit).input, addr, count))
    }

    fn write_single_register(&mut self, unit: UnitId, addr: u16, value: u16) -> BusResult<()> {
        self.requests.push(MockRequest::WriteSingle { unit, addr, value });
        self.check_unit(unit)?;
        if let Err(code) = self.route(unit) {
            return Ok(Err(code));
        }
        if let Some(code) = self.refuse_writes.get(&addr) {
            return Ok(Err(*code));
        }
        let port = self.port_mut(unit);
        if addr == HoldingRegister::ResetCounters as u16 {
            return Ok(if value == RESET_COUNTERS_MAGIC {
                port.input[1..].fill(0);
                Ok(())
            } else {
                Err(ExceptionReason::IllegalDataValue.into())
            });
        }
        Ok(Self::store(port, addr, value))
    }

    fn write_multiple_registers(&mut self, unit: UnitId, addr: u16, values: &[u16]) -> BusResult<()> {
        self.requests.push(MockRequest::WriteMultiple {
            unit,
            addr,
            values: values.to_vec(),
        });
        self.check_unit(unit)?;
        if let Err(code) = self.route(unit) {
            return Ok(Err(code));
        }
        if let Some(code) = self.refuse_writes.get(&addr) {
            return Ok(Err(*code));
        }
        let port = self.port_mut(unit);
        for (offset, value) in values.iter().enumerate() {
            if let Err(code) = Self::store(port, addr + offset as u16, *value) {
                return Ok(Err(code));
            }
        }
        Ok(Ok(()))
    }

    fn read_device_identification(
        &mut self,
        unit: UnitId,
        read_code: ReadCode,
        object_id: u8,
    ) -> BusResult<DeviceIdResponse> {
        self.requests.push(MockRequest::ReadDeviceId {
            unit,
            read_code,
            object_id,
        });
        self.check_unit(unit)?;
        if let Err(code) = self.route(unit) {
            return Ok(Err(code));
        }
        let Some(device) = self.devices.get(&unit) else {
            return Ok(Err(ExceptionReason::IllegalFunction.into()));
        };
        Ok(device
            .replies
            .get(&(read_code, object_id))
            .cloned()
            .unwrap_or(Err(ExceptionReason::IllegalDataAddress.into())))
    }
}
