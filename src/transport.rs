//! The request/response boundary between this crate and the Modbus/TCP client.
//!
//! Everything above this module talks to a [`Bus`]. The production implementation,
//! [`TcpBus`], is a thin wrapper around the synchronous `tokio-modbus` TCP client;
//! tests use an in-memory double instead.

use std::{borrow::Cow, fmt, net::SocketAddr, time::Duration};

use log::debug;
use strum_macros::{Display, FromRepr, IntoStaticStr};
use tokio_modbus::{
    ExceptionResponse, FunctionCode, ProtocolError,
    client::sync::{self, Client as _, Reader as _, Writer as _},
    prelude::{Request, Response, Slave, SlaveContext},
};

use crate::{
    error::TransportError,
    ident::{DeviceIdResponse, ReadCode},
};

/// A Modbus unit identifier: a switch port (1-8) or a device address behind a gateway (1-247).
pub type UnitId = u8;

/// Outcome of one exchange.
///
/// The outer layer is the transport: either the request reached the far end and a
/// reply came back, or it didn't. The inner layer is the reply itself: a payload or
/// a Modbus exception.
pub type BusResult<T> = core::result::Result<core::result::Result<T, ExceptionCode>, TransportError>;

/// Function code of "Encapsulated Interface Transport".
const FUNCTION_MEI: u8 = 0x2B;
/// MEI type of "Read Device Identification".
pub(crate) const MEI_READ_DEVICE_ID: u8 = 0x0E;

/// The standard Modbus exception reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr, FromRepr)]
#[repr(u8)]
pub enum ExceptionReason {
    #[strum(to_string = "Illegal function")]
    IllegalFunction = 0x01,
    #[strum(to_string = "Illegal data address")]
    IllegalDataAddress = 0x02,
    #[strum(to_string = "Illegal data value")]
    IllegalDataValue = 0x03,
    #[strum(to_string = "Slave device failure")]
    SlaveDeviceFailure = 0x04,
    #[strum(to_string = "Acknowledge")]
    Acknowledge = 0x05,
    #[strum(to_string = "Slave device busy")]
    SlaveDeviceBusy = 0x06,
    #[strum(to_string = "Memory parity error")]
    MemoryParityError = 0x08,
    #[strum(to_string = "Gateway path unavailable")]
    GatewayPathUnavailable = 0x0A,
    #[strum(to_string = "Gateway target device failed to respond")]
    GatewayNoResponse = 0x0B,
}

/// A raw exception code as returned by a unit.
///
/// Codes outside the standard table are kept rather than rejected, so that
/// they can still be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionCode(u8);

impl ExceptionCode {
    pub const GATEWAY_PATH_UNAVAILABLE: Self = Self(ExceptionReason::GatewayPathUnavailable as u8);
    pub const GATEWAY_NO_RESPONSE: Self = Self(ExceptionReason::GatewayNoResponse as u8);

    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    /// The standard reason behind this code, if it is one of the standard codes.
    pub fn reason(self) -> Option<ExceptionReason> {
        ExceptionReason::from_repr(self.0)
    }
}

impl From<ExceptionReason> for ExceptionCode {
    fn from(reason: ExceptionReason) -> Self {
        Self(reason as u8)
    }
}

impl From<tokio_modbus::ExceptionCode> for ExceptionCode {
    fn from(code: tokio_modbus::ExceptionCode) -> Self {
        Self(u8::from(code))
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{reason}"),
            None => write!(f, "Unknown exception 0x{:02x}", self.0),
        }
    }
}

/// A request/response channel to one Modbus/TCP endpoint.
///
/// Every call is one blocking exchange addressed to `unit`. Implementations must
/// not retry; that is left to whatever sits below them.
pub trait Bus {
    fn read_holding_registers(&mut self, unit: UnitId, addr: u16, count: u16) -> BusResult<Vec<u16>>;

    fn read_input_registers(&mut self, unit: UnitId, addr: u16, count: u16) -> BusResult<Vec<u16>>;

    fn write_single_register(&mut self, unit: UnitId, addr: u16, value: u16) -> BusResult<()>;

    fn write_multiple_registers(&mut self, unit: UnitId, addr: u16, values: &[u16]) -> BusResult<()>;

    fn read_device_identification(
        &mut self,
        unit: UnitId,
        read_code: ReadCode,
        object_id: u8,
    ) -> BusResult<DeviceIdResponse>;
}

impl<B: Bus + ?Sized> Bus for &mut B {
    fn read_holding_registers(&mut self, unit: UnitId, addr: u16, count: u16) -> BusResult<Vec<u16>> {
        (**self).read_holding_registers(unit, addr, count)
    }

    fn read_input_registers(&mut self, unit: UnitId, addr: u16, count: u16) -> BusResult<Vec<u16>> {
        (**self).read_input_registers(unit, addr, count)
    }

    fn write_single_register(&mut self, unit: UnitId, addr: u16, value: u16) -> BusResult<()> {
        (**self).write_single_register(unit, addr, value)
    }

    fn write_multiple_registers(&mut self, unit: UnitId, addr: u16, values: &[u16]) -> BusResult<()> {
        (**self).write_multiple_registers(unit, addr, values)
    }

    fn read_device_identification(
        &mut self,
        unit: UnitId,
        read_code: ReadCode,
        object_id: u8,
    ) -> BusResult<DeviceIdResponse> {
        (**self).read_device_identification(unit, read_code, object_id)
    }
}

/// A [`Bus`] backed by a synchronous `tokio-modbus` TCP connection.
pub struct TcpBus {
    ctx: sync::Context,
    peer: SocketAddr,
}

impl TcpBus {
    /// Open a session to `peer`, using `timeout` for the connection and for every request.
    pub fn connect(peer: SocketAddr, timeout: Duration) -> Result<Self, TransportError> {
        debug!("Connecting to {peer} (timeout {timeout:?})");
        let ctx = sync::tcp::connect_slave_with_timeout(peer, Slave(0), Some(timeout))?;
        Ok(Self { ctx, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

fn lift<T>(result: tokio_modbus::Result<T>) -> BusResult<T> {
    match result {
        Ok(Ok(value)) => Ok(Ok(value)),
        Ok(Err(code)) => Ok(Err(code.into())),
        Err(err) => Err(err.into()),
    }
}

impl Bus for TcpBus {
    fn read_holding_registers(&mut self, unit: UnitId, addr: u16, count: u16) -> BusResult<Vec<u16>> {
        debug!("{}: unit {unit} read holding {addr:#06x} x{count}", self.peer);
        self.ctx.set_slave(Slave(unit));
        lift(self.ctx.read_holding_registers(addr, count))
    }

    fn read_input_registers(&mut self, unit: UnitId, addr: u16, count: u16) -> BusResult<Vec<u16>> {
        debug!("{}: unit {unit} read input {addr:#06x} x{count}", self.peer);
        self.ctx.set_slave(Slave(unit));
        lift(self.ctx.read_input_registers(addr, count))
    }

    fn write_single_register(&mut self, unit: UnitId, addr: u16, value: u16) -> BusResult<()> {
        debug!("{}: unit {unit} write {addr:#06x} = {value:#06x}", self.peer);
        self.ctx.set_slave(Slave(unit));
        lift(self.ctx.write_single_register(addr, value))
    }

    fn write_multiple_registers(&mut self, unit: UnitId, addr: u16, values: &[u16]) -> BusResult<()> {
        debug!("{}: unit {unit} write {addr:#06x} = {values:04x?}", self.peer);
        self.ctx.set_slave(Slave(unit));
        lift(self.ctx.write_multiple_registers(addr, values))
    }

    fn read_device_identification(
        &mut self,
        unit: UnitId,
        read_code: ReadCode,
        object_id: u8,
    ) -> BusResult<DeviceIdResponse> {
        debug!(
            "{}: unit {unit} read device id {read_code} object {object_id:#04x}",
            self.peer
        );
        self.ctx.set_slave(Slave(unit));
        let request = Request::Custom(
            FUNCTION_MEI,
            Cow::Owned(vec![MEI_READ_DEVICE_ID, read_code as u8, object_id]),
        );
        let result = match self.ctx.call(request) {
            // The client decodes an exception reply as function 0x2B, which never matches
            // the custom request it sent.
            Err(tokio_modbus::Error::Protocol(ProtocolError::FunctionCodeMismatch {
                result:
                    Err(ExceptionResponse {
                        function: FunctionCode::EncapsulatedInterfaceTransport,
                        exception,
                    }),
                ..
            })) => return Ok(Err(exception.into())),
            result => lift(result)?,
        };
        match result {
            Ok(Response::Custom(_, payload)) => Ok(Ok(DeviceIdResponse::decode(&payload)?)),
            Ok(_) => Err(TransportError::InvalidResponse("unexpected response function")),
            Err(code) => Ok(Err(code)),
        }
    }
}
