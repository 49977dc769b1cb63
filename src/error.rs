//! Our error types for the switch management bus.

use thiserror::Error;

use crate::{changes::ConfigField, transport::ExceptionCode};

pub type Result<T> = core::result::Result<T, Error>;

/// Failure of a single exchange that never produced a Modbus reply.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Modbus transport error: {0}")]
    Modbus(#[from] tokio_modbus::Error),
    #[error("Invalid response received: {0}")]
    InvalidResponse(&'static str),
}

/// Custom error type for switch management and scanning.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid port specification: {0}")]
    InvalidPortSpec(String),
    #[error("{what} out of range: {value}")]
    OutOfRange { what: &'static str, value: u32 },
    #[error("Invalid parity {0:?}, expected none, odd or even")]
    InvalidParity(String),
    #[error("Invalid power setting {0}, expected 0 or 1")]
    InvalidPower(u16),
    #[error("Description too long: {0} characters, at most 8 allowed")]
    TooLong(usize),
    #[error("Description must be printable ASCII")]
    NonAscii,
    #[error("Management bus error: {code}")]
    ManagementBus { code: ExceptionCode },
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A configuration write stopped at `field`; everything in `applied` already took effect.
    #[error("Setting {field} failed (already applied: {applied:?}): {source}")]
    PartialWrite {
        field: ConfigField,
        applied: Vec<ConfigField>,
        #[source]
        source: Box<Error>,
    },
}

impl From<ExceptionCode> for Error {
    fn from(code: ExceptionCode) -> Self {
        Error::ManagementBus { code }
    }
}
