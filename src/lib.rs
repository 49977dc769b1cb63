//! This crate provides an interface for managing a USB-to-8-port RS-485 switch over Modbus/TCP.
//!
//! The switch exposes two kinds of endpoint:
//! * A management bus, on which each serial port is a Modbus unit (ids 1-8) with a small
//!   register bank holding its line settings, a description and traffic counters.
//! * One gateway per serial port, which relays requests to whatever devices sit on
//!   that port's RS-485 bus.
//!
//! [`Switch`] reads and writes port configuration and counters over the management bus.
//! [`Scanner`] walks a range of device addresses through a gateway and collects each
//! device's Read Device Identification objects.
//!
//! Both work over any [`Bus`]; [`TcpBus`] is the Modbus/TCP implementation.
//!
//! The default endpoint layout is:
//! * Management bus: TCP port 4300
//! * Gateway for serial port N: TCP port 4300 + N

pub mod changes;
pub mod codec;
pub mod config;
pub mod error;
pub mod ident;
pub mod ports;
pub mod register;
pub mod scan;
pub mod switch;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_bus;

pub use changes::{ConfigField, PortChanges, PortChangesBuilder};
pub use config::BusConfig;
pub use error::{Error, Result, TransportError};
pub use ident::{ConformityLevel, ObjectValue, ReadCode};
pub use scan::{Identification, ScanOutcome, ScanReport, ScanStatus, Scanner};
pub use switch::Switch;
pub use transport::{Bus, ExceptionCode, ExceptionReason, TcpBus, UnitId};
pub use types::{Parity, ParityCode, PortConfig, PortCounters, PortTelemetry, State};
