//! This module contains the typed values held in the switch registers.

use core::fmt;

use fugit::MillisDurationU32;
use strum_macros::{Display, EnumIter, EnumString, FromRepr, IntoStaticStr};

/// Parity setting of a serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[repr(u16)]
pub enum Parity {
    None = 0,
    Odd = 1,
    Even = 2,
}

impl From<Parity> for u16 {
    fn from(value: Parity) -> Self {
        value as u16
    }
}

/// A parity register as read back from the switch.
///
/// Telemetry must still display when the switch reports a code we don't know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParityCode {
    Known(Parity),
    Unknown(u16),
}

impl fmt::Display for ParityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParityCode::Known(parity) => write!(f, "{parity}"),
            ParityCode::Unknown(_) => f.write_str("???"),
        }
    }
}

/// Used to be less ambiguous about whether something is on or off.
#[repr(u16)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, FromRepr)]
#[strum(serialize_all = "lowercase")]
pub enum State {
    /// Disabled.
    #[default]
    Off = 0x00,
    /// Enabled.
    On = 0x01,
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        match value {
            State::Off => false,
            State::On => true,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

/// Port description: up to 8 ASCII characters, trailing spaces stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description(pub(crate) heapless::String<8>);

impl Description {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration of one serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    /// Bits per second.
    pub baud: u32,
    pub parity: ParityCode,
    pub power: State,
    /// How long the switch waits for a device to reply.
    pub timeout: MillisDurationU32,
    pub description: Description,
}

/// Cumulative counters of one serial port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortCounters {
    pub current_sense: bool,
    pub broadcasts: u32,
    pub unicasts: u32,
    pub frame_errors: u32,
    pub oversize_errors: u32,
    pub undersize_errors: u32,
    pub crc_errors: u32,
    pub mismatch_errors: u32,
    pub timeouts: u32,
}

/// Configuration snapshot and counters of one serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTelemetry {
    pub config: PortConfig,
    pub counters: PortCounters,
}
