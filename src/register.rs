//! This module is used to define the registers of each switch port.
//!
//! Every serial port of the switch answers on the management bus as its own unit,
//! using its port number as the unit identifier. All units share the layout below.

/// Holding registers of a port.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum HoldingRegister {
    /// __R/W__ - Baud rate.
    ///
    /// Value is the rate in units of 100 bits/s. E.g. 9600 => `96`.
    /// The switch accepts `12` - `1152`.
    Baud = 0x01,
    /// __R/W__ - Parity.
    /// * `0` - None.
    /// * `1` - Odd.
    /// * `2` - Even.
    Parity = 0x02,
    /// __R/W__ - Port power.
    /// * `0` - Off.
    /// * `1` - On.
    Power = 0x03,
    /// __R/W__ - Reply timeout in milliseconds.
    Timeout = 0x04,
    /// __R/W__ - First of four description registers.
    ///
    /// Two ASCII characters per register, high byte first.
    Description = 0x05,
    /// __W__ - Write [`RESET_COUNTERS_MAGIC`] here to zero all telemetry counters.
    ResetCounters = 0x1000,
}

impl From<HoldingRegister> for u16 {
    fn from(value: HoldingRegister) -> Self {
        value as u16
    }
}

/// Number of holding registers covering the whole configuration (baud through description).
pub const CONFIG_BLOCK_LEN: u16 = 8;

/// Number of registers holding the description.
pub const DESCRIPTION_LEN: u16 = 4;

pub const RESET_COUNTERS_MAGIC: u16 = 0xDEAD;

/// Input registers of a port.
///
/// The counters are 32 bits wide and span two registers, __low half first__.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum InputRegister {
    /// __R__ - Current sense flag.
    CurrentSense = 0x01,
    /// __R__ - Broadcast frames relayed OK.
    BroadcastsLow = 0x02,
    /// __R__ - Unicast frames relayed OK.
    UnicastsLow = 0x04,
    /// __R__ - Framing errors.
    FrameErrorsLow = 0x06,
    /// __R__ - Oversized frames.
    OversizeLow = 0x08,
    /// __R__ - Undersized frames.
    UndersizeLow = 0x0A,
    /// __R__ - Frames with bad CRC.
    CrcErrorsLow = 0x0C,
    /// __R__ - Replies not matching the request.
    MismatchLow = 0x0E,
    /// __R__ - Requests that timed out.
    TimeoutsLow = 0x10,
}

impl From<InputRegister> for u16 {
    fn from(value: InputRegister) -> Self {
        value as u16
    }
}

impl InputRegister {
    /// Index of this register within a block read from [`InputRegister::CurrentSense`].
    pub const fn offset(self) -> usize {
        (self as u16 - InputRegister::CurrentSense as u16) as usize
    }
}

/// Number of input registers covering all telemetry.
pub const TELEMETRY_BLOCK_LEN: u16 = 17;
