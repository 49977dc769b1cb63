//! Conversions between raw register values and typed port settings.
//!
//! Every function here is pure. Decoders are total, encoders validate their input
//! against the same bounds the switch firmware enforces.

use core::str::FromStr;

use fugit::MillisDurationU32;

use crate::{
    error::{Error, Result},
    register::DESCRIPTION_LEN,
    types::{Description, Parity, ParityCode, State},
};

pub const BAUD_MIN: u32 = 1200;
pub const BAUD_MAX: u32 = 115_200;
/// The baud register holds the rate in units of this many bits/s.
const BAUD_SCALE: u32 = 100;

const DESCRIPTION_CHARS: usize = 2 * DESCRIPTION_LEN as usize;

/// Convert a baud register value to bits/s.
#[inline]
pub const fn decode_baud(raw: u16) -> u32 {
    raw as u32 * BAUD_SCALE
}

/// Convert bits/s to the baud register value.
pub fn encode_baud(bps: u32) -> Result<u16> {
    if !(BAUD_MIN..=BAUD_MAX).contains(&bps) || bps % BAUD_SCALE != 0 {
        return Err(Error::OutOfRange { what: "baud rate", value: bps });
    }
    Ok((bps / BAUD_SCALE) as u16)
}

pub fn decode_parity(raw: u16) -> ParityCode {
    match Parity::from_repr(raw) {
        Some(parity) => ParityCode::Known(parity),
        None => ParityCode::Unknown(raw),
    }
}

/// Convert a parity name (`none`, `odd`, `even`) to its register value.
pub fn encode_parity(name: &str) -> Result<u16> {
    Parity::from_str(name)
        .map(u16::from)
        .map_err(|_| Error::InvalidParity(name.to_owned()))
}

#[inline]
pub fn decode_power(raw: u16) -> State {
    State::from(raw > 0)
}

/// Only `0` and `1` are accepted; anything else is most likely a typo.
pub fn encode_power(requested: u16) -> Result<u16> {
    State::from_repr(requested)
        .map(|state| state as u16)
        .ok_or(Error::InvalidPower(requested))
}

#[inline]
pub const fn decode_timeout(raw: u16) -> MillisDurationU32 {
    MillisDurationU32::millis(raw as u32)
}

pub fn encode_timeout(ms: u32) -> Result<u16> {
    match u16::try_from(ms) {
        Ok(raw) if raw > 0 => Ok(raw),
        _ => Err(Error::OutOfRange { what: "timeout", value: ms }),
    }
}

/// Unpack the four description registers, high byte first, dropping trailing padding.
pub fn decode_description(regs: &[u16; DESCRIPTION_LEN as usize]) -> Description {
    let mut text: heapless::String<DESCRIPTION_CHARS> = heapless::String::new();
    for byte in regs.iter().flat_map(|reg| reg.to_be_bytes()) {
        // Eight 7-bit characters always fit.
        let _ = text.push(char::from(byte & 0x7F));
    }
    let trimmed = text.trim_end_matches(' ').len();
    text.truncate(trimmed);
    Description(text)
}

/// Pad `text` with spaces to eight characters and pack it, high byte first.
///
/// Only printable ASCII is accepted.
pub fn encode_description(text: &str) -> Result<[u16; DESCRIPTION_LEN as usize]> {
    if !text.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(Error::NonAscii);
    }
    if text.len() > DESCRIPTION_CHARS {
        return Err(Error::TooLong(text.len()));
    }

    let mut bytes = [b' '; DESCRIPTION_CHARS];
    bytes[..text.len()].copy_from_slice(text.as_bytes());

    let mut regs = [0u16; DESCRIPTION_LEN as usize];
    for (reg, pair) in regs.iter_mut().zip(bytes.chunks_exact(2)) {
        *reg = u16::from_be_bytes([pair[0], pair[1]]);
    }
    Ok(regs)
}

/// Join a 32-bit counter stored low register first.
#[inline]
pub const fn decode_counter32(lo: u16, hi: u16) -> u32 {
    ((hi as u32) << 16) | lo as u32
}
