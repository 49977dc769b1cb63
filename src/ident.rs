//! Read Device Identification (function 0x2B, MEI type 0x0E) data model.

use std::ops::RangeInclusive;

use modular_bitfield::prelude::*;
use strum_macros::{Display, EnumIter, FromRepr};

use crate::{error::TransportError, transport::MEI_READ_DEVICE_ID};

/// Which objects a Read Device Identification request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumIter, FromRepr)]
#[repr(u8)]
pub enum ReadCode {
    /// Stream access to the basic objects (0x00-0x02).
    #[strum(to_string = "basic")]
    Basic = 0x01,
    /// Stream access to the regular objects (0x03-0x06).
    #[strum(to_string = "regular")]
    Regular = 0x02,
    /// Stream access to the extended objects (0x80-0xFF).
    #[strum(to_string = "extended")]
    Extended = 0x03,
    /// One specific object, whatever its category.
    #[strum(to_string = "individual")]
    Individual = 0x04,
}

/// The conformity byte of an identification reply.
#[bitfield]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Conformity {
    /// 0 = none, 1 = basic, 2 = regular, 3 = extended.
    pub level: B7,
    /// Set when the device can stream several objects per reply.
    pub streaming: bool,
}

impl Conformity {
    pub fn from_byte(byte: u8) -> Self {
        Self::from_bytes([byte])
    }

    pub fn to_byte(self) -> u8 {
        self.into_bytes()[0]
    }
}

impl core::fmt::Debug for Conformity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Conformity({:#04x})", self.to_byte())
    }
}

/// A supported identification conformity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, FromRepr)]
#[repr(u8)]
pub enum ConformityLevel {
    #[strum(to_string = "basic")]
    Basic = 1,
    #[strum(to_string = "regular")]
    Regular = 2,
    #[strum(to_string = "extended")]
    Extended = 3,
}

/// Object id ranges of each category, in the order they are walked.
const CATEGORY_RANGES: [(ReadCode, RangeInclusive<u8>); 3] = [
    (ReadCode::Basic, 0x00..=0x02),
    (ReadCode::Regular, 0x03..=0x06),
    (ReadCode::Extended, 0x80..=0xFF),
];

impl ConformityLevel {
    /// Every category this level gives access to, with its object id range.
    pub fn ranges(self) -> impl Iterator<Item = (ReadCode, RangeInclusive<u8>)> {
        CATEGORY_RANGES.into_iter().take(self as usize)
    }
}

impl TryFrom<Conformity> for ConformityLevel {
    type Error = u8;

    fn try_from(conformity: Conformity) -> Result<Self, Self::Error> {
        ConformityLevel::from_repr(conformity.level()).ok_or(conformity.level())
    }
}

/// A single identification object as sent by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdObject {
    pub id: u8,
    pub value: Vec<u8>,
}

/// A decoded Read Device Identification reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdResponse {
    pub read_code: u8,
    pub conformity: Conformity,
    pub more_follows: bool,
    pub next_object_id: u8,
    pub objects: Vec<DeviceIdObject>,
}

impl DeviceIdResponse {
    /// Decode the reply payload following the function code.
    pub fn decode(payload: &[u8]) -> Result<Self, TransportError> {
        let [mei_type, read_code, conformity, more_follows, next_object_id, count, rest @ ..] =
            payload
        else {
            return Err(TransportError::InvalidResponse("device identification reply too short"));
        };
        if *mei_type != MEI_READ_DEVICE_ID {
            return Err(TransportError::InvalidResponse("device identification MEI type mismatch"));
        }

        let mut objects = Vec::with_capacity(usize::from(*count));
        let mut rest = rest;
        for _ in 0..*count {
            let [id, len, tail @ ..] = rest else {
                return Err(TransportError::InvalidResponse("device identification object header truncated"));
            };
            let len = usize::from(*len);
            if tail.len() < len {
                return Err(TransportError::InvalidResponse("device identification object data truncated"));
            }
            let (value, tail) = tail.split_at(len);
            objects.push(DeviceIdObject {
                id: *id,
                value: value.to_vec(),
            });
            rest = tail;
        }
        if !rest.is_empty() {
            return Err(TransportError::InvalidResponse("device identification trailing data"));
        }

        Ok(Self {
            read_code: *read_code,
            conformity: Conformity::from_byte(*conformity),
            more_follows: *more_follows != 0,
            next_object_id: *next_object_id,
            objects,
        })
    }

    /// Encode this reply the way a device would send it. The inverse of [`Self::decode`].
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![
            MEI_READ_DEVICE_ID,
            self.read_code,
            self.conformity.to_byte(),
            if self.more_follows { 0xFF } else { 0x00 },
            self.next_object_id,
            self.objects.len() as u8,
        ];
        for object in &self.objects {
            out.push(object.id);
            out.push(object.value.len() as u8);
            out.extend_from_slice(&object.value);
        }
        out
    }
}

/// An identification object value as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectValue {
    Text(String),
    /// The payload was not valid UTF-8.
    Undecodable(Vec<u8>),
}

impl From<Vec<u8>> for ObjectValue {
    fn from(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => ObjectValue::Text(text),
            Err(err) => ObjectValue::Undecodable(err.into_bytes()),
        }
    }
}

impl core::fmt::Display for ObjectValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ObjectValue::Text(text) => write!(f, "{text}"),
            ObjectValue::Undecodable(bytes) => write!(f, "<undecodable: {bytes:02x?}>"),
        }
    }
}
