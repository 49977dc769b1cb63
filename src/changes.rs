//! Partial port configuration updates.
//!
//! Use [`PortChangesBuilder`] to collect the settings to change. Building validates
//! and encodes everything up front, so a bad value never reaches the switch and
//! cannot leave a port half configured.

use strum_macros::{Display, EnumIter, IntoStaticStr};

use crate::{
    codec,
    error::Result,
    register::HoldingRegister,
};

/// A configurable setting of a port, in the order writes are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ConfigField {
    Baud,
    Parity,
    Power,
    Timeout,
    Description,
}

impl ConfigField {
    pub const fn register(self) -> HoldingRegister {
        match self {
            ConfigField::Baud => HoldingRegister::Baud,
            ConfigField::Parity => HoldingRegister::Parity,
            ConfigField::Power => HoldingRegister::Power,
            ConfigField::Timeout => HoldingRegister::Timeout,
            ConfigField::Description => HoldingRegister::Description,
        }
    }
}

/// One register transaction of a configuration update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingWrite {
    Single { field: ConfigField, value: u16 },
    Description([u16; 4]),
}

impl PendingWrite {
    pub const fn field(&self) -> ConfigField {
        match self {
            PendingWrite::Single { field, .. } => *field,
            PendingWrite::Description(_) => ConfigField::Description,
        }
    }
}

/// Validated, encoded register values for a configuration update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortChanges {
    baud: Option<u16>,
    parity: Option<u16>,
    power: Option<u16>,
    timeout: Option<u16>,
    description: Option<[u16; 4]>,
}

impl PortChanges {
    pub fn builder() -> PortChangesBuilder {
        PortChangesBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.writes().next().is_none()
    }

    /// The register writes this update consists of, in issue order.
    pub fn writes(&self) -> impl Iterator<Item = PendingWrite> + '_ {
        let singles = [
            (ConfigField::Baud, self.baud),
            (ConfigField::Parity, self.parity),
            (ConfigField::Power, self.power),
            (ConfigField::Timeout, self.timeout),
        ];
        singles
            .into_iter()
            .filter_map(|(field, value)| value.map(|value| PendingWrite::Single { field, value }))
            .chain(self.description.map(PendingWrite::Description))
    }
}

/// Use this type to describe a configuration update.
#[derive(Debug, Clone, Default)]
pub struct PortChangesBuilder {
    baud: Option<u32>,
    parity: Option<String>,
    power: Option<u16>,
    timeout_ms: Option<u32>,
    description: Option<String>,
}

impl PortChangesBuilder {
    /// Rate in bits/s; a multiple of 100 between 1200 and 115200.
    pub fn baud(mut self, bps: u32) -> Self {
        self.baud = Some(bps);
        self
    }

    /// `none`, `odd` or `even`.
    pub fn parity(mut self, name: impl Into<String>) -> Self {
        self.parity = Some(name.into());
        self
    }

    /// `0` or `1`.
    pub fn power(mut self, requested: u16) -> Self {
        self.power = Some(requested);
        self
    }

    pub fn timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Let's build it! Fails on the first invalid setting.
    pub fn build(self) -> Result<PortChanges> {
        Ok(PortChanges {
            baud: self.baud.map(codec::encode_baud).transpose()?,
            parity: self.parity.as_deref().map(codec::encode_parity).transpose()?,
            power: self.power.map(codec::encode_power).transpose()?,
            timeout: self.timeout_ms.map(codec::encode_timeout).transpose()?,
            description: self
                .description
                .as_deref()
                .map(codec::encode_description)
                .transpose()?,
        })
    }
}
