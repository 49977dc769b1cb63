use log::{debug, info};

use crate::{
    changes::{ConfigField, PendingWrite, PortChanges},
    codec,
    error::{Error, Result, TransportError},
    register::{
        CONFIG_BLOCK_LEN, DESCRIPTION_LEN, HoldingRegister, InputRegister, RESET_COUNTERS_MAGIC,
        TELEMETRY_BLOCK_LEN,
    },
    transport::{Bus, BusResult, UnitId},
    types::{PortConfig, PortCounters, PortTelemetry},
};

/// You can create a Switch using any [`Bus`] connected to the switch's management endpoint.
///
/// Each serial port is a separate Modbus unit whose id is the port number. Nothing is
/// cached: every call is a fresh exchange with the switch, and nothing is retried.
pub struct Switch<B: Bus> {
    bus: B,
}

impl<B: Bus> Switch<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Read the configuration of `port`.
    pub fn read_config(&mut self, port: UnitId) -> Result<PortConfig> {
        let regs = self.read_holdings(port, HoldingRegister::Baud, CONFIG_BLOCK_LEN)?;
        Ok(decode_config(&regs))
    }

    /// Apply `changes` to `port`.
    ///
    /// Every setting is its own register write, issued in [`ConfigField`] order. The
    /// switch applies each write as it arrives, so when one fails the settings before
    /// it stay applied; the returned [`Error::PartialWrite`] names both.
    pub fn write_config(&mut self, port: UnitId, changes: &PortChanges) -> Result<()> {
        let mut applied: Vec<ConfigField> = Vec::new();
        for write in changes.writes() {
            let field = write.field();
            let result = match write {
                PendingWrite::Single { value, .. } => self.write_holding(port, field.register(), value),
                PendingWrite::Description(regs) => {
                    self.write_holdings(port, HoldingRegister::Description, &regs)
                }
            };
            if let Err(err) = result {
                return Err(Error::PartialWrite {
                    field,
                    applied,
                    source: Box::new(err),
                });
            }
            debug!("Port {port}: {field} set");
            applied.push(field);
        }
        Ok(())
    }

    /// Read the configuration and the counters of `port`.
    pub fn read_telemetry(&mut self, port: UnitId) -> Result<PortTelemetry> {
        let config = self.read_config(port)?;
        let regs = lift(
            self.bus
                .read_input_registers(port, InputRegister::CurrentSense.into(), TELEMETRY_BLOCK_LEN),
        )?;
        if regs.len() != usize::from(TELEMETRY_BLOCK_LEN) {
            return Err(Error::Transport(TransportError::InvalidResponse(
                "short telemetry block",
            )));
        }
        let counter = |reg: InputRegister| {
            let lo = reg.offset();
            codec::decode_counter32(regs[lo], regs[lo + 1])
        };
        let counters = PortCounters {
            current_sense: regs[InputRegister::CurrentSense.offset()] != 0,
            broadcasts: counter(InputRegister::BroadcastsLow),
            unicasts: counter(InputRegister::UnicastsLow),
            frame_errors: counter(InputRegister::FrameErrorsLow),
            oversize_errors: counter(InputRegister::OversizeLow),
            undersize_errors: counter(InputRegister::UndersizeLow),
            crc_errors: counter(InputRegister::CrcErrorsLow),
            mismatch_errors: counter(InputRegister::MismatchLow),
            timeouts: counter(InputRegister::TimeoutsLow),
        };
        Ok(PortTelemetry { config, counters })
    }

    /// Zero the telemetry counters of `port`.
    pub fn reset_counters(&mut self, port: UnitId) -> Result<()> {
        self.write_holding(port, HoldingRegister::ResetCounters, RESET_COUNTERS_MAGIC)?;
        info!("Port {port}: counters reset");
        Ok(())
    }

    /// Run `op` on every port in `ports`, collecting one result per port.
    ///
    /// A failing port does not stop the others.
    pub fn for_ports<T>(
        &mut self,
        ports: &[UnitId],
        mut op: impl FnMut(&mut Self, UnitId) -> Result<T>,
    ) -> Vec<(UnitId, Result<T>)> {
        ports.iter().map(|&port| (port, op(self, port))).collect()
    }

    /// Read consecutive holding registers of `port`.
    pub fn read_holdings(
        &mut self,
        port: UnitId,
        start: impl Into<u16>,
        count: u16,
    ) -> Result<Vec<u16>> {
        let regs = lift(self.bus.read_holding_registers(port, start.into(), count))?;
        if regs.len() != usize::from(count) {
            return Err(Error::Transport(TransportError::InvalidResponse(
                "register count mismatch",
            )));
        }
        Ok(regs)
    }

    /// Write to a single holding register of `port`.
    pub fn write_holding(&mut self, port: UnitId, register: impl Into<u16>, value: u16) -> Result<()> {
        lift(self.bus.write_single_register(port, register.into(), value))
    }

    /// Write to multiple, sequential holding registers of `port`.
    pub fn write_holdings(&mut self, port: UnitId, start: impl Into<u16>, values: &[u16]) -> Result<()> {
        lift(self.bus.write_multiple_registers(port, start.into(), values))
    }
}

/// Flatten an exchange result, turning Modbus exceptions into management bus errors.
fn lift<T>(result: BusResult<T>) -> Result<T> {
    Ok(result??)
}

fn decode_config(regs: &[u16]) -> PortConfig {
    let at = |reg: HoldingRegister| regs[usize::from(u16::from(reg) - 1)];
    let description: [u16; DESCRIPTION_LEN as usize] = core::array::from_fn(|i| {
        regs[usize::from(HoldingRegister::Description as u16 - 1) + i]
    });
    PortConfig {
        baud: codec::decode_baud(at(HoldingRegister::Baud)),
        parity: codec::decode_parity(at(HoldingRegister::Parity)),
        power: codec::decode_power(at(HoldingRegister::Power)),
        timeout: codec::decode_timeout(at(HoldingRegister::Timeout)),
        description: codec::decode_description(&description),
    }
}
