//! Where the switch is and how long to wait for it.

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

use crate::{
    error::{Error, Result, TransportError},
    transport::UnitId,
};

/// TCP port of the management bus; serial port N's gateway listens on this plus N.
pub const DEFAULT_PORT_BASE: u16 = 4300;
pub const DEFAULT_MANAGEMENT_TIMEOUT: Duration = Duration::from_secs(1);
/// Gateway requests cross a serial bus, so they get more time.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub host: String,
    pub port_base: u16,
    pub management_timeout: Duration,
    pub gateway_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port_base: DEFAULT_PORT_BASE,
            management_timeout: DEFAULT_MANAGEMENT_TIMEOUT,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }
}

impl BusConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Address of the management bus.
    pub fn management_addr(&self) -> Result<SocketAddr> {
        self.resolve(self.port_base)
    }

    /// Address of the gateway relaying to serial port `port`.
    pub fn gateway_addr(&self, port: UnitId) -> Result<SocketAddr> {
        let tcp_port = self
            .port_base
            .checked_add(u16::from(port))
            .ok_or(Error::OutOfRange {
                what: "gateway TCP port",
                value: u32::from(self.port_base) + u32::from(port),
            })?;
        self.resolve(tcp_port)
    }

    fn resolve(&self, tcp_port: u16) -> Result<SocketAddr> {
        let addr = (self.host.as_str(), tcp_port)
            .to_socket_addrs()
            .map_err(TransportError::Io)?
            .next()
            .ok_or_else(|| {
                TransportError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} resolved to no address", self.host),
                ))
            })?;
        Ok(addr)
    }
}
