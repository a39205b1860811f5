#[cfg(target_os = "linux")]
mod linux;
mod loopback;
#[cfg(test)]
pub(crate) mod mock;

#[cfg(target_os = "linux")]
pub use linux::SpidevBus;
pub use loopback::LoopbackBus;

use anyhow::Result;
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("no SPI bus found")]
    NoBus,
    #[error("{path:?} busy")]
    BusBusy { path: String },
    #[error("chip select {0} already asserted")]
    SelectBusy(u8),
    #[error("chip select {0} is not asserted")]
    NotSelected(u8),
    #[error("transfer without an asserted chip select")]
    NoSelection,
    #[error("transfer of {0} bytes exceeds the bus buffer")]
    TooLong(usize),
}

/// SPI clock polarity and phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiMode {
    /// CPOL 0, CPHA 0
    Mode0 = 0,
    /// CPOL 0, CPHA 1
    Mode1 = 1,
    /// CPOL 1, CPHA 0
    Mode2 = 2,
    /// CPOL 1, CPHA 1
    Mode3 = 3,
}

impl Display for SpiMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        (*self as u8).fmt(f)
    }
}

#[derive(Error, Debug)]
pub enum SpiModeError {
    #[error("invalid SPI mode '{0}'")]
    BadMode(String),
}

impl FromStr for SpiMode {
    type Err = SpiModeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "0" => Ok(SpiMode::Mode0),
            "1" => Ok(SpiMode::Mode1),
            "2" => Ok(SpiMode::Mode2),
            "3" => Ok(SpiMode::Mode3),
            _ => Err(SpiModeError::BadMode(input.to_string())),
        }
    }
}

/// Low level access to one SPI controller shared by every device on the bus.
///
/// A transaction is always `assert_select`, `transfer`, `deassert_select`
/// on the same line. `transfer` is half duplex: `tx` is clocked out first,
/// then `rx.len()` bytes are clocked in while the line stays asserted.
pub trait BusController {
    fn configure(&mut self, mode: SpiMode, speed_hz: u32) -> Result<()>;
    fn assert_select(&mut self, line: u8) -> Result<()>;
    fn deassert_select(&mut self, line: u8) -> Result<()>;
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSpec {
    Auto,
    Loopback,
    Spidev(u16),
}

#[derive(Error, Debug)]
pub enum BusSpecError {
    #[error("invalid bus '{0}'")]
    BadBus(String),
}

impl FromStr for BusSpec {
    type Err = BusSpecError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^(?:/dev/spidev)?(\d+)(?:\.\d+)?$").unwrap();
        }

        match input {
            "auto" => Ok(BusSpec::Auto),
            "loopback" => Ok(BusSpec::Loopback),
            _ => RE
                .captures(input)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
                .map(BusSpec::Spidev)
                .ok_or_else(|| BusSpecError::BadBus(input.to_string())),
        }
    }
}

#[cfg(target_os = "linux")]
pub fn open_bus(spec: BusSpec, force: bool) -> Result<Box<dyn BusController>> {
    let bus = match spec {
        BusSpec::Loopback => {
            info!("using simulated loopback bus");
            return Ok(Box::new(LoopbackBus::new()));
        }
        BusSpec::Auto => linux::guess_bus()?,
        BusSpec::Spidev(bus) => bus,
    };

    info!("using /dev/spidev{}.*", bus);
    Ok(Box::new(SpidevBus::new(bus, force)))
}

#[cfg(not(target_os = "linux"))]
pub fn open_bus(spec: BusSpec, _force: bool) -> Result<Box<dyn BusController>> {
    match spec {
        BusSpec::Loopback => {
            info!("using simulated loopback bus");
            Ok(Box::new(LoopbackBus::new()))
        }
        BusSpec::Auto | BusSpec::Spidev(_) => Err(BusError::NoBus.into()),
    }
}
