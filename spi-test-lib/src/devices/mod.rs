mod db;

use log::info;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

use db::DEVICES;

/// Catalog identifiers. The discriminant is the 0-based index shown to the
/// operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum DeviceId {
    Fram = 0,
    ExternalSpi0 = 1,
    ExternalSpi1 = 2,
    Adc = 3,
    LcdScreen = 4,
    Accelerometer = 5,
}

impl DeviceId {
    pub fn from_index(index: u8) -> Option<Self> {
        Self::from_u8(index)
    }

    pub fn from_char(c: char) -> Option<Self> {
        c.to_digit(10)
            .and_then(|d| u8::try_from(d).ok())
            .and_then(Self::from_index)
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Registry::describe(*self).fmt(f)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum DeviceError {
    #[error("unknown device '{0}'")]
    UnknownDevice(String),
}

impl FromStr for DeviceId {
    type Err = DeviceError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "0" | "fram" => Ok(DeviceId::Fram),
            "1" | "ext0" | "external_spi_0" => Ok(DeviceId::ExternalSpi0),
            "2" | "ext1" | "external_spi_1" => Ok(DeviceId::ExternalSpi1),
            "3" | "adc" => Ok(DeviceId::Adc),
            "4" | "lcd" | "lcd_screen" => Ok(DeviceId::LcdScreen),
            "5" | "accel" | "accelerometer" => Ok(DeviceId::Accelerometer),
            _ => Err(DeviceError::UnknownDevice(input.to_string())),
        }
    }
}

/// One peripheral on the shared bus.
#[derive(Debug, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub name: &'static str,
    pub chip_select: u8,
    /// Shared with firmware; redirecting traffic here can corrupt it.
    pub privileged: bool,
}

impl Device {
    pub const fn new(id: DeviceId, name: &'static str, chip_select: u8, privileged: bool) -> Self {
        Device {
            id,
            name,
            chip_select,
            privileged,
        }
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "-({}) {}", self.id.index(), self.name)
    }
}

/// Fixed device catalog plus the active selection.
#[derive(Debug)]
pub struct Registry {
    selected: DeviceId,
}

impl Registry {
    pub fn new(default: DeviceId) -> Self {
        Registry { selected: default }
    }

    pub fn catalog() -> &'static [Device] {
        DEVICES
    }

    pub fn lookup(id: DeviceId) -> &'static Device {
        &DEVICES[id.index() as usize]
    }

    pub fn describe(id: DeviceId) -> &'static str {
        Self::lookup(id).name
    }

    /// Maps an operator identifier (catalog index) to a device without
    /// changing the selection.
    pub fn resolve(identifier: char) -> Result<&'static Device, DeviceError> {
        DeviceId::from_char(identifier)
            .map(Self::lookup)
            .ok_or_else(|| DeviceError::UnknownDevice(identifier.to_string()))
    }

    pub fn select(&mut self, identifier: char) -> Result<&'static Device, DeviceError> {
        let device = Self::resolve(identifier)?;
        self.selected = device.id;
        info!("selected {} (chip select {})", device.name, device.chip_select);
        Ok(device)
    }

    pub fn current(&self) -> &'static Device {
        Self::lookup(self.selected)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new(DeviceId::ExternalSpi0)
    }
}
