use super::{BusController, BusError, SpiMode};
use crate::port::is_port_open;

use anyhow::{Context, Result};
use glob::glob;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use std::collections::HashMap;

// Default size of the spidev kernel bounce buffer.
const SPIDEV_BUFSIZ: usize = 4096;

/// Linux spidev backend. Chip-select line N of bus B is `/dev/spidevB.N`;
/// the kernel drives the line for the duration of one message.
pub struct SpidevBus {
    bus: u16,
    force: bool,
    mode: SpiMode,
    speed_hz: u32,
    nodes: HashMap<u8, Spidev>,
    selected: Option<u8>,
}

impl SpidevBus {
    pub fn new(bus: u16, force: bool) -> Self {
        Self {
            bus,
            force,
            mode: SpiMode::Mode0,
            speed_hz: 1_000_000,
            nodes: HashMap::new(),
            selected: None,
        }
    }

    fn options(&self) -> SpidevOptions {
        SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(self.speed_hz)
            .mode(mode_flags(self.mode))
            .build()
    }

    fn open_node(&self, line: u8) -> Result<Spidev> {
        let path = format!("/dev/spidev{}.{}", self.bus, line);

        if !self.force && is_port_open(&path) {
            return Err(BusError::BusBusy { path }.into());
        }

        let mut spidev = Spidev::open(&path).with_context(|| format!("Can't open {}", path))?;
        spidev
            .configure(&self.options())
            .with_context(|| format!("Can't configure {}", path))?;

        debug!("open_node OK: {} mode {} @ {} Hz", &path, self.mode, self.speed_hz);
        Ok(spidev)
    }
}

fn mode_flags(mode: SpiMode) -> SpiModeFlags {
    match mode {
        SpiMode::Mode0 => SpiModeFlags::SPI_MODE_0,
        SpiMode::Mode1 => SpiModeFlags::SPI_MODE_1,
        SpiMode::Mode2 => SpiModeFlags::SPI_MODE_2,
        SpiMode::Mode3 => SpiModeFlags::SPI_MODE_3,
    }
}

impl BusController for SpidevBus {
    fn configure(&mut self, mode: SpiMode, speed_hz: u32) -> Result<()> {
        self.mode = mode;
        self.speed_hz = speed_hz;

        let options = self.options();
        for (line, spidev) in self.nodes.iter_mut() {
            spidev
                .configure(&options)
                .with_context(|| format!("Can't configure spidev{}.{}", self.bus, line))?;
        }
        Ok(())
    }

    fn assert_select(&mut self, line: u8) -> Result<()> {
        if let Some(current) = self.selected {
            return Err(BusError::SelectBusy(current).into());
        }

        if !self.nodes.contains_key(&line) {
            let spidev = self.open_node(line)?;
            self.nodes.insert(line, spidev);
        }

        self.selected = Some(line);
        Ok(())
    }

    fn deassert_select(&mut self, line: u8) -> Result<()> {
        match self.selected {
            Some(current) if current == line => {
                self.selected = None;
                Ok(())
            }
            _ => Err(BusError::NotSelected(line).into()),
        }
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        let line = self.selected.ok_or(BusError::NoSelection)?;
        let spidev = self.nodes.get(&line).ok_or(BusError::NotSelected(line))?;

        if tx.len() + rx.len() > SPIDEV_BUFSIZ {
            return Err(BusError::TooLong(tx.len() + rx.len()).into());
        }

        // tx then rx in one message, so chip-select stays asserted between them
        let mut segments = Vec::with_capacity(2);
        if !tx.is_empty() {
            segments.push(SpidevTransfer::write(tx));
        }
        if !rx.is_empty() {
            segments.push(SpidevTransfer::read(rx));
        }

        spidev
            .transfer_multiple(&mut segments)
            .with_context(|| format!("SPI transfer failed on spidev{}.{}", self.bus, line))?;
        Ok(())
    }
}

pub fn guess_bus() -> Result<u16> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^/dev/spidev(\d+)\.\d+$").unwrap();
    }

    glob("/dev/spidev*")?
        .filter_map(|p| p.ok())
        .filter_map(|path| {
            let name = path.to_str()?;
            RE.captures(name)?.get(1)?.as_str().parse::<u16>().ok()
        })
        .min()
        .ok_or_else(|| BusError::NoBus.into())
}
