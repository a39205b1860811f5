use super::{BusController, BusError, SpiMode};

use anyhow::Result;
use log::debug;
use std::collections::HashMap;

const MEMORY_SIZE: usize = 256;

/// Simulated bus for running the harness without hardware.
///
/// Every chip-select line is backed by a 256-byte scratch memory addressed
/// by the command byte. A transfer that sends only the command byte reads
/// consecutive bytes starting at that address. A transfer that sends data
/// stores it starting at that address, and the bytes clocked in afterwards
/// echo the last byte shifted out.
#[derive(Default)]
pub struct LoopbackBus {
    memory: HashMap<u8, [u8; MEMORY_SIZE]>,
    selected: Option<u8>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BusController for LoopbackBus {
    fn configure(&mut self, mode: SpiMode, speed_hz: u32) -> Result<()> {
        debug!("loopback configured: mode {} @ {} Hz", mode, speed_hz);
        Ok(())
    }

    fn assert_select(&mut self, line: u8) -> Result<()> {
        if let Some(current) = self.selected {
            return Err(BusError::SelectBusy(current).into());
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
        let memory = self.memory.entry(line).or_insert([0u8; MEMORY_SIZE]);

        match tx.split_first() {
            Some((&address, [])) => {
                for (i, byte) in rx.iter_mut().enumerate() {
                    *byte = memory[(address as usize + i) % MEMORY_SIZE];
                }
            }
            Some((&address, data)) => {
                for (i, &byte) in data.iter().enumerate() {
                    memory[(address as usize + i) % MEMORY_SIZE] = byte;
                }
                rx.fill(data[data.len() - 1]);
            }
            None => rx.fill(0),
        }

        Ok(())
    }
}
