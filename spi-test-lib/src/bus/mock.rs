use super::{BusController, SpiMode};

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Configure(SpiMode, u32),
    Assert(u8),
    Transfer { tx: Vec<u8>, rx_len: usize },
    Deassert(u8),
}

/// Records every bus call; rx bytes are served from `response`, cycled.
#[derive(Default)]
pub struct MockBus {
    pub events: Vec<BusEvent>,
    pub response: Vec<u8>,
    pub fail_assert: bool,
    pub fail_transfer: bool,
    pub fail_deassert: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(response: &[u8]) -> Self {
        Self {
            response: response.to_vec(),
            ..Self::default()
        }
    }

    /// Recorded events without the initial bus configuration.
    pub fn transactions(&self) -> Vec<BusEvent> {
        self.events
            .iter()
            .filter(|e| !matches!(e, BusEvent::Configure(..)))
            .cloned()
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&BusEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl BusController for MockBus {
    fn configure(&mut self, mode: SpiMode, speed_hz: u32) -> Result<()> {
        self.events.push(BusEvent::Configure(mode, speed_hz));
        Ok(())
    }

    fn assert_select(&mut self, line: u8) -> Result<()> {
        if self.fail_assert {
            return Err(anyhow!("injected select fault"));
        }
        self.events.push(BusEvent::Assert(line));
        Ok(())
    }

    fn deassert_select(&mut self, line: u8) -> Result<()> {
        self.events.push(BusEvent::Deassert(line));

        if self.fail_deassert {
            return Err(anyhow!("injected deassert fault"));
        }
        Ok(())
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        self.events.push(BusEvent::Transfer {
            tx: tx.to_vec(),
            rx_len: rx.len(),
        });

        if self.fail_transfer {
            return Err(anyhow!("injected transfer fault"));
        }

        if !self.response.is_empty() {
            for (byte, value) in rx.iter_mut().zip(self.response.iter().cycle()) {
                *byte = *value;
            }
        }
        Ok(())
    }
}
