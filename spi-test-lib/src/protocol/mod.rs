use anyhow::{Error, Result};
use itertools::Itertools;
use log::debug;
use thiserror::Error;

use crate::bus::{BusController, SpiMode};
use crate::devices::Device;

/// Largest number of data bytes moved by one transaction.
pub const MAX_TRANSFER_LEN: usize = 999;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("write payload is empty")]
    EmptyPayload,
    #[error("invalid byte count {0}")]
    InvalidCount(usize),
    #[error("transaction with {device} failed")]
    TransactionFailed {
        device: &'static str,
        #[source]
        source: Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    Read { command: u8, count: usize },
    Write { command: u8, data: Vec<u8> },
}

/// One operator-confirmed action addressed to a single device.
#[derive(Debug)]
pub struct TransactionRequest {
    pub target: &'static Device,
    pub kind: TransactionKind,
}

impl TransactionRequest {
    pub fn read(target: &'static Device, command: u8, count: usize) -> Self {
        Self {
            target,
            kind: TransactionKind::Read { command, count },
        }
    }

    pub fn write(target: &'static Device, command: u8, data: Vec<u8>) -> Self {
        Self {
            target,
            kind: TransactionKind::Write { command, data },
        }
    }

    pub fn command(&self) -> u8 {
        match self.kind {
            TransactionKind::Read { command, .. } | TransactionKind::Write { command, .. } => {
                command
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Read(Vec<u8>),
    Write(u8),
}

pub struct TransactionEngine<'a> {
    bus: &'a mut dyn BusController,
}

impl<'a> TransactionEngine<'a> {
    pub fn new(bus: &'a mut dyn BusController) -> Self {
        Self { bus }
    }

    pub fn configure(&mut self, mode: SpiMode, speed_hz: u32) -> Result<()> {
        debug!("configure mode {} @ {} Hz", mode, speed_hz);
        self.bus.configure(mode, speed_hz)
    }

    /// Sends `command` and clocks in `length` bytes.
    pub fn read(&mut self, device: &Device, command: u8, length: usize) -> Result<Vec<u8>> {
        if length == 0 || length > MAX_TRANSFER_LEN {
            return Err(ProtocolError::InvalidCount(length).into());
        }

        let mut data = vec![0u8; length];

        debug!("read {} cmd {:#04x} count {}", device.name, command, length);
        self.transaction(device, &[command], &mut data)?;
        debug!("recv {:02x?}", data);

        Ok(data)
    }

    /// Sends `payload` (opcode first) and clocks in one response byte.
    pub fn write(&mut self, device: &Device, payload: &[u8]) -> Result<u8> {
        if payload.is_empty() {
            return Err(ProtocolError::EmptyPayload.into());
        }
        if payload.len() > MAX_TRANSFER_LEN + 1 {
            return Err(ProtocolError::InvalidCount(payload.len() - 1).into());
        }

        let mut response = [0u8; 1];

        debug!("write {} {}", device.name, hex::encode(payload));
        self.transaction(device, payload, &mut response)?;
        debug!("recv {:02x?}", response);

        Ok(response[0])
    }

    pub fn execute(&mut self, request: &TransactionRequest) -> Result<Response> {
        match &request.kind {
            TransactionKind::Read { command, count } => self
                .read(request.target, *command, *count)
                .map(Response::Read),
            TransactionKind::Write { command, data } => {
                let payload = std::iter::once(*command)
                    .chain(data.iter().copied())
                    .collect_vec();
                self.write(request.target, &payload).map(Response::Write)
            }
        }
    }

    fn transaction(&mut self, device: &Device, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        let line = device.chip_select;
        let failed = |source| ProtocolError::TransactionFailed {
            device: device.name,
            source,
        };

        self.bus.assert_select(line).map_err(failed)?;
        let transferred = self.bus.transfer(tx, rx);
        let released = self.bus.deassert_select(line);

        transferred.map_err(failed)?;
        released.map_err(failed)?;
        Ok(())
    }
}
