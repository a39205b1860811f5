use anyhow::Result;
use itertools::Itertools;
use log::{info, warn};

use super::menu::PayloadSize;
use super::{Session, SessionError};
use crate::protocol::{Response, TransactionRequest};

fn fmt_byte(byte: u8) -> String {
    format!("0x{:02X}", byte)
}

fn quoted(data: &[u8]) -> String {
    data.iter()
        .map(|&byte| format!("\"{}\"", fmt_byte(byte)))
        .join(" ")
}

fn check_count(count: u32, max: u16) -> Result<usize, SessionError> {
    if count == 0 || count > u32::from(max) {
        return Err(SessionError::InvalidByteCount { count, max });
    }
    Ok(count as usize)
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

impl<'a> Session<'a> {
    pub(super) fn write_flow(&mut self, size: PayloadSize) -> Result<()> {
        self.write(&format!(
            "\n\rYou have entered the \"{}\" tool\n\r",
            size.write_tool()
        ))?;

        let count = match size.fixed_len() {
            Some(len) => len,
            None => self.prompt_count("send")?,
        };

        let request = loop {
            let command = self.prompt_command("Write")?;

            let mut data = Vec::with_capacity(count);
            for i in 0..count {
                let prompt = match (size, i) {
                    (PayloadSize::Single, _) => "\tEnter Value to write: ".to_string(),
                    (_, 0) => "\tEnter Value for byte 0 (MSB):\n\r".to_string(),
                    _ => format!("\tEnter Value for byte {}:\n\r", i),
                };
                self.write(&prompt)?;
                let value = self.terminal.read_byte_value(2, None)?;
                data.push(u8::try_from(value)?);
            }

            self.write(&format!(
                "\tSend write command \"{}\" and {} {}?[Y/N] ",
                fmt_byte(command),
                plural(count, "value"),
                quoted(&data)
            ))?;
            if self.terminal.read_yes_no()? {
                break TransactionRequest::write(self.state.registry.current(), command, data);
            }
        };

        info!(
            "write {:#04x} to {} ({} data bytes)",
            request.command(),
            request.target.name,
            count
        );
        let result = self.engine.execute(&request);
        self.report(result)
    }

    pub(super) fn read_flow(&mut self, size: PayloadSize) -> Result<()> {
        self.write(&format!(
            "\n\rYou have entered the \"{}\" tool\n\r",
            size.read_tool()
        ))?;

        let count = match size.fixed_len() {
            Some(len) => len,
            None => self.prompt_count("read")?,
        };

        let request = loop {
            let command = self.prompt_command("Read")?;

            self.write(&format!(
                "\tSend read command \"{}\" for {} {}?[Y/N] ",
                fmt_byte(command),
                count,
                plural(count, "byte")
            ))?;
            if self.terminal.read_yes_no()? {
                break TransactionRequest::read(self.state.registry.current(), command, count);
            }
        };

        info!(
            "read {:#04x} from {} ({} bytes)",
            request.command(),
            request.target.name,
            count
        );
        let result = self.engine.execute(&request);
        self.report(result)
    }

    fn prompt_count(&mut self, verb: &str) -> Result<usize> {
        let max = self.config.max_custom_count;
        loop {
            self.write(&format!(
                "How many bytes would you like to {}? (1-{})\n\r",
                verb, max
            ))?;
            let count = self.terminal.read_decimal()?;
            match check_count(count, max) {
                Ok(count) => return Ok(count),
                Err(e) => self.write(&format!("ERROR! {}\n\r", e))?,
            }
        }
    }

    /// An empty answer reuses the previous command byte.
    fn prompt_command(&mut self, kind: &str) -> Result<u8> {
        let last = self.state.last_command_byte;
        let prompt = match last {
            Some(byte) => format!("\tEnter {} Command [{}]: ", kind, fmt_byte(byte)),
            None => format!("\tEnter {} Command: ", kind),
        };
        self.write(&prompt)?;

        let value = self.terminal.read_byte_value(2, last.map(u32::from))?;
        let command = u8::try_from(value)?;
        self.state.last_command_byte = Some(command);
        Ok(command)
    }

    fn report(&mut self, result: Result<Response>) -> Result<()> {
        let text = match result {
            Ok(Response::Write(byte)) => format!(
                "\n\r\tData has been sent!\n\r\tResponse was \"{}\"\n\r",
                fmt_byte(byte)
            ),
            Ok(Response::Read(data)) => format!(
                "\n\r\tData has been read!\n\r\tRead Data is {}\n\r",
                quoted(&data)
            ),
            Err(e) => {
                warn!("{:#}", e);
                format!("\n\r\tERROR! Transaction failed: {:#}\n\r", e)
            }
        };
        self.write(&text)
    }
}
