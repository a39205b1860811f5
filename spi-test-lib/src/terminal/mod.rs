#[cfg(test)]
pub(crate) mod script;

use anyhow::Result;
use std::io::{self, ErrorKind, Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("terminal closed")]
    Closed,
}

/// Operator terminal. Implementors provide line I/O; value parsing is shared.
///
/// Every reading helper re-prompts on malformed input rather than failing, so
/// the only errors are I/O errors and [`TerminalError::Closed`].
pub trait Terminal {
    fn write_text(&mut self, text: &str) -> Result<()>;
    fn read_line(&mut self) -> Result<String>;

    /// First non-blank character of the next non-empty line.
    fn read_char(&mut self) -> Result<char> {
        loop {
            if let Some(c) = self.read_line()?.trim().chars().next() {
                return Ok(c);
            }
        }
    }

    /// Hex value of at most `max_digits` digits, optional `0x` prefix.
    /// An empty line yields `default` when there is one.
    fn read_byte_value(&mut self, max_digits: usize, default: Option<u32>) -> Result<u32> {
        loop {
            let line = self.read_line()?;
            let input = line.trim();

            if input.is_empty() {
                match default {
                    Some(value) => return Ok(value),
                    None => continue,
                }
            }

            match parse_hex(input, max_digits) {
                Some(value) => return Ok(value),
                None => self.write_text("ERROR! Invalid hex value!\n\r")?,
            }
        }
    }

    /// Unsigned decimal. Range checks are left to the caller.
    fn read_decimal(&mut self) -> Result<u32> {
        loop {
            let line = self.read_line()?;
            let input = line.trim();

            if input.is_empty() {
                continue;
            }

            match parse_decimal(input) {
                Some(value) => return Ok(value),
                None => self.write_text("ERROR! Invalid decimal value!\n\r")?,
            }
        }
    }

    fn read_yes_no(&mut self) -> Result<bool> {
        loop {
            match self.read_line()?.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.write_text("Please enter Y or N: ")?,
            }
        }
    }
}

fn parse_hex(input: &str, max_digits: usize) -> Option<u32> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);

    if digits.is_empty() || digits.len() > max_digits || digits.len() > 8 {
        return None;
    }

    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };

    hex::decode(padded)
        .ok()
        .map(|bytes| bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
}

fn parse_decimal(input: &str) -> Option<u32> {
    if !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}

/// Terminal over a byte stream: stdio, or a raw serial line with `echo` set
/// so the operator sees what they type.
pub struct StreamTerminal<R, W> {
    input: R,
    output: W,
    echo: bool,
    skip_lf: bool,
}

pub type StdioTerminal = StreamTerminal<io::Stdin, io::Stdout>;

impl StdioTerminal {
    pub fn stdio() -> Self {
        StreamTerminal::new(io::stdin(), io::stdout(), false)
    }
}

impl<R: Read, W: Write> StreamTerminal<R, W> {
    pub fn new(input: R, output: W, echo: bool) -> Self {
        Self {
            input,
            output,
            echo,
            skip_lf: false,
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                // serial ports time out while the operator thinks
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock
                    ) =>
                {
                    continue
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn echo(&mut self, bytes: &[u8]) -> Result<()> {
        if self.echo {
            self.output.write_all(bytes)?;
            self.output.flush()?;
        }
        Ok(())
    }
}

impl<R: Read, W: Write> Terminal for StreamTerminal<R, W> {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes())?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        self.output.flush()?;

        let mut line = Vec::new();
        loop {
            let byte = match self.read_byte()? {
                Some(byte) => byte,
                None if line.is_empty() => return Err(TerminalError::Closed.into()),
                None => break,
            };

            let skip_lf = std::mem::take(&mut self.skip_lf);
            match byte {
                b'\n' if skip_lf => continue,
                b'\r' | b'\n' => {
                    self.skip_lf = byte == b'\r';
                    self.echo(b"\n\r")?;
                    break;
                }
                0x08 | 0x7F => {
                    if line.pop().is_some() {
                        self.echo(b"\x08 \x08")?;
                    }
                }
                _ => {
                    line.push(byte);
                    self.echo(&[byte])?;
                }
            }
        }

        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}
