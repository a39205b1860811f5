use clap::Parser;

use spi_test_lib::bus::{BusSpec, SpiMode};
use spi_test_lib::devices::DeviceId;
use spi_test_lib::protocol::MAX_TRANSFER_LEN;
use spi_test_lib::SessionConfig;

fn parse_with_radix<T>(input: &str) -> Result<T, T::FromStrRadixErr>
where
    T: num::Num,
    <T as num::Num>::FromStrRadixErr: std::error::Error + Send + Sync,
{
    if input.starts_with("0x") {
        T::from_str_radix(input.trim_start_matches("0x"), 16)
    } else if input.starts_with("0b") {
        T::from_str_radix(input.trim_start_matches("0b"), 2)
    } else {
        T::from_str_radix(input, 10)
    }
}

fn parse_count_limit(input: &str) -> Result<u16, String> {
    let limit: u16 = parse_with_radix::<u16>(input).map_err(|e| e.to_string())?;
    if limit == 0 || usize::from(limit) > MAX_TRANSFER_LEN {
        return Err(format!("must be between 1 and {}", MAX_TRANSFER_LEN));
    }
    Ok(limit)
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Skip sanity checks
    #[clap(long, short)]
    pub force: bool,

    /// enable debug output
    #[clap(long, short)]
    pub debug: bool,

    /// SPI bus: 'auto', 'loopback', a bus number or a /dev/spidev node
    #[clap(long, short = 'B', default_value = "auto")]
    pub bus: BusSpec,

    /// SPI clock in Hz
    #[clap(long, short, default_value_t = 1_000_000, parse(try_from_str=parse_with_radix))]
    pub speed: u32,

    /// SPI mode (0-3)
    #[clap(long, short, default_value = "0")]
    pub mode: SpiMode,

    /// Operator console: 'stdio', a UART device or 'auto'
    #[clap(long, short, default_value = "stdio")]
    pub console: String,

    /// Console UART baud rate
    #[clap(long, short, default_value_t = 115200)]
    pub baudrate: u32,

    /// Device selected at startup
    #[clap(long, short = 'D', default_value = "ext0")]
    pub device: DeviceId,

    /// Largest byte count accepted by the custom read/write tools
    #[clap(long, default_value_t = 999, parse(try_from_str=parse_count_limit))]
    pub max_count: u16,
}

impl Cli {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            mode: self.mode,
            speed_hz: self.speed,
            default_device: self.device,
            max_custom_count: self.max_count,
        }
    }
}
