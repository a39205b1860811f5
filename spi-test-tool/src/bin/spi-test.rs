pub mod cli;

use std::io;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, shells::Bash};
use log::{debug, error};

use spi_test_lib::bus;
use spi_test_lib::port;
use spi_test_lib::run_interactive_session;
use spi_test_lib::terminal::{StdioTerminal, StreamTerminal, Terminal};

use cli::Cli;

fn open_console(cli: &Cli) -> Result<Box<dyn Terminal>> {
    if cli.console == "stdio" {
        return Ok(Box::new(StdioTerminal::stdio()));
    }

    let port = port::open_port(&cli.console, cli.baudrate, cli.force)
        .with_context(|| format!("Failed to open console {}", cli.console))?;
    let input = port.try_clone()?;

    // a raw UART line has no local echo
    Ok(Box::new(StreamTerminal::new(input, port, true)))
}

fn do_main() -> Result<()> {
    if std::env::var("GENERATE_COMPLETION").is_ok() {
        generate(Bash, &mut cli::Cli::command(), "spi-test", &mut io::stdout());
        return Ok(());
    }

    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.debug {
        "debug"
    } else {
        "info"
    }))
    .format_timestamp(None)
    .format_target(false)
    .init();

    let config = cli.session_config();
    debug!("{:?}", config);

    let mut bus = bus::open_bus(cli.bus, cli.force).context("Failed to open SPI bus")?;
    let mut terminal = open_console(&cli)?;

    run_interactive_session(bus.as_mut(), terminal.as_mut(), config)
}

fn main() {
    if let Err(e) = do_main() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
