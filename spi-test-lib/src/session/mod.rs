//! Interactive command dispatcher.
//!
//! A [`Session`] owns everything the operator can change: the device
//! selection, the last command byte and the current menu. Each character read
//! from the terminal is resolved through [`menu::transition`] and the
//! resulting [`menu::Action`] is carried out against the registry or the
//! transaction engine.

mod flows;
pub mod menu;

use anyhow::{Context, Result};
use log::{debug, warn};
use thiserror::Error;

use crate::bus::{BusController, SpiMode};
use crate::devices::{Device, DeviceId, Registry};
use crate::protocol::{TransactionEngine, MAX_TRANSFER_LEN};
use crate::terminal::Terminal;
use menu::{transition, Action, Menu};

#[derive(Error, Debug, PartialEq)]
pub enum SessionError {
    #[error("byte count {count} out of range 1-{max}")]
    InvalidByteCount { count: u32, max: u16 },
    #[error("byte count limit {0} must be between 1 and the transfer limit")]
    InvalidCountLimit(u16),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: SpiMode,
    pub speed_hz: u32,
    pub default_device: DeviceId,
    /// Upper bound for the custom-length read and write tools.
    pub max_custom_count: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SpiMode::Mode0,
            speed_hz: 1_000_000,
            default_device: DeviceId::ExternalSpi0,
            max_custom_count: MAX_TRANSFER_LEN as u16,
        }
    }
}

#[derive(Debug)]
pub struct SessionState {
    pub registry: Registry,
    pub last_command_byte: Option<u8>,
    pub quit_requested: bool,
}

pub struct Session<'a> {
    engine: TransactionEngine<'a>,
    terminal: &'a mut dyn Terminal,
    config: SessionConfig,
    state: SessionState,
    menu: Menu,
}

/// Runs the menu loop until the operator quits from the top level.
pub fn run_interactive_session(
    bus: &mut dyn BusController,
    terminal: &mut dyn Terminal,
    config: SessionConfig,
) -> Result<()> {
    Session::new(bus, terminal, config)?.run()
}

impl<'a> Session<'a> {
    pub fn new(
        bus: &'a mut dyn BusController,
        terminal: &'a mut dyn Terminal,
        config: SessionConfig,
    ) -> Result<Self> {
        let limit = config.max_custom_count;
        if limit == 0 || usize::from(limit) > MAX_TRANSFER_LEN {
            return Err(SessionError::InvalidCountLimit(limit).into());
        }

        Ok(Self {
            engine: TransactionEngine::new(bus),
            terminal,
            state: SessionState {
                registry: Registry::new(config.default_device),
                last_command_byte: None,
                quit_requested: false,
            },
            config,
            menu: Menu::Top,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn menu(&self) -> Menu {
        self.menu
    }

    pub fn run(&mut self) -> Result<()> {
        self.engine
            .configure(self.config.mode, self.config.speed_hz)
            .context("Failed to configure SPI bus")?;

        self.write("\n\rWELCOME TO THE SPI TEST!\n\r")?;
        self.show_commands()?;

        self.menu = Menu::Top;
        self.state.quit_requested = false;
        while !self.state.quit_requested {
            self.write("\n\r What would you like to do?\n\r")?;
            let input = self.terminal.read_char()?;
            self.step(input)?;
        }

        self.write("\n\rLeaving SPI Test Program\n\r")
    }

    /// Applies one operator character to the current menu.
    pub fn step(&mut self, input: char) -> Result<()> {
        let action = transition(self.menu, input);
        debug!("{:?} {:?} -> {:?}", self.menu, input, action);

        match action {
            Action::ShowCommands => self.show_commands(),
            Action::ShowDevices => self.show_devices(),
            Action::Quit => self.quit(),
            Action::ChangeDevice => self.change_device(),
            Action::ShowSelected => self.show_selected(),
            Action::Enter(menu) => self.enter(menu),
            Action::Write(size) => self.write_flow(size),
            Action::Read(size) => self.read_flow(size),
            Action::Invalid(_) => self.write("ERROR! Invalid Command!\n\r"),
        }
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.terminal.write_text(text)
    }

    fn enter(&mut self, menu: Menu) -> Result<()> {
        self.menu = menu;
        self.write(&format!("You have entered the {}\n\r\n\r", menu.title()))?;
        self.show_commands()
    }

    fn quit(&mut self) -> Result<()> {
        match self.menu.parent() {
            Some(parent) => {
                self.menu = parent;
                self.write("\n\rWELCOME TO THE SPI TEST!\n\r")
            }
            None => {
                self.state.quit_requested = true;
                Ok(())
            }
        }
    }

    fn show_commands(&mut self) -> Result<()> {
        let mut text = String::from("\tCOMMANDS:\n\r");
        for (c, help) in self.menu.commands() {
            text += &format!("\t- {}\t {}\n\r", c, help);
        }
        self.write(&text)
    }

    fn show_devices(&mut self) -> Result<()> {
        let mut text = String::from("\tSPI DEVICE IDs:\n\r");
        for device in Registry::catalog() {
            text += &format!("\t{}\n\r", device);
        }
        self.write(&text)
    }

    fn show_selected(&mut self) -> Result<()> {
        let name = self.state.registry.current().name;
        self.write(&format!("\tCURRENT DEVICE: {}\n\r", name))
    }

    fn change_device(&mut self) -> Result<()> {
        self.write("\n\rYou have entered the \"Change Selected Device\" tool\n\r")?;
        self.write("- Enter device ID to set the new device\n\r")?;
        self.write("- Enter 'd' to display current selected device\n\r")?;
        self.write("- Enter 'q' to keep the current device\n\r\n\r")?;
        self.show_devices()?;

        loop {
            self.write("Device ID:\n\r")?;
            match self.terminal.read_char()? {
                'h' => self.show_devices()?,
                'd' => self.show_selected()?,
                'q' => return self.write("Device not changed.\n\r"),
                c => match Registry::resolve(c) {
                    Ok(device) => {
                        if device.privileged && !self.confirm_privileged(device)? {
                            return self.write("Device not changed.\n\r");
                        }
                        self.state.registry.select(c)?;
                        return self.write(&format!("{} selected\n\r", device.name));
                    }
                    Err(e) => {
                        debug!("{}", e);
                        self.write("ERROR: Device not found!\n\r\n\r")?;
                    }
                },
            }
        }
    }

    fn confirm_privileged(&mut self, device: &Device) -> Result<bool> {
        warn!("{} is shared with firmware", device.name);
        self.write("WARNING: This may not be a good idea...\n\r")?;
        self.write(&format!("Select {} anyway?[Y/N] ", device.name))?;
        self.terminal.read_yes_no()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{BusEvent, MockBus};
    use crate::bus::LoopbackBus;
    use crate::terminal::script::ScriptedTerminal;
    use crate::terminal::TerminalError;

    fn run_with(bus: &mut dyn BusController, config: SessionConfig, lines: &[&str]) -> ScriptedTerminal {
        let mut term = ScriptedTerminal::new(lines);
        run_interactive_session(bus, &mut term, config).unwrap();
        assert_eq!(term.remaining(), 0, "unconsumed input");
        term
    }

    fn run(bus: &mut dyn BusController, lines: &[&str]) -> ScriptedTerminal {
        run_with(bus, SessionConfig::default(), lines)
    }

    fn transfers(bus: &MockBus) -> Vec<BusEvent> {
        bus.events
            .iter()
            .filter(|e| matches!(e, BusEvent::Transfer { .. }))
            .cloned()
            .collect()
    }

    #[test]
    fn quit_immediately() {
        let mut bus = MockBus::new();
        let term = run(&mut bus, &["q"]);

        assert_eq!(bus.events, [BusEvent::Configure(SpiMode::Mode0, 1_000_000)]);
        assert!(term.output.starts_with("\n\rWELCOME TO THE SPI TEST!\n\r\tCOMMANDS:\n\r"));
        assert!(term.output.ends_with("Leaving SPI Test Program\n\r"));
    }

    #[test]
    fn select_adc_and_read_single_byte() {
        let mut bus = MockBus::with_response(&[0x42]);
        let term = run(&mut bus, &["0", "3", "3", "2", "10", "y", "q", "q"]);

        assert_eq!(
            bus.transactions(),
            [
                BusEvent::Assert(3),
                BusEvent::Transfer {
                    tx: vec![0x10],
                    rx_len: 1
                },
                BusEvent::Deassert(3),
            ]
        );
        assert!(term.output.contains("ADC selected\n\r"));
        assert!(term.output.contains("Send read command \"0x10\" for 1 byte?[Y/N] "));
        assert!(term.output.contains("Read Data is \"0x42\"\n\r"));
    }

    #[test]
    fn declined_write_is_sent_once() {
        let mut bus = MockBus::new();
        let term = run(
            &mut bus,
            &[
                "2", "3", "20", "01", "02", "03", "04", "n", "20", "01", "02", "03", "04", "y",
                "q", "q",
            ],
        );

        assert_eq!(
            transfers(&bus),
            [BusEvent::Transfer {
                tx: vec![0x20, 0x01, 0x02, 0x03, 0x04],
                rx_len: 1
            }]
        );
        assert_eq!(bus.count(|e| matches!(e, BusEvent::Assert(1))), 1);
        assert_eq!(
            term.output
                .matches("Send write command \"0x20\" and values \"0x01\" \"0x02\" \"0x03\" \"0x04\"?[Y/N] ")
                .count(),
            2
        );
        assert!(term.output.contains("\tEnter Value for byte 0 (MSB):\n\r"));
        assert!(term.output.contains("\tEnter Value for byte 3:\n\r"));
    }

    #[test]
    fn custom_count_out_of_range_is_reprompted() {
        let mut bus = MockBus::new();
        let config = SessionConfig {
            max_custom_count: 8,
            ..SessionConfig::default()
        };
        let term = run_with(
            &mut bus,
            config,
            &["2", "4", "0", "9", "2", "aa", "01", "02", "y", "q", "q"],
        );

        assert!(term.output.contains("ERROR! byte count 0 out of range 1-8\n\r"));
        assert!(term.output.contains("ERROR! byte count 9 out of range 1-8\n\r"));
        assert_eq!(
            transfers(&bus),
            [BusEvent::Transfer {
                tx: vec![0xAA, 0x01, 0x02],
                rx_len: 1
            }]
        );
    }

    #[test]
    fn zero_count_never_reaches_the_bus() {
        let mut bus = MockBus::new();
        let mut term = ScriptedTerminal::new(&["3", "4", "0"]);
        let err = run_interactive_session(&mut bus, &mut term, SessionConfig::default())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TerminalError>(),
            Some(TerminalError::Closed)
        ));
        assert!(term.output.contains("ERROR! byte count 0 out of range 1-999\n\r"));
        assert!(bus.transactions().is_empty());
    }

    #[test]
    fn maximum_custom_read_is_reported_in_full() {
        let mut bus = MockBus::with_response(&[0x5A]);
        let term = run(&mut bus, &["3", "4", "999", "10", "y", "q", "q"]);

        assert_eq!(
            transfers(&bus),
            [BusEvent::Transfer {
                tx: vec![0x10],
                rx_len: 999
            }]
        );
        assert_eq!(term.output.matches("\"0x5A\"").count(), 999);
    }

    #[test]
    fn maximum_custom_write_is_one_transfer() {
        let max = usize::from(SessionConfig::default().max_custom_count);
        let count = max.to_string();

        let mut lines = vec!["2", "4", count.as_str(), "20"];
        lines.extend(std::iter::repeat("a5").take(max));
        lines.extend(["y", "q", "q"]);

        let mut bus = MockBus::new();
        let term = run(&mut bus, &lines);

        let sent = transfers(&bus);
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            BusEvent::Transfer { tx, rx_len } => {
                assert_eq!(tx.len(), max + 1);
                assert_eq!(tx[0], 0x20);
                assert!(tx[1..].iter().all(|&b| b == 0xA5));
                assert_eq!(*rx_len, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(term.output.contains("Data has been sent!"));
    }

    #[test]
    fn oversized_count_is_a_range_error() {
        let mut bus = MockBus::new();
        let term = run(&mut bus, &["3", "4", "1000", "12345", "2", "10", "y", "q", "q"]);

        assert!(term.output.contains("ERROR! byte count 1000 out of range 1-999\n\r"));
        assert!(term.output.contains("ERROR! byte count 12345 out of range 1-999\n\r"));
        assert!(!term.output.contains("Invalid decimal value"));
        assert_eq!(
            transfers(&bus),
            [BusEvent::Transfer {
                tx: vec![0x10],
                rx_len: 2
            }]
        );
    }

    #[test]
    fn invalid_commands_are_reported() {
        let mut bus = MockBus::new();
        let term = run(&mut bus, &["x", "4", "2", "9", "q", "q"]);

        assert_eq!(term.output.matches("ERROR! Invalid Command!\n\r").count(), 3);
        assert!(bus.transactions().is_empty());
    }

    #[test]
    fn unknown_device_keeps_selection() {
        let mut bus = MockBus::new();
        let mut term = ScriptedTerminal::new(&["0", "9", "x", "q", "1", "q"]);
        let mut session = Session::new(&mut bus, &mut term, SessionConfig::default()).unwrap();
        session.run().unwrap();

        assert_eq!(session.state().registry.current().id, DeviceId::ExternalSpi0);
        drop(session);

        assert_eq!(term.output.matches("ERROR: Device not found!").count(), 2);
        assert!(term.output.contains("Device not changed.\n\r"));
        assert!(term.output.contains("\tCURRENT DEVICE: EXTERNAL_SPI_0\n\r"));
    }

    #[test]
    fn device_flow_helpers() {
        let mut bus = MockBus::new();
        let term = run(&mut bus, &["0", "h", "d", "5", "1", "q"]);

        assert_eq!(term.output.matches("\t-(5) ACCELEROMETER\n\r").count(), 2);
        assert!(term.output.contains("ACCELEROMETER selected\n\r"));
        assert!(term.output.contains("\tCURRENT DEVICE: ACCELEROMETER\n\r"));
    }

    #[test]
    fn privileged_device_needs_confirmation() {
        let mut bus = MockBus::new();
        let mut term = ScriptedTerminal::new(&["0", "0", "n", "1", "0", "0", "y", "q"]);
        let mut session = Session::new(&mut bus, &mut term, SessionConfig::default()).unwrap();
        session.run().unwrap();

        assert_eq!(session.state().registry.current().id, DeviceId::Fram);
        drop(session);

        assert_eq!(
            term.output
                .matches("WARNING: This may not be a good idea...\n\r")
                .count(),
            2
        );
        assert!(term.output.contains("\tCURRENT DEVICE: EXTERNAL_SPI_0\n\r"));
        assert!(term.output.contains("FRAM selected\n\r"));
    }

    #[test]
    fn bus_failure_is_not_fatal() {
        let mut bus = MockBus::new();
        bus.fail_transfer = true;
        let term = run(&mut bus, &["3", "2", "10", "y", "1", "q", "q"]);

        assert!(term
            .output
            .contains("ERROR! Transaction failed: transaction with EXTERNAL_SPI_0 failed: injected transfer fault"));
        assert!(term.output.contains("\tCURRENT DEVICE: EXTERNAL_SPI_0\n\r"));
        assert_eq!(bus.events.last(), Some(&BusEvent::Deassert(1)));
    }

    #[test]
    fn failed_transfer_and_release_keeps_session() {
        let mut bus = MockBus::new();
        bus.fail_transfer = true;
        bus.fail_deassert = true;
        let term = run(&mut bus, &["3", "2", "10", "y", "2", "", "y", "q", "q"]);

        assert_eq!(
            term.output
                .matches("ERROR! Transaction failed: transaction with EXTERNAL_SPI_0 failed: injected transfer fault\n\r")
                .count(),
            2
        );
        assert!(!term.output.contains("injected deassert fault"));
        assert_eq!(bus.count(|e| matches!(e, BusEvent::Deassert(1))), 2);
        assert!(term.output.ends_with("Leaving SPI Test Program\n\r"));
    }

    #[test]
    fn command_byte_is_remembered() {
        let mut bus = MockBus::new();
        let term = run(
            &mut bus,
            &["2", "2", "3c", "55", "y", "2", "", "66", "y", "q", "q"],
        );

        assert_eq!(
            transfers(&bus),
            [
                BusEvent::Transfer {
                    tx: vec![0x3C, 0x55],
                    rx_len: 1
                },
                BusEvent::Transfer {
                    tx: vec![0x3C, 0x66],
                    rx_len: 1
                },
            ]
        );
        assert!(term.output.contains("\tEnter Write Command [0x3C]: "));
    }

    #[test]
    fn menu_levels() {
        let mut bus = MockBus::new();
        let mut term = ScriptedTerminal::new(&[]);
        let mut session = Session::new(&mut bus, &mut term, SessionConfig::default()).unwrap();

        session.step('2').unwrap();
        assert_eq!(session.menu(), Menu::Write);
        session.step('3').unwrap_err();
        assert_eq!(session.menu(), Menu::Write);

        session.step('q').unwrap();
        assert_eq!(session.menu(), Menu::Top);
        assert!(!session.state().quit_requested);

        session.step('3').unwrap();
        assert_eq!(session.menu(), Menu::Read);
        session.step('q').unwrap();
        session.step('q').unwrap();
        assert!(session.state().quit_requested);
    }

    #[test]
    fn loopback_round_trip() {
        let mut bus = LoopbackBus::new();
        let term = run(
            &mut bus,
            &[
                "2", "3", "40", "de", "ad", "be", "ef", "y", "q", "3", "3", "40", "y", "q", "q",
            ],
        );

        assert!(term.output.contains("Response was \"0xEF\"\n\r"));
        assert!(term
            .output
            .contains("Read Data is \"0xDE\" \"0xAD\" \"0xBE\" \"0xEF\"\n\r"));
    }

    #[test]
    fn count_limit_is_validated() {
        let mut bus = MockBus::new();
        let mut term = ScriptedTerminal::new(&[]);
        for limit in [0, 1000] {
            let config = SessionConfig {
                max_custom_count: limit,
                ..SessionConfig::default()
            };
            assert!(Session::new(&mut bus, &mut term, config).is_err());
        }
    }
}
