#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Top,
    Write,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSize {
    Single,
    Quad,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ShowCommands,
    ShowDevices,
    Quit,
    ChangeDevice,
    ShowSelected,
    Enter(Menu),
    Write(PayloadSize),
    Read(PayloadSize),
    Invalid(char),
}

/// The dispatcher's transition table.
pub fn transition(menu: Menu, input: char) -> Action {
    match (menu, input) {
        (_, 'h') => Action::ShowCommands,
        (_, 'd') => Action::ShowDevices,
        (_, 'q') => Action::Quit,
        (_, '0') => Action::ChangeDevice,
        (_, '1') => Action::ShowSelected,
        (Menu::Top, '2') => Action::Enter(Menu::Write),
        (Menu::Top, '3') => Action::Enter(Menu::Read),
        (Menu::Write, '2') => Action::Write(PayloadSize::Single),
        (Menu::Write, '3') => Action::Write(PayloadSize::Quad),
        (Menu::Write, '4') => Action::Write(PayloadSize::Custom),
        (Menu::Read, '2') => Action::Read(PayloadSize::Single),
        (Menu::Read, '3') => Action::Read(PayloadSize::Quad),
        (Menu::Read, '4') => Action::Read(PayloadSize::Custom),
        (_, c) => Action::Invalid(c),
    }
}

impl Menu {
    pub fn parent(self) -> Option<Menu> {
        match self {
            Menu::Top => None,
            Menu::Write | Menu::Read => Some(Menu::Top),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Menu::Top => "SPI Test Program",
            Menu::Write => "\"Send Write Command\" tool",
            Menu::Read => "\"Send Read Command\" tool",
        }
    }

    /// Help listing, in display order.
    pub fn commands(self) -> &'static [(char, &'static str)] {
        match self {
            Menu::Top => &[
                ('0', "change selected device"),
                ('1', "display selected device"),
                ('2', "send write command"),
                ('3', "send read command"),
                ('h', "display these commands"),
                ('d', "display SPI device IDs"),
                ('q', "exit SPI Test Program"),
            ],
            Menu::Write => &[
                ('0', "change selected device"),
                ('1', "display selected device"),
                ('2', "write a single byte"),
                ('3', "write 4 bytes"),
                ('4', "write custom number of bytes"),
                ('h', "display these commands"),
                ('d', "display SPI device IDs"),
                ('q', "exit \"Send Write Command\" tool"),
            ],
            Menu::Read => &[
                ('0', "change selected device"),
                ('1', "display selected device"),
                ('2', "read a single byte"),
                ('3', "read 4 bytes"),
                ('4', "read custom number of bytes"),
                ('h', "display these commands"),
                ('d', "display SPI device IDs"),
                ('q', "exit \"Send Read Command\" tool"),
            ],
        }
    }
}

impl PayloadSize {
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            PayloadSize::Single => Some(1),
            PayloadSize::Quad => Some(4),
            PayloadSize::Custom => None,
        }
    }

    pub fn write_tool(self) -> &'static str {
        match self {
            PayloadSize::Single => "Send Single Byte",
            PayloadSize::Quad => "Send Quad Byte",
            PayloadSize::Custom => "Send Custom Byte",
        }
    }

    pub fn read_tool(self) -> &'static str {
        match self {
            PayloadSize::Single => "Read Single Byte",
            PayloadSize::Quad => "Read Quad Byte",
            PayloadSize::Custom => "Read Custom Byte",
        }
    }
}
