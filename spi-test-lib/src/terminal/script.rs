use super::{Terminal, TerminalError};

use anyhow::Result;
use std::collections::VecDeque;

/// Replays queued input lines and captures everything written.
pub struct ScriptedTerminal {
    input: VecDeque<String>,
    pub output: String,
}

impl ScriptedTerminal {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            input: lines.iter().map(|s| s.to_string()).collect(),
            output: String::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }
}

impl Terminal for ScriptedTerminal {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.output.push_str(text);
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        self.input
            .pop_front()
            .ok_or_else(|| TerminalError::Closed.into())
    }
}
