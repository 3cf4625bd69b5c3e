use crate::asm::Instruction;

use std::collections::HashMap;
use std::fmt;

/// One line of the final listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub addr: u32,
    pub bytes: Vec<u8>,
    pub line: String,
}

impl fmt::Display for Assembled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{:04X}  {:<12}{}", self.addr, bytes, self.line)
    }
}

/// A fully assembled program: resolved instructions in address order, the
/// range-checked bytes for each, and the label table they were resolved
/// against.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub origin: u32,
    pub instructions: Vec<Instruction>,
    pub listing: Vec<Assembled>,
    pub labels: HashMap<String, u32>,
}

impl Program {
    /// All bytes, in address order.
    pub fn text(&self) -> Vec<u8> {
        self.listing.iter().flat_map(|a| a.bytes.iter().copied()).collect()
    }
}
