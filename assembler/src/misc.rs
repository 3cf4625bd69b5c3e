use common::asm::*;
use common::constants::ADDR_MASK;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AsmError {
    #[error("Line {line}: Unknown instruction {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("Line {line}: Unsupported {mnemonic} {operands}")]
    UnsupportedOperands { line: usize, mnemonic: Mnemonic, operands: String },

    #[error("Line {line}: {msg}")]
    Syntax { line: usize, msg: String },

    #[error("Line {line}: Label {label} already defined on line {prev_line}")]
    DuplicateLabel { line: usize, label: String, prev_line: usize },

    #[error("Line {line}: Undefined label: {label}")]
    UnresolvedLabel { line: usize, label: String },

    #[error("Jump at {addr:04X} to {target:04X} too far ({offset} bytes)")]
    Range { addr: u32, target: u32, offset: i64 },
}

impl AsmError {
    pub fn line(&self) -> Option<usize> {
        use AsmError::*;
        match self {
            UnknownMnemonic { line, .. }
            | UnsupportedOperands { line, .. }
            | Syntax { line, .. }
            | DuplicateLabel { line, .. }
            | UnresolvedLabel { line, .. } => Some(*line),
            Range { .. } => None,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            AsmError::UnknownMnemonic { .. }
                | AsmError::UnsupportedOperands { .. }
                | AsmError::Syntax { .. }
                | AsmError::DuplicateLabel { .. }
        )
    }
}

////////////////////////////////////////////////////////////////////////////////

// Hex, with an optional 0x prefix and optional leading minus (two's
// complement). Returns the unmasked magnitude so callers can range check.
pub fn parse_hex(s: &str) -> Option<u32> {
    let neg = s.starts_with('-');
    let s = &s[neg as usize..];
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let val = u32::from_str_radix(s, 16).ok()?;
    if neg {
        if val > 0x8000 {
            return None;
        }
        return Some((!val).wrapping_add(1) & 0xffff);
    }
    Some(val)
}

pub fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '.')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

// Data operand: register, [SI]/[DI] or a 16-bit hex immediate.
pub fn parse_operand(text: &str) -> Result<Operand, String> {
    let text = text.to_ascii_uppercase();

    if let Some(inner) = text.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return match inner {
            "SI" => Ok(Operand::Indirect(Reg::SI)),
            "DI" => Ok(Operand::Indirect(Reg::DI)),
            _ => Err(format!("Unsupported addressing mode {text}")),
        };
    }

    if let Ok(reg) = text.parse::<RegId>() {
        return Ok(Operand::Reg(reg));
    }

    if let Some(val) = parse_hex(&text) {
        return u16::try_from(val)
            .map(Operand::Imm)
            .map_err(|_| format!("Immediate {text} does not fit in 16 bits"));
    }

    if is_ident(&text) {
        return Ok(Operand::Label(text));
    }

    Err(format!("Bad operand {text}"))
}

// Branch operand: a name is a label (possibly still forward), a number is an
// absolute 20-bit address.
pub fn parse_target(text: &str) -> Result<Operand, String> {
    let text = text.to_ascii_uppercase();
    if is_ident(&text) {
        return Ok(Operand::Label(text));
    }
    match parse_hex(&text) {
        Some(val) if !text.starts_with('-') => Ok(Operand::Addr(val & ADDR_MASK)),
        _ => Err(format!("Bad jump target {text}")),
    }
}
