use crate::misc::{is_ident, parse_operand, parse_target, AsmError};

use common::asm::*;

pub const COMMENT_CHAR: char = ';';
pub const LABEL_SUFFIX: char = ':';

#[derive(Debug)]
pub struct Cmd {
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
}

impl Cmd {
    pub fn operand_text(&self) -> String {
        self.operands
            .iter()
            .map(|op| op.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug)]
pub struct Stmt {
    pub label_def: Option<String>,
    pub cmd: Option<Cmd>,
    pub text: String, // Comment and surrounding whitespace removed
}

impl Stmt {
    pub fn is_empty(&self) -> bool {
        self.label_def.is_none() && self.cmd.is_none()
    }

    pub fn parse(line: &str, line_num: usize) -> Result<Stmt, AsmError> {
        let text = line.split(COMMENT_CHAR).next().unwrap_or_default().trim();
        let mut stmt = Stmt { label_def: None, cmd: None, text: text.to_string() };

        let mut rest = text;
        if let Some((label, after)) = text.split_once(LABEL_SUFFIX) {
            let label = label.trim();
            if !is_ident(label) {
                return Err(AsmError::Syntax { line: line_num, msg: format!("Bad label {label}") });
            }
            stmt.label_def = Some(label.to_ascii_uppercase());
            rest = after.trim();
        }

        if rest.is_empty() {
            return Ok(stmt);
        }

        let (mnemonic, operands) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let Ok(mnemonic) = mnemonic.parse::<Mnemonic>() else {
            return Err(AsmError::UnknownMnemonic {
                line: line_num,
                mnemonic: mnemonic.to_ascii_uppercase(),
            });
        };

        let operands: String = operands.chars().filter(|c| !c.is_whitespace()).collect();
        let operands = if operands.is_empty() {
            vec![]
        } else {
            operands
                .split(',')
                .map(|op| {
                    if op.is_empty() {
                        return Err(format!("Malformed operand list {operands}"));
                    }
                    if mnemonic.is_branch() { parse_target(op) } else { parse_operand(op) }
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(|msg| AsmError::Syntax { line: line_num, msg })?
        };

        stmt.cmd = Some(Cmd { mnemonic, operands });
        Ok(stmt)
    }
}
