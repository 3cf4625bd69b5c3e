
use std::collections::{HashMap, HashSet};

use crate::encode::{encode, EncodeError};
use crate::ir::*;
use crate::misc::{parse_hex, AsmError};
use common::asm::*;
use common::constants::{ADDR_MASK, REL8_MAX, REL8_MIN};
use common::program::{Assembled, Program};

use log::{debug, trace, warn};

pub fn assemble(prog: &str, origin: u32) -> Result<Program, AsmError> {
    Assembler::new(origin).assemble(prog)
}

#[derive(Debug, Clone)]
struct SymbolValue {
    val: u32,
    line: usize,
}

impl SymbolValue {
    fn new(val: u32, line: usize) -> SymbolValue {
        Self{val, line}
    }
}

struct Assembler {
    origin: u32,
    instructions: Vec<Instruction>,
    symbols: HashMap<String, SymbolValue>,
    referenced: HashSet<String>,
}


impl Assembler {

    fn new(origin: u32) -> Assembler {
        Assembler{
            origin,
            instructions: Vec::new(),
            symbols: HashMap::new(),
            referenced: HashSet::new(),
        }
    }

    fn define_label(&mut self, label: String, addr: u32, line: usize) -> Result<(), AsmError> {
        if let Some(existing) = self.symbols.get(&label) {
            return Err(AsmError::DuplicateLabel { line, label, prev_line: existing.line });
        }
        trace!("Label \"{label}\" at {addr:04X}");
        self.symbols.insert(label, SymbolValue::new(addr, line));
        Ok(())
    }

    // Pass 1: lay out addresses, collect labels, encode everything but branch
    // targets.
    fn layout(&mut self, prog: &str) -> Result<(), AsmError> {
        let mut addr = self.origin;
        for (text, line) in prog.lines().zip(1..) {
            let stmt = Stmt::parse(text, line)?;
            if stmt.is_empty() {
                continue;
            }

            if let Some(label) = stmt.label_def {
                self.define_label(label, addr, line)?;
            }

            let Some(cmd) = stmt.cmd else {
                continue;
            };

            let enc = encode(cmd.mnemonic, &cmd.operands).map_err(|e| match e {
                EncodeError::Unsupported => AsmError::UnsupportedOperands {
                    line,
                    mnemonic: cmd.mnemonic,
                    operands: cmd.operand_text(),
                },
                EncodeError::ShiftCount(count) => AsmError::Syntax {
                    line,
                    msg: format!("{} only supports shift by 1, got {count:X}", cmd.mnemonic),
                },
                EncodeError::ImmWidth(imm, size) => AsmError::Syntax {
                    line,
                    msg: format!("Immediate {imm:X} does not fit in {} bits", size.bits()),
                },
            })?;

            self.instructions.push(Instruction {
                addr,
                mnemonic: cmd.mnemonic,
                operands: cmd.operands,
                len: enc.len,
                opcode: enc.opcode,
                imm: enc.imm,
                line: stmt.text,
                line_num: line,
            });
            addr += enc.len as u32;
        }
        Ok(())
    }

    // Pass 2: branch targets that are still names.
    fn resolve_labels(&mut self) -> Result<(), AsmError> {
        for ins in self.instructions.iter_mut() {
            if !ins.mnemonic.is_branch() {
                continue;
            }
            let Some(Imm::Label(label)) = &ins.imm else {
                continue;
            };

            let val = if let Some(sym) = self.symbols.get(label) {
                self.referenced.insert(label.clone());
                sym.val
            } else if let Some(val) = parse_hex(label) {
                val & ADDR_MASK
            } else {
                return Err(AsmError::UnresolvedLabel { line: ins.line_num, label: label.clone() });
            };
            trace!("Resolving \"{label}\" to {val:04X} at {:04X}", ins.addr);
            ins.imm = Some(Imm::Val(val));
        }

        for (label, sym) in &self.symbols {
            if !self.referenced.contains(label) {
                warn!("Label \"{label}\" on line {} is never used", sym.line);
            }
        }
        Ok(())
    }

    // Final bytes. Displacements can only be checked now that every address
    // is known.
    fn codegen(&self) -> Result<Vec<Assembled>, AsmError> {
        let mut listing = Vec::with_capacity(self.instructions.len());
        for ins in &self.instructions {
            if let (Some(target), Some(offset)) = (ins.target(), ins.displacement()) {
                if !(REL8_MIN..=REL8_MAX).contains(&offset) {
                    return Err(AsmError::Range { addr: ins.addr, target, offset });
                }
            }

            let mut bytes = Vec::with_capacity(ins.len as usize);
            if ins.emit(&mut bytes).is_none() {
                // resolve_labels() leaves no names behind.
                let label = ins.imm.clone().map(|imm| imm.unwrap_label()).unwrap_or_default();
                return Err(AsmError::UnresolvedLabel { line: ins.line_num, label });
            }
            debug_assert_eq!(bytes.len(), ins.len as usize);
            listing.push(Assembled { addr: ins.addr, bytes, line: ins.line.clone() });
        }
        Ok(listing)
    }

    fn assemble(mut self, prog: &str) -> Result<Program, AsmError> {
        self.layout(prog)?;
        self.resolve_labels()?;
        let listing = self.codegen()?;

        debug!(
            "Assembled {} instructions ({} bytes) at {:04X}",
            self.instructions.len(),
            listing.iter().map(|a| a.bytes.len()).sum::<usize>(),
            self.origin,
        );

        Ok(Program {
            origin: self.origin,
            instructions: self.instructions,
            listing,
            labels: self.symbols.into_iter().map(|(k, v)| (k, v.val)).collect(),
        })
    }
}
