
use crate::mem::WriteU16;

use std::fmt;
use std::str::FromStr;

use num_derive::ToPrimitive;
use num_traits::ToPrimitive;
use derive_more::Unwrap;


////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Byte,
    Word,
    Dword, // Only for flags on MUL results
}

impl Size {
    pub fn bytes(self) -> u16 {
        match self {
            Size::Byte => 1,
            Size::Word => 2,
            Size::Dword => 4,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    pub fn mask(self) -> u32 {
        match self {
            Size::Byte => 0xff,
            Size::Word => 0xffff,
            Size::Dword => 0xffff_ffff,
        }
    }

    pub fn sign_bit(self, val: u32) -> u32 {
        (val >> (self.bits() - 1)) & 0x1
    }

    // Whether an immediate (already wrapped to 16 bits) is representable.
    pub fn fits(self, val: u16) -> bool {
        match self {
            Size::Byte => val <= 0xff || val >= 0xff80,
            Size::Word | Size::Dword => true,
        }
    }
}


////////////////////////////////////////////////////////////////////////////////


// Discriminant is the index into the register file.
#[derive(Debug, Clone, Copy, ToPrimitive, PartialEq, Eq, Hash)]
pub enum Reg {
    AX = 0,
    BX,
    CX,
    DX,
    SI,
    DI,
    IP,
    SP,
}

pub const NUM_REGS: usize = 8;

impl Reg {
    pub const ALL: [Reg; NUM_REGS] = [
        Reg::AX, Reg::BX, Reg::CX, Reg::DX,
        Reg::SI, Reg::DI, Reg::IP, Reg::SP,
    ];

    pub fn index(self) -> usize {
        self.to_usize().unwrap()
    }

    // ModRM register field. IP can't be named by an instruction.
    pub fn code(self) -> Option<u8> {
        Some(match self {
            Reg::AX => 0,
            Reg::CX => 1,
            Reg::DX => 2,
            Reg::BX => 3,
            Reg::SP => 4,
            Reg::SI => 6,
            Reg::DI => 7,
            Reg::IP => return None,
        })
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}


// Discriminant is the ModRM register field.
#[derive(Debug, Clone, Copy, ToPrimitive, PartialEq, Eq, Hash)]
pub enum ByteReg {
    AL = 0,
    CL,
    DL,
    BL,
    AH,
    CH,
    DH,
    BH,
}

impl ByteReg {
    pub fn code(self) -> u8 {
        self.to_u8().unwrap()
    }

    pub fn owner(self) -> Reg {
        match self {
            ByteReg::AL | ByteReg::AH => Reg::AX,
            ByteReg::BL | ByteReg::BH => Reg::BX,
            ByteReg::CL | ByteReg::CH => Reg::CX,
            ByteReg::DL | ByteReg::DH => Reg::DX,
        }
    }

    pub fn is_high(self) -> bool {
        self.code() & 0b100 != 0
    }
}

impl fmt::Display for ByteReg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegId {
    Word(Reg),
    Byte(ByteReg),
}

impl RegId {
    pub fn size(self) -> Size {
        match self {
            RegId::Word(_) => Size::Word,
            RegId::Byte(_) => Size::Byte,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            RegId::Word(r) => r.code().unwrap_or(0),
            RegId::Byte(r) => r.code(),
        }
    }

    pub fn is_accumulator(self) -> bool {
        matches!(self, RegId::Word(Reg::AX) | RegId::Byte(ByteReg::AL))
    }
}

impl FromStr for RegId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        use RegId::*;
        Ok(match s.to_ascii_uppercase().as_str() {
            "AX" => Word(Reg::AX),
            "BX" => Word(Reg::BX),
            "CX" => Word(Reg::CX),
            "DX" => Word(Reg::DX),
            "SI" => Word(Reg::SI),
            "DI" => Word(Reg::DI),
            "SP" => Word(Reg::SP),
            "AL" => Byte(ByteReg::AL),
            "AH" => Byte(ByteReg::AH),
            "BL" => Byte(ByteReg::BL),
            "BH" => Byte(ByteReg::BH),
            "CL" => Byte(ByteReg::CL),
            "CH" => Byte(ByteReg::CH),
            "DL" => Byte(ByteReg::DL),
            "DH" => Byte(ByteReg::DH),
            _ => return Err(()),
        })
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegId::Word(r) => write!(f, "{r}"),
            RegId::Byte(r) => write!(f, "{r}"),
        }
    }
}


////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(RegId),
    Indirect(Reg), // SI or DI only
    Imm(u16),
    Addr(u32), // Numeric branch target, already masked to 20 bits
    Label(String), // Anything else that looks like a name; only legal as a branch target
}

impl Operand {
    pub fn size(&self) -> Option<Size> {
        match self {
            Operand::Reg(r) => Some(r.size()),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{r}"),
            Operand::Indirect(r) => write!(f, "[{r}]"),
            Operand::Imm(val) => write!(f, "{val:X}"),
            Operand::Addr(addr) => write!(f, "{addr:X}"),
            Operand::Label(lbl) => write!(f, "{lbl}"),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Unwrap)]
pub enum Imm {
    Val(u32),
    Label(String), // Only before pass 2
}


////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Mov,
    Add,
    Sub,
    Adc,
    Sbb,
    Mul,
    Div,
    Inc,
    Dec,
    Cmp,
    Not,
    Neg,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Clc,
    Hlt,
    Nop,

    Jmp,
    Jz,
    Jnz,
    Jb,
    Jnb,
    Ja,
    Jna,
    Jg,
    Jl,
    Jge,
    Jle,
    Jc,
    Jnc,
    Jnl,
    Loop,
}

impl Mnemonic {
    pub fn is_branch(self) -> bool {
        use Mnemonic::*;
        matches!(
            self,
            Jmp | Jz | Jnz | Jb | Jnb | Ja | Jna | Jg | Jl | Jge | Jle | Jc | Jnc | Jnl | Loop
        )
    }
}

impl FromStr for Mnemonic {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        use Mnemonic::*;
        Ok(match s.to_ascii_uppercase().as_str() {
            "MOV" => Mov,
            "ADD" => Add,
            "SUB" => Sub,
            "ADC" => Adc,
            "SBB" => Sbb,
            "MUL" => Mul,
            "DIV" => Div,
            "INC" => Inc,
            "DEC" => Dec,
            "CMP" => Cmp,
            "NOT" => Not,
            "NEG" => Neg,
            "AND" => And,
            "OR" => Or,
            "XOR" => Xor,
            "SHL" => Shl,
            "SHR" => Shr,
            "CLC" => Clc,
            "HLT" => Hlt,
            "NOP" => Nop,
            "JMP" => Jmp,
            "JZ" => Jz,
            "JNZ" => Jnz,
            "JB" => Jb,
            "JNB" => Jnb,
            "JA" => Ja,
            "JNA" => Jna,
            "JG" => Jg,
            "JL" => Jl,
            "JGE" => Jge,
            "JLE" => Jle,
            "JC" => Jc,
            "JNC" => Jnc,
            "JNL" => Jnl,
            "LOOP" => Loop,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_uppercase())
    }
}


////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, Clone)]
pub struct Instruction {
    pub addr: u32,
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
    pub len: u16,
    pub opcode: Vec<u8>,
    pub imm: Option<Imm>,
    pub line: String,
    pub line_num: usize,
}

impl Instruction {
    pub fn operand_text(&self) -> String {
        self.operands
            .iter()
            .map(|op| op.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn next_addr(&self) -> u32 {
        self.addr + self.len as u32
    }

    // Resolved branch destination, if any.
    pub fn target(&self) -> Option<u32> {
        match &self.imm {
            Some(Imm::Val(val)) if self.mnemonic.is_branch() => Some(*val),
            _ => None,
        }
    }

    // The rel8 displacement for a branch, unchecked.
    pub fn displacement(&self) -> Option<i64> {
        self.target().map(|dst| dst as i64 - self.next_addr() as i64)
    }

    // Opcode followed by the immediate or displacement. Returns None if the
    // immediate is unresolved. Range is the caller's problem.
    pub fn emit(&self, buf: &mut Vec<u8>) -> Option<()> {
        buf.extend(&self.opcode);
        let Some(imm) = &self.imm else {
            return Some(());
        };
        let Imm::Val(val) = imm else {
            return None;
        };

        if self.mnemonic.is_branch() {
            buf.push(self.displacement()? as u8);
            return Some(());
        }

        match self.len as usize - self.opcode.len() {
            0 => (),
            1 => buf.push(*val as u8),
            _ => buf.write_u16(*val as u16),
        }
        Some(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(f, "{}\t{}", self.mnemonic, self.operand_text())
        }
    }
}
