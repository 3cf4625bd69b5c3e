//! Instruction encoders.
//!
//! Each mnemonic accepts a closed set of operand shapes. [`encode`] is one
//! match over `(mnemonic, operands)`; anything that falls through to the
//! default arm is an unsupported combination.
//!
//! Register to register forms get a single canonical opcode pair per
//! operation and width. The executor runs the parsed [`Instruction`], never
//! these bytes, so they only matter for the listing.
//!
//! [`Instruction`]: common::asm::Instruction

use common::asm::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub opcode: Vec<u8>,
    pub len: u16,
    pub imm: Option<Imm>,
}

impl Encoding {
    fn new(opcode: &[u8]) -> Encoding {
        Encoding { opcode: opcode.to_vec(), len: opcode.len() as u16, imm: None }
    }

    fn with_imm(opcode: &[u8], imm: u16, size: Size) -> Encoding {
        Encoding {
            opcode: opcode.to_vec(),
            len: opcode.len() as u16 + size.bytes(),
            imm: Some(Imm::Val(imm as u32)),
        }
    }

    fn branch(opcode: u8, target: &Operand) -> Option<Encoding> {
        let imm = match target {
            Operand::Label(lbl) => Imm::Label(lbl.clone()),
            Operand::Addr(addr) => Imm::Val(*addr),
            _ => return None,
        };
        Some(Encoding { opcode: vec![opcode], len: 2, imm: Some(imm) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    Unsupported,
    ShiftCount(u16),
    ImmWidth(u16, Size),
}

////////////////////////////////////////////////////////////////////////////////

fn w(size: Size) -> u8 {
    (size == Size::Word) as u8
}

fn modrm_reg(ext: u8, rm: u8) -> u8 {
    0xc0 | (ext << 3) | rm
}

fn modrm_indirect(reg: u8, ptr: Reg) -> u8 {
    let rm = if ptr == Reg::DI { 0b101 } else { 0b100 };
    (reg << 3) | rm
}

// The two-operand ALU group share a layout: `base | w` is r/m,reg,
// `base | 2 | w` is reg,r/m, `base | 4 | w` is acc,imm and `/ext` of 80/81 is
// r/m,imm.
struct Alu {
    base: u8,
    rr_modrm: u8,
    mem: bool,
}

impl Alu {
    fn ext(&self) -> u8 {
        self.base >> 3
    }
}

fn alu(mnemonic: Mnemonic) -> Option<Alu> {
    use Mnemonic::*;
    let (base, rr_modrm, mem) = match mnemonic {
        Add => (0x00, 0xd8, true),
        Or => (0x08, 0xd8, false),
        Adc => (0x10, 0xc0, false),
        Sbb => (0x18, 0xc0, false),
        And => (0x20, 0xd8, false),
        Sub => (0x28, 0xd8, true),
        Xor => (0x30, 0xc0, false),
        Cmp => (0x38, 0xc0, true),
        _ => return None,
    };
    Some(Alu { base, rr_modrm, mem })
}

// F6/F7 group.
fn unary_ext(mnemonic: Mnemonic) -> Option<u8> {
    use Mnemonic::*;
    Some(match mnemonic {
        Not => 2,
        Neg => 3,
        Mul => 4,
        Div => 6,
        _ => return None,
    })
}

fn branch_opcode(mnemonic: Mnemonic) -> Option<u8> {
    use Mnemonic::*;
    Some(match mnemonic {
        Jmp => 0xeb,
        Jz => 0x74,
        Jnz => 0x75,
        Jb | Jc => 0x72,
        Jnb | Jnc => 0x73,
        Jna => 0x76,
        Ja => 0x77,
        Jl => 0x7c,
        Jge | Jnl => 0x7d,
        Jle => 0x7e,
        Jg => 0x7f,
        Loop => 0xe2,
        _ => return None,
    })
}

fn check_width(imm: u16, size: Size) -> Result<(), EncodeError> {
    if size.fits(imm) { Ok(()) } else { Err(EncodeError::ImmWidth(imm, size)) }
}

fn encode_mov(ops: &[Operand]) -> Result<Encoding, EncodeError> {
    use Operand::*;
    Ok(match ops {
        [Reg(dst), Imm(imm)] => {
            check_width(*imm, dst.size())?;
            match dst {
                RegId::Byte(r) => Encoding::with_imm(&[0xb0 | r.code()], *imm, Size::Byte),
                RegId::Word(_) => Encoding::with_imm(&[0xb8 | dst.code()], *imm, Size::Word),
            }
        }
        [Reg(dst), Indirect(ptr)] => {
            Encoding::new(&[0x8a | w(dst.size()), modrm_indirect(dst.code(), *ptr)])
        }
        [Indirect(ptr), Reg(src)] => {
            Encoding::new(&[0x88 | w(src.size()), modrm_indirect(src.code(), *ptr)])
        }
        [Reg(dst), Reg(src)] if dst.size() == src.size() => {
            Encoding::new(&[0x88 | w(dst.size()), 0xc0])
        }
        _ => return Err(EncodeError::Unsupported),
    })
}

fn encode_alu(alu: Alu, ops: &[Operand]) -> Result<Encoding, EncodeError> {
    use Operand::*;
    Ok(match ops {
        [Reg(dst), Imm(imm)] => {
            let size = dst.size();
            check_width(*imm, size)?;
            if dst.is_accumulator() {
                Encoding::with_imm(&[alu.base | 0x04 | w(size)], *imm, size)
            } else {
                Encoding::with_imm(&[0x80 | w(size), modrm_reg(alu.ext(), dst.code())], *imm, size)
            }
        }
        [Reg(dst), Indirect(ptr)] if alu.mem => {
            Encoding::new(&[alu.base | 0x02 | w(dst.size()), modrm_indirect(dst.code(), *ptr)])
        }
        [Reg(dst), Reg(src)] if dst.size() == src.size() => {
            Encoding::new(&[alu.base | w(dst.size()), alu.rr_modrm])
        }
        _ => return Err(EncodeError::Unsupported),
    })
}

fn encode_inc_dec(dec: bool, ops: &[Operand]) -> Result<Encoding, EncodeError> {
    let ext = dec as u8;
    Ok(match ops {
        [Operand::Reg(r @ RegId::Word(_))] => Encoding::new(&[0x40 | (ext << 3) | r.code()]),
        [Operand::Reg(r @ RegId::Byte(_))] => Encoding::new(&[0xfe, modrm_reg(ext, r.code())]),
        _ => return Err(EncodeError::Unsupported),
    })
}

fn encode_shift(ext: u8, ops: &[Operand]) -> Result<Encoding, EncodeError> {
    Ok(match ops {
        [Operand::Reg(r), Operand::Imm(1)] => {
            Encoding::new(&[0xd0 | w(r.size()), modrm_reg(ext, r.code())])
        }
        [Operand::Reg(_), Operand::Imm(count)] => return Err(EncodeError::ShiftCount(*count)),
        _ => return Err(EncodeError::Unsupported),
    })
}

pub fn encode(mnemonic: Mnemonic, ops: &[Operand]) -> Result<Encoding, EncodeError> {
    use Mnemonic::*;

    if let Some(alu) = alu(mnemonic) {
        return encode_alu(alu, ops);
    }

    if let Some(ext) = unary_ext(mnemonic) {
        return match ops {
            [Operand::Reg(r)] => Ok(Encoding::new(&[0xf6 | w(r.size()), modrm_reg(ext, r.code())])),
            _ => Err(EncodeError::Unsupported),
        };
    }

    if let Some(opcode) = branch_opcode(mnemonic) {
        return match ops {
            [target] => Encoding::branch(opcode, target).ok_or(EncodeError::Unsupported),
            _ => Err(EncodeError::Unsupported),
        };
    }

    match (mnemonic, ops) {
        (Mov, _) => encode_mov(ops),
        (Inc, _) => encode_inc_dec(false, ops),
        (Dec, _) => encode_inc_dec(true, ops),
        (Shl, _) => encode_shift(4, ops),
        (Shr, _) => encode_shift(5, ops),
        (Clc, []) => Ok(Encoding::new(&[0xf8])),
        (Hlt, []) => Ok(Encoding::new(&[0xf4])),
        (Nop, []) => Ok(Encoding::new(&[0x90])),
        _ => Err(EncodeError::Unsupported),
    }
}
