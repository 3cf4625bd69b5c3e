
use std::sync::Arc;

use common::asm::*;
use common::program::Program;
use crate::EmulatorState;
use crate::emulator_state::Snapshot;

use log::{debug, trace};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("Divide by zero at {addr:04X}")]
    DivideByZero { addr: u32 },

    #[error("Divide overflow at {addr:04X}: quotient {quotient:X} does not fit")]
    DivideOverflow { addr: u32, quotient: u32 },

    #[error("Invalid jump address {target:04X} at {addr:04X}")]
    InvalidJumpTarget { addr: u32, target: u32 },

    #[error("No instruction at address {0:04X}")]
    NoInstructionAt(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub addr: u32,
    pub line: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub trace: Vec<Trace>,
    pub steps: usize,
    pub halted: bool,
    pub max_steps_reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecRet {
    Ok,
    Jump(usize), // Index into the program, not an address
    Halt,
}

#[derive(Debug, Clone, Copy)]
enum ResolvedOperand {
    Reg(RegId),
    Mem(u32),
}


pub struct Emulator {
    state: EmulatorState,
    program: Arc<[Instruction]>,
    idx: usize,
    halted: bool,
}

impl Emulator {
    pub fn new() -> Emulator {
        Emulator {
            state: EmulatorState::new(),
            program: Arc::new([]),
            idx: 0,
            halted: false,
        }
    }

    // Replaces the instruction list and copies the encoded bytes into memory.
    // IP moves to the origin; the other registers are left alone.
    pub fn load(&mut self, prog: &Program) {
        for assembled in &prog.listing {
            self.state.mem_load(assembled.addr, &assembled.bytes);
        }
        self.program = Arc::from(prog.instructions.as_slice());
        self.idx = 0;
        self.halted = false;
        self.state.reg_write_word(Reg::IP, prog.origin as u16);
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    // Index of the next instruction to run.
    pub fn pc(&self) -> usize {
        self.idx
    }

    pub fn is_done(&self) -> bool {
        self.halted || self.idx >= self.program.len()
    }

    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    // Execute one instruction. Returns None if there was nothing to run. On
    // error nothing has been modified.
    pub fn step(&mut self) -> Result<Option<Trace>, ExecError> {
        if self.is_done() {
            return Ok(None);
        }

        let program = Arc::clone(&self.program);
        let ins = &program[self.idx];
        debug!("{:04X}: {}", ins.addr, ins.line);

        let ret = self.exec(ins)?;
        let next_ip = match ret {
            ExecRet::Ok => {
                self.idx += 1;
                ins.next_addr()
            }
            ExecRet::Jump(idx) => {
                self.idx = idx;
                self.program[idx].addr
            }
            ExecRet::Halt => {
                self.halted = true;
                ins.next_addr()
            }
        };
        self.state.reg_write_word(Reg::IP, next_ip as u16);
        self.state.inc_ins();

        Ok(Some(Trace { addr: ins.addr, line: ins.line.clone() }))
    }

    // Run until a halt, the end of the program, or max_steps instructions.
    pub fn run(&mut self, max_steps: usize) -> Result<RunSummary, ExecError> {
        let mut summary = RunSummary::default();
        while !self.is_done() {
            if summary.steps >= max_steps {
                summary.max_steps_reached = true;
                break;
            }
            let Some(trace) = self.step()? else {
                break;
            };
            summary.trace.push(trace);
            summary.steps += 1;
        }
        summary.halted = self.halted;
        debug!("Ran {} instructions (halted: {})", summary.steps, summary.halted);
        Ok(summary)
    }

    // Make the instruction at addr the next one to run, clearing any halt.
    pub fn seek(&mut self, addr: u32) -> Result<(), ExecError> {
        let Some(idx) = self.index_of(addr) else {
            return Err(ExecError::NoInstructionAt(addr));
        };
        self.idx = idx;
        self.halted = false;
        self.state.reg_write_word(Reg::IP, addr as u16);
        Ok(())
    }

    pub fn run_at(&mut self, addr: u32, max_steps: usize) -> Result<RunSummary, ExecError> {
        self.seek(addr)?;
        self.run(max_steps)
    }

    // Back to power-on registers, with no program. Memory is kept.
    pub fn reset(&mut self) {
        self.state.reset_regs();
        self.program = Arc::new([]);
        self.idx = 0;
        self.halted = false;
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    pub fn get_state(&self) -> &EmulatorState {
        &self.state
    }

    pub fn get_state_mut(&mut self) -> &mut EmulatorState {
        &mut self.state
    }

    pub fn mem_read_byte(&self, addr: u32) -> u8 {
        self.state.mem_read_byte(addr)
    }

    pub fn mem_write_byte(&mut self, addr: u32, val: u8) {
        self.state.mem_write_byte(addr, val)
    }

    pub fn mem_read_word(&self, addr: u32) -> u16 {
        self.state.mem_read_word(addr)
    }

    pub fn mem_write_word(&mut self, addr: u32, val: u16) {
        self.state.mem_write_word(addr, val)
    }

    pub fn mem_load(&mut self, addr: u32, data: &[u8]) {
        self.state.mem_load(addr, data)
    }

    pub fn mem_clear(&mut self) {
        self.state.mem_clear()
    }

    // Instructions executed since power-on or the last reset.
    pub fn num_ins(&self) -> usize {
        self.state.num_ins()
    }

    fn index_of(&self, addr: u32) -> Option<usize> {
        self.program.iter().position(|ins| ins.addr == addr)
    }


    ///////////////////////////////////////////////////////////////////////////
    // Operands
    ///////////////////////////////////////////////////////////////////////////

    fn resolve(&self, arg: &Operand) -> ResolvedOperand {
        match arg {
            Operand::Reg(r) => ResolvedOperand::Reg(*r),
            Operand::Indirect(ptr) => ResolvedOperand::Mem(self.state.reg_read_word(*ptr) as u32),
            _ => panic!("Operand {arg} is not a location"),
        }
    }

    fn read_resolved(&self, res: ResolvedOperand, size: Size) -> u32 {
        match (res, size) {
            (ResolvedOperand::Reg(r), _) => self.state.reg_read(r),
            (ResolvedOperand::Mem(addr), Size::Byte) => self.state.mem_read_byte(addr) as u32,
            (ResolvedOperand::Mem(addr), _) => self.state.mem_read_word(addr) as u32,
        }
    }

    fn write_resolved(&mut self, res: ResolvedOperand, val: u32, size: Size) {
        match (res, size) {
            (ResolvedOperand::Reg(r), _) => self.state.reg_write(r, val),
            (ResolvedOperand::Mem(addr), Size::Byte) => self.state.mem_write_byte(addr, val as u8),
            (ResolvedOperand::Mem(addr), _) => self.state.mem_write_word(addr, val as u16),
        }
    }

    // Source value, masked to size. Immediates were sign-wrapped to 16 bits by
    // the assembler, so masking gives the byte form.
    fn read_operand(&self, arg: &Operand, size: Size) -> u32 {
        match arg {
            Operand::Imm(val) => *val as u32 & size.mask(),
            _ => self.read_resolved(self.resolve(arg), size) & size.mask(),
        }
    }

    fn unwrap_single(ins: &Instruction) -> RegId {
        match ins.operands.as_slice() {
            [Operand::Reg(r)] => *r,
            _ => panic!("Malformed {} {}", ins.mnemonic, ins.operand_text()),
        }
    }

    fn unwrap_pair(ins: &Instruction) -> (&Operand, &Operand) {
        match ins.operands.as_slice() {
            [dst, src] => (dst, src),
            _ => panic!("Malformed {} {}", ins.mnemonic, ins.operand_text()),
        }
    }


    ///////////////////////////////////////////////////////////////////////////
    // Execute
    ///////////////////////////////////////////////////////////////////////////

    fn exec(&mut self, ins: &Instruction) -> Result<ExecRet, ExecError> {
        use Mnemonic::*;
        match ins.mnemonic {
            Mov => self.exec_mov(ins),
            Add | Adc | Sub | Sbb | Cmp => self.exec_arith(ins),
            And | Or | Xor => self.exec_logic(ins),
            Mul => self.exec_mul(ins),
            Div => return self.exec_div(ins),
            Inc | Dec | Not | Neg => self.exec_unary(ins),
            Shl | Shr => self.exec_shift(ins),
            Clc => self.state.get_status_mut().set_carry(false),
            Nop => (),
            Hlt => return Ok(ExecRet::Halt),
            Loop => return self.exec_loop(ins),
            Jmp | Jz | Jnz | Jb | Jnb | Ja | Jna | Jg | Jl | Jge | Jle | Jc | Jnc | Jnl => {
                return self.exec_branch(ins);
            }
        }
        Ok(ExecRet::Ok)
    }

    fn exec_mov(&mut self, ins: &Instruction) {
        let (dst, src) = Self::unwrap_pair(ins);
        let size = dst.size().or(src.size()).unwrap_or(Size::Word);
        let val = self.read_operand(src, size);
        let dst = self.resolve(dst);
        self.write_resolved(dst, val, size);
    }

    fn exec_arith(&mut self, ins: &Instruction) {
        let (dst, src) = Self::unwrap_pair(ins);
        let Operand::Reg(dst) = dst else {
            panic!("Malformed {} {}", ins.mnemonic, ins.operand_text());
        };
        let size = dst.size();
        let a = self.state.reg_read(*dst);
        let b = self.read_operand(src, size);
        let cf = self.state.get_status().get_carry() as u32;

        let (raw, carry) = match ins.mnemonic {
            Mnemonic::Add => (a + b, a + b > size.mask()),
            Mnemonic::Adc => (a + b + cf, a + b + cf > size.mask()),
            Mnemonic::Sub | Mnemonic::Cmp => (a.wrapping_sub(b), a < b),
            Mnemonic::Sbb => (a.wrapping_sub(b).wrapping_sub(cf), a < b + cf),
            _ => unreachable!(),
        };
        trace!("{} {a:X}, {b:X} -> {:X}", ins.mnemonic, raw & size.mask());

        if ins.mnemonic != Mnemonic::Cmp {
            self.state.reg_write(*dst, raw);
        }
        self.state.get_status_mut().set_carry(carry);
        self.state.update_flags(raw, size);
    }

    fn exec_logic(&mut self, ins: &Instruction) {
        let (dst, src) = Self::unwrap_pair(ins);
        let Operand::Reg(dst) = dst else {
            panic!("Malformed {} {}", ins.mnemonic, ins.operand_text());
        };
        let size = dst.size();
        let a = self.state.reg_read(*dst);
        let b = self.read_operand(src, size);

        let res = match ins.mnemonic {
            Mnemonic::And => a & b,
            Mnemonic::Or => a | b,
            Mnemonic::Xor => a ^ b,
            _ => unreachable!(),
        };
        self.state.reg_write(*dst, res);
        self.state.update_flags(res, size);

        // OR only touches ZF, SF and PF.
        if ins.mnemonic != Mnemonic::Or {
            let status = self.state.get_status_mut();
            status.set_carry(false);
            status.set_overflow(false);
        }
    }

    // Flags come from the full product; CF is left alone.
    fn exec_mul(&mut self, ins: &Instruction) {
        let src = Self::unwrap_single(ins);
        let val = self.state.reg_read(src);
        match src.size() {
            Size::Byte => {
                let prod = self.state.reg_read_byte(ByteReg::AL) as u32 * val;
                self.state.reg_write_word(Reg::AX, prod as u16);
                self.state.update_flags(prod, Size::Word);
            }
            _ => {
                let prod = self.state.reg_read_word(Reg::AX) as u32 * val;
                self.state.reg_write_word(Reg::AX, prod as u16);
                self.state.reg_write_word(Reg::DX, (prod >> 16) as u16);
                self.state.update_flags(prod, Size::Dword);
            }
        }
    }

    // Checks happen before any write.
    fn exec_div(&mut self, ins: &Instruction) -> Result<ExecRet, ExecError> {
        let src = Self::unwrap_single(ins);
        let divisor = self.state.reg_read(src);
        if divisor == 0 {
            return Err(ExecError::DivideByZero { addr: ins.addr });
        }

        match src.size() {
            Size::Byte => {
                let dividend = self.state.reg_read_word(Reg::AX) as u32;
                let (quot, rem) = (dividend / divisor, dividend % divisor);
                if quot > Size::Byte.mask() {
                    return Err(ExecError::DivideOverflow { addr: ins.addr, quotient: quot });
                }
                self.state.reg_write_byte(ByteReg::AL, quot as u8);
                self.state.reg_write_byte(ByteReg::AH, rem as u8);
            }
            _ => {
                let dividend = ((self.state.reg_read_word(Reg::DX) as u32) << 16)
                    | self.state.reg_read_word(Reg::AX) as u32;
                let (quot, rem) = (dividend / divisor, dividend % divisor);
                if quot > Size::Word.mask() {
                    return Err(ExecError::DivideOverflow { addr: ins.addr, quotient: quot });
                }
                self.state.reg_write_word(Reg::AX, quot as u16);
                self.state.reg_write_word(Reg::DX, rem as u16);
            }
        }
        Ok(ExecRet::Ok)
    }

    fn exec_unary(&mut self, ins: &Instruction) {
        let reg = Self::unwrap_single(ins);
        let size = reg.size();
        let val = self.state.reg_read(reg);

        let res = match ins.mnemonic {
            Mnemonic::Inc => val.wrapping_add(1),
            Mnemonic::Dec => val.wrapping_sub(1),
            Mnemonic::Not => !val,
            Mnemonic::Neg => {
                self.state.get_status_mut().set_carry(val != 0);
                0u32.wrapping_sub(val)
            }
            _ => unreachable!(),
        } & size.mask();

        self.state.reg_write(reg, res);
        self.state.update_flags(res, size);
    }

    fn exec_shift(&mut self, ins: &Instruction) {
        let (dst, _) = Self::unwrap_pair(ins);
        let Operand::Reg(reg) = dst else {
            panic!("Malformed {} {}", ins.mnemonic, ins.operand_text());
        };
        let size = reg.size();
        let val = self.state.reg_read(*reg);

        let (res, carry) = match ins.mnemonic {
            Mnemonic::Shl => ((val << 1) & size.mask(), size.sign_bit(val) != 0),
            Mnemonic::Shr => (val >> 1, val & 0x1 != 0),
            _ => unreachable!(),
        };
        self.state.reg_write(*reg, res);
        self.state.get_status_mut().set_carry(carry);
        self.state.update_flags(res, size);
    }

    fn branch_target(&self, ins: &Instruction) -> Result<usize, ExecError> {
        let Some(target) = ins.target() else {
            panic!("Unresolved branch {}", ins.line);
        };
        self.index_of(target)
            .ok_or(ExecError::InvalidJumpTarget { addr: ins.addr, target })
    }

    fn exec_branch(&mut self, ins: &Instruction) -> Result<ExecRet, ExecError> {
        use Mnemonic::*;
        let status = self.state.get_status();
        let (cf, zf, sf, of) = (
            status.get_carry(),
            status.get_zero(),
            status.get_sign(),
            status.get_overflow(),
        );

        let taken = match ins.mnemonic {
            Jmp => true,
            Jz => zf,
            Jnz => !zf,
            Jb | Jc => cf,
            Jnb | Jnc => !cf,
            Ja => !cf && !zf,
            Jna => cf || zf,
            Jg => !zf && sf == of,
            Jl => sf != of,
            Jge | Jnl => sf == of,
            Jle => zf || sf != of,
            _ => unreachable!(),
        };

        if !taken {
            return Ok(ExecRet::Ok);
        }
        Ok(ExecRet::Jump(self.branch_target(ins)?))
    }

    // Target is looked up before CX is touched.
    fn exec_loop(&mut self, ins: &Instruction) -> Result<ExecRet, ExecError> {
        let cx = self.state.reg_read_word(Reg::CX).wrapping_sub(1);
        let ret = if cx != 0 {
            ExecRet::Jump(self.branch_target(ins)?)
        } else {
            ExecRet::Ok
        };
        self.state.reg_write_word(Reg::CX, cx);
        Ok(ret)
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}
