use common::asm::{ByteReg, NUM_REGS, Reg, RegId, Size};
use common::constants::{ADDR_MASK, MEM_SIZE, SP_INIT};
use common::mem::read_u16;

use std::fmt;

use delegate::delegate;
use log::trace;

// FLAGS word, 8086 bit positions.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(u16);

impl Status {
    pub const CARRY_SHIFT: u16 = 0;
    pub const PARITY_SHIFT: u16 = 2;
    pub const ZERO_SHIFT: u16 = 6;
    pub const SIGN_SHIFT: u16 = 7;
    pub const OVERFLOW_SHIFT: u16 = 11;

    pub const C: u16 = 0x1 << Self::CARRY_SHIFT;
    pub const P: u16 = 0x1 << Self::PARITY_SHIFT;
    pub const Z: u16 = 0x1 << Self::ZERO_SHIFT;
    pub const S: u16 = 0x1 << Self::SIGN_SHIFT;
    pub const O: u16 = 0x1 << Self::OVERFLOW_SHIFT;

    const FLAGS_MASK: u16 = Self::C | Self::P | Self::Z | Self::S | Self::O;

    pub fn new() -> Status {
        Default::default()
    }

    pub fn to_raw(&self) -> u16 {
        self.0
    }

    pub fn set_flags(&mut self, bits: u16) {
        assert_eq!(bits & !Self::FLAGS_MASK, 0);
        self.0 |= bits;
    }

    pub fn clear_flags(&mut self, bits: u16) {
        assert_eq!(bits & !Self::FLAGS_MASK, 0);
        self.0 &= !bits;
    }

    fn get(&self, shift: u16) -> bool {
        (self.0 >> shift) & 0x1 != 0
    }

    fn set(&mut self, shift: u16, val: bool) {
        self.0 &= !(1u16 << shift);
        self.0 |= (val as u16) << shift;
    }

    pub fn get_carry(&self) -> bool {
        self.get(Self::CARRY_SHIFT)
    }

    pub fn set_carry(&mut self, val: bool) {
        self.set(Self::CARRY_SHIFT, val)
    }

    pub fn get_parity(&self) -> bool {
        self.get(Self::PARITY_SHIFT)
    }

    pub fn set_parity(&mut self, val: bool) {
        self.set(Self::PARITY_SHIFT, val)
    }

    pub fn get_zero(&self) -> bool {
        self.get(Self::ZERO_SHIFT)
    }

    pub fn set_zero(&mut self, val: bool) {
        self.set(Self::ZERO_SHIFT, val)
    }

    pub fn get_sign(&self) -> bool {
        self.get(Self::SIGN_SHIFT)
    }

    pub fn set_sign(&mut self, val: bool) {
        self.set(Self::SIGN_SHIFT, val)
    }

    pub fn get_overflow(&self) -> bool {
        self.get(Self::OVERFLOW_SHIFT)
    }

    pub fn set_overflow(&mut self, val: bool) {
        self.set(Self::OVERFLOW_SHIFT, val)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Flat 1 MiB store. Every address wraps to 20 bits.
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Memory { data: vec![0; MEM_SIZE] }
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn read_byte(&self, addr: u32) -> u8 {
        self.data[(addr & ADDR_MASK) as usize]
    }

    pub fn write_byte(&mut self, addr: u32, val: u8) {
        let addr = addr & ADDR_MASK;
        trace!("Mem: writing {val:02X} to {addr:05X} (byte)");
        self.data[addr as usize] = val;
    }

    // No alignment requirement; the high byte may wrap to address 0.
    pub fn read_word(&self, addr: u32) -> u16 {
        read_u16(self.read_byte(addr), self.read_byte(addr.wrapping_add(1)))
    }

    pub fn write_word(&mut self, addr: u32, val: u16) {
        self.write_byte(addr, val as u8);
        self.write_byte(addr.wrapping_add(1), (val >> 8) as u8);
    }

    pub fn load(&mut self, addr: u32, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_byte(addr.wrapping_add(i as u32), *byte);
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////

// The 8-bit halves aren't stored; they're always computed from their owner.
pub struct Registers {
    regs: [u16; NUM_REGS],
    status: Status,
}

impl Registers {
    pub fn new() -> Self {
        let mut regs = Registers { regs: [0; NUM_REGS], status: Status::new() };
        regs.regs[Reg::SP.index()] = SP_INIT;
        regs
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn reg_read_word(&self, reg: Reg) -> u16 {
        self.regs[reg.index()]
    }

    pub fn reg_write_word(&mut self, reg: Reg, val: u16) {
        trace!("Reg: writing {val:04X} to {reg}");
        self.regs[reg.index()] = val;
    }

    pub fn reg_read_byte(&self, reg: ByteReg) -> u8 {
        let word = self.reg_read_word(reg.owner());
        if reg.is_high() { (word >> 8) as u8 } else { word as u8 }
    }

    pub fn reg_write_byte(&mut self, reg: ByteReg, val: u8) {
        trace!("Reg: writing {val:02X} to {reg}");
        let old = self.reg_read_word(reg.owner());
        let new = if reg.is_high() {
            (old & 0x00ff) | ((val as u16) << 8)
        } else {
            (old & 0xff00) | val as u16
        };
        self.regs[reg.owner().index()] = new;
    }

    pub fn read(&self, reg: RegId) -> u32 {
        match reg {
            RegId::Word(r) => self.reg_read_word(r) as u32,
            RegId::Byte(r) => self.reg_read_byte(r) as u32,
        }
    }

    // Masks to the register's width.
    pub fn write(&mut self, reg: RegId, val: u32) {
        match reg {
            RegId::Word(r) => self.reg_write_word(r, val as u16),
            RegId::Byte(r) => self.reg_write_byte(r, val as u8),
        }
    }

    /// ZF, SF and PF from `raw` masked to `size`. CF and OF are left to the
    /// caller.
    pub fn update_flags(&mut self, raw: u32, size: Size) {
        let res = raw & size.mask();
        self.status.set_zero(res == 0);
        self.status.set_sign(size.sign_bit(res) != 0);
        self.status.set_parity((res as u8).count_ones() % 2 == 0);
    }

    pub fn get_status(&self) -> &Status {
        &self.status
    }

    pub fn get_status_mut(&mut self) -> &mut Status {
        &mut self.status
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            regs: self.regs,
            cf: self.status.get_carry(),
            zf: self.status.get_zero(),
            sf: self.status.get_sign(),
            of: self.status.get_overflow(),
            pf: self.status.get_parity(),
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub regs: [u16; NUM_REGS],
    pub cf: bool,
    pub zf: bool,
    pub sf: bool,
    pub of: bool,
    pub pf: bool,
}

impl Snapshot {
    pub fn reg(&self, reg: Reg) -> u16 {
        self.regs[reg.index()]
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for reg in Reg::ALL {
            write!(f, "{reg}={:04X} ", self.reg(reg))?;
        }
        write!(
            f,
            " CF={} ZF={} SF={} OF={} PF={}",
            self.cf as u8, self.zf as u8, self.sf as u8, self.of as u8, self.pf as u8
        )
    }
}

////////////////////////////////////////////////////////////////////////////////

pub struct EmulatorState {
    num_ins: usize,
    mem: Memory,
    regs: Registers,
}

impl EmulatorState {
    pub fn new() -> Self {
        EmulatorState {
            num_ins: 0usize,
            mem: Memory::new(),
            regs: Registers::new(),
        }
    }

    pub fn inc_ins(&mut self) {
        self.num_ins += 1;
    }

    pub fn num_ins(&self) -> usize {
        self.num_ins
    }

    delegate! {
        to self.mem {
            #[call(read_byte)]
            pub fn mem_read_byte(&self, addr: u32) -> u8;
            #[call(write_byte)]
            pub fn mem_write_byte(&mut self, addr: u32, val: u8);
            #[call(read_word)]
            pub fn mem_read_word(&self, addr: u32) -> u16;
            #[call(write_word)]
            pub fn mem_write_word(&mut self, addr: u32, val: u16);
            #[call(clear)]
            pub fn mem_clear(&mut self);
            #[call(load)]
            pub fn mem_load(&mut self, addr: u32, data: &[u8]);
        }

        to self.regs {
            pub fn reg_read_word(&self, reg: Reg) -> u16;
            pub fn reg_write_word(&mut self, reg: Reg, val: u16);
            pub fn reg_read_byte(&self, reg: ByteReg) -> u8;
            pub fn reg_write_byte(&mut self, reg: ByteReg, val: u8);
            #[call(read)]
            pub fn reg_read(&self, reg: RegId) -> u32;
            #[call(write)]
            pub fn reg_write(&mut self, reg: RegId, val: u32);
            pub fn update_flags(&mut self, raw: u32, size: Size);
            pub fn get_status(&self) -> &Status;
            pub fn get_status_mut(&mut self) -> &mut Status;
            pub fn snapshot(&self) -> Snapshot;
        }
    }

    // Memory survives; only the CPU side goes back to power-on.
    pub fn reset_regs(&mut self) {
        self.regs.reset();
        self.num_ins = 0;
    }
}

impl Default for EmulatorState {
    fn default() -> Self {
        Self::new()
    }
}
