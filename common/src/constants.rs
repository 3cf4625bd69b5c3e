pub const MEM_SIZE: usize = 1 << 20; // Bytes
pub const ADDR_MASK: u32 = (MEM_SIZE as u32) - 1;

pub const DEFAULT_ORIGIN: u32 = 0x1000;
pub const SP_INIT: u16 = 0xfffe;

// Free-running cap, so a program that never halts still returns.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

pub const REL8_MIN: i64 = i8::MIN as i64;
pub const REL8_MAX: i64 = i8::MAX as i64;
