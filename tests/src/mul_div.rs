use as_lib::assemble;
use emu_lib::{Emulator, ExecError};
use common::asm::Reg;
use common::constants::{DEFAULT_MAX_STEPS, DEFAULT_ORIGIN};
use crate::flags::{check_flags, C, P, S, Z};

fn setup(asm: &str, regs: &[(Reg, u16)], flags_init: u16) -> Emulator {
    let prog = assemble(asm, DEFAULT_ORIGIN).unwrap();
    let mut emu = Emulator::new();
    emu.load(&prog);
    for (reg, val) in regs {
        emu.get_state_mut().reg_write_word(*reg, *val);
    }
    emu.get_state_mut().get_status_mut().set_flags(flags_init);
    emu
}

fn run(asm: &str, regs: &[(Reg, u16)], flags_init: u16) -> Emulator {
    let mut emu = setup(asm, regs, flags_init);
    emu.run_at(DEFAULT_ORIGIN, DEFAULT_MAX_STEPS).unwrap();
    emu
}

fn reg(emu: &Emulator, reg: Reg) -> u16 {
    emu.get_state().reg_read_word(reg)
}


#[test]
fn mul_byte() {
    let emu = run("mul bl\nhlt", &[(Reg::AX, 0xff10), (Reg::BX, 0x0010)], 0);
    assert_eq!(reg(&emu, Reg::AX), 0x0100);
    check_flags(&emu, P);

    let emu = run("mul bh\nhlt", &[(Reg::AX, 0x00ff), (Reg::BX, 0xff00)], 0);
    assert_eq!(reg(&emu, Reg::AX), 0xfe01);
    check_flags(&emu, S);
}

#[test]
fn mul_word() {
    let emu = run("mul bx\nhlt", &[(Reg::AX, 0xffff), (Reg::BX, 0xffff), (Reg::DX, 0x1234)], 0);
    assert_eq!(reg(&emu, Reg::AX), 0x0001);
    assert_eq!(reg(&emu, Reg::DX), 0xfffe);
    check_flags(&emu, S);

    let emu = run("mul cx\nhlt", &[(Reg::AX, 0), (Reg::CX, 0x1234), (Reg::DX, 0x5555)], 0);
    assert_eq!(reg(&emu, Reg::AX), 0);
    assert_eq!(reg(&emu, Reg::DX), 0);
    check_flags(&emu, Z | P);
}

#[test]
fn mul_keeps_carry() {
    let emu = run("mul cl\nhlt", &[(Reg::AX, 2), (Reg::CX, 3)], C);
    assert_eq!(reg(&emu, Reg::AX), 6);
    check_flags(&emu, C | P);
}

#[test]
fn div_byte() {
    // 100 / 7 = 14 r 2
    let emu = run("div bl\nhlt", &[(Reg::AX, 0x0064), (Reg::BX, 0x0007)], 0);
    assert_eq!(reg(&emu, Reg::AX), 0x020e);
    check_flags(&emu, 0);
}

#[test]
fn div_word() {
    let emu = run("div cx\nhlt", &[(Reg::DX, 0x0001), (Reg::AX, 0x0000), (Reg::CX, 0x0010)], 0);
    assert_eq!(reg(&emu, Reg::AX), 0x1000);
    assert_eq!(reg(&emu, Reg::DX), 0);

    let emu = run("div bx\nhlt", &[(Reg::DX, 0), (Reg::AX, 0xffff), (Reg::BX, 0x0100)], 0);
    assert_eq!(reg(&emu, Reg::AX), 0x00ff);
    assert_eq!(reg(&emu, Reg::DX), 0x00ff);
}

#[test]
fn div_keeps_flags() {
    let emu = run("div bl\nhlt", &[(Reg::AX, 9), (Reg::BX, 3)], C | Z | S);
    assert_eq!(reg(&emu, Reg::AX), 3);
    check_flags(&emu, C | Z | S);
}

#[test]
fn div_by_zero() {
    for asm in ["div bl\nhlt", "div bx\nhlt"] {
        let mut emu = setup(asm, &[(Reg::AX, 0x1234), (Reg::DX, 0x5678), (Reg::BX, 0)], 0);
        let err = emu.run_at(DEFAULT_ORIGIN, DEFAULT_MAX_STEPS).unwrap_err();
        assert_eq!(err, ExecError::DivideByZero { addr: DEFAULT_ORIGIN });
        assert_eq!(reg(&emu, Reg::AX), 0x1234);
        assert_eq!(reg(&emu, Reg::DX), 0x5678);
        assert_eq!(reg(&emu, Reg::IP), DEFAULT_ORIGIN as u16);
        assert!(!emu.is_halted());
    }
}

#[test]
fn div_overflow() {
    let mut emu = setup("div bl\nhlt", &[(Reg::AX, 0x1000), (Reg::BX, 0x0001)], 0);
    let err = emu.run_at(DEFAULT_ORIGIN, DEFAULT_MAX_STEPS).unwrap_err();
    assert_eq!(err, ExecError::DivideOverflow { addr: DEFAULT_ORIGIN, quotient: 0x1000 });
    assert_eq!(reg(&emu, Reg::AX), 0x1000);

    let mut emu = setup("div bx\nhlt", &[(Reg::DX, 1), (Reg::AX, 0), (Reg::BX, 1)], 0);
    let err = emu.run_at(DEFAULT_ORIGIN, DEFAULT_MAX_STEPS).unwrap_err();
    assert!(matches!(err, ExecError::DivideOverflow { quotient: 0x10000, .. }));
    assert_eq!(reg(&emu, Reg::DX), 1);
    assert_eq!(reg(&emu, Reg::AX), 0);
}
