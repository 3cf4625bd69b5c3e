use as_lib::AsmError;
use common::asm::Reg;
use common::constants::{DEFAULT_MAX_STEPS, DEFAULT_ORIGIN};
use emu_lib::ExecError;
use interp::{Session, SessionError, StepResult};

const COUNTDOWN: &str = r#"
        mov cx,3
    top:
        dec cx
        jnz top
        hlt
"#;

#[test]
fn assemble_returns_listing() {
    let mut session = Session::new();
    let listing = session.assemble(COUNTDOWN, DEFAULT_ORIGIN).unwrap();
    let addrs: Vec<u32> = listing.iter().map(|l| l.addr).collect();
    assert_eq!(addrs, [0x1000, 0x1003, 0x1004, 0x1006]);
    assert_eq!(listing[2].bytes, [0x75, 0xfd]);
}

#[test]
fn run_to_halt() {
    let mut session = Session::new();
    session.assemble(COUNTDOWN, DEFAULT_ORIGIN).unwrap();
    let summary = session.run(None, DEFAULT_MAX_STEPS).unwrap();
    assert!(summary.halted);
    assert!(!summary.max_steps_reached);
    assert_eq!(summary.steps, 1 + 3 * 2 + 1);
    assert_eq!(summary.trace.last().unwrap().line, "hlt");
    assert_eq!(session.snapshot().reg(Reg::CX), 0);
}

#[test]
fn run_from_address() {
    let mut session = Session::new();
    session.assemble("mov ax,1\nmov bx,2\nhlt", 0x500).unwrap();
    session.run(Some(0x503), DEFAULT_MAX_STEPS).unwrap();
    assert_eq!(session.snapshot().reg(Reg::AX), 0);
    assert_eq!(session.snapshot().reg(Reg::BX), 2);

    let err = session.run(Some(0x504), DEFAULT_MAX_STEPS).unwrap_err();
    assert!(matches!(err, SessionError::Exec(ExecError::NoInstructionAt(0x504))));
}

#[test]
fn step_snapshots() {
    let mut session = Session::new();
    session.assemble(COUNTDOWN, DEFAULT_ORIGIN).unwrap();

    let mut cx = Vec::new();
    loop {
        match session.step().unwrap() {
            StepResult::Executed { trace, snapshot } => {
                if trace.line == "dec cx" {
                    cx.push(snapshot.reg(Reg::CX));
                }
            }
            StepResult::Halted(snapshot) => {
                assert_eq!(snapshot.reg(Reg::IP), 0x1007);
                break;
            }
        }
    }
    assert_eq!(cx, [2, 1, 0]);
}

#[test]
fn runaway_is_capped() {
    let mut session = Session::new();
    session.assemble("spin: jmp spin", DEFAULT_ORIGIN).unwrap();
    let summary = session.run(None, 250).unwrap();
    assert!(summary.max_steps_reached);
    assert_eq!(summary.steps, 250);
}

#[test]
fn errors() {
    let mut session = Session::new();
    assert!(matches!(session.step(), Err(SessionError::NoProgram)));

    let err = session.assemble("mov ax,1\njmp nowhere", DEFAULT_ORIGIN).unwrap_err();
    assert!(matches!(err, SessionError::Asm(AsmError::UnresolvedLabel { line: 2, .. })));
    assert!(session.program().is_none());
    assert!(matches!(session.run(None, 10), Err(SessionError::NoProgram)));

    session.assemble("mov bl,0\ndiv bl", DEFAULT_ORIGIN).unwrap();
    let err = session.run(None, DEFAULT_MAX_STEPS).unwrap_err();
    assert!(matches!(err, SessionError::Exec(ExecError::DivideByZero { addr: 0x1002 })));
    assert_eq!(err.to_string(), "Divide by zero at 1002");
}

#[test]
fn reset_keeps_memory() {
    let mut session = Session::new();
    session.assemble("mov si,2000\nmov ax,abcd\nmov [si],ax\nhlt", DEFAULT_ORIGIN).unwrap();
    session.run(None, DEFAULT_MAX_STEPS).unwrap();
    session.reset();

    let snap = session.snapshot();
    assert_eq!(snap.reg(Reg::AX), 0);
    assert_eq!(snap.reg(Reg::SP), 0xfffe);
    assert!(matches!(session.step(), Err(SessionError::NoProgram)));
    assert_eq!(session.mem_read_word(0x2000), 0xabcd);

    // A new program sees the leftovers.
    session.assemble("mov si,2000\nmov bx,[si]\nhlt", 0x3000).unwrap();
    session.run(None, DEFAULT_MAX_STEPS).unwrap();
    assert_eq!(session.snapshot().reg(Reg::BX), 0xabcd);
}

#[test]
fn independent_sessions() {
    let mut a = Session::new();
    let mut b = Session::new();
    a.assemble("mov ax,1111\nhlt", DEFAULT_ORIGIN).unwrap();
    b.assemble("mov ax,2222\nhlt", DEFAULT_ORIGIN).unwrap();
    a.run(None, DEFAULT_MAX_STEPS).unwrap();
    assert_eq!(a.snapshot().reg(Reg::AX), 0x1111);
    assert_eq!(b.snapshot().reg(Reg::AX), 0);
    b.run(None, DEFAULT_MAX_STEPS).unwrap();
    assert_eq!(b.snapshot().reg(Reg::AX), 0x2222);
    assert_eq!(a.snapshot().reg(Reg::AX), 0x1111);
}

#[test]
fn snapshot_display() {
    let mut session = Session::new();
    session.assemble("mov ax,8\nhlt", DEFAULT_ORIGIN).unwrap();
    session.run(None, DEFAULT_MAX_STEPS).unwrap();
    let text = session.snapshot().to_string();
    assert!(text.starts_with("AX=0008 BX=0000"), "{text}");
    assert!(text.contains("IP=1004"), "{text}");
    assert!(text.contains("SP=FFFE"), "{text}");
    assert!(text.ends_with("CF=0 ZF=0 SF=0 OF=0 PF=0"), "{text}");
}

#[test]
fn bulk_write_before_run() {
    let mut session = Session::new();
    session.mem_write_bytes(0x4000, &[0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0xf0, 0xff]);
    session.assemble(r#"
            mov si,4000
            mov cx,4
            mov ax,0
        sum:
            add ax,[si]
            inc si
            inc si
            loop sum
            hlt
    "#, DEFAULT_ORIGIN).unwrap();
    let summary = session.run(None, DEFAULT_MAX_STEPS).unwrap();
    assert!(summary.halted);
    assert_eq!(session.snapshot().reg(Reg::AX), 0xfff6);
    assert_eq!(session.num_ins(), summary.steps);

    // Writes wrap at the top of the 1 MiB space.
    session.mem_write_bytes(0xfffff, &[0xaa, 0xbb]);
    assert_eq!(session.mem_read_byte(0xfffff), 0xaa);
    assert_eq!(session.mem_read_byte(0), 0xbb);

    session.clear_memory();
    assert_eq!(session.mem_read_word(0x4000), 0);
    assert_eq!(session.mem_read_byte(0), 0);
}
