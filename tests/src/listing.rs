use as_lib::assemble;
use common::constants::DEFAULT_ORIGIN;

const MIXED: &str = r#"
    ; every shape the assembler knows
start:
    mov ax,1234
    mov al,12
    mov bx,cx
    mov si,4000
    mov [si],ax
    mov dl,[si]
    add ax,0001
    add bx,0001
    add bl,01
    add ax,[si]
    sub cx,dx
    adc dx,5
    sbb al,bl
    cmp bx,[di]
    and ax,00ff
    or cl,80
    xor ax,ax
    inc ax
    dec bl
    not dx
    neg cl
    mul bx
    div bl
    shl ax,1
    shr bl,1
    clc
    nop
    jz start
    jnz start
    jb start
    jnb start
    ja start
    jna start
    jg start
    jl start
    jge start
    jle start
    jc start
    jnc start
    jnl start
    loop start
    jmp start
    hlt
"#;

#[test]
fn contiguous() {
    let prog = assemble(MIXED, 0x3000).unwrap();
    let mut next = 0x3000;
    for line in &prog.listing {
        assert_eq!(line.addr, next, "{line}");
        next += line.bytes.len() as u32;
    }
    let total: usize = prog.instructions.iter().map(|i| i.len as usize).sum();
    assert_eq!(prog.text().len(), total);
    assert_eq!(next - 0x3000, total as u32);
    for (ins, line) in prog.instructions.iter().zip(&prog.listing) {
        assert_eq!(ins.len as usize, line.bytes.len(), "{}", ins.line);
    }
}

#[test]
fn every_line_listed() {
    let prog = assemble(MIXED, DEFAULT_ORIGIN).unwrap();
    let code_lines = MIXED
        .lines()
        .map(|l| l.split(';').next().unwrap().trim())
        .filter(|l| !l.is_empty() && !l.ends_with(':'))
        .count();
    assert_eq!(prog.listing.len(), code_lines);
    assert_eq!(prog.listing[0].line, "mov ax,1234");
    assert_eq!(prog.listing.last().unwrap().bytes, [0xf4]);
}

#[test]
fn listing_format() {
    let prog = assemble("mov ax,1234\nhlt", DEFAULT_ORIGIN).unwrap();
    let lines: Vec<String> = prog.listing.iter().map(|l| l.to_string()).collect();
    assert!(lines[0].starts_with("1000  B8 34 12"), "{}", lines[0]);
    assert!(lines[0].ends_with("mov ax,1234"));
    assert!(lines[1].starts_with("1003  F4"));
}

fn check(asm: &str, bytes: &[u8]) {
    assert_eq!(assemble(asm, DEFAULT_ORIGIN).unwrap().text(), bytes, "{asm}");
}

#[test]
fn encodings() {
    check("mov ax,1234", &[0xb8, 0x34, 0x12]);
    check("mov cl,7f", &[0xb1, 0x7f]);
    check("mov [di],bx", &[0x89, 0x1d]);
    check("mov al,[si]", &[0x8a, 0x04]);
    check("add ax,0010", &[0x05, 0x10, 0x00]);
    check("add al,10", &[0x04, 0x10]);
    check("add bx,0010", &[0x81, 0xc3, 0x10, 0x00]);
    check("cmp bl,10", &[0x80, 0xfb, 0x10]);
    check("sub ax,[si]", &[0x2b, 0x04]);
    check("inc cx", &[0x41]);
    check("dec di", &[0x4f]);
    check("inc al", &[0xfe, 0xc0]);
    check("mul bx", &[0xf7, 0xe3]);
    check("div cl", &[0xf6, 0xf1]);
    check("not ax", &[0xf7, 0xd0]);
    check("neg dx", &[0xf7, 0xda]);
    check("shl ax,1", &[0xd1, 0xe0]);
    check("shr bl,1", &[0xd0, 0xeb]);
    check("clc", &[0xf8]);
    check("nop", &[0x90]);
}

#[test]
fn labels_table() {
    let prog = assemble(r#"
        first: nop
        second:
        third:
            hlt
    "#, 0x2000).unwrap();
    assert_eq!(prog.labels.len(), 3);
    assert_eq!(prog.labels["FIRST"], 0x2000);
    assert_eq!(prog.labels["SECOND"], 0x2001);
    assert_eq!(prog.labels["THIRD"], 0x2001);
}
