// The instruction set of the sharp LR35902: a 256 entry primary table and a
// 256 entry CB-prefixed table. Each entry is a decoded Op over the operand
// model; exec performs the effect and reports what it cost. A cycles of -1
// is the stop sentinel: either the decoder hit a hole in the table or an
// unconditional JR jumped to itself, which is how roms halt.
//
// If "flags affected" is not given for a family then none are.
use super::memory::Memory;
use super::ops::{self, Ctx, Operand, Ptr};
use super::register::{Flag, Reg, Register};
use lazy_static::lazy_static;
use std::fmt;

pub struct Instr {
    pub cycles: i32,
    pub step: u16,
    pub mnem: String,
}

impl Instr {
    fn new(cycles: u32, step: u16, mnem: String) -> Self {
        Self {
            cycles: cycles as i32,
            step,
            mnem,
        }
    }

    fn stop(mnem: String) -> Self {
        Self {
            cycles: -1,
            step: 0,
            mnem,
        }
    }
}

#[derive(Clone, Copy)]
pub enum Cond {
    NZ,
    Z,
    NC,
    C,
}

impl Cond {
    fn test(self, regs: &Register) -> bool {
        match self {
            Cond::NZ => !regs.get_flag(Flag::Z),
            Cond::Z => regs.get_flag(Flag::Z),
            Cond::NC => !regs.get_flag(Flag::C),
            Cond::C => regs.get_flag(Flag::C),
        }
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Cond::NZ => "NZ",
            Cond::Z => "Z",
            Cond::NC => "NC",
            Cond::C => "C",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Copy)]
enum Op {
    Unimplemented,
    Nop,
    Halt,
    Ld(Operand, Operand),
    Inc(Operand),
    Dec(Operand),
    Add(Operand),
    Adc(Operand),
    Sub(Operand),
    Sbc(Operand),
    And(Operand),
    Xor(Operand),
    Or(Operand),
    Cp(Operand),
    AddHl(Operand),
    AddSp,
    LdHlSp,
    LdSpHl,
    Jr(Option<Cond>),
    Jp(Option<Cond>),
    JpHl,
    Call(Option<Cond>),
    Ret(Option<Cond>),
    Reti,
    Push(Operand),
    Pop(Operand),
    Rst(u16),
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Di,
    Ei,
    Cb,
}

#[derive(Clone, Copy)]
enum CbKind {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
    Bit,
    Res,
    Set,
}

#[derive(Clone, Copy)]
struct CbOp {
    kind: CbKind,
    bit: u8,
    op: Operand,
}

// Operand decode for the low three bits of a CB code and for the rows of
// the LD/arithmetic blocks.
const REG_DECODE: [Operand; 8] = [
    ops::B,
    ops::C,
    ops::D,
    ops::E,
    ops::H,
    ops::L,
    ops::at(Reg::HL),
    ops::A,
];

const LDH_PTR: Operand = Operand::Mem {
    ptr: Ptr::Imm8,
    offset: 0xff00,
    dword: false,
};

const LDC_PTR: Operand = Operand::Mem {
    ptr: Ptr::Reg(Reg::C),
    offset: 0xff00,
    dword: false,
};

const AT_IMM16: Operand = Operand::Mem {
    ptr: Ptr::Imm16,
    offset: 0,
    dword: false,
};

const AT_IMM16_WORD: Operand = Operand::Mem {
    ptr: Ptr::Imm16,
    offset: 0,
    dword: true,
};

const AT_HLI: Operand = Operand::Mem {
    ptr: Ptr::IncReg(Reg::HL, 1),
    offset: 0,
    dword: false,
};

const AT_HLD: Operand = Operand::Mem {
    ptr: Ptr::IncReg(Reg::HL, -1),
    offset: 0,
    dword: false,
};

fn op_table() -> [Op; 256] {
    let mut t = [Op::Unimplemented; 256];
    t[0x00] = Op::Nop;
    t[0x07] = Op::Rlca;
    t[0x08] = Op::Ld(AT_IMM16_WORD, ops::SP);
    t[0x0f] = Op::Rrca;
    t[0x17] = Op::Rla;
    t[0x18] = Op::Jr(None);
    t[0x1f] = Op::Rra;
    t[0x27] = Op::Daa;
    t[0x2f] = Op::Cpl;
    t[0x37] = Op::Scf;
    t[0x3f] = Op::Ccf;
    t[0x76] = Op::Halt;
    t[0xc3] = Op::Jp(None);
    t[0xc9] = Op::Ret(None);
    t[0xcb] = Op::Cb;
    t[0xcd] = Op::Call(None);
    t[0xd9] = Op::Reti;
    t[0xe0] = Op::Ld(LDH_PTR, ops::A);
    t[0xe2] = Op::Ld(LDC_PTR, ops::A);
    t[0xe8] = Op::AddSp;
    t[0xe9] = Op::JpHl;
    t[0xea] = Op::Ld(AT_IMM16, ops::A);
    t[0xf0] = Op::Ld(ops::A, LDH_PTR);
    t[0xf2] = Op::Ld(ops::A, LDC_PTR);
    t[0xf3] = Op::Di;
    t[0xf8] = Op::LdHlSp;
    t[0xf9] = Op::LdSpHl;
    t[0xfa] = Op::Ld(ops::A, AT_IMM16);
    t[0xfb] = Op::Ei;

    for (i, r) in REG_DECODE.iter().enumerate() {
        t[0x04 + i * 8] = Op::Inc(*r);
        t[0x05 + i * 8] = Op::Dec(*r);
        t[0x06 + i * 8] = Op::Ld(*r, ops::IMM8);
        t[0x80 + i] = Op::Add(*r);
        t[0x88 + i] = Op::Adc(*r);
        t[0x90 + i] = Op::Sub(*r);
        t[0x98 + i] = Op::Sbc(*r);
        t[0xa0 + i] = Op::And(*r);
        t[0xa8 + i] = Op::Xor(*r);
        t[0xb0 + i] = Op::Or(*r);
        t[0xb8 + i] = Op::Cp(*r);
    }
    for (i, dst) in REG_DECODE.iter().enumerate() {
        for (j, src) in REG_DECODE.iter().enumerate() {
            let op = 0x40 + i * 8 + j;
            if op != 0x76 {
                t[op] = Op::Ld(*dst, *src);
            }
        }
    }
    for (i, r) in [ops::BC, ops::DE, ops::HL, ops::SP].iter().enumerate() {
        t[0x01 + i * 0x10] = Op::Ld(*r, ops::IMM16);
        t[0x03 + i * 0x10] = Op::Inc(*r);
        t[0x09 + i * 0x10] = Op::AddHl(*r);
        t[0x0b + i * 0x10] = Op::Dec(*r);
    }
    for (i, m) in [ops::at(Reg::BC), ops::at(Reg::DE), AT_HLI, AT_HLD].iter().enumerate() {
        t[0x02 + i * 0x10] = Op::Ld(*m, ops::A);
        t[0x0a + i * 0x10] = Op::Ld(ops::A, *m);
    }
    for (i, cc) in [Cond::NZ, Cond::Z, Cond::NC, Cond::C].iter().enumerate() {
        t[0x20 + i * 8] = Op::Jr(Some(*cc));
        t[0xc0 + i * 8] = Op::Ret(Some(*cc));
        t[0xc2 + i * 8] = Op::Jp(Some(*cc));
        t[0xc4 + i * 8] = Op::Call(Some(*cc));
    }
    for (i, r) in [ops::BC, ops::DE, ops::HL, ops::AF].iter().enumerate() {
        t[0xc1 + i * 0x10] = Op::Pop(*r);
        t[0xc5 + i * 0x10] = Op::Push(*r);
    }
    t[0xc6] = Op::Add(ops::IMM8);
    t[0xce] = Op::Adc(ops::IMM8);
    t[0xd6] = Op::Sub(ops::IMM8);
    t[0xde] = Op::Sbc(ops::IMM8);
    t[0xe6] = Op::And(ops::IMM8);
    t[0xee] = Op::Xor(ops::IMM8);
    t[0xf6] = Op::Or(ops::IMM8);
    t[0xfe] = Op::Cp(ops::IMM8);
    for i in 0..8 {
        t[0xc7 + i * 8] = Op::Rst((i * 8) as u16);
    }
    t
}

fn cb_table() -> [CbOp; 256] {
    const SHIFT: [CbKind; 8] = [
        CbKind::Rlc,
        CbKind::Rrc,
        CbKind::Rl,
        CbKind::Rr,
        CbKind::Sla,
        CbKind::Sra,
        CbKind::Swap,
        CbKind::Srl,
    ];
    let mut t = [CbOp {
        kind: CbKind::Rlc,
        bit: 0,
        op: ops::B,
    }; 256];
    for (i, entry) in t.iter_mut().enumerate() {
        let n = ((i >> 3) & 0x07) as u8;
        entry.op = REG_DECODE[i & 0x07];
        entry.bit = n;
        entry.kind = match i >> 6 {
            0 => SHIFT[usize::from(n)],
            1 => CbKind::Bit,
            2 => CbKind::Res,
            _ => CbKind::Set,
        };
    }
    t
}

lazy_static! {
    static ref OP_TABLE: [Op; 256] = op_table();
    static ref CB_TABLE: [CbOp; 256] = cb_table();
}

// Add n to A.
// Z - Set if result is zero. N - Reset.
// H - Set if carry from bit 3. C - Set if carry from bit 7.
fn alu_add(regs: &mut Register, n: u8) {
    let a = regs.a;
    let r = a.wrapping_add(n);
    regs.set_flag(Flag::C, u16::from(a) + u16::from(n) > 0xff);
    regs.set_flag(Flag::H, (a & 0x0f) + (n & 0x0f) > 0x0f);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    regs.a = r;
}

// Add n + carry flag to A. The incoming carry joins the nibble sum for H.
fn alu_adc(regs: &mut Register, n: u8) {
    let a = regs.a;
    let c = u8::from(regs.get_flag(Flag::C));
    let r = a.wrapping_add(n).wrapping_add(c);
    regs.set_flag(Flag::C, u16::from(a) + u16::from(n) + u16::from(c) > 0xff);
    regs.set_flag(Flag::H, (a & 0x0f) + (n & 0x0f) + c > 0x0f);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    regs.a = r;
}

// Subtract n from A.
// Z - Set if result is zero. N - Set.
// H - Set if borrow from bit 4. C - Set if borrow.
fn alu_sub(regs: &mut Register, n: u8) {
    let a = regs.a;
    let r = a.wrapping_sub(n);
    regs.set_flag(Flag::C, u16::from(a) < u16::from(n));
    regs.set_flag(Flag::H, (a & 0x0f) < (n & 0x0f));
    regs.set_flag(Flag::N, true);
    regs.set_flag(Flag::Z, r == 0x00);
    regs.a = r;
}

fn alu_sbc(regs: &mut Register, n: u8) {
    let a = regs.a;
    let c = u8::from(regs.get_flag(Flag::C));
    let r = a.wrapping_sub(n).wrapping_sub(c);
    regs.set_flag(Flag::C, u16::from(a) < u16::from(n) + u16::from(c));
    regs.set_flag(Flag::H, (a & 0x0f) < (n & 0x0f) + c);
    regs.set_flag(Flag::N, true);
    regs.set_flag(Flag::Z, r == 0x00);
    regs.a = r;
}

fn alu_and(regs: &mut Register, n: u8) {
    let r = regs.a & n;
    regs.set_flag(Flag::C, false);
    regs.set_flag(Flag::H, true);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    regs.a = r;
}

fn alu_xor(regs: &mut Register, n: u8) {
    let r = regs.a ^ n;
    regs.set_flag(Flag::C, false);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    regs.a = r;
}

fn alu_or(regs: &mut Register, n: u8) {
    let r = regs.a | n;
    regs.set_flag(Flag::C, false);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    regs.a = r;
}

// A - n with the result thrown away.
fn alu_cp(regs: &mut Register, n: u8) {
    let a = regs.a;
    alu_sub(regs, n);
    regs.a = a;
}

// Add n to HL.
// N - Reset. H - Set if carry from bit 11. C - Set if carry from bit 15.
// Z is not affected.
fn alu_add_hl(regs: &mut Register, n: u16) {
    let a = regs.get(Reg::HL);
    let r = a.wrapping_add(n);
    regs.set_flag(Flag::C, a > 0xffff - n);
    regs.set_flag(Flag::H, (a & 0x07ff) + (n & 0x07ff) > 0x07ff);
    regs.set_flag(Flag::N, false);
    regs.set(Reg::HL, r);
}

// SP plus a signed byte, shared by ADD SP and LD HL,SP+n. H and C come from
// the low byte addition; Z and N are cleared.
fn alu_sp_offset(regs: &mut Register, a: u16, d: u8) -> u16 {
    let b = i16::from(d as i8) as u16;
    regs.set_flag(Flag::C, (a & 0x00ff) + (b & 0x00ff) > 0x00ff);
    regs.set_flag(Flag::H, (a & 0x000f) + (b & 0x000f) > 0x000f);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, false);
    a.wrapping_add(b)
}

// Decimal adjust A after BCD arithmetic.
fn alu_daa(regs: &mut Register) {
    let mut a = regs.a;
    let n = regs.get_flag(Flag::N);
    let h = regs.get_flag(Flag::H);
    let mut c = regs.get_flag(Flag::C);
    if !n {
        if c || a > 0x99 {
            a = a.wrapping_add(0x60);
            c = true;
        }
        if h || a & 0x0f > 0x09 {
            a = a.wrapping_add(0x06);
        }
    } else {
        if c {
            a = a.wrapping_sub(0x60);
        }
        if h {
            a = a.wrapping_sub(0x06);
        }
    }
    regs.set_flag(Flag::C, c);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::Z, a == 0x00);
    regs.a = a;
}

// Rotate left. Old bit 7 to carry flag and to bit 0.
fn alu_rlc(regs: &mut Register, a: u8) -> u8 {
    let c = a & 0x80 != 0x00;
    let r = (a << 1) | u8::from(c);
    regs.set_flag(Flag::C, c);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    r
}

// Rotate left through the carry flag.
fn alu_rl(regs: &mut Register, a: u8) -> u8 {
    let c = a & 0x80 != 0x00;
    let r = (a << 1) | u8::from(regs.get_flag(Flag::C));
    regs.set_flag(Flag::C, c);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    r
}

// Rotate right. Old bit 0 to carry flag and to bit 7.
fn alu_rrc(regs: &mut Register, a: u8) -> u8 {
    let c = a & 0x01 != 0x00;
    let r = (a >> 1) | (u8::from(c) << 7);
    regs.set_flag(Flag::C, c);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    r
}

// Rotate right through the carry flag.
fn alu_rr(regs: &mut Register, a: u8) -> u8 {
    let c = a & 0x01 != 0x00;
    let r = (a >> 1) | (u8::from(regs.get_flag(Flag::C)) << 7);
    regs.set_flag(Flag::C, c);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    r
}

// Shift left into carry. Bit 0 becomes 0.
fn alu_sla(regs: &mut Register, a: u8) -> u8 {
    let c = a & 0x80 != 0x00;
    let r = a << 1;
    regs.set_flag(Flag::C, c);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    r
}

// Shift right into carry. Bit 7 keeps its value.
fn alu_sra(regs: &mut Register, a: u8) -> u8 {
    let c = a & 0x01 != 0x00;
    let r = (a >> 1) | (a & 0x80);
    regs.set_flag(Flag::C, c);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    r
}

// Swap the nibbles.
fn alu_swap(regs: &mut Register, a: u8) -> u8 {
    regs.set_flag(Flag::C, false);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, a == 0x00);
    (a >> 4) | (a << 4)
}

// Shift right into carry. Bit 7 becomes 0.
fn alu_srl(regs: &mut Register, a: u8) -> u8 {
    let c = a & 0x01 != 0x00;
    let r = a >> 1;
    regs.set_flag(Flag::C, c);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, r == 0x00);
    r
}

// Test bit b. Z - Set if the bit is 0. N - Reset. H - Set. C untouched.
fn alu_bit(regs: &mut Register, a: u8, b: u8) {
    regs.set_flag(Flag::H, true);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::Z, a & (1 << b) == 0x00);
}

fn arith(rhs: Operand, mnem: String) -> Instr {
    Instr::new(4 + rhs.cost(), 1 + rhs.space(), mnem)
}

fn do_ret(ctx: &mut Ctx) {
    let target = ops::STACK.load(ctx);
    ctx.regs.pc = target;
    ctx.regs.sp = ctx.regs.sp.wrapping_add(2);
}

fn do_push(ctx: &mut Ctx, v: u16) {
    ctx.regs.sp = ctx.regs.sp.wrapping_sub(2);
    ops::STACK.store(ctx, v);
}

pub fn exec(opcode: u8, ctx: &mut Ctx) -> Instr {
    match OP_TABLE[usize::from(opcode)] {
        Op::Unimplemented => Instr::stop(format!("UNIMP [0x{:02X}]", opcode)),
        Op::Nop => Instr::new(4, 1, "NOP".to_string()),
        Op::Halt => {
            ctx.regs.halted = true;
            Instr::new(4, 1, "HALT".to_string())
        }
        Op::Ld(dst, src) => {
            let mnem = format!("LD {},{}", dst.fmt(ctx), src.fmt(ctx));
            let v = src.load(ctx);
            dst.store(ctx, v);
            Instr::new(4 + dst.cost() + src.cost(), 1 + dst.space() + src.space(), mnem)
        }
        Op::Inc(op) => {
            let mnem = format!("INC {}", op.fmt(ctx));
            let v = op.load(ctx);
            let r = v.wrapping_add(1);
            op.store(ctx, r);
            if !op.is_dword() {
                ctx.regs.set_flag(Flag::H, (v as u8 & 0x0f) + 0x01 > 0x0f);
                ctx.regs.set_flag(Flag::N, false);
                ctx.regs.set_flag(Flag::Z, r as u8 == 0x00);
            }
            let cycles = if op.is_mem() {
                4 + op.cost() * 2
            } else if op.is_dword() {
                8
            } else {
                4
            };
            Instr::new(cycles, 1, mnem)
        }
        Op::Dec(op) => {
            let mnem = format!("DEC {}", op.fmt(ctx));
            let v = op.load(ctx);
            let r = v.wrapping_sub(1);
            op.store(ctx, r);
            if !op.is_dword() {
                ctx.regs.set_flag(Flag::H, v as u8 & 0x0f == 0x00);
                ctx.regs.set_flag(Flag::N, true);
                ctx.regs.set_flag(Flag::Z, r as u8 == 0x00);
            }
            let cycles = if op.is_mem() {
                4 + op.cost() * 2
            } else if op.is_dword() {
                8
            } else {
                4
            };
            Instr::new(cycles, 1, mnem)
        }
        Op::Add(rhs) => {
            let mnem = format!("ADD A,{}", rhs.fmt(ctx));
            let n = rhs.load(ctx) as u8;
            alu_add(ctx.regs, n);
            arith(rhs, mnem)
        }
        Op::Adc(rhs) => {
            let mnem = format!("ADC A,{}", rhs.fmt(ctx));
            let n = rhs.load(ctx) as u8;
            alu_adc(ctx.regs, n);
            arith(rhs, mnem)
        }
        Op::Sub(rhs) => {
            let mnem = format!("SUB {}", rhs.fmt(ctx));
            let n = rhs.load(ctx) as u8;
            alu_sub(ctx.regs, n);
            arith(rhs, mnem)
        }
        Op::Sbc(rhs) => {
            let mnem = format!("SBC A,{}", rhs.fmt(ctx));
            let n = rhs.load(ctx) as u8;
            alu_sbc(ctx.regs, n);
            arith(rhs, mnem)
        }
        Op::And(rhs) => {
            let mnem = format!("AND {}", rhs.fmt(ctx));
            let n = rhs.load(ctx) as u8;
            alu_and(ctx.regs, n);
            arith(rhs, mnem)
        }
        Op::Xor(rhs) => {
            let mnem = format!("XOR {}", rhs.fmt(ctx));
            let n = rhs.load(ctx) as u8;
            alu_xor(ctx.regs, n);
            arith(rhs, mnem)
        }
        Op::Or(rhs) => {
            let mnem = format!("OR {}", rhs.fmt(ctx));
            let n = rhs.load(ctx) as u8;
            alu_or(ctx.regs, n);
            arith(rhs, mnem)
        }
        Op::Cp(rhs) => {
            let mnem = format!("CP {}", rhs.fmt(ctx));
            let n = rhs.load(ctx) as u8;
            alu_cp(ctx.regs, n);
            arith(rhs, mnem)
        }
        Op::AddHl(rhs) => {
            let mnem = format!("ADD HL,{}", rhs.fmt(ctx));
            let n = rhs.load(ctx);
            alu_add_hl(ctx.regs, n);
            Instr::new(8, 1, mnem)
        }
        Op::AddSp => {
            let d = ctx.mmu.get(ctx.pc().wrapping_add(1));
            let sp = ctx.regs.sp;
            ctx.regs.sp = alu_sp_offset(ctx.regs, sp, d);
            Instr::new(16, 2, format!("ADD SP,${:02X}", d))
        }
        Op::LdHlSp => {
            let d = ctx.mmu.get(ctx.pc().wrapping_add(1));
            let sp = ctx.regs.sp;
            let r = alu_sp_offset(ctx.regs, sp, d);
            ctx.regs.set(Reg::HL, r);
            Instr::new(12, 2, format!("LD HL,SP+${:02X}", d))
        }
        Op::LdSpHl => {
            ctx.regs.sp = ctx.regs.get(Reg::HL);
            Instr::new(8, 1, "LD SP,HL".to_string())
        }
        Op::Jr(cond) => {
            let offset = ctx.mmu.get(ctx.pc().wrapping_add(1)) as i8;
            let pc = ctx.pc();
            let target = pc.wrapping_add(offset as u16).wrapping_add(2);
            match cond {
                None => {
                    if target == pc {
                        return Instr::stop("INF LOOP".to_string());
                    }
                    ctx.regs.pc = target;
                    Instr::new(12, 0, format!("JR ${:04X}", target))
                }
                Some(cc) => {
                    let mnem = format!("JR {},${:04X}", cc, target);
                    if cc.test(ctx.regs) {
                        ctx.regs.pc = target;
                        Instr::new(12, 0, mnem)
                    } else {
                        Instr::new(8, 2, mnem)
                    }
                }
            }
        }
        Op::Jp(cond) => {
            let target = ctx.mmu.get_word(ctx.pc().wrapping_add(1));
            match cond {
                None => {
                    ctx.regs.pc = target;
                    Instr::new(16, 0, format!("JP ${:04X}", target))
                }
                Some(cc) => {
                    let mnem = format!("JP {},${:04X}", cc, target);
                    if cc.test(ctx.regs) {
                        ctx.regs.pc = target;
                        Instr::new(16, 0, mnem)
                    } else {
                        Instr::new(12, 3, mnem)
                    }
                }
            }
        }
        Op::JpHl => {
            ctx.regs.pc = ctx.regs.get(Reg::HL);
            Instr::new(4, 0, "JP (HL)".to_string())
        }
        Op::Call(cond) => {
            let target = ctx.mmu.get_word(ctx.pc().wrapping_add(1));
            let ret = ctx.pc().wrapping_add(3);
            match cond {
                None => {
                    do_push(ctx, ret);
                    ctx.regs.pc = target;
                    Instr::new(24, 0, format!("CALL ${:04X}", target))
                }
                Some(cc) => {
                    let mnem = format!("CALL {},${:04X}", cc, target);
                    if cc.test(ctx.regs) {
                        do_push(ctx, ret);
                        ctx.regs.pc = target;
                        Instr::new(24, 0, mnem)
                    } else {
                        Instr::new(12, 3, mnem)
                    }
                }
            }
        }
        Op::Ret(cond) => match cond {
            None => {
                do_ret(ctx);
                Instr::new(16, 0, "RET".to_string())
            }
            Some(cc) => {
                if cc.test(ctx.regs) {
                    do_ret(ctx);
                    Instr::new(20, 0, format!("RET {}", cc))
                } else {
                    Instr::new(8, 1, format!("RET {}", cc))
                }
            }
        },
        Op::Reti => {
            do_ret(ctx);
            ctx.regs.ime = true;
            Instr::new(16, 0, "RETI".to_string())
        }
        Op::Push(src) => {
            let mnem = format!("PUSH {}", src.fmt(ctx));
            let v = src.load(ctx);
            do_push(ctx, v);
            Instr::new(16, 1, mnem)
        }
        Op::Pop(dst) => {
            let mnem = format!("POP {}", dst.fmt(ctx));
            let v = ops::STACK.load(ctx);
            // POP AF drops the low nibble on the floor; the register file
            // enforces that by itself.
            dst.store(ctx, v);
            ctx.regs.sp = ctx.regs.sp.wrapping_add(2);
            Instr::new(16, 1, mnem)
        }
        Op::Rst(n) => {
            let ret = ctx.pc().wrapping_add(1);
            do_push(ctx, ret);
            ctx.regs.pc = n;
            Instr::new(16, 0, format!("RST ${:02X}", n))
        }
        Op::Rlca => {
            let a = ctx.regs.a;
            ctx.regs.a = alu_rlc(ctx.regs, a);
            ctx.regs.set_flag(Flag::Z, false);
            Instr::new(4, 1, "RLCA".to_string())
        }
        Op::Rrca => {
            let a = ctx.regs.a;
            ctx.regs.a = alu_rrc(ctx.regs, a);
            ctx.regs.set_flag(Flag::Z, false);
            Instr::new(4, 1, "RRCA".to_string())
        }
        Op::Rla => {
            let a = ctx.regs.a;
            ctx.regs.a = alu_rl(ctx.regs, a);
            ctx.regs.set_flag(Flag::Z, false);
            Instr::new(4, 1, "RLA".to_string())
        }
        Op::Rra => {
            let a = ctx.regs.a;
            ctx.regs.a = alu_rr(ctx.regs, a);
            ctx.regs.set_flag(Flag::Z, false);
            Instr::new(4, 1, "RRA".to_string())
        }
        Op::Daa => {
            alu_daa(ctx.regs);
            Instr::new(4, 1, "DAA".to_string())
        }
        Op::Cpl => {
            ctx.regs.a = !ctx.regs.a;
            ctx.regs.set_flag(Flag::H, true);
            ctx.regs.set_flag(Flag::N, true);
            Instr::new(4, 1, "CPL".to_string())
        }
        Op::Scf => {
            ctx.regs.set_flag(Flag::C, true);
            ctx.regs.set_flag(Flag::H, false);
            ctx.regs.set_flag(Flag::N, false);
            Instr::new(4, 1, "SCF".to_string())
        }
        Op::Ccf => {
            let c = !ctx.regs.get_flag(Flag::C);
            ctx.regs.set_flag(Flag::C, c);
            ctx.regs.set_flag(Flag::H, false);
            ctx.regs.set_flag(Flag::N, false);
            Instr::new(4, 1, "CCF".to_string())
        }
        Op::Di => {
            ctx.regs.ime = false;
            Instr::new(4, 1, "DI".to_string())
        }
        // The IME side of EI happens at the step boundary in the CPU: it
        // takes effect one instruction late.
        Op::Ei => Instr::new(4, 1, "EI".to_string()),
        Op::Cb => {
            let code = ctx.mmu.get(ctx.pc().wrapping_add(1));
            let CbOp { kind, bit, op } = CB_TABLE[usize::from(code)];
            let cycles = 8 + op.cost() * 2;
            let mnem;
            match kind {
                CbKind::Rlc => {
                    let v = op.load(ctx) as u8;
                    let r = alu_rlc(ctx.regs, v);
                    op.store(ctx, u16::from(r));
                    mnem = format!("RLC {}", op.fmt(ctx));
                }
                CbKind::Rrc => {
                    let v = op.load(ctx) as u8;
                    let r = alu_rrc(ctx.regs, v);
                    op.store(ctx, u16::from(r));
                    mnem = format!("RRC {}", op.fmt(ctx));
                }
                CbKind::Rl => {
                    let v = op.load(ctx) as u8;
                    let r = alu_rl(ctx.regs, v);
                    op.store(ctx, u16::from(r));
                    mnem = format!("RL {}", op.fmt(ctx));
                }
                CbKind::Rr => {
                    let v = op.load(ctx) as u8;
                    let r = alu_rr(ctx.regs, v);
                    op.store(ctx, u16::from(r));
                    mnem = format!("RR {}", op.fmt(ctx));
                }
                CbKind::Sla => {
                    let v = op.load(ctx) as u8;
                    let r = alu_sla(ctx.regs, v);
                    op.store(ctx, u16::from(r));
                    mnem = format!("SLA {}", op.fmt(ctx));
                }
                CbKind::Sra => {
                    let v = op.load(ctx) as u8;
                    let r = alu_sra(ctx.regs, v);
                    op.store(ctx, u16::from(r));
                    mnem = format!("SRA {}", op.fmt(ctx));
                }
                CbKind::Swap => {
                    let v = op.load(ctx) as u8;
                    let r = alu_swap(ctx.regs, v);
                    op.store(ctx, u16::from(r));
                    mnem = format!("SWAP {}", op.fmt(ctx));
                }
                CbKind::Srl => {
                    let v = op.load(ctx) as u8;
                    let r = alu_srl(ctx.regs, v);
                    op.store(ctx, u16::from(r));
                    mnem = format!("SRL {}", op.fmt(ctx));
                }
                CbKind::Bit => {
                    let v = op.load(ctx) as u8;
                    alu_bit(ctx.regs, v, bit);
                    mnem = format!("BIT {},{}", bit, op.fmt(ctx));
                }
                CbKind::Res => {
                    let v = op.load(ctx) as u8;
                    op.store(ctx, u16::from(v & !(1 << bit)));
                    mnem = format!("RES {},{}", bit, op.fmt(ctx));
                }
                CbKind::Set => {
                    let v = op.load(ctx) as u8;
                    op.store(ctx, u16::from(v | (1 << bit)));
                    mnem = format!("SET {},{}", bit, op.fmt(ctx));
                }
            }
            Instr::new(cycles, 2, mnem)
        }
    }
}
