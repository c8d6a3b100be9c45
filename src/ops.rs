// A uniform operand model for the decoder. Every instruction family is
// written once against Operand::load / Operand::store and the tables pick
// the concrete operands; the per-operand cycle cost ("cost") and encoded
// byte count ("space") live here too, so the executor never recomputes
// them per dispatch.
use super::memory::Memory;
use super::mmunit::Mmunit;
use super::register::{Reg, Register};

// Everything an operand needs to resolve itself: the register file and the
// bus. PC still points at the opcode byte while a handler runs; immediates
// read from pc + 1.
pub struct Ctx<'a> {
    pub regs: &'a mut Register,
    pub mmu: &'a mut Mmunit,
}

impl<'a> Ctx<'a> {
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }
}

// The inner operand of a Mem: what produces the effective address.
#[derive(Clone, Copy)]
pub enum Ptr {
    Reg(Reg),
    // Read the register, then post-adjust it by the step. HL+ and HL-.
    IncReg(Reg, i16),
    Imm8,
    Imm16,
}

impl Ptr {
    fn load(&self, ctx: &mut Ctx) -> u16 {
        match *self {
            Ptr::Reg(r) => ctx.regs.get(r),
            Ptr::IncReg(r, step) => {
                let v = ctx.regs.get(r);
                ctx.regs.set(r, v.wrapping_add(step as u16));
                v
            }
            Ptr::Imm8 => u16::from(ctx.mmu.get(ctx.pc().wrapping_add(1))),
            Ptr::Imm16 => ctx.mmu.get_word(ctx.pc().wrapping_add(1)),
        }
    }

    fn cost(&self) -> u32 {
        match self {
            Ptr::Reg(_) | Ptr::IncReg(..) => 0,
            Ptr::Imm8 => 4,
            Ptr::Imm16 => 8,
        }
    }

    fn space(&self) -> u16 {
        match self {
            Ptr::Reg(_) | Ptr::IncReg(..) => 0,
            Ptr::Imm8 => 1,
            Ptr::Imm16 => 2,
        }
    }

    fn fmt(&self, ctx: &Ctx) -> String {
        match *self {
            Ptr::Reg(r) => r.to_string(),
            Ptr::IncReg(r, step) => format!("{}{}", r, if step == 1 { "+" } else { "-" }),
            Ptr::Imm8 => format!("${:02X}", ctx.mmu.get(ctx.pc().wrapping_add(1))),
            Ptr::Imm16 => format!("${:04X}", ctx.mmu.get_word(ctx.pc().wrapping_add(1))),
        }
    }
}

#[derive(Clone, Copy)]
pub enum Operand {
    Reg(Reg),
    IncReg(Reg, i16),
    Imm8,
    Imm16,
    Mem { ptr: Ptr, offset: u16, dword: bool },
}

impl Operand {
    pub fn load(&self, ctx: &mut Ctx) -> u16 {
        match *self {
            Operand::Reg(r) => ctx.regs.get(r),
            Operand::IncReg(r, step) => {
                let v = ctx.regs.get(r);
                ctx.regs.set(r, v.wrapping_add(step as u16));
                v
            }
            Operand::Imm8 => u16::from(ctx.mmu.get(ctx.pc().wrapping_add(1))),
            Operand::Imm16 => ctx.mmu.get_word(ctx.pc().wrapping_add(1)),
            Operand::Mem { ptr, offset, dword } => {
                let a = ptr.load(ctx).wrapping_add(offset);
                if dword {
                    ctx.mmu.get_word(a)
                } else {
                    u16::from(ctx.mmu.get(a))
                }
            }
        }
    }

    pub fn store(&self, ctx: &mut Ctx, v: u16) {
        match *self {
            Operand::Reg(r) | Operand::IncReg(r, _) => ctx.regs.set(r, v),
            Operand::Imm8 | Operand::Imm16 => panic!("store through an immediate operand"),
            Operand::Mem { ptr, offset, dword } => {
                let a = ptr.load(ctx).wrapping_add(offset);
                if dword {
                    ctx.mmu.set_word(a, v);
                } else {
                    ctx.mmu.set(a, v as u8);
                }
            }
        }
    }

    // Cycles this operand adds on top of an instruction's base cost.
    pub fn cost(&self) -> u32 {
        match *self {
            Operand::Reg(_) | Operand::IncReg(..) => 0,
            Operand::Imm8 => 4,
            Operand::Imm16 => 8,
            Operand::Mem { ptr, dword, .. } => (if dword { 8 } else { 4 }) + ptr.cost(),
        }
    }

    // Encoded bytes this operand adds after the opcode.
    pub fn space(&self) -> u16 {
        match *self {
            Operand::Reg(_) | Operand::IncReg(..) => 0,
            Operand::Imm8 => 1,
            Operand::Imm16 => 2,
            Operand::Mem { ptr, .. } => ptr.space(),
        }
    }

    pub fn is_dword(&self) -> bool {
        match *self {
            Operand::Reg(r) | Operand::IncReg(r, _) => r.is_dword(),
            Operand::Imm8 => false,
            Operand::Imm16 => true,
            Operand::Mem { dword, .. } => dword,
        }
    }

    pub fn is_mem(&self) -> bool {
        match self {
            Operand::Mem { .. } => true,
            _ => false,
        }
    }

    // Rendering for the trace ring: registers by name, immediates by the
    // value currently under the program counter.
    pub fn fmt(&self, ctx: &Ctx) -> String {
        match *self {
            Operand::Reg(r) => r.to_string(),
            Operand::IncReg(r, step) => format!("{}{}", r, if step == 1 { "+" } else { "-" }),
            Operand::Imm8 => format!("${:02X}", ctx.mmu.get(ctx.pc().wrapping_add(1))),
            Operand::Imm16 => format!("${:04X}", ctx.mmu.get_word(ctx.pc().wrapping_add(1))),
            Operand::Mem { ptr, offset, .. } => {
                if offset == 0 {
                    format!("({})", ptr.fmt(ctx))
                } else {
                    format!("({}+${:X})", ptr.fmt(ctx), offset)
                }
            }
        }
    }
}

pub const A: Operand = Operand::Reg(Reg::A);
pub const B: Operand = Operand::Reg(Reg::B);
pub const C: Operand = Operand::Reg(Reg::C);
pub const D: Operand = Operand::Reg(Reg::D);
pub const E: Operand = Operand::Reg(Reg::E);
pub const H: Operand = Operand::Reg(Reg::H);
pub const L: Operand = Operand::Reg(Reg::L);

pub const AF: Operand = Operand::Reg(Reg::AF);
pub const BC: Operand = Operand::Reg(Reg::BC);
pub const DE: Operand = Operand::Reg(Reg::DE);
pub const HL: Operand = Operand::Reg(Reg::HL);
pub const SP: Operand = Operand::Reg(Reg::SP);

pub const IMM8: Operand = Operand::Imm8;
pub const IMM16: Operand = Operand::Imm16;

// The word at the top of the stack.
pub const STACK: Operand = Operand::Mem {
    ptr: Ptr::Reg(Reg::SP),
    offset: 0,
    dword: true,
};

// Byte in memory pointed to by a register.
pub const fn at(r: Reg) -> Operand {
    Operand::Mem {
        ptr: Ptr::Reg(r),
        offset: 0,
        dword: false,
    }
}

#[cfg(test)]
mod tests {
    use super::{at, Ctx, Operand, Ptr, A, HL, IMM16, IMM8, STACK};
    use crate::memory::Memory;
    use crate::mmunit::Mmunit;
    use crate::register::{Reg, Register};

    fn mmu() -> Mmunit {
        let mut rom = vec![0x00; 0x8000];
        rom[0x0147] = 0x11;
        let mut sum: u8 = 0;
        for i in 0x0134..0x014d {
            sum = sum.wrapping_sub(rom[i]).wrapping_sub(1);
        }
        rom[0x014d] = sum;
        Mmunit::power_up(rom).unwrap()
    }

    #[test]
    fn immediates_read_past_the_opcode() {
        let mut mmu = mmu();
        let mut regs = Register::power_up();
        regs.pc = 0xc000;
        mmu.set(0xc001, 0x34);
        mmu.set(0xc002, 0x12);
        let mut ctx = Ctx {
            regs: &mut regs,
            mmu: &mut mmu,
        };
        assert_eq!(IMM8.load(&mut ctx), 0x34);
        assert_eq!(IMM16.load(&mut ctx), 0x1234);
        assert_eq!(IMM8.space(), 1);
        assert_eq!(IMM16.space(), 2);
        assert_eq!(IMM8.cost(), 4);
        assert_eq!(IMM16.cost(), 8);
    }

    #[test]
    fn hl_post_adjust_reads_then_moves() {
        let mut mmu = mmu();
        let mut regs = Register::power_up();
        regs.set(Reg::HL, 0xc100);
        mmu.set(0xc100, 0x99);
        let hld = Operand::Mem {
            ptr: Ptr::IncReg(Reg::HL, -1),
            offset: 0,
            dword: false,
        };
        let mut ctx = Ctx {
            regs: &mut regs,
            mmu: &mut mmu,
        };
        assert_eq!(hld.load(&mut ctx), 0x99);
        assert_eq!(ctx.regs.get(Reg::HL), 0xc0ff);
    }

    #[test]
    fn io_shortcut_applies_the_ff00_offset() {
        let mut mmu = mmu();
        let mut regs = Register::power_up();
        regs.pc = 0xc000;
        mmu.set(0xc001, 0x85); // operand byte: FF85 lands in high ram
        let ldh = Operand::Mem {
            ptr: Ptr::Imm8,
            offset: 0xff00,
            dword: false,
        };
        let mut ctx = Ctx {
            regs: &mut regs,
            mmu: &mut mmu,
        };
        ldh.store(&mut ctx, 0x42);
        assert_eq!(ctx.mmu.get(0xff85), 0x42);
        assert_eq!(ldh.cost(), 8);
        assert_eq!(ldh.space(), 1);
    }

    #[test]
    fn stack_operand_is_a_little_endian_word_at_sp() {
        let mut mmu = mmu();
        let mut regs = Register::power_up();
        regs.sp = 0xdffd;
        let mut ctx = Ctx {
            regs: &mut regs,
            mmu: &mut mmu,
        };
        STACK.store(&mut ctx, 0xbeef);
        assert_eq!(ctx.mmu.get(0xdffd), 0xef);
        assert_eq!(ctx.mmu.get(0xdffe), 0xbe);
        assert_eq!(STACK.load(&mut ctx), 0xbeef);
    }

    #[test]
    fn operand_metadata_matches_the_reference_costs() {
        assert_eq!(A.cost(), 0);
        assert_eq!(at(Reg::HL).cost(), 4);
        assert_eq!(STACK.cost(), 8);
        assert!(HL.is_dword());
        assert!(!at(Reg::HL).is_dword());
    }
}
