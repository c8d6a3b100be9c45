// The chip behind the NINTENDO GAME BOY: the sharp LR35902. The decode
// tables live in instr; this is the step loop around them - interrupt
// dispatch, the HALT latch, PC bookkeeping and the crash-dump trace ring.
use super::instr;
use super::memory::Memory;
use super::mmunit::Mmunit;
use super::ops::Ctx;
use super::register::Register;
use std::collections::VecDeque;

pub const CPU_CLOCK: u32 = 4_194_304;

// Instructions remembered for the dump when the core stops.
const TRACE_DEPTH: usize = 32;

#[derive(Debug)]
pub enum Fault {
    // The decoder hit a hole in the table. Fatal.
    Unimplemented { pc: u16, opcode: u8 },
    // An unconditional JR jumped to itself. Roms halt this way.
    InfiniteLoop { pc: u16 },
}

pub struct Cpu {
    pub reg: Register,
    pub execs: u64,
    pub cycles: u64,
    pub fault: Option<Fault>,
    trace: VecDeque<(u16, String)>,
    ei_pending: bool,
}

impl Cpu {
    pub fn power_up() -> Self {
        Self {
            reg: Register::power_up(),
            execs: 0,
            cycles: 0,
            fault: None,
            trace: VecDeque::with_capacity(TRACE_DEPTH),
            ei_pending: false,
        }
    }

    // Dispatch the lowest-bit pending interrupt, if the master enable and
    // the masks allow one: clear its IF bit, drop IME, push PC and jump to
    // the vector. Returns true when a vector was taken.
    pub fn service_interrupts(&mut self, mmu: &mut Mmunit) -> bool {
        if !self.reg.ime {
            return false;
        }
        let intf = mmu.get(0xff0f);
        let inte = mmu.get(0xffff);
        let pending = intf & inte & 0x1f;
        if pending == 0x00 {
            return false;
        }
        let n = pending.trailing_zeros();
        mmu.set(0xff0f, intf & !(1 << n));
        self.reg.ime = false;
        self.reg.halted = false;
        self.reg.sp = self.reg.sp.wrapping_sub(2);
        mmu.set_word(self.reg.sp, self.reg.pc);
        self.reg.pc = 0x0040 | ((n as u16) << 3);
        true
    }

    // One CPU step: service interrupts, then fetch, dispatch and execute a
    // single instruction. Returns the cycles consumed, or -1 once the core
    // has stopped (see self.fault).
    pub fn next(&mut self, mmu: &mut Mmunit) -> i32 {
        self.service_interrupts(mmu);
        if self.reg.halted {
            let pending = mmu.get(0xff0f) & mmu.get(0xffff) & 0x1f;
            if pending != 0x00 {
                // Wake-up is independent of IME; with it off nothing is
                // serviced, execution just resumes.
                self.reg.halted = false;
            } else {
                return 4;
            }
        }
        let pc = self.reg.pc;
        let opcode = mmu.get(pc);
        let inst = {
            let mut ctx = Ctx {
                regs: &mut self.reg,
                mmu,
            };
            instr::exec(opcode, &mut ctx)
        };
        if self.trace.len() == TRACE_DEPTH {
            self.trace.pop_front();
        }
        self.trace.push_back((pc, inst.mnem.clone()));
        if inst.cycles < 0 {
            self.fault = Some(if opcode == 0x18 {
                Fault::InfiniteLoop { pc }
            } else {
                Fault::Unimplemented { pc, opcode }
            });
            self.dump();
            return -1;
        }
        // A step of zero means the handler already wrote PC.
        self.reg.pc = self.reg.pc.wrapping_add(inst.step);
        self.execs += 1;
        self.cycles += inst.cycles as u64;
        // EI takes effect one instruction late; DI is immediate and also
        // cancels a pending EI.
        match opcode {
            0xfb => self.ei_pending = true,
            0xf3 => self.ei_pending = false,
            _ => {
                if self.ei_pending {
                    self.reg.ime = true;
                    self.ei_pending = false;
                }
            }
        }
        inst.cycles
    }

    fn dump(&self) {
        rog::println!("-- REGS --");
        rog::println!("{}", self.reg);
        rog::println!("-- TRACE --");
        for (pc, mnem) in &self.trace {
            rog::println!("{:04X}  {}", pc, mnem);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cpu, Fault};
    use crate::memory::Memory;
    use crate::mmunit::Mmunit;

    fn power_up(program: &[u8]) -> (Cpu, Mmunit) {
        let mut rom = vec![0x00; 0x8000];
        for (i, b) in program.iter().enumerate() {
            rom[0x100 + i] = *b;
        }
        rom[0x0147] = 0x11;
        let mut sum: u8 = 0;
        for i in 0x0134..0x014d {
            sum = sum.wrapping_sub(rom[i]).wrapping_sub(1);
        }
        rom[0x014d] = sum;
        (Cpu::power_up(), Mmunit::power_up(rom).unwrap())
    }

    #[test]
    fn interrupt_dispatch_pushes_pc_and_vectors() {
        let (mut cpu, mut mmu) = power_up(&[0x00]);
        cpu.reg.pc = 0x0200;
        cpu.reg.sp = 0xdfff;
        cpu.reg.ime = true;
        mmu.set(0xffff, 0x01);
        mmu.set(0xff0f, 0x01);
        assert!(cpu.service_interrupts(&mut mmu));
        assert_eq!(cpu.reg.pc, 0x0040);
        assert_eq!(cpu.reg.sp, 0xdffd);
        assert_eq!(mmu.get(0xdffd), 0x00);
        assert_eq!(mmu.get(0xdffe), 0x02);
        assert!(!cpu.reg.ime);
        assert_eq!(mmu.get(0xff0f) & 0x01, 0x00);
    }

    #[test]
    fn lowest_bit_wins_between_pending_interrupts() {
        let (mut cpu, mut mmu) = power_up(&[0x00]);
        cpu.reg.sp = 0xdfff;
        cpu.reg.ime = true;
        mmu.set(0xffff, 0x1f);
        mmu.set(0xff0f, 0x14); // timer + joypad
        assert!(cpu.service_interrupts(&mut mmu));
        assert_eq!(cpu.reg.pc, 0x0050);
        // Joypad stays pending.
        assert_eq!(mmu.get(0xff0f) & 0x1f, 0x10);
    }

    #[test]
    fn masked_interrupts_do_not_dispatch() {
        let (mut cpu, mut mmu) = power_up(&[0x00]);
        cpu.reg.ime = true;
        mmu.set(0xffff, 0x02);
        mmu.set(0xff0f, 0x01);
        assert!(!cpu.service_interrupts(&mut mmu));
        cpu.reg.ime = false;
        mmu.set(0xffff, 0x01);
        assert!(!cpu.service_interrupts(&mut mmu));
    }

    #[test]
    fn halt_idles_until_an_enabled_interrupt_pends() {
        let (mut cpu, mut mmu) = power_up(&[0x76, 0x00]); // HALT; NOP
        assert_eq!(cpu.next(&mut mmu), 4);
        assert!(cpu.reg.halted);
        assert_eq!(cpu.next(&mut mmu), 4);
        assert_eq!(cpu.reg.pc, 0x0101);
        // IME off, enabled interrupt pending: wake without a vector.
        mmu.set(0xffff, 0x04);
        mmu.set(0xff0f, 0x04);
        assert_eq!(cpu.next(&mut mmu), 4); // executes the NOP
        assert!(!cpu.reg.halted);
        assert_eq!(cpu.reg.pc, 0x0102);
        assert_eq!(mmu.get(0xff0f) & 0x04, 0x04); // request still latched
    }

    #[test]
    fn ei_enables_one_instruction_late() {
        let (mut cpu, mut mmu) = power_up(&[0xfb, 0x00, 0x00]); // EI; NOP; NOP
        cpu.reg.sp = 0xdfff;
        mmu.set(0xffff, 0x01);
        mmu.set(0xff0f, 0x01);
        cpu.next(&mut mmu); // EI
        assert!(!cpu.reg.ime);
        cpu.next(&mut mmu); // first NOP runs, then IME turns on
        assert!(cpu.reg.ime);
        assert_eq!(cpu.reg.pc, 0x0102);
        cpu.next(&mut mmu); // this boundary services
        assert_eq!(cpu.reg.pc, 0x0041); // vector plus the NOP it fetched
    }

    #[test]
    fn di_cancels_a_pending_ei() {
        let (mut cpu, mut mmu) = power_up(&[0xfb, 0xf3, 0x00]); // EI; DI; NOP
        cpu.next(&mut mmu);
        cpu.next(&mut mmu);
        cpu.next(&mut mmu);
        assert!(!cpu.reg.ime);
    }

    #[test]
    fn unimplemented_opcode_stops_with_a_fault() {
        let (mut cpu, mut mmu) = power_up(&[0xd3]);
        assert_eq!(cpu.next(&mut mmu), -1);
        match cpu.fault {
            Some(Fault::Unimplemented { pc, opcode }) => {
                assert_eq!(pc, 0x0100);
                assert_eq!(opcode, 0xd3);
            }
            _ => panic!("expected an unimplemented fault"),
        }
    }

    #[test]
    fn jr_self_loop_stops_cleanly() {
        let (mut cpu, mut mmu) = power_up(&[0x18, 0xfe]);
        assert_eq!(cpu.next(&mut mmu), -1);
        match cpu.fault {
            Some(Fault::InfiniteLoop { pc }) => assert_eq!(pc, 0x0100),
            _ => panic!("expected a loop fault"),
        }
        assert_eq!(cpu.reg.pc, 0x0100);
    }
}
