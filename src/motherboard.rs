// The master loop. One call to tick is one machine cycle: the gpu and the
// timer always advance, the cpu only once its previous instruction's cycle
// debt is paid off.
use super::cartridge::RomError;
use super::cpu::{Cpu, Fault};
use super::gpu::{SCREEN_H, SCREEN_W};
use super::joypad::InputProvider;
use super::mmunit::Mmunit;
use super::serial::SerialSink;

pub struct MotherBoard {
    pub mmu: Mmunit,
    pub cpu: Cpu,
    clock: u64,
    next_exec: u64,
}

impl MotherBoard {
    pub fn power_up(rom: Vec<u8>) -> Result<Self, RomError> {
        Ok(Self {
            mmu: Mmunit::power_up(rom)?,
            cpu: Cpu::power_up(),
            clock: 0,
            next_exec: 0,
        })
    }

    // Advance the machine one cycle. Returns false once the cpu has
    // stopped; cpu.fault says why.
    pub fn tick(&mut self) -> bool {
        self.mmu.io.gpu.next(1);
        self.mmu.io.timer.next(1);
        self.clock += 1;
        if self.clock >= self.next_exec {
            let cycles = self.cpu.next(&mut self.mmu);
            if cycles < 0 {
                return false;
            }
            self.next_exec = self.clock + cycles as u64;
        }
        true
    }

    // Run until one more instruction has been executed. While the cpu sits
    // in HALT this keeps ticking the clocks, so a timer or gpu interrupt
    // can still wake it.
    pub fn next(&mut self) -> bool {
        let execs = self.cpu.execs;
        while self.cpu.execs == execs {
            if !self.tick() {
                return false;
            }
        }
        true
    }

    pub fn check_and_reset_gpu_updated(&mut self) -> bool {
        let result = self.mmu.io.gpu.updated;
        self.mmu.io.gpu.updated = false;
        result
    }

    // The most recent frame, handed off by value.
    pub fn frame(&self) -> [[u8; SCREEN_W]; SCREEN_H] {
        self.mmu.io.gpu.data
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.cpu.fault.as_ref()
    }

    pub fn plug_input(&mut self, provider: Box<dyn InputProvider>) {
        self.mmu.io.joypad.plug(provider);
    }

    pub fn plug_serial(&mut self, sink: Box<dyn SerialSink>) {
        self.mmu.io.serial.plug(sink);
    }

    pub fn romname(&self) -> String {
        self.mmu.cartridge.title().to_string()
    }
}
