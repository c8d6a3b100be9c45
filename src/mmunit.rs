// The memory management unit: every memory reference in the machine goes
// through here. The 16 bit space is stitched together from the cartridge,
// the plain ram regions and the I/O port dispatcher, first match wins:
// cartridge, work ram, high ram, video ram, OAM, then the ports. Reads off
// the edge of the map return 0xFF and writes are dropped; both are logged
// once per address so a misbehaving rom doesn't flood the console.
use super::cartridge::{Mbc3, RomError};
use super::gpu::Gpu;
use super::intf::Intf;
use super::joypad::Joypad;
use super::memory::{Memory, Ram, Unusable};
use super::serial::Serial;
use super::timer::Timer;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

// FF00-FF7F plus the interrupt enable register at FFFF. Handlers are asked
// in order whether they claim a port; unclaimed reads float high and
// unclaimed writes are dropped.
pub struct IoPorts {
    pub intf: Rc<RefCell<Intf>>,
    pub timer: Timer,
    pub joypad: Joypad,
    pub serial: Serial,
    pub gpu: Gpu,
}

impl IoPorts {
    fn power_up(intf: Rc<RefCell<Intf>>) -> Self {
        Self {
            timer: Timer::power_up(intf.clone()),
            joypad: Joypad::power_up(),
            serial: Serial::power_up(),
            gpu: Gpu::power_up(intf.clone()),
            intf,
        }
    }

    pub fn contains(&self, a: u16) -> bool {
        (0xff00 <= a && a <= 0xff7f) || a == 0xffff
    }
}

impl Memory for IoPorts {
    fn get(&self, a: u16) -> u8 {
        if self.joypad.contains(a) {
            self.joypad.get(a)
        } else if self.serial.contains(a) {
            self.serial.get(a)
        } else if self.timer.contains(a) {
            self.timer.get(a)
        } else if a == 0xff0f {
            self.intf.borrow().data
        } else if a == 0xffff {
            self.intf.borrow().enable
        } else if self.gpu.contains(a) {
            self.gpu.get(a)
        } else {
            0xff
        }
    }

    fn set(&mut self, a: u16, v: u8) {
        if self.joypad.contains(a) {
            self.joypad.set(a, v)
        } else if self.serial.contains(a) {
            self.serial.set(a, v)
        } else if self.timer.contains(a) {
            self.timer.set(a, v)
        } else if a == 0xff0f {
            self.intf.borrow_mut().data = v & 0x1f;
        } else if a == 0xffff {
            self.intf.borrow_mut().enable = v & 0x1f;
        } else if self.gpu.contains(a) {
            self.gpu.set(a, v)
        }
    }
}

pub struct Mmunit {
    pub cartridge: Mbc3,
    pub io: IoPorts,
    pub intf: Rc<RefCell<Intf>>,
    wram: Ram,
    hram: Ram,
    unusable: Unusable,
    noted: RefCell<HashSet<u16>>,
}

impl Mmunit {
    pub fn power_up(rom: Vec<u8>) -> Result<Self, RomError> {
        let cartridge = Mbc3::power_up(rom)?;
        let intf = Rc::new(RefCell::new(Intf::power_up()));
        Ok(Self {
            cartridge,
            io: IoPorts::power_up(intf.clone()),
            intf,
            wram: Ram::power_up(0xc000, 0xdfff),
            hram: Ram::power_up(0xff80, 0xfffe),
            unusable: Unusable::power_up(0xfea0, 0xfeff),
            noted: RefCell::new(HashSet::new()),
        })
    }

    fn complain(&self, what: &str, a: u16) {
        if self.noted.borrow_mut().insert(a) {
            rog::debugln!("Unmapped bus {} at 0x{:04x}", what, a);
        }
    }
}

impl Memory for Mmunit {
    fn get(&self, a: u16) -> u8 {
        if self.cartridge.contains(a) {
            self.cartridge.get(a)
        } else if self.wram.contains(a) {
            self.wram.get(a)
        } else if self.hram.contains(a) {
            self.hram.get(a)
        } else if self.io.gpu.contains(a) {
            // Video ram and the sprite table live with the gpu.
            self.io.gpu.get(a)
        } else if self.unusable.contains(a) {
            self.unusable.get(a)
        } else if self.io.contains(a) {
            self.io.get(a)
        } else {
            self.complain("read", a);
            0xff
        }
    }

    fn set(&mut self, a: u16, v: u8) {
        if a == 0xff46 {
            // OAM DMA: copy 160 bytes from (v << 8) into the sprite table
            // through the normal load/store paths.
            let base = u16::from(v) << 8;
            for i in 0..0xa0 {
                let b = self.get(base + i);
                self.set(0xfe00 + i, b);
            }
            return;
        }
        if self.cartridge.contains(a) {
            self.cartridge.set(a, v)
        } else if self.wram.contains(a) {
            self.wram.set(a, v)
        } else if self.hram.contains(a) {
            self.hram.set(a, v)
        } else if self.io.gpu.contains(a) {
            self.io.gpu.set(a, v)
        } else if self.unusable.contains(a) {
            self.unusable.set(a, v)
        } else if self.io.contains(a) {
            self.io.set(a, v)
        } else {
            self.complain("write", a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Mmunit;
    use crate::memory::Memory;

    fn rom(len: usize, rom_code: u8) -> Vec<u8> {
        let mut rom = vec![0x00; len];
        rom[0x0147] = 0x11;
        rom[0x0148] = rom_code;
        let mut sum: u8 = 0;
        for i in 0x0134..0x014d {
            sum = sum.wrapping_sub(rom[i]).wrapping_sub(1);
        }
        rom[0x014d] = sum;
        rom
    }

    #[test]
    fn rom_reads_come_straight_from_the_image() {
        let mut image = rom(0x8000, 0x00);
        image[0x0000] = 0x31;
        image[0x3fff] = 0x99;
        let image2 = image.clone();
        let mmu = Mmunit::power_up(image).unwrap();
        for a in [0x0000u16, 0x0100, 0x3fff].iter() {
            assert_eq!(mmu.get(*a), image2[usize::from(*a)]);
        }
    }

    #[test]
    fn bank_switch_moves_the_4000_window() {
        let mut image = rom(0x4000 * 4, 0x01);
        for bank in 0..4usize {
            for i in 0..0x10 {
                image[bank * 0x4000 + i] = (bank * 0x10 + i) as u8;
            }
        }
        let image2 = image.clone();
        let mut mmu = Mmunit::power_up(image).unwrap();
        for bank in 1..4u8 {
            mmu.set(0x2000, bank);
            for i in 0..0x10u16 {
                let expect = image2[usize::from(bank) * 0x4000 + usize::from(i)];
                assert_eq!(mmu.get(0x4000 + i), expect);
            }
        }
    }

    #[test]
    fn word_helpers_are_little_endian() {
        let mut mmu = Mmunit::power_up(rom(0x8000, 0x00)).unwrap();
        mmu.set_word(0xc000, 0x1234);
        assert_eq!(mmu.get(0xc000), 0x34);
        assert_eq!(mmu.get(0xc001), 0x12);
        assert_eq!(mmu.get_word(0xc000), 0x1234);
    }

    #[test]
    fn unmapped_addresses_float_high_and_drop_writes() {
        let mut mmu = Mmunit::power_up(rom(0x8000, 0x00)).unwrap();
        // Echo ram is not mapped.
        mmu.set(0xe000, 0x55);
        assert_eq!(mmu.get(0xe000), 0xff);
        assert_eq!(mmu.get(0xfea0), 0xff);
    }

    #[test]
    fn interrupt_masks_are_memory_mapped_low_five_bits() {
        let mut mmu = Mmunit::power_up(rom(0x8000, 0x00)).unwrap();
        mmu.set(0xff0f, 0xff);
        mmu.set(0xffff, 0xe5);
        assert_eq!(mmu.get(0xff0f), 0x1f);
        assert_eq!(mmu.get(0xffff), 0x05);
        assert_eq!(mmu.intf.borrow().data, 0x1f);
    }

    #[test]
    fn oam_dma_copies_160_bytes() {
        let mut mmu = Mmunit::power_up(rom(0x8000, 0x00)).unwrap();
        for i in 0..0xa0u16 {
            mmu.set(0xc000 + i, i as u8);
        }
        mmu.set(0xff46, 0xc0);
        for i in 0..0xa0u16 {
            assert_eq!(mmu.get(0xfe00 + i), i as u8);
        }
    }

    #[test]
    fn unclaimed_io_ports_float_high() {
        let mut mmu = Mmunit::power_up(rom(0x8000, 0x00)).unwrap();
        assert_eq!(mmu.get(0xff10), 0xff); // sound is not on board
        mmu.set(0xff10, 0x80);
        assert_eq!(mmu.get(0xff10), 0xff);
    }

    #[test]
    fn high_ram_round_trips() {
        let mut mmu = Mmunit::power_up(rom(0x8000, 0x00)).unwrap();
        mmu.set(0xff80, 0x42);
        mmu.set(0xfffe, 0x24);
        assert_eq!(mmu.get(0xff80), 0x42);
        assert_eq!(mmu.get(0xfffe), 0x24);
    }
}
