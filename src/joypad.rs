// The eight buttons/direction keys are arranged as a 2x4 matrix. The CPU
// selects either the button or the direction row by writing bit 4 or 5 of
// this register, then reads the pressed state out of bits 0-3 (0=pressed).
//
// FF00 - P1/JOYP - Joypad (R/W)
//
// Bit 5 - P15 Select Button Keys      (0=Select)
// Bit 4 - P14 Select Direction Keys   (0=Select)
// Bit 3 - P13 Input Down  or Start    (0=Pressed) (Read Only)
// Bit 2 - P12 Input Up    or Select   (0=Pressed) (Read Only)
// Bit 1 - P11 Input Left  or Button B (0=Pressed) (Read Only)
// Bit 0 - P10 Input Right or Button A (0=Pressed) (Read Only)
//
// The pressed state itself comes from outside the core: whoever owns the
// host input implements InputProvider and the register read pulls from it.
use super::memory::Memory;

// Packed button state, 1 = pressed, low nibbles only.
// dpad:    bit0 Right, bit1 Left, bit2 Up, bit3 Down.
// buttons: bit0 A, bit1 B, bit2 Select, bit3 Start.
#[derive(Clone, Copy, Default)]
pub struct Buttons {
    pub dpad: u8,
    pub buttons: u8,
}

pub trait InputProvider {
    fn current_buttons(&self) -> Buttons;
}

// Nothing is ever pressed. Headless runs and tests use this.
pub struct NullInput;

impl InputProvider for NullInput {
    fn current_buttons(&self) -> Buttons {
        Buttons::default()
    }
}

pub struct Joypad {
    select: u8,
    provider: Box<dyn InputProvider>,
}

impl Joypad {
    pub fn power_up() -> Self {
        Self {
            select: 0x00,
            provider: Box::new(NullInput),
        }
    }

    pub fn plug(&mut self, provider: Box<dyn InputProvider>) {
        self.provider = provider;
    }

    pub fn contains(&self, a: u16) -> bool {
        a == 0xff00
    }
}

impl Memory for Joypad {
    fn get(&self, _: u16) -> u8 {
        let keys = self.provider.current_buttons();
        let mut joyp = self.select | 0x0f;
        if self.select & 0x10 == 0x00 {
            joyp &= !(keys.dpad & 0x0f);
        }
        if self.select & 0x20 == 0x00 {
            joyp &= !(keys.buttons & 0x0f);
        }
        joyp
    }

    fn set(&mut self, _: u16, v: u8) {
        self.select = v & 0x30;
    }
}

#[cfg(test)]
mod tests {
    use super::{Buttons, InputProvider, Joypad};
    use crate::memory::Memory;

    struct Fixed(Buttons);

    impl InputProvider for Fixed {
        fn current_buttons(&self) -> Buttons {
            self.0
        }
    }

    #[test]
    fn direction_row_reads_dpad_bits() {
        let mut joypad = Joypad::power_up();
        joypad.plug(Box::new(Fixed(Buttons {
            dpad: 0b0000_0101, // right + up
            buttons: 0b0000_0010,
        })));
        joypad.set(0xff00, 0x20); // bit 4 cleared: directions
        assert_eq!(joypad.get(0xff00), 0x20 | 0b0000_1010);
    }

    #[test]
    fn button_row_reads_button_bits() {
        let mut joypad = Joypad::power_up();
        joypad.plug(Box::new(Fixed(Buttons {
            dpad: 0b0000_0101,
            buttons: 0b0000_1001, // a + start
        })));
        joypad.set(0xff00, 0x10); // bit 5 cleared: buttons
        assert_eq!(joypad.get(0xff00), 0x10 | 0b0000_0110);
    }

    #[test]
    fn released_keys_read_high() {
        let mut joypad = Joypad::power_up();
        joypad.set(0xff00, 0x10);
        assert_eq!(joypad.get(0xff00) & 0x0f, 0x0f);
    }
}
