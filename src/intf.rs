// FF0F - IF - Interrupt Flag (R/W)
// FFFF - IE - Interrupt Enable (R/W)
// Bit 0: V-Blank  (INT 40h)
// Bit 1: LCD STAT (INT 48h)
// Bit 2: Timer    (INT 50h)
// Bit 3: Serial   (INT 58h)
// Bit 4: Joypad   (INT 60h)
//
// Both masks live here, owned by the I/O port dispatcher; the subsystems
// that raise interrupts share this bus and the CPU reads it back through
// the MMU, so nobody needs a pointer at anybody else.
#[rustfmt::skip]
#[derive(Clone, Copy)]
pub enum Flag {
    VBlank  = 0,
    LCDStat = 1,
    Timer   = 2,
    Serial  = 3,
    Joypad  = 4,
}

pub struct Intf {
    // Requested interrupts (IF).
    pub data: u8,
    // Enabled interrupts (IE).
    pub enable: u8,
}

impl Intf {
    pub fn power_up() -> Self {
        Self {
            data: 0x00,
            enable: 0x00,
        }
    }

    pub fn hi(&mut self, flag: Flag) {
        self.data |= 1 << flag as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::{Flag, Intf};

    #[test]
    fn requests_set_their_bit() {
        let mut intf = Intf::power_up();
        intf.hi(Flag::Timer);
        assert_eq!(intf.data, 0x04);
        intf.hi(Flag::VBlank);
        assert_eq!(intf.data, 0x05);
    }
}
