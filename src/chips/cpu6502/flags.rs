//! The 6502 processor status register: `N V - B D I Z C`, bit 5 always reads
//! back as set (there is no hardware behind it).

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY             = 0b0000_0001;
        const ZERO              = 0b0000_0010;
        const INTERRUPT_DISABLE = 0b0000_0100;
        const DECIMAL_MODE      = 0b0000_1000;
        const BREAK             = 0b0001_0000;
        const EXPANSION         = 0b0010_0000;
        const OVERFLOW          = 0b0100_0000;
        const NEGATIVE          = 0b1000_0000;
    }
}

impl StatusFlags {
    /// Power-on/reset value: interrupts disabled, the unused bit set.
    pub fn reset_value() -> Self {
        StatusFlags::INTERRUPT_DISABLE | StatusFlags::EXPANSION
    }

    pub fn set_flag(&mut self, flag: StatusFlags, condition: bool) {
        self.set(flag, condition);
    }

    /// Set Z/N from `value`, the common tail of nearly every ALU and
    /// load/transfer instruction.
    pub fn set_nz(&mut self, value: u8) {
        self.set_flag(StatusFlags::ZERO, value == 0);
        self.set_flag(StatusFlags::NEGATIVE, value & 0x80 != 0);
    }
}
