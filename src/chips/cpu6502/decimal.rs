//! Bruce Clark's decimal-mode ADC/SBC correction: the accumulator result
//! follows BCD arithmetic while N/V/Z fall out of the parallel binary
//! computation, matching NMOS 6502 behavior (see
//! <http://www.6502.org/tutorials/decimal_mode.html>).

use super::flags::StatusFlags;

pub struct AluResult {
    pub value: u8,
    pub flags: StatusFlags,
}

pub fn adc_decimal(a: u8, operand: u8, carry_in: bool) -> AluResult {
    let carry = carry_in as i32;
    let bin_result = a as i32 + operand as i32 + carry;

    let mut al = (a as i32 & 0x0f) + (operand as i32 & 0x0f) + carry;
    if al >= 0x0a {
        al = ((al + 0x06) & 0x0f) + 0x10;
    }

    let mut a_seq1 = (a as i32 & 0xf0) + (operand as i32 & 0xf0) + al;
    if a_seq1 >= 0xa0 {
        a_seq1 += 0x60;
    }

    let a_seq2 = (a & 0xf0) as i8 as i32 + (operand & 0xf0) as i8 as i32 + al;

    let mut flags = StatusFlags::empty();
    flags.set_flag(StatusFlags::CARRY, a_seq1 >= 0x0100);
    flags.set_flag(StatusFlags::OVERFLOW, !(-128..=127).contains(&a_seq2));
    flags.set_flag(StatusFlags::ZERO, (bin_result & 0xff) == 0);
    flags.set_flag(StatusFlags::NEGATIVE, a_seq2 & 0x80 != 0);

    AluResult {
        value: (a_seq1 & 0xff) as u8,
        flags,
    }
}

pub fn sbc_decimal(a: u8, operand: u8, carry_in: bool, binary: &AluResult) -> AluResult {
    let carry = carry_in as i32;
    let mut al = (a as i32 & 0x0f) - (operand as i32 & 0x0f) + carry - 1;
    if al < 0 {
        al = ((al - 0x06) & 0x0f) - 0x10;
    }

    let mut a_seq3 = (a as i32 & 0xf0) - (operand as i32 & 0xf0) + al;
    if a_seq3 < 0 {
        a_seq3 -= 0x60;
    }

    AluResult {
        value: (a_seq3 & 0xff) as u8,
        // C/N/V/Z are taken from the binary computation even in decimal mode.
        flags: binary.flags,
    }
}

/// The binary ADC computation, used directly outside decimal mode and to
/// derive SBC's flags even inside it.
pub fn adc_binary(a: u8, operand: u8, carry_in: bool) -> AluResult {
    let carry = carry_in as i32;
    let s_result = a as i8 as i32 + operand as i8 as i32 + carry;
    let u_result = a as i32 + operand as i32 + carry;
    let value = (u_result & 0xff) as u8;

    let mut flags = StatusFlags::empty();
    flags.set_flag(StatusFlags::CARRY, u_result & 0x100 != 0);
    flags.set_flag(StatusFlags::OVERFLOW, !(-128..=127).contains(&s_result));
    flags.set_flag(StatusFlags::ZERO, value == 0);
    flags.set_flag(StatusFlags::NEGATIVE, value & 0x80 != 0);

    AluResult { value, flags }
}

pub fn sbc_binary(a: u8, operand: u8, carry_in: bool) -> AluResult {
    let carry = carry_in as i32;
    let u_result = a as i32 + (!operand) as u8 as i32 + carry;
    let s_result = a as i8 as i32 - operand as i8 as i32 - (!carry_in) as i32;
    let value = (u_result & 0xff) as u8;

    let mut flags = StatusFlags::empty();
    flags.set_flag(StatusFlags::CARRY, u_result & 0x100 != 0);
    flags.set_flag(StatusFlags::OVERFLOW, !(-128..=127).contains(&s_result));
    flags.set_flag(StatusFlags::ZERO, value == 0);
    flags.set_flag(StatusFlags::NEGATIVE, value & 0x80 != 0);

    AluResult { value, flags }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bruce Clark's reference vectors (http://www.6502.org/tutorials/decimal_mode.html).
    #[test]
    fn adc_decimal_reference_vectors() {
        let r = adc_decimal(0x58, 0x46, true);
        assert_eq!(r.value, 0x05);
        assert!(r.flags.contains(StatusFlags::CARRY));

        let r = adc_decimal(0x12, 0x34, false);
        assert_eq!(r.value, 0x46);
        assert!(!r.flags.contains(StatusFlags::CARRY));

        let r = adc_decimal(0x15, 0x26, false);
        assert_eq!(r.value, 0x41);
    }

    #[test]
    fn sbc_decimal_reference_vector() {
        let binary = sbc_binary(0x46, 0x12, true);
        let r = sbc_decimal(0x46, 0x12, true, &binary);
        assert_eq!(r.value, 0x34);
    }
}
