//! Per-instruction micro-step logic: effective-address computation shared
//! across addressing modes, then the semantics of each opcode group, all
//! driven by `decode_cycle` and the current clock [`Phase`].

use super::opcodes::*;
use super::{flags::StatusFlags, decimal, Cpu6502, IntrKind, Phase};

impl Cpu6502 {
    pub(super) fn fetch_pc_memory(&mut self, phase: Phase) -> Option<u8> {
        match phase {
            Phase::Begin => {
                self.out_address = self.pc;
                None
            }
            Phase::Middle => None,
            Phase::End => {
                let v = self.in_data;
                self.pc = self.pc.wrapping_add(1);
                Some(v)
            }
        }
    }

    fn fetch_memory(&mut self, addr: u16, phase: Phase) -> Option<u8> {
        match phase {
            Phase::Begin => {
                self.out_address = addr;
                None
            }
            Phase::Middle => None,
            Phase::End => Some(self.in_data),
        }
    }

    fn store_memory(&mut self, addr: u16, value: u8, phase: Phase) {
        match phase {
            Phase::Begin => {
                self.out_address = addr;
                self.out_rw = false;
            }
            Phase::Middle => {
                self.out_data = value;
                self.out_drv_data = true;
            }
            Phase::End => {
                self.out_rw = true;
            }
        }
    }

    /// Indexed zero-page: the base address is read and discarded, the index
    /// wraps within the zero page (no page crossing is possible here).
    fn fetch_zp_discard_add(&mut self, index: u8, phase: Phase) {
        match phase {
            Phase::Begin => {
                self.addr_hi = 0;
                self.out_address = self.addr();
            }
            Phase::Middle => {}
            Phase::End => {
                self.addr_lo = self.addr_lo.wrapping_add(index);
            }
        }
    }

    fn fetch_high_byte_address_indexed(&mut self, index: u8, phase: Phase) {
        match phase {
            Phase::Begin => {
                self.addr_hi = 0;
                self.out_address = self.pc;
            }
            Phase::Middle => {
                let full = self.addr().wrapping_add(index as u16);
                self.addr_lo = (full & 0xff) as u8;
                self.addr_hi = (full >> 8) as u8;
                self.page_crossed = self.addr_hi > 0;
            }
            Phase::End => {
                self.addr_hi = self.in_data;
                self.pc = self.pc.wrapping_add(1);
            }
        }
    }

    /// Reads `addr`, correcting the high byte for a carry if the previous
    /// indexing step overflowed the low byte. Returns true once the read
    /// completed without needing the page-cross correction cycle.
    fn fetch_memory_page_crossed(&mut self, phase: Phase) -> bool {
        match phase {
            Phase::Begin => {
                self.out_address = self.addr();
                false
            }
            Phase::Middle => {
                if self.page_crossed {
                    self.addr_hi = self.addr_hi.wrapping_add(1);
                }
                false
            }
            Phase::End => {
                self.operand = self.in_data;
                !self.page_crossed
            }
        }
    }

    fn fetch_address_immediate(&mut self, phase: Phase) -> i8 {
        if self.decode_cycle == 1 {
            match phase {
                Phase::Begin => {
                    self.addr_lo = (self.pc & 0xff) as u8;
                    self.addr_hi = (self.pc >> 8) as u8;
                }
                Phase::Middle => {}
                Phase::End => self.pc = self.pc.wrapping_add(1),
            }
        }
        1
    }

    fn fetch_address_zeropage(&mut self, phase: Phase) -> i8 {
        if self.decode_cycle == 1 {
            if let Some(lo) = self.fetch_pc_memory(phase) {
                self.addr_lo = lo;
            }
            self.addr_hi = 0;
        }
        2
    }

    fn fetch_address_zeropage_indexed(&mut self, phase: Phase, index: u8) -> i8 {
        match self.decode_cycle {
            1 => {
                if let Some(lo) = self.fetch_pc_memory(phase) {
                    self.addr_lo = lo;
                }
            }
            2 => self.fetch_zp_discard_add(index, phase),
            _ => {}
        }
        3
    }

    fn fetch_address_absolute(&mut self, phase: Phase) -> i8 {
        match self.decode_cycle {
            1 => {
                if let Some(lo) = self.fetch_pc_memory(phase) {
                    self.addr_lo = lo;
                }
            }
            2 => {
                if let Some(hi) = self.fetch_pc_memory(phase) {
                    self.addr_hi = hi;
                }
            }
            _ => {}
        }
        3
    }

    fn fetch_address_absolute_indexed_shortcut(&mut self, phase: Phase, index: u8) -> i8 {
        match self.decode_cycle {
            1 => {
                if let Some(lo) = self.fetch_pc_memory(phase) {
                    self.addr_lo = lo;
                }
            }
            2 => self.fetch_high_byte_address_indexed(index, phase),
            3 => {
                self.fetch_memory_page_crossed(phase);
            }
            _ => {}
        }
        3 + self.page_crossed as i8
    }

    fn fetch_address_absolute_indexed(&mut self, phase: Phase, index: u8) -> i8 {
        match self.decode_cycle {
            1 => {
                if let Some(lo) = self.fetch_pc_memory(phase) {
                    self.addr_lo = lo;
                }
            }
            2 => self.fetch_high_byte_address_indexed(index, phase),
            3 => {
                self.fetch_memory_page_crossed(phase);
            }
            _ => {}
        }
        4
    }

    fn fetch_address_indirect(&mut self, phase: Phase) -> i8 {
        match self.decode_cycle {
            1 => {
                if let Some(lo) = self.fetch_pc_memory(phase) {
                    self.iaddr_lo = lo;
                }
            }
            2 => {
                if let Some(hi) = self.fetch_pc_memory(phase) {
                    self.iaddr_hi = hi;
                }
            }
            3 => {
                if let Some(lo) = self.fetch_memory(self.iaddr(), phase) {
                    self.addr_lo = lo;
                }
                if phase == Phase::End {
                    // the indirect pointer wraps within its own page, the
                    // well-known 6502 JMP ($xxFF) bug.
                    self.iaddr_lo = self.iaddr_lo.wrapping_add(1);
                }
            }
            4 => {
                if let Some(hi) = self.fetch_memory(self.iaddr(), phase) {
                    self.addr_hi = hi;
                }
            }
            _ => {}
        }
        5
    }

    fn fetch_address_indexed_indirect(&mut self, phase: Phase) -> i8 {
        match self.decode_cycle {
            1 => {
                if let Some(zp) = self.fetch_pc_memory(phase) {
                    self.operand = zp;
                }
            }
            2 => {
                self.fetch_memory(self.operand as u16, phase);
                if phase == Phase::End {
                    self.operand = self.operand.wrapping_add(self.x);
                }
            }
            3 => {
                if let Some(lo) = self.fetch_memory(self.operand as u16, phase) {
                    self.addr_lo = lo;
                }
                if phase == Phase::End {
                    self.operand = self.operand.wrapping_add(1);
                }
            }
            4 => {
                if let Some(hi) = self.fetch_memory(self.operand as u16, phase) {
                    self.addr_hi = hi;
                }
            }
            _ => {}
        }
        5
    }

    fn fetch_address_indirect_indexed_inner(&mut self, phase: Phase) -> bool {
        match self.decode_cycle {
            1 => {
                if let Some(zp) = self.fetch_pc_memory(phase) {
                    self.operand = zp;
                }
            }
            2 => {
                if let Some(lo) = self.fetch_memory(self.operand as u16, phase) {
                    self.addr_lo = lo;
                }
                if phase == Phase::End {
                    self.operand = self.operand.wrapping_add(1);
                }
            }
            3 => {
                if let Some(hi) = self.fetch_memory(self.operand as u16, phase) {
                    self.addr_hi = hi;
                }
                if phase == Phase::End {
                    self.page_crossed = self.addr_lo as u16 + self.y as u16 > 0xff;
                    self.addr_lo = self.addr_lo.wrapping_add(self.y);
                }
            }
            4 => {
                if let Some(v) = self.fetch_memory(self.addr(), phase) {
                    self.operand = v;
                }
                if phase == Phase::End {
                    self.addr_hi = self.addr_hi.wrapping_add(self.page_crossed as u8);
                }
            }
            _ => {}
        }
        self.page_crossed
    }

    fn fetch_address_indirect_indexed_shortcut(&mut self, phase: Phase) -> i8 {
        self.fetch_address_indirect_indexed_inner(phase);
        4 + self.page_crossed as i8
    }

    fn fetch_address_indirect_indexed(&mut self, phase: Phase) -> i8 {
        self.fetch_address_indirect_indexed_inner(phase);
        5
    }

    fn fetch_address_shortcut(&mut self, mode: Mode, phase: Phase) -> i8 {
        match mode {
            Mode::Immediate => self.fetch_address_immediate(phase),
            Mode::ZeroPage => self.fetch_address_zeropage(phase),
            Mode::ZeroPageX => self.fetch_address_zeropage_indexed(phase, self.x),
            Mode::ZeroPageY => self.fetch_address_zeropage_indexed(phase, self.y),
            Mode::Absolute => self.fetch_address_absolute(phase),
            Mode::AbsoluteX => self.fetch_address_absolute_indexed_shortcut(phase, self.x),
            Mode::AbsoluteY => self.fetch_address_absolute_indexed_shortcut(phase, self.y),
            Mode::Indirect => self.fetch_address_indirect(phase),
            Mode::IndirectX => self.fetch_address_indexed_indirect(phase),
            Mode::IndirectY => self.fetch_address_indirect_indexed_shortcut(phase),
            Mode::Undefined => 0,
        }
    }

    fn fetch_address(&mut self, mode: Mode, phase: Phase) -> i8 {
        match mode {
            Mode::Immediate => self.fetch_address_immediate(phase),
            Mode::ZeroPage => self.fetch_address_zeropage(phase),
            Mode::ZeroPageX => self.fetch_address_zeropage_indexed(phase, self.x),
            Mode::ZeroPageY => self.fetch_address_zeropage_indexed(phase, self.y),
            Mode::Absolute => self.fetch_address_absolute(phase),
            Mode::AbsoluteX => self.fetch_address_absolute_indexed(phase, self.x),
            Mode::AbsoluteY => self.fetch_address_absolute_indexed(phase, self.y),
            Mode::Indirect => self.fetch_address_indirect(phase),
            Mode::IndirectX => self.fetch_address_indexed_indirect(phase),
            Mode::IndirectY => self.fetch_address_indirect_indexed(phase),
            Mode::Undefined => 0,
        }
    }

    fn fetch_operand(&mut self, mode: Mode, phase: Phase) -> bool {
        let memop_cycle = self.fetch_address_shortcut(mode, phase);
        if memop_cycle == self.decode_cycle {
            if let Some(v) = self.fetch_memory(self.addr(), phase) {
                self.operand = v;
            }
            phase == Phase::End
        } else {
            false
        }
    }

    fn fetch_operand_g1(&mut self, phase: Phase) -> bool {
        self.fetch_operand(GROUP1_MODES[extract_mode_bits(self.ir)], phase)
    }

    fn store_to_memory(&mut self, value: u8, mode: Mode, phase: Phase) -> bool {
        let memop_cycle = self.fetch_address(mode, phase);
        if memop_cycle == self.decode_cycle {
            self.store_memory(self.addr(), value, phase);
            phase == Phase::End
        } else {
            false
        }
    }

    fn store_to_memory_g1(&mut self, value: u8, phase: Phase) -> bool {
        self.store_to_memory(value, GROUP1_MODES[extract_mode_bits(self.ir)], phase)
    }

    fn stack_push(&mut self, value: u8, phase: Phase) {
        match phase {
            Phase::Begin => {
                self.out_address = 0x0100 | self.sp as u16;
                self.out_rw = false;
            }
            Phase::Middle => {
                self.out_data = value;
                self.out_drv_data = true;
            }
            Phase::End => {
                self.sp = self.sp.wrapping_sub(1);
                self.out_rw = true;
            }
        }
    }

    fn stack_pop(&mut self, phase: Phase) -> Option<u8> {
        match phase {
            Phase::Begin => {
                self.sp = self.sp.wrapping_add(1);
                self.out_address = 0x0100 | self.sp as u16;
                None
            }
            Phase::Middle => None,
            Phase::End => Some(self.in_data),
        }
    }

    pub(super) fn interrupt_sequence(&mut self, phase: Phase, kind: IntrKind) {
        let force_read = kind.force_read();

        match self.decode_cycle {
            0 => {
                if phase == Phase::Begin {
                    self.out_address = self.pc;
                }
            }
            1 => {
                if phase == Phase::Begin {
                    self.ir = BRK;
                }
            }
            2 => {
                let hi = (self.pc >> 8) as u8;
                match phase {
                    Phase::Begin => {
                        self.out_address = 0x0100 | self.sp as u16;
                        self.out_rw = false || force_read;
                    }
                    Phase::Middle => {
                        self.out_data = hi;
                        self.out_drv_data = true;
                    }
                    Phase::End => {
                        self.sp = self.sp.wrapping_sub(1);
                        self.out_rw = true;
                    }
                }
            }
            3 => {
                let lo = (self.pc & 0xff) as u8;
                match phase {
                    Phase::Begin => {
                        self.out_address = 0x0100 | self.sp as u16;
                        self.out_rw = force_read;
                    }
                    Phase::Middle => {
                        self.out_data = lo;
                        self.out_drv_data = true;
                    }
                    Phase::End => {
                        self.sp = self.sp.wrapping_sub(1);
                        self.out_rw = true;
                    }
                }
            }
            4 => {
                let p = self.p.bits();
                match phase {
                    Phase::Begin => {
                        self.out_address = 0x0100 | self.sp as u16;
                        self.out_rw = force_read;
                    }
                    Phase::Middle => {
                        self.out_data = p;
                        self.out_drv_data = true;
                    }
                    Phase::End => {
                        self.sp = self.sp.wrapping_sub(1);
                        self.out_rw = true;
                    }
                }
            }
            5 => {
                if phase == Phase::Begin {
                    self.out_address = kind.vector();
                } else if phase == Phase::End {
                    self.pc = (self.pc & 0xff00) | self.in_data as u16;
                }
            }
            6 => {
                if phase == Phase::Begin {
                    self.out_address = kind.vector() + 1;
                } else if phase == Phase::End {
                    self.pc = (self.pc & 0x00ff) | ((self.in_data as u16) << 8);
                    self.p.set_flag(StatusFlags::INTERRUPT_DISABLE, true);
                    self.state = super::State::Running;
                    self.decode_cycle = -1;
                }
            }
            _ => {}
        }
    }

    fn decode_branch_instruction(&mut self, flag: StatusFlags, taken_when: bool, phase: Phase) {
        match self.decode_cycle {
            1 => {
                if let Some(offset) = self.fetch_pc_memory(phase) {
                    self.iaddr_lo = offset;
                }
                if phase == Phase::End && self.p.contains(flag) != taken_when {
                    self.decode_cycle = -1;
                }
            }
            2 => match phase {
                Phase::Begin => {
                    self.out_address = self.pc;
                    self.iaddr_hi = (self.pc >> 8) as u8;
                    self.pc = self.pc.wrapping_add(self.iaddr_lo as i8 as i16 as u16);
                }
                Phase::Middle => {
                    self.page_crossed = self.iaddr_hi != (self.pc >> 8) as u8;
                }
                Phase::End => {
                    if !self.page_crossed {
                        self.decode_cycle = -1;
                    }
                }
            },
            3 => match phase {
                Phase::Begin => {
                    self.iaddr_lo = (self.pc & 0xff) as u8;
                    self.out_address = self.iaddr();
                }
                Phase::Middle => {}
                Phase::End => self.decode_cycle = -1,
            },
            _ => {}
        }
    }

    fn set_alu_result(&mut self, result: decimal::AluResult) {
        self.a = result.value;
        self.p.remove(StatusFlags::CARRY | StatusFlags::OVERFLOW | StatusFlags::ZERO | StatusFlags::NEGATIVE);
        self.p.insert(result.flags);
    }

    fn decode_adc(&mut self, phase: Phase) {
        if !self.fetch_operand_g1(phase) {
            return;
        }
        let carry = self.p.contains(StatusFlags::CARRY);
        if !self.p.contains(StatusFlags::DECIMAL_MODE) {
            self.set_alu_result(decimal::adc_binary(self.a, self.operand, carry));
        } else {
            self.set_alu_result(decimal::adc_decimal(self.a, self.operand, carry));
        }
        self.decode_cycle = -1;
    }

    fn decode_sbc(&mut self, phase: Phase) {
        if !self.fetch_operand_g1(phase) {
            return;
        }
        let carry = self.p.contains(StatusFlags::CARRY);
        let binary = decimal::sbc_binary(self.a, self.operand, carry);
        if !self.p.contains(StatusFlags::DECIMAL_MODE) {
            self.set_alu_result(binary);
        } else {
            let decimal = decimal::sbc_decimal(self.a, self.operand, carry, &binary);
            self.set_alu_result(decimal::AluResult {
                value: decimal.value,
                flags: binary.flags,
            });
        }
        self.decode_cycle = -1;
    }

    fn decode_and(&mut self, phase: Phase) {
        if self.fetch_operand_g1(phase) {
            self.a &= self.operand;
            self.p.set_nz(self.a);
            self.decode_cycle = -1;
        }
    }

    fn decode_ora(&mut self, phase: Phase) {
        if self.fetch_operand_g1(phase) {
            self.a |= self.operand;
            self.p.set_nz(self.a);
            self.decode_cycle = -1;
        }
    }

    fn decode_eor(&mut self, phase: Phase) {
        if self.fetch_operand_g1(phase) {
            self.a ^= self.operand;
            self.p.set_nz(self.a);
            self.decode_cycle = -1;
        }
    }

    fn decode_cmp(&mut self, phase: Phase) {
        if self.fetch_operand_g1(phase) {
            let result = self.a.wrapping_sub(self.operand);
            self.p.set_nz(result);
            self.p.set_flag(StatusFlags::CARRY, self.a >= self.operand);
            self.decode_cycle = -1;
        }
    }

    fn decode_cpx_cpy(&mut self, phase: Phase, reg: u8) {
        const AM_LUT: [Mode; 8] = [
            Mode::Immediate,
            Mode::ZeroPage,
            Mode::Undefined,
            Mode::Absolute,
            Mode::Undefined,
            Mode::Undefined,
            Mode::Undefined,
            Mode::Undefined,
        ];
        if self.fetch_operand(AM_LUT[extract_mode_bits(self.ir)], phase) {
            let result = reg.wrapping_sub(self.operand);
            self.p.set_nz(result);
            self.p.set_flag(StatusFlags::CARRY, reg >= self.operand);
            self.decode_cycle = -1;
        }
    }

    fn decode_bit(&mut self, phase: Phase) {
        let mode = if self.ir == BIT_ZP { Mode::ZeroPage } else { Mode::Absolute };
        if self.fetch_operand(mode, phase) {
            self.p.set_flag(StatusFlags::NEGATIVE, self.operand & 0x80 != 0);
            self.p.set_flag(StatusFlags::OVERFLOW, self.operand & 0x40 != 0);
            self.p.set_flag(StatusFlags::ZERO, self.operand & self.a == 0);
            self.decode_cycle = -1;
        }
    }

    /// ASL/LSR/ROL/ROR/DEC/INC share a three-stage read-modify-write
    /// sequence once the effective address is known: read, mutate
    /// (asserting the write half-cycle), then store and set flags.
    fn rmw(&mut self, phase: Phase, mutate: impl FnOnce(&mut Self)) {
        const AM_LUT: [Mode; 8] = [
            Mode::Undefined,
            Mode::ZeroPage,
            Mode::Undefined,
            Mode::Absolute,
            Mode::Undefined,
            Mode::ZeroPageX,
            Mode::Undefined,
            Mode::AbsoluteX,
        ];
        let memop_cycle = self.fetch_address(AM_LUT[extract_mode_bits(self.ir)], phase);
        match self.decode_cycle - memop_cycle {
            0 => {
                if let Some(v) = self.fetch_memory(self.addr(), phase) {
                    self.operand = v;
                }
            }
            1 => match phase {
                Phase::Begin => {}
                Phase::Middle => self.out_rw = false,
                Phase::End => mutate(self),
            },
            2 => match phase {
                Phase::Begin => {}
                Phase::Middle => {
                    self.out_data = self.operand;
                    self.out_drv_data = true;
                }
                Phase::End => {
                    self.out_rw = true;
                    self.p.set_nz(self.operand);
                    self.decode_cycle = -1;
                }
            },
            _ => {}
        }
    }

    fn decode_asl(&mut self, phase: Phase) {
        if self.ir == ASL_ACC {
            if phase == Phase::Begin {
                self.out_address = self.pc;
            } else if phase == Phase::End {
                self.p.set_flag(StatusFlags::CARRY, self.a & 0x80 != 0);
                self.a <<= 1;
                self.p.set_nz(self.a);
                self.decode_cycle = -1;
            }
            return;
        }
        self.rmw(phase, |cpu| {
            cpu.p.set_flag(StatusFlags::CARRY, cpu.operand & 0x80 != 0);
            cpu.operand <<= 1;
        });
    }

    fn decode_lsr(&mut self, phase: Phase) {
        if self.ir == LSR_ACC {
            if phase == Phase::Begin {
                self.out_address = self.pc;
            } else if phase == Phase::End {
                self.p.set_flag(StatusFlags::CARRY, self.a & 0x01 != 0);
                self.a >>= 1;
                self.p.set_nz(self.a);
                self.decode_cycle = -1;
            }
            return;
        }
        self.rmw(phase, |cpu| {
            cpu.p.set_flag(StatusFlags::CARRY, cpu.operand & 0x01 != 0);
            cpu.operand >>= 1;
        });
    }

    fn decode_rol(&mut self, phase: Phase) {
        if self.ir == ROL_ACC {
            if phase == Phase::Begin {
                self.out_address = self.pc;
            } else if phase == Phase::End {
                let carry = self.p.contains(StatusFlags::CARRY) as u8;
                self.p.set_flag(StatusFlags::CARRY, self.a & 0x80 != 0);
                self.a = (self.a << 1) | carry;
                self.p.set_nz(self.a);
                self.decode_cycle = -1;
            }
            return;
        }
        self.rmw(phase, |cpu| {
            let carry = cpu.p.contains(StatusFlags::CARRY) as u8;
            cpu.p.set_flag(StatusFlags::CARRY, cpu.operand & 0x80 != 0);
            cpu.operand = (cpu.operand << 1) | carry;
        });
    }

    fn decode_ror(&mut self, phase: Phase) {
        if self.ir == ROR_ACC {
            if phase == Phase::Begin {
                self.out_address = self.pc;
            } else if phase == Phase::End {
                let carry = self.p.contains(StatusFlags::CARRY) as u8;
                self.p.set_flag(StatusFlags::CARRY, self.a & 0x01 != 0);
                self.a = (self.a >> 1) | (carry << 7);
                self.p.set_nz(self.a);
                self.decode_cycle = -1;
            }
            return;
        }
        self.rmw(phase, |cpu| {
            let carry = cpu.p.contains(StatusFlags::CARRY) as u8;
            cpu.p.set_flag(StatusFlags::CARRY, cpu.operand & 0x01 != 0);
            cpu.operand = (cpu.operand >> 1) | (carry << 7);
        });
    }

    fn decode_dec(&mut self, phase: Phase) {
        self.rmw(phase, |cpu| cpu.operand = cpu.operand.wrapping_sub(1));
    }

    fn decode_inc(&mut self, phase: Phase) {
        self.rmw(phase, |cpu| cpu.operand = cpu.operand.wrapping_add(1));
    }

    fn decode_lda(&mut self, phase: Phase) {
        if self.fetch_operand_g1(phase) {
            self.a = self.operand;
            self.p.set_nz(self.a);
            self.decode_cycle = -1;
        }
    }

    fn decode_ldx(&mut self, phase: Phase) {
        const AM_LUT: [Mode; 8] = [
            Mode::Immediate,
            Mode::ZeroPage,
            Mode::Undefined,
            Mode::Absolute,
            Mode::Undefined,
            Mode::ZeroPageY,
            Mode::Undefined,
            Mode::AbsoluteY,
        ];
        if self.fetch_operand(AM_LUT[extract_mode_bits(self.ir)], phase) {
            self.x = self.operand;
            self.p.set_nz(self.x);
            self.decode_cycle = -1;
        }
    }

    fn decode_ldy(&mut self, phase: Phase) {
        const AM_LUT: [Mode; 8] = [
            Mode::Immediate,
            Mode::ZeroPage,
            Mode::Undefined,
            Mode::Absolute,
            Mode::Undefined,
            Mode::ZeroPageX,
            Mode::Undefined,
            Mode::AbsoluteX,
        ];
        if self.fetch_operand(AM_LUT[extract_mode_bits(self.ir)], phase) {
            self.y = self.operand;
            self.p.set_nz(self.y);
            self.decode_cycle = -1;
        }
    }

    fn decode_sta(&mut self, phase: Phase) {
        if self.store_to_memory_g1(self.a, phase) {
            self.decode_cycle = -1;
        }
    }

    fn decode_stx(&mut self, phase: Phase) {
        let mode = match self.ir {
            STX_ZP => Mode::ZeroPage,
            STX_ZPY => Mode::ZeroPageY,
            STX_ABS => Mode::Absolute,
            _ => Mode::Undefined,
        };
        if self.store_to_memory(self.x, mode, phase) {
            self.decode_cycle = -1;
        }
    }

    fn decode_sty(&mut self, phase: Phase) {
        let mode = match self.ir {
            STY_ZP => Mode::ZeroPage,
            STY_ZPX => Mode::ZeroPageX,
            STY_ABS => Mode::Absolute,
            _ => Mode::Undefined,
        };
        if self.store_to_memory(self.y, mode, phase) {
            self.decode_cycle = -1;
        }
    }

    /// The handful of always-2-cycle implied instructions: fetch-and-discard
    /// the next opcode byte, then act on the trailing edge.
    fn implied(&mut self, phase: Phase, action: impl FnOnce(&mut Self)) {
        match phase {
            Phase::Begin => self.out_address = self.pc,
            Phase::Middle => {}
            Phase::End => {
                action(self);
                self.decode_cycle = -1;
            }
        }
    }

    fn decode_instruction(&mut self, phase: Phase) {
        match self.ir & AC_MASK {
            AC_ADC => return self.decode_adc(phase),
            AC_AND => return self.decode_and(phase),
            AC_ASL => return self.decode_asl(phase),
            AC_CMP => return self.decode_cmp(phase),
            AC_EOR => return self.decode_eor(phase),
            AC_LDA => return self.decode_lda(phase),
            AC_LSR => return self.decode_lsr(phase),
            AC_ORA => return self.decode_ora(phase),
            AC_ROL => return self.decode_rol(phase),
            AC_ROR => return self.decode_ror(phase),
            AC_SBC => return self.decode_sbc(phase),
            AC_STA => return self.decode_sta(phase),
            AC_DEC if self.ir != DEX => return self.decode_dec(phase),
            AC_INC if self.ir != NOP => return self.decode_inc(phase),
            AC_LDX if self.ir != TAX && self.ir != TSX => return self.decode_ldx(phase),
            AC_LDY if self.ir != BCS && self.ir != CLV && self.ir != TAY => return self.decode_ldy(phase),
            _ => {}
        }

        match self.ir {
            BCC => self.decode_branch_instruction(StatusFlags::CARRY, false, phase),
            BCS => self.decode_branch_instruction(StatusFlags::CARRY, true, phase),
            BEQ => self.decode_branch_instruction(StatusFlags::ZERO, true, phase),
            BNE => self.decode_branch_instruction(StatusFlags::ZERO, false, phase),
            BMI => self.decode_branch_instruction(StatusFlags::NEGATIVE, true, phase),
            BPL => self.decode_branch_instruction(StatusFlags::NEGATIVE, false, phase),
            BVC => self.decode_branch_instruction(StatusFlags::OVERFLOW, false, phase),
            BVS => self.decode_branch_instruction(StatusFlags::OVERFLOW, true, phase),
            BIT_ZP | BIT_ABS => self.decode_bit(phase),
            BRK => {
                if self.decode_cycle == 1 && phase == Phase::Begin {
                    self.p.set_flag(StatusFlags::BREAK, true);
                }
                self.interrupt_sequence(phase, IntrKind::Brk);
            }
            CLC => self.implied(phase, |c| c.p.set_flag(StatusFlags::CARRY, false)),
            CLD => self.implied(phase, |c| c.p.set_flag(StatusFlags::DECIMAL_MODE, false)),
            CLI => self.implied(phase, |c| c.p.set_flag(StatusFlags::INTERRUPT_DISABLE, false)),
            CLV => self.implied(phase, |c| c.p.set_flag(StatusFlags::OVERFLOW, false)),
            SEC => self.implied(phase, |c| c.p.set_flag(StatusFlags::CARRY, true)),
            SED => self.implied(phase, |c| c.p.set_flag(StatusFlags::DECIMAL_MODE, true)),
            SEI => self.implied(phase, |c| c.p.set_flag(StatusFlags::INTERRUPT_DISABLE, true)),
            CPX_IMM | CPX_ZP | CPX_ABS => {
                let x = self.x;
                self.decode_cpx_cpy(phase, x);
            }
            CPY_IMM | CPY_ZP | CPY_ABS => {
                let y = self.y;
                self.decode_cpx_cpy(phase, y);
            }
            DEX => self.implied(phase, |c| {
                c.x = c.x.wrapping_sub(1);
                c.p.set_nz(c.x);
            }),
            DEY => self.implied(phase, |c| {
                c.y = c.y.wrapping_sub(1);
                c.p.set_nz(c.y);
            }),
            INX => self.implied(phase, |c| {
                c.x = c.x.wrapping_add(1);
                c.p.set_nz(c.x);
            }),
            INY => self.implied(phase, |c| {
                c.y = c.y.wrapping_add(1);
                c.p.set_nz(c.y);
            }),
            JMP_ABS | JMP_IND => self.decode_jmp(phase),
            JSR => self.decode_jsr(phase),
            NOP => self.implied(phase, |_| {}),
            PHA => self.decode_pha(phase),
            PHP => self.decode_php(phase),
            PLA => self.decode_pla(phase),
            PLP => self.decode_plp(phase),
            RTI => self.decode_rti(phase),
            RTS => self.decode_rts(phase),
            STX_ZP | STX_ZPY | STX_ABS => self.decode_stx(phase),
            STY_ZP | STY_ZPX | STY_ABS => self.decode_sty(phase),
            TAX => self.implied(phase, |c| {
                c.x = c.a;
                c.p.set_nz(c.x);
            }),
            TAY => self.implied(phase, |c| {
                c.y = c.a;
                c.p.set_nz(c.y);
            }),
            TSX => self.implied(phase, |c| {
                c.x = c.sp;
                c.p.set_nz(c.x);
            }),
            TXA => self.implied(phase, |c| {
                c.a = c.x;
                c.p.set_nz(c.a);
            }),
            TXS => self.implied(phase, |c| c.sp = c.x),
            TYA => self.implied(phase, |c| {
                c.a = c.y;
                c.p.set_nz(c.a);
            }),
            _ => {
                // undocumented opcode: behave as a one-cycle NOP rather than
                // wedging the decode_cycle state machine.
                self.decode_cycle = -1;
            }
        }
    }

    fn decode_jmp(&mut self, phase: Phase) {
        let memop_cycle = if self.ir == JMP_ABS {
            self.fetch_address_absolute(phase)
        } else {
            self.fetch_address_indirect(phase)
        };
        if self.decode_cycle == memop_cycle - 1 && phase == Phase::End {
            self.pc = self.addr();
            self.decode_cycle = -1;
        }
    }

    fn decode_jsr(&mut self, phase: Phase) {
        match self.decode_cycle {
            1 => {
                if let Some(lo) = self.fetch_pc_memory(phase) {
                    self.addr_lo = lo;
                }
            }
            2 => {
                if phase == Phase::Begin {
                    self.out_address = 0x0100 | self.sp as u16;
                }
            }
            3 => {
                let hi = (self.pc >> 8) as u8;
                self.stack_push(hi, phase);
            }
            4 => {
                let lo = (self.pc & 0xff) as u8;
                self.stack_push(lo, phase);
            }
            5 => {
                if let Some(hi) = self.fetch_pc_memory(phase) {
                    self.addr_hi = hi;
                }
                if phase == Phase::End {
                    self.pc = self.addr();
                    self.decode_cycle = -1;
                }
            }
            _ => {}
        }
    }

    fn decode_pha(&mut self, phase: Phase) {
        match self.decode_cycle {
            1 => {
                self.fetch_memory(self.pc, phase);
            }
            2 => {
                let a = self.a;
                self.stack_push(a, phase);
                if phase == Phase::End {
                    self.decode_cycle = -1;
                }
            }
            _ => {}
        }
    }

    fn decode_php(&mut self, phase: Phase) {
        match self.decode_cycle {
            1 => {
                self.fetch_memory(self.pc, phase);
            }
            2 => {
                // PHP also sets the B flag in the pushed copy, per convention.
                let pushed = self.p.bits() | 0b0001_0000;
                self.stack_push(pushed, phase);
                if phase == Phase::End {
                    self.decode_cycle = -1;
                }
            }
            _ => {}
        }
    }

    fn decode_pla(&mut self, phase: Phase) {
        match self.decode_cycle {
            1 => {
                self.fetch_memory(self.pc, phase);
            }
            2 => {
                if phase == Phase::Begin {
                    self.out_address = 0x0100 | self.sp as u16;
                }
            }
            3 => {
                if let Some(v) = self.stack_pop(phase) {
                    self.a = v;
                }
                if phase == Phase::End {
                    self.p.set_nz(self.a);
                    self.decode_cycle = -1;
                }
            }
            _ => {}
        }
    }

    fn decode_plp(&mut self, phase: Phase) {
        match self.decode_cycle {
            1 => {
                self.fetch_memory(self.pc, phase);
            }
            2 => {
                if phase == Phase::Begin {
                    self.out_address = 0x0100 | self.sp as u16;
                }
            }
            3 => {
                if let Some(v) = self.stack_pop(phase) {
                    self.p = StatusFlags::from_bits_truncate(v) | StatusFlags::EXPANSION;
                    self.p.remove(StatusFlags::BREAK);
                }
                if phase == Phase::End {
                    self.decode_cycle = -1;
                }
            }
            _ => {}
        }
    }

    fn decode_rts(&mut self, phase: Phase) {
        match self.decode_cycle {
            1 => {
                if let Some(lo) = self.fetch_pc_memory(phase) {
                    self.addr_lo = lo;
                }
            }
            2 => {
                if phase == Phase::Begin {
                    self.out_address = 0x0100 | self.sp as u16;
                }
            }
            3 => {
                if let Some(v) = self.stack_pop(phase) {
                    self.pc = (self.pc & 0xff00) | v as u16;
                }
            }
            4 => {
                if let Some(v) = self.stack_pop(phase) {
                    self.pc = (self.pc & 0x00ff) | ((v as u16) << 8);
                }
            }
            5 => {
                if self.fetch_pc_memory(phase).is_some() && phase == Phase::End {
                    self.decode_cycle = -1;
                }
            }
            _ => {}
        }
    }

    fn decode_rti(&mut self, phase: Phase) {
        match self.decode_cycle {
            1 => {
                if let Some(lo) = self.fetch_pc_memory(phase) {
                    self.addr_lo = lo;
                }
            }
            2 => {
                if phase == Phase::Begin {
                    self.out_address = 0x0100 | self.sp as u16;
                }
            }
            3 => {
                if let Some(v) = self.stack_pop(phase) {
                    self.p = StatusFlags::from_bits_truncate(v);
                }
                if phase == Phase::End {
                    self.p.set_flag(StatusFlags::BREAK, false);
                }
            }
            4 => {
                if let Some(v) = self.stack_pop(phase) {
                    self.pc = (self.pc & 0xff00) | v as u16;
                }
            }
            5 => {
                if let Some(v) = self.stack_pop(phase) {
                    self.pc = (self.pc & 0x00ff) | ((v as u16) << 8);
                }
                if phase == Phase::End {
                    self.decode_cycle = -1;
                }
            }
            _ => {}
        }
    }
}
