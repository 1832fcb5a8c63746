//! Cycle-accurate emulation of the MOS 6502. Every clock transition invokes
//! [`Cpu6502::process`]; within one clock cycle the CPU passes through three
//! phases — `Begin` (address bus valid), `Middle` (data bus stable for
//! writes), `End` (data latched for reads) — matched by a one-tick-later
//! "delayed" wake-up the chip schedules itself after the falling edge, so
//! address setup for the next cycle happens before the next rising edge.
//!
//! A single decoder dispatches on the instruction register and an
//! instruction-local `decode_cycle` counter (0 = opcode fetch). Addressing
//! modes are driven by small per-group lookup tables keyed on the `bbb` bits
//! of the opcode, matching the 6502's own `aaabbbcc` encoding.

mod decimal;
mod execute;
mod flags;
mod opcodes;

pub use flags::StatusFlags;

use crate::chip::{Chip, PinDirection, ProcessContext};
use crate::signal::{Signal, SignalGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Begin,
    Middle,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Running,
    InIrq,
    InNmi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IntrKind {
    Reset,
    Brk,
    Irq,
    Nmi,
}

impl IntrKind {
    fn force_read(self) -> bool {
        matches!(self, IntrKind::Reset)
    }

    fn vector(self) -> u16 {
        match self {
            IntrKind::Reset => 0xfffc,
            IntrKind::Brk | IntrKind::Irq => 0xfffe,
            IntrKind::Nmi => 0xfffa,
        }
    }
}

pub struct Cpu6502 {
    // registers
    a: u8,
    x: u8,
    y: u8,
    sp: u8,
    pc: u16,
    ir: u8,
    p: StatusFlags,

    // pins
    address: SignalGroup,
    data: SignalGroup,
    clk: Signal,
    reset_b: Signal,
    rw: Signal,
    irq_b: Signal,
    nmi_b: Signal,
    sync: Signal,
    rdy: Signal,
    pins: Vec<Signal>,
    directions: Vec<PinDirection>,

    // decode state
    state: State,
    decode_cycle: i8,
    override_pc: Option<u16>,
    operand: u8,
    addr_lo: u8,
    addr_hi: u8,
    iaddr_lo: u8,
    iaddr_hi: u8,
    page_crossed: bool,
    nmi_triggered: bool,

    // bus bookkeeping
    in_data: u8,
    out_address: u16,
    out_drv_data: bool,
    out_data: u8,
    out_rw: bool,

    // edge detection (this simulator has no built-in "signal changed"
    // notification; each chip that needs one tracks its own last value)
    last_clk: bool,
    last_reset_b: bool,
    last_nmi_b: bool,
    delayed_cycle: bool,

    /// Computed in `process` from the live `irq_b`/`I`-flag state, then
    /// consulted by `execute_phase`'s between-instructions interrupt check.
    irq_asserted: bool,
}

impl Cpu6502 {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: SignalGroup,
        data: SignalGroup,
        clk: Signal,
        reset_b: Signal,
        rw: Signal,
        irq_b: Signal,
        nmi_b: Signal,
        sync: Signal,
        rdy: Signal,
    ) -> Self {
        assert_eq!(data.len(), 8, "CPU data bus must be 8 bits wide");
        assert_eq!(address.len(), 16, "CPU address bus must be 16 bits wide");

        let mut pins = Vec::new();
        let mut directions = Vec::new();
        for &s in address.signals() {
            pins.push(s);
            directions.push(PinDirection::OUTPUT);
        }
        for &s in data.signals() {
            pins.push(s);
            directions.push(PinDirection::INPUT | PinDirection::OUTPUT);
        }
        pins.push(clk);
        directions.push(PinDirection::INPUT | PinDirection::TRIGGER);
        pins.push(reset_b);
        directions.push(PinDirection::INPUT | PinDirection::TRIGGER);
        pins.push(rw);
        directions.push(PinDirection::OUTPUT);
        pins.push(irq_b);
        directions.push(PinDirection::INPUT);
        pins.push(nmi_b);
        directions.push(PinDirection::INPUT);
        pins.push(sync);
        directions.push(PinDirection::OUTPUT);
        pins.push(rdy);
        directions.push(PinDirection::INPUT);

        Cpu6502 {
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            pc: 0,
            ir: 0,
            p: StatusFlags::reset_value(),
            address,
            data,
            clk,
            reset_b,
            rw,
            irq_b,
            nmi_b,
            sync,
            rdy,
            pins,
            directions,
            state: State::Init,
            decode_cycle: -1,
            override_pc: None,
            operand: 0,
            addr_lo: 0,
            addr_hi: 0,
            iaddr_lo: 0,
            iaddr_hi: 0,
            page_crossed: false,
            nmi_triggered: false,
            in_data: 0,
            out_address: 0,
            out_drv_data: false,
            out_data: 0,
            out_rw: true,
            last_clk: false,
            last_reset_b: true,
            last_nmi_b: true,
            delayed_cycle: false,
            irq_asserted: false,
        }
    }

    pub fn a(&self) -> u8 {
        self.a
    }
    pub fn x(&self) -> u8 {
        self.x
    }
    pub fn y(&self) -> u8 {
        self.y
    }
    pub fn sp(&self) -> u8 {
        self.sp
    }
    pub fn pc(&self) -> u16 {
        self.pc
    }
    pub fn status(&self) -> StatusFlags {
        self.p
    }

    /// At the next opcode fetch, substitute `addr` for `PC` — the monitor's
    /// "go to address" primitive.
    pub fn override_next_instruction_address(&mut self, addr: u16) {
        self.override_pc = Some(addr);
    }

    /// True when the SYNC pin will be high on the next evaluation, i.e. the
    /// CPU is about to fetch an opcode byte.
    pub fn is_at_start_of_instruction(&self) -> bool {
        self.decode_cycle == 0
    }

    fn addr(&self) -> u16 {
        (self.addr_hi as u16) << 8 | self.addr_lo as u16
    }

    fn iaddr(&self) -> u16 {
        (self.iaddr_hi as u16) << 8 | self.iaddr_lo as u16
    }

    fn process_end(&mut self, ctx: &mut ProcessContext) {
        let layer = ctx.layer();
        self.address.write_u16(ctx.pool(), layer, self.out_address);

        if self.out_drv_data {
            self.data.write_u8(ctx.pool(), layer, self.out_data);
        } else {
            self.data.clear_writer(ctx.pool(), layer);
        }

        ctx.pool().write(self.rw, layer, self.out_rw);
        ctx.pool().write(self.sync, layer, self.decode_cycle == 0);
    }

    fn execute_phase(&mut self, phase: Phase) {
        self.out_drv_data = false;

        if self.state == State::Init {
            self.interrupt_sequence(phase, IntrKind::Reset);
            return;
        }

        if self.decode_cycle == 0 && phase == Phase::Begin {
            if self.nmi_triggered {
                self.state = State::InNmi;
                self.nmi_triggered = false;
            }
            if self.irq_asserted {
                self.state = State::InIrq;
            }
            if let Some(pc) = self.override_pc.take() {
                self.pc = pc;
            }
        }

        if self.state == State::InIrq {
            self.interrupt_sequence(phase, IntrKind::Irq);
            return;
        }
        if self.state == State::InNmi {
            self.interrupt_sequence(phase, IntrKind::Nmi);
            return;
        }

        if self.decode_cycle == 0 {
            if let Some(opcode) = self.fetch_pc_memory(phase) {
                self.ir = opcode;
            }
        } else {
            self.decode_instruction(phase);
        }
    }
}

impl Chip for Cpu6502 {
    fn pins(&self) -> &[Signal] {
        &self.pins
    }

    fn pin_directions(&self) -> &[PinDirection] {
        &self.directions
    }

    fn process(&mut self, ctx: &mut ProcessContext) {
        let reset_b = ctx.pool().read(self.reset_b);
        let reset_changed = reset_b != self.last_reset_b;
        self.last_reset_b = reset_b;

        if reset_changed {
            if !reset_b {
                self.out_address = 0;
                self.out_rw = true;
            } else {
                self.state = State::Init;
                self.decode_cycle = -1;
                self.delayed_cycle = false;
            }
        }

        let rdy = ctx.pool().read(self.rdy);
        if !reset_b || !rdy {
            self.process_end(ctx);
            return;
        }

        let nmi_b = ctx.pool().read(self.nmi_b);
        if nmi_b != self.last_nmi_b {
            self.nmi_triggered = self.nmi_triggered || !nmi_b;
            self.last_nmi_b = nmi_b;
        }

        let irq_b = ctx.pool().read(self.irq_b);
        self.in_data = self.data.read_u8(ctx.pool());

        let clk = ctx.pool().read(self.clk);
        let clk_changed = clk != self.last_clk;
        self.last_clk = clk;

        // irq_b is active-low: asserted (pending) when the line reads low.
        self.irq_asserted = !irq_b && !self.p.contains(StatusFlags::INTERRUPT_DISABLE);

        if self.delayed_cycle {
            self.delayed_cycle = false;
            self.decode_cycle += 1;
            self.execute_phase(Phase::Begin);
        } else if clk && clk_changed {
            self.execute_phase(Phase::Middle);
        } else if !clk && clk_changed {
            self.execute_phase(Phase::End);
            self.delayed_cycle = true;
            ctx.schedule(ctx.now() + 1);
        }

        self.process_end(ctx);
    }

    fn name(&self) -> &str {
        "cpu6502"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CpuFixture;

    const LDA_IMM: u8 = 0xa9;
    const ADC_IMM: u8 = 0x69;
    const SBC_IMM: u8 = 0xe9;
    const SED: u8 = 0xf8;
    const SEI: u8 = 0x78;
    const CLI: u8 = 0x58;
    const PHP: u8 = 0x08;
    const PLP: u8 = 0x28;
    const BRK: u8 = 0x00;
    const RTI: u8 = 0x40;
    const NOP: u8 = 0xea;

    fn image_with(code: &[u8], load_at: u16, reset_vector: u16) -> Vec<u8> {
        let mut image = vec![0u8; 0x10000];
        image[load_at as usize..load_at as usize + code.len()].copy_from_slice(code);
        image[0xfffc] = (reset_vector & 0xff) as u8;
        image[0xfffd] = (reset_vector >> 8) as u8;
        image
    }

    fn booted(code: &[u8]) -> CpuFixture {
        let image = image_with(code, 0x8000, 0x8000);
        let mut fixture = CpuFixture::new(&image, 0);
        fixture.reset();
        for _ in 0..10 {
            fixture.step();
        }
        fixture
    }

    #[test]
    fn reset_sequence_latches_the_vector_and_sets_interrupt_disable() {
        let image = image_with(&[NOP], 0x8000, 0xc000);
        let mut fixture = CpuFixture::new(&image, 0);
        fixture.reset();
        for _ in 0..20 {
            fixture.step();
        }
        assert_eq!(fixture.cpu().pc(), 0xc000);
        assert!(fixture.cpu().status().contains(StatusFlags::INTERRUPT_DISABLE));
    }

    #[test]
    fn decimal_adc_matches_bruce_clark_reference_vector() {
        // SED; LDA #$58; ADC #$46 with carry set -> $05, carry set (58+46+1 BCD).
        let code = [SED, LDA_IMM, 0x58, 0x38 /* SEC */, ADC_IMM, 0x46];
        let mut fixture = booted(&code);
        fixture.run_instructions(4);
        assert_eq!(fixture.cpu().a(), 0x05);
        assert!(fixture.cpu().status().contains(StatusFlags::CARRY));
        assert!(fixture.cpu().status().contains(StatusFlags::DECIMAL_MODE));
    }

    #[test]
    fn decimal_sbc_matches_reference_vector() {
        // SED; SEC; LDA #$46; SBC #$12 -> $34.
        let code = [SED, 0x38 /* SEC */, LDA_IMM, 0x46, SBC_IMM, 0x12];
        let mut fixture = booted(&code);
        fixture.run_instructions(4);
        assert_eq!(fixture.cpu().a(), 0x34);
    }

    #[test]
    fn php_then_plp_round_trips_status_with_break_set_on_the_pushed_copy() {
        let code = [SEI, PHP, CLI, PLP];
        let mut fixture = booted(&code);
        fixture.run_instructions(1); // SEI
        assert!(fixture.cpu().status().contains(StatusFlags::INTERRUPT_DISABLE));
        fixture.run_instructions(1); // PHP
        fixture.run_instructions(1); // CLI
        assert!(!fixture.cpu().status().contains(StatusFlags::INTERRUPT_DISABLE));
        fixture.run_instructions(1); // PLP
        assert!(fixture.cpu().status().contains(StatusFlags::INTERRUPT_DISABLE));
    }

    #[test]
    fn brk_then_rti_preserves_status_and_returns_to_the_byte_after_the_opcode() {
        // This model treats BRK as consuming only its own opcode byte (the
        // conventional "signature byte" some assemblers emit after BRK is
        // just data here, never fetched/discarded), so RTI returns to
        // BRK's address + 1, not +2.
        let mut fixture = booted(&[BRK, NOP]);
        fixture.poke(0xfffe, 0xff);
        fixture.poke(0xffff, 0x8f); // IRQ/BRK vector -> $8fff
        fixture.poke(0x8fff, RTI);
        fixture.run_instructions(1); // BRK
        assert_eq!(fixture.cpu().pc(), 0x8fff);
        assert!(fixture.cpu().status().contains(StatusFlags::INTERRUPT_DISABLE));

        fixture.run_instructions(1); // RTI
        assert_eq!(fixture.cpu().pc(), 0x8001);
    }

    #[test]
    fn irq_is_ignored_while_interrupt_disable_is_set_and_taken_once_cleared() {
        let code = [SEI, NOP, CLI, NOP, NOP, NOP];
        let mut fixture = booted(&code);
        fixture.poke(0xfffe, 0x00);
        fixture.poke(0xffff, 0x90); // IRQ vector -> $9000
        fixture.poke(0x9000, NOP);

        fixture.run_instructions(1); // SEI
        fixture.set_irq(true);
        fixture.run_instructions(1); // NOP: IRQ must stay pending while I is set
        assert_eq!(fixture.cpu().pc(), 0x8002);

        // CLI clears I; the IRQ is latched at the next instruction boundary
        // and the interrupt sequence runs for several cycles before the
        // vector is actually fetched, so poll a few boundary pulses for it.
        let mut reached_vector = false;
        for _ in 0..4 {
            fixture.run_instructions(1);
            if fixture.cpu().pc() == 0x9000 {
                reached_vector = true;
                break;
            }
        }
        assert!(reached_vector, "IRQ was not taken after CLI cleared the interrupt disable flag");
    }
}
