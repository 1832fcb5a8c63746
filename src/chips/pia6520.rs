//! 6520 Peripheral Interface Adapter: two 8-bit bidirectional ports (A and B),
//! each with a data-direction register, an output register, and a pair of
//! handshake/interrupt control lines (CA1/CA2, CB1/CB2), all multiplexed onto
//! a shared data bus through two register-select lines.
//!
//! Register map, selected by `RS1:RS0`:
//!
//! | RS1 RS0 | read                                   | write        |
//! |---------|----------------------------------------|--------------|
//! | 0 0     | Port A data (if DDRA/OR select=OR) else DDRA | same, or DDRA |
//! | 0 1     | Control register A                    | Control register A (bits 0-5) |
//! | 1 0     | Port B data / DDRB, as above           | same |
//! | 1 1     | Control register B                    | Control register B (bits 0-5) |
//!
//! The control register's bit 2 picks between the output register and the
//! data-direction register on that same address; bits 0-5 are writable, bits
//! 6-7 are read-only interrupt flags the chip sets internally. Bits 3 and 4
//! are reinterpreted depending on bit 5 (CL2 mode select): as the IRQ2 enable
//! and positive-transition-select bits when CA2/CB2 is an input, or as the
//! manual output value and output-submode bits when it is an output.

use crate::chip::{Chip, PinDirection, ProcessContext};
use crate::signal::{Signal, SignalGroup, SignalPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ControlRegister(u8);

impl ControlRegister {
    const IRQ1_ENABLE: u8 = 0b0000_0001;
    const IRQ1_POS_TRANSITION: u8 = 0b0000_0010;
    const DDR_OR_SELECT: u8 = 0b0000_0100;
    const CL2_BIT3: u8 = 0b0000_1000;
    const CL2_BIT4: u8 = 0b0001_0000;
    const CL2_MODE_SELECT: u8 = 0b0010_0000;
    const IRQ2_FLAG: u8 = 0b0100_0000;
    const IRQ1_FLAG: u8 = 0b1000_0000;

    fn raw(self) -> u8 {
        self.0
    }

    /// Bits 0-5 are writable; bits 6-7 are the IRQ flags and are left alone.
    fn apply_write(&mut self, data: u8) {
        self.0 = (self.0 & (Self::IRQ1_FLAG | Self::IRQ2_FLAG)) | (data & 0b0011_1111);
    }

    fn ddr_or_select(self) -> bool {
        self.0 & Self::DDR_OR_SELECT != 0
    }

    fn cl2_mode_select(self) -> bool {
        self.0 & Self::CL2_MODE_SELECT != 0
    }

    /// Bit 3: IRQ2 enable (CA2/CB2 input mode) or manual restore value (output mode).
    fn cl2_bit3(self) -> bool {
        self.0 & Self::CL2_BIT3 != 0
    }

    /// Bit 4: IRQ2 positive-transition select (input mode) or manual-output select (output mode).
    fn cl2_bit4(self) -> bool {
        self.0 & Self::CL2_BIT4 != 0
    }

    fn irq1_enable(self) -> bool {
        self.0 & Self::IRQ1_ENABLE != 0
    }

    fn irq1_pos_transition(self) -> bool {
        self.0 & Self::IRQ1_POS_TRANSITION != 0
    }

    fn irq1_flag(self) -> bool {
        self.0 & Self::IRQ1_FLAG != 0
    }

    fn irq2_flag(self) -> bool {
        self.0 & Self::IRQ2_FLAG != 0
    }

    fn set_irq1_flag(&mut self, v: bool) {
        self.set_bit(Self::IRQ1_FLAG, v);
    }

    fn set_irq2_flag(&mut self, v: bool) {
        self.set_bit(Self::IRQ2_FLAG, v);
    }

    fn set_bit(&mut self, bit: u8, v: bool) {
        if v {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PortLineState {
    prev_cl1: bool,
    prev_cl2: bool,
    active_transition_cl1: bool,
    active_transition_cl2: bool,
    read_port: bool,
    write_port: bool,
}

/// Updates `reg`'s IRQ1/IRQ2 flags from the CL1/CL2 control-line edges and a
/// just-completed port access, mirroring both ports' identical rule set.
fn update_interrupt_flags(reg: &mut ControlRegister, cl1: bool, cl2: bool, state: &mut PortLineState) {
    let irq1_pos = reg.irq1_pos_transition();
    state.active_transition_cl1 =
        (cl1 && !state.prev_cl1 && irq1_pos) || (!cl1 && state.prev_cl1 && !irq1_pos);

    let irq2_pos = reg.cl2_bit4();
    state.active_transition_cl2 = !reg.cl2_mode_select()
        && ((cl2 && !state.prev_cl2 && irq2_pos) || (!cl2 && state.prev_cl2 && !irq2_pos));

    // Reading the peripheral data register clears both IRQ flags.
    if state.read_port {
        reg.set_irq1_flag(false);
        reg.set_irq2_flag(false);
    }

    if state.active_transition_cl1 {
        reg.set_irq1_flag(true);
    }
    if state.active_transition_cl2 {
        reg.set_irq2_flag(true);
    }

    // CL2 in output mode never raises its own IRQ2 flag.
    if reg.cl2_mode_select() {
        reg.set_irq2_flag(false);
    }

    state.prev_cl1 = cl1;
    state.prev_cl2 = cl2;
}

pub struct Pia6520 {
    data: SignalGroup,
    port_a: SignalGroup,
    port_b: SignalGroup,
    ca1: Signal,
    ca2: Signal,
    cb1: Signal,
    cb2: Signal,
    irqa_b: Signal,
    irqb_b: Signal,
    rs0: Signal,
    rs1: Signal,
    reset_b: Signal,
    phi2: Signal,
    cs0: Signal,
    cs1: Signal,
    cs2_b: Signal,
    rw: Signal,

    ddra: u8,
    cra: ControlRegister,
    ora: u8,
    ddrb: u8,
    crb: ControlRegister,
    orb: u8,

    state_a: PortLineState,
    state_b: PortLineState,

    internal_ca2: bool,
    internal_cb2: bool,
    out_irqa_b: bool,
    out_irqb_b: bool,
    out_enabled: bool,
    out_data: u8,
    strobe: bool,
    last_phi2: bool,

    pins: Vec<Signal>,
    directions: Vec<PinDirection>,
}

#[allow(clippy::too_many_arguments)]
impl Pia6520 {
    pub fn new(
        data: SignalGroup,
        port_a: SignalGroup,
        port_b: SignalGroup,
        ca1: Signal,
        ca2: Signal,
        cb1: Signal,
        cb2: Signal,
        irqa_b: Signal,
        irqb_b: Signal,
        rs0: Signal,
        rs1: Signal,
        reset_b: Signal,
        phi2: Signal,
        cs0: Signal,
        cs1: Signal,
        cs2_b: Signal,
        rw: Signal,
    ) -> Self {
        assert_eq!(data.len(), 8, "PIA data bus must be 8 bits wide");
        assert_eq!(port_a.len(), 8, "PIA port A must be 8 bits wide");
        assert_eq!(port_b.len(), 8, "PIA port B must be 8 bits wide");

        // Only RESET_B and PHI2 wake the chip; every other pin is sampled on
        // that edge rather than independently triggering a run.
        let pins = vec![
            reset_b, phi2, ca2, cb2, irqa_b, irqb_b,
        ]
        .into_iter()
        .chain(data.signals().iter().copied())
        .chain(port_a.signals().iter().copied())
        .chain(port_b.signals().iter().copied())
        .collect::<Vec<_>>();

        let mut directions = vec![PinDirection::INPUT | PinDirection::TRIGGER; 2];
        directions.push(PinDirection::OUTPUT); // ca2
        directions.push(PinDirection::OUTPUT); // cb2
        directions.push(PinDirection::OUTPUT); // irqa_b
        directions.push(PinDirection::OUTPUT); // irqb_b
        directions.extend(vec![PinDirection::OUTPUT; data.len()]);
        directions.extend(vec![PinDirection::OUTPUT; port_a.len()]);
        directions.extend(vec![PinDirection::OUTPUT; port_b.len()]);

        Pia6520 {
            data,
            port_a,
            port_b,
            ca1,
            ca2,
            cb1,
            cb2,
            irqa_b,
            irqb_b,
            rs0,
            rs1,
            reset_b,
            phi2,
            cs0,
            cs1,
            cs2_b,
            rw,
            ddra: 0,
            cra: ControlRegister::default(),
            ora: 0,
            ddrb: 0,
            crb: ControlRegister::default(),
            orb: 0,
            state_a: PortLineState::default(),
            state_b: PortLineState::default(),
            internal_ca2: false,
            internal_cb2: false,
            out_irqa_b: true,
            out_irqb_b: true,
            out_enabled: false,
            out_data: 0,
            strobe: false,
            last_phi2: false,
            pins,
            directions,
        }
    }

    fn write_register(&mut self, pool: &mut SignalPool, layer: u8, reg_addr: u8, data: u8) {
        match reg_addr {
            0 => {
                if self.cra.ddr_or_select() {
                    self.ora = data;
                    self.state_a.write_port = true;
                } else {
                    self.ddra = data;
                    self.port_a.clear_writer(pool, layer);
                }
            }
            1 => {
                self.cra.apply_write(data);
                if self.cra.cl2_mode_select() && !self.cra.cl2_bit4() {
                    self.internal_ca2 = true;
                }
            }
            2 => {
                if self.crb.ddr_or_select() {
                    self.orb = data;
                    self.state_b.write_port = true;
                } else {
                    self.ddrb = data;
                    self.port_b.clear_writer(pool, layer);
                }
            }
            3 => {
                self.crb.apply_write(data);
                if self.crb.cl2_mode_select() && !self.crb.cl2_bit4() {
                    self.internal_cb2 = true;
                }
            }
            _ => unreachable!("register select is two bits"),
        }
    }

    fn read_register(&mut self, pool: &SignalPool, reg_addr: u8) -> u8 {
        match reg_addr {
            0 => {
                if self.cra.ddr_or_select() {
                    self.state_a.read_port = true;
                    self.port_a.read_u8(pool)
                } else {
                    self.ddra
                }
            }
            1 => self.cra.raw(),
            2 => {
                if self.crb.ddr_or_select() {
                    self.state_b.read_port = true;
                    self.port_b.read_u8(pool)
                } else {
                    self.ddrb
                }
            }
            3 => self.crb.raw(),
            _ => unreachable!("register select is two bits"),
        }
    }

    fn process_end(&mut self, pool: &mut SignalPool, layer: u8) {
        if self.irqa_b != self.irqb_b {
            if !self.out_irqa_b {
                pool.write(self.irqa_b, layer, false);
            } else {
                pool.clear_writer(self.irqa_b, layer);
            }
            if !self.out_irqb_b {
                pool.write(self.irqb_b, layer, false);
            } else {
                pool.clear_writer(self.irqb_b, layer);
            }
        } else if !self.out_irqa_b || !self.out_irqb_b {
            pool.write(self.irqa_b, layer, false);
        } else {
            pool.clear_writer(self.irqa_b, layer);
        }

        self.port_a.write_masked(pool, layer, self.ora, self.ddra);
        self.port_b.write_masked(pool, layer, self.orb, self.ddrb);

        if self.cra.cl2_mode_select() {
            pool.write(self.ca2, layer, self.internal_ca2);
        } else {
            pool.clear_writer(self.ca2, layer);
        }
        if self.crb.cl2_mode_select() {
            pool.write(self.cb2, layer, self.internal_cb2);
        } else {
            pool.clear_writer(self.cb2, layer);
        }

        if self.out_enabled {
            self.data.write_u8(pool, layer, self.out_data);
        } else {
            self.data.clear_writer(pool, layer);
        }
    }
}

impl Chip for Pia6520 {
    fn pins(&self) -> &[Signal] {
        &self.pins
    }

    fn pin_directions(&self) -> &[PinDirection] {
        &self.directions
    }

    fn process(&mut self, ctx: &mut ProcessContext) {
        let layer = ctx.layer();

        self.state_a.read_port = false;
        self.state_a.write_port = false;
        self.state_b.read_port = false;
        self.state_b.write_port = false;

        let reset_b = ctx.pool().read(self.reset_b);
        if !reset_b {
            self.ddra = 0;
            self.cra = ControlRegister::default();
            self.ora = 0;
            self.ddrb = 0;
            self.crb = ControlRegister::default();
            self.orb = 0;
            self.out_irqa_b = true;
            self.out_irqb_b = true;
        }

        let phi2 = ctx.pool().read(self.phi2);
        let phi2_changed = phi2 != self.last_phi2;
        self.last_phi2 = phi2;

        if !reset_b || !phi2_changed {
            self.process_end(ctx.pool(), layer);
            return;
        }

        let cs0 = ctx.pool().read(self.cs0);
        let cs1 = ctx.pool().read(self.cs1);
        let cs2_b = ctx.pool().read(self.cs2_b);
        self.strobe = cs0 && cs1 && !cs2_b;
        self.out_enabled = false;

        let rs1 = ctx.pool().read(self.rs1);
        let rs0 = ctx.pool().read(self.rs0);
        let reg_addr = ((rs1 as u8) << 1) | rs0 as u8;
        let rw_read = ctx.pool().read(self.rw);

        if phi2 {
            if self.strobe && rw_read {
                self.out_data = self.read_register(ctx.pool(), reg_addr);
                self.out_enabled = true;
            }
        } else {
            if self.strobe {
                if rw_read {
                    self.out_data = self.read_register(ctx.pool(), reg_addr);
                    self.out_enabled = true;
                } else {
                    let data_in = self.data.read_u8(ctx.pool());
                    self.write_register(ctx.pool(), layer, reg_addr, data_in);
                }
            }

            let ca1 = ctx.pool().read(self.ca1);
            let ca2 = ctx.pool().read(self.ca2);
            let cb1 = ctx.pool().read(self.cb1);
            let cb2 = ctx.pool().read(self.cb2);

            update_interrupt_flags(&mut self.cra, ca1, ca2, &mut self.state_a);
            update_interrupt_flags(&mut self.crb, cb1, cb2, &mut self.state_b);

            self.out_irqa_b =
                !((self.cra.irq1_flag() && self.cra.irq1_enable()) || (self.cra.irq2_flag() && self.cra.cl2_bit3()));
            self.out_irqb_b =
                !((self.crb.irq1_flag() && self.crb.irq1_enable()) || (self.crb.irq2_flag() && self.crb.cl2_bit3()));

            if self.cra.cl2_mode_select() {
                if self.cra.cl2_bit4() {
                    self.internal_ca2 = self.cra.cl2_bit3();
                } else if self.state_a.read_port {
                    self.internal_ca2 = false;
                } else if self.cra.cl2_bit3() {
                    self.internal_ca2 = true;
                } else {
                    self.internal_ca2 |= self.state_a.active_transition_cl1;
                }
            }
            if self.crb.cl2_mode_select() {
                if self.crb.cl2_bit4() {
                    self.internal_cb2 = self.crb.cl2_bit3();
                } else if self.state_b.write_port {
                    self.internal_cb2 = false;
                } else if self.crb.cl2_bit3() {
                    self.internal_cb2 = true;
                } else {
                    self.internal_cb2 |= self.state_b.active_transition_cl1;
                }
            }
        }

        self.process_end(ctx.pool(), layer);
    }

    fn name(&self) -> &str {
        "pia6520"
    }
}
