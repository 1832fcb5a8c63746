//! Shared pool+chip bootstrap for isolated unit tests, mirroring
//! [`crate::devices::minimal_6502::Minimal6502`]'s wiring but with a flat
//! 64K memory in place of the RAM/ROM split, so a single chip (the CPU, most
//! often) can be driven without pulling in bus-select decoding that belongs
//! to a device, not the chip under test.

#![cfg(test)]

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use crate::chip::{Chip, PinDirection, ProcessContext};
use crate::chips::cpu6502::Cpu6502;
use crate::chips::oscillator::Oscillator;
use crate::devices::{ResetLine, SharedChip};
use crate::signal::{Signal, SignalGroup};
use crate::simulator::Simulator;

/// Combinational 64K memory: drives the data bus from `bytes[address]` while
/// `RW` reads high, latches the data bus into `bytes[address]` while it reads
/// low. No access delay, no chip-select — good enough to exercise CPU decode
/// timing without modeling real RAM/ROM parts.
pub(crate) struct FlatMemory {
    address: SignalGroup,
    data: SignalGroup,
    rw: Signal,
    pins: Vec<Signal>,
    directions: Vec<PinDirection>,
    bytes: Vec<u8>,
}

impl FlatMemory {
    pub(crate) fn new(address: SignalGroup, data: SignalGroup, rw: Signal) -> Self {
        let mut pins: Vec<Signal> = address.signals().to_vec();
        let mut directions = vec![PinDirection::INPUT | PinDirection::TRIGGER; pins.len()];
        pins.extend(data.signals());
        directions.extend(vec![PinDirection::INPUT | PinDirection::OUTPUT; data.len()]);
        pins.push(rw);
        directions.push(PinDirection::INPUT | PinDirection::TRIGGER);

        FlatMemory {
            address,
            data,
            rw,
            pins,
            directions,
            bytes: vec![0u8; 0x1_0000],
        }
    }

    pub(crate) fn load(&mut self, at: u16, image: &[u8]) {
        let start = at as usize;
        self.bytes[start..start + image.len()].copy_from_slice(image);
    }
}

impl Chip for FlatMemory {
    fn pins(&self) -> &[Signal] {
        &self.pins
    }

    fn pin_directions(&self) -> &[PinDirection] {
        &self.directions
    }

    fn process(&mut self, ctx: &mut ProcessContext) {
        let addr = self.address.read_u16(ctx.pool());
        let reading = ctx.pool().read(self.rw);
        let layer = ctx.layer();
        if reading {
            self.data.write_u8(ctx.pool(), layer, self.bytes[addr as usize]);
        } else {
            self.data.clear_writer(ctx.pool(), layer);
            self.bytes[addr as usize] = self.data.read_u8(ctx.pool());
        }
    }

    fn name(&self) -> &str {
        "flat_memory"
    }
}

/// Drives two independent active-low lines from shared flags, the same
/// one-chip-one-layer shape as [`ResetLine`] generalized to a pair of pins —
/// lets a test assert `IRQ_B`/`NMI_B` without borrowing a layer it doesn't own.
struct InterruptLines {
    irq_b: Signal,
    nmi_b: Signal,
    pins: Vec<Signal>,
    directions: Vec<PinDirection>,
    irq_asserted: Rc<Cell<bool>>,
    nmi_asserted: Rc<Cell<bool>>,
}

impl InterruptLines {
    fn new(irq_b: Signal, nmi_b: Signal, irq_asserted: Rc<Cell<bool>>, nmi_asserted: Rc<Cell<bool>>) -> Self {
        InterruptLines {
            irq_b,
            nmi_b,
            pins: vec![irq_b, nmi_b],
            directions: vec![PinDirection::OUTPUT; 2],
            irq_asserted,
            nmi_asserted,
        }
    }
}

impl Chip for InterruptLines {
    fn pins(&self) -> &[Signal] {
        &self.pins
    }

    fn pin_directions(&self) -> &[PinDirection] {
        &self.directions
    }

    fn process(&mut self, ctx: &mut ProcessContext) {
        let layer = ctx.layer();
        ctx.pool().write(self.irq_b, layer, !self.irq_asserted.get());
        ctx.pool().write(self.nmi_b, layer, !self.nmi_asserted.get());
    }

    fn always_active(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "interrupt_lines"
    }
}

/// A CPU wired to a flat memory and a free-running 1 MHz oscillator, with
/// `IRQ_B`/`NMI_B` exposed so tests can assert them directly.
pub(crate) struct CpuFixture {
    sim: Simulator,
    cpu: Rc<RefCell<Cpu6502>>,
    memory: Rc<RefCell<FlatMemory>>,
    reset_asserted: Rc<Cell<bool>>,
    irq_asserted: Rc<Cell<bool>>,
    nmi_asserted: Rc<Cell<bool>>,
}

impl CpuFixture {
    pub(crate) fn new(image: &[u8], load_at: u16) -> Self {
        let mut sim = Simulator::new();
        let pool = sim.pool_mut();

        let address = SignalGroup::create(pool, 16).unwrap();
        let data = SignalGroup::create(pool, 8).unwrap();
        let clk = pool.create_signal().unwrap();
        let reset_b = pool.create_signal().unwrap();
        let rw = pool.create_signal().unwrap();
        let irq_b = pool.create_signal().unwrap();
        let nmi_b = pool.create_signal().unwrap();
        let sync = pool.create_signal().unwrap();
        let rdy = pool.create_signal().unwrap();

        pool.set_default(irq_b, true);
        pool.set_default(nmi_b, true);
        pool.set_default(rdy, true);

        let cpu = Rc::new(RefCell::new(Cpu6502::new(
            address.clone(),
            data.clone(),
            clk,
            reset_b,
            rw,
            irq_b,
            nmi_b,
            sync,
            rdy,
        )));
        let mut memory = FlatMemory::new(address, data, rw);
        memory.load(load_at, image);
        let memory = Rc::new(RefCell::new(memory));

        let oscillator = Oscillator::new(clk, 1_000_000.0);
        let reset_asserted = Rc::new(Cell::new(true));
        let reset_line = ResetLine::new(reset_b, reset_asserted.clone());
        let irq_asserted = Rc::new(Cell::new(false));
        let nmi_asserted = Rc::new(Cell::new(false));
        let interrupt_lines = InterruptLines::new(irq_b, nmi_b, irq_asserted.clone(), nmi_asserted.clone());

        sim.register_chip(Box::new(SharedChip::new(cpu.clone())), "cpu").unwrap();
        sim.register_chip(Box::new(SharedChip::new(memory.clone())), "memory").unwrap();
        sim.register_chip(Box::new(oscillator), "oscillator").unwrap();
        sim.register_chip(Box::new(reset_line), "reset_line").unwrap();
        sim.register_chip(Box::new(interrupt_lines), "interrupt_lines").unwrap();
        sim.device_complete();

        CpuFixture {
            sim,
            cpu,
            memory,
            reset_asserted,
            irq_asserted,
            nmi_asserted,
        }
    }

    pub(crate) fn cpu(&self) -> Ref<'_, Cpu6502> {
        self.cpu.borrow()
    }

    pub(crate) fn step(&mut self) {
        self.sim.step();
    }

    /// Matches `Minimal6502::reset`: hold low for two ticks, release on the
    /// third — the 6502 starts its init sequence on the release edge.
    pub(crate) fn reset(&mut self) {
        self.reset_asserted.set(true);
        self.sim.step();
        self.sim.step();
        self.reset_asserted.set(false);
    }

    pub(crate) fn run_instructions(&mut self, count: usize) {
        let mut seen = 0;
        while seen < count {
            self.sim.step();
            if self.cpu.borrow().is_at_start_of_instruction() {
                seen += 1;
            }
        }
    }

    pub(crate) fn set_irq(&mut self, asserted: bool) {
        self.irq_asserted.set(asserted);
    }

    pub(crate) fn set_nmi(&mut self, asserted: bool) {
        self.nmi_asserted.set(asserted);
    }

    pub(crate) fn poke(&mut self, addr: u16, value: u8) {
        self.memory.borrow_mut().bytes[addr as usize] = value;
    }

    pub(crate) fn peek(&self, addr: u16) -> u8 {
        self.memory.borrow().bytes[addr as usize]
    }
}
