//! The smallest runnable machine: a 6502, 32K of RAM at `0x0000-0x7FFF`, 32K
//! of ROM at `0x8000-0xFFFF`, and a free-running oscillator driving PHI2.
//! Chip-select decoding is a single combinational gate on the address bus's
//! top bit — real enough to exercise the bus timing the CPU/RAM/ROM chips
//! care about without modeling a full memory map.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use crate::chip::{Chip, ChipId, PinDirection, ProcessContext};
use crate::chips::cpu6502::Cpu6502;
use crate::chips::oscillator::Oscillator;
use crate::chips::ram::Ram;
use crate::chips::rom::Rom;
use crate::signal::{Signal, SignalGroup, SignalPool};
use crate::simulator::Simulator;

use super::{Device, ResetLine, SharedChip};

/// `address.signal(15)` selects ROM (high) vs. RAM (low); also derives RAM's
/// `OE_B`/`WE_B` from the CPU's `R/W` pin, since this minimal machine has no
/// discrete 74-series glue for it. Combinational, no registered state of its
/// own.
struct BusController {
    select: Signal,
    rw: Signal,
    ram_ce_b: Signal,
    rom_ce_b: Signal,
    ram_oe_b: Signal,
    ram_we_b: Signal,
    pins: Vec<Signal>,
    directions: Vec<PinDirection>,
}

impl BusController {
    #[allow(clippy::too_many_arguments)]
    fn new(select: Signal, rw: Signal, ram_ce_b: Signal, rom_ce_b: Signal, ram_oe_b: Signal, ram_we_b: Signal) -> Self {
        BusController {
            select,
            rw,
            ram_ce_b,
            rom_ce_b,
            ram_oe_b,
            ram_we_b,
            pins: vec![select, rw, ram_ce_b, rom_ce_b, ram_oe_b, ram_we_b],
            directions: vec![
                PinDirection::INPUT | PinDirection::TRIGGER,
                PinDirection::INPUT | PinDirection::TRIGGER,
                PinDirection::OUTPUT,
                PinDirection::OUTPUT,
                PinDirection::OUTPUT,
                PinDirection::OUTPUT,
            ],
        }
    }
}

impl Chip for BusController {
    fn pins(&self) -> &[Signal] {
        &self.pins
    }

    fn pin_directions(&self) -> &[PinDirection] {
        &self.directions
    }

    fn process(&mut self, ctx: &mut ProcessContext) {
        let rom_selected = ctx.pool().read(self.select);
        let reading = ctx.pool().read(self.rw);
        let layer = ctx.layer();
        ctx.pool().write(self.ram_ce_b, layer, rom_selected);
        ctx.pool().write(self.rom_ce_b, layer, !rom_selected);
        ctx.pool().write(self.ram_oe_b, layer, !reading);
        ctx.pool().write(self.ram_we_b, layer, reading);
    }

    fn name(&self) -> &str {
        "bus_controller"
    }
}

/// Default tick resolution: 100 picoseconds, the simulator's documented
/// typical resolution.
pub const DEFAULT_PS_PER_TICK: u64 = 1;
/// PHI2 runs at 1 MHz, the canonical minimal-6502 bus speed.
pub const DEFAULT_CLOCK_HZ: f64 = 1_000_000.0;
/// ROM access delay: 60 ns, converted to whatever tick resolution the device
/// is built with by the caller supplying it directly in picoseconds.
pub const DEFAULT_ROM_DELAY_PS: u64 = 60_000;

pub struct Minimal6502 {
    sim: Simulator,
    cpu: Rc<RefCell<Cpu6502>>,
    ram: Rc<RefCell<Ram>>,
    rom: Rc<RefCell<Rom>>,
    reset_asserted: Rc<Cell<bool>>,
}

impl Minimal6502 {
    /// `rom_image` is loaded at ROM offset 0 (address `0x8000` in the memory
    /// map); `rom_access_delay_ps` lets tests pick a delay small enough to
    /// keep step counts readable while still exercising the access-delay
    /// state machine.
    pub fn new(rom_image: &[u8], rom_access_delay_ps: u64) -> Self {
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
        let ram_ce_b = pool.create_signal().unwrap();
        let rom_ce_b = pool.create_signal().unwrap();
        let ram_oe_b = pool.create_signal().unwrap();
        let ram_we_b = pool.create_signal().unwrap();

        pool.name(clk, "PHI2").ok();
        pool.name(reset_b, "RESET_B").ok();
        pool.name(rw, "RW").ok();
        pool.name(sync, "SYNC").ok();

        // Pulled up: no external device asserts these in this minimal machine.
        pool.set_default(irq_b, true);
        pool.set_default(nmi_b, true);
        pool.set_default(rdy, true);

        let ram_address = SignalGroup::new(address.signals()[0..15].to_vec());
        let rom_address = SignalGroup::new(address.signals()[0..15].to_vec());

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
        let ram = Rc::new(RefCell::new(Ram::new(ram_address, data.clone(), ram_ce_b, ram_oe_b, ram_we_b)));
        let rom = Rc::new(RefCell::new(Rom::new(rom_address, data.clone(), rom_ce_b, rom_access_delay_ps)));
        rom.borrow_mut().load(rom_image);

        let oscillator = Oscillator::new(clk, DEFAULT_CLOCK_HZ);
        let bus_controller = BusController::new(address.signal(15), rw, ram_ce_b, rom_ce_b, ram_oe_b, ram_we_b);

        let reset_asserted = Rc::new(Cell::new(true));
        let reset_line = ResetLine::new(reset_b, reset_asserted.clone());

        sim.register_chip(Box::new(SharedChip::new(cpu.clone())), "cpu").unwrap();
        sim.register_chip(Box::new(SharedChip::new(ram.clone())), "ram").unwrap();
        sim.register_chip(Box::new(SharedChip::new(rom.clone())), "rom").unwrap();
        sim.register_chip(Box::new(oscillator), "oscillator").unwrap();
        sim.register_chip(Box::new(bus_controller), "bus_controller").unwrap();
        sim.register_chip(Box::new(reset_line), "reset_line").unwrap();

        sim.device_complete();

        Minimal6502 {
            sim,
            cpu,
            ram,
            rom,
            reset_asserted,
        }
    }

    pub fn cpu(&self) -> Ref<'_, Cpu6502> {
        self.cpu.borrow()
    }

    pub fn run_until(&mut self, mut predicate: impl FnMut(&Minimal6502) -> bool) {
        loop {
            // `Simulator::run_until` borrows `self.sim` mutably for its
            // whole call, so the predicate closure over `&Minimal6502` can't
            // be handed straight through; step one tick at a time instead.
            self.step();
            if predicate(self) {
                break;
            }
        }
    }

    pub fn attach_history(&mut self, history: crate::history::SignalHistory) {
        self.sim.attach_history(history);
    }

    pub fn signal_pool(&self) -> &SignalPool {
        self.sim.pool()
    }

    pub fn chip_layer(&self, chip: ChipId) -> Option<u8> {
        self.sim.chip_layer(chip)
    }
}

impl Device for Minimal6502 {
    fn step(&mut self) {
        self.sim.step();
    }

    /// Drives `RESET_B` low for two ticks, then releases it — the 6502 begins
    /// its seven-cycle init sequence on the release edge, not the assertion.
    fn reset(&mut self) {
        self.reset_asserted.set(true);
        self.sim.step();
        self.sim.step();
        self.reset_asserted.set(false);
    }

    fn current_tick(&self) -> u64 {
        self.sim.current_tick()
    }

    fn read_memory(&self, addr: u16, len: usize) -> Vec<u8> {
        (0..len as u16)
            .map(|offset| {
                let a = addr.wrapping_add(offset);
                if a & 0x8000 != 0 {
                    self.rom.borrow().read_byte(a & 0x7fff)
                } else {
                    self.ram.borrow().read_byte(a)
                }
            })
            .collect()
    }

    fn write_memory(&mut self, addr: u16, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            let a = addr.wrapping_add(offset as u16);
            if a & 0x8000 == 0 {
                self.ram.borrow_mut().write_byte(a, byte);
            }
            // ROM is not writable through this interface; out-of-range
            // writes into the ROM window are silently ignored, matching the
            // physical machine (there is no WE_B pin on the ROM chip).
        }
    }

    fn pc_at_instruction_boundary(&self) -> Option<u16> {
        let cpu = self.cpu.borrow();
        cpu.is_at_start_of_instruction().then(|| cpu.pc())
    }

    fn override_next_fetch(&mut self, addr: u16) {
        self.cpu.borrow_mut().override_next_instruction_address(addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_reset_vector(entry: u16) -> Vec<u8> {
        let mut image = vec![0u8; 0x8000];
        image[0x7ffc] = (entry & 0xff) as u8;
        image[0x7ffd] = (entry >> 8) as u8;
        image
    }

    #[test]
    fn ram_round_trip() {
        let mut device = Minimal6502::new(&vec![0u8; 0x8000], DEFAULT_ROM_DELAY_PS);
        device.write_memory(0x0300, &[0x42]);
        assert_eq!(device.read_memory(0x0300, 1), vec![0x42]);
    }

    #[test]
    fn reset_vector_is_latched_after_seven_cycles() {
        let mut image = rom_with_reset_vector(0xc000);
        image.resize(0x8000, 0);
        let mut device = Minimal6502::new(&image, 0);
        device.reset();
        for _ in 0..20 {
            device.step();
        }
        assert_eq!(device.cpu().pc(), 0xc000);
        assert!(device.cpu().status().contains(crate::chips::cpu6502::StatusFlags::INTERRUPT_DISABLE));
    }
}
