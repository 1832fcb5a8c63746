//! Device assembly: wires concrete chips to named signals to form a runnable
//! machine. [`minimal_6502`] is the one concrete device this crate ships;
//! the shared [`SharedChip`]/[`ResetLine`] plumbing here is what lets a
//! device keep its own typed handle to a chip (for `get_cpu()`-style
//! accessors and `read_memory`/`write_memory`) while the simulator still
//! owns and drives it as a plain `Box<dyn Chip>`.

pub mod minimal_6502;

use crate::chip::{Chip, PinDirection, ProcessContext};
use crate::signal::Signal;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Registers a chip with the simulator while keeping a typed `Rc<RefCell<T>>`
/// handle to it on the device side. Pins, directions and the chip's name are
/// snapshotted once at construction (none of the chips in this crate change
/// them after `new`), so `SharedChip` can hand out `&[Signal]`/`&str` without
/// holding the `RefCell` borrow open across calls.
pub(crate) struct SharedChip<T> {
    inner: Rc<RefCell<T>>,
    pins: Vec<Signal>,
    directions: Vec<PinDirection>,
    name: String,
}

impl<T: Chip> SharedChip<T> {
    pub(crate) fn new(inner: Rc<RefCell<T>>) -> Self {
        let (pins, directions, name) = {
            let chip = inner.borrow();
            (chip.pins().to_vec(), chip.pin_directions().to_vec(), chip.name().to_string())
        };
        SharedChip { inner, pins, directions, name }
    }
}

impl<T: Chip> Chip for SharedChip<T> {
    fn pins(&self) -> &[Signal] {
        &self.pins
    }

    fn pin_directions(&self) -> &[PinDirection] {
        &self.directions
    }

    fn process(&mut self, ctx: &mut ProcessContext) {
        self.inner.borrow_mut().process(ctx);
    }

    fn always_active(&self) -> bool {
        self.inner.borrow().always_active()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A single always-active output pin a device drives directly, used for the
/// `RESET_B` line: `Device::reset()` flips a shared flag, and this chip
/// pushes it onto the signal on the next tick rather than the device poking
/// the pool (and its layer-ownership rule) directly.
pub(crate) struct ResetLine {
    signal: Signal,
    pins: Vec<Signal>,
    directions: Vec<PinDirection>,
    asserted: Rc<Cell<bool>>,
}

impl ResetLine {
    pub(crate) fn new(signal: Signal, asserted: Rc<Cell<bool>>) -> Self {
        ResetLine {
            signal,
            pins: vec![signal],
            directions: vec![PinDirection::OUTPUT],
            asserted,
        }
    }
}

impl Chip for ResetLine {
    fn pins(&self) -> &[Signal] {
        &self.pins
    }

    fn pin_directions(&self) -> &[PinDirection] {
        &self.directions
    }

    fn process(&mut self, ctx: &mut ProcessContext) {
        let layer = ctx.layer();
        // RESET_B is active low: drive low while asserted, release (pulled
        // high by the default) once the device deasserts it.
        ctx.pool().write(self.signal, layer, !self.asserted.get());
    }

    fn always_active(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "reset_line"
    }
}

/// Common shape every assembled device exposes to a UI or monitor, per the
/// device facade: single-step the simulator, reset it, and reach into memory
/// without otherwise exposing the chip registry.
pub trait Device {
    fn step(&mut self);
    fn reset(&mut self);
    fn current_tick(&self) -> u64;
    fn read_memory(&self, addr: u16, len: usize) -> Vec<u8>;
    fn write_memory(&mut self, addr: u16, data: &[u8]);

    /// The CPU's program counter, if this tick landed on an instruction
    /// boundary (SYNC high) — the monitor's `b <hex>`/`g <hex>` commands only
    /// ever match PC at this point. Devices with no CPU of their own (none
    /// exist in this crate yet) can leave the default `None`.
    fn pc_at_instruction_boundary(&self) -> Option<u16> {
        None
    }

    /// Substitute `addr` for PC at the next opcode fetch, the monitor's
    /// `g <hex>` primitive. A no-op on a device with no CPU.
    fn override_next_fetch(&mut self, _addr: u16) {}
}
