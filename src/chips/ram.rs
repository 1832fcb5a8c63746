//! RAM chip: enabled when `CE_B` is low, drives the data bus when `OE_B` is
//! low, and commits a write when `WE_B` is low; releases the bus otherwise.

use crate::chip::{Chip, PinDirection, ProcessContext};
use crate::signal::{Signal, SignalGroup};

pub struct Ram {
    address: SignalGroup,
    data: SignalGroup,
    ce_b: Signal,
    oe_b: Signal,
    we_b: Signal,
    store: Vec<u8>,
    pins: Vec<Signal>,
    directions: Vec<PinDirection>,
}

impl Ram {
    /// `address` must be between 1 and 16 lines wide; the backing store is
    /// sized `1 << address.len()`.
    pub fn new(address: SignalGroup, data: SignalGroup, ce_b: Signal, oe_b: Signal, we_b: Signal) -> Self {
        assert_eq!(data.len(), 8, "RAM data bus must be 8 bits wide");
        assert!(
            address.len() >= 1 && address.len() <= 16,
            "RAM address bus must be 1 to 16 lines wide"
        );
        let size = 1usize << address.len();

        let mut pins = Vec::new();
        let mut directions = Vec::new();
        for &s in address.signals() {
            pins.push(s);
            directions.push(PinDirection::INPUT | PinDirection::TRIGGER);
        }
        for &s in data.signals() {
            pins.push(s);
            directions.push(PinDirection::INPUT | PinDirection::OUTPUT | PinDirection::TRIGGER);
        }
        for &s in [ce_b, oe_b, we_b].iter() {
            pins.push(s);
            directions.push(PinDirection::INPUT | PinDirection::TRIGGER);
        }

        Ram {
            address,
            data,
            ce_b,
            oe_b,
            we_b,
            store: vec![0; size],
            pins,
            directions,
        }
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        self.store[addr as usize % self.store.len()]
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) {
        let len = self.store.len();
        self.store[addr as usize % len] = value;
    }

    pub fn size(&self) -> usize {
        self.store.len()
    }
}

impl Chip for Ram {
    fn pins(&self) -> &[Signal] {
        &self.pins
    }

    fn pin_directions(&self) -> &[PinDirection] {
        &self.directions
    }

    fn process(&mut self, ctx: &mut ProcessContext) {
        let layer = ctx.layer();
        let pool = ctx.pool();

        let chip_enabled = !pool.read(self.ce_b);
        if !chip_enabled {
            self.data.clear_writer(pool, layer);
            return;
        }

        let addr = self.address.read_u16(pool);
        let output_enabled = !pool.read(self.oe_b);
        let write_enabled = !pool.read(self.we_b);

        if output_enabled {
            let value = self.read_byte(addr);
            self.data.write_u8(pool, layer, value);
        } else {
            self.data.clear_writer(pool, layer);
        }

        if write_enabled {
            let value = self.data.read_u8(pool);
            self.write_byte(addr, value);
        }
    }

    fn name(&self) -> &str {
        "ram"
    }
}
