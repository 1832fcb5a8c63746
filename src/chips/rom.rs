//! ROM chip: read-only counterpart to [`super::ram::Ram`]. Only `CE_B`
//! gates it — there is no separate output-enable or write-enable line — and
//! a fresh access incurs a fixed output delay before the data bus settles.

use crate::chip::{Chip, PinDirection, ProcessContext};
use crate::signal::{Signal, SignalGroup};

pub struct Rom {
    address: SignalGroup,
    data: SignalGroup,
    ce_b: Signal,
    store: Vec<u8>,
    output_delay_ps: u64,
    last_ce_b: bool,
    last_address: u16,
    settled: bool,
    pins: Vec<Signal>,
    directions: Vec<PinDirection>,
}

impl Rom {
    /// `address` must be between 1 and 16 lines wide; the backing store is
    /// sized `1 << address.len()`. `output_delay_ps` models the chip's access
    /// time: after `CE_B` asserts or the address changes, the data bus does
    /// not settle to the new value until that many picoseconds later.
    pub fn new(address: SignalGroup, data: SignalGroup, ce_b: Signal, output_delay_ps: u64) -> Self {
        assert_eq!(data.len(), 8, "ROM data bus must be 8 bits wide");
        assert!(
            address.len() >= 1 && address.len() <= 16,
            "ROM address bus must be 1 to 16 lines wide"
        );
        let size = 1usize << address.len();

        let mut pins = Vec::new();
        let mut directions = Vec::new();
        for &s in address.signals() {
            pins.push(s);
            directions.push(PinDirection::INPUT | PinDirection::TRIGGER);
        }
        pins.push(ce_b);
        directions.push(PinDirection::INPUT | PinDirection::TRIGGER);
        for &s in data.signals() {
            pins.push(s);
            directions.push(PinDirection::OUTPUT);
        }

        Rom {
            address,
            data,
            ce_b,
            store: vec![0; size],
            output_delay_ps,
            last_ce_b: false,
            last_address: 0,
            settled: false,
            pins,
            directions,
        }
    }

    /// Load a program image at offset 0, truncating anything past the chip's
    /// capacity.
    pub fn load(&mut self, image: &[u8]) {
        let len = image.len().min(self.store.len());
        self.store[..len].copy_from_slice(&image[..len]);
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        self.store[addr as usize % self.store.len()]
    }

    pub fn size(&self) -> usize {
        self.store.len()
    }
}

impl Chip for Rom {
    fn pins(&self) -> &[Signal] {
        &self.pins
    }

    fn pin_directions(&self) -> &[PinDirection] {
        &self.directions
    }

    fn process(&mut self, ctx: &mut ProcessContext) {
        let layer = ctx.layer();
        let now = ctx.now();
        let ce_b = ctx.pool().read(self.ce_b);

        if ce_b {
            self.data.clear_writer(ctx.pool(), layer);
            self.last_ce_b = ce_b;
            self.settled = false;
            return;
        }

        let address = self.address.read_u16(ctx.pool());
        let ce_changed = ce_b != self.last_ce_b;
        self.last_ce_b = ce_b;

        if ce_changed || address != self.last_address || !self.settled {
            self.last_address = address;
            self.settled = false;
            ctx.schedule(now + self.output_delay_ps);
            return;
        }

        let value = self.read_byte(self.last_address);
        self.data.write_u8(ctx.pool(), layer, value);
        self.settled = true;
    }

    fn name(&self) -> &str {
        "rom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::Simulator;

    #[test]
    fn drives_data_bus_only_after_access_delay() {
        let mut sim = Simulator::new();
        let address = SignalGroup::create(sim.pool_mut(), 4).unwrap();
        let data = SignalGroup::create(sim.pool_mut(), 8).unwrap();
        let ce_b = sim.pool_mut().create_signal().unwrap();
        sim.pool_mut().set_default(ce_b, false);

        let mut rom = Rom::new(address.clone(), data.clone(), ce_b, 60_000);
        rom.load(&[0xAA, 0xBB, 0xCC]);
        sim.register_chip(Box::new(rom), "rom").unwrap();
        sim.device_complete();

        // The settling run in device_complete() only requests the delayed
        // wake-up; the bus is not yet driven.
        assert_eq!(sim.pool().read_next_at_chip(data.signal(0), sim.chip_layer(crate::chip::ChipId(0)).unwrap()), crate::signal::TriState::HighZ);

        sim.step();
        assert_eq!(sim.current_tick(), 60_000);
        assert_eq!(data.read_u8(sim.pool()), 0xAA);
    }

    #[test]
    fn releases_bus_when_not_enabled() {
        let mut sim = Simulator::new();
        let address = SignalGroup::create(sim.pool_mut(), 4).unwrap();
        let data = SignalGroup::create(sim.pool_mut(), 8).unwrap();
        let ce_b = sim.pool_mut().create_signal().unwrap();
        sim.pool_mut().set_default(ce_b, true); // disabled by default
        sim.pool_mut().set_default(data.signal(0), true);

        let rom = Rom::new(address, data.clone(), ce_b, 60_000);
        sim.register_chip(Box::new(rom), "rom").unwrap();
        sim.device_complete();

        assert!(data.read_u8(sim.pool()) & 1 != 0); // falls back to the default
    }
}
