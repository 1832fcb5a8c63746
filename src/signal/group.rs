//! An ordered sequence of signals treated as a multi-bit bus. Operations on
//! a group are the bit-wise aggregation of the per-signal operations; group
//! size is fixed at construction.

use super::{Signal, SignalPool};
use crate::chip::ChipId;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct SignalGroup {
    signals: Vec<Signal>,
}

impl SignalGroup {
    pub fn new(signals: Vec<Signal>) -> Self {
        assert!(!signals.is_empty(), "a signal group must have at least one line");
        SignalGroup { signals }
    }

    /// Allocate `width` fresh signals from `pool` to form a new group, e.g.
    /// an 8-bit data bus or a 16-bit address bus.
    pub fn create(pool: &mut SignalPool, width: usize) -> Result<Self> {
        let mut signals = Vec::with_capacity(width);
        for _ in 0..width {
            signals.push(pool.create_signal()?);
        }
        Ok(SignalGroup { signals })
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn signal(&self, bit: usize) -> Signal {
        self.signals[bit]
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn add_dependency(&self, pool: &mut SignalPool, chip_id: ChipId) {
        for &s in &self.signals {
            pool.add_dependency(s, chip_id);
        }
    }

    pub fn set_default(&self, pool: &mut SignalPool, value: bool) {
        for &s in &self.signals {
            pool.set_default(s, value);
        }
    }

    /// Read the group as an unsigned integer, LSB = `signals[0]`.
    pub fn read_u16(&self, pool: &SignalPool) -> u16 {
        let mut value = 0u16;
        for (bit, &s) in self.signals.iter().enumerate() {
            if pool.read(s) {
                value |= 1 << bit;
            }
        }
        value
    }

    pub fn read_u8(&self, pool: &SignalPool) -> u8 {
        self.read_u16(pool) as u8
    }

    /// Drive the group from an unsigned integer on `layer`, LSB = `signals[0]`.
    pub fn write_u16(&self, pool: &mut SignalPool, layer: u8, value: u16) {
        for (bit, &s) in self.signals.iter().enumerate() {
            pool.write(s, layer, (value >> bit) & 1 != 0);
        }
    }

    pub fn write_u8(&self, pool: &mut SignalPool, layer: u8, value: u8) {
        self.write_u16(pool, layer, value as u16);
    }

    pub fn clear_writer(&self, pool: &mut SignalPool, layer: u8) {
        for &s in &self.signals {
            pool.clear_writer(s, layer);
        }
    }

    /// Drive only the bits set in `mask`, releasing the rest — the bus
    /// equivalent of a data-direction register gating which lines an output
    /// latch actually controls.
    pub fn write_masked(&self, pool: &mut SignalPool, layer: u8, value: u8, mask: u8) {
        for (bit, &s) in self.signals.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                pool.write(s, layer, (value >> bit) & 1 != 0);
            } else {
                pool.clear_writer(s, layer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_round_trip() {
        let mut pool = SignalPool::new();
        let bus = SignalGroup::create(&mut pool, 8).unwrap();
        let layer = pool.allocate_layer(ChipId(0)).unwrap();
        pool.seal();

        bus.write_u8(&mut pool, layer, 0x5A);
        pool.merge();
        assert_eq!(bus.read_u8(&pool), 0x5A);
    }
}
