//! The signal pool: per-signal current value, per-writer-layer next
//! value/mask, default value, and dependency bitmask, organized as six 64-bit
//! blocks for bitmap efficiency.

mod group;

pub use group::SignalGroup;

use crate::chip::ChipId;
use crate::error::{Error, Result};
use std::collections::HashMap;

pub const BLOCK_SIZE: usize = 64;
pub const BLOCK_COUNT: usize = 6;
pub const MAX_SIGNALS: usize = BLOCK_SIZE * BLOCK_COUNT;
pub const MAX_LAYERS: usize = ChipId::MAX_CHIPS;

/// An identifier of a single-bit electrical net. The NULL signal (index 0) is
/// reserved to detect uninitialized references — operations on it are either
/// a silent no-op (writes) or a panic (reads), never a normal signal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal(u32);

impl Signal {
    pub const NULL: Signal = Signal(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn from_index(index: usize) -> Signal {
        Signal(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }

    fn block(self) -> usize {
        self.index() / BLOCK_SIZE
    }

    fn bit(self) -> u64 {
        1u64 << (self.index() % BLOCK_SIZE)
    }
}

/// Diagnostic readout of what a single writer layer is currently driving on a
/// signal: a read-only three-valued view over that layer's `(mask, value)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    Low,
    High,
    HighZ,
}

struct LayerBlocks {
    value: [u64; BLOCK_COUNT],
    mask: [u64; BLOCK_COUNT],
}

impl LayerBlocks {
    fn new() -> Self {
        LayerBlocks {
            value: [0; BLOCK_COUNT],
            mask: [0; BLOCK_COUNT],
        }
    }
}

/// Holds per-signal current value, per-writer next value/mask, change
/// bookkeeping, and the dependency map driving chip wake-ups.
pub struct SignalPool {
    signal_count: u32,
    sealed: bool,
    layer_count: u8,
    layer_owner: [Option<ChipId>; MAX_LAYERS],

    current: [u64; BLOCK_COUNT],
    default: [u64; BLOCK_COUNT],
    dependency: Vec<u64>,

    layers: Vec<LayerBlocks>,
    touched_blocks: u64,

    names: Vec<Option<String>>,
    name_index: HashMap<String, Signal>,
}

impl SignalPool {
    pub fn new() -> Self {
        SignalPool {
            signal_count: 1, // index 0 reserved for NULL
            sealed: false,
            layer_count: 0,
            layer_owner: [None; MAX_LAYERS],
            current: [0; BLOCK_COUNT],
            default: [0; BLOCK_COUNT],
            dependency: vec![0u64; MAX_SIGNALS],
            layers: Vec::new(),
            touched_blocks: 0,
            names: vec![None; MAX_SIGNALS],
            name_index: HashMap::new(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    /// Allocate a new writer layer for `chip`, in ascending order. Fails if
    /// all 64 layers are already claimed.
    pub(crate) fn allocate_layer(&mut self, chip: ChipId) -> Result<u8> {
        let layer = self.layer_count;
        if layer as usize >= MAX_LAYERS {
            return Err(Error::TooManyChips { max: MAX_LAYERS });
        }
        self.layer_owner[layer as usize] = Some(chip);
        self.layers.push(LayerBlocks::new());
        self.layer_count += 1;
        Ok(layer)
    }

    pub fn create_signal(&mut self) -> Result<Signal> {
        if self.signal_count as usize >= MAX_SIGNALS {
            return Err(Error::SignalPoolExhausted { max: MAX_SIGNALS });
        }
        let signal = Signal(self.signal_count);
        self.signal_count += 1;
        Ok(signal)
    }

    pub fn name(&mut self, signal: Signal, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if self.name_index.contains_key(&text) {
            return Err(Error::DuplicateSignalName(text));
        }
        self.name_index.insert(text.clone(), signal);
        self.names[signal.index()] = Some(text);
        Ok(())
    }

    pub fn by_name(&self, text: &str) -> Result<Signal> {
        self.name_index
            .get(text)
            .copied()
            .ok_or_else(|| Error::UnknownSignalName(text.to_string()))
    }

    pub fn signal_name(&self, signal: Signal) -> Option<&str> {
        self.names[signal.index()].as_deref()
    }

    pub fn set_default(&mut self, signal: Signal, value: bool) {
        if signal.is_null() {
            return;
        }
        let block = signal.block();
        let bit = signal.bit();
        if value {
            self.default[block] |= bit;
        } else {
            self.default[block] &= !bit;
        }
    }

    /// Union `chip_id` into the signal's dependency mask. Bit `b` is set on
    /// signal `s` iff chip `b` declares `s` as an input or trigger pin.
    pub fn add_dependency(&mut self, signal: Signal, chip_id: ChipId) {
        if signal.is_null() {
            return;
        }
        self.dependency[signal.index()] = chip_id.union(self.dependency[signal.index()]);
    }

    pub fn dependency_mask(&self, signal: Signal) -> u64 {
        if signal.is_null() {
            0
        } else {
            self.dependency[signal.index()]
        }
    }

    /// The merged value from the *previous* tick; constant across a tick.
    ///
    /// Panics on the NULL signal: reading an uninitialized reference is a
    /// contract violation.
    pub fn read(&self, signal: Signal) -> bool {
        assert!(
            !signal.is_null(),
            "attempted to read the NULL signal (an uninitialized Signal reference)"
        );
        (self.current[signal.block()] & signal.bit()) != 0
    }

    /// Set this layer's next-value bit and mark it active. Writes to the
    /// NULL signal are silently discarded.
    pub fn write(&mut self, signal: Signal, layer: u8, value: bool) {
        if signal.is_null() {
            return;
        }
        assert!(
            self.sealed,
            "signal write before the pool was sealed via device_complete()"
        );
        assert!(
            (layer as usize) < self.layer_count as usize,
            "write to unregistered layer {layer} (pool has {} layers)",
            self.layer_count
        );
        let block = signal.block();
        let bit = signal.bit();
        let layer_blocks = &mut self.layers[layer as usize];
        layer_blocks.mask[block] |= bit;
        if value {
            layer_blocks.value[block] |= bit;
        } else {
            layer_blocks.value[block] &= !bit;
        }
        self.touched_blocks |= 1 << block;
    }

    /// Deactivate this layer's drive of the signal (release to high-Z).
    pub fn clear_writer(&mut self, signal: Signal, layer: u8) {
        if signal.is_null() {
            return;
        }
        if (layer as usize) >= self.layer_count as usize {
            return;
        }
        let block = signal.block();
        let bit = signal.bit();
        let layer_blocks = &mut self.layers[layer as usize];
        layer_blocks.mask[block] &= !bit;
        self.touched_blocks |= 1 << block;
    }

    /// Diagnostic readout of what `layer` is currently driving on `signal`.
    pub fn read_next_at_chip(&self, signal: Signal, layer: u8) -> TriState {
        if signal.is_null() || (layer as usize) >= self.layer_count as usize {
            return TriState::HighZ;
        }
        let block = signal.block();
        let bit = signal.bit();
        let layer_blocks = &self.layers[layer as usize];
        if layer_blocks.mask[block] & bit == 0 {
            TriState::HighZ
        } else if layer_blocks.value[block] & bit != 0 {
            TriState::High
        } else {
            TriState::Low
        }
    }

    /// Merge touched blocks for this tick. Returns the accumulated dependency
    /// mask of chips whose inputs changed.
    ///
    /// Note on encoding: each layer's `value` word stores the bit as driven (1
    /// means "driving high"), same as [`SignalPool::write`]'s `value`
    /// parameter. The local `value` accumulator below inverts that per layer
    /// (`!layer.value[block] & layer.mask[block]`) so that open-drain
    /// wired-AND reduces to a bitwise OR across active layers: any driver
    /// pulling low wins the wire. The inversion lives only in this local
    /// accumulator, not in the per-layer storage.
    pub(crate) fn merge(&mut self) -> u64 {
        let mut dirty_chips = 0u64;
        let mut remaining = self.touched_blocks;
        while remaining != 0 {
            let block = remaining.trailing_zeros() as usize;
            remaining &= remaining - 1;

            let mut value = 0u64;
            let mut combined_mask = 0u64;
            for layer in &self.layers {
                value |= !layer.value[block] & layer.mask[block];
                combined_mask |= layer.mask[block];
            }
            let new_current =
                (!value & combined_mask) | (self.default[block] & !combined_mask);
            let changed = self.current[block] ^ new_current;
            self.current[block] = new_current;

            if changed != 0 {
                let mut bits = changed;
                while bits != 0 {
                    let offset = bits.trailing_zeros() as usize;
                    bits &= bits - 1;
                    let signal = Signal((block * BLOCK_SIZE + offset) as u32);
                    dirty_chips |= self.dependency[signal.index()];
                }
            }
        }
        self.touched_blocks = 0;
        dirty_chips
    }

    /// A snapshot of the current-value blocks, used by the simulator to
    /// diff changes for the optional history sink without re-reading every
    /// signal individually.
    pub(crate) fn current_blocks(&self) -> [u64; BLOCK_COUNT] {
        self.current
    }
}

impl Default for SignalPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with_layers(n: u8) -> (SignalPool, Vec<u8>) {
        let mut pool = SignalPool::new();
        let mut layers = Vec::new();
        for i in 0..n {
            layers.push(pool.allocate_layer(ChipId(i)).unwrap());
        }
        pool.seal();
        (pool, layers)
    }

    #[test]
    fn default_value_with_no_writer() {
        let (mut pool, _layers) = pool_with_layers(1);
        let s = pool.create_signal().unwrap();
        pool.set_default(s, true);
        pool.merge();
        assert!(pool.read(s));
    }

    #[test]
    fn open_drain_any_low_wins() {
        let (mut pool, layers) = pool_with_layers(2);
        let s = pool.create_signal().unwrap();
        pool.set_default(s, true);
        pool.write(s, layers[0], true);
        pool.write(s, layers[1], false);
        pool.merge();
        assert!(!pool.read(s), "one active low driver must win the wire");
    }

    #[test]
    fn releasing_all_writers_reverts_to_default() {
        let (mut pool, layers) = pool_with_layers(1);
        let s = pool.create_signal().unwrap();
        pool.set_default(s, true);
        pool.write(s, layers[0], false);
        pool.merge();
        assert!(!pool.read(s));

        pool.clear_writer(s, layers[0]);
        pool.merge();
        assert!(pool.read(s));
    }

    #[test]
    fn dependency_mask_tracks_declared_chips() {
        let (mut pool, _layers) = pool_with_layers(1);
        let s = pool.create_signal().unwrap();
        pool.add_dependency(s, ChipId(3));
        pool.add_dependency(s, ChipId(5));
        assert_eq!(pool.dependency_mask(s), (1 << 3) | (1 << 5));
    }

    #[test]
    fn merge_only_reports_changed_signals_dependencies() {
        let (mut pool, layers) = pool_with_layers(1);
        let a = pool.create_signal().unwrap();
        let b = pool.create_signal().unwrap();
        pool.add_dependency(a, ChipId(1));
        pool.add_dependency(b, ChipId(2));

        pool.write(a, layers[0], true);
        let dirty = pool.merge();
        assert_eq!(dirty, ChipId(1).to_mask());

        // Writing the same value again produces no change, so no chip wakes.
        pool.write(a, layers[0], true);
        let dirty = pool.merge();
        assert_eq!(dirty, 0);
    }

    #[test]
    fn read_next_at_chip_reports_high_low_and_high_z() {
        let (mut pool, layers) = pool_with_layers(1);
        let s = pool.create_signal().unwrap();

        assert_eq!(pool.read_next_at_chip(s, layers[0]), TriState::HighZ);

        pool.write(s, layers[0], true);
        assert_eq!(pool.read_next_at_chip(s, layers[0]), TriState::High);

        pool.write(s, layers[0], false);
        assert_eq!(pool.read_next_at_chip(s, layers[0]), TriState::Low);

        pool.clear_writer(s, layers[0]);
        assert_eq!(pool.read_next_at_chip(s, layers[0]), TriState::HighZ);
    }

    #[test]
    #[should_panic]
    fn reading_null_signal_panics() {
        let pool = SignalPool::new();
        pool.read(Signal::NULL);
    }

    #[test]
    fn writing_null_signal_is_a_silent_no_op() {
        let (mut pool, layers) = pool_with_layers(1);
        pool.write(Signal::NULL, layers[0], true);
        pool.merge();
    }

    #[test]
    fn named_signals_round_trip() {
        let mut pool = SignalPool::new();
        let s = pool.create_signal().unwrap();
        pool.name(s, "RESET_B").unwrap();
        assert_eq!(pool.by_name("RESET_B").unwrap(), s);
        assert_eq!(pool.signal_name(s), Some("RESET_B"));
    }

    #[test]
    fn duplicate_signal_name_is_an_error() {
        let mut pool = SignalPool::new();
        let a = pool.create_signal().unwrap();
        let b = pool.create_signal().unwrap();
        pool.name(a, "CLOCK").unwrap();
        assert!(pool.name(b, "CLOCK").is_err());
    }
}
