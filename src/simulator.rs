//! Owns the pool, the scheduler, the chip registry, and the monotonically
//! increasing tick counter; drives the tick loop.

use crate::chip::{Chip, ChipId, PinDirection, ProcessContext};
use crate::error::{Error, Result};
use crate::history::{HistoryEntry, SignalHistory};
use crate::scheduler::Scheduler;
use crate::signal::{Signal, SignalPool};
use log::{debug, trace};

struct Registered {
    chip: Box<dyn Chip>,
    layer: Option<u8>,
}

pub struct Simulator {
    pool: SignalPool,
    scheduler: Scheduler,
    chips: Vec<Registered>,
    current_tick: u64,
    dirty_from_last_merge: u64,
    always_active: u64,
    sealed: bool,
    history: Option<SignalHistory>,
}

impl Simulator {
    pub fn new() -> Self {
        Simulator {
            pool: SignalPool::new(),
            scheduler: Scheduler::new(),
            chips: Vec::new(),
            current_tick: 0,
            dirty_from_last_merge: 0,
            always_active: 0,
            sealed: false,
            history: None,
        }
    }

    pub fn pool(&self) -> &SignalPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut SignalPool {
        &mut self.pool
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Attach an optional history sink; the tick loop pushes merged
    /// transitions into it.
    pub fn attach_history(&mut self, history: SignalHistory) {
        self.history = Some(history);
    }

    pub fn history(&self) -> Option<&SignalHistory> {
        self.history.as_ref()
    }

    pub fn history_mut(&mut self) -> Option<&mut SignalHistory> {
        self.history.as_mut()
    }

    /// Register a chip, assigning it the next integer id in `0..64` and, if
    /// it declares any `OUTPUT` pins, the next writer layer in ascending
    /// order.
    pub fn register_chip(&mut self, chip: Box<dyn Chip>, name: &str) -> Result<ChipId> {
        assert!(
            !self.sealed,
            "cannot register chip {name:?} after device_complete() sealed the simulator"
        );
        if self.chips.len() >= ChipId::MAX_CHIPS {
            return Err(Error::TooManyChips {
                max: ChipId::MAX_CHIPS,
            });
        }
        let chip_id = ChipId(self.chips.len() as u8);

        let has_output = chip
            .pin_directions()
            .iter()
            .any(|d| d.contains(PinDirection::OUTPUT));
        let layer = if has_output {
            Some(self.pool.allocate_layer(chip_id)?)
        } else {
            None
        };

        if chip.always_active() {
            self.always_active |= chip_id.to_mask();
        }

        debug!("registered {name} as {chip_id} (layer={layer:?})");
        self.chips.push(Registered { chip, layer });
        Ok(chip_id)
    }

    pub fn chip_layer(&self, chip_id: ChipId) -> Option<u8> {
        self.chips[chip_id.index()].layer
    }

    /// Seal the pool, compute dependency masks from each chip's declared
    /// input/trigger pins, and run an initial cycle so all chips settle to
    /// consistent state.
    pub fn device_complete(&mut self) {
        for (index, registered) in self.chips.iter().enumerate() {
            let chip_id = ChipId(index as u8);
            let pins = registered.chip.pins();
            let directions = registered.chip.pin_directions();
            for (&signal, &direction) in pins.iter().zip(directions.iter()) {
                if direction.intersects(PinDirection::INPUT | PinDirection::TRIGGER) {
                    self.pool.add_dependency(signal, chip_id);
                }
            }
        }
        self.pool.seal();
        self.sealed = true;

        // Run every chip once so outputs settle before the first real tick,
        // then merge so `read()` reflects that initial state.
        for index in 0..self.chips.len() {
            self.process_chip(ChipId(index as u8));
        }
        self.dirty_from_last_merge = self.pool.merge();
    }

    fn process_chip(&mut self, chip_id: ChipId) {
        let layer = self.chips[chip_id.index()].layer;
        let mut ctx = ProcessContext {
            pool: &mut self.pool,
            chip_id,
            layer,
            now: self.current_tick,
            scheduled: None,
        };
        self.chips[chip_id.index()].chip.process(&mut ctx);
        if let Some(timestamp) = ctx.scheduled {
            self.scheduler.schedule(chip_id, timestamp);
        }
    }

    /// Advance exactly one tick.
    ///
    /// Idle ticks are skipped: the simulator jumps directly to the next
    /// event time rather than stepping one tick at a time.
    pub fn step(&mut self) {
        assert!(self.sealed, "step() called before device_complete()");

        let next_scheduled = self.scheduler.peek_next();
        let now = match next_scheduled {
            Some(t) => (self.current_tick + 1).max(t),
            None => self.current_tick + 1,
        };
        self.current_tick = now;

        let due = self.scheduler.pop_due(now);
        let mut work = self.dirty_from_last_merge | self.always_active;
        for chip in &due {
            work |= chip.to_mask();
        }

        let mut remaining = work;
        while remaining != 0 {
            let index = remaining.trailing_zeros() as usize;
            remaining &= remaining - 1;
            if index < self.chips.len() {
                self.process_chip(ChipId(index as u8));
            }
        }

        let before = self.pool.current_blocks();
        self.dirty_from_last_merge = self.pool.merge();
        trace!(
            "tick {now}: {} chip(s) ran, dirty mask for next tick = {:#x}",
            work.count_ones(),
            self.dirty_from_last_merge
        );

        if self.history.is_some() {
            self.emit_history(now, &before);
        }
    }

    fn emit_history(&mut self, tick: u64, before: &[u64; crate::signal::BLOCK_COUNT]) {
        let after = self.pool.current_blocks();
        let history = self.history.as_mut().unwrap();
        for block in 0..crate::signal::BLOCK_COUNT {
            let mut changed = before[block] ^ after[block];
            while changed != 0 {
                let offset = changed.trailing_zeros() as usize;
                changed &= changed - 1;
                let index = block * crate::signal::BLOCK_SIZE + offset;
                if index == 0 {
                    continue; // NULL signal
                }
                let signal = Signal::from_index(index);
                let value = after[block] & (1 << offset) != 0;
                history.push(HistoryEntry {
                    tick,
                    signal,
                    value,
                });
            }
        }
    }

    /// Repeat [`Simulator::step`] until `predicate` holds, evaluated after
    /// every step.
    pub fn run_until(&mut self, mut predicate: impl FnMut(&Simulator) -> bool) {
        while !predicate(self) {
            self.step();
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
