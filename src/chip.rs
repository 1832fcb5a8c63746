//! The chip contract: a uniform interface every device (CPU, PIA, RAM, ROM,
//! oscillator, ...) implements so the [`crate::simulator::Simulator`] can
//! drive them without knowing their concrete type. A trait in place of a
//! function-pointer vtable; private state simply lives on the concrete chip
//! type rather than behind an opaque cast.

use crate::signal::SignalPool;

/// Identifies a registered chip. Chips are assigned ids in `0..64` (the
/// dependency-mask width) in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChipId(pub(crate) u8);

impl ChipId {
    pub const MAX_CHIPS: usize = 64;

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The single set bit identifying this chip in a dependency mask.
    pub fn to_mask(self) -> u64 {
        1u64 << self.0
    }

    /// Union this chip's bit into an existing dependency mask.
    pub fn union(self, mask: u64) -> u64 {
        mask | self.to_mask()
    }
}

impl std::fmt::Display for ChipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chip#{}", self.0)
    }
}

bitflags::bitflags! {
    /// Per-pin direction metadata. `INPUT` pins participate in dependency
    /// bookkeeping; `TRIGGER` pins additionally wake the chip on any change;
    /// `OUTPUT` pins may be driven by the chip's writer layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PinDirection: u8 {
        const INPUT   = 0b001;
        const OUTPUT  = 0b010;
        const TRIGGER = 0b100;
    }
}

/// The context handed to a chip's [`Chip::process`] call: the pool to read and
/// write signals on, and a way to request a future wake-up.
pub struct ProcessContext<'a> {
    pub(crate) pool: &'a mut SignalPool,
    pub(crate) chip_id: ChipId,
    pub(crate) layer: Option<u8>,
    pub(crate) now: u64,
    pub(crate) scheduled: Option<u64>,
}

impl<'a> ProcessContext<'a> {
    pub fn pool(&mut self) -> &mut SignalPool {
        self.pool
    }

    pub fn chip_id(&self) -> ChipId {
        self.chip_id
    }

    /// This chip's writer layer, assigned at registration. Panics if the
    /// chip declared no `OUTPUT` pins, since it has nothing to write and
    /// calling this would indicate a bug in the chip.
    pub fn layer(&self) -> u8 {
        self.layer
            .unwrap_or_else(|| panic!("{} has no writer layer (no OUTPUT pins declared)", self.chip_id))
    }

    /// The current tick (picoseconds), as of entry to this `process` call.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Request a future wake-up for this chip. Overwrites any earlier request
    /// made during the same `process` call with the earliest of the two,
    /// matching the scheduler's de-duplication rule.
    ///
    /// Panics if `timestamp` is not strictly in the future: a chip requesting
    /// a wake-up in the past is a contract violation.
    pub fn schedule(&mut self, timestamp: u64) {
        assert!(
            timestamp > self.now,
            "{} requested a wake-up at {timestamp} which is not after the current tick {}",
            self.chip_id,
            self.now
        );
        self.scheduled = Some(match self.scheduled {
            Some(existing) => existing.min(timestamp),
            None => timestamp,
        });
    }
}

/// The uniform behavior every simulated device implements.
///
/// A chip MUST NOT mutate any other chip's state, hold references across
/// calls to `process`, or assume any particular evaluation order within a
/// batch of chips woken up on the same tick.
pub trait Chip {
    /// Pin signals owned by this chip, in a stable, chip-defined order.
    fn pins(&self) -> &[crate::signal::Signal];

    /// Direction metadata, parallel to [`Chip::pins`].
    fn pin_directions(&self) -> &[PinDirection];

    /// Re-evaluate the chip: read the pool (previous tick's merged values),
    /// write to this chip's own writer layer, and optionally request a
    /// future wake-up via [`ProcessContext::schedule`].
    fn process(&mut self, ctx: &mut ProcessContext);

    /// Whether this chip should be invoked on every tick regardless of
    /// dependency changes or scheduled wake-ups.
    fn always_active(&self) -> bool {
        false
    }

    /// A short, human-readable name used in logs and diagnostics.
    fn name(&self) -> &str;
}
