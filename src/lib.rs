//! A cycle-accurate digital logic simulator for MOS 6502 family retro
//! microcomputers: a signal-level event engine ([`signal`], [`scheduler`],
//! [`simulator`]) driving discrete chip models ([`chips`]) wired into
//! complete machines ([`devices`]), with an optional waveform trace sink
//! ([`trace`]) and a textual command interface for interactive control
//! ([`monitor`]).

pub mod chip;
pub mod chips;
pub mod devices;
pub mod error;
pub mod history;
pub mod monitor;
pub mod scheduler;
pub mod signal;
pub mod simulator;
pub mod trace;

#[cfg(test)]
mod test_support;

pub use chip::{Chip, ChipId, PinDirection, ProcessContext};
pub use devices::Device;
pub use error::{Error, Result};
pub use history::{Backpressure, HistoryEntry, SignalHistory};
pub use signal::{Signal, SignalGroup, SignalPool};
pub use simulator::Simulator;
