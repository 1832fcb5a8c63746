//! LXT-style waveform trace emission, consuming a drained [`SignalHistory`]:
//! a text preamble declares one symbol per traced signal at 1-bit width,
//! followed by a body of `(timestamp_ps, symbol_id, value)` triples in
//! non-decreasing timestamp order. Picosecond timestamps are derived from
//! tick numbers by the caller-supplied tick period, matching whatever
//! resolution the device was built with.

use crate::history::{HistoryEntry, SignalHistory};
use crate::signal::{Signal, SignalPool};
use std::collections::HashMap;
use std::io::{self, Write};

/// Maps signals to the small dense integer ids the trace body refers to, and
/// writes the declaration preamble naming each one.
pub struct TraceWriter<W: Write> {
    out: W,
    ps_per_tick: u64,
    symbols: HashMap<Signal, u32>,
    next_symbol: u32,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(out: W, ps_per_tick: u64) -> Self {
        TraceWriter {
            out,
            ps_per_tick,
            symbols: HashMap::new(),
            next_symbol: 0,
        }
    }

    /// Declares every signal named in `pool` in signal-creation order, so
    /// reruns of the same device produce stable symbol ids. Unnamed signals
    /// are skipped — a waveform viewer has nothing useful to label them with.
    pub fn declare_named_signals(&mut self, pool: &SignalPool, signals: &[Signal]) -> io::Result<()> {
        for &signal in signals {
            if let Some(name) = pool.signal_name(signal) {
                self.declare(signal, name)?;
            }
        }
        Ok(())
    }

    fn declare(&mut self, signal: Signal, name: &str) -> io::Result<()> {
        let id = self.next_symbol;
        self.next_symbol += 1;
        self.symbols.insert(signal, id);
        writeln!(self.out, "$var wire 1 {id} {name} $end")
    }

    /// Emits every entry whose signal was declared, translating tick numbers
    /// to picoseconds. Entries for undeclared signals are skipped silently —
    /// callers declare the subset of signals they care about up front.
    pub fn write_entries(&mut self, entries: impl IntoIterator<Item = HistoryEntry>) -> io::Result<()> {
        for entry in entries {
            let Some(&id) = self.symbols.get(&entry.signal) else {
                continue;
            };
            let timestamp_ps = entry.tick * self.ps_per_tick;
            writeln!(self.out, "{timestamp_ps} {id} {}", entry.value as u8)?;
        }
        Ok(())
    }

    /// Drains `history` and writes every entry it held. The most common way
    /// to call this: once per batch of simulation steps, right before the
    /// ring would otherwise wrap.
    pub fn drain_history(&mut self, history: &mut SignalHistory) -> io::Result<()> {
        let drained: Vec<_> = history.drain().collect();
        self.write_entries(drained)
    }
}
