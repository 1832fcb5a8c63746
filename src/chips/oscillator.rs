//! A free-running clock: on each wake-up it toggles its output signal,
//! counts positive edges, and self-schedules the next toggle.

use crate::chip::{Chip, PinDirection, ProcessContext};
use crate::signal::Signal;

/// Optional wall-clock pacing helper: a monotonic-clock comparison, not a
/// thread of its own. Best-effort only — it does not promise deterministic
/// real-time playback.
pub struct Pacer {
    tick_duration: std::time::Duration,
    started_at: std::time::Instant,
    start_tick: u64,
}

impl Pacer {
    /// `picoseconds_per_tick` lets the caller convert simulator ticks to
    /// wall-clock duration.
    pub fn starting_now(start_tick: u64, picoseconds_per_tick: u64) -> Self {
        Pacer {
            tick_duration: std::time::Duration::from_nanos(
                (picoseconds_per_tick / 1000).max(1),
            ),
            started_at: std::time::Instant::now(),
            start_tick,
        }
    }

    /// How far (if at all) virtual time has run ahead of real time; `None`
    /// means the simulator is behind or on pace and need not sleep.
    pub fn ahead_by(&self, current_tick: u64) -> Option<std::time::Duration> {
        let virtual_elapsed = self.tick_duration * (current_tick - self.start_tick) as u32;
        let real_elapsed = self.started_at.elapsed();
        virtual_elapsed.checked_sub(real_elapsed)
    }
}

pub struct Oscillator {
    output: Signal,
    pins: Vec<Signal>,
    directions: Vec<PinDirection>,
    half_period_ps: u64,
    cycle_count: u64,
    level: bool,
}

impl Oscillator {
    /// `frequency_hz` is the full-cycle frequency; the chip toggles twice per
    /// period, so it self-schedules at `half_period = 10^12 / (2f)` ps.
    pub fn new(output: Signal, frequency_hz: f64) -> Self {
        let half_period_ps = (1.0e12 / (2.0 * frequency_hz)).round() as u64;
        Oscillator {
            output,
            pins: vec![output],
            directions: vec![PinDirection::OUTPUT],
            half_period_ps,
            cycle_count: 0,
            level: false,
        }
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn half_period_ps(&self) -> u64 {
        self.half_period_ps
    }
}

impl Chip for Oscillator {
    fn pins(&self) -> &[Signal] {
        &self.pins
    }

    fn pin_directions(&self) -> &[PinDirection] {
        &self.directions
    }

    fn process(&mut self, ctx: &mut ProcessContext) {
        self.level = !self.level;
        if self.level {
            self.cycle_count += 1;
        }
        let layer = ctx.layer();
        let now = ctx.now();
        ctx.pool().write(self.output, layer, self.level);
        ctx.schedule(now + self.half_period_ps);
    }

    fn always_active(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "oscillator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::Simulator;

    #[test]
    fn half_period_matches_1mhz() {
        let osc = Oscillator::new(Signal::NULL, 1_000_000.0);
        assert_eq!(osc.half_period_ps(), 500_000);
    }

    #[test]
    fn toggles_and_counts_positive_edges() {
        let mut sim = Simulator::new();
        let clk = sim.pool_mut().create_signal().unwrap();
        let osc = Oscillator::new(clk, 1_000_000.0); // 500_000 ps half period
        sim.register_chip(Box::new(osc), "osc").unwrap();
        sim.device_complete();

        // device_complete's settling run already toggled once: high after tick 0.
        assert!(sim.pool().read(clk));

        sim.step();
        assert_eq!(sim.current_tick(), 500_000);
        assert!(!sim.pool().read(clk));

        sim.step();
        assert_eq!(sim.current_tick(), 1_000_000);
        assert!(sim.pool().read(clk));
    }
}
