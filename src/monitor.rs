//! The textual monitor command interface and the execution-state machine it
//! drives: `{Wait, SingleStep, SingleInstruction, Run, Reset, Exit}`, guarded
//! by one mutex and one condition variable so a UI thread can issue commands
//! while a worker thread owns the device and drives its tick loop. The
//! worker never calls back into the host — it only reads/writes the shared
//! state under the lock.

use crate::devices::Device;
use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};

/// Surfaced to the UI; transitions are total — any state may be overridden
/// by `Reset` or `Exit` from any other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Wait,
    SingleStep,
    SingleInstruction,
    Run,
    Reset,
    Exit,
}

/// A parsed monitor command: `g`/`b`, the two letter-commands the textual
/// interface accepts; `parse` rejects anything else as `NOK: invalid command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Goto(u16),
    ToggleBreakpoint(u16),
}

/// Parse one line of monitor input. Returns the reply text to send back on
/// failure (malformed hex or an unknown command never touch simulator
/// state, per the error-handling design).
pub fn parse(line: &str) -> Result<Command, String> {
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("");
    let arg = parts.next().unwrap_or("").trim();

    let parse_addr = |s: &str| -> Result<u16, String> {
        u16::from_str_radix(s.trim_start_matches("0x"), 16)
            .map_err(|_| format!("NOK: invalid hex address {s:?}"))
    };

    match cmd {
        "g" => parse_addr(arg).map(Command::Goto),
        "b" => parse_addr(arg).map(Command::ToggleBreakpoint),
        _ => Err("NOK: invalid command".to_string()),
    }
}

struct Shared {
    state: ExecutionState,
    breakpoints: HashSet<u16>,
    goto_target: Option<u16>,
}

/// The command channel: commands from a UI thread are applied here under
/// the lock; the worker thread (`Monitor::run`) wakes on the condvar and
/// reacts to the new state.
pub struct Monitor {
    shared: Arc<(Mutex<Shared>, Condvar)>,
}

impl Monitor {
    pub fn new() -> Self {
        Monitor {
            shared: Arc::new((
                Mutex::new(Shared {
                    state: ExecutionState::Wait,
                    breakpoints: HashSet::new(),
                    goto_target: None,
                }),
                Condvar::new(),
            )),
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.shared.0.lock().unwrap().state
    }

    /// Run the device under this monitor's command channel until `Exit` is
    /// requested. Intended to be the body of the worker thread; `Pause` is
    /// realized here as a transition to `Wait`.
    pub fn run(&self, device: &mut impl Device) {
        loop {
            let (state, goto) = {
                let mut guard = self.shared.0.lock().unwrap();
                while guard.state == ExecutionState::Wait {
                    guard = self.shared.1.wait(guard).unwrap();
                }
                (guard.state, guard.goto_target.take())
            };

            match state {
                ExecutionState::Exit => return,
                ExecutionState::Reset => {
                    device.reset();
                    self.set_state(ExecutionState::Wait);
                }
                ExecutionState::SingleStep => {
                    device.step();
                    self.set_state(ExecutionState::Wait);
                }
                ExecutionState::SingleInstruction => {
                    device.step();
                    self.set_state(ExecutionState::Wait);
                }
                ExecutionState::Run => {
                    if let Some(addr) = goto {
                        self.run_until_address(device, addr);
                    } else {
                        device.step();
                        if self.hit_breakpoint(device) {
                            self.set_state(ExecutionState::Wait);
                        }
                    }
                }
                ExecutionState::Wait => unreachable!("woken only on a state change away from Wait"),
            }
        }
    }

    /// `g <hex>` overrides PC and runs until that PC is reached at a SYNC
    /// cycle. The override only takes effect at the device's next opcode
    /// fetch, so this steps until the boundary lands on `addr` rather than
    /// assuming one `step()` suffices — finishing the in-flight instruction's
    /// remaining cycles first.
    fn run_until_address(&self, device: &mut impl Device, addr: u16) {
        device.override_next_fetch(addr);
        loop {
            device.step();
            if device.pc_at_instruction_boundary() == Some(addr) {
                break;
            }
        }
        self.set_state(ExecutionState::Wait);
    }

    /// Matches the CPU's PC against the breakpoint set, but only at an
    /// instruction boundary (SYNC cycle) — mid-instruction PC values are not
    /// valid breakpoint targets.
    fn hit_breakpoint(&self, device: &impl Device) -> bool {
        match device.pc_at_instruction_boundary() {
            Some(pc) => self.shared.0.lock().unwrap().breakpoints.contains(&pc),
            None => false,
        }
    }

    fn set_state(&self, state: ExecutionState) {
        let mut guard = self.shared.0.lock().unwrap();
        guard.state = state;
        self.shared.1.notify_all();
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

/// The UI-side half of the command channel: submit a command line and get a
/// reply, or request a bare state transition (`Run`, `Pause`, `Exit`, ...).
#[derive(Clone)]
pub struct MonitorHandle {
    shared: Arc<(Mutex<Shared>, Condvar)>,
}

impl MonitorHandle {
    pub fn submit(&self, line: &str) -> String {
        match parse(line) {
            Ok(Command::Goto(addr)) => {
                let mut guard = self.shared.0.lock().unwrap();
                guard.goto_target = Some(addr);
                guard.state = ExecutionState::Run;
                self.shared.1.notify_all();
                format!("OK: goto {addr:#06x}")
            }
            Ok(Command::ToggleBreakpoint(addr)) => {
                let mut guard = self.shared.0.lock().unwrap();
                let now_set = if guard.breakpoints.remove(&addr) {
                    false
                } else {
                    guard.breakpoints.insert(addr);
                    true
                };
                format!("OK: breakpoint {addr:#06x} {}", if now_set { "set" } else { "cleared" })
            }
            Err(reply) => reply,
        }
    }

    pub fn request_state(&self, state: ExecutionState) {
        let mut guard = self.shared.0.lock().unwrap();
        guard.state = state;
        self.shared.1.notify_all();
    }

    pub fn breakpoints(&self) -> HashSet<u16> {
        self.shared.0.lock().unwrap().breakpoints.clone()
    }

    pub fn state(&self) -> ExecutionState {
        self.shared.0.lock().unwrap().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_goto_and_breakpoint_commands() {
        assert_eq!(parse("g c000").unwrap(), Command::Goto(0xc000));
        assert_eq!(parse("b 1234").unwrap(), Command::ToggleBreakpoint(0x1234));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(parse("z").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn malformed_hex_is_rejected_without_touching_state() {
        assert!(parse("g zzzz").is_err());
    }

    #[test]
    fn toggle_breakpoint_sets_then_clears() {
        let monitor = Monitor::new();
        let handle = monitor.handle();
        let reply = handle.submit("b c000");
        assert!(reply.contains("set"));
        assert_eq!(handle.breakpoints().len(), 1);

        let reply = handle.submit("b c000");
        assert!(reply.contains("cleared"));
        assert!(handle.breakpoints().is_empty());
    }

    #[test]
    fn state_transitions_are_total() {
        let monitor = Monitor::new();
        let handle = monitor.handle();
        handle.request_state(ExecutionState::Run);
        assert_eq!(monitor.state(), ExecutionState::Run);
        handle.request_state(ExecutionState::Reset);
        assert_eq!(monitor.state(), ExecutionState::Reset);
        handle.request_state(ExecutionState::Exit);
        assert_eq!(monitor.state(), ExecutionState::Exit);
    }

    fn booted_nop_sled() -> crate::devices::minimal_6502::Minimal6502 {
        use crate::devices::minimal_6502::Minimal6502;
        let mut image = vec![0xeau8; 0x8000]; // NOP sled
        image[0x7ffc] = 0x00;
        image[0x7ffd] = 0x80; // reset vector -> 0x8000
        let mut device = Minimal6502::new(&image, 0);
        device.reset();
        for _ in 0..20 {
            device.step();
        }
        device
    }

    #[test]
    fn run_until_address_stops_exactly_at_the_overridden_pc() {
        let mut device = booted_nop_sled();
        let monitor = Monitor::new();

        monitor.run_until_address(&mut device, 0x8010);

        assert_eq!(device.cpu().pc(), 0x8010);
        assert_eq!(monitor.state(), ExecutionState::Wait);
    }

    #[test]
    fn hit_breakpoint_matches_only_at_an_instruction_boundary() {
        let mut device = booted_nop_sled();
        let monitor = Monitor::new();
        monitor.handle().submit("b 8002");

        let mut hit_at = None;
        for _ in 0..40 {
            device.step();
            if monitor.hit_breakpoint(&device) {
                hit_at = Some(device.cpu().pc());
                break;
            }
        }
        assert_eq!(hit_at, Some(0x8002));
    }

    #[test]
    fn hit_breakpoint_ignores_addresses_not_in_the_set() {
        let mut device = booted_nop_sled();
        let monitor = Monitor::new();
        monitor.handle().submit("b 9000");

        for _ in 0..40 {
            device.step();
            assert!(!monitor.hit_breakpoint(&device));
        }
    }
}
