//! Recording stand-ins for the printhead and carriage hardware
//!
//! A [`Bench`] is a shared recorder. Pins and delays handed out by it implement the
//! `embedded-hal` 1.0 traits, and every line write, line read and delay is appended
//! to one ordered event log with a simulated timestamp. Delays advance the clock,
//! line accesses take no time.
//!
//! Inputs hold a steady level and can be scripted with a queue of levels that are
//! returned first, one per read, which is how a READY line that comes up late or an
//! endstop that triggers after a number of steps is modelled.
//!
//! Used by the unit tests and by the dry-run console on a workstation.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorKind, InputPin, OutputPin};

use crate::clock::ReferenceClock;
use crate::xaar128::{Error, Line};

/// Something that happened on the bench
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An output was driven. `was` is the level before, `None` for the first write.
    Set {
        /// Driven line
        line: Line,
        /// New level
        high: bool,
        /// Previous level
        was: Option<bool>,
    },
    /// An input was sampled
    Read {
        /// Sampled line
        line: Line,
        /// Returned level
        high: bool,
    },
    /// Time passed
    Delay {
        /// Length of the wait
        ns: u64,
    },
}

/// An [`EventKind`] stamped with the simulated time it happened at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Nanoseconds since the bench was created
    pub at_ns: u64,
    /// What happened
    pub kind: EventKind,
}

/// One bit captured on a rising SCK edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftedBit {
    /// Chip select lines that were low at the edge
    pub selected: (bool, bool),
    /// Level of MOSI at the edge
    pub data: bool,
}

/// Injected line failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError(
    /// Line the access was attempted on
    pub Line,
);

impl digital::Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Default)]
struct Script {
    queue: VecDeque<bool>,
    steady: bool,
}

#[derive(Default)]
struct State {
    now_ns: u64,
    events: Vec<Event>,
    levels: HashMap<Line, bool>,
    inputs: HashMap<Line, Script>,
    failing: HashSet<Line>,
    clock_hz: Option<u32>,
    realtime: bool,
}

impl State {
    fn push(&mut self, kind: EventKind) {
        let at_ns = self.now_ns;
        self.events.push(Event { at_ns, kind });
    }
}

/// Shared recorder for simulated lines
#[derive(Clone, Default)]
pub struct Bench {
    state: Rc<RefCell<State>>,
}

impl Bench {
    /// Create an empty bench. All inputs read low until configured.
    pub fn new() -> Self {
        Bench::default()
    }

    /// Create a bench whose delays also sleep the calling thread for their duration
    ///
    /// Used by the dry-run console so operator facing timing looks right.
    pub fn realtime() -> Self {
        let bench = Bench::default();
        bench.state.borrow_mut().realtime = true;
        bench
    }

    /// Output pin driving `line`
    pub fn output(&self, line: Line) -> SimOutput {
        SimOutput {
            line,
            bench: self.clone(),
        }
    }

    /// Input pin sampling `line`
    pub fn input(&self, line: Line) -> SimInput {
        SimInput {
            line,
            bench: self.clone(),
        }
    }

    /// Delay provider advancing the bench clock
    pub fn delay(&self) -> SimDelay {
        SimDelay {
            bench: self.clone(),
        }
    }

    /// Reference clock recording the frequency it was started at
    pub fn clock(&self) -> SimClock {
        SimClock {
            bench: self.clone(),
        }
    }

    /// Hold an input at a steady level, dropping any scripted levels
    pub fn set_input(&self, line: Line, high: bool) {
        let mut state = self.state.borrow_mut();
        let script = state.inputs.entry(line).or_default();
        script.queue.clear();
        script.steady = high;
    }

    /// Return `levels` on the next reads of `line`, then hold it at `then`
    pub fn script_input(&self, line: Line, levels: impl IntoIterator<Item = bool>, then: bool) {
        let mut state = self.state.borrow_mut();
        let script = state.inputs.entry(line).or_default();
        script.queue = levels.into_iter().collect();
        script.steady = then;
    }

    /// Make every access to `line` fail from now on
    pub fn fail_line(&self, line: Line) {
        self.state.borrow_mut().failing.insert(line);
    }

    /// Forget recorded events. Line levels and input scripts are kept.
    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    /// Every recorded event in order
    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Every output write as `(line, level)` in order
    pub fn writes(&self) -> Vec<(Line, bool)> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::Set { line, high, .. } => Some((line, high)),
                _ => None,
            })
            .collect()
    }

    /// Levels written to a single line in order
    pub fn writes_to(&self, line: Line) -> Vec<bool> {
        self.writes()
            .into_iter()
            .filter(|(l, _)| *l == line)
            .map(|(_, high)| high)
            .collect()
    }

    /// Current level of an output, `None` if it was never driven
    pub fn level(&self, line: Line) -> Option<bool> {
        self.state.borrow().levels.get(&line).copied()
    }

    /// Number of times an input was sampled
    pub fn reads(&self, line: Line) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Read { line: l, .. } if l == line))
            .count()
    }

    /// Number of low to high transitions written to `line`
    pub fn rising_edges(&self, line: Line) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|e| {
                matches!(e.kind,
                    EventKind::Set { line: l, high: true, was: Some(false) } if l == line)
            })
            .count()
    }

    /// Simulated time since the bench was created
    pub fn elapsed_ns(&self) -> u64 {
        self.state.borrow().now_ns
    }

    /// Frequency the reference clock was started at, if it was
    pub fn clock_hz(&self) -> Option<u32> {
        self.state.borrow().clock_hz
    }

    /// Bits clocked into the head, replaying the event log
    ///
    /// A bit is captured on every rising SCK edge together with the MOSI level and
    /// the chip select levels at that moment.
    pub fn shifted_bits(&self) -> Vec<ShiftedBit> {
        let state = self.state.borrow();
        let mut levels: HashMap<Line, bool> = HashMap::new();
        let mut bits = Vec::new();
        for event in &state.events {
            if let EventKind::Set { line, high, was } = event.kind {
                levels.insert(line, high);
                if line == Line::Sck && high && was == Some(false) {
                    let low = |l: Line| levels.get(&l) == Some(&false);
                    bits.push(ShiftedBit {
                        selected: (low(Line::SelectA), low(Line::SelectB)),
                        data: levels.get(&Line::Mosi).copied().unwrap_or(false),
                    });
                }
            }
        }
        bits
    }

    /// Width of every low pulse written to `line`, in nanoseconds
    pub fn low_pulses_ns(&self, line: Line) -> Vec<u64> {
        let state = self.state.borrow();
        let mut fell_at = None;
        let mut pulses = Vec::new();
        for event in &state.events {
            match event.kind {
                EventKind::Set { line: l, high: false, was: Some(true) } if l == line => {
                    fell_at = Some(event.at_ns);
                }
                EventKind::Set { line: l, high: true, was: Some(false) } if l == line => {
                    if let Some(start) = fell_at.take() {
                        pulses.push(event.at_ns - start);
                    }
                }
                _ => {}
            }
        }
        pulses
    }

    fn drive(&self, line: Line, high: bool) -> Result<(), SimError> {
        let mut state = self.state.borrow_mut();
        if state.failing.contains(&line) {
            return Err(SimError(line));
        }
        let was = state.levels.insert(line, high);
        state.push(EventKind::Set { line, high, was });
        log::trace!("{line} -> {}", if high { "H" } else { "L" });
        Ok(())
    }

    fn sample(&self, line: Line) -> Result<bool, SimError> {
        let mut state = self.state.borrow_mut();
        if state.failing.contains(&line) {
            return Err(SimError(line));
        }
        let script = state.inputs.entry(line).or_default();
        let high = script.queue.pop_front().unwrap_or(script.steady);
        state.push(EventKind::Read { line, high });
        Ok(high)
    }

    fn wait(&self, ns: u64) {
        let realtime = {
            let mut state = self.state.borrow_mut();
            state.push(EventKind::Delay { ns });
            state.now_ns += ns;
            state.realtime
        };
        if realtime {
            std::thread::sleep(std::time::Duration::from_nanos(ns));
        }
    }
}

/// Simulated output line
pub struct SimOutput {
    line: Line,
    bench: Bench,
}

impl digital::ErrorType for SimOutput {
    type Error = SimError;
}

impl OutputPin for SimOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.bench.drive(self.line, false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.bench.drive(self.line, true)
    }
}

/// Simulated input line
pub struct SimInput {
    line: Line,
    bench: Bench,
}

impl digital::ErrorType for SimInput {
    type Error = SimError;
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.bench.sample(self.line)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.bench.sample(self.line).map(|high| !high)
    }
}

/// Simulated delay, advancing the bench clock instead of sleeping
pub struct SimDelay {
    bench: Bench,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.bench.wait(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.bench.wait(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.bench.wait(u64::from(ms) * 1_000_000);
    }
}

/// Simulated reference clock
pub struct SimClock {
    bench: Bench,
}

impl ReferenceClock for SimClock {
    fn start(&mut self, hz: u32) -> Result<(), Error> {
        if hz == 0 {
            return Err(Error::Clock(hz));
        }
        self.bench.state.borrow_mut().clock_hz = Some(hz);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_input_then_steady() {
        let bench = Bench::new();
        let mut ready = bench.input(Line::Ready);
        bench.script_input(Line::Ready, [false, false], true);
        assert_eq!(ready.is_high(), Ok(false));
        assert_eq!(ready.is_high(), Ok(false));
        assert_eq!(ready.is_high(), Ok(true));
        assert_eq!(ready.is_low(), Ok(false));
        assert_eq!(bench.reads(Line::Ready), 4);
    }

    #[test]
    fn pulses_are_timed_by_delays() {
        let bench = Bench::new();
        let mut fire = bench.output(Line::Fire);
        let mut delay = bench.delay();
        fire.set_high().unwrap();
        fire.set_low().unwrap();
        delay.delay_us(3);
        fire.set_high().unwrap();
        assert_eq!(bench.low_pulses_ns(Line::Fire), vec![3_000]);
        assert_eq!(bench.rising_edges(Line::Fire), 1);
    }

    #[test]
    fn failing_line_reports_error() {
        let bench = Bench::new();
        let mut reset = bench.output(Line::Reset);
        bench.fail_line(Line::Reset);
        assert_eq!(reset.set_low(), Err(SimError(Line::Reset)));
        assert!(bench.writes().is_empty());
    }
}
