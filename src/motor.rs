//! Carriage stepper
//!
//! Step/direction pulses for an external stepper driver plus endstop homing. There
//! is no encoder. The endstop is the only position reference and everything after a
//! homing run is counted open loop, so drift over many moves is expected.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::poll::poll_until_with;
use crate::xaar128::timing::Timing;
use crate::xaar128::{drive, sense, Error, Line};

/// Direction of carriage travel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Positive step counts, DIR high, towards the endstop
    Positive,
    /// Negative step counts, DIR low, away from the endstop
    Negative,
}

impl Direction {
    /// Direction selected by the sign of a step count. Zero counts as positive.
    pub fn of(steps: i32) -> Self {
        if steps < 0 {
            Direction::Negative
        } else {
            Direction::Positive
        }
    }

    fn dir_level(self) -> bool {
        matches!(self, Direction::Positive)
    }
}

/// Outcome of a homing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Homing {
    /// The endstop triggered after this many steps
    Triggered {
        /// Steps emitted before the endstop was seen
        steps: u32,
    },
    /// The step budget ran out without the endstop triggering
    Exhausted {
        /// Steps emitted, equal to the budget
        steps: u32,
    },
}

impl Homing {
    /// Whether the endstop was reached
    pub fn is_homed(&self) -> bool {
        matches!(self, Homing::Triggered { .. })
    }

    /// Steps emitted during the run
    pub fn steps(&self) -> u32 {
        match *self {
            Homing::Triggered { steps } | Homing::Exhausted { steps } => steps,
        }
    }
}

impl fmt::Display for Homing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Homing::Triggered { steps } => write!(f, "endstop reached after {steps} steps"),
            Homing::Exhausted { steps } => write!(f, "endstop not reached in {steps} steps"),
        }
    }
}

/// Carriage stepper configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarriageConfig {
    /// Length of both the high and the low phase of a step pulse, in microseconds.
    /// This is what sets the carriage speed.
    pub step_half_period_us: u32,
    /// Wait between enabling the driver and the first step, in milliseconds
    pub enable_settle_ms: u32,
    /// Most steps a homing run may take
    pub homing_budget: u32,
    /// Driver ENABLE input is active low
    pub enable_active_low: bool,
}

impl CarriageConfig {
    /// Create the default configuration
    pub const fn new() -> Self {
        Self {
            step_half_period_us: Timing::STEP_HALF_PERIOD_US,
            enable_settle_ms: Timing::MOTOR_ENABLE_SETTLE_MS,
            homing_budget: Timing::HOMING_STEP_BUDGET,
            enable_active_low: true,
        }
    }

    /// Use a different step half period
    pub const fn with_step_half_period_us(mut self, us: u32) -> Self {
        self.step_half_period_us = us;
        self
    }

    /// Use a different homing budget
    pub const fn with_homing_budget(mut self, steps: u32) -> Self {
        self.homing_budget = steps;
        self
    }
}

impl Default for CarriageConfig {
    fn default() -> Self {
        CarriageConfig::new()
    }
}

/// Lines between the controller, the stepper driver and the endstop
pub struct CarriagePins<OUT, IN> {
    /// Step pulse output
    pub step: OUT,
    /// Direction output
    pub dir: OUT,
    /// Driver enable output
    pub enable: OUT,
    /// Endstop input, high when triggered
    pub endstop: IN,
}

/// Stepper driven print carriage
pub struct Carriage<OUT, IN, D> {
    step: OUT,
    dir: OUT,
    enable: OUT,
    endstop: IN,
    delay: D,
    config: CarriageConfig,
    /// Steps since the endstop last triggered, `None` until homed
    position: Option<i64>,
}

impl<OUT, IN, D> Carriage<OUT, IN, D>
where
    OUT: OutputPin,
    IN: InputPin,
    D: DelayNs,
{
    /// Take the carriage lines, leaving the driver disabled
    pub fn new(
        pins: CarriagePins<OUT, IN>,
        delay: D,
        config: CarriageConfig,
    ) -> Result<Self, Error> {
        let CarriagePins {
            step,
            dir,
            enable,
            endstop,
        } = pins;

        let mut carriage = Carriage {
            step,
            dir,
            enable,
            endstop,
            delay,
            config,
            position: None,
        };
        drive(&mut carriage.dir, Line::Dir, false)?;
        drive(&mut carriage.step, Line::Step, false)?;
        carriage.set_enabled(false)?;
        Ok(carriage)
    }

    /// Active configuration
    pub fn config(&self) -> &CarriageConfig {
        &self.config
    }

    /// Steps since the last successful homing run, `None` if never homed
    pub fn position(&self) -> Option<i64> {
        self.position
    }

    /// Move by `steps`, the sign selects the direction
    ///
    /// The driver is enabled, given a moment to settle, pulsed `|steps|` times and
    /// then disabled again unless `keep_enabled` is set. Keeping it enabled holds the
    /// carriage in place between moves of a print job. Returns the number of pulses.
    pub fn advance(&mut self, steps: i32, keep_enabled: bool) -> Result<u32, Error> {
        let direction = Direction::of(steps);
        let count = steps.unsigned_abs();
        log::debug!("Advancing carriage {} steps ({:?})", count, direction);

        self.set_enabled(true)?;
        drive(&mut self.dir, Line::Dir, direction.dir_level())?;
        self.delay.delay_ms(self.config.enable_settle_ms);

        for _ in 0..count {
            self.pulse()?;
        }
        if let Some(position) = self.position.as_mut() {
            *position += i64::from(steps);
        }

        if !keep_enabled {
            self.set_enabled(false)?;
        }
        Ok(count)
    }

    /// Drive towards the endstop until it triggers or the step budget is spent
    ///
    /// The endstop is sampled before the first step and after every step. Running out
    /// of budget is not an error, the returned [`Homing`] says what happened.
    pub fn home(&mut self, keep_enabled: bool) -> Result<Homing, Error> {
        self.set_enabled(true)?;
        drive(&mut self.dir, Line::Dir, Direction::Positive.dir_level())?;
        self.delay.delay_ms(self.config.enable_settle_ms);

        let half_period = self.config.step_half_period_us;
        let endstop = &mut self.endstop;
        let step = &mut self.step;
        let delay = &mut self.delay;
        let mut steps = 0u32;

        let triggered = poll_until_with(
            self.config.homing_budget.saturating_add(1),
            || sense(&mut *endstop, Line::Endstop),
            || {
                steps += 1;
                step_pulse(&mut *step, &mut *delay, half_period)
            },
        )?;

        if !keep_enabled {
            self.set_enabled(false)?;
        }

        let outcome = if triggered {
            self.position = Some(0);
            Homing::Triggered { steps }
        } else {
            self.position = None;
            Homing::Exhausted { steps }
        };
        if outcome.is_homed() {
            log::info!("Homing: {}", outcome);
        } else {
            log::warn!("Homing: {}", outcome);
        }
        Ok(outcome)
    }

    /// Sample the endstop, true when triggered
    pub fn endstop_triggered(&mut self) -> Result<bool, Error> {
        sense(&mut self.endstop, Line::Endstop)
    }

    /// Report the endstop every `interval_ms` until `stop` returns true
    ///
    /// `stop` is checked before each sample. Returns the number of samples taken.
    pub fn watch_endstop(
        &mut self,
        interval_ms: u32,
        mut stop: impl FnMut() -> bool,
        mut report: impl FnMut(bool),
    ) -> Result<u32, Error> {
        let mut samples = 0;
        while !stop() {
            report(self.endstop_triggered()?);
            samples += 1;
            self.delay.delay_ms(interval_ms);
        }
        Ok(samples)
    }

    /// Switch the stepper driver off, releasing holding torque
    pub fn disable(&mut self) -> Result<(), Error> {
        self.set_enabled(false)
    }

    fn pulse(&mut self) -> Result<(), Error> {
        step_pulse(&mut self.step, &mut self.delay, self.config.step_half_period_us)
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), Error> {
        let level = enabled != self.config.enable_active_low;
        drive(&mut self.enable, Line::Enable, level)
    }
}

/// One step: high for a half period, low for a half period
fn step_pulse<P: OutputPin>(
    step: &mut P,
    delay: &mut impl DelayNs,
    half_period_us: u32,
) -> Result<(), Error> {
    drive(step, Line::Step, true)?;
    delay.delay_us(half_period_us);
    drive(step, Line::Step, false)?;
    delay.delay_us(half_period_us);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Bench, SimDelay, SimInput, SimOutput};

    type SimCarriage = Carriage<SimOutput, SimInput, SimDelay>;

    fn carriage(bench: &Bench, config: CarriageConfig) -> SimCarriage {
        let pins = CarriagePins {
            step: bench.output(Line::Step),
            dir: bench.output(Line::Dir),
            enable: bench.output(Line::Enable),
            endstop: bench.input(Line::Endstop),
        };
        let carriage = Carriage::new(pins, bench.delay(), config).unwrap();
        bench.clear_events();
        carriage
    }

    #[test]
    fn starts_disabled() {
        let bench = Bench::new();
        let _carriage = carriage(&bench, CarriageConfig::default());
        assert_eq!(bench.level(Line::Enable), Some(true));
        assert_eq!(bench.level(Line::Step), Some(false));
    }

    #[test]
    fn advance_emits_exactly_abs_steps() {
        let bench = Bench::new();
        let mut carriage = carriage(&bench, CarriageConfig::default());

        assert_eq!(carriage.advance(-1400, true).unwrap(), 1400);
        assert_eq!(bench.rising_edges(Line::Step), 1400);
        assert_eq!(bench.level(Line::Dir), Some(false));
        assert_eq!(bench.level(Line::Enable), Some(false));

        bench.clear_events();
        assert_eq!(carriage.advance(0, false).unwrap(), 0);
        assert_eq!(bench.rising_edges(Line::Step), 0);
        assert_eq!(bench.level(Line::Enable), Some(true));
    }

    #[test]
    fn direction_is_the_only_difference() {
        let forward = Bench::new();
        let mut a = carriage(&forward, CarriageConfig::default());
        a.advance(25, false).unwrap();

        let backward = Bench::new();
        let mut b = carriage(&backward, CarriageConfig::default());
        b.advance(-25, false).unwrap();

        assert_eq!(forward.writes_to(Line::Dir), vec![true]);
        assert_eq!(backward.writes_to(Line::Dir), vec![false]);
        assert_eq!(forward.writes_to(Line::Step), backward.writes_to(Line::Step));
        assert_eq!(forward.elapsed_ns(), backward.elapsed_ns());
        assert_eq!(
            forward.low_pulses_ns(Line::Step),
            backward.low_pulses_ns(Line::Step)
        );
    }

    #[test]
    fn step_timing_follows_half_period() {
        let bench = Bench::new();
        let mut carriage = carriage(&bench, CarriageConfig::default());

        carriage.advance(3, false).unwrap();

        // 1ms enable settle plus 3 full periods of 2 * 1600us
        assert_eq!(bench.elapsed_ns(), 1_000_000 + 3 * 3_200_000);
        // low phase between two steps is one half period
        assert_eq!(bench.low_pulses_ns(Line::Step), vec![1_600_000, 1_600_000]);
    }

    #[test]
    fn home_stops_at_endstop() {
        let bench = Bench::new();
        let mut carriage = carriage(&bench, CarriageConfig::default());
        bench.script_input(Line::Endstop, [false; 10], true);

        let outcome = carriage.home(true).unwrap();

        assert_eq!(outcome, Homing::Triggered { steps: 10 });
        assert_eq!(bench.rising_edges(Line::Step), 10);
        assert_eq!(bench.reads(Line::Endstop), 11);
        assert_eq!(bench.level(Line::Dir), Some(true));
        assert_eq!(carriage.position(), Some(0));
    }

    #[test]
    fn home_already_at_endstop_takes_no_step() {
        let bench = Bench::new();
        let mut carriage = carriage(&bench, CarriageConfig::default());
        bench.set_input(Line::Endstop, true);

        let outcome = carriage.home(false).unwrap();

        assert_eq!(outcome, Homing::Triggered { steps: 0 });
        assert_eq!(bench.writes_to(Line::Step), Vec::<bool>::new());
        assert_eq!(bench.level(Line::Enable), Some(true));
    }

    #[test]
    fn home_gives_up_after_budget() {
        let bench = Bench::new();
        let mut carriage = carriage(&bench, CarriageConfig::default());

        let outcome = carriage.home(false).unwrap();

        assert_eq!(outcome, Homing::Exhausted { steps: 3500 });
        assert!(!outcome.is_homed());
        assert_eq!(bench.rising_edges(Line::Step), 3500);
        assert_eq!(bench.reads(Line::Endstop), 3501);
        assert_eq!(carriage.position(), None);
    }

    #[test]
    fn position_counts_from_home() {
        let bench = Bench::new();
        let mut carriage = carriage(&bench, CarriageConfig::default().with_homing_budget(5));

        carriage.advance(-10, false).unwrap();
        assert_eq!(carriage.position(), None);

        bench.set_input(Line::Endstop, true);
        carriage.home(true).unwrap();
        carriage.advance(-1400, true).unwrap();
        carriage.advance(-1, true).unwrap();
        assert_eq!(carriage.position(), Some(-1401));
    }

    #[test]
    fn watch_endstop_until_input() {
        let bench = Bench::new();
        let mut carriage = carriage(&bench, CarriageConfig::default());
        bench.script_input(Line::Endstop, [false, true], false);

        let mut seen = Vec::new();
        let mut polls = 0;
        let samples = carriage
            .watch_endstop(
                250,
                || {
                    polls += 1;
                    polls > 3
                },
                |triggered| seen.push(triggered),
            )
            .unwrap();

        assert_eq!(samples, 3);
        assert_eq!(seen, vec![false, true, false]);
        assert_eq!(bench.elapsed_ns(), 750_000_000);
    }
}
