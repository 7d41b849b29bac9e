//! Single character command console
//!
//! [`Controller`] owns the printhead and the carriage, so every sequence that moves
//! the carriage between firings runs without anything else touching the lines.
//! Each command is also a plain method, the character mapping in [`Command`] is
//! only one way to reach them.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::motor::{Carriage, Homing};
use crate::patterns::{coarse, PrintJob, TestPattern};
use crate::xaar128::driver::{FiringResult, HeadStatus, Xaar128};
use crate::xaar128::mask::NozzleMask;
use crate::xaar128::timing::Timing;
use crate::xaar128::Error;

/// Banner printed when the console starts
pub const BANNER: &str = "\
--- Xaar 128 Control ---
u - power Up
d - power Down
0..9 - print test pattern
Motor: l=left, r=right, h=home, e=endstop, p, q
Complex: p=print
ALWAYS POWER DOWN BEFORE REPROGRAMMING!";

/// A console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `u`
    PowerUp,
    /// `d`
    PowerDown,
    /// `0`, `1`, `2` or `9`
    Pattern(TestPattern),
    /// `l` (towards the endstop) or `r` (away from it)
    Jog(i32),
    /// `h`
    Home,
    /// `p` or `q`
    Print(PrintJob),
    /// `e`
    WatchEndstop,
}

impl Command {
    /// Parse a console key. Keys without a command give `None`.
    pub fn from_char(c: char) -> Option<Self> {
        let command = match c {
            'u' => Command::PowerUp,
            'd' => Command::PowerDown,
            'l' => Command::Jog(Timing::JOG_STEPS),
            'r' => Command::Jog(-Timing::JOG_STEPS),
            'h' => Command::Home,
            'p' => Command::Print(PrintJob::Bands),
            'q' => Command::Print(PrintJob::Solid),
            'e' => Command::WatchEndstop,
            _ => Command::Pattern(TestPattern::from_char(c)?),
        };
        Some(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PowerUp => write!(f, "power up"),
            Command::PowerDown => write!(f, "power down"),
            Command::Pattern(pattern) => write!(f, "{pattern}"),
            Command::Jog(steps) => write!(f, "jog {steps} steps"),
            Command::Home => write!(f, "home"),
            Command::Print(job) => write!(f, "{job}"),
            Command::WatchEndstop => write!(f, "watch endstop"),
        }
    }
}

/// Exclusive owner of the printhead and the carriage
pub struct Controller<OUT, IN, D> {
    head: Xaar128<OUT, IN, D>,
    carriage: Carriage<OUT, IN, D>,
}

impl<OUT, IN, D> Controller<OUT, IN, D>
where
    OUT: OutputPin,
    IN: InputPin,
    D: DelayNs,
{
    /// Take ownership of an initialised head and carriage
    pub fn new(head: Xaar128<OUT, IN, D>, carriage: Carriage<OUT, IN, D>) -> Self {
        Controller { head, carriage }
    }

    /// The printhead driver
    pub fn head(&mut self) -> &mut Xaar128<OUT, IN, D> {
        &mut self.head
    }

    /// The carriage
    pub fn carriage(&mut self) -> &mut Carriage<OUT, IN, D> {
        &mut self.carriage
    }

    /// Parse and run one console key
    ///
    /// Errors are logged and swallowed so the console keeps running. Returns the
    /// command that was run, if the key mapped to one.
    pub fn handle_key(
        &mut self,
        key: char,
        input_pending: impl FnMut() -> bool,
    ) -> Option<Command> {
        let command = Command::from_char(key)?;
        if let Err(e) = self.dispatch(command, input_pending) {
            log::error!("{} failed: {}", command, e);
        }
        Some(command)
    }

    /// Run one command
    ///
    /// `input_pending` is polled by commands that run until the operator sends
    /// another key. It is not called by any other command.
    pub fn dispatch(
        &mut self,
        command: Command,
        input_pending: impl FnMut() -> bool,
    ) -> Result<(), Error> {
        log::debug!("Command: {}", command);
        match command {
            Command::PowerUp => self.power_up(),
            Command::PowerDown => self.power_down(),
            Command::Pattern(pattern) => self
                .run_test_pattern(pattern, pattern.repeats())
                .map(|_| ()),
            Command::Jog(steps) => self.jog(steps).map(|_| ()),
            Command::Home => self.home().map(|_| ()),
            Command::Print(job) => self.print(job).map(|_| ()),
            Command::WatchEndstop => self.watch_endstop(input_pending).map(|_| ()),
        }
    }

    /// Bring the head up
    pub fn power_up(&mut self) -> Result<(), Error> {
        self.head.power_up()
    }

    /// Take the head down. Call this before removing the 5V supply.
    pub fn power_down(&mut self) -> Result<(), Error> {
        self.head.power_down()
    }

    /// Fire one mask and log the status after the strobe
    pub fn fire(&mut self, mask: &NozzleMask) -> Result<FiringResult, Error> {
        let result = self.head.fire(mask)?;
        log::info!("{}", result);
        Ok(result)
    }

    /// Fire one mask, then move the carriage by `steps` with the driver kept enabled
    ///
    /// Used by print jobs, nothing is logged per firing.
    pub fn fire_and_advance(
        &mut self,
        mask: &NozzleMask,
        steps: i32,
    ) -> Result<FiringResult, Error> {
        let result = self.head.fire(mask)?;
        self.carriage.advance(steps, true)?;
        Ok(result)
    }

    /// Run a test pattern `repeats` times. Returns the number of firings.
    pub fn run_test_pattern(&mut self, pattern: TestPattern, repeats: u32) -> Result<u32, Error> {
        log::info!("{}", pattern);
        let masks = pattern.masks();
        let mut shots = 0;
        for _ in 0..repeats {
            for mask in &masks {
                self.fire(mask)?;
                shots += 1;
                if let Some(gap) = pattern.gap_ms() {
                    self.head.pause_ms(gap);
                }
            }
        }
        log::info!("Pattern 0{} done!", pattern.key());
        Ok(shots)
    }

    /// Move the carriage and release the motor afterwards
    pub fn jog(&mut self, steps: i32) -> Result<u32, Error> {
        self.carriage.advance(steps, false)
    }

    /// Home the carriage and release the motor afterwards
    pub fn home(&mut self) -> Result<Homing, Error> {
        self.carriage.home(false)
    }

    /// Run a canned print job. Returns the number of firings.
    ///
    /// A homing run that does not reach the endstop is logged and the job goes ahead
    /// from wherever the carriage stopped. On error the motor is released before
    /// the error is returned.
    pub fn print(&mut self, job: PrintJob) -> Result<u32, Error> {
        log::info!("Starting {}", job);
        match self.run_print(job) {
            Ok(shots) => {
                log::info!("{} done, {} firings", job, shots);
                Ok(shots)
            }
            Err(e) => {
                if let Err(release) = self.carriage.disable() {
                    log::error!("Could not release motor: {}", release);
                }
                Err(e)
            }
        }
    }

    fn run_print(&mut self, job: PrintJob) -> Result<u32, Error> {
        if !self.carriage.home(true)?.is_homed() {
            log::warn!("Printing without a home position");
        }
        self.carriage.advance(job.back_off(), true)?;

        let mut shots = 0;
        for band in job.bands() {
            let mask = coarse(band);
            for _ in 0..PrintJob::SHOTS_PER_BAND {
                self.fire_and_advance(&mask, PrintJob::STEP_PER_SHOT)?;
                shots += 1;
            }
        }

        // release the motor
        self.carriage.advance(0, false)?;
        Ok(shots)
    }

    /// Log the endstop (`E` triggered, `e` clear) every 250ms until input arrives
    pub fn watch_endstop(&mut self, input_pending: impl FnMut() -> bool) -> Result<u32, Error> {
        self.carriage
            .watch_endstop(Timing::ENDSTOP_SAMPLE_MS, input_pending, |triggered| {
                log::info!("{}", if triggered { 'E' } else { 'e' });
            })
    }

    /// Sample the head status lines
    pub fn status(&mut self) -> Result<HeadStatus, Error> {
        self.head.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::{CarriageConfig, CarriagePins};
    use crate::sim::{Bench, SimDelay, SimInput, SimOutput};
    use crate::xaar128::config::HeadConfig;
    use crate::xaar128::driver::{HeadPins, PowerState};
    use crate::xaar128::Line;

    type SimController = Controller<SimOutput, SimInput, SimDelay>;

    fn controller(bench: &Bench) -> SimController {
        let head = Xaar128::new(
            HeadPins {
                sck: bench.output(Line::Sck),
                mosi: bench.output(Line::Mosi),
                select_a: bench.output(Line::SelectA),
                select_b: bench.output(Line::SelectB),
                fire: bench.output(Line::Fire),
                reset: bench.output(Line::Reset),
                vpph: bench.output(Line::Vpph),
                vppl: bench.output(Line::Vppl),
                ready: bench.input(Line::Ready),
                fault: bench.input(Line::Fault),
            },
            bench.delay(),
            HeadConfig::default(),
        )
        .unwrap();
        let carriage = Carriage::new(
            CarriagePins {
                step: bench.output(Line::Step),
                dir: bench.output(Line::Dir),
                enable: bench.output(Line::Enable),
                endstop: bench.input(Line::Endstop),
            },
            bench.delay(),
            CarriageConfig::default(),
        )
        .unwrap();
        bench.set_input(Line::Ready, true);
        Controller::new(head, carriage)
    }

    fn never() -> bool {
        false
    }

    #[test]
    fn parses_console_keys() {
        assert_eq!(Command::from_char('u'), Some(Command::PowerUp));
        assert_eq!(Command::from_char('d'), Some(Command::PowerDown));
        assert_eq!(Command::from_char('l'), Some(Command::Jog(100)));
        assert_eq!(Command::from_char('r'), Some(Command::Jog(-100)));
        assert_eq!(Command::from_char('h'), Some(Command::Home));
        assert_eq!(Command::from_char('p'), Some(Command::Print(PrintJob::Bands)));
        assert_eq!(Command::from_char('q'), Some(Command::Print(PrintJob::Solid)));
        assert_eq!(Command::from_char('e'), Some(Command::WatchEndstop));
        assert_eq!(
            Command::from_char('9'),
            Some(Command::Pattern(TestPattern::Solid))
        );
        assert_eq!(Command::from_char('x'), None);
        assert_eq!(Command::from_char('\n'), None);
    }

    #[test]
    fn pattern_while_unpowered_is_refused_and_console_survives() {
        let bench = Bench::new();
        let mut controller = controller(&bench);
        bench.clear_events();

        assert_eq!(
            controller.run_test_pattern(TestPattern::Solid, 1),
            Err(Error::NotPowered {
                state: PowerState::Off
            })
        );
        assert_eq!(
            controller.handle_key('9', never),
            Some(Command::Pattern(TestPattern::Solid))
        );
        assert!(bench.writes().is_empty());
    }

    #[test]
    fn solid_pattern_fires_with_gaps() {
        let bench = Bench::new();
        let mut controller = controller(&bench);
        controller.power_up().unwrap();
        bench.clear_events();
        let start = bench.elapsed_ns();

        let shots = controller.run_test_pattern(TestPattern::Solid, 10).unwrap();

        assert_eq!(shots, 10);
        assert_eq!(bench.rising_edges(Line::Fire), 10);
        // 1us strobe plus 50ms gap per firing
        assert_eq!(bench.elapsed_ns() - start, 10 * (1_000 + 50_000_000));
    }

    #[test]
    fn walk_pattern_fires_every_nozzle() {
        let bench = Bench::new();
        let mut controller = controller(&bench);
        controller.power_up().unwrap();
        bench.clear_events();

        let shots = controller.run_test_pattern(TestPattern::Walk, 1).unwrap();

        assert_eq!(shots, 128);
        let data: Vec<bool> = bench.shifted_bits().iter().map(|b| b.data).collect();
        assert_eq!(data.len(), 128 * 128);
        for (shot, bits) in data.chunks(128).enumerate() {
            assert_eq!(bits.iter().filter(|b| **b).count(), 1);
            assert!(bits[shot]);
        }
    }

    #[test]
    fn fire_and_advance_keeps_motor_enabled() {
        let bench = Bench::new();
        let mut controller = controller(&bench);
        controller.power_up().unwrap();
        bench.clear_events();

        controller.fire_and_advance(&NozzleMask::SOLID, -1).unwrap();

        assert_eq!(bench.rising_edges(Line::Fire), 1);
        assert_eq!(bench.rising_edges(Line::Step), 1);
        assert_eq!(bench.level(Line::Dir), Some(false));
        assert_eq!(bench.level(Line::Enable), Some(false));
    }

    #[test]
    fn band_print_job_sequence() {
        let bench = Bench::new();
        let mut controller = controller(&bench);
        controller.power_up().unwrap();
        bench.set_input(Line::Endstop, true);
        bench.clear_events();

        let shots = controller.print(PrintJob::Bands).unwrap();

        assert_eq!(shots, 16 * 20);
        assert_eq!(bench.rising_edges(Line::Fire), 320);
        // back off plus one retract per firing, the endstop was already triggered
        assert_eq!(bench.rising_edges(Line::Step), 1400 + 320);
        assert_eq!(controller.carriage().position(), Some(-1720));
        assert_eq!(bench.level(Line::Enable), Some(true));

        // first band is all nozzles, second is every other group
        let bits = bench.shifted_bits();
        assert!(bits[..128].iter().all(|b| b.data));
        let second_band = &bits[20 * 128..21 * 128];
        assert!(!second_band[0].data);
        assert!(second_band[16].data);
    }

    #[test]
    fn failed_print_releases_motor() {
        let bench = Bench::new();
        let mut controller = controller(&bench);
        controller.power_up().unwrap();
        bench.set_input(Line::Endstop, true);
        bench.fail_line(Line::Fire);

        assert_eq!(
            controller.print(PrintJob::Solid),
            Err(Error::Line(Line::Fire))
        );
        assert_eq!(bench.level(Line::Enable), Some(true));
    }

    #[test]
    fn jog_keys_move_opposite_ways() {
        let bench = Bench::new();
        let mut controller = controller(&bench);
        bench.clear_events();

        controller.handle_key('l', never);
        assert_eq!(bench.writes_to(Line::Dir), vec![true]);
        controller.handle_key('r', never);
        assert_eq!(bench.writes_to(Line::Dir), vec![true, false]);
        assert_eq!(bench.rising_edges(Line::Step), 200);
    }

    #[test]
    fn endstop_watch_stops_on_input() {
        let bench = Bench::new();
        let mut controller = controller(&bench);
        let mut polls = 0;

        let samples = controller
            .watch_endstop(|| {
                polls += 1;
                polls > 4
            })
            .unwrap();

        assert_eq!(samples, 4);
        assert_eq!(bench.reads(Line::Endstop), 4);
    }

    #[test]
    fn power_keys_walk_the_state_machine() {
        let bench = Bench::new();
        let mut controller = controller(&bench);

        controller.handle_key('u', never);
        assert_eq!(controller.status().unwrap().power, PowerState::Ready);
        controller.handle_key('d', never);
        assert_eq!(controller.status().unwrap().power, PowerState::Off);
        assert_eq!(bench.level(Line::Reset), Some(false));
    }
}
