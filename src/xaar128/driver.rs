//! Xaar 128 Printhead Driver Implementation
//!
//! Firing and power sequencing for the Xaar 128.
//!
//! ## Power
//!
//! ```text
//!  Off ──power_up──▶ RailsEnabling ──▶ Ready
//!  Ready ──power_down──▶ ResetAsserting ──▶ Off
//! ```
//!
//! Power up waits for the 5V logic to settle, switches on VPPL and VPPH together,
//! waits for the rails, releases RESET and waits again. Power down asserts RESET
//! first and only then cuts the rails. RESET is never released while the rails are
//! off and the rails are never cut while RESET is released.
//!
//! All settle delays are fixed waits, nothing is measured.
//!
//! ## Firing
//!
//! One call to [`Xaar128::fire`] is one complete cycle: wait for READY (bounded),
//! load channel A then channel B, pulse FIRE low, sample READY and FAULT. A READY
//! timeout is logged and returned in the [`FiringResult`], it does not stop the
//! firing. Firing outside [`PowerState::Ready`] is refused.
//!
//! Firing again before the head reports READY is allowed. Whether that ejects ink
//! properly is up to the caller's pacing.
//!
//! ## Timing
//!
//! Pulse widths and settle delays are minimums. On ESP-IDF, interrupts and the
//! FreeRTOS tick can stretch any of them, and the bit-banged clock runs as fast as
//! GPIO writes allow.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::poll::poll_until;
use crate::xaar128::config::{HeadConfig, ReadyPolicy, ReadyWait};
use crate::xaar128::interface::BitSerialLink;
use crate::xaar128::mask::NozzleMask;
use crate::xaar128::timing::Timing;
use crate::xaar128::{drive, sense, Error, Line};

/// Electrical condition of the head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    /// Rails off, RESET asserted
    Off,
    /// Power up in progress, or interrupted by a line failure
    RailsEnabling,
    /// Rails up, RESET released, the head may be fired
    Ready,
    /// Power down in progress, or interrupted by a line failure
    ResetAsserting,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Off => write!(f, "off"),
            PowerState::RailsEnabling => write!(f, "rails enabling"),
            PowerState::Ready => write!(f, "ready"),
            PowerState::ResetAsserting => write!(f, "reset asserting"),
        }
    }
}

/// Status observed around one firing
///
/// Informational only, nothing is gated on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiringResult {
    /// READY was high before the mask was loaded. False means the wait timed out.
    pub ready_before: bool,
    /// READY sampled right after the strobe
    pub ready_after: bool,
    /// FAULT sampled right after the strobe
    pub fault_after: bool,
}

/// Prints the status the way the serial console always has: `R`/`r` for READY
/// high/low and `F`/`f` for FAULT high/low, sampled after the strobe.
impl fmt::Display for FiringResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.ready_after { 'R' } else { 'r' };
        let fault = if self.fault_after { 'F' } else { 'f' };
        write!(f, "{r}{fault}")
    }
}

/// A snapshot of the head's status lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadStatus {
    /// Driver side power state
    pub power: PowerState,
    /// READY line level
    pub ready: bool,
    /// FAULT line level
    pub fault: bool,
}

/// All lines between the controller and the printhead header
pub struct HeadPins<OUT, IN> {
    /// Shift clock
    pub sck: OUT,
    /// Shift data
    pub mosi: OUT,
    /// Channel A chip select
    pub select_a: OUT,
    /// Channel B chip select
    pub select_b: OUT,
    /// Fire strobe
    pub fire: OUT,
    /// Head reset
    pub reset: OUT,
    /// High load rail switch
    pub vpph: OUT,
    /// Low noise rail switch
    pub vppl: OUT,
    /// Ready input
    pub ready: IN,
    /// Fault input
    pub fault: IN,
}

/// Xaar 128 printhead driver
///
/// ## Type Parameters
///
/// - `OUT` - output pin type used for every driven line
/// - `IN` - input pin type used for READY and FAULT
/// - `D` - delay provider for settle delays, polling and the strobe
pub struct Xaar128<OUT, IN, D> {
    link: BitSerialLink<OUT>,
    fire: OUT,
    reset: OUT,
    vpph: OUT,
    vppl: OUT,
    ready: IN,
    fault: IN,
    delay: D,
    config: HeadConfig,
    state: PowerState,
}

impl<OUT, IN, D> Xaar128<OUT, IN, D>
where
    OUT: OutputPin,
    IN: InputPin,
    D: DelayNs,
{
    /// Take the head lines and drive them into the power-off state
    ///
    /// RESET is pulled low before anything else, then both rails are switched off,
    /// the link goes idle and FIRE is released.
    pub fn new(pins: HeadPins<OUT, IN>, delay: D, config: HeadConfig) -> Result<Self, Error> {
        let HeadPins {
            sck,
            mosi,
            select_a,
            select_b,
            fire,
            reset,
            vpph,
            vppl,
            ready,
            fault,
        } = pins;

        let mut head = Xaar128 {
            link: BitSerialLink::new(sck, mosi, select_a, select_b),
            fire,
            reset,
            vpph,
            vppl,
            ready,
            fault,
            delay,
            config,
            state: PowerState::Off,
        };

        // keep in reset until all power is on
        drive(&mut head.reset, Line::Reset, false)?;
        drive(&mut head.vpph, Line::Vpph, false)?;
        drive(&mut head.vppl, Line::Vppl, false)?;
        head.link.idle()?;
        drive(&mut head.fire, Line::Fire, true)?;

        log::info!("Xaar 128 lines initialised, head is powered off");
        Ok(head)
    }

    /// Current power state
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Active configuration
    pub fn config(&self) -> &HeadConfig {
        &self.config
    }

    /// Replace the READY policy used by [`Xaar128::fire`]
    pub fn set_ready_policy(&mut self, ready: ReadyPolicy) {
        self.config.ready = ready;
    }

    /// Bring the rails up and release RESET
    ///
    /// Does nothing if the head is already powered. An interrupted power down is
    /// completed first.
    pub fn power_up(&mut self) -> Result<(), Error> {
        match self.state {
            PowerState::Ready => {
                log::warn!("Power up requested but the head is already powered");
                return Ok(());
            }
            PowerState::ResetAsserting => {
                log::warn!("Completing interrupted power down before powering up");
                self.power_down()?;
            }
            PowerState::Off | PowerState::RailsEnabling => {}
        }

        self.transition(PowerState::RailsEnabling);

        // wait after 5V power is available
        self.delay.delay_ms(Timing::LOGIC_SETTLE_MS);

        // apply high voltage, both rails together
        drive(&mut self.vppl, Line::Vppl, true)?;
        drive(&mut self.vpph, Line::Vpph, true)?;
        self.delay.delay_ms(Timing::RAIL_SETTLE_MS);

        drive(&mut self.reset, Line::Reset, true)?;
        self.delay.delay_ms(Timing::RESET_RELEASE_SETTLE_MS);

        self.transition(PowerState::Ready);
        log::info!("Power is up!");
        Ok(())
    }

    /// Assert RESET and cut both rails
    ///
    /// Does nothing, and touches no line, if the head is already off.
    pub fn power_down(&mut self) -> Result<(), Error> {
        if self.state == PowerState::Off {
            log::debug!("Power down requested but the head is already off");
            return Ok(());
        }

        self.transition(PowerState::ResetAsserting);

        self.delay.delay_ms(Timing::POWER_DOWN_LEAD_MS);
        drive(&mut self.reset, Line::Reset, false)?;
        self.delay.delay_ms(Timing::RESET_ASSERT_SETTLE_MS);

        drive(&mut self.vpph, Line::Vpph, false)?;
        drive(&mut self.vppl, Line::Vppl, false)?;
        // safe to switch VDD off after this
        self.delay.delay_ms(Timing::RAIL_OFF_SETTLE_MS);

        self.transition(PowerState::Off);
        log::info!("Power is down!");
        Ok(())
    }

    /// Run one firing cycle with the configured READY policy
    pub fn fire(&mut self, mask: &NozzleMask) -> Result<FiringResult, Error> {
        let policy = self.config.ready;
        self.fire_with(mask, policy)
    }

    /// Run one firing cycle for a raw 16 byte mask
    pub fn fire_bytes(&mut self, bytes: &[u8]) -> Result<FiringResult, Error> {
        let mask = NozzleMask::from_slice(bytes)?;
        self.fire(&mask)
    }

    /// Run one firing cycle with an explicit READY policy
    ///
    /// Refused with [`Error::NotPowered`] unless the head is in [`PowerState::Ready`].
    /// An all-zero mask still runs the whole sequence.
    pub fn fire_with(
        &mut self,
        mask: &NozzleMask,
        policy: ReadyPolicy,
    ) -> Result<FiringResult, Error> {
        if self.state != PowerState::Ready {
            log::error!("Refusing to fire, head is {}", self.state);
            return Err(Error::NotPowered { state: self.state });
        }

        let ready_before = match policy.before_fire {
            Some(wait) => self.wait_for_ready(true, wait)?,
            None => sense(&mut self.ready, Line::Ready)?,
        };
        if !ready_before {
            log::warn!("No READY H");
        }

        self.link.load(mask)?;
        self.strobe()?;

        if let Some(wait) = policy.after_fire {
            if !self.wait_for_ready(false, wait)? {
                log::warn!("No READY L");
            }
        }

        let result = FiringResult {
            ready_before,
            ready_after: sense(&mut self.ready, Line::Ready)?,
            fault_after: sense(&mut self.fault, Line::Fault)?,
        };
        log::trace!("Fired {:?}: {}", mask, result);
        Ok(result)
    }

    /// Sample READY and FAULT without firing
    pub fn status(&mut self) -> Result<HeadStatus, Error> {
        Ok(HeadStatus {
            power: self.state,
            ready: sense(&mut self.ready, Line::Ready)?,
            fault: sense(&mut self.fault, Line::Fault)?,
        })
    }

    /// Wait a fixed time using the driver's delay provider
    pub fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Poll READY until it reaches `level` or the wait runs out
    fn wait_for_ready(&mut self, level: bool, wait: ReadyWait) -> Result<bool, Error> {
        let ready = &mut self.ready;
        // an empty budget still samples once
        poll_until(&mut self.delay, wait.attempts.max(1), wait.interval_us, || {
            sense(&mut *ready, Line::Ready).map(|high| high == level)
        })
    }

    /// Pulse FIRE low for at least the configured width
    fn strobe(&mut self) -> Result<(), Error> {
        // the config fields are public, never go below the hardware minimum
        let width_us = self.config.fire_pulse_us.max(Timing::FIRE_PULSE_US);
        drive(&mut self.fire, Line::Fire, false)?;
        self.delay.delay_us(width_us);
        drive(&mut self.fire, Line::Fire, true)
    }

    fn transition(&mut self, next: PowerState) {
        log::debug!("Power state {} -> {}", self.state, next);
        self.state = next;
    }
}
