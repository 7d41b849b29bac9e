//! Runtime configuration of the printhead driver

use crate::xaar128::timing::Timing;

/// A bounded wait on the READY line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyWait {
    /// How many times READY is sampled
    pub attempts: u32,
    /// Pause between two samples, in microseconds
    pub interval_us: u32,
}

impl ReadyWait {
    /// 100 samples, 100us apart
    pub const DEFAULT: ReadyWait = ReadyWait {
        attempts: Timing::READY_POLL_ATTEMPTS,
        interval_us: Timing::READY_POLL_INTERVAL_US,
    };

    /// Longest time the wait can take, in microseconds
    pub const fn budget_us(&self) -> u64 {
        self.attempts as u64 * self.interval_us as u64
    }
}

impl Default for ReadyWait {
    fn default() -> Self {
        ReadyWait::DEFAULT
    }
}

/// When the firing sequencer waits on READY
///
/// A wait that runs out is reported and the firing goes ahead regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyPolicy {
    /// Wait for READY high before loading the mask
    pub before_fire: Option<ReadyWait>,
    /// Wait for READY low after the strobe, i.e. for the head to start ejecting
    pub after_fire: Option<ReadyWait>,
}

impl ReadyPolicy {
    /// Wait before firing only
    pub const DEFAULT: ReadyPolicy = ReadyPolicy {
        before_fire: Some(ReadyWait::DEFAULT),
        after_fire: None,
    };

    /// Never wait, only sample
    pub const NONE: ReadyPolicy = ReadyPolicy {
        before_fire: None,
        after_fire: None,
    };

    /// Wait both before and after firing
    pub const BOTH: ReadyPolicy = ReadyPolicy {
        before_fire: Some(ReadyWait::DEFAULT),
        after_fire: Some(ReadyWait::DEFAULT),
    };
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        ReadyPolicy::DEFAULT
    }
}

/// Printhead driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadConfig {
    /// READY handling around each firing
    pub ready: ReadyPolicy,
    /// Width of the FIRE low pulse in microseconds, never less than 1
    pub fire_pulse_us: u32,
}

impl HeadConfig {
    /// Create the default configuration
    pub const fn new() -> Self {
        Self {
            ready: ReadyPolicy::DEFAULT,
            fire_pulse_us: Timing::FIRE_PULSE_US,
        }
    }

    /// Use a different READY policy
    pub const fn with_ready_policy(mut self, ready: ReadyPolicy) -> Self {
        self.ready = ready;
        self
    }

    /// Stretch the FIRE pulse. Values below the 1us minimum are raised to it.
    pub const fn with_fire_pulse_us(mut self, us: u32) -> Self {
        self.fire_pulse_us = if us < Timing::FIRE_PULSE_US {
            Timing::FIRE_PULSE_US
        } else {
            us
        };
        self
    }
}

impl Default for HeadConfig {
    fn default() -> Self {
        HeadConfig::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_waits_before_fire_only() {
        let config = HeadConfig::default();
        assert_eq!(config.ready.before_fire, Some(ReadyWait::DEFAULT));
        assert_eq!(config.ready.after_fire, None);
        assert_eq!(ReadyWait::DEFAULT.budget_us(), 10_000);
    }

    #[test]
    fn fire_pulse_never_below_minimum() {
        assert_eq!(HeadConfig::new().with_fire_pulse_us(0).fire_pulse_us, 1);
        assert_eq!(HeadConfig::new().with_fire_pulse_us(4).fire_pulse_us, 4);
    }
}
