//! Reference clock for the printhead
//!
//! The head needs a free running 1 MHz clock on its CLK input for internal timing.
//! It is configured once at startup and left running for the life of the process.

use crate::xaar128::timing::Timing;
use crate::xaar128::Error;

/// A hardware square wave generator driving the head's CLK input
pub trait ReferenceClock {
    /// Start a 50% duty square wave at `hz`
    fn start(&mut self, hz: u32) -> Result<(), Error>;
}

/// Start the head's reference clock at the frequency it expects
pub fn start_reference_clock(clock: &mut impl ReferenceClock) -> Result<(), Error> {
    log::info!(
        "Starting {} kHz printhead reference clock",
        Timing::REFERENCE_CLOCK_HZ / 1000
    );
    clock.start(Timing::REFERENCE_CLOCK_HZ).inspect_err(|e| {
        log::error!("Reference clock failed: {}", e);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Bench;

    #[test]
    fn starts_at_one_megahertz() {
        let bench = Bench::new();
        let mut clock = bench.clock();
        start_reference_clock(&mut clock).unwrap();
        assert_eq!(bench.clock_hz(), Some(1_000_000));
    }
}
