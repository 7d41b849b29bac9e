//! Fixed delays and pulse widths used by the Xaar 128 driver and the carriage.
//!
//! None of the settle delays are sensed. The driver assumes the rails have reached
//! their level once the delay has elapsed.

/// Protocol and carriage timing constants
pub struct Timing;
#[allow(missing_docs)]
impl Timing {
    // Power up (milliseconds)
    pub const LOGIC_SETTLE_MS: u32 = 100; // 5V logic supply assumed present before this
    pub const RAIL_SETTLE_MS: u32 = 100; // after VPPL and VPPH are switched on
    pub const RESET_RELEASE_SETTLE_MS: u32 = 100; // after RESET is released

    // Power down (milliseconds)
    pub const POWER_DOWN_LEAD_MS: u32 = 1;
    pub const RESET_ASSERT_SETTLE_MS: u32 = 5; // RESET low before the rails are cut
    pub const RAIL_OFF_SETTLE_MS: u32 = 100; // safe to remove VDD after this

    // Firing
    pub const FIRE_PULSE_US: u32 = 1; // minimum width of the FIRE low pulse
    pub const READY_POLL_ATTEMPTS: u32 = 100;
    pub const READY_POLL_INTERVAL_US: u32 = 100;
    pub const PATTERN_GAP_MS: u32 = 50; // between firings of a table pattern

    // Reference clock
    pub const REFERENCE_CLOCK_HZ: u32 = 1_000_000;

    // Carriage
    pub const STEP_HALF_PERIOD_US: u32 = 1600; // high phase and low phase of one step
    pub const MOTOR_ENABLE_SETTLE_MS: u32 = 1;
    pub const HOMING_STEP_BUDGET: u32 = 3500;
    pub const JOG_STEPS: i32 = 100; // about 5.7mm of carriage travel
    pub const ENDSTOP_SAMPLE_MS: u32 = 250;
}
