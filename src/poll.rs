//! Bounded polling
//!
//! Every wait on a physical input goes through [`poll_until`] so no loop in the
//! crate can spin forever on a line that never changes.

use embedded_hal::delay::DelayNs;

/// Evaluate `condition` up to `max_attempts` times, waiting `interval_us` between
/// attempts. Returns `Ok(true)` as soon as the condition holds, `Ok(false)` once the
/// budget is spent.
///
/// No wait is inserted after the final attempt. An error from the condition ends
/// polling immediately.
pub fn poll_until<E, F>(
    delay: &mut impl DelayNs,
    max_attempts: u32,
    interval_us: u32,
    condition: F,
) -> Result<bool, E>
where
    F: FnMut() -> Result<bool, E>,
{
    poll_until_with(max_attempts, condition, || {
        if interval_us > 0 {
            delay.delay_us(interval_us);
        }
        Ok(())
    })
}

/// Like [`poll_until`], but runs `between` instead of a fixed wait
///
/// `between` runs after every failed attempt except the last one, so it runs at
/// most `max_attempts - 1` times. Homing uses it to emit one step pulse between two
/// endstop samples.
pub fn poll_until_with<E, F, B>(
    max_attempts: u32,
    mut condition: F,
    mut between: B,
) -> Result<bool, E>
where
    F: FnMut() -> Result<bool, E>,
    B: FnMut() -> Result<(), E>,
{
    for attempt in 0..max_attempts {
        if condition()? {
            log::trace!("poll satisfied after {} attempts", attempt + 1);
            return Ok(true);
        }
        if attempt + 1 < max_attempts {
            between()?;
        }
    }
    Ok(false)
}
