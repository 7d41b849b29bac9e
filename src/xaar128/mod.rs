//! Xaar 128 printhead driver
//!
//! The head has 128 nozzles split over two internal shift registers. Each register
//! has its own active-low chip select, clock and data are shared. A single active-low
//! FIRE strobe ejects ink from every nozzle that is loaded as "on" in both registers.
//!
//! The head must only be fired while both 35V rails are up and RESET is released,
//! see [`driver::PowerState`].

use core::fmt;

pub mod config;
pub mod driver;
pub mod interface;
pub mod mask;
pub mod pins;
pub mod timing;

/// Total number of nozzles on the head
pub const NOZZLES: usize = 128;

/// Number of nozzles behind one chip select
pub const NOZZLES_PER_CHANNEL: usize = NOZZLES / 2;

/// Size of a full nozzle mask in bytes
pub const MASK_BYTES: usize = NOZZLES / 8;

/// Size of one channel's half of the mask in bytes
pub const CHANNEL_BYTES: usize = MASK_BYTES / 2;

/// Physical signals driven or sampled by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    /// Shift register clock, data is captured on the rising edge
    Sck,
    /// Shift register data input
    Mosi,
    /// Chip select of the first channel (nozzles 0..63), active low
    SelectA,
    /// Chip select of the second channel (nozzles 64..127), active low
    SelectB,
    /// Global fire strobe, active low
    Fire,
    /// Head ready for the next firing
    Ready,
    /// Head fault (overheating)
    Fault,
    /// Head reset, active low
    Reset,
    /// High load 35V rail switch
    Vpph,
    /// Low noise 35V rail switch
    Vppl,
    /// Stepper driver step input
    Step,
    /// Stepper driver direction input
    Dir,
    /// Stepper driver enable input
    Enable,
    /// Carriage endstop switch
    Endstop,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Line::Sck => "SCK",
            Line::Mosi => "MOSI",
            Line::SelectA => "SS_A",
            Line::SelectB => "SS_B",
            Line::Fire => "FIRE",
            Line::Ready => "READY",
            Line::Fault => "FAULT",
            Line::Reset => "RESET",
            Line::Vpph => "VPPH",
            Line::Vppl => "VPPL",
            Line::Step => "STEP",
            Line::Dir => "DIR",
            Line::Enable => "ENABLE",
            Line::Endstop => "ENDSTOP",
        };
        f.write_str(name)
    }
}

/// Errors raised by the printhead and carriage drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Firing was requested while the rails are not up or RESET is still asserted
    #[error("printhead is not powered (state: {state:?})")]
    NotPowered {
        /// Power state at the time of the request
        state: driver::PowerState,
    },
    /// A nozzle mask was built from a buffer that is not exactly 16 bytes long
    #[error("nozzle mask must be 16 bytes, got {len}")]
    MaskLength {
        /// Length of the rejected buffer
        len: usize,
    },
    /// Reading or driving a GPIO line failed
    #[error("failed to access {0} line")]
    Line(Line),
    /// The reference clock could not be started at the requested frequency
    #[error("failed to start reference clock at {0} Hz")]
    Clock(u32),
}

/// Drive an output, mapping a HAL failure to the line it happened on
pub(crate) fn drive<P: embedded_hal::digital::OutputPin>(
    pin: &mut P,
    line: Line,
    high: bool,
) -> Result<(), Error> {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.map_err(|e| {
        log::error!("GPIO write error on {}: {:?}", line, e);
        Error::Line(line)
    })
}

/// Sample an input, mapping a HAL failure to the line it happened on
pub(crate) fn sense<P: embedded_hal::digital::InputPin>(
    pin: &mut P,
    line: Line,
) -> Result<bool, Error> {
    pin.is_high().map_err(|e| {
        log::error!("GPIO read error on {}: {:?}", line, e);
        Error::Line(line)
    })
}
