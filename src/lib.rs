//! Xaar 128 printhead control
//!
//! Drives a Xaar 128 piezo inkjet printhead over its bit-banged two channel
//! shift register interface, sequences the 35V rails and the RESET line, and
//! moves the print carriage with a step/direction stepper driver.
//!
//! ### Usage
//!
//! 1. start the 1 MHz reference clock with [`clock::start_reference_clock`]
//! 1. create the printhead driver with [`xaar128::driver::Xaar128::new`] and the
//!    carriage with [`motor::Carriage::new`]; both put their lines into the safe
//!    idle state immediately
//! 1. call [`xaar128::driver::Xaar128::power_up`], then fire masks with
//!    [`xaar128::driver::Xaar128::fire`]
//! 1. always call [`xaar128::driver::Xaar128::power_down`] before the 5V logic
//!    supply goes away
//!
//! All lines are `embedded-hal` 1.0 pins, so the same code runs against ESP32 GPIO
//! drivers and against the recording pins in [`sim`].
#![deny(missing_docs)]
#![allow(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod clock;
pub mod console;
pub mod motor;
pub mod patterns;
pub mod poll;
pub mod sim;
pub mod xaar128;

pub use crate::console::{Command, Controller};
pub use crate::motor::{Carriage, CarriageConfig, CarriagePins, Homing};
pub use crate::xaar128::config::{HeadConfig, ReadyPolicy, ReadyWait};
pub use crate::xaar128::driver::{FiringResult, HeadPins, PowerState, Xaar128};
pub use crate::xaar128::mask::{Channel, NozzleMask};
pub use crate::xaar128::pins::Pins;
pub use crate::xaar128::timing::Timing;
pub use crate::xaar128::{Error, Line};
