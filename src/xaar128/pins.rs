//! Pin definitions for the Xaar 128 breakout board and the carriage stepper
//!
//! Numbers are ESP32-S3 GPIOs. The comment on each constant names the pin on the
//! 16 pin printhead header. Header pins 2, 5, 9 and 10 are supply and ground.

/// Pin configuration constants for the printhead and the carriage
pub struct Pins;

#[allow(dead_code)]
impl Pins {
    // Printhead shift register
    /// Chip select of channel A, nozzles 0..63 (header pin 1, ~SS2)
    pub const SELECT_A: u8 = 4;
    /// Chip select of channel B, nozzles 64..127 (header pin 12, ~SS1)
    pub const SELECT_B: u8 = 11;
    /// Shift register data input (header pin 8)
    pub const MOSI: u8 = 9;
    /// Shift register clock (header pin 11)
    pub const SCK: u8 = 10;
    /// Data returned from the head (header pin 13), not used by the driver
    pub const MISO: u8 = 12;

    // Printhead control
    /// Fire all loaded nozzles, active low (header pin 16)
    pub const FIRE: u8 = 2;
    /// Head reset, active low, pulled low externally (header pin 7)
    pub const RESET: u8 = 8;
    /// 1 MHz reference clock output (header pin 15)
    pub const CLK: u8 = 3;

    // Printhead status
    /// Ready for next fire (header pin 14)
    pub const READY: u8 = 13;
    /// Overheating detected (header pin 6)
    pub const FAULT: u8 = 7;

    // High voltage, switched by MOSFET relays and pulled low externally
    /// High load 35V rail (header pin 3)
    pub const VPPH: u8 = 5;
    /// Low noise 35V rail (header pin 4)
    pub const VPPL: u8 = 6;

    // Carriage stepper
    /// Step pulse output
    pub const MOTOR_STEP: u8 = 15;
    /// Direction output
    pub const MOTOR_DIR: u8 = 16;
    /// Driver enable output, active low
    pub const MOTOR_ENABLE: u8 = 17;
    /// Endstop switch input with pull-up
    pub const ENDSTOP: u8 = 18;

    // Console
    /// UART0 transmit
    pub const UART_TX: u8 = 43;
    /// UART0 receive
    pub const UART_RX: u8 = 44;
}
