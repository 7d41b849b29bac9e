//! ESP32-S3 bindings: GPIO drivers for the head and carriage, an LEDC channel for
//! the reference clock and UART0 for the command console.

use anyhow::Context;

use esp_idf_svc::hal::delay::{Delay, BLOCK, NON_BLOCK};
use esp_idf_svc::hal::gpio::{self, AnyIOPin, AnyOutputPin, Input, Output, PinDriver, Pull};
use esp_idf_svc::hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_svc::hal::ledc::{CHANNEL0, TIMER0};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::hal::uart::{self, UartDriver};

use xaar128::clock::{start_reference_clock, ReferenceClock};
use xaar128::console::BANNER;
use xaar128::{
    Carriage, CarriageConfig, CarriagePins, Command, Controller, Error, HeadConfig, HeadPins,
    Xaar128,
};

type Out = PinDriver<'static, AnyOutputPin, Output>;
type In = PinDriver<'static, AnyIOPin, Input>;

/// 50% duty square wave from LEDC timer 0, channel 0
///
/// Once started, the drivers are kept for the life of the process so the clock never stops.
pub struct LedcReferenceClock {
    timer: Option<TIMER0>,
    channel: Option<CHANNEL0>,
    pin: Option<AnyOutputPin>,
    driver: Option<LedcDriver<'static>>,
}

impl LedcReferenceClock {
    pub fn new(timer: TIMER0, channel: CHANNEL0, pin: AnyOutputPin) -> Self {
        Self {
            timer: Some(timer),
            channel: Some(channel),
            pin: Some(pin),
            driver: None,
        }
    }
}

impl ReferenceClock for LedcReferenceClock {
    fn start(&mut self, hz: u32) -> Result<(), Error> {
        let (Some(timer), Some(channel), Some(pin)) =
            (self.timer.take(), self.channel.take(), self.pin.take())
        else {
            log::warn!("Reference clock already running");
            return Ok(());
        };

        // one bit of resolution is all that fits at 1 MHz
        let config = TimerConfig::new()
            .frequency(hz.Hz().into())
            .resolution(Resolution::Bits1);
        let timer = LedcTimerDriver::new(timer, &config).map_err(|e| {
            log::error!("LEDC timer error: {:?}", e);
            Error::Clock(hz)
        })?;
        let mut driver = LedcDriver::new(channel, timer, pin).map_err(|e| {
            log::error!("LEDC channel error: {:?}", e);
            Error::Clock(hz)
        })?;
        driver
            .set_duty(driver.get_max_duty() / 2)
            .map_err(|_| Error::Clock(hz))?;

        self.driver = Some(driver);
        Ok(())
    }
}

fn output(pin: impl gpio::OutputPin + 'static) -> anyhow::Result<Out> {
    PinDriver::output(pin.downgrade_output()).context("Failed to set pin as output")
}

fn input(pin: impl gpio::IOPin + 'static, pull: Pull) -> anyhow::Result<In> {
    let mut driver = PinDriver::input(pin.downgrade()).context("Failed to set pin as input")?;
    driver.set_pull(pull).context("Failed to set pull")?;
    Ok(driver)
}

// https://docs.esp-rs.org/esp-idf-svc/esp_idf_svc/
pub fn run() -> anyhow::Result<()> {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    let peripherals = Peripherals::take().context("Could not take peripherals")?;
    let pins = peripherals.pins;

    // Lines first, so RESET is held low before the clock or anything else starts
    let head = Xaar128::new(
        HeadPins {
            sck: output(pins.gpio10)?,                  // Pins::SCK
            mosi: output(pins.gpio9)?,                  // Pins::MOSI
            select_a: output(pins.gpio4)?,              // Pins::SELECT_A
            select_b: output(pins.gpio11)?,             // Pins::SELECT_B
            fire: output(pins.gpio2)?,                  // Pins::FIRE
            reset: output(pins.gpio8)?,                 // Pins::RESET
            vpph: output(pins.gpio5)?,                  // Pins::VPPH
            vppl: output(pins.gpio6)?,                  // Pins::VPPL
            ready: input(pins.gpio13, Pull::Floating)?, // Pins::READY
            fault: input(pins.gpio7, Pull::Floating)?,  // Pins::FAULT
        },
        Delay::default(),
        HeadConfig::default(),
    )
    .context("Could not initialise printhead lines")?;

    let carriage = Carriage::new(
        CarriagePins {
            step: output(pins.gpio15)?,             // Pins::MOTOR_STEP
            dir: output(pins.gpio16)?,              // Pins::MOTOR_DIR
            enable: output(pins.gpio17)?,           // Pins::MOTOR_ENABLE
            endstop: input(pins.gpio18, Pull::Up)?, // Pins::ENDSTOP
        },
        Delay::default(),
        CarriageConfig::default(),
    )
    .context("Could not initialise carriage lines")?;

    let mut clock = LedcReferenceClock::new(
        peripherals.ledc.timer0,
        peripherals.ledc.channel0,
        pins.gpio3.downgrade_output(), // Pins::CLK
    );
    start_reference_clock(&mut clock)?;

    let uart = UartDriver::new(
        peripherals.uart0,
        pins.gpio43, // Pins::UART_TX
        pins.gpio44, // Pins::UART_RX
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart::config::Config::new().baudrate(9600.Hz()),
    )
    .context("Could not open console UART")?;

    let mut controller = Controller::new(head, carriage);

    for line in BANNER.lines() {
        log::info!("{}", line);
    }

    let pending = || uart.remaining_read().map(|n| n > 0).unwrap_or(false);
    let mut byte = [0u8; 1];
    loop {
        if uart.read(&mut byte, BLOCK)? == 0 {
            continue;
        }
        let key = char::from(byte[0]);

        // drop anything typed along with the key, the next byte stops the monitor
        if Command::from_char(key) == Some(Command::WatchEndstop) {
            let mut discard = [0u8; 16];
            while uart.read(&mut discard, NON_BLOCK).unwrap_or(0) > 0 {}
        }

        controller.handle_key(key, pending);
    }
}
