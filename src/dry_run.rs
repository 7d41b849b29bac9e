//! Workstation console against simulated lines
//!
//! Reads command keys from stdin and runs them through the same [`Controller`] the
//! firmware uses. Delays really sleep, so power sequencing and print jobs take as
//! long as they would on the bench. READY is held high and the endstop triggers
//! after the first 200 homing steps.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::mpsc;
use std::thread;

use anyhow::Context;

use xaar128::clock::start_reference_clock;
use xaar128::console::BANNER;
use xaar128::sim::Bench;
use xaar128::{
    Carriage, CarriageConfig, CarriagePins, Command, Controller, HeadConfig, HeadPins, Line,
    Xaar128,
};

const ENDSTOP_DISTANCE: usize = 200;

pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let bench = Bench::realtime();
    bench.set_input(Line::Ready, true);
    bench.script_input(Line::Endstop, vec![false; ENDSTOP_DISTANCE], true);

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
    .context("Could not initialise printhead lines")?;

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
    .context("Could not initialise carriage lines")?;

    start_reference_clock(&mut bench.clock())?;

    let mut controller = Controller::new(head, carriage);

    let (tx, rx) = mpsc::channel::<char>();
    thread::spawn(move || {
        for byte in std::io::stdin().lock().bytes() {
            let Ok(byte) = byte else { break };
            if tx.send(char::from(byte)).is_err() {
                break;
            }
        }
    });

    for line in BANNER.lines() {
        log::info!("{}", line);
    }

    // keys read while a command was polling for input
    let mut ahead: VecDeque<char> = VecDeque::new();
    loop {
        let key = match ahead.pop_front() {
            Some(key) => key,
            None => match rx.recv() {
                Ok(key) => key,
                Err(_) => break,
            },
        };

        if Command::from_char(key) == Some(Command::WatchEndstop) {
            ahead.clear();
            while rx.try_recv().is_ok() {}
        }

        if let Some(command) = controller.handle_key(key, || {
            ahead.extend(rx.try_iter());
            !ahead.is_empty()
        }) {
            log::debug!("{}: {} line events", command, bench.events().len());
        }
        bench.clear_events();
    }

    log::info!("stdin closed, powering down");
    controller.power_down()?;
    Ok(())
}
