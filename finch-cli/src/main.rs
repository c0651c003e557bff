use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use finch_asm::assemble;
use finch_machine::{DeviceConfig, Event, Machine, MemoryFill, Status};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

/// Assembler and runner for the finch educational machine
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Assembly source file to run
    source: PathBuf,

    /// Peripherals to attach
    #[clap(long, value_enum, default_value_t = Devices::SwitchesLeds)]
    devices: Devices,

    /// What to do with uninitialized memory and registers
    #[clap(long, value_enum, default_value_t = Fill::Clean)]
    fill: Fill,

    /// CPU steps per second
    #[clap(long, default_value_t = 4, value_parser = clap::value_parser!(u64).range(1..))]
    cpu_hz: u64,

    /// Run at full speed instead of pacing to the CPU clock
    #[clap(long)]
    fast: bool,
}

#[derive(Copy, Clone, ValueEnum)]
enum Devices {
    SwitchesLeds,
    PioPrinter,
    HandshakePrinter,
}

impl From<Devices> for DeviceConfig {
    fn from(d: Devices) -> Self {
        match d {
            Devices::SwitchesLeds => DeviceConfig::SwitchesAndLeds,
            Devices::PioPrinter => DeviceConfig::PioPrinter,
            Devices::HandshakePrinter => DeviceConfig::HandshakePrinter,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum Fill {
    Clean,
    Randomize,
    Keep,
}

impl From<Fill> for MemoryFill {
    fn from(f: Fill) -> Self {
        match f {
            Fill::Clean => MemoryFill::Clean,
            Fill::Randomize => MemoryFill::Randomize,
            Fill::Keep => MemoryFill::Keep,
        }
    }
}

/// Spawns a worker thread that listens on `stdin` and emits bytes
fn stdin_worker() -> mpsc::Receiver<u8> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buf = [0u8; 32];
        while let Ok(n) = stdin.read(&mut buf) {
            if n == 0 {
                return;
            }
            for &byte in &buf[..n] {
                if tx.send(byte).is_err() {
                    return;
                }
            }
        }
    });
    rx
}

fn main() -> Result<()> {
    let env = env_logger::Env::default()
        .filter_or("FINCH_LOG", "info")
        .write_style_or("FINCH_LOG", "always");
    env_logger::init_from_env(env);

    let args = Args::parse();
    let source = std::fs::read_to_string(&args.source)
        .with_context(|| format!("failed to read {:?}", args.source))?;

    let program = match assemble(&source) {
        Ok(program) => program,
        Err(diagnostics) => {
            for d in &diagnostics {
                let (line, col) = d.span.line_col(&source);
                eprintln!("{}:{line}:{col}: {}", args.source.display(), d.kind);
            }
            anyhow::bail!("assembly failed with {} error(s)", diagnostics.len());
        }
    };
    info!(
        "assembled {} instructions, {} data blocks",
        program.instructions.len(),
        program.data.len()
    );

    let mut machine = Machine::new(args.devices.into());
    machine.set_cpu_hz(args.cpu_hz);
    machine.load_program(&program, args.fill.into());

    let input = stdin_worker();
    let start = Instant::now();
    // synthetic timeline for --fast: one CPU interval per step
    let mut fast_now = 0u64;
    let interval = 1000 / args.cpu_hz.max(1);

    loop {
        let status = if args.fast {
            fast_now += interval;
            machine.step(fast_now)
        } else {
            machine.run(start.elapsed().as_millis() as u64)
        };

        render(machine.take_events())?;

        match status {
            Ok(Status::Running) => {
                if !args.fast {
                    std::thread::sleep(Duration::from_millis(15));
                }
            }
            Ok(Status::WaitingForInput) => {
                let byte = input.recv().context("stdin closed while waiting")?;
                machine.supply_input(byte)?;
            }
            Ok(Status::Stopped) => {
                info!("debug break, continuing");
                if !args.fast {
                    // run() stays paused after a break; step past it
                    machine.step(start.elapsed().as_millis() as u64)?;
                }
            }
            Ok(Status::Halted) => break,
            Err(e) => {
                render(machine.take_events())?;
                return Err(e).context("runtime error");
            }
        }
    }

    if let Some(page) = machine.printer_output() {
        if !page.is_empty() {
            info!("printer output:\n{page}");
        }
    }
    if let Some(leds) = machine.leds() {
        info!("leds: {}", led_row(leds));
    }
    info!("halted after {:?}", start.elapsed());
    Ok(())
}

/// Writes console text to stdout and logs device activity
fn render(events: std::collections::VecDeque<Event>) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for event in events {
        match event {
            Event::Executing(_) => (),
            Event::Console(text) => {
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            Event::Printer(page) => info!("printing: {page:?}"),
            Event::Leds(leds) => info!("leds: {}", led_row(leds)),
        }
    }
    Ok(())
}

fn led_row(leds: [bool; 8]) -> String {
    leds.iter().map(|on| if *on { '\u{25cf}' } else { '\u{25cb}' }).collect()
}
