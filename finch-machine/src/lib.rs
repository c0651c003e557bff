//! Execution engine for the finch educational computer
//!
//! [`Machine`] bundles the CPU, 32K of memory, the port-mapped devices and
//! the clocks that pace them. A frontend drives it with a millisecond
//! timeline (`run`/`step`), feeds it keyboard input, and drains the event
//! queue to learn what happened.
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod alu;
mod cpu;
mod error;
pub mod io;
mod memory;
mod registers;
mod scheduler;

pub use alu::{AluOp, Flags};
pub use cpu::Step;
pub use error::SimError;
pub use io::DeviceConfig;
pub use memory::MemoryFill;
pub use registers::Registers;

use cpu::Cpu;
use finch_asm::{Program, Span};
use io::IoBus;
use memory::{Memory, Xorshift};
use scheduler::Clock;
use std::collections::VecDeque;

/// Something a frontend may want to show
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// The CPU is about to execute the instruction at this source range
    Executing(Span),
    /// Text appended to the console
    Console(String),
    /// The printed page changed; carries the whole page
    Printer(String),
    /// The LED row changed
    Leds([bool; 8]),
}

/// What the machine is doing between calls
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Status {
    /// No program running
    #[default]
    Stopped,
    /// Executing at the CPU clock rate
    Running,
    /// Suspended in `INT 6` until a byte of input arrives
    WaitingForInput,
    /// Ran to completion (or to an error)
    Halted,
}

/// CPU steps per second unless overridden
pub const DEFAULT_CPU_HZ: u64 = 4;
/// Characters the printer commits per second
pub const PRINTER_CPS: u64 = 2;

/// The whole computer
pub struct Machine {
    cpu: Cpu,
    memory: Memory,
    io: IoBus,
    program: Option<Program>,
    console: String,
    events: VecDeque<Event>,
    rng: Xorshift,
    status: Status,
    cpu_clock: Clock,
    timer_clock: Clock,
    printer_clock: Clock,
}

impl Machine {
    /// Builds a machine with the given devices and a fixed random seed
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_seed(config, 0)
    }

    /// Builds a machine whose `Randomize` fills draw from `seed`
    pub fn with_seed(config: DeviceConfig, seed: u32) -> Self {
        Self {
            cpu: Cpu::new(),
            memory: Memory::new(),
            io: IoBus::new(config),
            program: None,
            console: String::new(),
            events: VecDeque::new(),
            rng: Xorshift::new(seed),
            status: Status::Stopped,
            cpu_clock: Clock::from_hz(DEFAULT_CPU_HZ),
            timer_clock: Clock::from_hz(1),
            printer_clock: Clock::from_hz(PRINTER_CPS),
        }
    }

    /// Changes the CPU clock rate; takes effect on the next `run`
    ///
    /// Rates above 1000 Hz are limited by the millisecond timeline, and a
    /// rate of zero leaves the clock effectively stopped.
    pub fn set_cpu_hz(&mut self, hz: u64) {
        self.cpu_clock = Clock::from_hz(hz);
    }

    /// Replaces the device configuration, rebuilding all device state
    pub fn set_devices(&mut self, config: DeviceConfig) {
        self.io = IoBus::new(config);
    }

    /// Active device configuration
    pub fn devices(&self) -> DeviceConfig {
        self.io.config()
    }

    /// Loads a freshly assembled program and resets the machine
    ///
    /// `fill` decides what happens to everything the program does not
    /// initialize: memory cells, general registers, flags and device
    /// registers are zeroed, randomized or left as they were.
    pub fn load_program(&mut self, program: &Program, fill: MemoryFill) {
        log::info!(
            "loading program: {} instructions, {} data blocks",
            program.instructions.len(),
            program.data.len()
        );
        self.memory.load(program, fill, &mut self.rng);
        self.cpu.reset(fill, &mut self.rng);
        self.io.reset(fill, &mut self.rng);
        self.program = Some(program.clone());
        self.console.clear();
        self.events.clear();
        self.cpu_clock.restart();
        self.timer_clock.restart();
        self.printer_clock.restart();
        self.status = Status::Running;
    }

    /// Advances the timeline to `now_ms`, executing every CPU step that is
    /// due
    ///
    /// Device clocks follow the timeline even while the CPU is stopped or
    /// waiting. After `Halt`, a debug break, `INT 6` or an error the
    /// remaining due steps are dropped. Errors also halt the machine.
    pub fn run(&mut self, now_ms: u64) -> Result<Status, SimError> {
        self.tick_devices(now_ms);
        let due = self.cpu_clock.ticks_due(now_ms);
        if self.status != Status::Running {
            return Ok(self.status);
        }
        for _ in 0..due {
            if self.execute_one()? != Status::Running {
                break;
            }
            self.io.refresh();
        }
        Ok(self.status)
    }

    /// Executes exactly one instruction, ignoring the CPU clock rate
    ///
    /// Device clocks still follow the timeline. Meant for single-stepping;
    /// also steps a machine paused by a debug break.
    pub fn step(&mut self, now_ms: u64) -> Result<Status, SimError> {
        self.tick_devices(now_ms);
        self.cpu_clock.ticks_due(now_ms);
        match self.status {
            Status::Running | Status::Stopped => {
                self.status = Status::Running;
                self.execute_one()?;
            }
            _ => (),
        }
        Ok(self.status)
    }

    /// Stops the run; `step` or a fresh `load_program` resumes
    pub fn stop(&mut self) {
        if self.status == Status::Running {
            self.status = Status::Stopped;
        }
    }

    /// Delivers the byte an `INT 6` is waiting for
    ///
    /// The byte lands at `[BX]` and echoes to the console. Input supplied
    /// while the machine is not waiting is dropped.
    pub fn supply_input(&mut self, byte: u8) -> Result<(), SimError> {
        if self.status != Status::WaitingForInput {
            log::warn!("input {byte:#04x} ignored, machine is not waiting");
            return Ok(());
        }
        match self.cpu.accept_input(byte, &mut self.memory) {
            Ok(()) => {
                let text = (byte as char).to_string();
                self.console.push_str(&text);
                self.events.push_back(Event::Console(text));
                self.status = Status::Running;
                Ok(())
            }
            Err(e) => {
                self.status = Status::Halted;
                Err(e)
            }
        }
    }

    /// Raises a hardware interrupt line; the F10 key is line 0
    pub fn interrupt_request(&mut self, line: u8) {
        self.io.pic.request(line);
    }

    /// Flips one of the eight switches, if the configuration has them
    pub fn toggle_switch(&mut self, index: usize) {
        self.io.toggle_switch(index, &mut self.events);
    }

    fn tick_devices(&mut self, now_ms: u64) {
        for _ in 0..self.timer_clock.ticks_due(now_ms) {
            self.io.tick_timer();
        }
        for _ in 0..self.printer_clock.ticks_due(now_ms) {
            self.io.tick_printer(&mut self.events);
        }
        self.io.refresh();
    }

    fn execute_one(&mut self) -> Result<Status, SimError> {
        let program = self.program.as_ref().ok_or(SimError::NoProgramLoaded)?;
        let outcome = self.cpu.step(
            program,
            &mut self.memory,
            &mut self.io,
            &mut self.console,
            &mut self.events,
        );
        match outcome {
            Ok(Step::Continue) => (),
            Ok(Step::Halt) => self.status = Status::Halted,
            Ok(Step::DebugBreak) => self.status = Status::Stopped,
            Ok(Step::WaitingForInput) => self.status = Status::WaitingForInput,
            Err(e) => {
                log::error!("run stopped: {e}");
                self.status = Status::Halted;
                return Err(e);
            }
        }
        Ok(self.status)
    }

    /// Current status
    pub fn status(&self) -> Status {
        self.status
    }

    /// Register file snapshot
    pub fn registers(&self) -> &Registers {
        self.cpu.registers()
    }

    /// ALU flags snapshot
    pub fn flags(&self) -> Flags {
        self.cpu.flags()
    }

    /// Operand latches of the most recent ALU operation
    pub fn alu_operands(&self) -> (u16, u16) {
        self.cpu.alu_operands()
    }

    /// Result latch of the most recent ALU operation
    pub fn alu_result(&self) -> u16 {
        self.cpu.alu_result()
    }

    /// Selector of the most recent ALU operation, if any ran since reset
    pub fn alu_operation(&self) -> Option<AluOp> {
        self.cpu.alu_operation()
    }

    /// Whether hardware interrupts are enabled
    pub fn interrupts_enabled(&self) -> bool {
        self.cpu.interrupts_enabled()
    }

    /// Raw memory image
    pub fn memory(&self) -> &[u8] {
        self.memory.cells()
    }

    /// Reads a device register without side effects
    pub fn read_port(&self, port: u8) -> Option<u8> {
        self.io.read(port).ok()
    }

    /// Everything written to the console so far
    pub fn console(&self) -> &str {
        &self.console
    }

    /// LED image, if the configuration has LEDs
    pub fn leds(&self) -> Option<[bool; 8]> {
        self.io.leds()
    }

    /// Switch positions, if the configuration has switches
    pub fn switches(&self) -> Option<[bool; 8]> {
        self.io.switches()
    }

    /// Printed page, if the configuration has a printer
    pub fn printer_output(&self) -> Option<&str> {
        self.io.printer_output()
    }

    /// Drains the queued events
    pub fn take_events(&mut self) -> VecDeque<Event> {
        std::mem::take(&mut self.events)
    }
}
