//! Port-mapped devices and the bus that fronts them

use crate::error::SimError;
use crate::memory::{MemoryFill, Xorshift};
use crate::Event;
use std::collections::VecDeque;

mod handshake;
mod leds;
mod pic;
mod pio;
mod printer;
mod switches;
mod timer;

pub use handshake::HandshakePorts;
pub use pic::PicPorts;
pub use pio::PioPorts;
pub use timer::TimerPorts;

use handshake::Handshake;
use leds::Leds;
use pic::Pic;
use pio::Pio;
use printer::Printer;
use switches::Switches;
use timer::Timer;

/// Which peripherals sit behind the PIO or handshake interface
///
/// The PIC and timer are always present. Changing the configuration rebuilds
/// the device state from scratch.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DeviceConfig {
    /// Toggle switches on PA, LEDs on PB
    #[default]
    SwitchesAndLeds,
    /// A printer driven by hand through the PIO (PA bit 0 busy, PA bit 1
    /// strobe, PB data)
    PioPrinter,
    /// A printer behind the handshake interface
    HandshakePrinter,
}

enum DeviceSet {
    SwitchesAndLeds {
        pio: Pio,
        switches: Switches,
        leds: Leds,
    },
    PioPrinter {
        pio: Pio,
        printer: Printer,
        last_strobe: bool,
    },
    HandshakePrinter {
        handshake: Handshake,
        printer: Printer,
    },
}

impl DeviceSet {
    fn new(config: DeviceConfig) -> Self {
        match config {
            DeviceConfig::SwitchesAndLeds => DeviceSet::SwitchesAndLeds {
                pio: Pio::new(),
                switches: Switches::new(),
                leds: Leds::new(),
            },
            DeviceConfig::PioPrinter => DeviceSet::PioPrinter {
                pio: Pio::new(),
                printer: Printer::new(),
                last_strobe: false,
            },
            DeviceConfig::HandshakePrinter => DeviceSet::HandshakePrinter {
                handshake: Handshake::new(),
                printer: Printer::new(),
            },
        }
    }
}

/// PIC line raised by the timer when `CONT` matches `COMP`
pub(crate) const TIMER_LINE: u8 = 1;
/// PIC line driven by the handshake interface
pub(crate) const HANDSHAKE_LINE: u8 = 2;

/// The I/O bus: dispatches port accesses and runs device ticks
pub(crate) struct IoBus {
    pub pic: Pic,
    timer: Timer,
    devices: DeviceSet,
    config: DeviceConfig,
}

impl IoBus {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            pic: Pic::new(),
            timer: Timer::new(),
            devices: DeviceSet::new(config),
            config,
        }
    }

    pub fn config(&self) -> DeviceConfig {
        self.config
    }

    pub fn reset(&mut self, fill: MemoryFill, rng: &mut Xorshift) {
        self.pic.reset(fill, rng);
        self.timer.reset(fill, rng);
        if !matches!(fill, MemoryFill::Keep) {
            self.devices = DeviceSet::new(self.config);
            if let MemoryFill::Randomize = fill {
                match &mut self.devices {
                    DeviceSet::SwitchesAndLeds { pio, .. }
                    | DeviceSet::PioPrinter { pio, .. } => pio.reset(fill, rng),
                    DeviceSet::HandshakePrinter { handshake, .. } => handshake.reset(fill, rng),
                }
            }
        }
    }

    /// Reads one port; the PIC and timer are tried first
    pub fn read(&self, port: u8) -> Result<u8, SimError> {
        if let Some(value) = self.pic.read(port) {
            return Ok(value);
        }
        if let Some(value) = self.timer.read(port) {
            return Ok(value);
        }
        let claimed = match &self.devices {
            DeviceSet::SwitchesAndLeds { pio, .. } | DeviceSet::PioPrinter { pio, .. } => {
                pio.read(port)
            }
            DeviceSet::HandshakePrinter { handshake, .. } => handshake.read(port),
        };
        claimed.ok_or(SimError::IoPortNotImplemented(port))
    }

    /// Writes one port, then re-syncs whatever is wired to it
    pub fn write(
        &mut self,
        port: u8,
        value: u8,
        events: &mut VecDeque<Event>,
    ) -> Result<(), SimError> {
        if self.pic.write(port, value).is_some() {
            return Ok(());
        }
        if self.timer.write(port, value).is_some() {
            return Ok(());
        }
        match &mut self.devices {
            DeviceSet::SwitchesAndLeds { pio, switches, leds } => {
                pio.write(port, value)
                    .ok_or(SimError::IoPortNotImplemented(port))?;
                switches.sync(pio);
                if leds.sync(pio) {
                    events.push_back(Event::Leds(leds.state()));
                }
            }
            DeviceSet::PioPrinter {
                pio,
                printer,
                last_strobe,
            } => {
                pio.write(port, value)
                    .ok_or(SimError::IoPortNotImplemented(port))?;
                Self::pio_strobe(pio, printer, last_strobe);
            }
            DeviceSet::HandshakePrinter { handshake, printer } => {
                handshake
                    .write(port, value, printer)
                    .ok_or(SimError::IoPortNotImplemented(port))?;
            }
        }
        Ok(())
    }

    /// Strobe edge detector for the hand-driven printer
    ///
    /// The strobe is PA bit 1 when configured as an output; a rising edge
    /// latches `PB`'s output bits into the printer. The busy line is PA
    /// bit 0 and is only driven when configured as an input.
    fn pio_strobe(pio: &mut Pio, printer: &mut Printer, last_strobe: &mut bool) {
        let strobe = pio.ca() & 0b10 == 0 && pio.pa() & 0b10 != 0;
        let rising = strobe && !*last_strobe;
        *last_strobe = strobe;
        if !rising || printer.busy() {
            return;
        }
        printer.push(pio.pb() & !pio.cb());
        if printer.busy() {
            Self::drive_pio_busy(pio, true);
        }
    }

    fn drive_pio_busy(pio: &mut Pio, busy: bool) {
        if pio.ca() & 0b01 == 0 {
            return;
        }
        let pa = if busy {
            pio.pa() | 0b01
        } else {
            pio.pa() & !0b01
        };
        pio.set_pa(pa);
    }

    /// One timer tick; a counter match raises the timer line
    pub fn tick_timer(&mut self) {
        if self.timer.tick() {
            self.pic.request(TIMER_LINE);
        }
    }

    /// One printer tick: prints a character and updates the busy line
    pub fn tick_printer(&mut self, events: &mut VecDeque<Event>) {
        match &mut self.devices {
            DeviceSet::SwitchesAndLeds { .. } => (),
            DeviceSet::PioPrinter { pio, printer, .. } => {
                if printer.tick().is_some() {
                    Self::drive_pio_busy(pio, printer.busy());
                    events.push_back(Event::Printer(printer.output().to_owned()));
                }
            }
            DeviceSet::HandshakePrinter { printer, .. } => {
                if printer.tick().is_some() {
                    events.push_back(Event::Printer(printer.output().to_owned()));
                }
            }
        }
        self.refresh();
    }

    /// Re-syncs continuous signals: the handshake busy mirror and its
    /// interrupt line
    ///
    /// Runs at every instruction boundary and after every device tick.
    pub fn refresh(&mut self) {
        if let DeviceSet::HandshakePrinter { handshake, printer } = &mut self.devices {
            handshake.sync_busy(printer.busy());
            if handshake.interrupts() {
                if printer.busy() {
                    self.pic.cancel(HANDSHAKE_LINE);
                } else {
                    self.pic.request(HANDSHAKE_LINE);
                }
            }
        }
    }

    /// Flips one of the eight switches, if the configuration has them
    pub fn toggle_switch(&mut self, index: usize, events: &mut VecDeque<Event>) {
        if let DeviceSet::SwitchesAndLeds { pio, switches, leds } = &mut self.devices {
            switches.toggle(index);
            switches.sync(pio);
            if leds.sync(pio) {
                events.push_back(Event::Leds(leds.state()));
            }
        } else {
            log::warn!("no switches in configuration {:?}", self.config);
        }
    }

    pub fn leds(&self) -> Option<[bool; 8]> {
        match &self.devices {
            DeviceSet::SwitchesAndLeds { leds, .. } => Some(leds.state()),
            _ => None,
        }
    }

    pub fn switches(&self) -> Option<[bool; 8]> {
        match &self.devices {
            DeviceSet::SwitchesAndLeds { switches, .. } => Some(switches.state()),
            _ => None,
        }
    }

    pub fn printer_output(&self) -> Option<&str> {
        match &self.devices {
            DeviceSet::SwitchesAndLeds { .. } => None,
            DeviceSet::PioPrinter { printer, .. } | DeviceSet::HandshakePrinter { printer, .. } => {
                Some(printer.output())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unmapped_ports_fail_per_configuration() {
        let bus = IoBus::new(DeviceConfig::SwitchesAndLeds);
        assert!(bus.read(PioPorts::PA).is_ok());
        assert!(matches!(
            bus.read(HandshakePorts::DATA),
            Err(SimError::IoPortNotImplemented(0x40))
        ));

        let bus = IoBus::new(DeviceConfig::HandshakePrinter);
        assert!(bus.read(HandshakePorts::DATA).is_ok());
        assert!(matches!(
            bus.read(PioPorts::PA),
            Err(SimError::IoPortNotImplemented(0x30))
        ));
    }

    #[test]
    fn timer_match_raises_the_timer_line() {
        let mut bus = IoBus::new(DeviceConfig::SwitchesAndLeds);
        let mut events = VecDeque::new();
        bus.write(0x21, !(1 << TIMER_LINE), &mut events).unwrap();
        bus.write(TimerPorts::COMP, 1, &mut events).unwrap();
        bus.tick_timer();
        assert_eq!(bus.pic.pending(), Some((TIMER_LINE, 0x11)));
    }

    #[test]
    fn pio_strobe_prints_on_the_rising_edge() {
        let mut bus = IoBus::new(DeviceConfig::PioPrinter);
        let mut events = VecDeque::new();
        // PA: bit 0 input (busy), bit 1 output (strobe); PB all output
        bus.write(PioPorts::CA, 0b01, &mut events).unwrap();
        bus.write(PioPorts::CB, 0x00, &mut events).unwrap();
        bus.write(PioPorts::PB, b'z', &mut events).unwrap();
        bus.write(PioPorts::PA, 0b10, &mut events).unwrap();
        // holding the strobe high does not print again
        bus.write(PioPorts::PA, 0b10, &mut events).unwrap();

        bus.tick_printer(&mut events);
        assert_eq!(bus.printer_output(), Some("z"));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn handshake_drives_line_two() {
        let mut bus = IoBus::new(DeviceConfig::HandshakePrinter);
        let mut events = VecDeque::new();
        bus.write(0x21, !(1 << HANDSHAKE_LINE), &mut events).unwrap();
        bus.write(HandshakePorts::STATE, 0b1000_0000, &mut events)
            .unwrap();
        bus.refresh();
        assert_eq!(bus.pic.pending(), Some((HANDSHAKE_LINE, 0x12)));

        // fill the buffer; busy cancels the request
        for _ in 0..5 {
            bus.write(HandshakePorts::DATA, b'.', &mut events).unwrap();
        }
        bus.refresh();
        assert_eq!(bus.read(HandshakePorts::STATE), Ok(0b1000_0001));
        assert_eq!(bus.pic.pending(), None);
    }

    #[test]
    fn switches_and_leds_follow_the_control_registers() {
        let mut bus = IoBus::new(DeviceConfig::SwitchesAndLeds);
        let mut events = VecDeque::new();
        bus.write(PioPorts::CB, 0x00, &mut events).unwrap();
        bus.write(PioPorts::PB, 0b1000_0000, &mut events).unwrap();
        assert!(bus.leds().unwrap()[0]);
        assert!(matches!(events.back(), Some(Event::Leds(_))));

        bus.write(PioPorts::CA, 0xFF, &mut events).unwrap();
        bus.toggle_switch(0, &mut events);
        assert_eq!(bus.read(PioPorts::PA).unwrap() & 0b1000_0000, 0b1000_0000);
    }
}
