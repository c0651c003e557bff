//! Handshake printer interface

use crate::io::printer::Printer;
use crate::memory::{MemoryFill, Xorshift};
use std::mem::offset_of;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Register window at ports `0x40..=0x41`
///
/// `STATE` is `IXXX XXSB`: bit 0 busy (from the printer), bit 1 strobe,
/// bit 7 interrupt enable.
#[derive(Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
pub struct HandshakePorts {
    /// Character latch feeding the printer
    data: u8,
    /// Status and control bits
    state: u8,
}

impl HandshakePorts {
    /// First port of the window
    pub const BASE: u8 = 0x40;
    /// Character port
    pub const DATA: u8 = Self::BASE | offset_of!(Self, data) as u8;
    /// Status and control port
    pub const STATE: u8 = Self::BASE | offset_of!(Self, state) as u8;
    const SIZE: u8 = std::mem::size_of::<Self>() as u8;
}

static_assertions::const_assert_eq!(HandshakePorts::SIZE, 2);

const BUSY: u8 = 1 << 0;
const STROBE: u8 = 1 << 1;
const INTERRUPT_ENABLE: u8 = 1 << 7;

#[derive(Clone, Debug, Default)]
pub(crate) struct Handshake {
    ports: HandshakePorts,
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, fill: MemoryFill, rng: &mut Xorshift) {
        match fill {
            MemoryFill::Clean => self.ports = HandshakePorts::default(),
            MemoryFill::Randomize => {
                self.ports.data = rng.next_byte();
                self.ports.state = 0;
            }
            MemoryFill::Keep => (),
        }
    }

    fn offset(port: u8) -> Option<usize> {
        port.checked_sub(HandshakePorts::BASE)
            .filter(|o| *o < HandshakePorts::SIZE)
            .map(usize::from)
    }

    pub fn read(&self, port: u8) -> Option<u8> {
        Self::offset(port).map(|o| self.ports.as_bytes()[o])
    }

    /// Writes a register, driving the printer
    ///
    /// Writing `DATA` latches the character and sends it immediately.
    /// Writing `STATE` with the strobe bit set also sends the latched
    /// character; the strobe reads back as 0, the pulse is not stored.
    pub fn write(&mut self, port: u8, value: u8, printer: &mut Printer) -> Option<()> {
        match port {
            HandshakePorts::DATA => {
                self.ports.data = value;
                printer.push(value);
            }
            HandshakePorts::STATE => {
                if value & STROBE != 0 {
                    printer.push(self.ports.data);
                }
                self.ports.state = value & !STROBE;
            }
            _ => return None,
        }
        Some(())
    }

    /// Mirrors the printer's busy line into the state register
    pub fn sync_busy(&mut self, busy: bool) {
        if busy {
            self.ports.state |= BUSY;
        } else {
            self.ports.state &= !BUSY;
        }
    }

    /// Interrupt enable bit; when set the interface drives PIC line 2
    pub fn interrupts(&self) -> bool {
        self.ports.state & INTERRUPT_ENABLE != 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_write_prints_immediately() {
        let mut handshake = Handshake::new();
        let mut printer = Printer::new();
        handshake
            .write(HandshakePorts::DATA, b'A', &mut printer)
            .unwrap();
        assert_eq!(printer.buffered(), 1);
        assert_eq!(handshake.read(HandshakePorts::DATA), Some(b'A'));
    }

    #[test]
    fn strobe_resends_and_is_not_stored() {
        let mut handshake = Handshake::new();
        let mut printer = Printer::new();
        handshake
            .write(HandshakePorts::DATA, b'B', &mut printer)
            .unwrap();
        handshake
            .write(HandshakePorts::STATE, STROBE | INTERRUPT_ENABLE, &mut printer)
            .unwrap();
        assert_eq!(printer.buffered(), 2);
        assert_eq!(
            handshake.read(HandshakePorts::STATE),
            Some(INTERRUPT_ENABLE)
        );
        assert!(handshake.interrupts());
    }

    #[test]
    fn busy_mirrors_the_printer() {
        let mut handshake = Handshake::new();
        handshake.sync_busy(true);
        assert_eq!(handshake.read(HandshakePorts::STATE), Some(BUSY));
        handshake.sync_busy(false);
        assert_eq!(handshake.read(HandshakePorts::STATE), Some(0));
    }
}
