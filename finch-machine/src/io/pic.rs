//! Programmable interrupt controller

use crate::memory::{MemoryFill, Xorshift};
use std::mem::offset_of;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Register window at ports `0x20..=0x2B`
#[derive(Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
pub struct PicPorts {
    /// End-of-interrupt command; writing 0x20 ends the in-service line
    eoi: u8,
    /// Interrupt mask, one bit per line, 1 = masked
    imr: u8,
    /// Pending requests, one bit per line
    irr: u8,
    /// Line currently being serviced, at most one bit set
    isr: u8,
    /// Vector number configured for each line
    int: [u8; 8],
}

impl PicPorts {
    /// First port of the window
    pub const BASE: u8 = 0x20;
    /// End-of-interrupt command port
    pub const EOI: u8 = Self::BASE | offset_of!(Self, eoi) as u8;
    /// Interrupt mask port
    pub const IMR: u8 = Self::BASE | offset_of!(Self, imr) as u8;
    /// Request register port
    pub const IRR: u8 = Self::BASE | offset_of!(Self, irr) as u8;
    /// In-service register port
    pub const ISR: u8 = Self::BASE | offset_of!(Self, isr) as u8;
    /// Vector number port for line 0; lines 1..7 follow
    pub const INT0: u8 = Self::BASE | offset_of!(Self, int) as u8;
    const SIZE: u8 = std::mem::size_of::<Self>() as u8;
}

static_assertions::const_assert_eq!(PicPorts::SIZE, 12);

const END_OF_INTERRUPT: u8 = 0x20;

/// The controller: eight prioritized request lines fanned into one CPU signal
#[derive(Clone, Debug)]
pub(crate) struct Pic {
    ports: PicPorts,
}

impl Pic {
    pub fn new() -> Self {
        Self {
            ports: Self::reset_ports(),
        }
    }

    fn reset_ports() -> PicPorts {
        PicPorts {
            eoi: 0,
            imr: 0xFF,
            irr: 0,
            isr: 0,
            int: [0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17],
        }
    }

    pub fn reset(&mut self, fill: MemoryFill, rng: &mut Xorshift) {
        match fill {
            MemoryFill::Clean => self.ports = Self::reset_ports(),
            MemoryFill::Randomize => {
                self.ports = Self::reset_ports();
                self.ports.imr = rng.next_byte();
                for vector in &mut self.ports.int {
                    *vector = rng.next_byte();
                }
            }
            MemoryFill::Keep => (),
        }
    }

    fn offset(port: u8) -> Option<usize> {
        port.checked_sub(PicPorts::BASE)
            .filter(|o| *o < PicPorts::SIZE)
            .map(usize::from)
    }

    pub fn read(&self, port: u8) -> Option<u8> {
        Self::offset(port).map(|o| self.ports.as_bytes()[o])
    }

    pub fn write(&mut self, port: u8, value: u8) -> Option<()> {
        let offset = Self::offset(port)?;
        self.ports.as_mut_bytes()[offset] = value;
        Some(())
    }

    /// Raises a request line
    pub fn request(&mut self, line: u8) {
        self.ports.irr |= 1 << line;
    }

    /// Withdraws a request that has not been dispatched yet
    pub fn cancel(&mut self, line: u8) {
        self.ports.irr &= !(1 << line);
    }

    /// Applies a pending end-of-interrupt command
    ///
    /// Called once per instruction boundary, before looking for a new
    /// request.
    pub fn update_eoi(&mut self) {
        if self.ports.isr != 0 && self.ports.eoi == END_OF_INTERRUPT {
            self.ports.eoi = 0;
            self.ports.isr = 0;
        }
    }

    /// The line that should be serviced next, with its vector number
    ///
    /// Nothing is dispatched while a line is in service. Lower lines win.
    pub fn pending(&self) -> Option<(u8, u8)> {
        if self.ports.isr != 0 {
            return None;
        }
        (0..8)
            .find(|line| {
                let mask = 1u8 << line;
                self.ports.imr & mask == 0 && self.ports.irr & mask != 0
            })
            .map(|line| (line, self.ports.int[usize::from(line)]))
    }

    /// Commits the dispatch of `line`: the request becomes in-service
    pub fn acknowledge(&mut self, line: u8) {
        self.ports.irr &= !(1 << line);
        self.ports.isr = 1 << line;
        self.ports.eoi = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn unmasked() -> Pic {
        let mut pic = Pic::new();
        pic.write(0x21, 0x00);
        pic
    }

    #[test]
    fn lower_lines_win() {
        let mut pic = unmasked();
        pic.request(4);
        pic.request(1);
        assert_eq!(pic.pending(), Some((1, 0x11)));
        pic.acknowledge(1);
        assert_eq!(pic.read(0x22), Some(0b0001_0000));
        assert_eq!(pic.read(0x23), Some(0b0000_0010));
    }

    #[test]
    fn masked_lines_are_skipped() {
        let mut pic = Pic::new();
        pic.request(0);
        assert_eq!(pic.pending(), None);
        pic.write(0x21, !0b100);
        pic.request(2);
        assert_eq!(pic.pending(), Some((2, 0x12)));
    }

    #[test]
    fn in_service_blocks_until_eoi() {
        let mut pic = unmasked();
        pic.request(3);
        pic.acknowledge(3);
        pic.request(0);
        assert_eq!(pic.pending(), None);

        pic.write(0x20, END_OF_INTERRUPT);
        pic.update_eoi();
        assert_eq!(pic.read(0x23), Some(0));
        assert_eq!(pic.pending(), Some((0, 0x10)));
    }

    #[test]
    fn vectors_are_programmable() {
        let mut pic = unmasked();
        pic.write(0x24, 0x42);
        pic.request(0);
        assert_eq!(pic.pending(), Some((0, 0x42)));
    }
}
