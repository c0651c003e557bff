//! Parallel I/O interface: two 8-bit ports with per-bit direction control

use crate::memory::{MemoryFill, Xorshift};
use std::mem::offset_of;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Register window at ports `0x30..=0x33`
///
/// In the control registers a 1 bit configures the matching data bit as an
/// input and a 0 bit as an output.
#[derive(Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
pub struct PioPorts {
    /// Port A data
    pa: u8,
    /// Port B data
    pb: u8,
    /// Port A direction control
    ca: u8,
    /// Port B direction control
    cb: u8,
}

impl PioPorts {
    /// First port of the window
    pub const BASE: u8 = 0x30;
    /// Port A data
    pub const PA: u8 = Self::BASE | offset_of!(Self, pa) as u8;
    /// Port B data
    pub const PB: u8 = Self::BASE | offset_of!(Self, pb) as u8;
    /// Port A control
    pub const CA: u8 = Self::BASE | offset_of!(Self, ca) as u8;
    /// Port B control
    pub const CB: u8 = Self::BASE | offset_of!(Self, cb) as u8;
    const SIZE: u8 = std::mem::size_of::<Self>() as u8;
}

static_assertions::const_assert_eq!(PioPorts::SIZE, 4);

#[derive(Clone, Debug, Default)]
pub(crate) struct Pio {
    ports: PioPorts,
}

impl Pio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, fill: MemoryFill, rng: &mut Xorshift) {
        match fill {
            MemoryFill::Clean => self.ports = PioPorts::default(),
            MemoryFill::Randomize => {
                for byte in self.ports.as_mut_bytes() {
                    *byte = rng.next_byte();
                }
            }
            MemoryFill::Keep => (),
        }
    }

    fn offset(port: u8) -> Option<usize> {
        port.checked_sub(PioPorts::BASE)
            .filter(|o| *o < PioPorts::SIZE)
            .map(usize::from)
    }

    pub fn read(&self, port: u8) -> Option<u8> {
        Self::offset(port).map(|o| self.ports.as_bytes()[o])
    }

    /// True when the write landed in this device's window
    ///
    /// The caller re-syncs any wired peripheral afterwards; a write to `PA`
    /// or `CA` can change which bits the switches drive, and a write to `PB`
    /// or `CB` can change the LED image or raise the printer strobe.
    pub fn write(&mut self, port: u8, value: u8) -> Option<()> {
        let offset = Self::offset(port)?;
        self.ports.as_mut_bytes()[offset] = value;
        Some(())
    }

    pub fn pa(&self) -> u8 {
        self.ports.pa
    }

    pub fn pb(&self) -> u8 {
        self.ports.pb
    }

    pub fn ca(&self) -> u8 {
        self.ports.ca
    }

    pub fn cb(&self) -> u8 {
        self.ports.cb
    }

    pub fn set_pa(&mut self, value: u8) {
        self.ports.pa = value;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn window_and_registers() {
        let mut pio = Pio::new();
        assert!(pio.write(PioPorts::CA, 0xF0).is_some());
        assert!(pio.write(PioPorts::PB, 0x55).is_some());
        assert_eq!(pio.read(PioPorts::CA), Some(0xF0));
        assert_eq!(pio.read(PioPorts::PB), Some(0x55));
        assert_eq!(pio.read(0x34), None);
        assert_eq!(pio.read(0x2F), None);
    }
}
