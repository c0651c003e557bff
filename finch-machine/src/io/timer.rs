//! Interval timer on a fixed 1 Hz clock

use crate::memory::{MemoryFill, Xorshift};
use std::mem::offset_of;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Register window at ports `0x10..=0x11`
#[derive(Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
pub struct TimerPorts {
    /// Free-running counter, incremented once per second
    cont: u8,
    /// Comparison value; `CONT == COMP` raises the timer interrupt
    comp: u8,
}

impl TimerPorts {
    /// First port of the window
    pub const BASE: u8 = 0x10;
    /// Counter port
    pub const CONT: u8 = Self::BASE | offset_of!(Self, cont) as u8;
    /// Comparison port
    pub const COMP: u8 = Self::BASE | offset_of!(Self, comp) as u8;
    const SIZE: u8 = std::mem::size_of::<Self>() as u8;
}

static_assertions::const_assert_eq!(TimerPorts::SIZE, 2);

#[derive(Clone, Debug, Default)]
pub(crate) struct Timer {
    ports: TimerPorts,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, fill: MemoryFill, rng: &mut Xorshift) {
        match fill {
            MemoryFill::Clean => self.ports = TimerPorts::default(),
            MemoryFill::Randomize => {
                self.ports.cont = rng.next_byte();
                self.ports.comp = rng.next_byte();
            }
            MemoryFill::Keep => (),
        }
    }

    fn offset(port: u8) -> Option<usize> {
        port.checked_sub(TimerPorts::BASE)
            .filter(|o| *o < TimerPorts::SIZE)
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

    /// One 1 Hz tick; true when the counter just reached `COMP`
    pub fn tick(&mut self) -> bool {
        self.ports.cont = self.ports.cont.wrapping_add(1);
        self.ports.cont == self.ports.comp
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_and_matches() {
        let mut timer = Timer::new();
        timer.write(TimerPorts::COMP, 3).unwrap();
        assert!(!timer.tick());
        assert!(!timer.tick());
        assert!(timer.tick());
        assert_eq!(timer.read(TimerPorts::CONT), Some(3));
    }

    #[test]
    fn counter_wraps() {
        let mut timer = Timer::new();
        timer.write(TimerPorts::CONT, 0xFF).unwrap();
        timer.write(TimerPorts::COMP, 0).unwrap();
        assert!(timer.tick());
        assert_eq!(timer.read(TimerPorts::CONT), Some(0));
    }
}
