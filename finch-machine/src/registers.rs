//! The register file, including the display-only trace registers

use crate::memory::{MemoryFill, Xorshift};
use finch_asm::{Byte, MemoryAddress, Register};

/// One past the top of memory; the initial `SP` of an empty stack
pub(crate) const STACK_TOP: u16 = MemoryAddress::MAX + 1;

/// Where execution begins after a reset; programs place code here with ORG
pub(crate) const INITIAL_IP: u16 = 0x2000;

/// CPU registers
///
/// The four general words expose 8-bit half aliases that read and write
/// through the parent word; `IR`, `MAR` and `MBR` trace the last fetch and
/// memory transfer for display.
#[derive(Clone, Debug)]
pub struct Registers {
    ax: Byte<16>,
    bx: Byte<16>,
    cx: Byte<16>,
    dx: Byte<16>,
    ip: Byte<16>,
    sp: Byte<16>,
    ir: Byte<8>,
    mar: Byte<16>,
    mbr: Byte<8>,
}

impl Registers {
    pub(crate) fn new() -> Self {
        Self {
            ax: Byte::from(0u16),
            bx: Byte::from(0u16),
            cx: Byte::from(0u16),
            dx: Byte::from(0u16),
            ip: Byte::from(INITIAL_IP),
            sp: Byte::from(STACK_TOP),
            ir: Byte::from(0u8),
            mar: Byte::from(0u16),
            mbr: Byte::from(0u8),
        }
    }

    pub(crate) fn reset(&mut self, fill: MemoryFill, rng: &mut Xorshift) {
        self.ip = Byte::from(INITIAL_IP);
        self.sp = Byte::from(STACK_TOP);
        self.ir = Byte::from(0u8);
        self.mar = Byte::from(0u16);
        self.mbr = Byte::from(0u8);
        match fill {
            MemoryFill::Clean => {
                self.ax = Byte::from(0u16);
                self.bx = Byte::from(0u16);
                self.cx = Byte::from(0u16);
                self.dx = Byte::from(0u16);
            }
            MemoryFill::Randomize => {
                self.ax = Byte::from(rng.next_word());
                self.bx = Byte::from(rng.next_word());
                self.cx = Byte::from(rng.next_word());
                self.dx = Byte::from(rng.next_word());
            }
            MemoryFill::Keep => (),
        }
    }

    /// Reads any register; half registers are views of their parent word
    pub fn get(&self, register: Register) -> u16 {
        match register {
            Register::Ax => self.ax.unsigned(),
            Register::Bx => self.bx.unsigned(),
            Register::Cx => self.cx.unsigned(),
            Register::Dx => self.dx.unsigned(),
            Register::Al => self.ax.low().unsigned(),
            Register::Bl => self.bx.low().unsigned(),
            Register::Cl => self.cx.low().unsigned(),
            Register::Dl => self.dx.low().unsigned(),
            Register::Ah => self.ax.high().unsigned(),
            Register::Bh => self.bx.high().unsigned(),
            Register::Ch => self.cx.high().unsigned(),
            Register::Dh => self.dx.high().unsigned(),
            Register::Sp => self.sp.unsigned(),
            Register::Ip => self.ip.unsigned(),
            Register::Ir => self.ir.unsigned(),
            Register::Mar => self.mar.unsigned(),
            Register::Mbr => self.mbr.unsigned(),
        }
    }

    /// Writes any register, folding the value to the register's width
    ///
    /// Writing a half register leaves the other half of its parent word
    /// untouched.
    pub(crate) fn set(&mut self, register: Register, value: u16) {
        let byte = Byte::<8>::wrapping(i64::from(value));
        match register {
            Register::Ax => self.ax = Byte::from(value),
            Register::Bx => self.bx = Byte::from(value),
            Register::Cx => self.cx = Byte::from(value),
            Register::Dx => self.dx = Byte::from(value),
            Register::Al => self.ax = self.ax.with_low(byte),
            Register::Bl => self.bx = self.bx.with_low(byte),
            Register::Cl => self.cx = self.cx.with_low(byte),
            Register::Dl => self.dx = self.dx.with_low(byte),
            Register::Ah => self.ax = self.ax.with_high(byte),
            Register::Bh => self.bx = self.bx.with_high(byte),
            Register::Ch => self.cx = self.cx.with_high(byte),
            Register::Dh => self.dx = self.dx.with_high(byte),
            Register::Sp => self.sp = Byte::from(value),
            Register::Ip => self.ip = Byte::from(value),
            Register::Ir => self.ir = byte,
            Register::Mar => self.mar = Byte::from(value),
            Register::Mbr => self.mbr = byte,
        }
    }

    /// Records the last memory transfer for the trace registers
    pub(crate) fn trace_transfer(&mut self, address: u16, value: u8) {
        self.mar = Byte::from(address);
        self.mbr = Byte::from(value);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn half_registers_write_through() {
        let mut r = Registers::new();
        r.set(Register::Ax, 0x1234);
        assert_eq!(r.get(Register::Al), 0x34);
        assert_eq!(r.get(Register::Ah), 0x12);

        r.set(Register::Al, 0xFF);
        assert_eq!(r.get(Register::Ax), 0x12FF);
        r.set(Register::Ah, 0x00);
        assert_eq!(r.get(Register::Ax), 0x00FF);
    }

    #[test]
    fn half_writes_fold_to_a_byte() {
        let mut r = Registers::new();
        r.set(Register::Bl, 0x1FF);
        assert_eq!(r.get(Register::Bx), 0x00FF);
    }

    #[test]
    fn reset_keeps_or_clears_general_registers() {
        let mut rng = Xorshift::new(7);
        let mut r = Registers::new();
        r.set(Register::Cx, 5);
        r.set(Register::Sp, 0x1234);
        r.reset(MemoryFill::Keep, &mut rng);
        assert_eq!(r.get(Register::Cx), 5);
        assert_eq!(r.get(Register::Sp), STACK_TOP);
        r.reset(MemoryFill::Clean, &mut rng);
        assert_eq!(r.get(Register::Cx), 0);
    }
}
