//! Arithmetic-logic unit and the packed flag word

use crate::memory::{MemoryFill, Xorshift};
use finch_asm::Size;

const CARRY: u16 = 1 << 0;
const ZERO: u16 = 1 << 6;
const SIGN: u16 = 1 << 7;
const INTERRUPT: u16 = 1 << 9;
const OVERFLOW: u16 = 1 << 11;

/// The four status flags
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Flags {
    /// Unsigned overflow or underflow of the last arithmetic result
    pub carry: bool,
    /// Last result was zero
    pub zero: bool,
    /// Top bit of the last result
    pub sign: bool,
    /// Signed overflow of the last arithmetic result
    pub overflow: bool,
}

/// Operation selector
///
/// `CMP` is not here: it is `Sub` with the write-back suppressed, and
/// `INC`/`DEC`/`NEG` are additions and subtractions with a fixed operand.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbb,
    And,
    Or,
    Xor,
    Not,
}

/// The ALU proper: `execute` plus its visible working state
///
/// Besides the flags, the unit latches the operands, result, and selector of
/// the most recent operation, the way the internal registers would read on a
/// front panel.
#[derive(Clone, Debug, Default)]
pub(crate) struct Alu {
    flags: Flags,
    left: u16,
    right: u16,
    result: u16,
    operation: Option<AluOp>,
}

impl Alu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, fill: MemoryFill, rng: &mut Xorshift) {
        if !matches!(fill, MemoryFill::Keep) {
            self.left = 0;
            self.right = 0;
            self.result = 0;
            self.operation = None;
        }
        match fill {
            MemoryFill::Clean => self.flags = Flags::default(),
            MemoryFill::Randomize => {
                let bits = rng.next_byte();
                self.flags = Flags {
                    carry: bits & 1 != 0,
                    zero: bits & 2 != 0,
                    sign: bits & 4 != 0,
                    overflow: bits & 8 != 0,
                };
            }
            MemoryFill::Keep => (),
        }
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    /// Operand latches from the most recent operation
    pub fn operands(&self) -> (u16, u16) {
        (self.left, self.right)
    }

    /// Result latch from the most recent operation
    pub fn result(&self) -> u16 {
        self.result
    }

    /// Selector of the most recent operation, if any ran since reset
    pub fn operation(&self) -> Option<AluOp> {
        self.operation
    }

    /// Runs one operation at the given width, updating the flags
    ///
    /// The result is folded back into `[0, 2^N - 1]`; folding in either
    /// direction sets carry. `Not` ignores `left`.
    pub fn execute(&mut self, op: AluOp, left: u16, right: u16, size: Size) -> u16 {
        self.left = left;
        self.right = right;
        self.operation = Some(op);
        let bits = u32::from(size.bytes()) * 8;
        let max = (1i64 << bits) - 1;
        self.result = match op {
            AluOp::Add | AluOp::Adc | AluOp::Sub | AluOp::Sbb => {
                let previous = i64::from(self.flags.carry);
                let mut result = match op {
                    AluOp::Add => i64::from(left) + i64::from(right),
                    AluOp::Adc => i64::from(left) + i64::from(right) + previous,
                    AluOp::Sub => i64::from(left) - i64::from(right),
                    AluOp::Sbb => i64::from(left) - i64::from(right) - previous,
                    _ => unreachable!(),
                };

                let mut carry = false;
                if result > max {
                    carry = true;
                    result -= max + 1;
                } else if result < 0 {
                    carry = true;
                    result += max + 1;
                }

                let top = bits - 1;
                let left_sign = left >> top & 1 != 0;
                let right_sign = right >> top & 1 != 0;
                let result_sign = result >> top & 1 != 0;

                let overflow = match op {
                    AluOp::Add | AluOp::Adc => left_sign == right_sign && left_sign != result_sign,
                    _ => left_sign != right_sign && right_sign == result_sign,
                };

                self.flags = Flags {
                    carry,
                    zero: result == 0,
                    sign: result_sign,
                    overflow,
                };
                result as u16
            }
            AluOp::And | AluOp::Or | AluOp::Xor | AluOp::Not => {
                let result = match op {
                    AluOp::And => left & right,
                    AluOp::Or => left | right,
                    AluOp::Xor => left ^ right,
                    AluOp::Not => !right,
                    _ => unreachable!(),
                } & max as u16;

                self.flags = Flags {
                    carry: false,
                    zero: result == 0,
                    sign: result >> (bits - 1) & 1 != 0,
                    overflow: false,
                };
                result
            }
        };
        self.result
    }
}

/// Packs the flags and the interrupt-enable bit into the flag word
///
/// Layout: carry bit 0, zero bit 6, sign bit 7, interrupt-enable bit 9,
/// overflow bit 11. `PUSHF` and interrupt entry both produce this word.
pub(crate) fn encode_flags(flags: Flags, interrupts_enabled: bool) -> u16 {
    let mut word = 0;
    if flags.carry {
        word |= CARRY;
    }
    if flags.zero {
        word |= ZERO;
    }
    if flags.sign {
        word |= SIGN;
    }
    if interrupts_enabled {
        word |= INTERRUPT;
    }
    if flags.overflow {
        word |= OVERFLOW;
    }
    word
}

/// Inverse of [`encode_flags`]; unassigned bits are ignored
pub(crate) fn decode_flags(word: u16) -> (Flags, bool) {
    (
        Flags {
            carry: word & CARRY != 0,
            zero: word & ZERO != 0,
            sign: word & SIGN != 0,
            overflow: word & OVERFLOW != 0,
        },
        word & INTERRUPT != 0,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_carry_and_overflow_truth() {
        let mut alu = Alu::new();
        for left in 0..=255u16 {
            for right in 0..=255u16 {
                alu.set_flags(Flags::default());
                let result = alu.execute(AluOp::Add, left, right, Size::Byte);
                let flags = alu.flags();
                let wide = left + right;
                assert_eq!(result, wide & 0xFF);
                assert_eq!(flags.carry, wide > 0xFF, "carry {left}+{right}");
                let signed = i32::from(left as u8 as i8) + i32::from(right as u8 as i8);
                assert_eq!(
                    flags.overflow,
                    !(-128..=127).contains(&signed),
                    "overflow {left}+{right}"
                );
                assert_eq!(flags.zero, result == 0);
                assert_eq!(flags.sign, result & 0x80 != 0);
            }
        }
    }

    #[test]
    fn sub_carry_and_overflow_truth() {
        let mut alu = Alu::new();
        for left in 0..=255u16 {
            for right in 0..=255u16 {
                alu.set_flags(Flags::default());
                let result = alu.execute(AluOp::Sub, left, right, Size::Byte);
                let flags = alu.flags();
                assert_eq!(result, left.wrapping_sub(right) & 0xFF);
                assert_eq!(flags.carry, left < right, "carry {left}-{right}");
                let signed = i32::from(left as u8 as i8) - i32::from(right as u8 as i8);
                assert_eq!(
                    flags.overflow,
                    !(-128..=127).contains(&signed),
                    "overflow {left}-{right}"
                );
            }
        }
    }

    #[test]
    fn adc_and_sbb_fold_the_previous_carry() {
        let mut alu = Alu::new();
        alu.set_flags(Flags {
            carry: true,
            ..Flags::default()
        });
        assert_eq!(alu.execute(AluOp::Adc, 0xFF, 0x00, Size::Byte), 0x00);
        assert!(alu.flags().carry);
        assert!(alu.flags().zero);

        alu.set_flags(Flags {
            carry: true,
            ..Flags::default()
        });
        assert_eq!(alu.execute(AluOp::Sbb, 0x00, 0x00, Size::Byte), 0xFF);
        assert!(alu.flags().carry);
        assert!(alu.flags().sign);
    }

    #[test]
    fn word_arithmetic_samples() {
        let mut alu = Alu::new();
        assert_eq!(alu.execute(AluOp::Add, 0xFFFF, 1, Size::Word), 0);
        assert!(alu.flags().carry);
        assert!(alu.flags().zero);
        assert!(!alu.flags().overflow);

        assert_eq!(alu.execute(AluOp::Add, 0x7FFF, 1, Size::Word), 0x8000);
        assert!(!alu.flags().carry);
        assert!(alu.flags().overflow);
        assert!(alu.flags().sign);

        assert_eq!(alu.execute(AluOp::Sub, 0x8000, 1, Size::Word), 0x7FFF);
        assert!(!alu.flags().carry);
        assert!(alu.flags().overflow);
    }

    #[test]
    fn logic_clears_carry_and_overflow() {
        let mut alu = Alu::new();
        alu.set_flags(Flags {
            carry: true,
            overflow: true,
            ..Flags::default()
        });
        assert_eq!(alu.execute(AluOp::Xor, 0xF0, 0xF0, Size::Byte), 0);
        let flags = alu.flags();
        assert!(!flags.carry && !flags.overflow && flags.zero && !flags.sign);

        assert_eq!(alu.execute(AluOp::Not, 0, 0x0F, Size::Byte), 0xF0);
        assert!(alu.flags().sign);
    }

    #[test]
    fn latches_track_the_most_recent_operation() {
        let mut alu = Alu::new();
        assert_eq!(alu.operation(), None);

        alu.execute(AluOp::Add, 3, 4, Size::Byte);
        alu.execute(AluOp::Xor, 0xFF, 0x0F, Size::Byte);
        assert_eq!(alu.operands(), (0xFF, 0x0F));
        assert_eq!(alu.result(), 0xF0);
        assert_eq!(alu.operation(), Some(AluOp::Xor));

        let mut rng = Xorshift::new(0);
        alu.reset(MemoryFill::Clean, &mut rng);
        assert_eq!(alu.operands(), (0, 0));
        assert_eq!(alu.operation(), None);
    }

    #[test]
    fn flag_word_round_trips() {
        let flags = Flags {
            carry: true,
            zero: false,
            sign: true,
            overflow: true,
        };
        let word = encode_flags(flags, true);
        assert_eq!(word, 1 | 1 << 7 | 1 << 9 | 1 << 11);
        assert_eq!(decode_flags(word), (flags, true));
        assert_eq!(decode_flags(0), (Flags::default(), false));
    }
}
