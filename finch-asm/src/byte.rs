use std::fmt;

/// Operand width, byte or word
///
/// Most of the instruction set exists in both widths; the width decides
/// immediate encoding length, ALU range checks and which half of a port pair
/// an `IN`/`OUT` touches.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Size {
    /// 8-bit operand
    Byte,
    /// 16-bit operand
    Word,
}

impl Size {
    /// Width in bits
    pub fn bits(self) -> u32 {
        match self {
            Size::Byte => 8,
            Size::Word => 16,
        }
    }

    /// Width in bytes
    pub fn bytes(self) -> u16 {
        match self {
            Size::Byte => 1,
            Size::Word => 2,
        }
    }

    /// All-ones mask for this width
    pub fn mask(self) -> u16 {
        match self {
            Size::Byte => 0xFF,
            Size::Word => 0xFFFF,
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Size::Byte => "byte".fmt(f),
            Size::Word => "word".fmt(f),
        }
    }
}

/// Immutable fixed-width machine integer, `N` ∈ {8, 16}
///
/// Stores an unsigned magnitude in `[0, 2^N - 1]` and offers both the
/// unsigned and the two's-complement signed view of it. Construction from an
/// out-of-range value fails rather than truncating; the explicit
/// [`Byte::wrapping`] constructor is the only folding entry point.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Byte<const N: u32>(u16);

impl<const N: u32> Byte<N> {
    /// Number of bits
    pub const BITS: u32 = N;

    /// Largest unsigned value
    pub const MAX_UNSIGNED: u16 = ((1u32 << N) - 1) as u16;

    /// Largest two's-complement value
    pub const MAX_SIGNED: i16 = ((1i32 << (N - 1)) - 1) as i16;

    /// Smallest two's-complement value
    pub const MIN_SIGNED: i16 = (-(1i32 << (N - 1))) as i16;

    /// Builds from an unsigned value, failing if it does not fit
    pub fn from_unsigned(value: u16) -> Option<Self> {
        if value <= Self::MAX_UNSIGNED {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Builds from a signed value, failing if it does not fit
    pub fn from_signed(value: i16) -> Option<Self> {
        if value >= Self::MIN_SIGNED && value <= Self::MAX_SIGNED {
            Some(Self((value as u16) & Self::MAX_UNSIGNED))
        } else {
            None
        }
    }

    /// Builds by folding an arbitrary value into range
    pub fn wrapping(value: i64) -> Self {
        Self((value & i64::from(Self::MAX_UNSIGNED)) as u16)
    }

    /// Unsigned magnitude
    pub fn unsigned(self) -> u16 {
        self.0
    }

    /// Two's-complement view of the stored magnitude
    pub fn signed(self) -> i16 {
        // Sign-extend from N bits by shifting through the top of the word
        ((self.0 << (16 - N)) as i16) >> (16 - N)
    }

    /// Tests bit `i` (0 is the least significant)
    pub fn bit(self, i: u32) -> bool {
        debug_assert!(i < N);
        (self.0 >> i) & 1 == 1
    }

    /// True if `value` is representable in `N` bits, in either view
    pub fn fits(value: i64) -> bool {
        Self::fits_signed(value) || Self::fits_unsigned(value)
    }

    /// True if `value` is in the two's-complement range
    pub fn fits_signed(value: i64) -> bool {
        value >= i64::from(Self::MIN_SIGNED) && value <= i64::from(Self::MAX_SIGNED)
    }

    /// True if `value` is in the unsigned range
    pub fn fits_unsigned(value: i64) -> bool {
        value >= 0 && value <= i64::from(Self::MAX_UNSIGNED)
    }
}

impl Byte<16> {
    /// Low 8 bits
    pub fn low(self) -> Byte<8> {
        Byte(self.0 & 0xFF)
    }

    /// High 8 bits
    pub fn high(self) -> Byte<8> {
        Byte(self.0 >> 8)
    }

    /// Copy with the low 8 bits replaced
    #[must_use]
    pub fn with_low(self, lo: Byte<8>) -> Self {
        Byte((self.0 & 0xFF00) | lo.0)
    }

    /// Copy with the high 8 bits replaced
    #[must_use]
    pub fn with_high(self, hi: Byte<8>) -> Self {
        Byte((self.0 & 0x00FF) | (hi.0 << 8))
    }
}

impl From<u8> for Byte<8> {
    fn from(v: u8) -> Self {
        Byte(u16::from(v))
    }
}

impl From<u16> for Byte<16> {
    fn from(v: u16) -> Self {
        Byte(v)
    }
}

impl From<Byte<8>> for u8 {
    fn from(v: Byte<8>) -> u8 {
        v.0 as u8
    }
}

impl<const N: u32> fmt::Debug for Byte<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Byte<{N}>({:#x})", self.0)
    }
}

impl<const N: u32> fmt::Display for Byte<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match N {
            8 => write!(f, "{:02X}h", self.0),
            _ => write!(f, "{:04X}h", self.0),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unsigned_round_trip() {
        for v in 0..=255u16 {
            assert_eq!(Byte::<8>::from_unsigned(v).unwrap().unsigned(), v);
        }
        for v in [0u16, 1, 0x7FFF, 0x8000, 0xFFFF] {
            assert_eq!(Byte::<16>::from_unsigned(v).unwrap().unsigned(), v);
        }
        assert!(Byte::<8>::from_unsigned(256).is_none());
    }

    #[test]
    fn signed_view() {
        assert_eq!(Byte::<8>::from_unsigned(0xFF).unwrap().signed(), -1);
        assert_eq!(Byte::<8>::from_unsigned(0x80).unwrap().signed(), -128);
        assert_eq!(Byte::<8>::from_unsigned(0x7F).unwrap().signed(), 127);
        assert_eq!(Byte::<16>::from_unsigned(0xFFFF).unwrap().signed(), -1);
        assert_eq!(Byte::<16>::from_signed(-1).unwrap().unsigned(), 0xFFFF);
        assert_eq!(Byte::<8>::from_signed(-128).unwrap().unsigned(), 0x80);
        assert!(Byte::<8>::from_signed(128).is_none());
        assert!(Byte::<8>::from_signed(-129).is_none());
    }

    #[test]
    fn half_reconstruction() {
        for v in [0u16, 0x1234, 0xFF00, 0x00FF, 0xFFFF] {
            let w = Byte::<16>::from_unsigned(v).unwrap();
            let rebuilt = w.with_low(w.low()).with_high(w.high());
            assert_eq!(rebuilt.unsigned(), v);
            let zero = Byte::<16>::from_unsigned(0).unwrap();
            let roundabout = zero.with_low(w.low()).with_high(w.high());
            assert_eq!(roundabout.unsigned(), v);
        }
    }

    #[test]
    fn fits_ranges() {
        assert!(Byte::<8>::fits(-128));
        assert!(Byte::<8>::fits(255));
        assert!(!Byte::<8>::fits(256));
        assert!(!Byte::<8>::fits(-129));
        assert!(Byte::<16>::fits_unsigned(0xFFFF));
        assert!(!Byte::<16>::fits_unsigned(0x10000));
        assert!(Byte::<16>::fits_signed(-0x8000));
        assert!(!Byte::<16>::fits_signed(-0x8001));
    }

    #[test]
    fn wrapping_folds() {
        assert_eq!(Byte::<8>::wrapping(256).unsigned(), 0);
        assert_eq!(Byte::<8>::wrapping(-1).unsigned(), 0xFF);
        assert_eq!(Byte::<16>::wrapping(0x1_0005).unsigned(), 5);
    }

    #[test]
    fn bit_test() {
        let v = Byte::<8>::from_unsigned(0b1010_0001).unwrap();
        assert!(v.bit(0));
        assert!(!v.bit(1));
        assert!(v.bit(5));
        assert!(v.bit(7));
    }
}
