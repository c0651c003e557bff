use std::fmt;

/// Address in main memory, `[0, 0x7FFF]`
///
/// The machine has a 15-bit physical address space. The wrapper is immutable;
/// arithmetic produces a fresh value by re-validating the computed integer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryAddress(u16);

impl MemoryAddress {
    /// Highest valid address
    pub const MAX: u16 = 0x7FFF;

    /// Number of memory cells
    pub const SIZE: usize = Self::MAX as usize + 1;

    /// Builds an address, failing if `value` is outside the address space
    pub fn new(value: i64) -> Option<Self> {
        if (0..=i64::from(Self::MAX)).contains(&value) {
            Some(Self(value as u16))
        } else {
            None
        }
    }

    /// Raw address value
    pub fn value(self) -> u16 {
        self.0
    }

    /// Address `delta` cells away, failing if it leaves the address space
    pub fn offset(self, delta: i64) -> Option<Self> {
        Self::new(i64::from(self.0) + delta)
    }
}

impl fmt::Display for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04X}h", self.0)
    }
}

/// Address in the I/O port space, `[0, 0x7F]`
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct IoAddress(u8);

impl IoAddress {
    /// Highest valid port
    pub const MAX: u8 = 0x7F;

    /// Builds a port address, failing if `value` is outside the port space
    pub fn new(value: i64) -> Option<Self> {
        if (0..=i64::from(Self::MAX)).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// Raw port number
    pub fn value(self) -> u8 {
        self.0
    }

    /// Port `delta` slots away, failing if it leaves the port space
    pub fn offset(self, delta: i64) -> Option<Self> {
        Self::new(i64::from(self.0) + delta)
    }
}

impl fmt::Display for IoAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02X}h", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_bounds() {
        assert_eq!(MemoryAddress::new(0).unwrap().value(), 0);
        assert_eq!(MemoryAddress::new(0x7FFF).unwrap().value(), 0x7FFF);
        assert!(MemoryAddress::new(0x8000).is_none());
        assert!(MemoryAddress::new(-1).is_none());
    }

    #[test]
    fn memory_offset_revalidates() {
        let a = MemoryAddress::new(0x7FFF).unwrap();
        assert!(a.offset(1).is_none());
        assert_eq!(a.offset(-1).unwrap().value(), 0x7FFE);
        let b = MemoryAddress::new(0).unwrap();
        assert!(b.offset(-1).is_none());
    }

    #[test]
    fn io_bounds() {
        assert_eq!(IoAddress::new(0x7F).unwrap().value(), 0x7F);
        assert!(IoAddress::new(0x80).is_none());
        assert!(IoAddress::new(-1).is_none());
    }
}
