//! Main memory: 32K cells, with the program's code cells write-protected

use crate::SimError;
use finch_asm::{encoding::encode, MemoryAddress, Program, Size};
use std::collections::HashSet;

/// How memory and registers are initialized when a program is loaded
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MemoryFill {
    /// Every cell zeroed
    #[default]
    Clean,
    /// Every cell filled from the machine's seeded generator
    Randomize,
    /// Cells left as the previous run ended
    Keep,
}

/// Seeded xorshift generator for the `Randomize` fill policy
///
/// Deterministic on purpose: two runs from the same seed see the same
/// "garbage" memory, which keeps randomized-fill bugs reproducible.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Xorshift(u32);

impl Xorshift {
    pub fn new(seed: u32) -> Self {
        // xorshift has a single fixed point at zero
        Self(if seed == 0 { 0x9E37_79B9 } else { seed })
    }

    pub fn next_byte(&mut self) -> u8 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x >> 16) as u8
    }

    pub fn next_word(&mut self) -> u16 {
        u16::from_le_bytes([self.next_byte(), self.next_byte()])
    }
}

/// The machine's 32K address space
pub struct Memory {
    cells: Vec<u8>,
    code: HashSet<u16>,
}

impl Memory {
    pub(crate) fn new() -> Self {
        Self {
            cells: vec![0; MemoryAddress::SIZE],
            code: HashSet::new(),
        }
    }

    /// Resets memory and writes the program image
    ///
    /// Data cells left unassigned (`?`) keep whatever the fill policy put
    /// there. Instruction cells receive the encoded bytes and become
    /// read-only for the rest of the run.
    pub(crate) fn load(&mut self, program: &Program, fill: MemoryFill, rng: &mut Xorshift) {
        match fill {
            MemoryFill::Clean => self.cells.fill(0),
            MemoryFill::Randomize => self.cells.fill_with(|| rng.next_byte()),
            MemoryFill::Keep => (),
        }
        self.code = program.code_addresses.clone();

        for block in &program.data {
            let mut address = usize::from(block.start.value());
            let width = usize::from(block.size.bytes());
            for value in &block.values {
                if let Some(value) = value {
                    match block.size {
                        Size::Byte => self.cells[address] = *value as u8,
                        Size::Word => {
                            self.cells[address..address + 2]
                                .copy_from_slice(&value.to_le_bytes());
                        }
                    }
                }
                address += width;
            }
        }

        for instruction in &program.instructions {
            let start = usize::from(instruction.address.value());
            let bytes = encode(instruction);
            self.cells[start..start + bytes.len()].copy_from_slice(&bytes);
        }
    }

    /// Bounds-checked read at a computed address
    pub(crate) fn read(&self, address: i64, size: Size) -> Result<u16, SimError> {
        let a = self.checked(address, size)?;
        Ok(match size {
            Size::Byte => u16::from(self.cells[a]),
            Size::Word => u16::from_le_bytes([self.cells[a], self.cells[a + 1]]),
        })
    }

    /// Bounds- and code-checked write at a computed address
    pub(crate) fn write(&mut self, address: i64, size: Size, value: u16) -> Result<(), SimError> {
        let a = self.checked(address, size)?;
        for cell in a..a + usize::from(size.bytes()) {
            if self.code.contains(&(cell as u16)) {
                return Err(SimError::WriteToCodeMemory(
                    MemoryAddress::new(address).unwrap(),
                ));
            }
        }
        match size {
            Size::Byte => self.cells[a] = value as u8,
            Size::Word => self.cells[a..a + 2].copy_from_slice(&value.to_le_bytes()),
        }
        Ok(())
    }

    fn checked(&self, address: i64, size: Size) -> Result<usize, SimError> {
        let last = address + i64::from(size.bytes()) - 1;
        if MemoryAddress::new(address).is_none() || MemoryAddress::new(last).is_none() {
            return Err(SimError::AddressOutOfRange(address));
        }
        Ok(address as usize)
    }

    /// Whole memory image, for display
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use finch_asm::assemble;

    fn loaded(source: &str) -> Memory {
        let program = assemble(source).unwrap();
        let mut memory = Memory::new();
        memory.load(&program, MemoryFill::Clean, &mut Xorshift::new(1));
        memory
    }

    #[test]
    fn data_and_code_are_written() {
        let memory = loaded("org 1000h\nx db 7\nw dw 1234h\norg 2000h\nhlt\nend");
        assert_eq!(memory.read(0x1000, Size::Byte).unwrap(), 7);
        assert_eq!(memory.read(0x1001, Size::Word).unwrap(), 0x1234);
        // little-endian
        assert_eq!(memory.read(0x1001, Size::Byte).unwrap(), 0x34);
        // hlt opcode
        assert_eq!(memory.read(0x2000, Size::Byte).unwrap(), 0b0001_0001);
    }

    #[test]
    fn code_cells_reject_writes() {
        let mut memory = loaded("org 2000h\nhlt\nend");
        assert_eq!(
            memory.write(0x2000, Size::Byte, 0),
            Err(SimError::WriteToCodeMemory(
                MemoryAddress::new(0x2000).unwrap()
            ))
        );
        // a word write straddling the code cell fails too
        assert_eq!(
            memory.write(0x1FFF, Size::Word, 0),
            Err(SimError::WriteToCodeMemory(
                MemoryAddress::new(0x1FFF).unwrap()
            ))
        );
        assert!(memory.write(0x1FFF, Size::Byte, 0).is_ok());
    }

    #[test]
    fn bounds() {
        let memory = loaded("org 2000h\nhlt\nend");
        assert_eq!(
            memory.read(0x8000, Size::Byte),
            Err(SimError::AddressOutOfRange(0x8000))
        );
        assert_eq!(
            memory.read(0x7FFF, Size::Word),
            Err(SimError::AddressOutOfRange(0x7FFF))
        );
        assert!(memory.read(0x7FFF, Size::Byte).is_ok());
        assert_eq!(
            memory.read(-1, Size::Byte),
            Err(SimError::AddressOutOfRange(-1))
        );
    }

    #[test]
    fn randomize_is_reproducible() {
        let program = assemble("org 2000h\nhlt\nend").unwrap();
        let mut a = Memory::new();
        let mut b = Memory::new();
        a.load(&program, MemoryFill::Randomize, &mut Xorshift::new(42));
        b.load(&program, MemoryFill::Randomize, &mut Xorshift::new(42));
        assert_eq!(a.cells(), b.cells());
        // the program image still lands on top of the noise
        assert_eq!(a.read(0x2000, Size::Byte).unwrap(), 0b0001_0001);
    }
}
