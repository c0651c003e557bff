use finch_asm::MemoryAddress;
use thiserror::Error;

/// A fault that stops the current run
///
/// Unlike `HLT` (a normal stop) these are reported to the user once and the
/// machine will not make further progress until a program is reloaded.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SimError {
    /// Memory access outside `[0, 7FFFh]`
    #[error("memory address {0:04X}h is out of range")]
    AddressOutOfRange(i64),
    /// Store into a cell holding program code
    #[error("address {0} belongs to an instruction and is read-only")]
    WriteToCodeMemory(MemoryAddress),
    /// Push with the stack already at the bottom of memory
    #[error("stack overflow")]
    StackOverflow,
    /// Pop with the stack already empty
    #[error("stack underflow")]
    StackUnderflow,
    /// `IP` does not point at the start of any instruction
    #[error("no instruction at address {0:04X}h")]
    NoInstruction(u16),
    /// Hardware interrupt vectored to a software-reserved number
    #[error("interrupt number {0} is reserved")]
    ReservedInterrupt(u8),
    /// I/O access outside `[0, 7Fh]`
    #[error("I/O address {0:02X}h is out of range")]
    IoAddressOutOfRange(i64),
    /// Port inside the space but claimed by no device in the active set
    #[error("no device is mapped at I/O port {0:02X}h")]
    IoPortNotImplemented(u8),
    /// Step or run before any program was loaded
    #[error("no program is loaded")]
    NoProgramLoaded,
}
