//! The assembled artifact handed to the execution engine

use crate::{token::Register, MemoryAddress, Size, Span};
use std::collections::{HashMap, HashSet};

/// Two-operand transfer/ALU operation
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Mov, Add, Adc, Sub, Sbb, Cmp, And, Or, Xor,
}

/// One-operand ALU operation
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum UnaryOp {
    Not, Neg, Inc, Dec,
}

/// Branch operation
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum JumpOp {
    Jmp, Call, Jc, Jnc, Jz, Jnz, Js, Jns, Jo, Jno,
}

impl JumpOp {
    /// True for the flag-testing jumps, whose displacement is one byte
    pub fn is_conditional(self) -> bool {
        !matches!(self, JumpOp::Jmp | JumpOp::Call)
    }
}

/// Resolved destination of a two-operand instruction or unary target
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Target {
    /// A register
    Register(Register),
    /// Memory at a fixed address
    Direct(MemoryAddress),
    /// Memory at the address held in `BX`
    Indirect,
}

/// Resolved source of a two-operand instruction
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Source {
    /// A register
    Register(Register),
    /// Memory at a fixed address
    Direct(MemoryAddress),
    /// Memory at the address held in `BX`
    Indirect,
    /// A literal, already folded to the operand width
    Immediate(u16),
}

/// Port selector of an `IN`/`OUT`
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Port {
    /// Port number fixed at assembly time
    ///
    /// Any byte may be encoded; whether it is a valid port is checked when
    /// the access happens.
    Fixed(u8),
    /// Port number taken from `DX` at run time
    Dx,
}

/// What an instruction does, with every operand resolved to a concrete value
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstructionKind {
    /// MOV/ADD/ADC/SUB/SBB/CMP/AND/OR/XOR
    Binary {
        /// Operation
        op: BinaryOp,
        /// Operand width
        size: Size,
        /// Destination
        dest: Target,
        /// Source
        src: Source,
    },
    /// NOT/NEG/INC/DEC
    Unary {
        /// Operation
        op: UnaryOp,
        /// Operand width
        size: Size,
        /// Operand
        target: Target,
    },
    /// PUSH of a word register
    Push(Register),
    /// POP into a word register
    Pop(Register),
    /// Push the packed flag word
    Pushf,
    /// Pop the packed flag word
    Popf,
    /// JMP/CALL and the conditional jumps, with an absolute target
    Jump {
        /// Operation
        op: JumpOp,
        /// Target address (the encoder emits it relative)
        target: MemoryAddress,
    },
    /// IN from a port into AL/AX
    In {
        /// Transfer width
        size: Size,
        /// Port selector
        port: Port,
    },
    /// OUT from AL/AX to a port
    Out {
        /// Transfer width
        size: Size,
        /// Port selector
        port: Port,
    },
    /// Software interrupt
    Int(u8),
    /// Return from CALL
    Ret,
    /// Return from an interrupt handler
    Iret,
    /// Disable hardware interrupts
    Cli,
    /// Enable hardware interrupts
    Sti,
    /// Do nothing
    Nop,
    /// Stop the machine
    Hlt,
}

/// One fully resolved instruction
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedInstruction {
    /// Address of the first encoded byte
    pub address: MemoryAddress,
    /// Encoded length in bytes
    pub length: u16,
    /// Source range, for display while executing
    pub span: Span,
    /// The operation itself
    pub kind: InstructionKind,
}

impl ResolvedInstruction {
    /// Address of the byte after the instruction, where `IP` lands next
    pub fn next_address(&self) -> Option<MemoryAddress> {
        self.address.offset(i64::from(self.length))
    }
}

/// One `DB`/`DW` run of cells
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataBlock {
    /// Address of the first cell
    pub start: MemoryAddress,
    /// Cell width
    pub size: Size,
    /// One entry per cell; `None` reserves the cell without initializing it
    pub values: Vec<Option<u16>>,
}

impl DataBlock {
    /// Memory footprint in bytes
    pub fn length_bytes(&self) -> u16 {
        self.values.len() as u16 * self.size.bytes()
    }
}

/// The final artifact of assembly
///
/// Built once by the analyzer and never mutated afterwards. The engine
/// decodes nothing at run time; it executes these records directly, while
/// the encoded bytes are only written into memory for display and for the
/// `IR` trace register.
#[derive(Clone, Debug, Default)]
pub struct Program {
    /// `EQU` constants by name, for display
    pub constants: HashMap<String, i64>,
    /// Data runs in source order
    pub data: Vec<DataBlock>,
    /// Instructions in source order
    pub instructions: Vec<ResolvedInstruction>,
    /// Cells holding encoded instructions, read-only at run time
    pub code_addresses: HashSet<u16>,
}

impl Program {
    /// Finds the instruction whose encoding starts at `address`
    pub fn instruction_at(&self, address: u16) -> Option<&ResolvedInstruction> {
        self.instructions
            .iter()
            .find(|i| i.address.value() == address)
    }
}
