use crate::{MemoryAddress, Register, Size, Span};
use std::fmt;
use thiserror::Error;

/// Everything that can go wrong between source text and a loadable program
///
/// Lexical and syntactic kinds abort the pipeline at the first occurrence;
/// semantic kinds are collected in batches across independent statements.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DiagnosticKind {
    // lexical
    /// Character that cannot start any token
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),
    /// String literal with no closing quote on the same line
    #[error("unterminated string")]
    UnterminatedString,
    /// `b`-suffixed literal with digits other than 0 and 1
    #[error("invalid binary literal")]
    InvalidBinaryLiteral,
    /// Unsuffixed literal with non-decimal digits
    #[error("invalid decimal literal")]
    InvalidDecimalLiteral,
    /// Byte outside the ASCII range
    #[error("only ASCII characters are supported")]
    NonAsciiCharacter,

    // syntactic
    /// Parser wanted one construct and found another
    #[error("expected {expected}, found {found}")]
    ExpectedToken {
        /// Description of the expected construct
        expected: &'static str,
        /// Display form of the offending token
        found: String,
    },
    /// An expression was required and none could start here
    #[error("expected a constant expression")]
    ExpectedArgument,
    /// Two sign operators in a row, e.g. `--1`
    #[error("ambiguous sequence of sign operators")]
    AmbiguousUnary,
    /// Number literal too large to evaluate
    #[error("number out of range")]
    NumberTooLarge,
    /// Same label defined twice
    #[error("duplicated label {0:?}")]
    DuplicatedLabel(String),
    /// `EQU` directive with no label to bind
    #[error("EQU requires a label")]
    EquRequiresLabel,
    /// Statement after the `END` directive
    #[error("END must be the last statement")]
    EndMustBeLast,
    /// Program with no `END` directive
    #[error("missing END directive")]
    MissingEnd,
    /// Program with no statements
    #[error("empty program")]
    EmptyProgram,
    /// `(` with no matching `)`
    #[error("unclosed parenthesis")]
    UnclosedParenthesis,

    // semantic
    /// Reference to a label no statement defines
    #[error("label {0:?} is not defined")]
    UndefinedLabel(String),
    /// `EQU` constant that (transitively) references itself
    #[error("constant {0:?} references itself")]
    CircularReference(String),
    /// Data label used as a plain value inside an expression
    #[error("label {0:?} must be wrapped in OFFSET to use its address")]
    DataLabelNeedsOffset(String),
    /// `OFFSET` applied to a label that does not name data
    #[error("OFFSET only applies to DB/DW labels, and {0:?} is not one")]
    OffsetOnlyForDataLabels(String),
    /// Jump or call operand that is not a bare label
    #[error("expected a label")]
    ExpectedLabel,
    /// Jump or call target that does not name an instruction
    #[error("label {0:?} does not point to an instruction")]
    ExpectedInstructionLabel(String),
    /// Instruction given the wrong number of operands
    #[error("expected {expected} operand(s), found {found}")]
    OperandCountMismatch {
        /// Operands the mnemonic takes
        expected: usize,
        /// Operands the statement supplied
        found: usize,
    },
    /// Internal register used as an operand
    #[error("register {0} cannot be used as an operand")]
    ReservedRegister(Register),
    /// Stack instruction with a non-word register
    #[error("expected a 16-bit general register")]
    ExpectedWordRegister,
    /// I/O instruction whose data operand is not AL or AX
    #[error("expected AL or AX")]
    ExpectedAccumulator,
    /// I/O instruction whose port operand is not DX or an immediate
    #[error("port must be DX or an immediate value")]
    ExpectedPort,
    /// Operand that must be an immediate value
    #[error("expected an immediate value")]
    ExpectedImmediate,
    /// Operand sizes disagree
    #[error("cannot operate between {dest} and {src}")]
    SizeMismatch {
        /// Width of the destination operand
        dest: Size,
        /// Width of the source operand
        src: Size,
    },
    /// Memory operand whose width nothing determines
    #[error("unknown operand size, annotate with BYTE PTR or WORD PTR")]
    UnknownSize,
    /// Both operands address memory
    #[error("only one operand may access memory")]
    DoubleMemoryAccess,
    /// Immediate in destination position
    #[error("destination cannot be an immediate value")]
    DestinationCannotBeImmediate,
    /// Statement with a memory footprint before any `ORG`
    #[error("no ORG before this statement, its address is unknown")]
    MissingOrg,
    /// Two statements claiming the same memory cell
    #[error("address {0} is already occupied")]
    OccupiedAddress(MemoryAddress),
    /// Computed address outside the memory space
    #[error("address {0} is out of range")]
    AddressOutOfRange(i64),
    /// Value does not fit the operand width
    #[error("value {value} does not fit in a {size}")]
    ValueOutOfRange {
        /// The evaluated value
        value: i64,
        /// Width it had to fit
        size: Size,
    },
    /// Store target inside the program's own code cells
    #[error("address {0} belongs to an instruction and is read-only")]
    ReadOnlyAddress(MemoryAddress),
    /// Branch displacement wider than the encoding allows
    #[error("jump target is too far ({distance} bytes)")]
    JumpTooFar {
        /// Displacement that did not fit
        distance: i64,
    },
    /// String literal where only numeric values are allowed
    #[error("DW cannot accept strings")]
    StringNotAllowed,
}

/// A positioned assembly error
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    /// What went wrong
    pub kind: DiagnosticKind,
    /// Where in the source it went wrong
    pub span: Span,
}

impl Diagnostic {
    /// Builds a diagnostic from its kind and location
    pub fn new(kind: DiagnosticKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for Diagnostic {}
