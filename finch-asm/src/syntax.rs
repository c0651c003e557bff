//! Parser output: statements, operands and constant expressions

use crate::{
    token::{Mnemonic, Register},
    Size, Span,
};

/// Compile-time numeric expression
///
/// Expressions appear in data values, immediates, direct addresses and `EQU`
/// definitions. They are evaluated by the analyzer once every label has an
/// address and every constant a value.
#[derive(Clone, Debug, PartialEq)]
pub struct NumberExpression {
    /// Expression node
    pub kind: ExprKind,
    /// Source range of the whole expression
    pub span: Span,
}

/// One node of a [`NumberExpression`]
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Number literal
    Number(u32),
    /// Label reference
    Label {
        /// Uppercased label name
        name: String,
        /// True when written `OFFSET name`: yields the address, not the value
        offset: bool,
    },
    /// Unary negation
    Neg(Box<NumberExpression>),
    /// Binary operation
    Binary {
        /// Operator
        op: ExprOp,
        /// Left operand
        lhs: Box<NumberExpression>,
        /// Right operand
        rhs: Box<NumberExpression>,
    },
}

/// Binary operator inside a constant expression
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExprOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
}

impl NumberExpression {
    pub(crate) fn number(value: u32, span: Span) -> Self {
        Self {
            kind: ExprKind::Number(value),
            span,
        }
    }

    pub(crate) fn label(name: String, offset: bool, span: Span) -> Self {
        Self {
            kind: ExprKind::Label { name, offset },
            span,
        }
    }

    pub(crate) fn neg(inner: NumberExpression, span: Span) -> Self {
        Self {
            kind: ExprKind::Neg(Box::new(inner)),
            span,
        }
    }

    pub(crate) fn binary(op: ExprOp, lhs: NumberExpression, rhs: NumberExpression) -> Self {
        let span = lhs.span.merge(rhs.span);
        Self {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        }
    }
}

/// One value of a `DB`/`DW` directive
#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    /// String literal, one byte per character (`DB` only)
    String {
        /// Text without the quotes
        text: String,
        /// Source range including the quotes
        span: Span,
    },
    /// `?`: space is reserved but not initialized
    Unassigned(Span),
    /// Initial value computed from an expression
    Expression(NumberExpression),
}

impl DataValue {
    /// Source range of the value
    pub fn span(&self) -> Span {
        match self {
            DataValue::String { span, .. } | DataValue::Unassigned(span) => *span,
            DataValue::Expression(e) => e.span,
        }
    }
}

/// Data directive kind
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataDirective {
    /// Byte cells
    Db,
    /// Word cells
    Dw,
    /// Compile-time constant, no memory footprint
    Equ,
}

/// One instruction operand as written
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Register name
    Register {
        /// The register
        register: Register,
        /// Source range
        span: Span,
    },
    /// Direct memory reference `[expr]`
    Direct {
        /// Width from a `BYTE PTR`/`WORD PTR` annotation, if present
        size: Option<Size>,
        /// Address expression
        expr: NumberExpression,
        /// Source range including brackets and annotation
        span: Span,
    },
    /// Indirect memory reference `[BX]`
    Indirect {
        /// Width from a `BYTE PTR`/`WORD PTR` annotation, if present
        size: Option<Size>,
        /// Source range including brackets and annotation
        span: Span,
    },
    /// Bare expression: an immediate, or a label standing in for memory
    Expression(NumberExpression),
}

impl Operand {
    /// Source range of the operand
    pub fn span(&self) -> Span {
        match self {
            Operand::Register { span, .. }
            | Operand::Direct { span, .. }
            | Operand::Indirect { span, .. } => *span,
            Operand::Expression(e) => e.span,
        }
    }
}

/// One parsed statement
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `ORG n`: move the location counter
    OriginChange {
        /// Literal target address (validated against the memory space later)
        address: u32,
        /// Source range
        span: Span,
    },
    /// `END`: end of program
    End {
        /// Source range
        span: Span,
    },
    /// `DB`/`DW`/`EQU` with its values
    Data {
        /// Which directive
        directive: DataDirective,
        /// Uppercased label, if any (`EQU` always has one)
        label: Option<String>,
        /// The comma-separated values (exactly one for `EQU`)
        values: Vec<DataValue>,
        /// Source range of the whole statement
        span: Span,
    },
    /// Instruction with its operands
    Instruction {
        /// Mnemonic
        mnemonic: Mnemonic,
        /// Uppercased label, if any
        label: Option<String>,
        /// Operands in source order
        operands: Vec<Operand>,
        /// Source range of the whole statement
        span: Span,
    },
}

impl Statement {
    /// Source range of the statement
    pub fn span(&self) -> Span {
        match self {
            Statement::OriginChange { span, .. }
            | Statement::End { span }
            | Statement::Data { span, .. }
            | Statement::Instruction { span, .. } => *span,
        }
    }

    /// Label defined by the statement, if any
    pub fn label(&self) -> Option<&str> {
        match self {
            Statement::Data { label, .. } | Statement::Instruction { label, .. } => {
                label.as_deref()
            }
            _ => None,
        }
    }
}
