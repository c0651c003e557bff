//! Pass 2: operand validation and byte-length fixing
//!
//! Every instruction class has a closed set of operand shapes; anything else
//! is rejected here. Once the shape is known the instruction's encoded
//! length follows from it alone, which is what pass 3 needs to lay out
//! addresses before any expression can be evaluated.

use super::LabelKind;
use crate::{
    program::{BinaryOp, JumpOp, UnaryOp},
    syntax::{DataDirective, DataValue, ExprKind, NumberExpression, Operand, Statement},
    token::{Mnemonic, Register},
    Diagnostic, DiagnosticKind, Size, Span,
};
use std::collections::HashMap;

/// A statement that passed validation
#[derive(Debug)]
pub(super) enum Validated {
    /// `ORG`: moves the location counter in pass 3
    Org {
        /// Raw target address
        address: u32,
        /// Statement range
        span: Span,
    },
    /// `DB`/`DW` run
    Data(ValidatedData),
    /// `EQU` definition, resolved in pass 4
    Equ(EquDef),
    /// Instruction with validated operands
    Instruction(ValidatedInstruction),
}

/// An `EQU` constant waiting for resolution
#[derive(Debug)]
pub(super) struct EquDef {
    pub label: String,
    pub value: NumberExpression,
    pub span: Span,
}

/// A `DB`/`DW` with its values flattened into cells
#[derive(Debug)]
pub(super) struct ValidatedData {
    pub label: Option<String>,
    pub size: Size,
    pub cells: Vec<DataCell>,
    pub span: Span,
}

impl ValidatedData {
    /// Memory footprint in bytes
    pub fn length_bytes(&self) -> u32 {
        self.cells.len() as u32 * u32::from(self.size.bytes())
    }
}

/// One cell of a data run
#[derive(Debug)]
pub(super) enum DataCell {
    /// Reserved by `?`, never written at load
    Unassigned,
    /// Known value, e.g. one character of a string
    Literal(u16),
    /// Value still to be evaluated in pass 5
    Expression(NumberExpression),
}

/// An instruction with validated operands and a fixed byte length
#[derive(Debug)]
pub(super) struct ValidatedInstruction {
    pub label: Option<String>,
    pub length: u16,
    pub span: Span,
    pub kind: ValidatedKind,
}

/// Validated instruction shapes; expressions are still unevaluated
#[derive(Debug)]
pub(super) enum ValidatedKind {
    Binary {
        op: BinaryOp,
        size: Size,
        dest: VTarget,
        src: VSource,
    },
    Unary {
        op: UnaryOp,
        size: Size,
        target: VTarget,
    },
    Push(Register),
    Pop(Register),
    Pushf,
    Popf,
    Jump {
        op: JumpOp,
        target: String,
        target_span: Span,
    },
    In {
        size: Size,
        port: VPort,
    },
    Out {
        size: Size,
        port: VPort,
    },
    Int {
        number: NumberExpression,
    },
    Ret,
    Iret,
    Cli,
    Sti,
    Nop,
    Hlt,
}

/// Write target before address evaluation
#[derive(Debug)]
pub(super) enum VTarget {
    Register(Register),
    Direct(NumberExpression),
    Indirect,
}

/// Read source before evaluation
#[derive(Debug)]
pub(super) enum VSource {
    Register(Register),
    Direct(NumberExpression),
    Indirect,
    Immediate(NumberExpression),
}

/// Port selector before evaluation
#[derive(Debug)]
pub(super) enum VPort {
    Fixed(NumberExpression),
    Dx,
}

/// Validates every statement, collecting diagnostics across them
pub(super) fn validate(
    statements: Vec<Statement>,
    kinds: &HashMap<String, LabelKind>,
) -> Result<Vec<Validated>, Vec<Diagnostic>> {
    let mut out = Vec::new();
    let mut errors = Vec::new();

    for statement in statements {
        match statement {
            Statement::OriginChange { address, span } => {
                out.push(Validated::Org { address, span });
            }
            Statement::End { .. } => (),
            Statement::Data {
                directive: DataDirective::Equ,
                label,
                values,
                span,
            } => {
                // The parser guarantees a label and exactly one expression
                let Some(label) = label else { unreachable!() };
                let Some(DataValue::Expression(value)) = values.into_iter().next() else {
                    unreachable!()
                };
                out.push(Validated::Equ(EquDef { label, value, span }));
            }
            Statement::Data {
                directive,
                label,
                values,
                span,
            } => {
                let size = match directive {
                    DataDirective::Db => Size::Byte,
                    DataDirective::Dw => Size::Word,
                    DataDirective::Equ => unreachable!(),
                };
                let mut cells = Vec::new();
                let mut ok = true;
                for value in values {
                    match value {
                        DataValue::String { text, .. } if size == Size::Byte => {
                            cells.extend(text.bytes().map(|b| DataCell::Literal(u16::from(b))));
                        }
                        DataValue::String { span, .. } => {
                            errors.push(Diagnostic::new(DiagnosticKind::StringNotAllowed, span));
                            ok = false;
                        }
                        DataValue::Unassigned(_) => cells.push(DataCell::Unassigned),
                        DataValue::Expression(e) => cells.push(DataCell::Expression(e)),
                    }
                }
                if ok {
                    out.push(Validated::Data(ValidatedData {
                        label,
                        size,
                        cells,
                        span,
                    }));
                }
            }
            Statement::Instruction {
                mnemonic,
                label,
                operands,
                span,
            } => match validate_instruction(mnemonic, operands, span, kinds) {
                Ok((kind, length)) => out.push(Validated::Instruction(ValidatedInstruction {
                    label,
                    length,
                    span,
                    kind,
                })),
                Err(e) => errors.push(e),
            },
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

type Checked = Result<(ValidatedKind, u16), Diagnostic>;

fn validate_instruction(
    mnemonic: Mnemonic,
    operands: Vec<Operand>,
    span: Span,
    kinds: &HashMap<String, LabelKind>,
) -> Checked {
    use Mnemonic as M;
    match mnemonic {
        M::Mov => binary(BinaryOp::Mov, operands, span, kinds),
        M::Add => binary(BinaryOp::Add, operands, span, kinds),
        M::Adc => binary(BinaryOp::Adc, operands, span, kinds),
        M::Sub => binary(BinaryOp::Sub, operands, span, kinds),
        M::Sbb => binary(BinaryOp::Sbb, operands, span, kinds),
        M::Cmp => binary(BinaryOp::Cmp, operands, span, kinds),
        M::And => binary(BinaryOp::And, operands, span, kinds),
        M::Or => binary(BinaryOp::Or, operands, span, kinds),
        M::Xor => binary(BinaryOp::Xor, operands, span, kinds),
        M::Not => unary(UnaryOp::Not, operands, span, kinds),
        M::Neg => unary(UnaryOp::Neg, operands, span, kinds),
        M::Inc => unary(UnaryOp::Inc, operands, span, kinds),
        M::Dec => unary(UnaryOp::Dec, operands, span, kinds),
        M::Push => stack(true, operands, span),
        M::Pop => stack(false, operands, span),
        M::Pushf => zeroary(ValidatedKind::Pushf, operands, span),
        M::Popf => zeroary(ValidatedKind::Popf, operands, span),
        M::Jmp => jump(JumpOp::Jmp, operands, span, kinds),
        M::Call => jump(JumpOp::Call, operands, span, kinds),
        M::Ret => zeroary(ValidatedKind::Ret, operands, span),
        M::Jc => jump(JumpOp::Jc, operands, span, kinds),
        M::Jnc => jump(JumpOp::Jnc, operands, span, kinds),
        M::Jz => jump(JumpOp::Jz, operands, span, kinds),
        M::Jnz => jump(JumpOp::Jnz, operands, span, kinds),
        M::Js => jump(JumpOp::Js, operands, span, kinds),
        M::Jns => jump(JumpOp::Jns, operands, span, kinds),
        M::Jo => jump(JumpOp::Jo, operands, span, kinds),
        M::Jno => jump(JumpOp::Jno, operands, span, kinds),
        M::In => io(true, operands, span),
        M::Out => io(false, operands, span),
        M::Int => interrupt(operands, span),
        M::Iret => zeroary(ValidatedKind::Iret, operands, span),
        M::Cli => zeroary(ValidatedKind::Cli, operands, span),
        M::Sti => zeroary(ValidatedKind::Sti, operands, span),
        M::Nop => zeroary(ValidatedKind::Nop, operands, span),
        M::Hlt => zeroary(ValidatedKind::Hlt, operands, span),
    }
}

fn expect_count(operands: &[Operand], expected: usize, span: Span) -> Result<(), Diagnostic> {
    if operands.len() == expected {
        Ok(())
    } else {
        Err(Diagnostic::new(
            DiagnosticKind::OperandCountMismatch {
                expected,
                found: operands.len(),
            },
            span,
        ))
    }
}

/// Operand reduced to register / memory / immediate
enum Shape {
    Reg(Register),
    Mem {
        size: Option<Size>,
        addr: MemShape,
    },
    Imm(NumberExpression),
}

enum MemShape {
    Direct(NumberExpression),
    Indirect,
}

/// Classifies one operand, applying the data-label rewrite
///
/// A bare label naming a `DB`/`DW` run stands for the memory it reserves: it
/// becomes a direct reference to `OFFSET label`, and brings the run's cell
/// width with it. Every other bare expression is an immediate.
fn shape_of(
    operand: Operand,
    kinds: &HashMap<String, LabelKind>,
) -> Result<(Shape, Span), Diagnostic> {
    match operand {
        Operand::Register { register, span } => {
            if register.code().is_none() {
                return Err(Diagnostic::new(
                    DiagnosticKind::ReservedRegister(register),
                    span,
                ));
            }
            Ok((Shape::Reg(register), span))
        }
        Operand::Direct { size, expr, span } => Ok((
            Shape::Mem {
                size,
                addr: MemShape::Direct(expr),
            },
            span,
        )),
        Operand::Indirect { size, span } => Ok((
            Shape::Mem {
                size,
                addr: MemShape::Indirect,
            },
            span,
        )),
        Operand::Expression(expr) => {
            let span = expr.span;
            if let ExprKind::Label {
                name,
                offset: false,
            } = &expr.kind
            {
                if let Some(size) = kinds.get(name).and_then(|k| k.data_size()) {
                    let addr = NumberExpression::label(name.clone(), true, span);
                    return Ok((
                        Shape::Mem {
                            size: Some(size),
                            addr: MemShape::Direct(addr),
                        },
                        span,
                    ));
                }
            }
            Ok((Shape::Imm(expr), span))
        }
    }
}

fn binary(
    op: BinaryOp,
    operands: Vec<Operand>,
    span: Span,
    kinds: &HashMap<String, LabelKind>,
) -> Checked {
    expect_count(&operands, 2, span)?;
    let Ok([dest_op, src_op]) = <[Operand; 2]>::try_from(operands) else {
        unreachable!()
    };
    let (dest, dest_span) = shape_of(dest_op, kinds)?;
    let (src, src_span) = shape_of(src_op, kinds)?;

    let mismatch = |dest: Size, src: Size| {
        Diagnostic::new(DiagnosticKind::SizeMismatch { dest, src }, span)
    };

    let (size, dest, src, length) = match (dest, src) {
        (Shape::Imm(_), _) => {
            return Err(Diagnostic::new(
                DiagnosticKind::DestinationCannotBeImmediate,
                dest_span,
            ));
        }
        (Shape::Mem { .. }, Shape::Mem { .. }) => {
            return Err(Diagnostic::new(
                DiagnosticKind::DoubleMemoryAccess,
                src_span,
            ));
        }
        (Shape::Reg(d), Shape::Reg(s)) => {
            if d.size() != s.size() {
                return Err(mismatch(d.size(), s.size()));
            }
            (d.size(), VTarget::Register(d), VSource::Register(s), 2)
        }
        (Shape::Reg(d), Shape::Mem { size, addr }) => {
            if size.is_some_and(|s| s != d.size()) {
                return Err(mismatch(d.size(), size.unwrap_or(d.size())));
            }
            match addr {
                MemShape::Direct(e) => {
                    (d.size(), VTarget::Register(d), VSource::Direct(e), 4)
                }
                MemShape::Indirect => (d.size(), VTarget::Register(d), VSource::Indirect, 2),
            }
        }
        (Shape::Reg(d), Shape::Imm(e)) => {
            let length = 2 + d.size().bytes();
            (d.size(), VTarget::Register(d), VSource::Immediate(e), length)
        }
        (Shape::Mem { size, addr }, Shape::Reg(s)) => {
            if size.is_some_and(|d| d != s.size()) {
                return Err(mismatch(size.unwrap_or(s.size()), s.size()));
            }
            match addr {
                MemShape::Direct(e) => (s.size(), VTarget::Direct(e), VSource::Register(s), 4),
                MemShape::Indirect => (s.size(), VTarget::Indirect, VSource::Register(s), 2),
            }
        }
        (Shape::Mem { size, addr }, Shape::Imm(e)) => {
            let Some(size) = size else {
                return Err(Diagnostic::new(DiagnosticKind::UnknownSize, dest_span));
            };
            match addr {
                MemShape::Direct(a) => (
                    size,
                    VTarget::Direct(a),
                    VSource::Immediate(e),
                    4 + size.bytes(),
                ),
                MemShape::Indirect => (
                    size,
                    VTarget::Indirect,
                    VSource::Immediate(e),
                    2 + size.bytes(),
                ),
            }
        }
    };
    Ok((ValidatedKind::Binary {
        op,
        size,
        dest,
        src,
    }, length))
}

fn unary(
    op: UnaryOp,
    operands: Vec<Operand>,
    span: Span,
    kinds: &HashMap<String, LabelKind>,
) -> Checked {
    expect_count(&operands, 1, span)?;
    let Ok([operand]) = <[Operand; 1]>::try_from(operands) else {
        unreachable!()
    };
    let (shape, op_span) = shape_of(operand, kinds)?;
    match shape {
        Shape::Reg(r) => Ok((
            ValidatedKind::Unary {
                op,
                size: r.size(),
                target: VTarget::Register(r),
            },
            2,
        )),
        Shape::Mem {
            size: Some(size),
            addr,
        } => {
            let (target, length) = match addr {
                MemShape::Direct(e) => (VTarget::Direct(e), 4),
                MemShape::Indirect => (VTarget::Indirect, 2),
            };
            Ok((ValidatedKind::Unary { op, size, target }, length))
        }
        Shape::Mem { size: None, .. } => {
            Err(Diagnostic::new(DiagnosticKind::UnknownSize, op_span))
        }
        Shape::Imm(_) => Err(Diagnostic::new(
            DiagnosticKind::DestinationCannotBeImmediate,
            op_span,
        )),
    }
}

fn stack(push: bool, operands: Vec<Operand>, span: Span) -> Checked {
    expect_count(&operands, 1, span)?;
    let Ok([operand]) = <[Operand; 1]>::try_from(operands) else {
        unreachable!()
    };
    let op_span = operand.span();
    let Operand::Register { register, .. } = operand else {
        return Err(Diagnostic::new(DiagnosticKind::ExpectedWordRegister, op_span));
    };
    if register.code().is_none() {
        return Err(Diagnostic::new(
            DiagnosticKind::ReservedRegister(register),
            op_span,
        ));
    }
    if register.size() != Size::Word {
        return Err(Diagnostic::new(DiagnosticKind::ExpectedWordRegister, op_span));
    }
    let kind = if push {
        ValidatedKind::Push(register)
    } else {
        ValidatedKind::Pop(register)
    };
    Ok((kind, 1))
}

fn jump(
    op: JumpOp,
    operands: Vec<Operand>,
    span: Span,
    kinds: &HashMap<String, LabelKind>,
) -> Checked {
    expect_count(&operands, 1, span)?;
    let Ok([operand]) = <[Operand; 1]>::try_from(operands) else {
        unreachable!()
    };
    let op_span = operand.span();
    let Operand::Expression(e) = operand else {
        return Err(Diagnostic::new(DiagnosticKind::ExpectedLabel, op_span));
    };
    let ExprKind::Label {
        name,
        offset: false,
    } = e.kind
    else {
        return Err(Diagnostic::new(DiagnosticKind::ExpectedLabel, e.span));
    };
    match kinds.get(&name) {
        None => Err(Diagnostic::new(DiagnosticKind::UndefinedLabel(name), e.span)),
        Some(LabelKind::Instruction) => {
            let length = if op.is_conditional() { 2 } else { 3 };
            Ok((
                ValidatedKind::Jump {
                    op,
                    target: name,
                    target_span: e.span,
                },
                length,
            ))
        }
        Some(_) => Err(Diagnostic::new(
            DiagnosticKind::ExpectedInstructionLabel(name),
            e.span,
        )),
    }
}

fn io(input: bool, operands: Vec<Operand>, span: Span) -> Checked {
    expect_count(&operands, 2, span)?;
    let Ok([a, b]) = <[Operand; 2]>::try_from(operands) else {
        unreachable!()
    };
    // IN takes (accumulator, port), OUT takes (port, accumulator)
    let (acc, port) = if input { (a, b) } else { (b, a) };

    let size = match acc {
        Operand::Register {
            register: Register::Al,
            ..
        } => Size::Byte,
        Operand::Register {
            register: Register::Ax,
            ..
        } => Size::Word,
        other => {
            return Err(Diagnostic::new(
                DiagnosticKind::ExpectedAccumulator,
                other.span(),
            ));
        }
    };
    let port = match port {
        Operand::Register {
            register: Register::Dx,
            ..
        } => VPort::Dx,
        Operand::Expression(e) => VPort::Fixed(e),
        other => {
            return Err(Diagnostic::new(DiagnosticKind::ExpectedPort, other.span()));
        }
    };
    let length = match port {
        VPort::Dx => 1,
        VPort::Fixed(_) => 2,
    };
    let kind = if input {
        ValidatedKind::In { size, port }
    } else {
        ValidatedKind::Out { size, port }
    };
    Ok((kind, length))
}

fn interrupt(operands: Vec<Operand>, span: Span) -> Checked {
    expect_count(&operands, 1, span)?;
    let Ok([operand]) = <[Operand; 1]>::try_from(operands) else {
        unreachable!()
    };
    let op_span = operand.span();
    let Operand::Expression(number) = operand else {
        return Err(Diagnostic::new(DiagnosticKind::ExpectedImmediate, op_span));
    };
    Ok((ValidatedKind::Int { number }, 2))
}

fn zeroary(kind: ValidatedKind, operands: Vec<Operand>, span: Span) -> Checked {
    expect_count(&operands, 0, span)?;
    Ok((kind, 1))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analyzer::classify_labels;
    use crate::{lexer::tokenize, parser::parse};

    fn validated(source: &str) -> Vec<Validated> {
        let statements = parse(&tokenize(source).unwrap()).unwrap();
        let kinds = classify_labels(&statements);
        validate(statements, &kinds).unwrap()
    }

    fn first_error(source: &str) -> DiagnosticKind {
        let statements = parse(&tokenize(source).unwrap()).unwrap();
        let kinds = classify_labels(&statements);
        validate(statements, &kinds).unwrap_err().remove(0).kind
    }

    fn instruction_lengths(source: &str) -> Vec<u16> {
        validated(source)
            .into_iter()
            .filter_map(|v| match v {
                Validated::Instruction(i) => Some(i.length),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn lengths_follow_addressing_mode() {
        assert_eq!(
            instruction_lengths(
                "org 2000h\n\
                 mov ax, bx\n\
                 mov al, [1000h]\n\
                 mov cl, 12\n\
                 mov cx, 12\n\
                 mov [bx], dl\n\
                 mov word ptr [20h], 5\n\
                 hlt\nend"
            ),
            vec![2, 4, 3, 4, 2, 6, 1]
        );
    }

    #[test]
    fn data_label_stands_for_memory() {
        // `x` is byte data, so `mov al, x` is a 4-byte direct load
        let lengths = instruction_lengths("org 1000h\nx db 1\norg 2000h\nmov al, x\nhlt\nend");
        assert_eq!(lengths, vec![4, 1]);
    }

    #[test]
    fn constant_label_stands_for_immediate() {
        let lengths = instruction_lengths("n equ 7\norg 2000h\nmov al, n\nhlt\nend");
        assert_eq!(lengths, vec![3, 1]);
    }

    #[test]
    fn size_mismatch() {
        assert!(matches!(
            first_error("org 2000h\nmov al, bx\nend"),
            DiagnosticKind::SizeMismatch { .. }
        ));
        assert!(matches!(
            first_error("org 1000h\nw dw 1\norg 2000h\nmov al, w\nend"),
            DiagnosticKind::SizeMismatch { .. }
        ));
    }

    #[test]
    fn unknown_size_needs_annotation() {
        assert_eq!(
            first_error("org 2000h\ninc [1000h]\nend"),
            DiagnosticKind::UnknownSize
        );
        assert_eq!(
            first_error("org 2000h\nmov [bx], 5\nend"),
            DiagnosticKind::UnknownSize
        );
        let lengths = instruction_lengths("org 2000h\ninc byte ptr [1000h]\nend");
        assert_eq!(lengths, vec![4]);
    }

    #[test]
    fn memory_to_memory_rejected() {
        assert_eq!(
            first_error("org 2000h\nmov [bx], [1000h]\nend"),
            DiagnosticKind::DoubleMemoryAccess
        );
    }

    #[test]
    fn immediate_destination_rejected() {
        assert_eq!(
            first_error("org 2000h\nmov 5, al\nend"),
            DiagnosticKind::DestinationCannotBeImmediate
        );
        assert_eq!(
            first_error("n equ 5\norg 2000h\nmov n, al\nend"),
            DiagnosticKind::DestinationCannotBeImmediate
        );
    }

    #[test]
    fn internal_registers_rejected() {
        assert!(matches!(
            first_error("org 2000h\nmov ip, ax\nend"),
            DiagnosticKind::ReservedRegister(Register::Ip)
        ));
        assert!(matches!(
            first_error("org 2000h\npush mar\nend"),
            DiagnosticKind::ReservedRegister(Register::Mar)
        ));
    }

    #[test]
    fn stack_wants_word_registers() {
        assert_eq!(
            first_error("org 2000h\npush al\nend"),
            DiagnosticKind::ExpectedWordRegister
        );
        let lengths = instruction_lengths("org 2000h\npush ax\npop bx\npush sp\nend");
        assert_eq!(lengths, vec![1, 1, 1]);
    }

    #[test]
    fn jump_targets_must_be_instructions() {
        assert!(matches!(
            first_error("org 1000h\nx db 1\norg 2000h\njmp x\nend"),
            DiagnosticKind::ExpectedInstructionLabel(_)
        ));
        assert!(matches!(
            first_error("org 2000h\njmp nowhere\nend"),
            DiagnosticKind::UndefinedLabel(_)
        ));
        assert_eq!(
            first_error("org 2000h\njmp 1234h\nend"),
            DiagnosticKind::ExpectedLabel
        );
    }

    #[test]
    fn io_operand_shapes() {
        let lengths = instruction_lengths("org 2000h\nin al, 30h\nout dx, ax\nend");
        assert_eq!(lengths, vec![2, 1]);
        assert_eq!(
            first_error("org 2000h\nin bl, 30h\nend"),
            DiagnosticKind::ExpectedAccumulator
        );
        assert_eq!(
            first_error("org 2000h\nout cx, al\nend"),
            DiagnosticKind::ExpectedPort
        );
    }

    #[test]
    fn operand_counts() {
        assert_eq!(
            first_error("org 2000h\nmov ax\nend"),
            DiagnosticKind::OperandCountMismatch {
                expected: 2,
                found: 1
            }
        );
        assert_eq!(
            first_error("org 2000h\nnop ax\nend"),
            DiagnosticKind::OperandCountMismatch {
                expected: 0,
                found: 1
            }
        );
    }

    #[test]
    fn dw_rejects_strings() {
        assert_eq!(
            first_error("org 1000h\nx dw \"no\"\nend"),
            DiagnosticKind::StringNotAllowed
        );
    }
}
