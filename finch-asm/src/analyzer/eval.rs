//! Pass 5: final evaluation
//!
//! Every expression still standing after constant resolution is reduced to a
//! concrete integer: data initial values, direct addresses, immediates,
//! ports, interrupt numbers and jump displacements, each with its own range
//! check. The output is the finished [`Program`].

use super::{
    constants::ConstantTable,
    layout::{Layout, Placed},
    validate::{DataCell, ValidatedInstruction, ValidatedKind, VPort, VSource, VTarget},
    LabelKind,
};
use crate::{
    program::{
        BinaryOp, DataBlock, InstructionKind, JumpOp, Port, Program, ResolvedInstruction, Source,
        Target,
    },
    syntax::NumberExpression,
    Byte, Diagnostic, DiagnosticKind, MemoryAddress, Size, Span,
};
use std::collections::{HashMap, HashSet};

struct Context<'a> {
    constants: ConstantTable,
    kinds: &'a HashMap<String, LabelKind>,
    addresses: HashMap<String, u16>,
    code_addresses: HashSet<u16>,
}

pub(super) fn finalize(
    layout: Layout,
    constants: ConstantTable,
    kinds: &HashMap<String, LabelKind>,
) -> Result<Program, Vec<Diagnostic>> {
    let mut ctx = Context {
        constants,
        kinds,
        addresses: layout.addresses,
        code_addresses: layout.code_addresses,
    };

    let mut errors = Vec::new();
    let mut data = Vec::new();
    let mut instructions = Vec::new();

    for placed in layout.placed {
        match placed {
            Placed::Data {
                start,
                data: block,
            } => {
                let mut values = Vec::with_capacity(block.cells.len());
                for cell in block.cells {
                    match cell {
                        DataCell::Unassigned => values.push(None),
                        DataCell::Literal(v) => values.push(Some(v)),
                        DataCell::Expression(e) => {
                            match ctx.eval_sized(&e, block.size) {
                                Ok(v) => values.push(Some(v)),
                                Err(e) => errors.push(e),
                            }
                        }
                    }
                }
                data.push(DataBlock {
                    start,
                    size: block.size,
                    values,
                });
            }
            Placed::Instruction { start, instruction } => {
                match ctx.resolve_instruction(start, instruction) {
                    Ok(i) => instructions.push(i),
                    Err(e) => errors.push(e),
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(Program {
            constants: ctx.constants.into_values(),
            data,
            instructions,
            code_addresses: ctx.code_addresses,
        })
    } else {
        Err(errors)
    }
}

impl Context<'_> {
    fn eval(&mut self, expr: &NumberExpression) -> Result<i64, Diagnostic> {
        self.constants.evaluate(expr, self.kinds, &self.addresses)
    }

    /// Evaluates and folds a value that must fit the given width
    ///
    /// Both views are acceptable: `255` and `-1` are each a valid byte.
    fn eval_sized(&mut self, expr: &NumberExpression, size: Size) -> Result<u16, Diagnostic> {
        let value = self.eval(expr)?;
        let fits = match size {
            Size::Byte => Byte::<8>::fits(value),
            Size::Word => Byte::<16>::fits(value),
        };
        if !fits {
            return Err(Diagnostic::new(
                DiagnosticKind::ValueOutOfRange { value, size },
                expr.span,
            ));
        }
        Ok(match size {
            Size::Byte => Byte::<8>::wrapping(value).unsigned(),
            Size::Word => Byte::<16>::wrapping(value).unsigned(),
        })
    }

    /// Evaluates a value that must fit one unsigned byte (ports, INT numbers)
    fn eval_unsigned_byte(&mut self, expr: &NumberExpression) -> Result<u8, Diagnostic> {
        let value = self.eval(expr)?;
        if !Byte::<8>::fits_unsigned(value) {
            return Err(Diagnostic::new(
                DiagnosticKind::ValueOutOfRange {
                    value,
                    size: Size::Byte,
                },
                expr.span,
            ));
        }
        Ok(value as u8)
    }

    /// Evaluates a direct-operand address, checking the memory range
    fn eval_address(&mut self, expr: &NumberExpression) -> Result<MemoryAddress, Diagnostic> {
        let value = self.eval(expr)?;
        MemoryAddress::new(value).ok_or_else(|| {
            Diagnostic::new(DiagnosticKind::AddressOutOfRange(value), expr.span)
        })
    }

    /// Evaluates a store-target address, which may not point into code
    fn eval_store_address(
        &mut self,
        expr: &NumberExpression,
        size: Size,
    ) -> Result<MemoryAddress, Diagnostic> {
        let span = expr.span;
        let address = self.eval_address(expr)?;
        for delta in 0..i64::from(size.bytes()) {
            let touched = address.offset(delta);
            if touched.is_some_and(|a| self.code_addresses.contains(&a.value())) {
                return Err(Diagnostic::new(
                    DiagnosticKind::ReadOnlyAddress(address),
                    span,
                ));
            }
        }
        Ok(address)
    }

    fn resolve_instruction(
        &mut self,
        start: MemoryAddress,
        instruction: ValidatedInstruction,
    ) -> Result<ResolvedInstruction, Diagnostic> {
        let length = instruction.length;
        let span = instruction.span;
        let kind = match instruction.kind {
            ValidatedKind::Binary {
                op,
                size,
                dest,
                src,
            } => {
                // CMP only reads its destination, so it may point into code
                let writes_back = op != BinaryOp::Cmp;
                let dest = self.resolve_target(dest, size, writes_back)?;
                let src = self.resolve_source(src, size)?;
                InstructionKind::Binary {
                    op,
                    size,
                    dest,
                    src,
                }
            }
            ValidatedKind::Unary { op, size, target } => {
                let target = self.resolve_target(target, size, true)?;
                InstructionKind::Unary { op, size, target }
            }
            ValidatedKind::Push(r) => InstructionKind::Push(r),
            ValidatedKind::Pop(r) => InstructionKind::Pop(r),
            ValidatedKind::Pushf => InstructionKind::Pushf,
            ValidatedKind::Popf => InstructionKind::Popf,
            ValidatedKind::Jump {
                op,
                target,
                target_span,
            } => {
                let target = self.jump_target(start, length, &target, target_span, op)?;
                InstructionKind::Jump { op, target }
            }
            ValidatedKind::In { size, port } => InstructionKind::In {
                size,
                port: self.resolve_port(port)?,
            },
            ValidatedKind::Out { size, port } => InstructionKind::Out {
                size,
                port: self.resolve_port(port)?,
            },
            ValidatedKind::Int { number } => {
                InstructionKind::Int(self.eval_unsigned_byte(&number)?)
            }
            ValidatedKind::Ret => InstructionKind::Ret,
            ValidatedKind::Iret => InstructionKind::Iret,
            ValidatedKind::Cli => InstructionKind::Cli,
            ValidatedKind::Sti => InstructionKind::Sti,
            ValidatedKind::Nop => InstructionKind::Nop,
            ValidatedKind::Hlt => InstructionKind::Hlt,
        };
        Ok(ResolvedInstruction {
            address: start,
            length,
            span,
            kind,
        })
    }

    fn resolve_target(
        &mut self,
        target: VTarget,
        size: Size,
        writes_back: bool,
    ) -> Result<Target, Diagnostic> {
        Ok(match target {
            VTarget::Register(r) => Target::Register(r),
            VTarget::Direct(e) => Target::Direct(if writes_back {
                self.eval_store_address(&e, size)?
            } else {
                self.eval_address(&e)?
            }),
            VTarget::Indirect => Target::Indirect,
        })
    }

    fn resolve_source(&mut self, src: VSource, size: Size) -> Result<Source, Diagnostic> {
        Ok(match src {
            VSource::Register(r) => Source::Register(r),
            VSource::Direct(e) => Source::Direct(self.eval_address(&e)?),
            VSource::Indirect => Source::Indirect,
            VSource::Immediate(e) => Source::Immediate(self.eval_sized(&e, size)?),
        })
    }

    fn resolve_port(&mut self, port: VPort) -> Result<Port, Diagnostic> {
        Ok(match port {
            VPort::Fixed(e) => Port::Fixed(self.eval_unsigned_byte(&e)?),
            VPort::Dx => Port::Dx,
        })
    }

    /// Checks that the displacement fits the encoding's width
    fn jump_target(
        &mut self,
        start: MemoryAddress,
        length: u16,
        target: &str,
        target_span: Span,
        op: JumpOp,
    ) -> Result<MemoryAddress, Diagnostic> {
        // Validation guaranteed the label names an instruction
        let target = i64::from(self.addresses[target]);
        let displacement = target - (i64::from(start.value()) + i64::from(length));
        let fits = if op.is_conditional() {
            Byte::<8>::fits_signed(displacement)
        } else {
            Byte::<16>::fits_signed(displacement)
        };
        if !fits {
            return Err(Diagnostic::new(
                DiagnosticKind::JumpTooFar {
                    distance: displacement,
                },
                target_span,
            ));
        }
        Ok(MemoryAddress::new(target).unwrap())
    }
}
