//! Pass 4: `EQU` constant resolution
//!
//! Constants are resolved on demand, not in declaration order, so a constant
//! may reference another one declared later. A per-constant three-state
//! marker turns a self-referential chain into a circular-reference
//! diagnostic instead of unbounded recursion.
//!
//! This module also owns the expression evaluator used by pass 5, since both
//! passes reduce the same [`NumberExpression`] trees against the same label
//! tables.

use super::{validate::EquDef, LabelKind};
use crate::{
    syntax::{ExprKind, ExprOp, NumberExpression},
    Diagnostic, DiagnosticKind, Span,
};
use std::collections::HashMap;

enum State {
    NotProcessed,
    Processing,
    Processed(i64),
}

/// The `EQU` table, resolving itself on first use
pub(super) struct ConstantTable {
    defs: HashMap<String, (NumberExpression, Span)>,
    states: HashMap<String, State>,
}

impl ConstantTable {
    pub fn new(equs: Vec<EquDef>) -> Self {
        let mut defs = HashMap::new();
        let mut states = HashMap::new();
        for def in equs {
            states.insert(def.label.clone(), State::NotProcessed);
            defs.insert(def.label, (def.value, def.span));
        }
        Self { defs, states }
    }

    /// Resolves every constant, collecting one diagnostic per failed one
    pub fn resolve_all(
        &mut self,
        kinds: &HashMap<String, LabelKind>,
        addresses: &HashMap<String, u16>,
    ) -> Result<(), Vec<Diagnostic>> {
        let mut names: Vec<String> = self.defs.keys().cloned().collect();
        names.sort();

        let mut errors = Vec::new();
        for name in names {
            if let Err(e) = self.resolve(&name, kinds, addresses) {
                errors.push(e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn resolve(
        &mut self,
        name: &str,
        kinds: &HashMap<String, LabelKind>,
        addresses: &HashMap<String, u16>,
    ) -> Result<i64, Diagnostic> {
        match self.states.get(name) {
            Some(State::Processed(value)) => return Ok(*value),
            Some(State::NotProcessed) => (),
            // resolve() is only reachable through a Label node, whose caller
            // already turned Processing into a circular-reference error
            Some(State::Processing) | None => unreachable!(),
        }
        self.states.insert(name.to_owned(), State::Processing);

        let (expr, _) = self.defs[name].clone();
        match self.evaluate(&expr, kinds, addresses) {
            Ok(value) => {
                self.states.insert(name.to_owned(), State::Processed(value));
                Ok(value)
            }
            Err(e) => {
                // Back out of the marker so a failure here does not make
                // every constant that references this one look circular
                self.states.insert(name.to_owned(), State::NotProcessed);
                Err(e)
            }
        }
    }

    /// Reduces an expression to an integer
    ///
    /// Label references follow the kind table: a bare instruction label is
    /// its address, a bare constant is its value, and data labels only yield
    /// their address through `OFFSET`.
    pub fn evaluate(
        &mut self,
        expr: &NumberExpression,
        kinds: &HashMap<String, LabelKind>,
        addresses: &HashMap<String, u16>,
    ) -> Result<i64, Diagnostic> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(i64::from(*n)),
            ExprKind::Label { name, offset } => {
                self.label_value(name, *offset, expr.span, kinds, addresses)
            }
            ExprKind::Neg(inner) => self
                .evaluate(inner, kinds, addresses)?
                .checked_neg()
                .ok_or_else(|| Diagnostic::new(DiagnosticKind::NumberTooLarge, expr.span)),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate(lhs, kinds, addresses)?;
                let rhs = self.evaluate(rhs, kinds, addresses)?;
                // literals are capped at u32, but folded results are not
                match op {
                    ExprOp::Add => lhs.checked_add(rhs),
                    ExprOp::Sub => lhs.checked_sub(rhs),
                    ExprOp::Mul => lhs.checked_mul(rhs),
                }
                .ok_or_else(|| Diagnostic::new(DiagnosticKind::NumberTooLarge, expr.span))
            }
        }
    }

    fn label_value(
        &mut self,
        name: &str,
        offset: bool,
        span: Span,
        kinds: &HashMap<String, LabelKind>,
        addresses: &HashMap<String, u16>,
    ) -> Result<i64, Diagnostic> {
        let Some(kind) = kinds.get(name) else {
            return Err(Diagnostic::new(
                DiagnosticKind::UndefinedLabel(name.to_owned()),
                span,
            ));
        };
        if offset {
            return match kind {
                LabelKind::Db | LabelKind::Dw => Ok(i64::from(addresses[name])),
                LabelKind::Equ | LabelKind::Instruction => Err(Diagnostic::new(
                    DiagnosticKind::OffsetOnlyForDataLabels(name.to_owned()),
                    span,
                )),
            };
        }
        match kind {
            LabelKind::Db | LabelKind::Dw => Err(Diagnostic::new(
                DiagnosticKind::DataLabelNeedsOffset(name.to_owned()),
                span,
            )),
            LabelKind::Instruction => Ok(i64::from(addresses[name])),
            LabelKind::Equ => {
                if matches!(self.states.get(name), Some(State::Processing)) {
                    return Err(Diagnostic::new(
                        DiagnosticKind::CircularReference(name.to_owned()),
                        span,
                    ));
                }
                self.resolve(name, kinds, addresses)
            }
        }
    }

    /// Hands out the resolved table for attachment to the program
    pub fn into_values(self) -> HashMap<String, i64> {
        self.states
            .into_iter()
            .filter_map(|(name, state)| match state {
                State::Processed(value) => Some((name, value)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analyzer::{classify_labels, layout::assign_addresses, validate::validate};
    use crate::{lexer::tokenize, parser::parse};

    fn resolve(source: &str) -> Result<HashMap<String, i64>, Vec<DiagnosticKind>> {
        let statements = parse(&tokenize(source).unwrap()).unwrap();
        let kinds = classify_labels(&statements);
        let mut layout = assign_addresses(validate(statements, &kinds).unwrap()).unwrap();
        let mut table = ConstantTable::new(std::mem::take(&mut layout.equs));
        table
            .resolve_all(&kinds, &layout.addresses)
            .map_err(|errors| errors.into_iter().map(|d| d.kind).collect::<Vec<_>>())?;
        Ok(table.into_values())
    }

    #[test]
    fn declaration_order_does_not_matter() {
        let values = resolve("a equ b + 1\nb equ c * 2\nc equ 10\nend").unwrap();
        assert_eq!(values["C"], 10);
        assert_eq!(values["B"], 20);
        assert_eq!(values["A"], 21);
    }

    #[test]
    fn circular_reference_is_detected() {
        let errors = resolve("a equ b\nb equ c\nc equ a\nend").unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, DiagnosticKind::CircularReference(_))));

        let errors = resolve("x equ x + 1\nend").unwrap_err();
        assert_eq!(errors[0], DiagnosticKind::CircularReference("X".to_owned()));
    }

    #[test]
    fn instruction_labels_are_addresses() {
        let values = resolve("org 2000h\nstart: hlt\nhere equ start\nend").unwrap();
        assert_eq!(values["HERE"], 0x2000);
    }

    #[test]
    fn data_labels_need_offset() {
        let errors = resolve("org 1000h\nx db 1\nn equ x\nend").unwrap_err();
        assert_eq!(
            errors[0],
            DiagnosticKind::DataLabelNeedsOffset("X".to_owned())
        );
        let values = resolve("org 1000h\nx db 1\nn equ offset x + 2\nend").unwrap();
        assert_eq!(values["N"], 0x1002);
    }

    #[test]
    fn offset_rejected_on_non_data() {
        let errors = resolve("a equ 1\nb equ offset a\nend").unwrap_err();
        assert_eq!(
            errors[0],
            DiagnosticKind::OffsetOnlyForDataLabels("A".to_owned())
        );
    }

    #[test]
    fn folded_overflow_is_a_diagnostic() {
        let errors =
            resolve("x equ 4000000000 * 4000000000 * 4000000000\nend").unwrap_err();
        assert_eq!(errors[0], DiagnosticKind::NumberTooLarge);

        // 3000000000^2 still fits; doubling its negation does not
        let errors = resolve("a equ 0 - 3000000000 * 3000000000\nb equ a + a\nend").unwrap_err();
        assert_eq!(errors[0], DiagnosticKind::NumberTooLarge);
    }

    #[test]
    fn arithmetic() {
        let values = resolve("x equ 2 + 3 * 4 - (1 + 1)\ny equ -x\nend").unwrap();
        assert_eq!(values["X"], 12);
        assert_eq!(values["Y"], -12);
    }
}
