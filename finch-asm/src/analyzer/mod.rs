//! Semantic analysis: five ordered passes from statements to a [`Program`]
//!
//! 1. classify every label (`DB`/`DW`/`EQU`/instruction),
//! 2. validate operands per instruction class and fix each statement's
//!    byte length from its addressing mode,
//! 3. walk a location counter to assign addresses and detect collisions,
//! 4. resolve `EQU` constants demand-first with cycle detection,
//! 5. evaluate every remaining expression and build the program.
//!
//! Each pass collects diagnostics across independent statements; a pass with
//! errors stops the pipeline, since later passes depend on its output.

mod constants;
mod eval;
mod layout;
mod validate;

use crate::{
    syntax::{DataDirective, Statement},
    Diagnostic, Program, Size,
};
use log::debug;
use std::collections::HashMap;

/// What a label names, decided before any operand is looked at
///
/// Operand validation needs this early: a bare label used as a `MOV` source
/// is a memory reference if it names data, but an immediate if it names a
/// constant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum LabelKind {
    /// Byte data cells
    Db,
    /// Word data cells
    Dw,
    /// Compile-time constant
    Equ,
    /// Instruction address
    Instruction,
}

impl LabelKind {
    /// Cell width for data labels
    fn data_size(self) -> Option<Size> {
        match self {
            LabelKind::Db => Some(Size::Byte),
            LabelKind::Dw => Some(Size::Word),
            _ => None,
        }
    }
}

/// Runs all five passes
pub fn analyze(statements: Vec<Statement>) -> Result<Program, Vec<Diagnostic>> {
    let kinds = classify_labels(&statements);
    debug!("classified {} labels", kinds.len());

    let validated = validate::validate(statements, &kinds)?;
    let mut layout = layout::assign_addresses(validated)?;
    debug!(
        "placed {} statements, {} cells of code",
        layout.placed.len(),
        layout.code_addresses.len()
    );

    let mut constants = constants::ConstantTable::new(std::mem::take(&mut layout.equs));
    constants.resolve_all(&kinds, &layout.addresses)?;

    eval::finalize(layout, constants, &kinds)
}

/// Pass 1: one linear scan assigning every label its kind
fn classify_labels(statements: &[Statement]) -> HashMap<String, LabelKind> {
    let mut kinds = HashMap::new();
    for statement in statements {
        let (label, kind) = match statement {
            Statement::Data {
                directive,
                label: Some(label),
                ..
            } => {
                let kind = match directive {
                    DataDirective::Db => LabelKind::Db,
                    DataDirective::Dw => LabelKind::Dw,
                    DataDirective::Equ => LabelKind::Equ,
                };
                (label, kind)
            }
            Statement::Instruction {
                label: Some(label), ..
            } => (label, LabelKind::Instruction),
            _ => continue,
        };
        kinds.insert(label.clone(), kind);
    }
    kinds
}
