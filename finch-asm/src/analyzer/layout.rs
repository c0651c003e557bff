//! Pass 3: address assignment
//!
//! A single location counter walks the validated statements in source order,
//! reset by each `ORG`. Every statement with a memory footprint claims the
//! half-open range `[pointer, pointer + length)`; overlapping claims and
//! claims past the end of memory are reported, and the cells claimed by
//! instructions become the program's read-only set.

use super::validate::{EquDef, Validated, ValidatedData, ValidatedInstruction};
use crate::{Diagnostic, DiagnosticKind, MemoryAddress, Span};
use std::collections::{HashMap, HashSet};

/// A statement pinned to its first memory cell
#[derive(Debug)]
pub(super) enum Placed {
    Data {
        start: MemoryAddress,
        data: ValidatedData,
    },
    Instruction {
        start: MemoryAddress,
        instruction: ValidatedInstruction,
    },
}

/// Output of the layout pass
#[derive(Debug)]
pub(super) struct Layout {
    /// Data and instructions in source order, each with a start address
    pub placed: Vec<Placed>,
    /// Label name to the address of its statement's first cell
    pub addresses: HashMap<String, u16>,
    /// `EQU` definitions, untouched by this pass (they occupy no memory)
    pub equs: Vec<EquDef>,
    /// Every cell claimed by an instruction
    pub code_addresses: HashSet<u16>,
}

pub(super) fn assign_addresses(validated: Vec<Validated>) -> Result<Layout, Vec<Diagnostic>> {
    let mut errors = Vec::new();
    let mut placed = Vec::new();
    let mut addresses = HashMap::new();
    let mut equs = Vec::new();
    let mut code_addresses = HashSet::new();

    let mut claimed: HashSet<u16> = HashSet::new();
    // No statement may claim memory before the first ORG
    let mut pointer: Option<i64> = None;

    for statement in validated {
        match statement {
            Validated::Org { address, span } => {
                if MemoryAddress::new(i64::from(address)).is_none() {
                    errors.push(Diagnostic::new(
                        DiagnosticKind::AddressOutOfRange(i64::from(address)),
                        span,
                    ));
                }
                pointer = Some(i64::from(address));
            }
            Validated::Equ(def) => equs.push(def),
            Validated::Data(data) => {
                let length = i64::from(data.length_bytes());
                let Some(start) = claim(
                    &mut pointer,
                    length,
                    data.span,
                    &mut claimed,
                    &mut errors,
                ) else {
                    continue;
                };
                if let Some(label) = &data.label {
                    addresses.insert(label.clone(), start.value());
                }
                placed.push(Placed::Data { start, data });
            }
            Validated::Instruction(instruction) => {
                let length = i64::from(instruction.length);
                let Some(start) = claim(
                    &mut pointer,
                    length,
                    instruction.span,
                    &mut claimed,
                    &mut errors,
                ) else {
                    continue;
                };
                for cell in start.value()..start.value() + instruction.length {
                    code_addresses.insert(cell);
                }
                if let Some(label) = &instruction.label {
                    addresses.insert(label.clone(), start.value());
                }
                placed.push(Placed::Instruction { start, instruction });
            }
        }
    }

    if errors.is_empty() {
        Ok(Layout {
            placed,
            addresses,
            equs,
            code_addresses,
        })
    } else {
        Err(errors)
    }
}

/// Claims `[pointer, pointer + length)` and advances the pointer
///
/// The pointer advances even when the claim fails, so that one bad statement
/// does not cascade into a spurious diagnostic for every statement after it.
fn claim(
    pointer: &mut Option<i64>,
    length: i64,
    span: Span,
    claimed: &mut HashSet<u16>,
    errors: &mut Vec<Diagnostic>,
) -> Option<MemoryAddress> {
    let Some(p) = *pointer else {
        errors.push(Diagnostic::new(DiagnosticKind::MissingOrg, span));
        return None;
    };
    *pointer = Some(p + length);

    let Some(start) = MemoryAddress::new(p) else {
        errors.push(Diagnostic::new(DiagnosticKind::AddressOutOfRange(p), span));
        return None;
    };
    if start.offset(length - 1).is_none() {
        errors.push(Diagnostic::new(
            DiagnosticKind::AddressOutOfRange(p + length - 1),
            span,
        ));
        return None;
    }

    for cell in start.value()..start.value() + length as u16 {
        if !claimed.insert(cell) {
            errors.push(Diagnostic::new(
                DiagnosticKind::OccupiedAddress(MemoryAddress::new(i64::from(cell)).unwrap()),
                span,
            ));
            return None;
        }
    }
    Some(start)
}
