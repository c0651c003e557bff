//! End-to-end assembly suites: source text in, `Program` or diagnostics out

use finch_asm::{
    assemble,
    encoding::encode,
    program::{BinaryOp, InstructionKind, Source, Target, UnaryOp},
    DiagnosticKind, Program, Register, Size,
};

fn ok(source: &str) -> Program {
    match assemble(source) {
        Ok(program) => program,
        Err(errors) => panic!("expected {source:?} to assemble, got {errors:?}"),
    }
}

fn err(source: &str) -> Vec<DiagnosticKind> {
    assemble(source)
        .expect_err("expected assembly to fail")
        .into_iter()
        .map(|d| d.kind)
        .collect()
}

#[test]
fn layout_example() {
    // x lands at 1000h, the mov at 2000h with the 4-byte direct-byte form
    let program = ok("org 1000h\nx: db 1\norg 2000h\nmov al, x\nhlt\nend");

    assert_eq!(program.data.len(), 1);
    assert_eq!(program.data[0].start.value(), 0x1000);
    assert_eq!(program.data[0].values, vec![Some(1)]);

    let mov = &program.instructions[0];
    assert_eq!(mov.address.value(), 0x2000);
    assert_eq!(mov.length, 4);
    assert_eq!(
        mov.kind,
        InstructionKind::Binary {
            op: BinaryOp::Mov,
            size: Size::Byte,
            dest: Target::Register(Register::Al),
            src: Source::Direct(finch_asm::MemoryAddress::new(0x1000).unwrap()),
        }
    );
}

#[test]
fn occupied_address_on_reclaim() {
    let errors = err("org 1000h\nx: db 1\norg 1000h\ny db 2\norg 2000h\nhlt\nend");
    assert!(matches!(errors[0], DiagnosticKind::OccupiedAddress(a) if a.value() == 0x1000));
}

#[test]
fn equ_forward_references_resolve() {
    let program = ok("n equ m + 1\nm equ 4\norg 2000h\nmov al, n\nhlt\nend");
    assert_eq!(program.constants["N"], 5);
    assert_eq!(program.constants["M"], 4);
    assert_eq!(
        program.instructions[0].kind,
        InstructionKind::Binary {
            op: BinaryOp::Mov,
            size: Size::Byte,
            dest: Target::Register(Register::Al),
            src: Source::Immediate(5),
        }
    );
}

#[test]
fn circular_constants_fail_cleanly() {
    let errors = err("a equ b\nb equ a\norg 2000h\nhlt\nend");
    assert!(errors
        .iter()
        .all(|e| matches!(e, DiagnosticKind::CircularReference(_))));
    assert_eq!(errors.len(), 2);
}

#[test]
fn unary_memory_needs_size() {
    let errors = err("org 2000h\ninc [1000h]\nhlt\nend");
    assert_eq!(errors[0], DiagnosticKind::UnknownSize);

    let program = ok("org 2000h\ninc byte ptr [1000h]\nhlt\nend");
    let inc = &program.instructions[0];
    assert_eq!(inc.length, 4);
    assert!(matches!(
        inc.kind,
        InstructionKind::Unary {
            op: UnaryOp::Inc,
            size: Size::Byte,
            target: Target::Direct(_),
        }
    ));
}

#[test]
fn code_cells_are_protected_from_stores() {
    // hlt sits at 2005h; writing over it must fail at assembly
    let errors = err("org 2000h\nmov ax, 1\nhlt\norg 3000h\nmov byte ptr [2005h], 0\nhlt\nend");
    assert!(matches!(errors[0], DiagnosticKind::ReadOnlyAddress(a) if a.value() == 0x2005));

    // reading code is allowed
    ok("org 2000h\nhlt\norg 3000h\nmov al, [2000h]\nhlt\nend");

    // CMP only reads its destination
    ok("org 2000h\nhlt\norg 3000h\ncmp byte ptr [2000h], 0\nhlt\nend");
}

#[test]
fn jump_displacements() {
    // conditional jump fits in a byte here
    let program = ok("org 2000h\nloop: dec cx\njnz loop\nhlt\nend");
    let jnz = &program.instructions[1];
    assert_eq!(jnz.length, 2);
    assert_eq!(encode(jnz), vec![0b0010_0011, 0xFC]); // -4

    // a conditional jump across the address space does not
    let errors = err("org 1000h\nfar: hlt\norg 7000h\njnz far\nend");
    assert!(matches!(errors[0], DiagnosticKind::JumpTooFar { .. }));

    // but JMP reaches it with its word displacement
    ok("org 1000h\nfar: hlt\norg 7000h\njmp far\nend");
}

#[test]
fn strings_expand_to_bytes() {
    let program = ok("org 1000h\nmsg db \"Hi\", 0\norg 2000h\nhlt\nend");
    assert_eq!(
        program.data[0].values,
        vec![Some(u16::from(b'H')), Some(u16::from(b'i')), Some(0)]
    );
}

#[test]
fn data_ranges_accept_both_views() {
    ok("org 1000h\nx db 255\ny db -128\nend");
    let errors = err("org 1000h\nx db 256\nend");
    assert!(matches!(
        errors[0],
        DiagnosticKind::ValueOutOfRange { value: 256, .. }
    ));
    let errors = err("org 1000h\nx db -129\nend");
    assert!(matches!(
        errors[0],
        DiagnosticKind::ValueOutOfRange { value: -129, .. }
    ));
    ok("org 1000h\nw dw 65535\nv dw -32768\nend");
}

#[test]
fn int_number_must_be_unsigned_byte() {
    ok("org 2000h\nint 255\nhlt\nend");
    let errors = err("org 2000h\nint 256\nhlt\nend");
    assert!(matches!(
        errors[0],
        DiagnosticKind::ValueOutOfRange { value: 256, .. }
    ));
    let errors = err("org 2000h\nint -1\nhlt\nend");
    assert!(matches!(errors[0], DiagnosticKind::ValueOutOfRange { .. }));
}

#[test]
fn semantic_errors_come_in_batches() {
    // two independent bad statements, two diagnostics
    let errors = err("org 2000h\nmov al, bx\npush cl\nhlt\nend");
    assert_eq!(errors.len(), 2);
}

#[test]
fn encoded_image_matches_layout() {
    let program = ok("org 2000h\nmov cx, 5\nloop: dec cx\njnz loop\nhlt\nend");
    let mut address = 0x2000;
    for instruction in &program.instructions {
        assert_eq!(instruction.address.value(), address);
        let bytes = encode(instruction);
        assert_eq!(bytes.len(), usize::from(instruction.length));
        address += instruction.length;
    }
    // every encoded cell is marked read-only
    for cell in 0x2000..address {
        assert!(program.code_addresses.contains(&cell));
    }
}

#[test]
fn instruction_at_finds_by_start() {
    let program = ok("org 2000h\nmov cx, 5\nhlt\nend");
    assert!(program.instruction_at(0x2000).is_some());
    assert!(program.instruction_at(0x2001).is_none());
    assert!(program.instruction_at(0x2004).is_some());
}
