//! Bit-exact binary encoding of resolved instructions
//!
//! The engine never decodes these bytes; they are written into memory so
//! students can inspect the program image, and the first byte feeds the `IR`
//! trace register.

use crate::{
    program::{BinaryOp, InstructionKind, JumpOp, Port, ResolvedInstruction, Source, Target, UnaryOp},
    token::Register,
    MemoryAddress, Size,
};

/// Encodes one instruction into its binary form, little-endian operands
///
/// The returned length always matches the length fixed during analysis.
pub fn encode(instruction: &ResolvedInstruction) -> Vec<u8> {
    let mut out = Vec::with_capacity(instruction.length as usize);
    match &instruction.kind {
        InstructionKind::Binary { op, size, dest, src } => {
            out.push(binary_opcode(*op) | width_bit(*size));
            match (dest, src) {
                (Target::Register(d), Source::Register(s)) => {
                    out.push(code(*d) << 3 | code(*s));
                }
                (Target::Register(d), Source::Direct(a)) => {
                    out.push(0b0100_0000 | code(*d));
                    push_address(&mut out, *a);
                }
                (Target::Register(d), Source::Immediate(v)) => {
                    out.push(0b0100_1000 | code(*d));
                    push_immediate(&mut out, *v, *size);
                }
                (Target::Register(d), Source::Indirect) => {
                    out.push(0b0101_0000 | code(*d));
                }
                (Target::Direct(a), Source::Register(s)) => {
                    out.push(0b1100_0000 | code(*s));
                    push_address(&mut out, *a);
                }
                (Target::Direct(a), Source::Immediate(v)) => {
                    out.push(0b1100_1000);
                    push_address(&mut out, *a);
                    push_immediate(&mut out, *v, *size);
                }
                (Target::Indirect, Source::Register(s)) => {
                    out.push(0b1101_0000 | code(*s));
                }
                (Target::Indirect, Source::Immediate(v)) => {
                    out.push(0b1101_1000);
                    push_immediate(&mut out, *v, *size);
                }
                // memory-to-memory shapes never survive validation
                _ => unreachable!(),
            }
        }
        InstructionKind::Unary { op, size, target } => {
            out.push(unary_opcode(*op) | width_bit(*size));
            match target {
                Target::Register(r) => out.push(code(*r)),
                Target::Direct(a) => {
                    out.push(0b1100_0000);
                    push_address(&mut out, *a);
                }
                Target::Indirect => out.push(0b1101_0000),
            }
        }
        InstructionKind::Push(r) => out.push(0b0110_0000 | code(*r)),
        InstructionKind::Pop(r) => out.push(0b0110_1000 | code(*r)),
        InstructionKind::Pushf => out.push(0b0111_0000),
        InstructionKind::Popf => out.push(0b0111_1000),
        InstructionKind::Jump { op, target } => {
            let displacement =
                i64::from(target.value()) - i64::from(instruction.address.value() + instruction.length);
            match op {
                JumpOp::Jmp => {
                    out.push(0b0011_0000);
                    out.extend((displacement as i16).to_le_bytes());
                }
                JumpOp::Call => {
                    out.push(0b0011_0001);
                    out.extend((displacement as i16).to_le_bytes());
                }
                _ => {
                    out.push(0b0010_0000 | condition_code(*op));
                    out.push(displacement as i8 as u8);
                }
            }
        }
        InstructionKind::In { size, port } => {
            out.push(0b0101_0000 | port_bit(*port) | width_bit(*size));
            if let Port::Fixed(p) = port {
                out.push(*p);
            }
        }
        InstructionKind::Out { size, port } => {
            out.push(0b0101_0100 | port_bit(*port) | width_bit(*size));
            if let Port::Fixed(p) = port {
                out.push(*p);
            }
        }
        InstructionKind::Int(n) => {
            out.push(0b0001_1010);
            out.push(*n);
        }
        InstructionKind::Ret => out.push(0b0011_0011),
        InstructionKind::Iret => out.push(0b0011_1011),
        InstructionKind::Cli => out.push(0b0001_1000),
        InstructionKind::Sti => out.push(0b0001_1001),
        InstructionKind::Nop => out.push(0b0001_0000),
        InstructionKind::Hlt => out.push(0b0001_0001),
    }
    debug_assert_eq!(out.len(), instruction.length as usize);
    out
}

fn binary_opcode(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Mov => 0b1000_0000,
        BinaryOp::Add => 0b1000_0010,
        BinaryOp::Adc => 0b1000_0100,
        BinaryOp::Sub => 0b1000_0110,
        BinaryOp::Sbb => 0b1000_1000,
        BinaryOp::Cmp => 0b1000_1010,
        BinaryOp::And => 0b1000_1100,
        BinaryOp::Or => 0b1000_1110,
        BinaryOp::Xor => 0b1001_0000,
    }
}

fn unary_opcode(op: UnaryOp) -> u8 {
    match op {
        UnaryOp::Not => 0b0100_0000,
        UnaryOp::Neg => 0b0100_0010,
        UnaryOp::Inc => 0b0100_0100,
        UnaryOp::Dec => 0b0100_0110,
    }
}

fn condition_code(op: JumpOp) -> u8 {
    match op {
        JumpOp::Jc => 0b000,
        JumpOp::Jnc => 0b001,
        JumpOp::Jz => 0b010,
        JumpOp::Jnz => 0b011,
        JumpOp::Js => 0b100,
        JumpOp::Jns => 0b101,
        JumpOp::Jo => 0b110,
        JumpOp::Jno => 0b111,
        JumpOp::Jmp | JumpOp::Call => unreachable!(),
    }
}

fn width_bit(size: Size) -> u8 {
    match size {
        Size::Byte => 0,
        Size::Word => 1,
    }
}

fn port_bit(port: Port) -> u8 {
    match port {
        Port::Fixed(_) => 0,
        Port::Dx => 0b10,
    }
}

fn code(r: Register) -> u8 {
    match r.code() {
        Some(c) => c,
        // internal registers never survive operand validation
        None => unreachable!(),
    }
}

fn push_address(out: &mut Vec<u8>, address: MemoryAddress) {
    out.extend(address.value().to_le_bytes());
}

fn push_immediate(out: &mut Vec<u8>, value: u16, size: Size) {
    match size {
        Size::Byte => out.push(value as u8),
        Size::Word => out.extend(value.to_le_bytes()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Span;

    fn instr(address: u16, length: u16, kind: InstructionKind) -> ResolvedInstruction {
        ResolvedInstruction {
            address: MemoryAddress::new(i64::from(address)).unwrap(),
            length,
            span: Span::default(),
            kind,
        }
    }

    #[test]
    fn mov_register_from_direct() {
        // mov al, [1000h]
        let i = instr(
            0x2000,
            4,
            InstructionKind::Binary {
                op: BinaryOp::Mov,
                size: Size::Byte,
                dest: Target::Register(Register::Al),
                src: Source::Direct(MemoryAddress::new(0x1000).unwrap()),
            },
        );
        assert_eq!(encode(&i), vec![0b1000_0000, 0b0100_0000, 0x00, 0x10]);
    }

    #[test]
    fn mov_register_from_register() {
        // mov dx, bx
        let i = instr(
            0x2000,
            2,
            InstructionKind::Binary {
                op: BinaryOp::Mov,
                size: Size::Word,
                dest: Target::Register(Register::Dx),
                src: Source::Register(Register::Bx),
            },
        );
        assert_eq!(encode(&i), vec![0b1000_0001, 0b00_010_011]);
    }

    #[test]
    fn add_word_immediate_to_memory() {
        // add word ptr [0A00h], 260
        let i = instr(
            0x2000,
            6,
            InstructionKind::Binary {
                op: BinaryOp::Add,
                size: Size::Word,
                dest: Target::Direct(MemoryAddress::new(0x0A00).unwrap()),
                src: Source::Immediate(260),
            },
        );
        assert_eq!(
            encode(&i),
            vec![0b1000_0011, 0b1100_1000, 0x00, 0x0A, 0x04, 0x01]
        );
    }

    #[test]
    fn unary_shapes() {
        // inc cx
        let i = instr(
            0x2000,
            2,
            InstructionKind::Unary {
                op: UnaryOp::Inc,
                size: Size::Word,
                target: Target::Register(Register::Cx),
            },
        );
        assert_eq!(encode(&i), vec![0b0100_0101, 0b0000_0001]);

        // neg byte ptr [20h]
        let i = instr(
            0x2000,
            4,
            InstructionKind::Unary {
                op: UnaryOp::Neg,
                size: Size::Byte,
                target: Target::Direct(MemoryAddress::new(0x20).unwrap()),
            },
        );
        assert_eq!(encode(&i), vec![0b0100_0010, 0b1100_0000, 0x20, 0x00]);
    }

    #[test]
    fn jumps_are_relative_to_instruction_end() {
        // jnz back to 0x2003 from a 2-byte instruction at 0x2006
        let i = instr(
            0x2006,
            2,
            InstructionKind::Jump {
                op: JumpOp::Jnz,
                target: MemoryAddress::new(0x2003).unwrap(),
            },
        );
        assert_eq!(encode(&i), vec![0b0010_0011, 0xFB]); // -5

        // jmp forward by 0x10 from a 3-byte instruction at 0x2000
        let i = instr(
            0x2000,
            3,
            InstructionKind::Jump {
                op: JumpOp::Jmp,
                target: MemoryAddress::new(0x2013).unwrap(),
            },
        );
        assert_eq!(encode(&i), vec![0b0011_0000, 0x10, 0x00]);
    }

    #[test]
    fn io_and_interrupts() {
        // out 30h, al
        let i = instr(
            0x2000,
            2,
            InstructionKind::Out {
                size: Size::Byte,
                port: Port::Fixed(0x30),
            },
        );
        assert_eq!(encode(&i), vec![0b0101_0100, 0x30]);

        // in ax, dx
        let i = instr(
            0x2000,
            1,
            InstructionKind::In {
                size: Size::Word,
                port: Port::Dx,
            },
        );
        assert_eq!(encode(&i), vec![0b0101_0011]);

        // int 7
        let i = instr(0x2000, 2, InstructionKind::Int(7));
        assert_eq!(encode(&i), vec![0b0001_1010, 7]);
    }

    #[test]
    fn stack_and_zeroary() {
        let i = instr(0x2000, 1, InstructionKind::Push(Register::Ax));
        assert_eq!(encode(&i), vec![0b0110_0000]);
        let i = instr(0x2000, 1, InstructionKind::Pop(Register::Bx));
        assert_eq!(encode(&i), vec![0b0110_1011]);
        let i = instr(0x2000, 1, InstructionKind::Pushf);
        assert_eq!(encode(&i), vec![0b0111_0000]);
        let i = instr(0x2000, 1, InstructionKind::Hlt);
        assert_eq!(encode(&i), vec![0b0001_0001]);
        let i = instr(0x2000, 1, InstructionKind::Iret);
        assert_eq!(encode(&i), vec![0b0011_1011]);
    }
}
