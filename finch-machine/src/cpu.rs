//! Instruction execution

use crate::alu::{decode_flags, encode_flags, Alu, AluOp, Flags};
use crate::error::SimError;
use crate::io::IoBus;
use crate::memory::{Memory, MemoryFill, Xorshift};
use crate::registers::{Registers, STACK_TOP};
use crate::Event;
use finch_asm::program::{
    BinaryOp, InstructionKind, JumpOp, Port, Program, Source, Target, UnaryOp,
};
use finch_asm::{IoAddress, Register, Size};
use std::collections::VecDeque;

/// Vector numbers claimed by the software interrupts; a PIC programmed to
/// deliver one of these is misconfigured
const RESERVED_VECTORS: [u8; 4] = [0, 3, 6, 7];

/// Bytes of vector table per interrupt number
const VECTOR_STRIDE: u16 = 2;

/// What one `step` call did
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// An instruction ran; more follow
    Continue,
    /// `HLT` or `INT 0`
    Halt,
    /// `INT 3`; the caller may pause and resume stepping
    DebugBreak,
    /// `INT 6`; execution resumes when a byte of input arrives
    WaitingForInput,
}

pub(crate) struct Cpu {
    registers: Registers,
    alu: Alu,
    interrupts_enabled: bool,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            registers: Registers::new(),
            alu: Alu::new(),
            interrupts_enabled: false,
        }
    }

    pub fn reset(&mut self, fill: MemoryFill, rng: &mut Xorshift) {
        self.registers.reset(fill, rng);
        self.alu.reset(fill, rng);
        self.interrupts_enabled = false;
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn flags(&self) -> Flags {
        self.alu.flags()
    }

    pub fn alu_operands(&self) -> (u16, u16) {
        self.alu.operands()
    }

    pub fn alu_result(&self) -> u16 {
        self.alu.result()
    }

    pub fn alu_operation(&self) -> Option<AluOp> {
        self.alu.operation()
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Runs one CPU cycle: either services a pending hardware interrupt or
    /// executes the instruction at `IP`
    pub fn step(
        &mut self,
        program: &Program,
        memory: &mut Memory,
        io: &mut IoBus,
        console: &mut String,
        events: &mut VecDeque<Event>,
    ) -> Result<Step, SimError> {
        // EOI commands take effect at the instruction boundary even while
        // interrupts are disabled
        io.pic.update_eoi();
        if self.interrupts_enabled {
            if let Some((line, vector)) = io.pic.pending() {
                if RESERVED_VECTORS.contains(&vector) {
                    return Err(SimError::ReservedInterrupt(vector));
                }
                io.pic.acknowledge(line);
                let ip = self.registers.get(Register::Ip);
                self.enter_interrupt(vector, ip, memory)?;
                return Ok(Step::Continue);
            }
        }

        let ip = self.registers.get(Register::Ip);
        let instruction = program
            .instruction_at(ip)
            .ok_or(SimError::NoInstruction(ip))?;
        events.push_back(Event::Executing(instruction.span));

        // trace state: the opcode byte passes through MBR into IR
        let opcode = memory.read(i64::from(ip), Size::Byte)?;
        self.registers.trace_transfer(ip, opcode as u8);
        self.registers.set(Register::Ir, opcode);

        let mut jump = None;
        let mut outcome = Step::Continue;

        match &instruction.kind {
            InstructionKind::Binary {
                op,
                size,
                dest,
                src,
            } => {
                let right = self.read_source(*src, *size, memory)?;
                match binary_alu_op(*op) {
                    None => self.write_target(*dest, *size, right, memory)?,
                    Some(alu_op) => {
                        let left = self.read_target(*dest, *size, memory)?;
                        let result = self.alu.execute(alu_op, left, right, *size);
                        if *op != BinaryOp::Cmp {
                            self.write_target(*dest, *size, result, memory)?;
                        }
                    }
                }
            }
            InstructionKind::Unary { op, size, target } => {
                let value = self.read_target(*target, *size, memory)?;
                let result = match op {
                    UnaryOp::Not => self.alu.execute(AluOp::Not, 0, value, *size),
                    UnaryOp::Neg => self.alu.execute(AluOp::Sub, 0, value, *size),
                    UnaryOp::Inc => self.alu.execute(AluOp::Add, value, 1, *size),
                    UnaryOp::Dec => self.alu.execute(AluOp::Sub, value, 1, *size),
                };
                self.write_target(*target, *size, result, memory)?;
            }
            InstructionKind::Push(register) => {
                let value = self.registers.get(*register);
                self.push(value, memory)?;
            }
            InstructionKind::Pop(register) => {
                let value = self.pop(memory)?;
                self.registers.set(*register, value);
            }
            InstructionKind::Pushf => {
                let word = encode_flags(self.alu.flags(), self.interrupts_enabled);
                self.push(word, memory)?;
            }
            InstructionKind::Popf => {
                let word = self.pop(memory)?;
                let (flags, enabled) = decode_flags(word);
                self.alu.set_flags(flags);
                self.interrupts_enabled = enabled;
            }
            InstructionKind::Jump { op, target } => {
                let flags = self.alu.flags();
                let taken = match op {
                    JumpOp::Jmp | JumpOp::Call => true,
                    JumpOp::Jc => flags.carry,
                    JumpOp::Jnc => !flags.carry,
                    JumpOp::Jz => flags.zero,
                    JumpOp::Jnz => !flags.zero,
                    JumpOp::Js => flags.sign,
                    JumpOp::Jns => !flags.sign,
                    JumpOp::Jo => flags.overflow,
                    JumpOp::Jno => !flags.overflow,
                };
                if taken {
                    if *op == JumpOp::Call {
                        let next = self.fall_through(instruction)?;
                        self.push(next, memory)?;
                    }
                    jump = Some(target.value());
                }
            }
            InstructionKind::In { size, port } => {
                let port = self.port_number(*port)?;
                let low = io.read(port.value())?;
                let value = match size {
                    Size::Byte => u16::from(low),
                    Size::Word => {
                        let high = self.port_above(port)?;
                        u16::from(low) | u16::from(io.read(high.value())?) << 8
                    }
                };
                let register = match size {
                    Size::Byte => Register::Al,
                    Size::Word => Register::Ax,
                };
                self.registers.set(register, value);
            }
            InstructionKind::Out { size, port } => {
                let port = self.port_number(*port)?;
                let value = match size {
                    Size::Byte => self.registers.get(Register::Al),
                    Size::Word => self.registers.get(Register::Ax),
                };
                io.write(port.value(), value as u8, events)?;
                if *size == Size::Word {
                    let high = self.port_above(port)?;
                    io.write(high.value(), (value >> 8) as u8, events)?;
                }
            }
            InstructionKind::Int(number) => match number {
                0 => outcome = Step::Halt,
                3 => outcome = Step::DebugBreak,
                6 => outcome = Step::WaitingForInput,
                7 => {
                    let start = self.registers.get(Register::Bx);
                    let length = self.registers.get(Register::Al);
                    let mut text = String::new();
                    for offset in 0..length {
                        let address = i64::from(start) + i64::from(offset);
                        let char = memory.read(address, Size::Byte)? as u8;
                        self.registers.trace_transfer(address as u16, char);
                        text.push(char as char);
                    }
                    console.push_str(&text);
                    events.push_back(Event::Console(text));
                }
                _ => {
                    let next = self.fall_through(instruction)?;
                    self.enter_interrupt(*number, next, memory)?;
                    jump = Some(self.registers.get(Register::Ip));
                }
            },
            InstructionKind::Ret => jump = Some(self.pop(memory)?),
            InstructionKind::Iret => {
                jump = Some(self.pop(memory)?);
                let (flags, enabled) = decode_flags(self.pop(memory)?);
                self.alu.set_flags(flags);
                self.interrupts_enabled = enabled;
            }
            InstructionKind::Cli => self.interrupts_enabled = false,
            InstructionKind::Sti => self.interrupts_enabled = true,
            InstructionKind::Nop => (),
            InstructionKind::Hlt => outcome = Step::Halt,
        }

        if outcome != Step::Halt {
            let next = match jump {
                Some(address) => address,
                None => self.fall_through(instruction)?,
            };
            self.registers.set(Register::Ip, next);
        }
        Ok(outcome)
    }

    /// Delivers the byte an `INT 6` was waiting for: it lands at `[BX]`
    pub fn accept_input(&mut self, byte: u8, memory: &mut Memory) -> Result<(), SimError> {
        let address = self.registers.get(Register::Bx);
        memory.write(i64::from(address), Size::Byte, u16::from(byte))?;
        self.registers.trace_transfer(address, byte);
        Ok(())
    }

    /// Interrupt entry: push FLAGS, disable interrupts, push the return
    /// address, jump through the vector table
    fn enter_interrupt(
        &mut self,
        vector: u8,
        return_ip: u16,
        memory: &mut Memory,
    ) -> Result<(), SimError> {
        let table = i64::from(vector) * i64::from(VECTOR_STRIDE);
        let handler = memory.read(table, Size::Word)?;
        let flags = encode_flags(self.alu.flags(), self.interrupts_enabled);
        self.push(flags, memory)?;
        self.interrupts_enabled = false;
        self.push(return_ip, memory)?;
        self.registers.set(Register::Ip, handler);
        Ok(())
    }

    fn fall_through(
        &self,
        instruction: &finch_asm::program::ResolvedInstruction,
    ) -> Result<u16, SimError> {
        instruction
            .next_address()
            .map(|a| a.value())
            .ok_or_else(|| {
                SimError::AddressOutOfRange(
                    i64::from(instruction.address.value()) + i64::from(instruction.length),
                )
            })
    }

    fn push(&mut self, value: u16, memory: &mut Memory) -> Result<(), SimError> {
        let sp = self.registers.get(Register::Sp);
        let Some(new_sp) = sp.checked_sub(2) else {
            return Err(SimError::StackOverflow);
        };
        memory.write(i64::from(new_sp), Size::Word, value)?;
        self.registers.trace_transfer(new_sp, value as u8);
        self.registers.set(Register::Sp, new_sp);
        Ok(())
    }

    fn pop(&mut self, memory: &mut Memory) -> Result<u16, SimError> {
        let sp = self.registers.get(Register::Sp);
        // SP is writable, so it may sit anywhere in the u16 range
        let Some(new_sp) = sp.checked_add(2).filter(|end| *end <= STACK_TOP) else {
            return Err(SimError::StackUnderflow);
        };
        let value = memory.read(i64::from(sp), Size::Word)?;
        self.registers.trace_transfer(sp, value as u8);
        self.registers.set(Register::Sp, new_sp);
        Ok(value)
    }

    fn read_source(
        &mut self,
        source: Source,
        size: Size,
        memory: &Memory,
    ) -> Result<u16, SimError> {
        match source {
            Source::Register(register) => Ok(self.registers.get(register)),
            Source::Immediate(value) => Ok(value),
            Source::Direct(address) => self.load(i64::from(address.value()), size, memory),
            Source::Indirect => {
                let address = self.registers.get(Register::Bx);
                self.load(i64::from(address), size, memory)
            }
        }
    }

    fn read_target(
        &mut self,
        target: Target,
        size: Size,
        memory: &Memory,
    ) -> Result<u16, SimError> {
        match target {
            Target::Register(register) => Ok(self.registers.get(register)),
            Target::Direct(address) => self.load(i64::from(address.value()), size, memory),
            Target::Indirect => {
                let address = self.registers.get(Register::Bx);
                self.load(i64::from(address), size, memory)
            }
        }
    }

    fn write_target(
        &mut self,
        target: Target,
        size: Size,
        value: u16,
        memory: &mut Memory,
    ) -> Result<(), SimError> {
        match target {
            Target::Register(register) => {
                self.registers.set(register, value);
                Ok(())
            }
            Target::Direct(address) => {
                let address = i64::from(address.value());
                memory.write(address, size, value)?;
                self.registers.trace_transfer(address as u16, value as u8);
                Ok(())
            }
            Target::Indirect => {
                let address = i64::from(self.registers.get(Register::Bx));
                memory.write(address, size, value)?;
                self.registers.trace_transfer(address as u16, value as u8);
                Ok(())
            }
        }
    }

    fn load(&mut self, address: i64, size: Size, memory: &Memory) -> Result<u16, SimError> {
        let value = memory.read(address, size)?;
        self.registers.trace_transfer(address as u16, value as u8);
        Ok(value)
    }

    fn port_number(&self, port: Port) -> Result<IoAddress, SimError> {
        let number = match port {
            Port::Fixed(fixed) => i64::from(fixed),
            Port::Dx => i64::from(self.registers.get(Register::Dx)),
        };
        IoAddress::new(number).ok_or(SimError::IoAddressOutOfRange(number))
    }

    fn port_above(&self, port: IoAddress) -> Result<IoAddress, SimError> {
        port.offset(1)
            .ok_or(SimError::IoAddressOutOfRange(i64::from(port.value()) + 1))
    }
}

/// ALU operation behind a two-operand mnemonic; `None` for plain `MOV`
fn binary_alu_op(op: BinaryOp) -> Option<AluOp> {
    match op {
        BinaryOp::Mov => None,
        BinaryOp::Add => Some(AluOp::Add),
        BinaryOp::Adc => Some(AluOp::Adc),
        BinaryOp::Sub | BinaryOp::Cmp => Some(AluOp::Sub),
        BinaryOp::Sbb => Some(AluOp::Sbb),
        BinaryOp::And => Some(AluOp::And),
        BinaryOp::Or => Some(AluOp::Or),
        BinaryOp::Xor => Some(AluOp::Xor),
    }
}
