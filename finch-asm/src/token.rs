use crate::{Size, Span};
use std::fmt;

/// CPU register name
///
/// The four general-purpose words each expose high/low byte aliases. `SP` is
/// a word register usable as an operand; `IP`, `IR`, `MAR` and `MBR` exist
/// for display and are rejected as instruction operands.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[allow(missing_docs)]
pub enum Register {
    Ax, Bx, Cx, Dx,
    Al, Bl, Cl, Dl,
    Ah, Bh, Ch, Dh,
    Sp, Ip, Ir, Mar, Mbr,
}

impl Register {
    /// Operand width of the register
    pub fn size(self) -> Size {
        match self {
            Register::Ax
            | Register::Bx
            | Register::Cx
            | Register::Dx
            | Register::Sp
            | Register::Ip
            | Register::Mar => Size::Word,
            Register::Al
            | Register::Bl
            | Register::Cl
            | Register::Dl
            | Register::Ah
            | Register::Bh
            | Register::Ch
            | Register::Dh
            | Register::Ir
            | Register::Mbr => Size::Byte,
        }
    }

    /// 3-bit machine code of the register, if it is encodable
    ///
    /// The internal registers (`IP`, `IR`, `MAR`, `MBR`) have no code; they
    /// never appear in an encoded instruction.
    pub fn code(self) -> Option<u8> {
        match self {
            Register::Ax | Register::Al => Some(0b000),
            Register::Cx | Register::Cl => Some(0b001),
            Register::Dx | Register::Dl => Some(0b010),
            Register::Bx | Register::Bl => Some(0b011),
            Register::Sp | Register::Ah => Some(0b100),
            Register::Ch => Some(0b101),
            Register::Dh => Some(0b110),
            Register::Bh => Some(0b111),
            Register::Ip | Register::Ir | Register::Mar | Register::Mbr => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Register::Ax => "AX",
            Register::Bx => "BX",
            Register::Cx => "CX",
            Register::Dx => "DX",
            Register::Al => "AL",
            Register::Bl => "BL",
            Register::Cl => "CL",
            Register::Dl => "DL",
            Register::Ah => "AH",
            Register::Bh => "BH",
            Register::Ch => "CH",
            Register::Dh => "DH",
            Register::Sp => "SP",
            Register::Ip => "IP",
            Register::Ir => "IR",
            Register::Mar => "MAR",
            Register::Mbr => "MBR",
        };
        name.fmt(f)
    }
}

/// Instruction mnemonic
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[allow(missing_docs)]
pub enum Mnemonic {
    // transfer and arithmetic, two operands
    Mov, Add, Adc, Sub, Sbb, Cmp, And, Or, Xor,
    // one operand
    Not, Neg, Inc, Dec,
    // stack
    Push, Pop, Pushf, Popf,
    // control
    Jmp, Call, Ret,
    Jc, Jnc, Jz, Jnz, Js, Jns, Jo, Jno,
    // I/O
    In, Out,
    // interrupts and flags
    Int, Iret, Cli, Sti,
    // misc
    Nop, Hlt,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Mnemonic::Mov => "MOV",
            Mnemonic::Add => "ADD",
            Mnemonic::Adc => "ADC",
            Mnemonic::Sub => "SUB",
            Mnemonic::Sbb => "SBB",
            Mnemonic::Cmp => "CMP",
            Mnemonic::And => "AND",
            Mnemonic::Or => "OR",
            Mnemonic::Xor => "XOR",
            Mnemonic::Not => "NOT",
            Mnemonic::Neg => "NEG",
            Mnemonic::Inc => "INC",
            Mnemonic::Dec => "DEC",
            Mnemonic::Push => "PUSH",
            Mnemonic::Pop => "POP",
            Mnemonic::Pushf => "PUSHF",
            Mnemonic::Popf => "POPF",
            Mnemonic::Jmp => "JMP",
            Mnemonic::Call => "CALL",
            Mnemonic::Ret => "RET",
            Mnemonic::Jc => "JC",
            Mnemonic::Jnc => "JNC",
            Mnemonic::Jz => "JZ",
            Mnemonic::Jnz => "JNZ",
            Mnemonic::Js => "JS",
            Mnemonic::Jns => "JNS",
            Mnemonic::Jo => "JO",
            Mnemonic::Jno => "JNO",
            Mnemonic::In => "IN",
            Mnemonic::Out => "OUT",
            Mnemonic::Int => "INT",
            Mnemonic::Iret => "IRET",
            Mnemonic::Cli => "CLI",
            Mnemonic::Sti => "STI",
            Mnemonic::Nop => "NOP",
            Mnemonic::Hlt => "HLT",
        };
        name.fmt(f)
    }
}

/// Kind of a lexed token
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TokenKind {
    /// Number literal; the value is parsed from the lexeme later
    Number,
    /// Double-quoted string literal
    String,
    /// Identifier that is not a keyword
    Identifier,
    /// Identifier immediately followed by `:`
    Label,
    /// `ORG` directive
    Org,
    /// `END` directive
    End,
    /// `DB` directive
    Db,
    /// `DW` directive
    Dw,
    /// `EQU` directive
    Equ,
    /// `BYTE` size keyword
    Byte,
    /// `WORD` size keyword
    Word,
    /// `PTR` keyword
    Ptr,
    /// `OFFSET` operator
    Offset,
    /// Register name
    Register(Register),
    /// Instruction mnemonic
    Mnemonic(Mnemonic),
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `?`
    QuestionMark,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// End of line
    Eol,
    /// End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Number => "number".fmt(f),
            TokenKind::String => "string".fmt(f),
            TokenKind::Identifier => "identifier".fmt(f),
            TokenKind::Label => "label".fmt(f),
            TokenKind::Org => "ORG".fmt(f),
            TokenKind::End => "END".fmt(f),
            TokenKind::Db => "DB".fmt(f),
            TokenKind::Dw => "DW".fmt(f),
            TokenKind::Equ => "EQU".fmt(f),
            TokenKind::Byte => "BYTE".fmt(f),
            TokenKind::Word => "WORD".fmt(f),
            TokenKind::Ptr => "PTR".fmt(f),
            TokenKind::Offset => "OFFSET".fmt(f),
            TokenKind::Register(r) => r.fmt(f),
            TokenKind::Mnemonic(m) => m.fmt(f),
            TokenKind::LeftParen => "'('".fmt(f),
            TokenKind::RightParen => "')'".fmt(f),
            TokenKind::LeftBracket => "'['".fmt(f),
            TokenKind::RightBracket => "']'".fmt(f),
            TokenKind::Comma => "','".fmt(f),
            TokenKind::QuestionMark => "'?'".fmt(f),
            TokenKind::Plus => "'+'".fmt(f),
            TokenKind::Minus => "'-'".fmt(f),
            TokenKind::Star => "'*'".fmt(f),
            TokenKind::Eol => "end of line".fmt(f),
            TokenKind::Eof => "end of file".fmt(f),
        }
    }
}

/// One lexed token: a kind plus the source text it covers
#[derive(Clone, Debug)]
pub struct Token<'a> {
    /// Token class
    pub kind: TokenKind,
    /// Source text of the token (for labels, without the trailing `:`)
    pub lexeme: &'a str,
    /// Byte range in the source
    pub span: Span,
}

/// Maps an uppercased identifier to its keyword token, if it is one
pub(crate) fn keyword(upper: &str) -> Option<TokenKind> {
    use Mnemonic::*;
    use Register::*;
    let kind = match upper {
        "ORG" => TokenKind::Org,
        "END" => TokenKind::End,
        "DB" => TokenKind::Db,
        "DW" => TokenKind::Dw,
        "EQU" => TokenKind::Equ,
        "BYTE" => TokenKind::Byte,
        "WORD" => TokenKind::Word,
        "PTR" => TokenKind::Ptr,
        "OFFSET" => TokenKind::Offset,

        "AX" => TokenKind::Register(Ax),
        "BX" => TokenKind::Register(Bx),
        "CX" => TokenKind::Register(Cx),
        "DX" => TokenKind::Register(Dx),
        "AL" => TokenKind::Register(Al),
        "BL" => TokenKind::Register(Bl),
        "CL" => TokenKind::Register(Cl),
        "DL" => TokenKind::Register(Dl),
        "AH" => TokenKind::Register(Ah),
        "BH" => TokenKind::Register(Bh),
        "CH" => TokenKind::Register(Ch),
        "DH" => TokenKind::Register(Dh),
        "SP" => TokenKind::Register(Sp),
        "IP" => TokenKind::Register(Ip),
        "IR" => TokenKind::Register(Ir),
        "MAR" => TokenKind::Register(Mar),
        "MBR" => TokenKind::Register(Mbr),

        "MOV" => TokenKind::Mnemonic(Mov),
        "ADD" => TokenKind::Mnemonic(Add),
        "ADC" => TokenKind::Mnemonic(Adc),
        "SUB" => TokenKind::Mnemonic(Sub),
        "SBB" => TokenKind::Mnemonic(Sbb),
        "CMP" => TokenKind::Mnemonic(Cmp),
        "AND" => TokenKind::Mnemonic(And),
        "OR" => TokenKind::Mnemonic(Or),
        "XOR" => TokenKind::Mnemonic(Xor),
        "NOT" => TokenKind::Mnemonic(Not),
        "NEG" => TokenKind::Mnemonic(Neg),
        "INC" => TokenKind::Mnemonic(Inc),
        "DEC" => TokenKind::Mnemonic(Dec),
        "PUSH" => TokenKind::Mnemonic(Push),
        "POP" => TokenKind::Mnemonic(Pop),
        "PUSHF" => TokenKind::Mnemonic(Pushf),
        "POPF" => TokenKind::Mnemonic(Popf),
        "JMP" => TokenKind::Mnemonic(Jmp),
        "CALL" => TokenKind::Mnemonic(Call),
        "RET" => TokenKind::Mnemonic(Ret),
        "JC" => TokenKind::Mnemonic(Jc),
        "JNC" => TokenKind::Mnemonic(Jnc),
        "JZ" => TokenKind::Mnemonic(Jz),
        "JNZ" => TokenKind::Mnemonic(Jnz),
        "JS" => TokenKind::Mnemonic(Js),
        "JNS" => TokenKind::Mnemonic(Jns),
        "JO" => TokenKind::Mnemonic(Jo),
        "JNO" => TokenKind::Mnemonic(Jno),
        "IN" => TokenKind::Mnemonic(In),
        "OUT" => TokenKind::Mnemonic(Out),
        "INT" => TokenKind::Mnemonic(Int),
        "IRET" => TokenKind::Mnemonic(Iret),
        "CLI" => TokenKind::Mnemonic(Cli),
        "STI" => TokenKind::Mnemonic(Sti),
        "NOP" => TokenKind::Mnemonic(Nop),
        "HLT" => TokenKind::Mnemonic(Hlt),
        _ => return None,
    };
    Some(kind)
}
