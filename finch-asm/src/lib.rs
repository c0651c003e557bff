//! Assembly front end for the finch educational machine
//!
//! Takes source text through a lexer, a line-oriented recursive-descent
//! parser, a five-pass semantic analyzer and a bit-exact encoder, producing a
//! [`Program`] that the execution engine runs directly.
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod address;
mod byte;
mod error;
mod span;

pub mod analyzer;
pub mod encoding;
pub mod lexer;
pub mod parser;
pub mod program;
pub mod syntax;
pub mod token;

pub use address::{IoAddress, MemoryAddress};
pub use byte::{Byte, Size};
pub use error::{Diagnostic, DiagnosticKind};
pub use program::Program;
pub use span::Span;
pub use token::{Mnemonic, Register};

/// Assembles source text into a runnable [`Program`]
///
/// Lexical and syntactic errors abort at the first occurrence; semantic
/// errors are collected in batches across independent statements, so one
/// compile attempt reports as much as it can.
pub fn assemble(source: &str) -> Result<Program, Vec<Diagnostic>> {
    let tokens = lexer::tokenize(source).map_err(|e| vec![e])?;
    let statements = parser::parse(&tokens).map_err(|e| vec![e])?;
    analyzer::analyze(statements)
}
