//! Token stream to statement list

use crate::{
    syntax::{DataDirective, DataValue, ExprOp, NumberExpression, Operand, Statement},
    token::{Mnemonic, Register, Token, TokenKind},
    Diagnostic, DiagnosticKind, Size, Span,
};
use std::collections::HashSet;

/// Parses the whole token stream, stopping at the first syntax error
///
/// The grammar is line-oriented: one statement per line, `END` last.
/// Duplicate label definitions are rejected here, while every other label
/// question is left to the analyzer.
pub fn parse(tokens: &[Token]) -> Result<Vec<Statement>, Diagnostic> {
    Parser {
        tokens,
        current: 0,
        labels: HashSet::new(),
    }
    .run()
}

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    current: usize,
    labels: HashSet<String>,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn run(mut self) -> Result<Vec<Statement>, Diagnostic> {
        let mut statements = Vec::new();
        let mut saw_end = false;
        loop {
            self.skip_eols();
            if self.check(TokenKind::Eof) {
                break;
            }
            if self.check(TokenKind::End) {
                let span = self.advance().span;
                statements.push(Statement::End { span });
                saw_end = true;
                self.skip_eols();
                if !self.check(TokenKind::Eof) {
                    return Err(self.fail(DiagnosticKind::EndMustBeLast));
                }
                break;
            }
            statements.push(self.statement()?);
        }

        let here = self.peek().span;
        if statements.iter().all(|s| matches!(s, Statement::End { .. })) {
            return Err(Diagnostic::new(DiagnosticKind::EmptyProgram, here));
        }
        if !saw_end {
            return Err(Diagnostic::new(DiagnosticKind::MissingEnd, here));
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement, Diagnostic> {
        match self.peek().kind {
            TokenKind::Org => {
                let start = self.advance().span;
                let number = self.expect(TokenKind::Number, "an address after ORG")?;
                let address = parse_number(&number)?;
                let span = start.merge(number.span);
                self.end_of_statement()?;
                Ok(Statement::OriginChange { address, span })
            }
            TokenKind::Label => {
                let token = self.advance();
                let span = token.span;
                let label = self.define_label(token.lexeme.to_ascii_uppercase(), span)?;
                // The labelled statement may sit on the next line
                self.skip_eols();
                match self.peek().kind {
                    TokenKind::Mnemonic(m) => {
                        let start = self.advance().span;
                        self.instruction(m, Some(label), start)
                    }
                    TokenKind::Db => self.data(DataDirective::Db, Some(label)),
                    TokenKind::Dw => self.data(DataDirective::Dw, Some(label)),
                    TokenKind::Equ => self.data(DataDirective::Equ, Some(label)),
                    _ => Err(self.fail_expected("an instruction or directive after the label")),
                }
            }
            TokenKind::Identifier => {
                // Classic form: a bare identifier labels a data directive
                let token = self.advance();
                let span = token.span;
                let label = self.define_label(token.lexeme.to_ascii_uppercase(), span)?;
                match self.peek().kind {
                    TokenKind::Db => self.data(DataDirective::Db, Some(label)),
                    TokenKind::Dw => self.data(DataDirective::Dw, Some(label)),
                    TokenKind::Equ => self.data(DataDirective::Equ, Some(label)),
                    _ => Err(self.fail_expected("DB, DW or EQU after the identifier")),
                }
            }
            TokenKind::Db => self.data(DataDirective::Db, None),
            TokenKind::Dw => self.data(DataDirective::Dw, None),
            TokenKind::Equ => Err(self.fail(DiagnosticKind::EquRequiresLabel)),
            TokenKind::Mnemonic(m) => {
                let start = self.advance().span;
                self.instruction(m, None, start)
            }
            _ => Err(self.fail_expected("a statement")),
        }
    }

    /// Parses a data directive; the directive token is still unconsumed
    fn data(
        &mut self,
        directive: DataDirective,
        label: Option<String>,
    ) -> Result<Statement, Diagnostic> {
        let start = self.advance().span;

        let mut values = Vec::new();
        if directive == DataDirective::Equ {
            values.push(DataValue::Expression(self.number_expression()?));
        } else {
            values.push(self.data_value()?);
            while self.eat(TokenKind::Comma) {
                values.push(self.data_value()?);
            }
        }
        self.end_of_statement()?;

        let span = values.last().map_or(start, |v| start.merge(v.span()));
        Ok(Statement::Data {
            directive,
            label,
            values,
            span,
        })
    }

    fn data_value(&mut self) -> Result<DataValue, Diagnostic> {
        match self.peek().kind {
            TokenKind::String => {
                let token = self.advance();
                Ok(DataValue::String {
                    text: token.lexeme[1..token.lexeme.len() - 1].to_owned(),
                    span: token.span,
                })
            }
            TokenKind::QuestionMark => Ok(DataValue::Unassigned(self.advance().span)),
            _ => Ok(DataValue::Expression(self.number_expression()?)),
        }
    }

    /// Parses an instruction's operands; the mnemonic is already consumed
    fn instruction(
        &mut self,
        mnemonic: Mnemonic,
        label: Option<String>,
        start: Span,
    ) -> Result<Statement, Diagnostic> {
        let mut operands = Vec::new();
        if !self.at_end_of_statement() {
            operands.push(self.operand()?);
            while self.eat(TokenKind::Comma) {
                operands.push(self.operand()?);
            }
        }
        self.end_of_statement()?;

        let span = operands.last().map_or(start, |o| start.merge(o.span()));
        Ok(Statement::Instruction {
            mnemonic,
            label,
            operands,
            span,
        })
    }

    fn operand(&mut self) -> Result<Operand, Diagnostic> {
        if let TokenKind::Register(register) = self.peek().kind {
            let span = self.advance().span;
            return Ok(Operand::Register { register, span });
        }

        let size = match self.peek().kind {
            TokenKind::Byte => Some(Size::Byte),
            TokenKind::Word => Some(Size::Word),
            _ => None,
        };
        if size.is_some() {
            let start = self.advance().span;
            self.expect(TokenKind::Ptr, "PTR after the size keyword")?;
            if !self.check(TokenKind::LeftBracket) {
                return Err(self.fail_expected("'[' after PTR"));
            }
            return self.bracketed(size, start);
        }

        if self.check(TokenKind::LeftBracket) {
            let start = self.peek().span;
            return self.bracketed(None, start);
        }

        Ok(Operand::Expression(self.number_expression()?))
    }

    /// Parses `[BX]` or `[expr]`; the `[` token is still unconsumed
    fn bracketed(&mut self, size: Option<Size>, start: Span) -> Result<Operand, Diagnostic> {
        self.advance();
        if let TokenKind::Register(register) = self.peek().kind {
            if register != Register::Bx {
                return Err(self.fail_expected("BX, the only indirect-capable register"));
            }
            self.advance();
            let end = self.expect(TokenKind::RightBracket, "']' after BX")?;
            return Ok(Operand::Indirect {
                size,
                span: start.merge(end.span),
            });
        }

        let expr = self.number_expression()?;
        let end = self.expect(TokenKind::RightBracket, "']' after the address")?;
        Ok(Operand::Direct {
            size,
            expr,
            span: start.merge(end.span),
        })
    }

    fn number_expression(&mut self) -> Result<NumberExpression, Diagnostic> {
        let mut expr = self.factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => ExprOp::Add,
                TokenKind::Minus => ExprOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.factor()?;
            expr = NumberExpression::binary(op, expr, rhs);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<NumberExpression, Diagnostic> {
        let mut expr = self.unary()?;
        while self.eat(TokenKind::Star) {
            let rhs = self.unary()?;
            expr = NumberExpression::binary(ExprOp::Mul, expr, rhs);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<NumberExpression, Diagnostic> {
        let negate = match self.peek().kind {
            TokenKind::Plus => Some(false),
            TokenKind::Minus => Some(true),
            _ => None,
        };
        let Some(negate) = negate else {
            return self.primary();
        };
        let op_span = self.advance().span;
        if matches!(self.peek().kind, TokenKind::Plus | TokenKind::Minus) {
            return Err(self.fail(DiagnosticKind::AmbiguousUnary));
        }
        let inner = self.unary()?;
        Ok(if negate {
            let span = op_span.merge(inner.span);
            NumberExpression::neg(inner, span)
        } else {
            inner
        })
    }

    fn primary(&mut self) -> Result<NumberExpression, Diagnostic> {
        match self.peek().kind {
            TokenKind::Number => {
                let token = self.advance();
                let span = token.span;
                Ok(NumberExpression::number(parse_number(&token)?, span))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.number_expression()?;
                if !self.eat(TokenKind::RightParen) {
                    return Err(self.fail(DiagnosticKind::UnclosedParenthesis));
                }
                Ok(expr)
            }
            TokenKind::Offset => {
                let start = self.advance().span;
                let token = self.expect(TokenKind::Identifier, "a label after OFFSET")?;
                let span = start.merge(token.span);
                Ok(NumberExpression::label(
                    token.lexeme.to_ascii_uppercase(),
                    true,
                    span,
                ))
            }
            TokenKind::Identifier => {
                let token = self.advance();
                let span = token.span;
                Ok(NumberExpression::label(
                    token.lexeme.to_ascii_uppercase(),
                    false,
                    span,
                ))
            }
            _ => Err(self.fail(DiagnosticKind::ExpectedArgument)),
        }
    }

    // helpers

    fn define_label(&mut self, name: String, span: Span) -> Result<String, Diagnostic> {
        if !self.labels.insert(name.clone()) {
            return Err(Diagnostic::new(DiagnosticKind::DuplicatedLabel(name), span));
        }
        Ok(name)
    }

    fn peek(&self) -> &'t Token<'a> {
        &self.tokens[self.current]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.tokens[self.current].clone();
        self.current += 1;
        token
    }

    /// Consumes the next token if it has the given kind
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token<'a>, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.fail_expected(expected))
        }
    }

    fn skip_eols(&mut self) {
        while self.check(TokenKind::Eol) {
            self.current += 1;
        }
    }

    fn at_end_of_statement(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eol | TokenKind::Eof)
    }

    fn end_of_statement(&mut self) -> Result<(), Diagnostic> {
        if self.check(TokenKind::Eol) {
            self.advance();
            Ok(())
        } else if self.check(TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.fail_expected("end of statement"))
        }
    }

    fn fail_expected(&self, expected: &'static str) -> Diagnostic {
        self.fail(DiagnosticKind::ExpectedToken {
            expected,
            found: self.peek().kind.to_string(),
        })
    }

    fn fail(&self, kind: DiagnosticKind) -> Diagnostic {
        Diagnostic::new(kind, self.peek().span)
    }
}

fn parse_number(token: &Token) -> Result<u32, Diagnostic> {
    let text = token.lexeme;
    let (digits, radix) = match text.as_bytes()[text.len() - 1] {
        b'h' | b'H' => (&text[..text.len() - 1], 16),
        b'b' | b'B' => (&text[..text.len() - 1], 2),
        _ => (text, 10),
    };
    u32::from_str_radix(digits, radix)
        .map_err(|_| Diagnostic::new(DiagnosticKind::NumberTooLarge, token.span))
}
