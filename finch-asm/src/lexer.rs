//! Source text to token stream

use crate::{
    token::{keyword, Token, TokenKind},
    Diagnostic, DiagnosticKind, Span,
};

/// Scans the whole source, stopping at the first malformed token
///
/// The returned stream ends with an [`TokenKind::Eof`] token; every line
/// break contributes an [`TokenKind::Eol`]. Comments (`;` to end of line)
/// and blanks are skipped.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, Diagnostic> {
    Scanner {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
        tokens: Vec::new(),
    }
    .run()
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token<'a>>,
}

impl<'a> Scanner<'a> {
    fn run(mut self) -> Result<Vec<Token<'a>>, Diagnostic> {
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' => self.single(TokenKind::Eol),
                b';' => {
                    while self.bytes.get(self.pos).is_some_and(|&b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                b'(' => self.single(TokenKind::LeftParen),
                b')' => self.single(TokenKind::RightParen),
                b'[' => self.single(TokenKind::LeftBracket),
                b']' => self.single(TokenKind::RightBracket),
                b',' => self.single(TokenKind::Comma),
                b'?' => self.single(TokenKind::QuestionMark),
                b'+' => self.single(TokenKind::Plus),
                b'-' => self.single(TokenKind::Minus),
                b'*' => self.single(TokenKind::Star),
                b'"' => self.string()?,
                b'0'..=b'9' => self.number()?,
                b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.identifier(),
                0x80.. => {
                    return Err(self.fail_here(DiagnosticKind::NonAsciiCharacter));
                }
                _ => {
                    return Err(self.fail_here(DiagnosticKind::UnexpectedCharacter(b as char)));
                }
            }
        }
        self.push(TokenKind::Eof, self.pos, self.pos);
        Ok(self.tokens)
    }

    /// Emits a one-byte token and advances past it
    fn single(&mut self, kind: TokenKind) {
        self.push(kind, self.pos, self.pos + 1);
        self.pos += 1;
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            lexeme: &self.src[start..end],
            span: Span::new(start, end),
        });
    }

    fn fail_here(&self, kind: DiagnosticKind) -> Diagnostic {
        Diagnostic::new(kind, Span::new(self.pos, self.pos + 1))
    }

    fn string(&mut self) -> Result<(), Diagnostic> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.bytes.get(self.pos) {
                None | Some(b'\n') => {
                    return Err(Diagnostic::new(
                        DiagnosticKind::UnterminatedString,
                        Span::new(start, self.pos),
                    ));
                }
                Some(b'"') => {
                    self.pos += 1;
                    self.push(TokenKind::String, start, self.pos);
                    return Ok(());
                }
                Some(&b) if b >= 0x80 => {
                    return Err(self.fail_here(DiagnosticKind::NonAsciiCharacter));
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Scans a number literal and classifies it by its suffix
    ///
    /// The scan consumes every hex digit, so a binary literal's `b` suffix is
    /// part of the scanned text; classification looks at the last character
    /// to tell the three radixes apart.
    fn number(&mut self) -> Result<(), Diagnostic> {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_hexdigit())
        {
            self.pos += 1;
        }
        if self
            .bytes
            .get(self.pos)
            .is_some_and(|&b| b == b'h' || b == b'H')
        {
            self.pos += 1;
        }

        let text = &self.src[start..self.pos];
        let kind = match text.as_bytes()[text.len() - 1] {
            b'h' | b'H' => None,
            b'b' | b'B' => {
                let digits = &text[..text.len() - 1];
                (!digits.bytes().all(|b| b == b'0' || b == b'1'))
                    .then_some(DiagnosticKind::InvalidBinaryLiteral)
            }
            _ => (!text.bytes().all(|b| b.is_ascii_digit()))
                .then_some(DiagnosticKind::InvalidDecimalLiteral),
        };
        if let Some(kind) = kind {
            return Err(Diagnostic::new(kind, Span::new(start, self.pos)));
        }
        self.push(TokenKind::Number, start, self.pos);
        Ok(())
    }

    fn identifier(&mut self) {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }

        // A trailing colon makes this a label, keyword or not
        if self.bytes.get(self.pos) == Some(&b':') {
            let end = self.pos;
            self.pos += 1;
            self.tokens.push(Token {
                kind: TokenKind::Label,
                lexeme: &self.src[start..end],
                span: Span::new(start, self.pos),
            });
            return;
        }

        let upper = self.src[start..self.pos].to_ascii_uppercase();
        let kind = keyword(&upper).unwrap_or(TokenKind::Identifier);
        self.push(kind, start, self.pos);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::{Mnemonic, Register};

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn fails(source: &str) -> DiagnosticKind {
        tokenize(source).unwrap_err().kind
    }

    #[test]
    fn statements_and_keywords() {
        assert_eq!(
            kinds("mov ax, 5\nhlt"),
            vec![
                TokenKind::Mnemonic(Mnemonic::Mov),
                TokenKind::Register(Register::Ax),
                TokenKind::Comma,
                TokenKind::Number,
                TokenKind::Eol,
                TokenKind::Mnemonic(Mnemonic::Hlt),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(kinds("OrG")[0], TokenKind::Org);
        assert_eq!(kinds("offset")[0], TokenKind::Offset);
        assert_eq!(kinds("Mbr")[0], TokenKind::Register(Register::Mbr));
    }

    #[test]
    fn labels() {
        let tokens = tokenize("loop: dec cx").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Label);
        assert_eq!(tokens[0].lexeme, "loop");
        assert_eq!(tokens[0].span, Span::new(0, 5));
    }

    #[test]
    fn number_radixes() {
        assert_eq!(kinds("120")[0], TokenKind::Number);
        assert_eq!(kinds("1010b")[0], TokenKind::Number);
        assert_eq!(kinds("0F2h")[0], TokenKind::Number);
        assert_eq!(kinds("1Ab0h")[0], TokenKind::Number);
    }

    #[test]
    fn bad_number_suffixes() {
        // ends in b but the digits are not binary
        assert_eq!(fails("12b"), DiagnosticKind::InvalidBinaryLiteral);
        assert_eq!(fails("1A2b"), DiagnosticKind::InvalidBinaryLiteral);
        // hex digits with no h suffix
        assert_eq!(fails("1A"), DiagnosticKind::InvalidDecimalLiteral);
    }

    #[test]
    fn strings() {
        let tokens = tokenize("db \"hi, there\"").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::String);
        assert_eq!(tokens[1].lexeme, "\"hi, there\"");
        assert_eq!(fails("db \"oops"), DiagnosticKind::UnterminatedString);
        assert_eq!(fails("db \"a\nb\""), DiagnosticKind::UnterminatedString);
    }

    #[test]
    fn non_ascii_rejected() {
        assert_eq!(fails("mov ax, á"), DiagnosticKind::NonAsciiCharacter);
        assert_eq!(fails("db \"á\""), DiagnosticKind::NonAsciiCharacter);
    }

    #[test]
    fn comments_skipped() {
        assert_eq!(
            kinds("nop ; does nothing\nhlt"),
            vec![
                TokenKind::Mnemonic(Mnemonic::Nop),
                TokenKind::Eol,
                TokenKind::Mnemonic(Mnemonic::Hlt),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn stray_punctuation() {
        assert_eq!(fails("mov ax, :"), DiagnosticKind::UnexpectedCharacter(':'));
        assert_eq!(fails("mov ax, 5 !"), DiagnosticKind::UnexpectedCharacter('!'));
    }
}
