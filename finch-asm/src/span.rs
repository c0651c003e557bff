/// Byte range in the source text
///
/// Spans are half-open: `start` is the offset of the first byte and `end` is
/// one past the last. Every token and diagnostic carries one so a frontend
/// can highlight the offending text.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Span {
    /// Offset of the first byte
    pub start: usize,
    /// Offset one past the last byte
    pub end: usize,
}

impl Span {
    /// Builds a span covering `[start, end)`
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Builds an empty span at the given offset
    pub fn point(at: usize) -> Self {
        Self { start: at, end: at }
    }

    /// Smallest span containing both `self` and `other`
    #[must_use]
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// 1-based line and column of the span start within `source`
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let head = &source.as_bytes()[..self.start.min(source.len())];
        let line = head.iter().filter(|&&b| b == b'\n').count() + 1;
        let col = head.iter().rev().take_while(|&&b| b != b'\n').count() + 1;
        (line, col)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merge_is_symmetric() {
        let a = Span::new(2, 5);
        let b = Span::new(4, 9);
        assert_eq!(a.merge(b), Span::new(2, 9));
        assert_eq!(b.merge(a), Span::new(2, 9));
    }

    #[test]
    fn line_col() {
        let src = "mov ax, 1\njnz done\n";
        assert_eq!(Span::new(0, 3).line_col(src), (1, 1));
        assert_eq!(Span::new(10, 13).line_col(src), (2, 1));
        assert_eq!(Span::new(14, 18).line_col(src), (2, 5));
    }
}
