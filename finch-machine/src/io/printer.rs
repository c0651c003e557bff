//! Character printer with a five-slot input buffer

use std::collections::VecDeque;

const BUFFER_SIZE: usize = 5;
const FORM_FEED: u8 = 12;

/// The printer: a FIFO of pending characters plus the page text
///
/// The printer itself has no ports; the PIO or handshake module in front of
/// it feeds `push` and watches `busy`. One character leaves the buffer per
/// printer clock tick.
#[derive(Clone, Debug, Default)]
pub(crate) struct Printer {
    buffer: VecDeque<u8>,
    output: String,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer full; characters pushed while busy are lost
    pub fn busy(&self) -> bool {
        self.buffer.len() >= BUFFER_SIZE
    }

    pub fn push(&mut self, char: u8) {
        if self.busy() {
            log::warn!("printer buffer full, dropping {char:#04x}");
            return;
        }
        self.buffer.push_back(char);
    }

    /// One printer clock tick: prints the oldest buffered character
    ///
    /// A form feed replaces the page instead of printing.
    pub fn tick(&mut self) -> Option<u8> {
        let char = self.buffer.pop_front()?;
        if char == FORM_FEED {
            self.output.clear();
        } else {
            self.output.push(char as char);
        }
        Some(char)
    }

    /// Text currently on the page
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn busy_at_capacity_and_drops() {
        let mut printer = Printer::new();
        for char in b"abcde" {
            printer.push(*char);
        }
        assert!(printer.busy());
        printer.push(b'f');
        assert_eq!(printer.buffered(), 5);

        assert_eq!(printer.tick(), Some(b'a'));
        assert!(!printer.busy());
        for _ in 0..4 {
            printer.tick();
        }
        assert_eq!(printer.output(), "abcde");
        assert_eq!(printer.tick(), None);
    }

    #[test]
    fn form_feed_clears_the_page() {
        let mut printer = Printer::new();
        printer.push(b'x');
        printer.push(FORM_FEED);
        printer.push(b'y');
        printer.tick();
        printer.tick();
        assert_eq!(printer.output(), "");
        printer.tick();
        assert_eq!(printer.output(), "y");
    }
}
