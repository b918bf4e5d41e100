//! Quote state tracking for delimited text.
//!
//! The `csv` crate closes a quoted field that is still open at end of input
//! without reporting anything. [`QuoteTracker`] sits between the decoder and
//! the csv reader and follows the same quoting rules (doubled quotes escape,
//! a quote only opens a field at its start) so the loader can tell whether
//! the input ended inside quotes.

use std::io::{self, Read};

const QUOTE: u8 = b'"';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    /// A quote seen inside a quoted field: either the closing quote or the
    /// first half of an escaped `""`.
    QuoteInQuoted,
}

/// `io::Read` adapter that follows the quoting state of the bytes read
/// through it.
#[derive(Debug)]
pub struct QuoteTracker<R> {
    inner: R,
    delimiter: u8,
    state: QuoteState,
}

impl<R: Read> QuoteTracker<R> {
    pub fn new(inner: R, delimiter: u8) -> Self {
        Self {
            inner,
            delimiter,
            state: QuoteState::FieldStart,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Whether the bytes read so far end inside an open quoted field.
    pub fn in_open_quote(&self) -> bool {
        self.state == QuoteState::Quoted
    }

    fn observe(&mut self, byte: u8) {
        let boundary = byte == self.delimiter || byte == b'\n' || byte == b'\r';
        self.state = match self.state {
            QuoteState::FieldStart if byte == QUOTE => QuoteState::Quoted,
            QuoteState::FieldStart | QuoteState::Unquoted if boundary => QuoteState::FieldStart,
            QuoteState::FieldStart | QuoteState::Unquoted => QuoteState::Unquoted,
            QuoteState::Quoted if byte == QUOTE => QuoteState::QuoteInQuoted,
            QuoteState::Quoted => QuoteState::Quoted,
            QuoteState::QuoteInQuoted if byte == QUOTE => QuoteState::Quoted,
            QuoteState::QuoteInQuoted if boundary => QuoteState::FieldStart,
            QuoteState::QuoteInQuoted => QuoteState::Unquoted,
        };
    }
}

impl<R: Read> Read for QuoteTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for &byte in &buf[..n] {
            self.observe(byte);
        }
        Ok(n)
    }
}
