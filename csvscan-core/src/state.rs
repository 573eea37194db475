use std::cmp;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dialect::{Dialect, Terminator};
use crate::Error;

/// The smallest buffer the parser will ever use.
const MIN_CAPACITY: usize = 4;

/// A position in CSV data.
///
/// A position is the byte offset, character offset, line number and record
/// index of some point in the input. Characters are counted as UTF-8 scalar
/// values, so invalid UTF-8 may make the character offset inexact.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    byte: u64,
    char: u64,
    line: u64,
    record: u64,
}

impl Default for Position {
    fn default() -> Position {
        Position::new()
    }
}

impl Position {
    /// Returns a new position initialized to the start value.
    pub fn new() -> Position {
        Position { byte: 0, char: 0, line: 1, record: 0 }
    }

    /// The byte offset, starting at `0`, of this position.
    pub fn byte(&self) -> u64 {
        self.byte
    }

    /// The character offset, starting at `0`, of this position.
    pub fn char(&self) -> u64 {
        self.char
    }

    /// The line number, starting at `1`, of this position.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// The record index, starting with the first record at `0`.
    pub fn record(&self) -> u64 {
        self.record
    }

    /// Set the byte offset of this position.
    pub fn set_byte(&mut self, byte: u64) -> &mut Position {
        self.byte = byte;
        self
    }

    /// Set the line number of this position.
    pub fn set_line(&mut self, line: u64) -> &mut Position {
        assert!(line > 0);
        self.line = line;
        self
    }

    /// Set the record index of this position.
    pub fn set_record(&mut self, record: u64) -> &mut Position {
        self.record = record;
        self
    }
}

/// The positions of escape (or quote) bytes in the current field.
///
/// Offsets are relative to the start of the field, so compacting the
/// parser's buffer never invalidates them.
#[derive(Clone, Debug, Default)]
pub(crate) struct EscapeMask {
    words: Vec<u64>,
    count: usize,
}

impl EscapeMask {
    pub fn set(&mut self, i: usize) {
        let (w, bit) = (i / 64, 1u64 << (i % 64));
        if w >= self.words.len() {
            self.words.resize(w + 1, 0);
        }
        if self.words[w] & bit == 0 {
            self.words[w] |= bit;
            self.count += 1;
        }
    }

    pub fn unset(&mut self, i: usize) {
        let (w, bit) = (i / 64, 1u64 << (i % 64));
        if let Some(word) = self.words.get_mut(w) {
            if *word & bit != 0 {
                *word &= !bit;
                self.count -= 1;
            }
        }
    }

    #[cfg(test)]
    pub fn is_set(&self, i: usize) -> bool {
        self.words
            .get(i / 64)
            .map_or(false, |&w| w & (1u64 << (i % 64)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.words.clear();
        self.count = 0;
    }

    /// Copy `raw` to `out`, dropping every marked byte.
    pub fn copy_unmarked(&self, raw: &[u8], out: &mut Vec<u8>) {
        let mut start = 0;
        for (wi, &word) in self.words.iter().enumerate() {
            let mut word = word;
            while word != 0 {
                let i = wi * 64 + word.trailing_zeros() as usize;
                word &= word - 1;
                if i >= raw.len() {
                    break;
                }
                out.extend_from_slice(&raw[start..i]);
                start = i + 1;
            }
        }
        out.extend_from_slice(&raw[start..]);
    }
}

/// Where materialized fields are written.
///
/// This is the caller's record storage: all field bytes contiguously, plus
/// the end offset of each field.
pub(crate) struct Sink<'a> {
    pub data: &'a mut Vec<u8>,
    pub ends: &'a mut Vec<usize>,
}

/// What a mode state machine wants to happen after visiting a position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Step {
    /// Keep consuming the mask.
    Continue,
    /// A record was completed.
    Record,
    /// The byte at the position has no meaning in this mode.
    Unhandled(u8),
}

/// The mutable cursor over the input.
///
/// `buf` always has a length equal to its capacity. Only `buf[..len]` holds
/// input. The invariant `field_start <= pos <= len <= buf.len()` always
/// holds.
#[derive(Clone, Debug)]
pub(crate) struct ParserState {
    pub buf: Vec<u8>,
    /// The next position to scan.
    pub pos: usize,
    /// The number of valid bytes in `buf`.
    pub len: usize,
    /// Where the raw text of the current field begins.
    pub field_start: usize,
    /// Inside an open quote (RFC 4180 only).
    pub in_escape: bool,
    /// The current field violated the quoting rules and is read literally.
    pub field_invalid: bool,
    pub escapes: EscapeMask,
    /// The most recent escape position that is still significant.
    ///
    /// In RFC 4180 mode, this is the closing quote of the current field.
    /// In escape mode, this is an escape byte whose target hasn't been
    /// seen yet.
    pub prev_escape: Option<usize>,
    /// The source reported that it has no more data.
    pub eof: bool,
    pub skip_blank_lines: bool,
    /// The absolute byte offset of `buf[0]`.
    base: u64,
    /// Bytes before this index in `buf` have been counted in `chars`.
    tallied: usize,
    chars: u64,
    line: u64,
    record: u64,
    /// The start of the next record.
    next: Position,
    /// The start of the record being assembled (or last assembled).
    start: Position,
    /// Set once a record has been handed out, so the next read starts
    /// with empty output.
    fresh: bool,
    /// Indices of fields in the current record that were read literally
    /// because of invalid quoting.
    pub malformed: Vec<usize>,
}

impl ParserState {
    pub fn new(capacity: usize, skip_blank_lines: bool) -> ParserState {
        ParserState {
            buf: vec![0; cmp::max(MIN_CAPACITY, capacity)],
            pos: 0,
            len: 0,
            field_start: 0,
            in_escape: false,
            field_invalid: false,
            escapes: EscapeMask::default(),
            prev_escape: None,
            eof: false,
            skip_blank_lines,
            base: 0,
            tallied: 0,
            chars: 0,
            line: 1,
            record: 0,
            next: Position::new(),
            start: Position::new(),
            fresh: true,
            malformed: vec![],
        }
    }

    /// Forget all input and start over as if nothing had been read.
    pub fn reset(&mut self) {
        let cap = self.buf.len();
        *self = ParserState::new(cap, self.skip_blank_lines);
    }

    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn next_position(&self) -> &Position {
        &self.next
    }

    pub fn record_position(&self) -> &Position {
        &self.start
    }

    /// Return the unfilled part of the buffer, compacting or growing it
    /// when no room is left.
    ///
    /// The returned slice is never empty.
    pub fn spare(&mut self) -> Result<&mut [u8], Error> {
        if self.len == self.buf.len() {
            if self.field_start > 0 {
                self.compact();
            } else {
                self.grow()?;
            }
        }
        Ok(&mut self.buf[self.len..])
    }

    /// Record that `n` bytes were written to the slice returned by `spare`.
    ///
    /// `0` means the source is exhausted.
    pub fn commit(&mut self, n: usize) {
        if n == 0 {
            self.eof = true;
        } else {
            assert!(self.len + n <= self.buf.len(), "committed too much");
            self.len += n;
        }
    }

    /// Move the current field to the front of the buffer.
    fn compact(&mut self) {
        let fs = self.field_start;
        self.tally(fs);
        self.buf.copy_within(fs..self.len, 0);
        self.len -= fs;
        self.pos -= fs;
        self.tallied -= fs;
        self.field_start = 0;
        if let Some(ref mut p) = self.prev_escape {
            *p -= fs;
        }
        self.base += fs as u64;
    }

    /// Double the buffer. Only called when a single field fills it.
    fn grow(&mut self) -> Result<(), Error> {
        let cap = self.buf.len();
        let new_cap = cap.checked_mul(2).unwrap_or(usize::MAX);
        if new_cap == cap {
            return Err(Error::BufferFull { capacity: cap });
        }
        self.buf
            .try_reserve_exact(new_cap - cap)
            .map_err(Error::BufferGrowth)?;
        self.buf.resize(new_cap, 0);
        Ok(())
    }

    /// Count UTF-8 scalar values in `buf[tallied..upto]`.
    fn tally(&mut self, upto: usize) {
        if upto <= self.tallied {
            return;
        }
        let n = self.buf[self.tallied..upto]
            .iter()
            .filter(|&&b| b & 0xC0 != 0x80)
            .count();
        self.chars += n as u64;
        self.tallied = upto;
    }

    /// The position of `buf[i]`.
    pub fn position_at(&mut self, i: usize) -> Position {
        self.tally(i);
        Position {
            byte: self.base + i as u64,
            char: self.chars,
            line: self.line,
            record: self.record,
        }
    }

    /// Prepare to assemble a new record, if the previous one was handed
    /// out.
    pub fn begin(&mut self, sink: &mut Sink) {
        if !self.fresh {
            return;
        }
        sink.data.clear();
        sink.ends.clear();
        self.malformed.clear();
        self.start = self.next.clone();
        self.fresh = false;
    }

    /// Returns true when the byte at `q` can't be interpreted without
    /// looking at bytes that haven't been read yet.
    ///
    /// This is the case for a `\r` at the very end of the buffered data,
    /// which may be followed by a `\n`, and for a partial multi-byte
    /// delimiter.
    #[inline]
    pub fn needs_lookahead(&self, d: &Dialect, q: usize) -> bool {
        if self.eof {
            return false;
        }
        let b = self.buf[q];
        if b == b'\r' && d.term.is_crlf() && q + 1 == self.len {
            return true;
        }
        b == d.delimiter[0]
            && d.delimiter.len() > 1
            && d.delimiter_at(&self.buf[q..self.len]).is_none()
    }

    /// The length of the record terminator at `q`, if there is one.
    #[inline]
    fn terminator_len(&self, q: usize, term: Terminator) -> Option<usize> {
        let b = self.buf[q];
        match term {
            Terminator::CRLF if b == b'\n' => Some(1),
            Terminator::CRLF if b == b'\r' => {
                if q + 1 < self.len && self.buf[q + 1] == b'\n' {
                    Some(2)
                } else {
                    Some(1)
                }
            }
            Terminator::Any(t) if b == t => Some(1),
            _ => None,
        }
    }

    /// Account for a terminator byte at `q` that is field data rather
    /// than a record boundary (quoted or escaped).
    ///
    /// A `\r\n` pair counts as one line.
    #[inline]
    pub fn data_newline(&mut self, q: usize, term: Terminator) {
        let b = self.buf[q];
        let counts = match term {
            Terminator::CRLF => {
                b == b'\n'
                    || (b == b'\r'
                        && (q + 1 >= self.len || self.buf[q + 1] != b'\n'))
            }
            Terminator::Any(t) => b == t,
        };
        self.line += counts as u64;
    }

    /// Handle a delimiter or record terminator at `q`.
    ///
    /// Mode state machines call this once they've decided the byte at `q`
    /// isn't protected by quoting or escaping.
    #[inline]
    pub fn boundary(&mut self, d: &Dialect, q: usize, sink: &mut Sink) -> Step {
        let b = self.buf[q];
        if b == d.delimiter[0] {
            if d.delimiter_at(&self.buf[q..self.len]) == Some(true) {
                self.end_field(q, d.delimiter.len(), sink);
                return Step::Continue;
            }
            if d.term != b {
                // A partial multi-byte delimiter is just data.
                return Step::Continue;
            }
        }
        match self.terminator_len(q, d.term) {
            Some(n) => self.end_record(q, n, sink),
            None => Step::Unhandled(b),
        }
    }

    /// Close the field ending at `q` and skip `skip` bytes of delimiter or
    /// terminator.
    pub fn end_field(&mut self, q: usize, skip: usize, sink: &mut Sink) {
        let raw = &self.buf[self.field_start..q];
        if self.field_invalid || self.escapes.is_empty() {
            sink.data.extend_from_slice(raw);
        } else {
            self.escapes.copy_unmarked(raw, sink.data);
        }
        sink.ends.push(sink.data.len());
        if self.field_invalid {
            self.malformed.push(sink.ends.len() - 1);
        }
        self.reset_field(q + skip);
    }

    fn reset_field(&mut self, start: usize) {
        self.field_start = start;
        self.pos = start;
        self.in_escape = false;
        self.field_invalid = false;
        self.escapes.clear();
        self.prev_escape = None;
    }

    /// Close the record whose terminator (`n` bytes) starts at `q`.
    fn end_record(&mut self, q: usize, n: usize, sink: &mut Sink) -> Step {
        if self.skip_blank_lines && sink.ends.is_empty() && q == self.field_start
        {
            self.line += 1;
            self.reset_field(q + n);
            self.next = self.position_at(q + n);
            self.start = self.next.clone();
            return Step::Continue;
        }
        self.end_field(q, n, sink);
        self.line += 1;
        self.record += 1;
        self.next = self.position_at(q + n);
        self.fresh = true;
        Step::Record
    }

    /// Close the final record at the end of input, if there is one.
    ///
    /// Returns false when there was nothing left to close.
    pub fn end_input(&mut self, sink: &mut Sink) -> bool {
        debug_assert!(self.eof && self.pos == self.len);
        if sink.ends.is_empty() && self.field_start == self.len {
            return false;
        }
        let end = self.len;
        self.end_field(end, 0, sink);
        self.record += 1;
        self.next = self.position_at(end);
        self.fresh = true;
        true
    }
}
