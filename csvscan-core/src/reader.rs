use std::cmp;

use crate::dialect::{CsvMode, Dialect, Terminator};
use crate::locator::{Locate, Locator, Strategy, WINDOW};
use crate::mode::{Escape, Machine, NoEscape, Rfc4180};
use crate::state::{ParserState, Position, Sink, Step};
use crate::Error;

/// The default capacity of a parser's input buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * (1 << 10);

/// Builds a CSV parser with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, record terminator
/// and more for parsing CSV. Once a CSV `Parser` is built, its configuration
/// cannot be changed.
#[derive(Clone, Debug)]
pub struct ParserBuilder {
    mode: CsvMode,
    delimiter: Vec<u8>,
    quote: u8,
    escape: u8,
    term: Option<Terminator>,
    skip_blank_lines: Option<bool>,
    capacity: usize,
    strategy: Strategy,
}

impl Default for ParserBuilder {
    fn default() -> ParserBuilder {
        ParserBuilder {
            mode: CsvMode::default(),
            delimiter: vec![b','],
            quote: b'"',
            escape: b'\\',
            term: None,
            skip_blank_lines: None,
            capacity: DEFAULT_BUFFER_CAPACITY,
            strategy: Strategy::Auto,
        }
    }
}

impl ParserBuilder {
    /// Create a new builder.
    pub fn new() -> ParserBuilder {
        ParserBuilder::default()
    }

    /// Build a CSV parser from this configuration.
    ///
    /// # Panics
    ///
    /// This panics if the delimiter's first byte, the quote (or escape, in
    /// escape mode) and the record terminator are not all distinct.
    pub fn build(&self) -> Parser {
        let dialect = self.dialect();
        dialect.check_distinct();
        let locator = Locator::new(dialect.specials(), self.strategy);
        let skip_blank_lines =
            self.skip_blank_lines.unwrap_or(self.mode == CsvMode::Rfc4180);
        Parser {
            dialect,
            locator,
            state: ParserState::new(self.capacity, skip_blank_lines),
        }
    }

    /// Resolve this configuration into a dialect, filling in mode specific
    /// defaults.
    pub fn dialect(&self) -> Dialect {
        let term = match self.term {
            Some(term) => term,
            None if self.mode == CsvMode::Escape => Terminator::Any(b'\n'),
            None => Terminator::CRLF,
        };
        Dialect {
            mode: self.mode,
            delimiter: self.delimiter.clone(),
            quote: self.quote,
            escape: self.escape,
            term,
        }
    }

    /// The dialect mode to use when parsing CSV.
    ///
    /// The default is `CsvMode::Rfc4180`.
    pub fn mode(&mut self, mode: CsvMode) -> &mut ParserBuilder {
        self.mode = mode;
        self
    }

    /// The field delimiter to use when parsing CSV.
    ///
    /// A delimiter may be more than one byte. The default is `b","`.
    ///
    /// # Panics
    ///
    /// This panics if `delimiter` is empty.
    pub fn delimiter(&mut self, delimiter: &[u8]) -> &mut ParserBuilder {
        assert!(!delimiter.is_empty(), "delimiter must not be empty");
        self.delimiter = delimiter.to_vec();
        self
    }

    /// The record terminator to use when parsing CSV.
    ///
    /// A record terminator can be any single byte. The default is a special
    /// value, `Terminator::CRLF`, which treats any occurrence of `\r`, `\n`
    /// or `\r\n` as a single record terminator. In escape mode, the default
    /// is `Terminator::Any(b'\n')`.
    pub fn terminator(&mut self, term: Terminator) -> &mut ParserBuilder {
        self.term = Some(term);
        self
    }

    /// The quote character to use in RFC 4180 mode.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut ParserBuilder {
        self.quote = quote;
        self
    }

    /// The escape character to use in escape mode.
    ///
    /// The default is `b'\\'`.
    pub fn escape(&mut self, escape: u8) -> &mut ParserBuilder {
        self.escape = escape;
        self
    }

    /// Whether to skip lines that contain no data at all.
    ///
    /// When disabled, an empty line is read as a record with a single empty
    /// field. This is enabled by default in RFC 4180 mode, where such a
    /// record is written as `""`. In escape and no-escape modes an empty line
    /// is the only spelling of that record, so it is disabled by default.
    pub fn skip_blank_lines(&mut self, yes: bool) -> &mut ParserBuilder {
        self.skip_blank_lines = Some(yes);
        self
    }

    /// The initial capacity of the input buffer, in bytes.
    ///
    /// The buffer only grows beyond this when a single field doesn't fit.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ParserBuilder {
        self.capacity = capacity;
        self
    }

    /// The strategy used to locate special characters.
    ///
    /// This never changes how data is parsed, only how fast. The default,
    /// `Strategy::Auto`, picks the fastest strategy the CPU supports.
    pub fn strategy(&mut self, strategy: Strategy) -> &mut ParserBuilder {
        self.strategy = strategy;
        self
    }

    /// A convenience method for specifying a configuration to read ASCII
    /// delimited text.
    ///
    /// This sets the delimiter and record terminator to the ASCII unit
    /// separator (`\x1F`) and record separator (`\x1E`), respectively.
    pub fn ascii(&mut self) -> &mut ParserBuilder {
        self.delimiter(b"\x1F").terminator(Terminator::Any(b'\x1E'))
    }
}

/// The result of parsing at most one record from CSV data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadRecordResult {
    /// The buffered input was exhausted before the end of a record was
    /// found. The caller should fill more input using `spare` and
    /// `commit`, and then call `read_record` again with the same output.
    InputEmpty,
    /// The end of a record was found.
    Record,
    /// All CSV data has been read.
    ///
    /// This is only returned after `commit(0)` has signaled the end of
    /// input.
    End,
}

/// A pull based CSV parser.
///
/// A parser owns a buffer of input. Callers fill it from any source with
/// `spare` and `commit`, and extract records with `read_record`:
///
/// ```
/// use csvscan_core::{Parser, ReadRecordResult};
///
/// let mut input: &[u8] = b"a,\"b,c\"\r\nd,e\r\n";
/// let mut parser = Parser::new();
/// let (mut data, mut ends) = (vec![], vec![]);
/// let mut records = vec![];
/// loop {
///     match parser.read_record(&mut data, &mut ends).unwrap() {
///         ReadRecordResult::InputEmpty => {
///             let spare = parser.spare().unwrap();
///             let n = std::cmp::min(spare.len(), input.len());
///             spare[..n].copy_from_slice(&input[..n]);
///             input = &input[n..];
///             parser.commit(n);
///         }
///         ReadRecordResult::Record => {
///             records.push((data.clone(), ends.clone()));
///         }
///         ReadRecordResult::End => break,
///     }
/// }
/// assert_eq!(records[0], (b"ab,c".to_vec(), vec![1, 4]));
/// assert_eq!(records[1], (b"de".to_vec(), vec![1, 2]));
/// ```
///
/// # Errors
///
/// Malformed CSV is never an error. In RFC 4180 mode, a field that breaks
/// the quoting rules is returned literally and its index is reported by
/// `malformed`. Errors only occur if the buffer can't grow, or if an
/// internal invariant is broken.
#[derive(Clone, Debug)]
pub struct Parser {
    dialect: Dialect,
    locator: Locator,
    state: ParserState,
}

impl Default for Parser {
    fn default() -> Parser {
        Parser::new()
    }
}

impl Parser {
    /// Create a new CSV parser with a default configuration.
    pub fn new() -> Parser {
        ParserBuilder::new().build()
    }

    /// The dialect used by this parser.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// The strategy actually used to locate special characters.
    pub fn strategy(&self) -> Strategy {
        self.locator.strategy()
    }

    /// Reset the parser such that it behaves as if it had never been used.
    ///
    /// Any buffered input is discarded.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Return the current line number.
    ///
    /// Lines are counted by record terminators, including those that appear
    /// inside quoted or escaped field data. A `\r\n` pair is one line.
    pub fn line(&self) -> u64 {
        self.state.line()
    }

    /// The position of the start of the next record.
    pub fn position(&self) -> &Position {
        self.state.next_position()
    }

    /// The position of the start of the most recent record.
    pub fn record_position(&self) -> &Position {
        self.state.record_position()
    }

    /// The indices of fields in the most recent record that broke the
    /// quoting rules and were returned literally.
    pub fn malformed(&self) -> &[usize] {
        &self.state.malformed
    }

    /// Returns true once the end of input has been committed.
    pub fn is_done(&self) -> bool {
        self.state.eof
    }

    /// Return a non-empty slice of the input buffer to fill with more data.
    ///
    /// The buffer is compacted if it's full. If the field currently being
    /// read fills the entire buffer, then the buffer's capacity is doubled.
    pub fn spare(&mut self) -> Result<&mut [u8], Error> {
        self.state.spare()
    }

    /// Mark `n` bytes of the slice last returned by `spare` as input.
    ///
    /// Committing `0` bytes signals the end of input.
    ///
    /// # Panics
    ///
    /// This panics if `n` is greater than the length of the last spare
    /// slice.
    pub fn commit(&mut self, n: usize) {
        self.state.commit(n)
    }

    /// Parse buffered input into the next record.
    ///
    /// Field data is written contiguously to `data`, with the end offset of
    /// each field pushed to `ends`. Both are cleared when a new record
    /// starts, so callers must pass the same buffers until `Record` or
    /// `End` is returned.
    pub fn read_record(
        &mut self,
        data: &mut Vec<u8>,
        ends: &mut Vec<usize>,
    ) -> Result<ReadRecordResult, Error> {
        let mut sink = Sink { data, ends };
        self.state.begin(&mut sink);
        match self.dialect.mode {
            CsvMode::Rfc4180 => self.scan::<Rfc4180>(&mut sink),
            CsvMode::Escape => self.scan::<Escape>(&mut sink),
            CsvMode::NoEscape => self.scan::<NoEscape>(&mut sink),
        }
    }

    fn scan<M: Machine>(
        &mut self,
        sink: &mut Sink,
    ) -> Result<ReadRecordResult, Error> {
        let Parser { ref dialect, ref locator, ref mut state } = *self;
        loop {
            if state.pos >= state.len {
                if !state.eof {
                    return Ok(ReadRecordResult::InputEmpty);
                }
                M::finish(state, dialect);
                return Ok(if state.end_input(sink) {
                    ReadRecordResult::Record
                } else {
                    ReadRecordResult::End
                });
            }
            let base = state.pos;
            let end = cmp::min(base + WINDOW, state.len);
            let mut mask = locator.locate(&state.buf[base..end]);
            while mask != 0 {
                let q = base + mask.trailing_zeros() as usize;
                mask &= mask - 1;
                if q < state.pos {
                    continue;
                }
                if state.needs_lookahead(dialect, q) {
                    state.pos = q;
                    return Ok(ReadRecordResult::InputEmpty);
                }
                match M::step(state, dialect, q, sink) {
                    Step::Continue => {}
                    Step::Record => return Ok(ReadRecordResult::Record),
                    Step::Unhandled(byte) => {
                        state.pos = q;
                        let pos = state.position_at(q);
                        return Err(Error::UnhandledSpecial { byte, pos });
                    }
                }
            }
            state.pos = cmp::max(state.pos, end);
        }
    }
}
