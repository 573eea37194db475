use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The dialect rules used to tokenize (and write) CSV data.
///
/// A mode is chosen once per parser or serializer and never changes while
/// it is in use.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CsvMode {
    /// Quote delimited fields per RFC 4180, where a quote inside a quoted
    /// field is written as two quotes.
    ///
    /// This is the default.
    Rfc4180,
    /// No quoting. Instead, every special character inside a field is
    /// preceded by the escape character (`\` by default).
    Escape,
    /// No protection of special characters at all. Every delimiter and
    /// record terminator ends a field.
    NoEscape,
}

impl Default for CsvMode {
    fn default() -> CsvMode {
        CsvMode::Rfc4180
    }
}

/// A record terminator.
///
/// Use this specify the record terminator while parsing CSV. The default is
/// CRLF, which treats `\r`, `\n` or `\r\n` as a single record terminator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Terminator {
    /// Parses `\r`, `\n` or `\r\n` as a single record terminator.
    CRLF,
    /// Parses the byte given as a record terminator.
    Any(u8),
}

impl Terminator {
    /// Returns true if and only if this is the CRLF terminator.
    pub fn is_crlf(&self) -> bool {
        match *self {
            Terminator::CRLF => true,
            Terminator::Any(_) => false,
        }
    }
}

impl Default for Terminator {
    fn default() -> Terminator {
        Terminator::CRLF
    }
}

impl PartialEq<u8> for Terminator {
    #[inline]
    fn eq(&self, &other: &u8) -> bool {
        match *self {
            Terminator::CRLF => other == b'\r' || other == b'\n',
            Terminator::Any(b) => other == b,
        }
    }
}

/// The maximum number of distinct special bytes in any dialect.
///
/// That is, a delimiter lead byte, a quote or escape byte and up to two
/// record terminator bytes.
pub const MAX_SPECIALS: usize = 4;

/// A fully resolved dialect.
///
/// Parsers and serializers are built from one of these. Builders fill in
/// mode specific defaults (for example, the record terminator in escape
/// mode) before a `Dialect` is produced, so every field here is final.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Dialect {
    pub(crate) mode: CsvMode,
    pub(crate) delimiter: Vec<u8>,
    pub(crate) quote: u8,
    pub(crate) escape: u8,
    pub(crate) term: Terminator,
}

impl Default for Dialect {
    fn default() -> Dialect {
        Dialect {
            mode: CsvMode::Rfc4180,
            delimiter: vec![b','],
            quote: b'"',
            escape: b'\\',
            term: Terminator::CRLF,
        }
    }
}

impl Dialect {
    /// The mode of this dialect.
    pub fn mode(&self) -> CsvMode {
        self.mode
    }

    /// The field delimiter. This is never empty.
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// The record terminator.
    pub fn terminator(&self) -> Terminator {
        self.term
    }

    /// The byte that protects special characters in the active mode.
    ///
    /// In RFC 4180 mode this is the quote. In escape mode this is the
    /// escape byte. In no-escape mode there is no such byte, and `None` is
    /// returned.
    pub fn escape_byte(&self) -> Option<u8> {
        match self.mode {
            CsvMode::Rfc4180 => Some(self.quote),
            CsvMode::Escape => Some(self.escape),
            CsvMode::NoEscape => None,
        }
    }

    /// Panics if two roles in this dialect share a byte.
    ///
    /// The delimiter's lead byte, the quote or escape byte of the active
    /// mode and the record terminator byte(s) must all be distinct.
    pub(crate) fn check_distinct(&self) {
        let lead = self.delimiter[0];
        assert!(
            self.term != lead,
            "delimiter and record terminator share byte 0x{:02X}",
            lead
        );
        if let Some(b) = self.escape_byte() {
            let role = match self.mode {
                CsvMode::Escape => "escape",
                _ => "quote",
            };
            assert!(
                lead != b,
                "delimiter and {} share byte 0x{:02X}",
                role,
                b
            );
            assert!(
                self.term != b,
                "{} and record terminator share byte 0x{:02X}",
                role,
                b
            );
        }
    }

    /// Returns the set of bytes with parsing significance in this dialect.
    pub fn specials(&self) -> Specials {
        let mut set = Specials::empty();
        set.add(self.delimiter[0]);
        if let Some(b) = self.escape_byte() {
            set.add(b);
        }
        match self.term {
            Terminator::CRLF => {
                set.add(b'\r');
                set.add(b'\n');
            }
            Terminator::Any(b) => set.add(b),
        }
        set
    }

    /// Returns true when the full delimiter starts at `input[0]`.
    ///
    /// If `input` is a strict prefix of the delimiter, then `None` is
    /// returned since more input is needed to decide.
    #[inline]
    pub(crate) fn delimiter_at(&self, input: &[u8]) -> Option<bool> {
        let d = &*self.delimiter;
        if input.len() >= d.len() {
            Some(&input[..d.len()] == d)
        } else if d.starts_with(input) {
            None
        } else {
            Some(false)
        }
    }
}

/// A small set of bytes that have significance for a dialect.
///
/// This is the set a `Locate` implementation searches for. It always
/// contains the delimiter's first byte and the record terminator byte(s).
/// In RFC 4180 and escape modes, it also contains the quote or escape byte.
#[derive(Clone, Copy)]
pub struct Specials {
    bytes: [u8; MAX_SPECIALS],
    len: usize,
    table: [bool; 256],
}

impl Specials {
    fn empty() -> Specials {
        Specials { bytes: [0; MAX_SPECIALS], len: 0, table: [false; 256] }
    }

    fn add(&mut self, b: u8) {
        if self.table[b as usize] {
            return;
        }
        self.table[b as usize] = true;
        self.bytes[self.len] = b;
        self.len += 1;
    }

    /// The distinct bytes in this set.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Returns true if and only if `b` is in this set.
    #[inline]
    pub fn contains(&self, b: u8) -> bool {
        self.table[b as usize]
    }
}

impl fmt::Debug for Specials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Specials").field(&self.as_bytes()).finish()
    }
}
