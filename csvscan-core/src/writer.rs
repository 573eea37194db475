use memchr::memchr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dialect::{CsvMode, Dialect, Specials, Terminator};

/// The quoting style to use when writing CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum QuoteStyle {
    /// This puts quotes around every field. Always.
    ///
    /// In escape mode, this behaves like `Necessary`.
    Always,
    /// This puts quotes around fields only when necessary.
    ///
    /// They are necessary when fields contain a quote, delimiter or record
    /// terminator. In escape mode, each of those bytes is preceded by the
    /// escape byte instead.
    ///
    /// This is the default.
    Necessary,
    /// This *never* writes quotes or escapes.
    ///
    /// Fields are written as is, even if the result can't be read back.
    Never,
}

impl Default for QuoteStyle {
    fn default() -> QuoteStyle {
        QuoteStyle::Necessary
    }
}

/// A builder for configuring a CSV serializer.
///
/// This builder permits specifying the CSV delimiter, terminator, quoting
/// style and more.
#[derive(Clone, Debug)]
pub struct SerializerBuilder {
    mode: CsvMode,
    delimiter: Vec<u8>,
    quote: u8,
    escape: u8,
    term: Option<Terminator>,
    style: QuoteStyle,
}

impl Default for SerializerBuilder {
    fn default() -> SerializerBuilder {
        SerializerBuilder {
            mode: CsvMode::default(),
            delimiter: vec![b','],
            quote: b'"',
            escape: b'\\',
            term: None,
            style: QuoteStyle::default(),
        }
    }
}

impl SerializerBuilder {
    /// Create a new builder for configuring a CSV serializer.
    pub fn new() -> SerializerBuilder {
        SerializerBuilder::default()
    }

    /// Build a CSV serializer from this configuration.
    ///
    /// # Panics
    ///
    /// This panics if the delimiter's first byte, the quote (or escape, in
    /// escape mode) and the record terminator are not all distinct.
    pub fn build(&self) -> Serializer {
        let term = match self.term {
            Some(term) => term,
            None if self.mode == CsvMode::Escape => Terminator::Any(b'\n'),
            None => Terminator::CRLF,
        };
        let dialect = Dialect {
            mode: self.mode,
            delimiter: self.delimiter.clone(),
            quote: self.quote,
            escape: self.escape,
            term,
        };
        dialect.check_distinct();
        Serializer {
            specials: dialect.specials(),
            dialect,
            style: self.style,
            fields: 0,
            last_empty: false,
        }
    }

    /// The dialect mode to write.
    ///
    /// The default is `CsvMode::Rfc4180`.
    pub fn mode(&mut self, mode: CsvMode) -> &mut SerializerBuilder {
        self.mode = mode;
        self
    }

    /// The field delimiter to use when writing CSV.
    ///
    /// The default is `b","`.
    ///
    /// # Panics
    ///
    /// This panics if `delimiter` is empty.
    pub fn delimiter(&mut self, delimiter: &[u8]) -> &mut SerializerBuilder {
        assert!(!delimiter.is_empty(), "delimiter must not be empty");
        self.delimiter = delimiter.to_vec();
        self
    }

    /// The record terminator to use when writing CSV.
    ///
    /// `Terminator::CRLF` writes `\r\n`. This is the default, except in
    /// escape mode where the default is `Terminator::Any(b'\n')`.
    pub fn terminator(&mut self, term: Terminator) -> &mut SerializerBuilder {
        self.term = Some(term);
        self
    }

    /// The quoting style to use when writing CSV.
    ///
    /// By default, this is set to `QuoteStyle::Necessary`, which will only
    /// use quotes when they are necessary to preserve the integrity of data.
    pub fn quote_style(&mut self, style: QuoteStyle) -> &mut SerializerBuilder {
        self.style = style;
        self
    }

    /// The quote character to use when writing CSV.
    ///
    /// The default value is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut SerializerBuilder {
        self.quote = quote;
        self
    }

    /// The escape character to use in escape mode.
    ///
    /// The default value is `b'\\'`.
    pub fn escape(&mut self, escape: u8) -> &mut SerializerBuilder {
        self.escape = escape;
        self
    }
}

/// A serializer for CSV data.
///
/// A serializer appends delimiters, escaped fields and record terminators
/// to a caller provided buffer. It does no I/O.
///
/// # RFC 4180
///
/// This serializer conforms to RFC 4180 with one exception: it doesn't
/// guarantee that all records written are of the same length. Instead, the
/// onus is on the caller to ensure that all records written are of the
/// same length.
#[derive(Clone, Debug)]
pub struct Serializer {
    dialect: Dialect,
    specials: Specials,
    style: QuoteStyle,
    fields: usize,
    last_empty: bool,
}

impl Default for Serializer {
    fn default() -> Serializer {
        Serializer::new()
    }
}

impl Serializer {
    /// Creates a new CSV serializer with the default configuration.
    pub fn new() -> Serializer {
        SerializerBuilder::new().build()
    }

    /// The dialect written by this serializer.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// The default quoting style of this serializer.
    pub fn quote_style(&self) -> QuoteStyle {
        self.style
    }

    /// The number of fields written to the current record so far.
    pub fn fields_in_record(&self) -> usize {
        self.fields
    }

    /// Returns true if `field` contains any byte that would need quoting
    /// or escaping to survive a round trip.
    pub fn is_special(&self, field: &[u8]) -> bool {
        field.iter().any(|&b| self.specials.contains(b))
    }

    /// Write a single field with the default quoting style.
    pub fn write_field(&mut self, field: &[u8], out: &mut Vec<u8>) {
        let style = self.style;
        self.write_field_with(field, style, out);
    }

    /// Write a single field with the given quoting style.
    ///
    /// A delimiter is written first unless this is the first field of the
    /// record.
    pub fn write_field_with(
        &mut self,
        field: &[u8],
        style: QuoteStyle,
        out: &mut Vec<u8>,
    ) {
        if self.fields > 0 {
            out.extend_from_slice(&self.dialect.delimiter);
        }
        self.fields += 1;
        self.last_empty = field.is_empty();
        match (self.dialect.mode, style) {
            (_, QuoteStyle::Never) | (CsvMode::NoEscape, _) => {
                out.extend_from_slice(field);
            }
            (CsvMode::Rfc4180, QuoteStyle::Always) => self.quote(field, out),
            (CsvMode::Rfc4180, QuoteStyle::Necessary) => {
                if self.is_special(field) {
                    self.quote(field, out);
                } else {
                    out.extend_from_slice(field);
                }
            }
            (CsvMode::Escape, _) => self.escape(field, out),
        }
    }

    /// Write a record terminator and start a new record.
    ///
    /// In RFC 4180 mode, a record with a single empty field is written as
    /// `""` so that it isn't read back as a blank line.
    pub fn write_terminator(&mut self, out: &mut Vec<u8>) {
        if self.dialect.mode == CsvMode::Rfc4180
            && self.fields == 1
            && self.last_empty
            && self.style != QuoteStyle::Never
        {
            out.push(self.dialect.quote);
            out.push(self.dialect.quote);
        }
        match self.dialect.term {
            Terminator::CRLF => out.extend_from_slice(b"\r\n"),
            Terminator::Any(b) => out.push(b),
        }
        self.fields = 0;
        self.last_empty = false;
    }

    /// Write a complete record.
    pub fn write_record<I, T>(&mut self, record: I, out: &mut Vec<u8>)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for field in record {
            self.write_field(field.as_ref(), out);
        }
        self.write_terminator(out);
    }

    fn quote(&self, mut field: &[u8], out: &mut Vec<u8>) {
        let quote = self.dialect.quote;
        out.push(quote);
        while let Some(i) = memchr(quote, field) {
            out.extend_from_slice(&field[..i + 1]);
            out.push(quote);
            field = &field[i + 1..];
        }
        out.extend_from_slice(field);
        out.push(quote);
    }

    fn escape(&self, field: &[u8], out: &mut Vec<u8>) {
        let mut start = 0;
        for (i, &b) in field.iter().enumerate() {
            if self.specials.contains(b) {
                out.extend_from_slice(&field[start..i]);
                out.push(self.dialect.escape);
                out.push(b);
                start = i + 1;
            }
        }
        out.extend_from_slice(&field[start..]);
    }
}
