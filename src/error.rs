use std::collections::TryReserveError;
use std::error;
use std::fmt;
use std::io;
use std::result;

use bstr::ByteSlice;

use crate::byte_record::{ByteRecord, Position};

/// A type alias for `Result<T, csvscan::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when processing CSV data.
///
/// This error can happen when writing or reading CSV data.
///
/// Note that malformed quoting is not an error by default. Such fields are
/// returned literally unless an observer set with
/// `ReaderBuilder::on_malformed` asks to abort.
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading or writing CSV data.
    Io(io::Error),
    /// A UTF-8 decoding error that occured while reading CSV data into Rust
    /// `String`s.
    Utf8 {
        /// The position of the record in which this error occurred, if
        /// available.
        pos: Option<Position>,
        /// The corresponding UTF-8 error.
        err: Utf8Error,
    },
    /// A field was requested that the current record doesn't have.
    MissingField {
        /// The position of the record, if one has been read.
        pos: Option<Position>,
        /// The field that was requested.
        field: FieldRef,
        /// The number of fields in the record.
        len: usize,
    },
    /// A field broke the RFC 4180 quoting rules and the malformed data
    /// observer asked to stop reading.
    Malformed {
        /// The position of the record containing the field.
        pos: Position,
        /// The index of the field in its record.
        field: usize,
        /// The literal text of the field.
        raw: Vec<u8>,
    },
    /// The tokenizer was asked to interpret a byte that has no meaning in
    /// its dialect. This indicates a bug.
    UnhandledSpecial {
        /// Where the byte was found.
        pos: Position,
        /// The byte.
        byte: u8,
    },
    /// Growing the input buffer to hold a single large field failed.
    BufferGrowth(TryReserveError),
    /// A single field is too large for any buffer.
    BufferFull {
        /// The capacity of the buffer when growth was attempted.
        capacity: usize,
    },
    /// A field was looked up by name, but the reader has no header row.
    NoHeaders,
}

/// A reference to a field, by index or by header name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldRef {
    /// A field index, starting at `0`.
    Index(usize),
    /// A header name. When a name appears more than once in the header row,
    /// `nth` picks among the duplicates.
    Name {
        /// The header name.
        name: Vec<u8>,
        /// Which occurrence of the name, starting at `0`.
        nth: usize,
    },
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FieldRef::Index(i) => write!(f, "index {}", i),
            FieldRef::Name { ref name, nth: 0 } => {
                write!(f, "name {:?}", name.as_bstr())
            }
            FieldRef::Name { ref name, nth } => {
                write!(f, "name {:?} (occurrence {})", name.as_bstr(), nth)
            }
        }
    }
}

impl Error {
    /// Returns true if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        match *self {
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// The position at which this error occurred, if known.
    pub fn position(&self) -> Option<&Position> {
        match *self {
            Error::Utf8 { ref pos, .. } | Error::MissingField { ref pos, .. } => {
                pos.as_ref()
            }
            Error::Malformed { ref pos, .. }
            | Error::UnhandledSpecial { ref pos, .. } => Some(pos),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<csvscan_core::Error> for Error {
    fn from(err: csvscan_core::Error) -> Error {
        match err {
            csvscan_core::Error::UnhandledSpecial { byte, pos } => {
                Error::UnhandledSpecial { pos, byte }
            }
            csvscan_core::Error::BufferGrowth(err) => Error::BufferGrowth(err),
            csvscan_core::Error::BufferFull { capacity } => {
                Error::BufferFull { capacity }
            }
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(err) => err,
            err => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Utf8 { ref err, .. } => Some(err),
            Error::BufferGrowth(ref err) => Some(err),
            Error::MissingField { .. }
            | Error::Malformed { .. }
            | Error::UnhandledSpecial { .. }
            | Error::BufferFull { .. }
            | Error::NoHeaders => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            Error::Utf8 { pos: None, ref err } => {
                write!(f, "CSV parse error: field {}: {}", err.field(), err)
            }
            Error::Utf8 { pos: Some(ref pos), ref err } => write!(
                f,
                "CSV parse error: record {} \
                 (byte {}, line {}, field: {}): {}",
                pos.record(),
                pos.byte(),
                pos.line(),
                err.field(),
                err
            ),
            Error::MissingField { pos: None, ref field, len } => write!(
                f,
                "CSV error: no field with {} (record has {} fields)",
                field, len
            ),
            Error::MissingField { pos: Some(ref pos), ref field, len } => {
                write!(
                    f,
                    "CSV error: record {} (byte {}, line {}): \
                     no field with {} (record has {} fields)",
                    pos.record(),
                    pos.byte(),
                    pos.line(),
                    field,
                    len
                )
            }
            Error::Malformed { ref pos, field, ref raw } => write!(
                f,
                "CSV parse error: record {} (byte {}, line {}, field: {}): \
                 malformed quoting in {:?}",
                pos.record(),
                pos.byte(),
                pos.line(),
                field,
                raw.as_bstr()
            ),
            Error::UnhandledSpecial { ref pos, byte } => write!(
                f,
                "CSV parse error: record {} (byte {}, line {}): \
                 unhandled special byte 0x{:02X}",
                pos.record(),
                pos.byte(),
                pos.line(),
                byte
            ),
            Error::BufferGrowth(ref err) => {
                write!(f, "CSV buffer error: failed to grow buffer: {}", err)
            }
            Error::BufferFull { capacity } => write!(
                f,
                "CSV buffer error: field does not fit in a buffer of {} bytes",
                capacity
            ),
            Error::NoHeaders => write!(
                f,
                "CSV error: cannot look up fields by name when the reader \
                 has no header row"
            ),
        }
    }
}

/// A UTF-8 validation error that occurs when attempting to convert a
/// `ByteRecord` into a `StringRecord`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FromUtf8Error {
    record: ByteRecord,
    err: Utf8Error,
}

impl FromUtf8Error {
    pub(crate) fn new(rec: ByteRecord, err: Utf8Error) -> FromUtf8Error {
        FromUtf8Error { record: rec, err }
    }

    /// Access the underlying `ByteRecord` that failed UTF-8 validation.
    pub fn into_byte_record(self) -> ByteRecord {
        self.record
    }

    /// Access the underlying UTF-8 validation error.
    pub fn utf8_error(&self) -> &Utf8Error {
        &self.err
    }
}

impl fmt::Display for FromUtf8Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl error::Error for FromUtf8Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.err)
    }
}

/// A UTF-8 validation error.
///
/// The error includes the index of the field that failed validation, and the
/// last byte at which valid UTF-8 was verified.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Utf8Error {
    /// The field index of a byte record in which UTF-8 validation failed.
    field: usize,
    /// The index into the given field up to which valid UTF-8 was verified.
    valid_up_to: usize,
}

impl Utf8Error {
    pub(crate) fn new(field: usize, valid_up_to: usize) -> Utf8Error {
        Utf8Error { field, valid_up_to }
    }

    /// The field index of a byte record in which UTF-8 validation failed.
    pub fn field(&self) -> usize {
        self.field
    }

    /// The index into the given field up to which valid UTF-8 was verified.
    pub fn valid_up_to(&self) -> usize {
        self.valid_up_to
    }
}

impl fmt::Display for Utf8Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid utf-8: invalid UTF-8 in field {} near byte index {}",
            self.field, self.valid_up_to
        )
    }
}

impl error::Error for Utf8Error {}

/// `IntoInnerError` occurs when consuming a `Writer` fails.
///
/// Consuming the `Writer` causes a flush to happen. If the flush fails, then
/// this error is returned, which contains both the original `Writer` and
/// the error that occurred.
///
/// The type parameter `W` is the unconsumed writer.
pub struct IntoInnerError<W> {
    wtr: W,
    err: io::Error,
}

impl<W> IntoInnerError<W> {
    pub(crate) fn new(wtr: W, err: io::Error) -> IntoInnerError<W> {
        IntoInnerError { wtr, err }
    }

    /// Returns the error which caused the call to `into_inner` to fail.
    pub fn error(&self) -> &io::Error {
        &self.err
    }

    /// Returns the underlying writer which generated the error.
    pub fn into_inner(self) -> W {
        self.wtr
    }
}

impl<W: std::any::Any> error::Error for IntoInnerError<W> {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.err)
    }
}

impl<W> fmt::Display for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl<W> fmt::Debug for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.err.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::{Error, FieldRef};
    use crate::byte_record::Position;

    #[test]
    fn missing_field_message() {
        let mut pos = Position::new();
        pos.set_byte(10).set_line(3).set_record(2);
        let err = Error::MissingField {
            pos: Some(pos),
            field: FieldRef::Name { name: b"city".to_vec(), nth: 1 },
            len: 2,
        };
        assert_eq!(
            err.to_string(),
            "CSV error: record 2 (byte 10, line 3): no field with \
             name \"city\" (occurrence 1) (record has 2 fields)"
        );
        assert_eq!(err.position().map(|p| p.line()), Some(3));
    }

    #[test]
    fn core_errors_convert() {
        let err: Error =
            csvscan_core::Error::BufferFull { capacity: 8 }.into();
        match err {
            Error::BufferFull { capacity: 8 } => {}
            err => panic!("unexpected error: {:?}", err),
        }
    }

    #[test]
    fn io_round_trip() {
        let err = Error::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(err.is_io_error());
        let err: io::Error = err.into();
        assert_eq!(err.to_string(), "boom");

        let err: io::Error = Error::NoHeaders.into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
