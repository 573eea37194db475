use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use csvscan_core::{
    CsvMode, QuoteStyle, Serializer, SerializerBuilder, Terminator,
};

use crate::byte_record::ByteRecord;
use crate::error::{IntoInnerError, Result};
use crate::string_record::StringRecord;

/// A field about to be written, as seen by a quote policy.
#[derive(Clone, Debug)]
pub struct FieldInfo<'a> {
    record: u64,
    index: usize,
    field: &'a [u8],
}

impl<'a> FieldInfo<'a> {
    /// The index of the record being written, starting at `0`.
    pub fn record(&self) -> u64 {
        self.record
    }

    /// The index of the field in its record, starting at `0`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The raw contents of the field.
    pub fn field(&self) -> &'a [u8] {
        self.field
    }
}

type QuotePolicy =
    Arc<dyn Fn(&FieldInfo) -> Option<QuoteStyle> + Send + Sync>;

/// Builds a CSV writer with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, record terminator
/// and more. Once a CSV `Writer` is built, its configuration cannot be
/// changed.
#[derive(Clone)]
pub struct WriterBuilder {
    builder: SerializerBuilder,
    capacity: usize,
    policy: Option<QuotePolicy>,
}

impl fmt::Debug for WriterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WriterBuilder")
            .field("builder", &self.builder)
            .field("capacity", &self.capacity)
            .field("policy", &self.policy.is_some())
            .finish()
    }
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        WriterBuilder {
            builder: SerializerBuilder::default(),
            capacity: 8 * (1 << 10),
            policy: None,
        }
    }
}

impl WriterBuilder {
    /// Create a new builder for configuring CSV writing.
    ///
    /// To convert a builder into a writer, call one of the methods starting
    /// with `from_`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csvscan::WriterBuilder;
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let mut wtr = WriterBuilder::new().from_writer(vec![]);
    ///     wtr.write_record(&["a", "b", "c"])?;
    ///     wtr.write_record(&["x", "y", "z"])?;
    ///
    ///     let data = String::from_utf8(wtr.into_inner()?)?;
    ///     assert_eq!(data, "a,b,c\r\nx,y,z\r\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Build a CSV writer from this configuration that writes data to the
    /// given file path. The file is truncated if it already exists.
    ///
    /// If there was a problem opening the file at the given path, then this
    /// returns the corresponding error.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Writer<File>> {
        Ok(Writer::new(self, File::create(path)?))
    }

    /// Build a CSV writer from this configuration that writes data to `wtr`.
    ///
    /// Note that the CSV writer is buffered automatically, so you should not
    /// wrap `wtr` in a buffered writer like `io::BufWriter`.
    pub fn from_writer<W: io::Write>(&self, wtr: W) -> Writer<W> {
        Writer::new(self, wtr)
    }

    /// The dialect mode to write.
    ///
    /// The default is `CsvMode::Rfc4180`.
    pub fn mode(&mut self, mode: CsvMode) -> &mut WriterBuilder {
        self.builder.mode(mode);
        self
    }

    /// The field delimiter to use when writing CSV.
    ///
    /// The default is `b","`.
    ///
    /// # Panics
    ///
    /// This panics if `delimiter` is empty.
    pub fn delimiter(&mut self, delimiter: &[u8]) -> &mut WriterBuilder {
        self.builder.delimiter(delimiter);
        self
    }

    /// The record terminator to use when writing CSV.
    ///
    /// The default is `Terminator::CRLF`, or `Terminator::Any(b'\n')` in
    /// escape mode.
    pub fn terminator(&mut self, term: Terminator) -> &mut WriterBuilder {
        self.builder.terminator(term);
        self
    }

    /// The quote character to use when writing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut WriterBuilder {
        self.builder.quote(quote);
        self
    }

    /// The escape character to use in escape mode.
    ///
    /// The default is `b'\\'`.
    pub fn escape(&mut self, escape: u8) -> &mut WriterBuilder {
        self.builder.escape(escape);
        self
    }

    /// The quoting style to use when no quote policy overrides it.
    ///
    /// The default is `QuoteStyle::Necessary`.
    pub fn quote_style(&mut self, style: QuoteStyle) -> &mut WriterBuilder {
        self.builder.quote_style(style);
        self
    }

    /// Set the capacity (in bytes) of the internal buffer used in the CSV
    /// writer. This defaults to a reasonable setting.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut WriterBuilder {
        self.capacity = capacity;
        self
    }

    /// Set a policy that picks the quoting style of individual fields.
    ///
    /// The policy is asked before the field is scanned for special bytes.
    /// Returning `Some(style)` writes the field with that style, skipping
    /// the scan when the style is `Always` or `Never`. Returning `None`
    /// falls back to the writer's quoting style.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csvscan::{QuoteStyle, WriterBuilder};
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let mut wtr = WriterBuilder::new()
    ///         .quote_policy(|info| {
    ///             if info.index() == 0 {
    ///                 Some(QuoteStyle::Always)
    ///             } else {
    ///                 None
    ///             }
    ///         })
    ///         .from_writer(vec![]);
    ///     wtr.write_record(&["id", "name"])?;
    ///
    ///     let data = String::from_utf8(wtr.into_inner()?)?;
    ///     assert_eq!(data, "\"id\",name\r\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn quote_policy<F>(&mut self, policy: F) -> &mut WriterBuilder
    where
        F: Fn(&FieldInfo) -> Option<QuoteStyle> + Send + Sync + 'static,
    {
        self.policy = Some(Arc::new(policy));
        self
    }
}

/// A CSV writer.
///
/// The writer buffers its output. The buffer is flushed when it fills up,
/// when `flush` or `into_inner` is called, and when the writer is dropped.
/// Errors from a flush on drop are ignored, so call `flush` explicitly to
/// observe them.
pub struct Writer<W: io::Write> {
    wtr: Option<W>,
    ser: Serializer,
    buf: Vec<u8>,
    capacity: usize,
    policy: Option<QuotePolicy>,
    records: u64,
    panicked: bool,
}

impl<W: io::Write> fmt::Debug for Writer<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Writer")
            .field("ser", &self.ser)
            .field("buffered", &self.buf.len())
            .field("records", &self.records)
            .finish()
    }
}

impl<W: io::Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.wtr.is_some() && !self.panicked {
            let _ = self.flush();
        }
    }
}

impl Writer<File> {
    /// Build a CSV writer with a default configuration that writes data to
    /// the given file path. The file is truncated if it already exists.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Writer<File>> {
        WriterBuilder::new().from_path(path)
    }
}

impl<W: io::Write> Writer<W> {
    fn new(builder: &WriterBuilder, wtr: W) -> Writer<W> {
        Writer {
            wtr: Some(wtr),
            ser: builder.builder.build(),
            buf: Vec::with_capacity(builder.capacity),
            capacity: builder.capacity.max(1),
            policy: builder.policy.clone(),
            records: 0,
            panicked: false,
        }
    }

    /// Build a CSV writer with a default configuration that writes data to
    /// `wtr`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csvscan::Writer;
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let mut wtr = Writer::from_writer(vec![]);
    ///     wtr.write_record(&["he said \"hi\"", "ok"])?;
    ///
    ///     let data = String::from_utf8(wtr.into_inner()?)?;
    ///     assert_eq!(data, "\"he said \"\"hi\"\"\",ok\r\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn from_writer(wtr: W) -> Writer<W> {
        WriterBuilder::new().from_writer(wtr)
    }

    /// Write a single record.
    ///
    /// A record is any iterator of fields that can be viewed as bytes. A
    /// record with no fields writes only a terminator.
    pub fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for field in record {
            self.write_field(field)?;
        }
        self.write_terminator()
    }

    /// Write a single `ByteRecord`.
    pub fn write_byte_record(&mut self, record: &ByteRecord) -> Result<()> {
        self.write_record(record.iter())
    }

    /// Write a single `StringRecord`.
    pub fn write_string_record(&mut self, record: &StringRecord) -> Result<()> {
        self.write_byte_record(record.as_byte_record())
    }

    /// Write a single field to the current record.
    ///
    /// Fields are separated by the delimiter automatically. Call
    /// `write_record` with an empty iterator to end the record.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csvscan::Writer;
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let mut wtr = Writer::from_writer(vec![]);
    ///     wtr.write_field("a")?;
    ///     wtr.write_field("b,c")?;
    ///     wtr.write_record(None::<&[u8]>)?;
    ///
    ///     let data = String::from_utf8(wtr.into_inner()?)?;
    ///     assert_eq!(data, "a,\"b,c\"\r\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn write_field<T: AsRef<[u8]>>(&mut self, field: T) -> Result<()> {
        let field = field.as_ref();
        let style = match self.policy {
            None => self.ser.quote_style(),
            Some(ref policy) => {
                let info = FieldInfo {
                    record: self.records,
                    index: self.ser.fields_in_record(),
                    field,
                };
                policy(&info).unwrap_or_else(|| self.ser.quote_style())
            }
        };
        self.ser.write_field_with(field, style, &mut self.buf);
        self.maybe_flush()
    }

    fn write_terminator(&mut self) -> Result<()> {
        self.ser.write_terminator(&mut self.buf);
        self.records += 1;
        self.maybe_flush()
    }

    /// The number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flush the contents of the internal buffer to the underlying writer.
    ///
    /// If there was a problem writing to the underlying writer, then an
    /// error is returned.
    pub fn flush(&mut self) -> io::Result<()> {
        self.flush_buf()?;
        self.get_mut().flush()
    }

    /// Flush the contents of the internal buffer and return the underlying
    /// writer.
    pub fn into_inner(
        mut self,
    ) -> std::result::Result<W, IntoInnerError<Writer<W>>> {
        match self.flush() {
            Ok(()) => Ok(self.wtr.take().unwrap()),
            Err(err) => Err(IntoInnerError::new(self, err)),
        }
    }

    /// Return a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.wtr.as_ref().unwrap()
    }

    fn get_mut(&mut self) -> &mut W {
        self.wtr.as_mut().unwrap()
    }

    fn maybe_flush(&mut self) -> Result<()> {
        if self.buf.len() >= self.capacity {
            self.flush_buf()?;
        }
        Ok(())
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        self.panicked = true;
        let wtr = self.wtr.as_mut().unwrap();
        let result = wtr.write_all(&self.buf);
        self.panicked = false;
        result?;
        self.buf.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use csvscan_core::{CsvMode, QuoteStyle, Terminator};

    use crate::byte_record::ByteRecord;
    use crate::error::Error;
    use crate::string_record::StringRecord;

    use super::{Writer, WriterBuilder};

    fn wtr_as_string(wtr: Writer<Vec<u8>>) -> String {
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn one_record() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&["a", "b", "c"]).unwrap();
        assert_eq!(wtr_as_string(wtr), "a,b,c\r\n");
    }

    #[test]
    fn doubles_quotes() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&["he said \"hi\""]).unwrap();
        assert_eq!(wtr_as_string(wtr), "\"he said \"\"hi\"\"\"\r\n");
    }

    #[test]
    fn one_empty_record() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&[""]).unwrap();
        assert_eq!(wtr_as_string(wtr), "\"\"\r\n");
    }

    #[test]
    fn two_empty_records() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&[""]).unwrap();
        wtr.write_record(&[""]).unwrap();
        assert_eq!(wtr_as_string(wtr), "\"\"\r\n\"\"\r\n");
    }

    #[test]
    fn byte_and_string_records() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_byte_record(&ByteRecord::from(vec!["a", "b,c"])).unwrap();
        wtr.write_string_record(&StringRecord::from(vec!["x", "y"]))
            .unwrap();
        assert_eq!(wtr.records_written(), 2);
        assert_eq!(wtr_as_string(wtr), "a,\"b,c\"\r\nx,y\r\n");
    }

    #[test]
    fn field_by_field() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_field("a").unwrap();
        wtr.write_field("b").unwrap();
        wtr.write_record(None::<&[u8]>).unwrap();
        wtr.write_field("c").unwrap();
        wtr.write_record(None::<&[u8]>).unwrap();
        assert_eq!(wtr_as_string(wtr), "a,b\r\nc\r\n");
    }

    #[test]
    fn escape_mode() {
        let mut wtr =
            WriterBuilder::new().mode(CsvMode::Escape).from_writer(vec![]);
        wtr.write_record(&["a,b", "c\\d", "e"]).unwrap();
        assert_eq!(wtr_as_string(wtr), "a\\,b,c\\\\d,e\n");
    }

    #[test]
    fn no_escape_mode_is_raw() {
        let mut wtr =
            WriterBuilder::new().mode(CsvMode::NoEscape).from_writer(vec![]);
        wtr.write_record(&["a\"b", "c"]).unwrap();
        assert_eq!(wtr_as_string(wtr), "a\"b,c\r\n");
    }

    #[test]
    fn multi_byte_delimiter_and_terminator() {
        let mut wtr = WriterBuilder::new()
            .delimiter(b"::")
            .terminator(Terminator::Any(b'\n'))
            .from_writer(vec![]);
        wtr.write_record(&["a", "b:c", "d::e"]).unwrap();
        // Only the first byte of the delimiter is special.
        assert_eq!(wtr_as_string(wtr), "a::\"b:c\"::\"d::e\"\n");
    }

    #[test]
    fn quote_always() {
        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(vec![]);
        wtr.write_record(&["a", ""]).unwrap();
        assert_eq!(wtr_as_string(wtr), "\"a\",\"\"\r\n");
    }

    #[test]
    fn policy_overrides_style() {
        let mut wtr = WriterBuilder::new()
            .quote_policy(|info| match info.index() {
                0 => Some(QuoteStyle::Always),
                1 => Some(QuoteStyle::Never),
                _ => None,
            })
            .from_writer(vec![]);
        wtr.write_record(&["a", "b,c", "d,e"]).unwrap();
        wtr.write_record(&["f", "g", "h"]).unwrap();
        assert_eq!(
            wtr_as_string(wtr),
            "\"a\",b,c,\"d,e\"\r\n\"f\",g,h\r\n"
        );
    }

    #[test]
    fn policy_sees_record_index() {
        let mut wtr = WriterBuilder::new()
            .quote_policy(|info| {
                if info.record() == 1 && info.field() == b"x" {
                    Some(QuoteStyle::Always)
                } else {
                    None
                }
            })
            .from_writer(vec![]);
        wtr.write_record(&["x"]).unwrap();
        wtr.write_record(&["x"]).unwrap();
        assert_eq!(wtr_as_string(wtr), "x\r\n\"x\"\r\n");
    }

    #[test]
    fn small_buffer_flushes_early() {
        let mut wtr =
            WriterBuilder::new().buffer_capacity(2).from_writer(vec![]);
        wtr.write_record(&["abc", "def"]).unwrap();
        assert_eq!(wtr.get_ref().as_slice(), b"abc,def\r\n");
    }

    #[test]
    fn drop_flushes() {
        let mut out = vec![];
        {
            let mut wtr = Writer::from_writer(&mut out);
            wtr.write_record(&["a"]).unwrap();
        }
        assert_eq!(out, b"a\r\n");
    }

    #[derive(Debug)]
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "sink is broken"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_surface() {
        let mut wtr =
            WriterBuilder::new().buffer_capacity(1).from_writer(Broken);
        match wtr.write_record(&["a"]) {
            Err(Error::Io(ref err)) => {
                assert_eq!(err.to_string(), "sink is broken")
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn into_inner_returns_writer_on_error() {
        let mut wtr = Writer::from_writer(Broken);
        wtr.write_record(&["a"]).unwrap();
        let err = wtr.into_inner().unwrap_err();
        assert_eq!(err.error().to_string(), "sink is broken");
        let wtr = err.into_inner();
        assert_eq!(wtr.records_written(), 1);
    }
}
