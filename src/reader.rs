use std::fmt;
use std::fs::File;
use std::io;
use std::mem;
use std::path::Path;
use std::sync::Arc;

use csvscan_core::{
    CsvMode, Parser, ParserBuilder, ReadRecordResult, Strategy, Terminator,
};

use crate::byte_record::{ByteRecord, Position};
use crate::error::{Error, FieldRef, Result};
use crate::headers::{HeaderIndex, Headers};
use crate::string_record::StringRecord;

/// A field that broke the RFC 4180 quoting rules.
///
/// This is what a malformed data observer sees. The field has already been
/// read literally, quotes included.
#[derive(Clone, Debug)]
pub struct MalformedField<'a> {
    pos: &'a Position,
    field: usize,
    raw: &'a [u8],
}

impl<'a> MalformedField<'a> {
    /// The position of the record containing the field.
    pub fn position(&self) -> &'a Position {
        self.pos
    }

    /// The index of the field in its record.
    pub fn field(&self) -> usize {
        self.field
    }

    /// The literal text of the field.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }
}

/// What to do after a malformed field has been observed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MalformedAction {
    /// Keep the literal reading of the field and continue.
    Accept,
    /// Stop and return `Error::Malformed` for the record.
    Abort,
}

type Observer = Arc<dyn Fn(&MalformedField) -> MalformedAction + Send + Sync>;

/// Builds a CSV reader with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, record terminator
/// and more. Once a CSV `Reader` is built, its configuration cannot be
/// changed.
#[derive(Clone)]
pub struct ReaderBuilder {
    parser: ParserBuilder,
    has_headers: bool,
    observer: Option<Observer>,
}

impl fmt::Debug for ReaderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReaderBuilder")
            .field("parser", &self.parser)
            .field("has_headers", &self.has_headers)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder {
            parser: ParserBuilder::default(),
            has_headers: true,
            observer: None,
        }
    }
}

impl ReaderBuilder {
    /// Create a new builder for configuring CSV parsing.
    ///
    /// To convert a builder into a reader, call one of the methods starting
    /// with `from_`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csvscan::{ReaderBuilder, StringRecord};
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let data = "\
    /// city,country,pop
    /// Boston,United States,4628910
    /// Concord,United States,42695
    /// ";
    ///     let mut rdr = ReaderBuilder::new().from_reader(data.as_bytes());
    ///
    ///     let records = rdr
    ///         .records()
    ///         .collect::<Result<Vec<StringRecord>, csvscan::Error>>()?;
    ///     assert_eq!(records, vec![
    ///         vec!["Boston", "United States", "4628910"],
    ///         vec!["Concord", "United States", "42695"],
    ///     ]);
    ///     Ok(())
    /// }
    /// ```
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV parser from this configuration that reads data from the
    /// given file path.
    ///
    /// If there was a problem opening the file at the given path, then this
    /// returns the corresponding error.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Reader<File>> {
        Ok(Reader::new(self, File::open(path)?))
    }

    /// Build a CSV parser from this configuration that reads data from `rdr`.
    ///
    /// Note that the CSV reader is buffered automatically, so you should not
    /// wrap `rdr` in a buffered reader like `io::BufReader`.
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Reader<R> {
        Reader::new(self, rdr)
    }

    /// The dialect mode to use when parsing CSV.
    ///
    /// The default is `CsvMode::Rfc4180`.
    pub fn mode(&mut self, mode: CsvMode) -> &mut ReaderBuilder {
        self.parser.mode(mode);
        self
    }

    /// The field delimiter to use when parsing CSV.
    ///
    /// The delimiter may be more than one byte. The default is `b","`.
    pub fn delimiter(&mut self, delimiter: &[u8]) -> &mut ReaderBuilder {
        self.parser.delimiter(delimiter);
        self
    }

    /// Whether to treat the first row as a special header row.
    ///
    /// By default, the first row is treated as a special header row, which
    /// means the header is never returned by any of the record reading
    /// methods or iterators. When this is disabled (`yes` set to `false`),
    /// the first row is not treated specially, and fields can't be looked
    /// up by name.
    pub fn has_headers(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.has_headers = yes;
        self
    }

    /// The record terminator to use when parsing CSV.
    ///
    /// The default is `Terminator::CRLF`, or `Terminator::Any(b'\n')` in
    /// escape mode.
    pub fn terminator(&mut self, term: Terminator) -> &mut ReaderBuilder {
        self.parser.terminator(term);
        self
    }

    /// The quote character to use in RFC 4180 mode.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut ReaderBuilder {
        self.parser.quote(quote);
        self
    }

    /// The escape character to use in escape mode.
    ///
    /// The default is `b'\\'`.
    pub fn escape(&mut self, escape: u8) -> &mut ReaderBuilder {
        self.parser.escape(escape);
        self
    }

    /// Whether to skip lines that contain nothing at all.
    ///
    /// This is enabled by default in RFC 4180 mode only. In the other modes
    /// an empty line is a record with a single empty field.
    pub fn skip_blank_lines(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.parser.skip_blank_lines(yes);
        self
    }

    /// Set the initial capacity (in bytes) of the input buffer.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.parser.buffer_capacity(capacity);
        self
    }

    /// The strategy used to locate special characters.
    pub fn strategy(&mut self, strategy: Strategy) -> &mut ReaderBuilder {
        self.parser.strategy(strategy);
        self
    }

    /// A convenience method for reading ASCII delimited text.
    pub fn ascii(&mut self) -> &mut ReaderBuilder {
        self.parser.ascii();
        self
    }

    /// Set an observer for fields that break the RFC 4180 quoting rules.
    ///
    /// Without an observer, such fields are silently read literally. The
    /// observer may ask to abort, in which case reading the record returns
    /// `Error::Malformed`. Reading may continue afterwards.
    ///
    /// # Example
    ///
    /// ```
    /// use csvscan::{Error, MalformedAction, ReaderBuilder};
    ///
    /// let mut rdr = ReaderBuilder::new()
    ///     .has_headers(false)
    ///     .on_malformed(|_| MalformedAction::Abort)
    ///     .from_reader("a\"b,c\r\n".as_bytes());
    /// match rdr.records().next() {
    ///     Some(Err(Error::Malformed { field: 0, .. })) => {}
    ///     res => panic!("unexpected result: {:?}", res),
    /// }
    /// ```
    pub fn on_malformed<F>(&mut self, observer: F) -> &mut ReaderBuilder
    where
        F: Fn(&MalformedField) -> MalformedAction + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }
}

/// What a reader should do next.
pub(crate) enum Next {
    /// Refill the parser's input buffer.
    Fill,
    /// The header row was read and stored.
    Headers,
    /// A record was read.
    Record,
    /// There are no more records.
    End,
}

/// The I/O free part of a reader, shared by the synchronous and
/// asynchronous readers.
#[derive(Debug)]
pub(crate) struct ReaderState {
    pub parser: Parser,
    pub has_headers: bool,
    pub headers: Option<Headers>,
    observer: Option<ObserverDebug>,
    done: bool,
}

/// An observer wrapper so that reader state can derive `Debug`.
#[derive(Clone)]
struct ObserverDebug(Observer);

impl fmt::Debug for ObserverDebug {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Observer")
    }
}

impl ReaderState {
    pub fn new(builder: &ReaderBuilder) -> ReaderState {
        ReaderState {
            parser: builder.parser.build(),
            has_headers: builder.has_headers,
            headers: None,
            observer: builder.observer.clone().map(ObserverDebug),
            done: false,
        }
    }

    /// Read from buffered input into `record`.
    pub fn next(&mut self, record: &mut ByteRecord) -> Result<Next> {
        if self.done {
            record.clear();
            return Ok(Next::End);
        }
        let res = {
            let (data, ends) = record.as_parts();
            self.parser.read_record(data, ends)?
        };
        match res {
            ReadRecordResult::InputEmpty => Ok(Next::Fill),
            ReadRecordResult::End => {
                self.done = true;
                if self.has_headers && self.headers.is_none() {
                    self.headers = Some(Headers::new(ByteRecord::new()));
                }
                Ok(Next::End)
            }
            ReadRecordResult::Record => {
                record.set_position(Some(self.parser.record_position().clone()));
                self.observe(record)?;
                if self.has_headers && self.headers.is_none() {
                    self.headers = Some(Headers::new(record.clone()));
                    return Ok(Next::Headers);
                }
                Ok(Next::Record)
            }
        }
    }

    fn observe(&self, record: &ByteRecord) -> Result<()> {
        let observer = match self.observer {
            None => return Ok(()),
            Some(ref observer) => &observer.0,
        };
        let pos = self.parser.record_position();
        for &field in self.parser.malformed() {
            let raw = record.get(field).unwrap_or(&[]);
            let info = MalformedField { pos, field, raw };
            if observer(&info) == MalformedAction::Abort {
                return Err(Error::Malformed {
                    pos: pos.clone(),
                    field,
                    raw: raw.to_vec(),
                });
            }
        }
        Ok(())
    }

    pub fn headers(&self) -> Result<&Headers> {
        if !self.has_headers {
            return Err(Error::NoHeaders);
        }
        self.headers.as_ref().ok_or(Error::NoHeaders)
    }

    /// Whether the header row still needs to be read.
    pub fn needs_headers(&self) -> bool {
        self.has_headers && self.headers.is_none()
    }

    pub fn string_headers(&self) -> Result<&StringRecord> {
        let headers = self.headers()?;
        match headers.string_record {
            Ok(ref record) => Ok(record),
            Err(ref err) => Err(Error::Utf8 {
                pos: headers.byte_record.position().cloned(),
                err: err.clone(),
            }),
        }
    }

    /// Look up a field of `record` by header name.
    pub fn field_by_name<'r>(
        &self,
        record: &'r StringRecord,
        name: &str,
        nth: usize,
    ) -> Result<&'r str> {
        if !self.has_headers {
            return Err(Error::NoHeaders);
        }
        let index = self.headers.as_ref().map(|h| &h.index);
        index
            .and_then(|index| index.index_of(name.as_bytes(), nth))
            .and_then(|i| record.get(i))
            .ok_or_else(|| Error::MissingField {
                pos: record.position().cloned(),
                field: FieldRef::Name { name: name.as_bytes().to_vec(), nth },
                len: record.len(),
            })
    }
}

/// A already configured CSV reader.
///
/// A CSV reader takes as input CSV data and transforms that into standard
/// Rust values. The reader reads CSV data as either a sequence of
/// `StringRecord`s or `ByteRecord`s, or one record at a time through a
/// cursor (`read`, `get_field` and `get_field_by_name`).
///
/// # Configuration
///
/// A CSV reader has a couple convenient constructor methods like `from_path`
/// and `from_reader`. However, if you want to configure the CSV reader to
/// use a different delimiter or dialect, then you'll need to use a
/// `ReaderBuilder`.
///
/// # Error handling
///
/// In general, CSV *parsing* does not ever return an error. Fields with
/// malformed quoting are read literally and can be observed with
/// `ReaderBuilder::on_malformed`. Errors are returned for I/O failures,
/// invalid UTF-8 in string records and fields that don't exist.
#[derive(Debug)]
pub struct Reader<R> {
    state: ReaderState,
    rdr: R,
    current: StringRecord,
}

impl Reader<File> {
    /// Create a new CSV parser with a default configuration for the given
    /// file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Reader<File>> {
        ReaderBuilder::new().from_path(path)
    }
}

impl<R: io::Read> Reader<R> {
    fn new(builder: &ReaderBuilder, rdr: R) -> Reader<R> {
        Reader {
            state: ReaderState::new(builder),
            rdr,
            current: StringRecord::new(),
        }
    }

    /// Create a new CSV parser with a default configuration for the given
    /// reader.
    ///
    /// # Example
    ///
    /// ```
    /// use csvscan::Reader;
    ///
    /// let data = "\
    /// Id,Name
    /// 1,one
    /// 2,two
    /// ";
    /// let mut rdr = Reader::from_reader(data.as_bytes());
    /// while rdr.read().unwrap() {
    ///     let name = rdr.get_field_by_name("Name").unwrap();
    ///     assert!(name == "one" || name == "two");
    /// }
    /// ```
    pub fn from_reader(rdr: R) -> Reader<R> {
        ReaderBuilder::new().from_reader(rdr)
    }

    /// Returns a borrowed iterator over all records as strings.
    ///
    /// Each item yielded by this iterator is a `Result<StringRecord, Error>`.
    /// If `has_headers` is enabled, the header row is never yielded.
    pub fn records(&mut self) -> StringRecordsIter<R> {
        StringRecordsIter { rdr: self, rec: StringRecord::new() }
    }

    /// Returns an owned iterator over all records as strings.
    pub fn into_records(self) -> StringRecordsIntoIter<R> {
        StringRecordsIntoIter { rdr: self, rec: StringRecord::new() }
    }

    /// Returns a borrowed iterator over all records as raw bytes.
    pub fn byte_records(&mut self) -> ByteRecordsIter<R> {
        ByteRecordsIter { rdr: self, rec: ByteRecord::new() }
    }

    /// Returns an owned iterator over all records as raw bytes.
    pub fn into_byte_records(self) -> ByteRecordsIntoIter<R> {
        ByteRecordsIntoIter { rdr: self, rec: ByteRecord::new() }
    }

    /// Returns a reference to the header row as strings.
    ///
    /// If the header row hasn't been read yet, then it's read first. If the
    /// data is empty, then the header row is empty.
    ///
    /// If the reader was built with `has_headers(false)`, then this returns
    /// `Error::NoHeaders`. If the header row isn't valid UTF-8, then this
    /// returns a UTF-8 error (`byte_headers` still works).
    pub fn headers(&mut self) -> Result<&StringRecord> {
        self.read_headers()?;
        self.state.string_headers()
    }

    /// Returns a reference to the header row as raw bytes.
    pub fn byte_headers(&mut self) -> Result<&ByteRecord> {
        self.read_headers()?;
        Ok(&self.state.headers()?.byte_record)
    }

    /// Returns the name index built from the header row.
    pub fn header_index(&mut self) -> Result<&HeaderIndex> {
        self.read_headers()?;
        Ok(&self.state.headers()?.index)
    }

    fn read_headers(&mut self) -> Result<()> {
        if !self.state.needs_headers() {
            return Ok(());
        }
        let mut record = ByteRecord::new();
        loop {
            match self.state.next(&mut record)? {
                Next::Fill => self.fill()?,
                Next::Headers | Next::Record | Next::End => return Ok(()),
            }
        }
    }

    /// Read a single row into the given record. Returns false when no more
    /// records could be read.
    ///
    /// This method may be used to reuse the same allocation when reading
    /// many rows. If the row isn't valid UTF-8, then an error is returned
    /// and the record is left empty.
    pub fn read_record(&mut self, record: &mut StringRecord) -> Result<bool> {
        record.read(|rec| self.read_byte_record(rec))
    }

    /// Read a single row into the given byte record. Returns false when no
    /// more records could be read.
    pub fn read_byte_record(&mut self, record: &mut ByteRecord) -> Result<bool> {
        loop {
            match self.state.next(record)? {
                Next::Fill => self.fill()?,
                Next::Headers => {}
                Next::Record => return Ok(true),
                Next::End => return Ok(false),
            }
        }
    }

    /// Advance the cursor to the next record. Returns false when no more
    /// records could be read.
    pub fn read(&mut self) -> Result<bool> {
        let mut current = mem::take(&mut self.current);
        let res = self.read_record(&mut current);
        self.current = current;
        res
    }

    /// The record under the cursor.
    pub fn current(&self) -> &StringRecord {
        &self.current
    }

    /// Return field `i` of the record under the cursor.
    ///
    /// If there is no such field, then `Error::MissingField` is returned.
    pub fn get_field(&self, i: usize) -> Result<&str> {
        self.current.field(i)
    }

    /// Return the field named `name` in the header row from the record
    /// under the cursor.
    ///
    /// If the name occurs more than once in the header row, then the first
    /// occurrence is used.
    pub fn get_field_by_name(&self, name: &str) -> Result<&str> {
        self.get_field_by_name_nth(name, 0)
    }

    /// Like `get_field_by_name`, but picks the `nth` occurrence (starting
    /// at `0`) of a duplicated header name.
    pub fn get_field_by_name_nth(&self, name: &str, nth: usize) -> Result<&str> {
        self.state.field_by_name(&self.current, name, nth)
    }

    /// The indices of fields in the most recently read record that broke the
    /// quoting rules and were read literally.
    pub fn malformed_fields(&self) -> &[usize] {
        self.state.parser.malformed()
    }

    /// Return the current position of this CSV reader.
    ///
    /// This is the position of the start of the next record to be read.
    pub fn position(&self) -> &Position {
        self.state.parser.position()
    }

    /// The strategy actually used to locate special characters.
    pub fn strategy(&self) -> Strategy {
        self.state.parser.strategy()
    }

    /// Returns true if and only if this reader has been exhausted.
    pub fn is_done(&self) -> bool {
        self.state.parser.is_done() && self.state.done
    }

    /// Returns true if and only if this reader treats the first row as a
    /// header row.
    pub fn has_headers(&self) -> bool {
        self.state.has_headers
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.rdr
    }

    /// Returns a mutable reference to the underlying reader.
    ///
    /// Note that reading from the underlying reader directly skips any data
    /// already buffered by the CSV reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.rdr
    }

    /// Unwraps this CSV reader, returning the underlying reader.
    ///
    /// Note that any leftover data inside this reader's internal buffer is
    /// lost.
    pub fn into_inner(self) -> R {
        self.rdr
    }

    fn fill(&mut self) -> Result<()> {
        let spare = self.state.parser.spare()?;
        let n = loop {
            match self.rdr.read(spare) {
                Ok(n) => break n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::Io(err)),
            }
        };
        self.state.parser.commit(n);
        Ok(())
    }
}

/// An owned iterator over records as strings.
pub struct StringRecordsIntoIter<R> {
    rdr: Reader<R>,
    rec: StringRecord,
}

impl<R: io::Read> StringRecordsIntoIter<R> {
    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for StringRecordsIntoIter<R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        match self.rdr.read_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// A borrowed iterator over records as strings.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct StringRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    rec: StringRecord,
}

impl<'r, R: io::Read> StringRecordsIter<'r, R> {
    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }
}

impl<'r, R: io::Read> Iterator for StringRecordsIter<'r, R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        match self.rdr.read_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// An owned iterator over records as raw bytes.
pub struct ByteRecordsIntoIter<R> {
    rdr: Reader<R>,
    rec: ByteRecord,
}

impl<R: io::Read> ByteRecordsIntoIter<R> {
    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for ByteRecordsIntoIter<R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        match self.rdr.read_byte_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// A borrowed iterator over records as raw bytes.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct ByteRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    rec: ByteRecord,
}

impl<'r, R: io::Read> Iterator for ByteRecordsIter<'r, R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        match self.rdr.read_byte_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read};
    use std::sync::{Arc, Mutex};

    use csvscan_core::{CsvMode, Strategy};

    use crate::byte_record::ByteRecord;
    use crate::error::{Error, FieldRef};
    use crate::string_record::StringRecord;

    use super::{MalformedAction, ReaderBuilder};

    fn b(s: &str) -> &[u8] {
        s.as_bytes()
    }

    /// A reader that hands out at most `n` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        n: usize,
    }

    impl<'a> Read for Trickle<'a> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.n.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn read_byte_record() {
        let data = b("foo,\"b,ar\",baz\nabc,mno,xyz");
        let mut rdr =
            ReaderBuilder::new().has_headers(false).from_reader(data);
        let mut rec = ByteRecord::new();

        assert!(rdr.read_byte_record(&mut rec).unwrap());
        assert_eq!(3, rec.len());
        assert_eq!(b"foo", &rec[0]);
        assert_eq!(b"b,ar", &rec[1]);
        assert_eq!(b"baz", &rec[2]);

        assert!(rdr.read_byte_record(&mut rec).unwrap());
        assert_eq!(3, rec.len());
        assert_eq!(b"abc", &rec[0]);
        assert_eq!(b"mno", &rec[1]);
        assert_eq!(b"xyz", &rec[2]);

        assert!(!rdr.read_byte_record(&mut rec).unwrap());
        assert!(rec.is_empty());
        assert!(rdr.is_done());
    }

    #[test]
    fn headers_then_records() {
        let data = b("Id,Name\r\n1,one\r\n2,two\r\n");
        let mut rdr = ReaderBuilder::new().from_reader(data);
        assert_eq!(rdr.headers().unwrap(), &vec!["Id", "Name"]);

        let records: Vec<StringRecord> =
            rdr.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records, vec![
            StringRecord::from(vec!["1", "one"]),
            StringRecord::from(vec!["2", "two"]),
        ]);
        assert_eq!(records[0].position().unwrap().line(), 2);
        assert_eq!(records[1].position().unwrap().record(), 2);

        // Headers are still available after reading everything.
        assert_eq!(rdr.headers().unwrap().len(), 2);
    }

    #[test]
    fn headers_after_records() {
        let data = b("a,b\n1,2\n");
        let mut rdr = ReaderBuilder::new().from_reader(data);
        let mut rec = StringRecord::new();
        assert!(rdr.read_record(&mut rec).unwrap());
        assert_eq!(rec, vec!["1", "2"]);
        assert_eq!(rdr.headers().unwrap(), &vec!["a", "b"]);
    }

    #[test]
    fn headers_on_empty_input() {
        let mut rdr = ReaderBuilder::new().from_reader(b(""));
        assert!(rdr.headers().unwrap().is_empty());
        assert!(rdr.records().next().is_none());
    }

    #[test]
    fn no_headers_means_no_names() {
        let mut rdr =
            ReaderBuilder::new().has_headers(false).from_reader(b("a\n"));
        match rdr.headers() {
            Err(Error::NoHeaders) => {}
            res => panic!("unexpected result: {:?}", res),
        }
        assert!(rdr.read().unwrap());
        match rdr.get_field_by_name("a") {
            Err(Error::NoHeaders) => {}
            res => panic!("unexpected result: {:?}", res),
        }
        assert_eq!(rdr.get_field(0).unwrap(), "a");
    }

    #[test]
    fn cursor() {
        let data = b("Id,Name,Id\n1,one,x\n2,two,y\n");
        let mut rdr = ReaderBuilder::new().from_reader(data);

        assert!(rdr.read().unwrap());
        assert_eq!(rdr.get_field(0).unwrap(), "1");
        assert_eq!(rdr.get_field_by_name("Name").unwrap(), "one");
        assert_eq!(rdr.get_field_by_name_nth("Id", 1).unwrap(), "x");
        assert_eq!(rdr.current(), &vec!["1", "one", "x"]);

        match rdr.get_field(3) {
            Err(Error::MissingField { field: FieldRef::Index(3), len, .. }) => {
                assert_eq!(len, 3);
            }
            res => panic!("unexpected result: {:?}", res),
        }
        match rdr.get_field_by_name("Nope") {
            Err(Error::MissingField { field: FieldRef::Name { nth, .. }, .. }) => {
                assert_eq!(nth, 0);
            }
            res => panic!("unexpected result: {:?}", res),
        }

        assert!(rdr.read().unwrap());
        assert_eq!(rdr.get_field_by_name("Id").unwrap(), "2");
        assert!(!rdr.read().unwrap());
        assert!(rdr.current().is_empty());
    }

    #[test]
    fn malformed_observed() {
        let seen = Arc::new(Mutex::new(vec![]));
        let seen2 = Arc::clone(&seen);
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .on_malformed(move |field| {
                seen2.lock().unwrap().push((
                    field.position().line(),
                    field.field(),
                    field.raw().to_vec(),
                ));
                MalformedAction::Accept
            })
            .from_reader(b("a\"b\r\nc,d\"e\r\n"));

        let records: Vec<StringRecord> =
            rdr.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records[0], vec!["a\"b"]);
        assert_eq!(records[1], vec!["c", "d\"e"]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, 0, b"a\"b".to_vec()), (2, 1, b"d\"e".to_vec())]
        );
    }

    #[test]
    fn malformed_abort_then_continue() {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .on_malformed(|_| MalformedAction::Abort)
            .from_reader(b("x\"y\nok\n"));
        let mut rec = StringRecord::new();
        match rdr.read_record(&mut rec) {
            Err(Error::Malformed { ref pos, field: 0, ref raw }) => {
                assert_eq!(pos.line(), 1);
                assert_eq!(raw, b"x\"y");
            }
            res => panic!("unexpected result: {:?}", res),
        }
        assert!(rdr.read_record(&mut rec).unwrap());
        assert_eq!(rec, vec!["ok"]);
    }

    #[test]
    fn malformed_without_observer_is_literal() {
        let mut rdr =
            ReaderBuilder::new().has_headers(false).from_reader(b("\"ab\"c\n"));
        assert!(rdr.read().unwrap());
        assert_eq!(rdr.get_field(0).unwrap(), "\"ab\"c");
        assert_eq!(rdr.malformed_fields(), &[0]);
    }

    #[test]
    fn invalid_utf8() {
        let data = &b"a,b\n\xFF,c\nd,e\n"[..];
        let mut rdr = ReaderBuilder::new().from_reader(data);
        let mut rec = StringRecord::new();
        match rdr.read_record(&mut rec) {
            Err(Error::Utf8 { pos: Some(ref pos), ref err }) => {
                assert_eq!(pos.line(), 2);
                assert_eq!(err.field(), 0);
            }
            res => panic!("unexpected result: {:?}", res),
        }
        assert!(rec.is_empty());
        assert!(rdr.read_record(&mut rec).unwrap());
        assert_eq!(rec, vec!["d", "e"]);
    }

    #[test]
    fn trickled_input_matches() {
        let data = "h1,h2\n\"multi\nline\",\"x\"\"y\"\r\nplain,\r\n";
        for &strategy in &[Strategy::Scalar, Strategy::Swar, Strategy::Auto] {
            for n in 1..8 {
                let mut rdr = ReaderBuilder::new()
                    .buffer_capacity(4)
                    .strategy(strategy)
                    .from_reader(Trickle { data: data.as_bytes(), n });
                let records: Vec<StringRecord> =
                    rdr.records().collect::<Result<_, _>>().unwrap();
                assert_eq!(records, vec![
                    StringRecord::from(vec!["multi\nline", "x\"y"]),
                    StringRecord::from(vec!["plain", ""]),
                ], "strategy {:?}, chunk {}", strategy, n);
                assert_eq!(rdr.position().byte(), data.len() as u64);
            }
        }
    }

    #[test]
    fn escape_mode_reader() {
        let data = b("name,note\nbob,a\\,b\\\\c\n");
        let mut rdr =
            ReaderBuilder::new().mode(CsvMode::Escape).from_reader(data);
        assert!(rdr.read().unwrap());
        assert_eq!(rdr.get_field_by_name("note").unwrap(), "a,b\\c");
    }

    #[test]
    fn into_iterators() {
        let data = b("a\nb\nc\n");
        let rdr = ReaderBuilder::new().has_headers(false).from_reader(data);
        let records: Vec<ByteRecord> =
            rdr.into_byte_records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 3);

        let rdr = ReaderBuilder::new().from_reader(data);
        let mut it = rdr.into_records();
        assert_eq!(it.next().unwrap().unwrap(), vec!["b"]);
        let mut rdr = it.into_reader();
        assert_eq!(rdr.headers().unwrap(), &vec!["a"]);
        assert_eq!(rdr.byte_records().count(), 1);
    }

    #[test]
    fn io_error_propagates() {
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "broken"))
            }
        }

        let mut rdr = ReaderBuilder::new().from_reader(Broken);
        match rdr.read() {
            Err(Error::Io(ref err)) => assert_eq!(err.to_string(), "broken"),
            res => panic!("unexpected result: {:?}", res),
        }
    }
}
