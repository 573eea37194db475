use std::io;
use std::mem;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

use csvscan_core::Strategy;

use crate::byte_record::{ByteRecord, Position};
use crate::error::{Error, Result};
use crate::headers::HeaderIndex;
use crate::reader::{Next, ReaderBuilder, ReaderState};
use crate::string_record::StringRecord;

impl ReaderBuilder {
    /// Build an asynchronous CSV parser from this configuration that reads
    /// data from `rdr`.
    ///
    /// The parser itself never waits. Refilling the input buffer is the
    /// only await point.
    pub fn create_async_reader<R: AsyncRead + Unpin>(
        &self,
        rdr: R,
    ) -> AsyncReader<R> {
        AsyncReader::new(self, rdr)
    }

    /// Build an asynchronous CSV parser from this configuration that reads
    /// data from the given file path.
    pub async fn create_async_reader_from_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<AsyncReader<File>> {
        Ok(AsyncReader::new(self, File::open(path).await?))
    }
}

/// An asynchronous CSV reader.
///
/// This has the same record, header and cursor API as `Reader`, with each
/// reading method being `async`.
///
/// # Example
///
/// ```
/// use csvscan::AsyncReader;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), csvscan::Error> {
/// let data = "Id,Name\r\n1,one\r\n2,two\r\n";
/// let mut rdr = AsyncReader::from_reader(data.as_bytes());
/// let mut names = vec![];
/// while rdr.read().await? {
///     names.push(rdr.get_field_by_name("Name")?.to_string());
/// }
/// assert_eq!(names, vec!["one", "two"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AsyncReader<R> {
    state: ReaderState,
    rdr: R,
    current: StringRecord,
}

impl<R: AsyncRead + Unpin> AsyncReader<R> {
    fn new(builder: &ReaderBuilder, rdr: R) -> AsyncReader<R> {
        AsyncReader {
            state: ReaderState::new(builder),
            rdr,
            current: StringRecord::new(),
        }
    }

    /// Create a new asynchronous CSV parser with a default configuration.
    pub fn from_reader(rdr: R) -> AsyncReader<R> {
        ReaderBuilder::new().create_async_reader(rdr)
    }

    /// Returns a reference to the header row as strings.
    ///
    /// If the header row hasn't been read yet, then it's read first.
    pub async fn headers(&mut self) -> Result<&StringRecord> {
        self.read_headers().await?;
        self.state.string_headers()
    }

    /// Returns a reference to the header row as raw bytes.
    pub async fn byte_headers(&mut self) -> Result<&ByteRecord> {
        self.read_headers().await?;
        Ok(&self.state.headers()?.byte_record)
    }

    /// Returns the name index built from the header row.
    pub async fn header_index(&mut self) -> Result<&HeaderIndex> {
        self.read_headers().await?;
        Ok(&self.state.headers()?.index)
    }

    async fn read_headers(&mut self) -> Result<()> {
        if !self.state.needs_headers() {
            return Ok(());
        }
        let mut record = ByteRecord::new();
        loop {
            match self.state.next(&mut record)? {
                Next::Fill => self.fill().await?,
                Next::Headers | Next::Record | Next::End => return Ok(()),
            }
        }
    }

    /// Read a single row into the given record. Returns false when no more
    /// records could be read.
    pub async fn read_record(
        &mut self,
        record: &mut StringRecord,
    ) -> Result<bool> {
        let res = self.read_byte_record(record.as_byte_record_mut()).await;
        record.check_read(res)
    }

    /// Read a single row into the given byte record. Returns false when no
    /// more records could be read.
    pub async fn read_byte_record(
        &mut self,
        record: &mut ByteRecord,
    ) -> Result<bool> {
        loop {
            match self.state.next(record)? {
                Next::Fill => self.fill().await?,
                Next::Headers => {}
                Next::Record => return Ok(true),
                Next::End => return Ok(false),
            }
        }
    }

    /// Advance the cursor to the next record. Returns false when no more
    /// records could be read.
    pub async fn read(&mut self) -> Result<bool> {
        let mut current = mem::take(&mut self.current);
        let res = self.read_record(&mut current).await;
        self.current = current;
        res
    }

    /// The record under the cursor.
    pub fn current(&self) -> &StringRecord {
        &self.current
    }

    /// Return field `i` of the record under the cursor.
    pub fn get_field(&self, i: usize) -> Result<&str> {
        self.current.field(i)
    }

    /// Return the field named `name` in the header row from the record
    /// under the cursor.
    pub fn get_field_by_name(&self, name: &str) -> Result<&str> {
        self.get_field_by_name_nth(name, 0)
    }

    /// Like `get_field_by_name`, but picks the `nth` occurrence of a
    /// duplicated header name.
    pub fn get_field_by_name_nth(&self, name: &str, nth: usize) -> Result<&str> {
        self.state.field_by_name(&self.current, name, nth)
    }

    /// The indices of fields in the most recently read record that broke the
    /// quoting rules and were read literally.
    pub fn malformed_fields(&self) -> &[usize] {
        self.state.parser.malformed()
    }

    /// Return the position of the start of the next record to be read.
    pub fn position(&self) -> &Position {
        self.state.parser.position()
    }

    /// The strategy actually used to locate special characters.
    pub fn strategy(&self) -> Strategy {
        self.state.parser.strategy()
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.rdr
    }

    /// Unwraps this CSV reader, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.rdr
    }

    async fn fill(&mut self) -> Result<()> {
        let spare = self.state.parser.spare()?;
        let n = loop {
            match self.rdr.read(spare).await {
                Ok(n) => break n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::Io(err)),
            }
        };
        self.state.parser.commit(n);
        Ok(())
    }
}
