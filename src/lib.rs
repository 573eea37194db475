/*!
The `csvscan` crate provides fast CSV readers and writers for three
dialects: RFC 4180, backslash style escaping and plain delimited text with
no escaping at all.

Parsing is driven by bitmasks of special characters. Rather than looking at
every byte, the tokenizer in `csvscan-core` asks a *locator* where the next
delimiters, quotes, escapes and terminators are, and copies everything in
between as field data. Which locator is used (portable, SWAR, SSE2 or AVX2)
is decided once when a reader is built, see `Strategy`.

# Reading

```
use std::error::Error;
use csvscan::Reader;

# fn main() { example().unwrap(); }
fn example() -> Result<(), Box<dyn Error>> {
    let data = "Id,Name\r\n1,one\r\n2,\"two, too\"\r\n";
    let mut rdr = Reader::from_reader(data.as_bytes());
    assert_eq!(rdr.headers()?, vec!["Id", "Name"]);
    for result in rdr.records() {
        let record = result?;
        assert_eq!(record.len(), 2);
    }
    Ok(())
}
```

Fields that break the RFC 4180 quoting rules, like `a"b`, are not an
error. They are read literally, and can be observed (or rejected) with
`ReaderBuilder::on_malformed`.

# Writing

```
use std::error::Error;
use csvscan::Writer;

# fn main() { example().unwrap(); }
fn example() -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_record(&["Id", "Name"])?;
    wtr.write_record(&["1", "he said \"hi\""])?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    assert_eq!(data, "Id,Name\r\n1,\"he said \"\"hi\"\"\"\r\n");
    Ok(())
}
```

# Crate features

* `serde` (default) implements `Serialize` for records and
  `Serialize`/`Deserialize` for the configuration types.
* `tokio` adds `AsyncReader`.
*/

#![deny(missing_docs)]

pub use csvscan_core::{CsvMode, QuoteStyle, Strategy, Terminator};

#[cfg(feature = "tokio")]
pub use crate::async_reader::AsyncReader;
pub use crate::byte_record::{ByteRecord, ByteRecordIter, Position};
pub use crate::error::{
    Error, FieldRef, FromUtf8Error, IntoInnerError, Result, Utf8Error,
};
pub use crate::headers::HeaderIndex;
pub use crate::reader::{
    ByteRecordsIntoIter, ByteRecordsIter, MalformedAction, MalformedField,
    Reader, ReaderBuilder, StringRecordsIntoIter, StringRecordsIter,
};
pub use crate::string_record::{StringRecord, StringRecordIter};
pub use crate::writer::{FieldInfo, Writer, WriterBuilder};

#[cfg(feature = "tokio")]
mod async_reader;
mod byte_record;
mod error;
mod headers;
mod reader;
mod string_record;
mod writer;
