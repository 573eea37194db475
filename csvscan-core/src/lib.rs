/*!
`csvscan-core` is a CSV tokenizer that doesn't do any I/O.

Instead of inspecting input one byte at a time, a parser asks a *locator*
for a bitmask of every special byte (delimiter, quote or escape, record
terminator) in the next 32 byte window, and then only visits those
positions. The bytes in between are copied out as field data in bulk.

Three dialects are supported, see `CsvMode`:

* RFC 4180, where fields may be quoted and `""` is a literal quote.
* Escape, where a special character is preceded by an escape byte.
* No escape, where every special character is significant.

The parser owns its input buffer. Callers fill it with `Parser::spare` and
`Parser::commit`, which keeps this crate free of any particular I/O
abstraction. The `csvscan` crate builds synchronous and asynchronous
readers on top of it.

# Example

```
use csvscan_core::{ParserBuilder, CsvMode, ReadRecordResult};

let mut parser = ParserBuilder::new().mode(CsvMode::Escape).build();
let input = b"a\\,b,c\n";
parser.spare().unwrap()[..input.len()].copy_from_slice(input);
parser.commit(input.len());
parser.commit(0);

let (mut data, mut ends) = (vec![], vec![]);
let res = parser.read_record(&mut data, &mut ends).unwrap();
assert_eq!(res, ReadRecordResult::Record);
assert_eq!(data, b"a,bc");
assert_eq!(ends, vec![3, 4]);
```
*/

use std::collections::TryReserveError;
use std::error;
use std::fmt;

pub use crate::dialect::{CsvMode, Dialect, Specials, Terminator, MAX_SPECIALS};
pub use crate::locator::{
    Locate, Locator, Scalar, Strategy, Swar, WINDOW,
};
#[cfg(target_arch = "x86_64")]
pub use crate::locator::{Avx2, Sse2};
pub use crate::reader::{
    Parser, ParserBuilder, ReadRecordResult, DEFAULT_BUFFER_CAPACITY,
};
pub use crate::state::Position;
pub use crate::writer::{QuoteStyle, Serializer, SerializerBuilder};

mod dialect;
mod locator;
mod mode;
mod reader;
mod state;
mod writer;

/// An error that can occur while tokenizing CSV data.
#[derive(Debug)]
pub enum Error {
    /// A locator reported a byte that has no meaning in the active mode.
    ///
    /// This can only happen if a `Locate` implementation is broken.
    UnhandledSpecial {
        /// The offending byte.
        byte: u8,
        /// Where it was found.
        pos: Position,
    },
    /// The input buffer needed to grow to hold a single field, but the
    /// allocation failed.
    BufferGrowth(TryReserveError),
    /// The input buffer can't grow any further.
    BufferFull {
        /// The capacity of the buffer when growth was attempted.
        capacity: usize,
    },
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::BufferGrowth(ref err) => Some(err),
            Error::UnhandledSpecial { .. } | Error::BufferFull { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::UnhandledSpecial { byte, ref pos } => write!(
                f,
                "CSV parse error: record {} (byte {}, line {}): \
                 unhandled special byte 0x{:02X}",
                pos.record(),
                pos.byte(),
                pos.line(),
                byte,
            ),
            Error::BufferGrowth(ref err) => {
                write!(f, "CSV buffer error: failed to grow buffer: {}", err)
            }
            Error::BufferFull { capacity } => write!(
                f,
                "CSV buffer error: field does not fit in a buffer of {} bytes",
                capacity,
            ),
        }
    }
}
