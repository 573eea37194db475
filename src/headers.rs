use std::collections::HashMap;
use std::result;

use crate::byte_record::ByteRecord;
use crate::error::Utf8Error;
use crate::string_record::StringRecord;

/// A lookup table from header names to field indices.
///
/// Each reader owns its own index, built once when the header row is read.
/// A name may occur more than once in a header row, so lookups take the
/// occurrence to find.
#[derive(Clone, Debug, Default)]
pub struct HeaderIndex {
    names: HashMap<Vec<u8>, Vec<usize>>,
}

impl HeaderIndex {
    /// Build an index over the fields of a header row.
    pub fn new(headers: &ByteRecord) -> HeaderIndex {
        let mut names: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            names.entry(name.to_vec()).or_insert_with(Vec::new).push(i);
        }
        HeaderIndex { names }
    }

    /// Return the index of the `nth` occurrence (starting at `0`) of `name`.
    ///
    /// # Example
    ///
    /// ```
    /// use csvscan::{ByteRecord, HeaderIndex};
    ///
    /// let headers = ByteRecord::from(vec!["id", "tag", "tag"]);
    /// let index = HeaderIndex::new(&headers);
    /// assert_eq!(index.index_of(b"tag", 0), Some(1));
    /// assert_eq!(index.index_of(b"tag", 1), Some(2));
    /// assert_eq!(index.index_of(b"tag", 2), None);
    /// ```
    pub fn index_of(&self, name: &[u8], nth: usize) -> Option<usize> {
        self.names.get(name).and_then(|idxs| idxs.get(nth)).copied()
    }

    /// The number of times `name` occurs in the header row.
    pub fn count(&self, name: &[u8]) -> usize {
        self.names.get(name).map_or(0, |idxs| idxs.len())
    }
}

/// The header row of a reader, in both raw and UTF-8 form, plus its index.
#[derive(Debug)]
pub(crate) struct Headers {
    pub byte_record: ByteRecord,
    pub string_record: result::Result<StringRecord, Utf8Error>,
    pub index: HeaderIndex,
}

impl Headers {
    pub fn new(byte_record: ByteRecord) -> Headers {
        let string_record = StringRecord::from_byte_record(byte_record.clone())
            .map_err(|err| err.utf8_error().clone());
        let index = HeaderIndex::new(&byte_record);
        Headers { byte_record, string_record, index }
    }
}
