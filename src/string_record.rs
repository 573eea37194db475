use std::fmt;
use std::iter::FromIterator;
use std::ops;
use std::result;
use std::str;

use crate::byte_record::{ByteRecord, ByteRecordIter, Position};
use crate::error::{Error, FieldRef, FromUtf8Error, Result};

/// A single CSV record stored as valid UTF-8 bytes.
///
/// A string record permits reading or writing CSV rows that are valid UTF-8.
/// If string records are used to read CSV data that is not valid UTF-8, then
/// the CSV reader will return an invalid UTF-8 error. If you do need to read
/// possibly invalid UTF-8 data, then you should prefer using a `ByteRecord`,
/// since it makes no assumptions about UTF-8.
#[derive(Clone, Eq)]
pub struct StringRecord(ByteRecord);

impl PartialEq for StringRecord {
    fn eq(&self, other: &StringRecord) -> bool {
        self.0 == other.0
    }
}

impl<T: AsRef<[u8]>> PartialEq<Vec<T>> for StringRecord {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.0 == *other
    }
}

impl<'a, T: AsRef<[u8]>> PartialEq<Vec<T>> for &'a StringRecord {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.0 == *other
    }
}

impl<T: AsRef<[u8]>> PartialEq<[T]> for StringRecord {
    fn eq(&self, other: &[T]) -> bool {
        self.0 == *other
    }
}

impl fmt::Debug for StringRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fields: Vec<&str> = self.iter().collect();
        write!(f, "StringRecord({:?})", fields)
    }
}

impl Default for StringRecord {
    #[inline]
    fn default() -> StringRecord {
        StringRecord::new()
    }
}

impl StringRecord {
    /// Create a new empty `StringRecord`.
    #[inline]
    pub fn new() -> StringRecord {
        StringRecord(ByteRecord::new())
    }

    /// Create a new empty `StringRecord` with the given capacity.
    ///
    /// `buffer` refers to the capacity of the buffer used to store the
    /// actual row contents. `fields` refers to the number of fields one
    /// might expect to store.
    #[inline]
    pub fn with_capacity(buffer: usize, fields: usize) -> StringRecord {
        StringRecord(ByteRecord::with_capacity(buffer, fields))
    }

    /// Create a new `StringRecord` from a `ByteRecord`.
    ///
    /// Note that this does UTF-8 validation. If the given `ByteRecord` does
    /// not contain valid UTF-8, then this returns an error. The error includes
    /// the UTF-8 error and the original `ByteRecord`.
    #[inline]
    pub fn from_byte_record(
        record: ByteRecord,
    ) -> result::Result<StringRecord, FromUtf8Error> {
        match record.validate() {
            Ok(()) => Ok(StringRecord(record)),
            Err(err) => Err(FromUtf8Error::new(record, err)),
        }
    }

    /// Lossily create a new `StringRecord` from a `ByteRecord`.
    ///
    /// This is like `StringRecord::from_byte_record`, except all invalid
    /// UTF-8 sequences are replaced with the `U+FFFD REPLACEMENT CHARACTER`.
    #[inline]
    pub fn from_byte_record_lossy(record: ByteRecord) -> StringRecord {
        // If the record is valid UTF-8, then take the easy path.
        if let Ok(()) = record.validate() {
            return StringRecord(record);
        }
        let mut str_record =
            StringRecord::with_capacity(record.as_slice().len(), record.len());
        for field in &record {
            str_record.push_field(&String::from_utf8_lossy(field));
        }
        str_record.0.set_position(record.position().cloned());
        str_record
    }

    /// Returns an iterator over all fields in this record.
    #[inline]
    pub fn iter(&self) -> StringRecordIter {
        self.into_iter()
    }

    /// Return the field at index `i`.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    #[inline]
    pub fn get(&self, i: usize) -> Option<&str> {
        self.0.get(i).map(|bytes| {
            debug_assert!(str::from_utf8(bytes).is_ok());
            // This is safe because we guarantee that all string records
            // have a valid UTF-8 buffer. It's also safe because we
            // individually check each field for valid UTF-8.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }

    /// Return the field at index `i`, or a `MissingField` error if this
    /// record has no such field.
    #[inline]
    pub fn field(&self, i: usize) -> Result<&str> {
        self.get(i).ok_or_else(|| Error::MissingField {
            pos: self.position().cloned(),
            field: FieldRef::Index(i),
            len: self.len(),
        })
    }

    /// Returns true if and only if this record is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of fields in this record.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Truncate this record to `n` fields.
    ///
    /// If `n` is greater than the number of fields in this record, then
    /// this has no effect.
    #[inline]
    pub fn truncate(&mut self, n: usize) {
        self.0.truncate(n);
    }

    /// Clear this record so that it has zero fields.
    ///
    /// Note that it is not necessary to clear the record to reuse it with
    /// the CSV reader.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Add a new field to this record.
    #[inline]
    pub fn push_field(&mut self, field: &str) {
        self.0.push_field(field.as_bytes());
    }

    /// Return the position of this record, if available.
    #[inline]
    pub fn position(&self) -> Option<&Position> {
        self.0.position()
    }

    /// Set the position of this record.
    #[inline]
    pub fn set_position(&mut self, pos: Option<Position>) {
        self.0.set_position(pos);
    }

    /// Returns the entire contents of this record as a string.
    #[inline]
    pub fn as_slice(&self) -> &str {
        debug_assert!(str::from_utf8(self.0.as_slice()).is_ok());
        // This is safe because we guarantee that each field is valid UTF-8.
        // If each field is valid UTF-8, then the entire buffer (up to the end
        // of the last field) must also be valid UTF-8.
        unsafe { str::from_utf8_unchecked(self.0.as_slice()) }
    }

    /// Return a reference to this record's raw `ByteRecord`.
    #[inline]
    pub fn as_byte_record(&self) -> &ByteRecord {
        &self.0
    }

    /// Convert this `StringRecord` into a `ByteRecord`.
    #[inline]
    pub fn into_byte_record(self) -> ByteRecord {
        self.0
    }

    #[cfg(feature = "tokio")]
    #[inline]
    pub(crate) fn as_byte_record_mut(&mut self) -> &mut ByteRecord {
        &mut self.0
    }

    /// A safe function for reading CSV data into a `StringRecord`.
    ///
    /// This relies on the internal representation of `StringRecord`.
    #[inline(always)]
    pub(crate) fn read<F>(&mut self, read: F) -> Result<bool>
    where
        F: FnOnce(&mut ByteRecord) -> Result<bool>,
    {
        // SAFETY: Note that despite the absence of `unsafe` in this function,
        // this code is critical to upholding the safety of other `unsafe`
        // blocks in this module. Namely, after reading into the inner byte
        // record, it is possible for `record` to contain invalid UTF-8. We
        // check for this in the `validate` method, and if it does have
        // invalid UTF-8, we clear the record. (It is safe for a record to be
        // in an arbitrary state if the reader returns an error.)
        let read_res = read(&mut self.0);
        self.check_read(read_res)
    }

    /// Validate this record after reading into it with `as_byte_record_mut`.
    ///
    /// This is the asynchronous counterpart of `read`.
    pub(crate) fn check_read(&mut self, read_res: Result<bool>) -> Result<bool> {
        let utf8_res = match self.0.validate() {
            Ok(()) => Ok(()),
            Err(err) => {
                // If this record isn't valid UTF-8, then completely wipe it.
                self.0.clear();
                Err(err)
            }
        };
        match (read_res, utf8_res) {
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => {
                Err(Error::Utf8 { pos: self.position().cloned(), err })
            }
            (Ok(more), Ok(())) => Ok(more),
        }
    }
}

impl ops::Index<usize> for StringRecord {
    type Output = str;
    #[inline]
    fn index(&self, i: usize) -> &str {
        self.get(i).unwrap()
    }
}

impl<T: AsRef<str>> From<Vec<T>> for StringRecord {
    #[inline]
    fn from(xs: Vec<T>) -> StringRecord {
        StringRecord::from_iter(xs.into_iter())
    }
}

impl<'a, T: AsRef<str>> From<&'a [T]> for StringRecord {
    #[inline]
    fn from(xs: &'a [T]) -> StringRecord {
        StringRecord::from_iter(xs)
    }
}

impl<T: AsRef<str>> FromIterator<T> for StringRecord {
    #[inline]
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> StringRecord {
        let mut record = StringRecord::new();
        record.extend(iter);
        record
    }
}

impl<T: AsRef<str>> Extend<T> for StringRecord {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push_field(x.as_ref());
        }
    }
}

impl<'a> IntoIterator for &'a StringRecord {
    type IntoIter = StringRecordIter<'a>;
    type Item = &'a str;

    #[inline]
    fn into_iter(self) -> StringRecordIter<'a> {
        StringRecordIter(self.0.iter())
    }
}

/// An iterator over the fields in a string record.
///
/// The `'r` lifetime variable refers to the lifetime of the `StringRecord`
/// that is being iterated over.
#[derive(Clone)]
pub struct StringRecordIter<'r>(ByteRecordIter<'r>);

impl<'r> Iterator for StringRecordIter<'r> {
    type Item = &'r str;

    #[inline]
    fn next(&mut self) -> Option<&'r str> {
        self.0.next().map(|bytes| {
            debug_assert!(str::from_utf8(bytes).is_ok());
            // See StringRecord::get for safety argument.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }

    #[inline]
    fn count(self) -> usize {
        self.0.len()
    }
}

impl<'r> DoubleEndedIterator for StringRecordIter<'r> {
    #[inline]
    fn next_back(&mut self) -> Option<&'r str> {
        self.0.next_back().map(|bytes| {
            debug_assert!(str::from_utf8(bytes).is_ok());
            // See StringRecord::get for safety argument.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for StringRecord {
    fn serialize<S: serde::Serializer>(
        &self,
        ser: S,
    ) -> result::Result<S::Ok, S::Error> {
        ser.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use crate::byte_record::ByteRecord;

    use super::StringRecord;

    #[test]
    fn lossy_replaces_invalid_utf8() {
        let bytes = ByteRecord::from(vec![&b"a\xFFb"[..], &b"c"[..]]);
        let record = StringRecord::from_byte_record_lossy(bytes);
        assert_eq!(record.get(0), Some("a\u{FFFD}b"));
        assert_eq!(record.get(1), Some("c"));
    }

    #[test]
    fn field_or_error() {
        let record = StringRecord::from(vec!["x", "y"]);
        assert_eq!(record.field(1).unwrap(), "y");
        assert!(record.field(2).is_err());
        assert_eq!(&record[0], "x");
    }

    #[test]
    fn read_wipes_invalid_utf8() {
        let mut record = StringRecord::new();
        let res = record.read(|rec| {
            rec.push_field(b"ok");
            rec.push_field(b"\xFF");
            Ok(true)
        });
        assert!(res.is_err());
        assert!(record.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_as_sequence() {
        let record = StringRecord::from(vec!["a", "b,c"]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"["a","b,c"]"#);
    }
}
