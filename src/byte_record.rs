use std::fmt;
use std::iter::FromIterator;
use std::ops::{self, Range};
use std::result;
use std::str;

use bstr::{BStr, ByteSlice};

pub use csvscan_core::Position;

use crate::error::{Error, FieldRef, Result, Utf8Error};

/// A single CSV record stored as raw bytes.
///
/// A byte record permits reading or writing CSV rows that are not UTF-8.
/// In general, you should prefer using a `StringRecord` since it is more
/// ergonomic, but a `ByteRecord` is provided in case you need it.
///
/// If you are using the `Reader` API, then it is possible to read a
/// `ByteRecord` without any per-field allocation: every field is stored
/// contiguously in one buffer along with the end offset of each field.
#[derive(Clone, Eq)]
pub struct ByteRecord {
    /// All fields in this record, stored contiguously.
    fields: Vec<u8>,
    /// The ending index of each field.
    ends: Vec<usize>,
    /// The position of this record, if it was read from CSV data.
    pos: Option<Position>,
}

impl PartialEq for ByteRecord {
    fn eq(&self, other: &ByteRecord) -> bool {
        self.iter_eq(other)
    }
}

impl<T: AsRef<[u8]>> PartialEq<Vec<T>> for ByteRecord {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.iter_eq(other)
    }
}

impl<'a, T: AsRef<[u8]>> PartialEq<Vec<T>> for &'a ByteRecord {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.iter_eq(other)
    }
}

impl<T: AsRef<[u8]>> PartialEq<[T]> for ByteRecord {
    fn eq(&self, other: &[T]) -> bool {
        self.iter_eq(other)
    }
}

impl fmt::Debug for ByteRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fields: Vec<&BStr> = self.iter().map(|f| f.as_bstr()).collect();
        write!(f, "ByteRecord({:?})", fields)
    }
}

impl Default for ByteRecord {
    #[inline]
    fn default() -> ByteRecord {
        ByteRecord::new()
    }
}

impl ByteRecord {
    /// Create a new empty `ByteRecord`.
    ///
    /// Note that you may find the `ByteRecord::from` constructor more
    /// convenient, which is provided by an impl on the `From` trait.
    #[inline]
    pub fn new() -> ByteRecord {
        ByteRecord::with_capacity(0, 0)
    }

    /// Create a new empty `ByteRecord` with the given capacity settings.
    ///
    /// `buffer` refers to the capacity of the buffer used to store the
    /// actual row contents. `fields` refers to the number of fields one
    /// might expect to store.
    #[inline]
    pub fn with_capacity(buffer: usize, fields: usize) -> ByteRecord {
        ByteRecord {
            fields: Vec::with_capacity(buffer),
            ends: Vec::with_capacity(fields),
            pos: None,
        }
    }

    /// Returns an iterator over all fields in this record.
    #[inline]
    pub fn iter(&self) -> ByteRecordIter {
        self.into_iter()
    }

    /// Return the field at index `i`.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    #[inline]
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        self.range(i).map(|range| &self.fields[range])
    }

    /// Return the field at index `i`, or a `MissingField` error if this
    /// record has no such field.
    ///
    /// # Example
    ///
    /// ```
    /// use csvscan::{ByteRecord, Error};
    ///
    /// let record = ByteRecord::from(vec!["a", "b"]);
    /// assert_eq!(record.field(1).unwrap(), b"b");
    /// match record.field(2) {
    ///     Err(Error::MissingField { len: 2, .. }) => {}
    ///     res => panic!("unexpected result: {:?}", res),
    /// }
    /// ```
    #[inline]
    pub fn field(&self, i: usize) -> Result<&[u8]> {
        self.get(i).ok_or_else(|| Error::MissingField {
            pos: self.pos.clone(),
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
        self.ends.len()
    }

    /// Truncate this record to `n` fields.
    ///
    /// If `n` is greater than the number of fields in this record, then
    /// this has no effect.
    #[inline]
    pub fn truncate(&mut self, n: usize) {
        if n < self.len() {
            self.ends.truncate(n);
            self.fields.truncate(self.end());
        }
    }

    /// Clear this record so that it has zero fields.
    ///
    /// This is equivalent to calling `truncate(0)`.
    ///
    /// Note that it is not necessary to clear the record to reuse it with
    /// the CSV reader.
    #[inline]
    pub fn clear(&mut self) {
        self.fields.clear();
        self.ends.clear();
    }

    /// Add a new field to this record.
    #[inline]
    pub fn push_field(&mut self, field: &[u8]) {
        self.fields.extend_from_slice(field);
        self.ends.push(self.fields.len());
    }

    /// Return the position of this record, if available.
    #[inline]
    pub fn position(&self) -> Option<&Position> {
        self.pos.as_ref()
    }

    /// Set the position of this record.
    #[inline]
    pub fn set_position(&mut self, pos: Option<Position>) {
        self.pos = pos;
    }

    /// Return the start and end position of a field in this record.
    ///
    /// If no such field exists at the given index, then return `None`.
    #[inline]
    pub fn range(&self, i: usize) -> Option<Range<usize>> {
        let end = *self.ends.get(i)?;
        let start = match i.checked_sub(1) {
            None => 0,
            Some(j) => self.ends[j],
        };
        Some(start..end)
    }

    /// Returns the entire contents of this record as a slice of bytes.
    ///
    /// All fields are stored contiguously with no delimiters.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.fields[..self.end()]
    }

    #[inline]
    fn end(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    /// Retrieve the underlying parts of a byte record.
    ///
    /// This is what the tokenizer writes into.
    #[inline]
    pub(crate) fn as_parts(&mut self) -> (&mut Vec<u8>, &mut Vec<usize>) {
        (&mut self.fields, &mut self.ends)
    }

    /// Validate this record as UTF-8.
    ///
    /// If it's not UTF-8, return an error.
    ///
    /// This never modifies the contents of this record.
    pub(crate) fn validate(&self) -> result::Result<(), Utf8Error> {
        // If the entire buffer is ASCII, then we have nothing to fear.
        if self.as_slice().is_ascii() {
            return Ok(());
        }
        // Otherwise, we must check each field individually to ensure that
        // it's valid UTF-8.
        for (i, field) in self.iter().enumerate() {
            if let Err(err) = str::from_utf8(field) {
                return Err(Utf8Error::new(i, err.valid_up_to()));
            }
        }
        Ok(())
    }

    /// Compare the given byte record with the iterator of fields for
    /// equality.
    fn iter_eq<I, T>(&self, other: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut it_record = self.iter();
        let mut it_other = other.into_iter();
        loop {
            match (it_record.next(), it_other.next()) {
                (None, None) => return true,
                (None, Some(_)) | (Some(_), None) => return false,
                (Some(x), Some(y)) => {
                    if x != y.as_ref() {
                        return false;
                    }
                }
            }
        }
    }
}

impl ops::Index<usize> for ByteRecord {
    type Output = [u8];
    #[inline]
    fn index(&self, i: usize) -> &[u8] {
        self.get(i).unwrap()
    }
}

impl<T: AsRef<[u8]>> From<Vec<T>> for ByteRecord {
    #[inline]
    fn from(xs: Vec<T>) -> ByteRecord {
        ByteRecord::from_iter(&xs)
    }
}

impl<'a, T: AsRef<[u8]>> From<&'a [T]> for ByteRecord {
    #[inline]
    fn from(xs: &'a [T]) -> ByteRecord {
        ByteRecord::from_iter(xs)
    }
}

impl<T: AsRef<[u8]>> FromIterator<T> for ByteRecord {
    #[inline]
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> ByteRecord {
        let mut record = ByteRecord::new();
        record.extend(iter);
        record
    }
}

impl<T: AsRef<[u8]>> Extend<T> for ByteRecord {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push_field(x.as_ref());
        }
    }
}

/// A double-ended iterator over the fields in a byte record.
///
/// The `'r` lifetime variable refers to the lifetime of the `ByteRecord`
/// that is being iterated over.
#[derive(Clone)]
pub struct ByteRecordIter<'r> {
    /// The record we are iterating over.
    r: &'r ByteRecord,
    /// The starting index of the previous field. (For reverse iteration.)
    last_start: usize,
    /// The ending index of the previous field. (For forward iteration.)
    last_end: usize,
    /// The index of forward iteration.
    i_forward: usize,
    /// The index of reverse iteration.
    i_reverse: usize,
}

impl<'r> IntoIterator for &'r ByteRecord {
    type IntoIter = ByteRecordIter<'r>;
    type Item = &'r [u8];

    #[inline]
    fn into_iter(self) -> ByteRecordIter<'r> {
        ByteRecordIter {
            r: self,
            last_start: self.as_slice().len(),
            last_end: 0,
            i_forward: 0,
            i_reverse: self.len(),
        }
    }
}

impl<'r> ExactSizeIterator for ByteRecordIter<'r> {}

impl<'r> Iterator for ByteRecordIter<'r> {
    type Item = &'r [u8];

    #[inline]
    fn next(&mut self) -> Option<&'r [u8]> {
        if self.i_forward == self.i_reverse {
            None
        } else {
            let start = self.last_end;
            let end = self.r.ends[self.i_forward];
            self.i_forward += 1;
            self.last_end = end;
            Some(&self.r.fields[start..end])
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let x = self.i_reverse - self.i_forward;
        (x, Some(x))
    }

    #[inline]
    fn count(self) -> usize {
        self.len()
    }
}

impl<'r> DoubleEndedIterator for ByteRecordIter<'r> {
    #[inline]
    fn next_back(&mut self) -> Option<&'r [u8]> {
        if self.i_forward == self.i_reverse {
            None
        } else {
            self.i_reverse -= 1;
            let start = self
                .i_reverse
                .checked_sub(1)
                .map(|i| self.r.ends[i])
                .unwrap_or(0);
            let end = self.last_start;
            self.last_start = start;
            Some(&self.r.fields[start..end])
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ByteRecord {
    fn serialize<S: serde::Serializer>(
        &self,
        ser: S,
    ) -> result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;

        let mut seq = ser.serialize_seq(Some(self.len()))?;
        for field in self {
            seq.serialize_element(field.as_bstr())?;
        }
        seq.end()
    }
}
