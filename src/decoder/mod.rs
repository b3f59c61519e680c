//! Offset-chased, lazy buffer navigation (spec §3.1, §4.2).
//!
//! Every accessor here is total: a short read, a bad length, or a
//! corrupt vtable turns into a [`FlatError`], never a panic or an
//! out-of-bounds read. Grounded on the "validate eagerly, read lazily"
//! split in the teacher's `ArrayView` (`vortex-array/src/view.rs`):
//! navigation is cheap bounds-checked arithmetic, and the only
//! allocation on the read path is the (documented) UTF-8 decode of a
//! string field when the language can't hand out a borrowed `&str`
//! (this crate always can, since decoding never outlives the buffer).

pub mod table;
pub mod union;
pub mod vector;

use crate::error::{flat_bail, FlatResult};
use crate::primitives::WireScalar;

pub use table::Table;
pub use union::UnionField;
pub use vector::{RefVector, StructVector, Vector};

/// Read a `T` at an absolute byte offset, bounds-checked.
pub(crate) fn read_scalar_at<T: WireScalar>(buf: &[u8], at: usize) -> FlatResult<T> {
    let end = at
        .checked_add(T::SIZE)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| crate::error::flat_err!(ParsingError: at, "short read: need {} bytes at {at}, buffer is {} bytes", T::SIZE, buf.len()))?;
    Ok(T::read_le(&buf[at..end]))
}

/// Read a `uoffset` at `at` and return the absolute position of the
/// object it references (spec §4.2 "Navigation primitives": the raw
/// value is already relative to the field's own location, so the
/// target is simply `at + value`).
pub(crate) fn follow_uoffset(buf: &[u8], at: usize) -> FlatResult<usize> {
    let off: u32 = read_scalar_at(buf, at)?;
    let target = at
        .checked_add(off as usize)
        .filter(|&t| t <= buf.len())
        .ok_or_else(|| crate::error::flat_err!(ParsingError: at, "uoffset target {} out of bounds ({} byte buffer)", at as u64 + off as u64, buf.len()))?;
    Ok(target)
}

/// Locate the root table of `buf` (spec §3.1 "A root buffer starts with
/// a uoffset to the root object").
pub fn root_as_table(buf: &[u8]) -> FlatResult<Table<'_>> {
    if buf.len() < 4 {
        flat_bail!(ParsingError: 0, "buffer is too short to contain a root offset ({} bytes)", buf.len());
    }
    let table_start = follow_uoffset(buf, 0)?;
    Table::at(buf, table_start)
}

/// Check whether `buf` carries the given 4-byte file identifier
/// immediately after the root offset (spec §4.2 "File-identifier
/// probe"). Never errors; a too-short buffer simply returns `false`.
pub fn check_file_identifier(buf: &[u8], expected: &[u8; 4]) -> bool {
    match buf.get(4..8) {
        Some(actual) => actual == expected,
        None => false,
    }
}

/// A UTF-8 string view borrowed directly from the buffer (spec §4.2
/// "Laziness" — no allocation, no copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Str<'a>(&'a str);

impl<'a> Str<'a> {
    pub(crate) fn at(buf: &'a [u8], pos: usize) -> FlatResult<Self> {
        let len: u32 = read_scalar_at(buf, pos)?;
        let start = pos + 4;
        let end = start
            .checked_add(len as usize)
            .filter(|&e| e <= buf.len())
            .ok_or_else(|| crate::error::flat_err!(ParsingError: pos, "string of length {len} at {pos} runs past the end of a {}-byte buffer", buf.len()))?;
        let bytes = &buf[start..end];
        let s = std::str::from_utf8(bytes).map_err(|e| crate::error::FlatError::Utf8Decoding {
            message: e.to_string(),
            byte: e.error_len().map(|_| start + e.valid_up_to()),
        })?;
        Ok(Str(s))
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }
}

impl<'a> std::ops::Deref for Str<'a> {
    type Target = str;
    fn deref(&self) -> &str {
        self.0
    }
}

impl<'a> std::fmt::Display for Str<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
