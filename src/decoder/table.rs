//! Table navigation (spec §4.2 "Navigation primitives", "Typed
//! accessors"). Grounded on the "position + vtable pair" navigator
//! design note (spec §9) — a [`Table`] is exactly that pair; generated
//! wrapper types (not built here — see spec §6 "code generation") are
//! thin newtypes around it.

use super::{follow_uoffset, read_scalar_at, RefVector, Str, StructVector, Vector};
use crate::error::{flat_bail, FlatError, FlatResult};
use crate::primitives::{EnumScalar, VOffset, WireScalar};

/// A table's start position paired with its vtable's start position
/// (spec §9 "Polymorphic table navigator").
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    buf: &'a [u8],
    table_start: usize,
    vtable_start: usize,
}

impl<'a> Table<'a> {
    /// Build a `Table` for the table whose soffset begins at
    /// `table_start` (spec §4.2 "To read a table").
    pub(crate) fn at(buf: &'a [u8], table_start: usize) -> FlatResult<Self> {
        let soffset: i32 = read_scalar_at(buf, table_start)?;
        let raw_vtable_start = table_start as i64 - soffset as i64;
        if raw_vtable_start < 0 || raw_vtable_start as usize >= buf.len() {
            flat_bail!(ParsingError: table_start, "soffset {soffset} at {table_start} points outside the buffer");
        }
        let vtable_start = raw_vtable_start as usize;
        Ok(Table {
            buf,
            table_start,
            vtable_start,
        })
    }

    /// The table's own start position (the soffset's first byte).
    pub fn position(&self) -> usize {
        self.table_start
    }

    /// Look up field `slot_id`'s absolute byte position, or `None` if
    /// the field is absent (spec §4.2 "To look up field id i").
    pub fn field_offset(&self, slot_id: VOffset) -> FlatResult<Option<usize>> {
        let vtable_size: VOffset = read_scalar_at(self.buf, self.vtable_start)?;
        let slot = 4 + slot_id as usize * 2;
        if slot as VOffset >= vtable_size {
            return Ok(None);
        }
        let voffset: VOffset = read_scalar_at(self.buf, self.vtable_start + slot)?;
        if voffset == 0 {
            Ok(None)
        } else {
            Ok(Some(self.table_start + voffset as usize))
        }
    }

    /// A required scalar/bool/enum field: the schema default if absent.
    pub fn get_scalar<T: WireScalar>(&self, slot_id: VOffset, default: T) -> FlatResult<T> {
        match self.field_offset(slot_id)? {
            Some(pos) => read_scalar_at(self.buf, pos),
            None => Ok(default),
        }
    }

    /// A required or defaulted enum field: like [`Table::get_scalar`],
    /// but additionally checks the decoded value against the enum's
    /// declared members, yielding `EnumUnknown` rather than silently
    /// handing back a value no variant names (spec §4.2 "Enum").
    pub fn get_enum<T: EnumScalar>(
        &self,
        slot_id: VOffset,
        default: T,
        name: &str,
        declared: &[T],
    ) -> FlatResult<T> {
        let value = self.get_scalar(slot_id, default)?;
        if declared.contains(&value) {
            Ok(value)
        } else {
            Err(FlatError::EnumUnknown {
                name: name.to_string(),
                value: value.to_i64(),
            })
        }
    }

    /// A nested struct field, which is itself an inline value at the
    /// field's position (no further indirection — structs carry no
    /// vtable). `f` reads the struct's fields out of the given slice.
    pub fn get_struct<T>(
        &self,
        slot_id: VOffset,
        read: impl FnOnce(&'a [u8], usize) -> FlatResult<T>,
    ) -> FlatResult<Option<T>> {
        match self.field_offset(slot_id)? {
            Some(pos) => Ok(Some(read(self.buf, pos)?)),
            None => Ok(None),
        }
    }

    /// A `required` struct field: absence is a decode error.
    pub fn get_required_struct<T>(
        &self,
        slot_id: VOffset,
        field_name: &str,
        read: impl FnOnce(&'a [u8], usize) -> FlatResult<T>,
    ) -> FlatResult<T> {
        self.get_struct(slot_id, read)?
            .ok_or_else(|| FlatError::MissingField {
                field_name: field_name.to_string(),
            })
    }

    /// A required string field.
    pub fn get_required_string(&self, slot_id: VOffset, field_name: &str) -> FlatResult<Str<'a>> {
        self.get_string(slot_id)?
            .ok_or_else(|| FlatError::MissingField {
                field_name: field_name.to_string(),
            })
    }

    /// An optional string field.
    pub fn get_string(&self, slot_id: VOffset) -> FlatResult<Option<Str<'a>>> {
        match self.field_offset(slot_id)? {
            Some(pos) => {
                let str_pos = follow_uoffset(self.buf, pos)?;
                Ok(Some(Str::at(self.buf, str_pos)?))
            }
            None => Ok(None),
        }
    }

    /// A required nested table field.
    pub fn get_required_table(&self, slot_id: VOffset, field_name: &str) -> FlatResult<Table<'a>> {
        self.get_table(slot_id)?
            .ok_or_else(|| FlatError::MissingField {
                field_name: field_name.to_string(),
            })
    }

    /// An optional nested table field.
    pub fn get_table(&self, slot_id: VOffset) -> FlatResult<Option<Table<'a>>> {
        match self.field_offset(slot_id)? {
            Some(pos) => {
                let table_pos = follow_uoffset(self.buf, pos)?;
                Ok(Some(Table::at(self.buf, table_pos)?))
            }
            None => Ok(None),
        }
    }

    /// An optional vector-of-scalars field (spec §4.2 "Vector").
    pub fn get_vector<T: WireScalar>(&self, slot_id: VOffset) -> FlatResult<Option<Vector<'a, T>>> {
        match self.field_offset(slot_id)? {
            Some(pos) => {
                let vec_pos = follow_uoffset(self.buf, pos)?;
                Ok(Some(Vector::at(self.buf, vec_pos)?))
            }
            None => Ok(None),
        }
    }

    /// A `required` vector-of-scalars field: absence is a decode error.
    pub fn get_required_vector<T: WireScalar>(
        &self,
        slot_id: VOffset,
        field_name: &str,
    ) -> FlatResult<Vector<'a, T>> {
        self.get_vector(slot_id)?
            .ok_or_else(|| FlatError::MissingField {
                field_name: field_name.to_string(),
            })
    }

    /// An optional vector-of-strings-or-tables field: each element is
    /// itself a `uoffset` that must be followed before its value is
    /// visible (spec §4.2 "Vector").
    pub fn get_ref_vector(&self, slot_id: VOffset) -> FlatResult<Option<RefVector<'a>>> {
        match self.field_offset(slot_id)? {
            Some(pos) => {
                let vec_pos = follow_uoffset(self.buf, pos)?;
                Ok(Some(RefVector::at(self.buf, vec_pos)?))
            }
            None => Ok(None),
        }
    }

    /// A `required` vector-of-strings-or-tables field: absence is a
    /// decode error.
    pub fn get_required_ref_vector(
        &self,
        slot_id: VOffset,
        field_name: &str,
    ) -> FlatResult<RefVector<'a>> {
        self.get_ref_vector(slot_id)?
            .ok_or_else(|| FlatError::MissingField {
                field_name: field_name.to_string(),
            })
    }

    /// An optional vector-of-structs field: elements are inline, fixed-size
    /// `element_size`-byte blobs rather than `uoffset`-indirected (spec
    /// §4.2 "Vector", struct case).
    pub fn get_struct_vector(
        &self,
        slot_id: VOffset,
        element_size: usize,
    ) -> FlatResult<Option<StructVector<'a>>> {
        match self.field_offset(slot_id)? {
            Some(pos) => {
                let vec_pos = follow_uoffset(self.buf, pos)?;
                Ok(Some(StructVector::at(self.buf, vec_pos, element_size)?))
            }
            None => Ok(None),
        }
    }

    /// A `required` vector-of-structs field: absence is a decode error.
    pub fn get_required_struct_vector(
        &self,
        slot_id: VOffset,
        element_size: usize,
        field_name: &str,
    ) -> FlatResult<StructVector<'a>> {
        self.get_struct_vector(slot_id, element_size)?
            .ok_or_else(|| FlatError::MissingField {
                field_name: field_name.to_string(),
            })
    }

    /// The raw buffer this table was parsed from, and the field
    /// position directly, for decoder building blocks (vectors, unions)
    /// that need one more level of navigation than this type exposes.
    pub(crate) fn buf(&self) -> &'a [u8] {
        self.buf
    }

    pub(crate) fn raw_field_offset(&self, slot_id: VOffset) -> FlatResult<Option<usize>> {
        self.field_offset(slot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    #[test]
    fn absent_scalar_field_returns_default() {
        let mut b = Builder::new();
        let t = b.start_table();
        let table_start = t.end_table();
        let data = b.finish(table_start).unwrap();

        let table = crate::decoder::root_as_table(&data).unwrap();
        let v: u32 = table.get_scalar(0, 99).unwrap();
        assert_eq!(v, 99);
    }

    #[test]
    fn present_scalar_field_overrides_default() {
        let mut b = Builder::new();
        let mut t = b.start_table();
        t.push_slot::<u32>(0, 7, 99);
        let table_start = t.end_table();
        let data = b.finish(table_start).unwrap();

        let table = crate::decoder::root_as_table(&data).unwrap();
        let v: u32 = table.get_scalar(0, 99).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn missing_required_string_is_an_error() {
        let mut b = Builder::new();
        let t = b.start_table();
        let table_start = t.end_table();
        let data = b.finish(table_start).unwrap();

        let table = crate::decoder::root_as_table(&data).unwrap();
        let err = table.get_required_string(0, "name").unwrap_err();
        assert!(matches!(err, FlatError::MissingField { .. }));
    }

    #[test]
    fn present_string_field_round_trips() {
        let mut b = Builder::new();
        let s = b.create_string("vortex");
        let mut t = b.start_table();
        t.push_slot_offset(0, Some(s));
        let table_start = t.end_table();
        let data = b.finish(table_start).unwrap();

        let table = crate::decoder::root_as_table(&data).unwrap();
        let v = table.get_required_string(0, "name").unwrap();
        assert_eq!(v.as_str(), "vortex");
    }

    #[test]
    fn unset_field_beyond_vtable_size_is_absent() {
        let mut b = Builder::new();
        let mut t = b.start_table();
        t.push_slot::<u32>(0, 1, 0);
        let table_start = t.end_table();
        let data = b.finish(table_start).unwrap();

        let table = crate::decoder::root_as_table(&data).unwrap();
        // Field id 5 was never written by any table in this buffer; the
        // vtable is too short to cover it.
        let v: u16 = table.get_scalar(5, 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn enum_value_within_declared_members_decodes() {
        let mut b = Builder::new();
        let mut t = b.start_table();
        t.push_slot::<i32>(0, 2, 2); // Blue = 2, equal to default, elided
        let table_start = t.end_table();
        let data = b.finish(table_start).unwrap();

        let table = crate::decoder::root_as_table(&data).unwrap();
        let v = table.get_enum(0, 2i32, "Color", &[0, 1, 2]).unwrap();
        assert_eq!(v, 2);
    }

    #[test]
    fn enum_value_outside_declared_members_is_unknown() {
        let mut b = Builder::new();
        let mut t = b.start_table();
        t.push_slot::<i32>(0, 9, 0);
        let table_start = t.end_table();
        let data = b.finish(table_start).unwrap();

        let table = crate::decoder::root_as_table(&data).unwrap();
        let err = table.get_enum(0, 0i32, "Color", &[0, 1, 2]).unwrap_err();
        assert!(matches!(err, FlatError::EnumUnknown { value: 9, .. }));
    }
}
