//! Union navigation (spec §3.1, §4.2 "Union").
//!
//! A union field is really two adjacent table fields: a `u8` type tag
//! and a paired `uoffset`. This module gives that pair a single typed
//! accessor so generated code (not built here) doesn't have to
//! special-case the two-field convention itself.

use super::{follow_uoffset, Table};
use crate::error::FlatError;
use crate::primitives::VOffset;

/// The decoded shape of a union field: absent, an unrecognized tag
/// (forward-compatible schema evolution), or a tag paired with the
/// absolute position of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionField {
    None,
    Unknown(u8),
    Present { tag: u8, value_pos: usize },
}

impl<'a> Table<'a> {
    /// Read a union's `(type, value)` pair. `known_tags` is the set of
    /// tags the caller's schema declares as real members; anything else
    /// (other than 0) is `Unknown` rather than an error here — callers
    /// that need spec §4.2's `UnionUnknown` failure convert it
    /// themselves via [`UnionField::require_known`].
    pub fn get_union(
        &self,
        type_field_id: VOffset,
        value_field_id: VOffset,
        known_tags: &[u8],
    ) -> Result<UnionField, FlatError> {
        let tag: u8 = self.get_scalar(type_field_id, 0)?;
        if tag == 0 {
            return Ok(UnionField::None);
        }
        if !known_tags.contains(&tag) {
            return Ok(UnionField::Unknown(tag));
        }
        match self.raw_field_offset(value_field_id)? {
            Some(field_pos) => {
                let value_pos = follow_uoffset(self.buf(), field_pos)?;
                Ok(UnionField::Present { tag, value_pos })
            }
            None => Ok(UnionField::None),
        }
    }
}

impl UnionField {
    /// Turn `Unknown` into the spec's `UnionUnknown` error; pass
    /// through `None`/`Present` unchanged.
    pub fn require_known(self, name: &str) -> Result<Self, FlatError> {
        match self {
            UnionField::Unknown(tag) => Err(FlatError::UnionUnknown {
                name: name.to_string(),
                tag,
            }),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::union::UnionValue;
    use crate::builder::Builder;

    #[test]
    fn none_tag_decodes_to_none() {
        let mut b = Builder::new();
        let t = b.start_table();
        let table_start = t.end_table();
        let data = b.finish(table_start).unwrap();

        let table = crate::decoder::root_as_table(&data).unwrap();
        let u = table.get_union(4, 6, &[1, 2]).unwrap();
        assert_eq!(u, UnionField::None);
    }

    #[test]
    fn present_union_resolves_value_position() {
        let mut b = Builder::new();
        let inner = {
            let mut it = b.start_table();
            it.push_slot::<i32>(0, 5, 0);
            it.end_table()
        };
        let mut t = b.start_table();
        t.push_union_slot(4, 6, UnionValue::present(1, inner));
        let table_start = t.end_table();
        let data = b.finish(table_start).unwrap();

        let table = crate::decoder::root_as_table(&data).unwrap();
        let u = table.get_union(4, 6, &[1, 2]).unwrap();
        match u {
            UnionField::Present { tag, value_pos } => {
                assert_eq!(tag, 1);
                let inner_table = Table::at(&data, value_pos).unwrap();
                let v: i32 = inner_table.get_scalar(0, 0).unwrap();
                assert_eq!(v, 5);
            }
            other => panic!("expected Present, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_tag_is_unknown_until_required() {
        let mut b = Builder::new();
        let inner = {
            let mut it = b.start_table();
            it.push_slot::<i32>(0, 1, 0);
            it.end_table()
        };
        let mut t = b.start_table();
        t.push_union_slot(4, 6, UnionValue::present(9, inner));
        let table_start = t.end_table();
        let data = b.finish(table_start).unwrap();

        let table = crate::decoder::root_as_table(&data).unwrap();
        let u = table.get_union(4, 6, &[1, 2]).unwrap();
        assert_eq!(u, UnionField::Unknown(9));
        let err = u.require_known("Weapon").unwrap_err();
        assert!(matches!(err, FlatError::UnionUnknown { tag: 9, .. }));
    }
}
