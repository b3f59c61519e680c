//! Table construction: the vtable-backed, evolvable object at the heart
//! of the format (spec §4.1 "Table construction").
//!
//! A [`TableBuilder`] borrows the enclosing [`Builder`] for the duration
//! of one table. Field writers record a `(field_id, position)` pair for
//! every field that was actually written; [`TableBuilder::end_table`]
//! turns those pairs into a vtable, deduplicates it against every vtable
//! written so far in this buffer, and patches the table's soffset.

use super::Builder;
use crate::primitives::{VOffset, WireScalar};

/// Builds one table's worth of fields, then its vtable and soffset.
///
/// Dropping a `TableBuilder` without calling [`TableBuilder::end_table`]
/// leaves the builder in a well-defined (if wasteful) state: whatever
/// fields were pushed stay in the buffer, just unreferenced by any
/// vtable. There is no `Drop` guard enforcing `end_table` is called,
/// matching the source library's non-RAII table lifecycle.
pub struct TableBuilder<'b> {
    builder: &'b mut Builder,
    /// `builder.size()` when this table was started — the table body's
    /// lowest-numbered position, used to compute `table_size`.
    object_end: usize,
    /// `(field id, position)` for every field actually written, in the
    /// order the fields were pushed (field-id order, per the contract).
    slots: Vec<(VOffset, usize)>,
}

impl<'b> TableBuilder<'b> {
    pub(super) fn new(builder: &'b mut Builder) -> Self {
        let object_end = builder.size();
        TableBuilder {
            builder,
            object_end,
            slots: Vec::new(),
        }
    }

    /// Write a scalar/bool/enum field, eliding it entirely if `value`
    /// equals the schema-declared `default` (spec §4.1 "Default
    /// elision"). A field marked `deprecated` or an absent `Option`
    /// never reaches this call at all — callers simply skip it.
    pub fn push_slot<T: WireScalar>(&mut self, field_id: VOffset, value: T, default: T) {
        if value == default {
            return;
        }
        self.push_slot_always(field_id, value);
    }

    /// Write an inline field unconditionally, regardless of any
    /// default. Used for inline structs (which have no meaningful
    /// default) and for the union type-tag/value pair.
    pub fn push_slot_always<T: WireScalar>(&mut self, field_id: VOffset, value: T) {
        let pos = self.builder.push_scalar(value);
        self.slots.push((field_id, pos));
    }

    /// Write an inline struct field unconditionally (structs carry no
    /// meaningful default — spec §3.2 "StructDecl"). `bytes` must already
    /// be serialized to the struct's fixed size and `alignment` its
    /// declared power-of-two alignment.
    pub fn push_slot_struct(&mut self, field_id: VOffset, alignment: usize, bytes: &[u8]) {
        let pos = self.builder.create_struct(alignment, bytes);
        self.slots.push((field_id, pos));
    }

    /// Write an out-of-line reference field (string, vector, table) as a
    /// `uoffset` to an object already written at `target`. `None` means
    /// the field is absent (or `required` and missing — validity of
    /// that is a decoder-side, not encoder-side, concern).
    pub fn push_slot_offset(&mut self, field_id: VOffset, target: Option<usize>) {
        if let Some(target) = target {
            let pos = self.builder.push_uoffset_to(target);
            self.slots.push((field_id, pos));
        }
    }

    /// Finish the table: pad to 4 bytes, reserve the soffset, build the
    /// candidate vtable, deduplicate, and patch the soffset in place.
    /// Returns the table's start position (spec §4.1 steps 2-7).
    pub fn end_table(self) -> usize {
        let TableBuilder {
            builder,
            object_end,
            mut slots,
        } = self;

        // Step 2-3: reserve the soffset (4-byte aligned by push_scalar's
        // own prep). `object_offset` is the table's start position: the
        // first byte of the table is this soffset's first byte.
        let object_offset = builder.push_scalar(0i32);
        let table_size = (object_offset - object_end) as u16;

        slots.sort_by_key(|&(id, _)| id);
        let max_id = slots.last().map(|&(id, _)| id);
        let mut voffsets: Vec<VOffset> = match max_id {
            Some(max_id) => vec![0; max_id as usize + 1],
            None => Vec::new(),
        };
        for &(id, pos) in &slots {
            voffsets[id as usize] = (object_offset - pos) as VOffset;
        }
        // Trailing zero voffsets may be trimmed (spec §3.1).
        while matches!(voffsets.last(), Some(0)) {
            voffsets.pop();
        }

        let vtable_byte_len = 4 + voffsets.len() * 2;
        let mut candidate = Vec::with_capacity(vtable_byte_len);
        candidate.extend_from_slice(&(vtable_byte_len as u16).to_le_bytes());
        candidate.extend_from_slice(&table_size.to_le_bytes());
        for v in &voffsets {
            candidate.extend_from_slice(&v.to_le_bytes());
        }

        let soffset = match builder.lookup_vtable(&candidate) {
            Some(cached_pos) => cached_pos as i64 - object_offset as i64,
            None => {
                let vtable_pos = builder.push_bytes(&candidate);
                builder.cache_vtable(candidate, vtable_pos);
                vtable_pos as i64 - object_offset as i64
            }
        };
        builder.patch_scalar_at::<i32>(object_offset, soffset as i32);

        object_offset
    }
}
