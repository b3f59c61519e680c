//! Vector construction (spec §3.1, §4.1 "Vectors").
//!
//! A vector is a `uoffset` to a 4-byte length prefix followed by
//! `length * sizeof(element)` inline bytes. Elements are written in
//! reverse order so that, once the buffer is read forward, index 0 sits
//! at the lowest address.

use super::union::UnionValue;
use super::Builder;
use crate::primitives::WireScalar;

/// Write a vector of inline scalars. Returns the position of the
/// 4-byte length prefix (the vector's "position" for referencing
/// purposes).
pub(super) fn create_vector<T: WireScalar>(builder: &mut Builder, items: &[T]) -> usize {
    let elem_bytes = items.len() * T::SIZE;
    // Two prep calls, mirroring the reference builder: one to guarantee
    // the eventual length prefix lands 4-aligned, one for the element
    // type's own (possibly wider) alignment.
    builder.prep(4, elem_bytes);
    builder.prep(T::ALIGNMENT.max(4), elem_bytes);
    for item in items.iter().rev() {
        builder.push_scalar(*item);
    }
    builder.push_scalar(items.len() as u32)
}

/// Write a vector of `uoffset`s to out-of-line objects (strings,
/// tables, nested vectors) already written at `positions`.
pub(super) fn create_vector_of_offsets(builder: &mut Builder, positions: &[usize]) -> usize {
    let elem_bytes = positions.len() * 4;
    builder.prep(4, elem_bytes);
    for &pos in positions.iter().rev() {
        builder.push_uoffset_to(pos);
    }
    builder.push_scalar(positions.len() as u32)
}

/// Write a vector of fixed-size structs (spec §3.1 "vector of T" where
/// `T` is a struct: inline, not `uoffset`-indirected, elements). Each
/// element's bytes must already be `element_size` long; elements are
/// written in reverse so index 0 lands at the lowest address, matching
/// [`create_vector`].
pub(super) fn create_vector_of_structs(
    builder: &mut Builder,
    alignment: usize,
    element_size: usize,
    elements: &[&[u8]],
) -> usize {
    let elem_bytes = elements.len() * element_size;
    builder.prep(4, elem_bytes);
    builder.prep(alignment.max(4), elem_bytes);
    for element in elements.iter().rev() {
        debug_assert_eq!(element.len(), element_size);
        builder.create_struct(alignment, element);
    }
    builder.push_scalar(elements.len() as u32)
}

/// Write the parallel type-tag and value vectors for a vector of
/// unions (spec §3.1). `NONE` entries contribute a literal `0` to the
/// value vector rather than a computed `uoffset`. Returns `(types_pos,
/// values_pos)`.
pub(super) fn create_vector_of_unions(
    builder: &mut Builder,
    values: &[UnionValue],
) -> (usize, usize) {
    let type_tags: Vec<u8> = values.iter().map(|v| v.type_tag()).collect();

    let elem_bytes = values.len() * 4;
    builder.prep(4, elem_bytes);
    for value in values.iter().rev() {
        match value.table_pos() {
            Some(pos) => {
                builder.push_uoffset_to(pos);
            }
            None => {
                builder.push_scalar(0u32);
            }
        }
    }
    let values_pos = builder.push_scalar(values.len() as u32);

    let types_pos = create_vector(builder, &type_tags);

    (types_pos, values_pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_vector_round_trips_element_order() {
        let mut b = Builder::new();
        let pos = create_vector(&mut b, &[10u32, 20, 30]);
        let data = b.finish(pos).unwrap();

        let root_off = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        let vec_start = root_off;
        let len = u32::from_le_bytes(data[vec_start..vec_start + 4].try_into().unwrap());
        assert_eq!(len, 3);
        let elem = |i: usize| {
            let at = vec_start + 4 + i * 4;
            u32::from_le_bytes(data[at..at + 4].try_into().unwrap())
        };
        assert_eq!((elem(0), elem(1), elem(2)), (10, 20, 30));
    }

    #[test]
    fn struct_vector_elements_land_on_natural_boundaries() {
        // An 8-byte-aligned, 16-byte struct (spec scenario: Align2).
        let elements: Vec<[u8; 16]> = (0..3)
            .map(|i: i64| {
                let mut bytes = [0u8; 16];
                bytes[8..16].copy_from_slice(&i.to_le_bytes());
                bytes
            })
            .collect();
        let refs: Vec<&[u8]> = elements.iter().map(|e| e.as_slice()).collect();

        let mut b = Builder::new();
        let pos = create_vector_of_structs(&mut b, 8, 16, &refs);
        let data = b.finish(pos).unwrap();

        let root_off = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        let vec_start = root_off;
        let elements_start = vec_start + 4;
        assert_eq!(elements_start % 8, 0, "element 0 must be 8-byte aligned");
        for i in 0..3 {
            let at = elements_start + i * 16;
            assert_eq!(at % 8, 0, "element {i} must be 8-byte aligned");
            let y = i64::from_le_bytes(data[at + 8..at + 16].try_into().unwrap());
            assert_eq!(y, i as i64);
        }
    }

    #[test]
    fn union_vector_none_entries_are_zero() {
        let mut b = Builder::new();
        let s1 = b.create_string("hi");
        let values = vec![
            UnionValue::present(1, s1),
            UnionValue::none(),
            UnionValue::present(2, s1),
        ];
        let (types_pos, values_pos) = create_vector_of_unions(&mut b, &values);
        let data = b.finish(values_pos.max(types_pos)).unwrap();
        // Sanity: both vectors were written and are addressable.
        assert!(types_pos > 0 && values_pos > 0);
        assert!(!data.is_empty());
    }
}
