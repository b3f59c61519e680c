//! End-to-end tests for the concrete scenarios of spec §8, exercising
//! the builder, decoder, and schema analyzer together rather than in
//! isolation. Unlike the per-module unit tests colocated with each
//! writer/reader, these drive a full encode-then-decode (or
//! schema-text-shaped-input-then-analyze) round trip the way a
//! generated-code caller would.

use indexmap::IndexMap;

use crate::builder::union::UnionValue;
use crate::builder::Builder;
use crate::decoder::{root_as_table, Table};
use crate::error::FlatError;
use crate::schema::{Analyzer, DeclKind, RawDecl, RawField, RawSchema};

const COLOR_FIELD: u16 = 0;
const NESTED_FIELD: u16 = 11;

fn build_max_scalars_table(b: &mut Builder, nested: Option<usize>) -> usize {
    let mut t = b.start_table();
    t.push_slot::<u8>(0, u8::MAX, 0);
    t.push_slot::<u16>(1, u16::MAX, 0);
    t.push_slot::<u32>(2, u32::MAX, 0);
    t.push_slot::<u64>(3, u64::MAX, 0);
    t.push_slot::<i8>(4, i8::MAX, 0);
    t.push_slot::<i16>(5, i16::MAX, 0);
    t.push_slot::<i32>(6, i32::MAX, 0);
    t.push_slot::<i64>(7, i64::MAX, 0);
    t.push_slot::<f32>(8, 1234.56, 0.0);
    t.push_slot::<f64>(9, 2873242.82782, 0.0);
    t.push_slot::<bool>(10, true, false);
    t.push_slot_offset(NESTED_FIELD, nested);
    t.end_table()
}

fn assert_max_scalars(table: &Table) {
    assert_eq!(table.get_scalar::<u8>(0, 0).unwrap(), u8::MAX);
    assert_eq!(table.get_scalar::<u16>(1, 0).unwrap(), u16::MAX);
    assert_eq!(table.get_scalar::<u32>(2, 0).unwrap(), u32::MAX);
    assert_eq!(table.get_scalar::<u64>(3, 0).unwrap(), u64::MAX);
    assert_eq!(table.get_scalar::<i8>(4, 0).unwrap(), i8::MAX);
    assert_eq!(table.get_scalar::<i16>(5, 0).unwrap(), i16::MAX);
    assert_eq!(table.get_scalar::<i32>(6, 0).unwrap(), i32::MAX);
    assert_eq!(table.get_scalar::<i64>(7, 0).unwrap(), i64::MAX);
    assert_eq!(table.get_scalar::<f32>(8, 0.0).unwrap(), 1234.56f32);
    assert_eq!(table.get_scalar::<f64>(9, 0.0).unwrap(), 2873242.82782f64);
    assert!(table.get_scalar::<bool>(10, false).unwrap());
}

/// Scenario 1: max scalars, three-level nesting.
#[test]
fn scenario_max_scalars_three_level_nesting() {
    let mut b = Builder::new();
    let level2 = build_max_scalars_table(&mut b, None);
    let level1 = build_max_scalars_table(&mut b, Some(level2));
    let level0 = build_max_scalars_table(&mut b, Some(level1));
    let data = b.finish(level0).unwrap();

    let root = root_as_table(&data).unwrap();
    assert_max_scalars(&root);
    let inner1 = root.get_required_table(NESTED_FIELD, "nested").unwrap();
    assert_max_scalars(&inner1);
    let inner2 = inner1.get_required_table(NESTED_FIELD, "nested").unwrap();
    assert_max_scalars(&inner2);
    assert!(inner2.get_table(NESTED_FIELD).unwrap().is_none());
}

/// Scenario 2: all-absent table — zero voffsets, every field reads its
/// declared default.
#[test]
fn scenario_all_absent_table_reads_defaults() {
    let mut b = Builder::new();
    let t = b.start_table();
    let table_start = t.end_table();
    let data = b.finish(table_start).unwrap();

    let root = root_as_table(&data).unwrap();
    assert_eq!(root.get_scalar::<u8>(0, 7).unwrap(), 7);
    assert_eq!(root.get_scalar::<i64>(7, -1).unwrap(), -1);
    assert!(!root.get_scalar::<bool>(10, false).unwrap());
    assert!(root.get_table(NESTED_FIELD).unwrap().is_none());
}

const TAG_SWORD: u8 = 1;
const TAG_AXE: u8 = 2;

fn build_sword(b: &mut Builder, name: &str) -> usize {
    let s = b.create_string(name);
    let mut t = b.start_table();
    t.push_slot_offset(0, Some(s));
    t.end_table()
}

fn build_axe(b: &mut Builder, power: i32) -> usize {
    let mut t = b.start_table();
    t.push_slot::<i32>(0, power, 0);
    t.end_table()
}

/// Scenario 3: vector of unions `[Weapon(Sword("hi")), NONE,
/// Weapon(Axe(MAX_I32)), Weapon(Sword("oi"))]`.
#[test]
fn scenario_vector_of_unions_round_trips() {
    let mut b = Builder::new();
    let sword_hi = build_sword(&mut b, "hi");
    let axe_max = build_axe(&mut b, i32::MAX);
    let sword_oi = build_sword(&mut b, "oi");

    let values = vec![
        UnionValue::present(TAG_SWORD, sword_hi),
        UnionValue::none(),
        UnionValue::present(TAG_AXE, axe_max),
        UnionValue::present(TAG_SWORD, sword_oi),
    ];
    let (types_pos, values_pos) = b.create_vector_of_unions(&values);

    let mut root_table = b.start_table();
    root_table.push_slot_offset(0, Some(values_pos));
    root_table.push_slot_offset(1, Some(types_pos));
    let root_pos = root_table.end_table();
    let data = b.finish(root_pos).unwrap();

    let root = root_as_table(&data).unwrap();
    let types = root.get_required_vector::<u8>(1, "weapon_type").unwrap();
    let tags: Vec<u8> = types.iter().map(|r| r.unwrap()).collect();
    assert_eq!(tags, vec![TAG_SWORD, 0, TAG_AXE, TAG_SWORD]);

    let values_vec = root.get_required_ref_vector(0, "weapon").unwrap();
    assert_eq!(values_vec.len(), 4);

    for (i, &tag) in tags.iter().enumerate() {
        match tag {
            0 => continue,
            TAG_SWORD => {
                let name = values_vec.get_string(i).unwrap();
                let expected = if i == 0 { "hi" } else { "oi" };
                assert_eq!(name.as_str(), expected);
            }
            TAG_AXE => {
                let table = values_vec.get_table(i).unwrap();
                assert_eq!(table.get_scalar::<i32>(0, 0).unwrap(), i32::MAX);
            }
            other => panic!("unexpected tag {other}"),
        }
    }
}

/// Scenario 4: enum with an explicit default — encoding the default
/// value elides the field; decoding recovers the default.
#[test]
fn scenario_enum_default_is_elided_and_recovered() {
    const RED: i32 = 0;
    const GREEN: i32 = 1;
    const BLUE: i32 = 2;
    const DEFAULT_COLOR: i32 = BLUE;

    let mut b = Builder::new();
    let mut t = b.start_table();
    t.push_slot::<i32>(COLOR_FIELD, BLUE, DEFAULT_COLOR);
    let table_start = t.end_table();
    let data = b.finish(table_start).unwrap();

    // Elision: the vtable has no slot for an explicitly-default value.
    let root = root_as_table(&data).unwrap();
    assert!(root.raw_field_offset(COLOR_FIELD).unwrap().is_none());

    let decoded = root
        .get_enum(COLOR_FIELD, DEFAULT_COLOR, "Color", &[RED, GREEN, BLUE])
        .unwrap();
    assert_eq!(decoded, BLUE);
}

fn struct_raw_decl(name: &str, fields: &[(&str, &str)]) -> RawDecl {
    RawDecl {
        kind: DeclKind::Struct,
        namespace: String::new(),
        ident: name.to_string(),
        attrs: IndexMap::new(),
        values: Vec::new(),
        fields: fields
            .iter()
            .map(|(n, t)| RawField {
                name: n.to_string(),
                type_ref: t.to_string(),
                attrs: IndexMap::new(),
                id: None,
                default: None,
            })
            .collect(),
        underlying_or_members: Vec::new(),
    }
}

/// Scenario 5: `struct Align2 { x: Align1, y: i64, z: f32 }` with
/// `Align1 { x: i32 }` gets alignment 8 from the analyzer, and a vector
/// of `Align2`-shaped bytes built with that alignment lands every
/// element on an 8-byte boundary.
#[test]
fn scenario_struct_alignment_propagates_to_vector_layout() {
    let align1 = struct_raw_decl("Align1", &[("x", "i32")]);
    let align2 = struct_raw_decl("Align2", &[("x", "Align1"), ("y", "i64"), ("z", "f32")]);
    let schema = RawSchema::new(vec![align1, align2]);
    let validated = Analyzer::new().analyze(&schema).unwrap();
    let alignment = validated.structs["Align2"].alignment.get();
    assert_eq!(alignment, 8);

    // Align2 packs as: x.x (i32, offset 0), pad(4), y (i64, offset 8),
    // z (f32, offset 16), padded to the struct's own alignment (24 total).
    let make_element = |x: i32, y: i64, z: f32| -> [u8; 24] {
        let mut bytes = [0u8; 24];
        bytes[0..4].copy_from_slice(&x.to_le_bytes());
        bytes[8..16].copy_from_slice(&y.to_le_bytes());
        bytes[16..20].copy_from_slice(&z.to_le_bytes());
        bytes
    };
    let elements = [make_element(1, 2, 3.0), make_element(4, 5, 6.0)];
    let refs: Vec<&[u8]> = elements.iter().map(|e| e.as_slice()).collect();

    let mut b = Builder::new();
    let pos = b.create_vector_of_structs(alignment, 24, &refs);
    let data = b.finish(pos).unwrap();

    let root_off = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    let elements_start = root_off + 4;
    assert_eq!(elements_start % alignment, 0);
    assert_eq!((elements_start + 24) % alignment, 0);
}

/// Scenario 6: `struct A { b: B } struct B { a: A }` is rejected with a
/// message naming the cycle.
#[test]
fn scenario_cyclic_struct_is_rejected() {
    let a = struct_raw_decl("A", &[("b", "B")]);
    let b = struct_raw_decl("B", &[("a", "A")]);
    let schema = RawSchema::new(vec![a, b]);
    let err = Analyzer::new().analyze(&schema).unwrap_err();
    match &err {
        FlatError::Analysis(message) => assert!(message.contains("cyclic dependency detected")),
        other => panic!("expected Analysis error, got {other:?}"),
    }
}
