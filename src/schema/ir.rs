//! The validated schema IR (spec §3.2).
//!
//! Every type here is constructed only through a `Result`-returning
//! constructor, never built field-by-field by public mutation — the
//! point of this module is that once a value exists, its invariants
//! already hold. Grounded on the "validated-at-construction" shape of
//! the teacher's `ArrayView::try_new` (`vortex-array/src/view.rs`),
//! applied to schema declarations instead of array buffers.

use indexmap::IndexMap;

use crate::error::{flat_bail, FlatResult};

/// The integral types a FlatBuffers enum may be backed by (spec §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegralType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntegralType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "i8" | "byte" => IntegralType::I8,
            "i16" | "short" => IntegralType::I16,
            "i32" | "int" => IntegralType::I32,
            "i64" | "long" => IntegralType::I64,
            "u8" | "ubyte" | "bool" => IntegralType::U8,
            "u16" | "ushort" => IntegralType::U16,
            "u32" | "uint" => IntegralType::U32,
            "u64" | "ulong" => IntegralType::U64,
            _ => return None,
        })
    }

    /// Whether `value` fits this type's range (spec §3.2 "every value
    /// fits its underlying type").
    pub fn fits(&self, value: i64) -> bool {
        match self {
            IntegralType::I8 => i8::try_from(value).is_ok(),
            IntegralType::I16 => i16::try_from(value).is_ok(),
            IntegralType::I32 => i32::try_from(value).is_ok(),
            IntegralType::I64 => true,
            IntegralType::U8 => u8::try_from(value).is_ok(),
            IntegralType::U16 => u16::try_from(value).is_ok(),
            IntegralType::U32 => u32::try_from(value).is_ok(),
            IntegralType::U64 => value >= 0,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            IntegralType::I8 | IntegralType::U8 => 1,
            IntegralType::I16 | IntegralType::U16 => 2,
            IntegralType::I32 | IntegralType::U32 => 4,
            IntegralType::I64 | IntegralType::U64 => 8,
        }
    }
}

/// A fully validated enum: strictly ascending member values, each
/// fitting `underlying` (spec §3.2 "EnumDecl").
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub namespace: String,
    pub ident: String,
    pub underlying: IntegralType,
    /// `(name, value)`, strictly ascending by `value`.
    pub members: Vec<(String, i64)>,
}

impl EnumDecl {
    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.ident)
    }

    pub fn member_value(&self, name: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn is_declared_value(&self, value: i64) -> bool {
        self.members.iter().any(|(_, v)| *v == value)
    }
}

/// A power-of-two alignment in `[1, 16]` (spec §3.2 "alignment ∈
/// {1,2,4,8,16}").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Alignment(u8);

impl Alignment {
    pub fn new(value: usize) -> FlatResult<Self> {
        if !(1..=16).contains(&value) || !value.is_power_of_two() {
            flat_bail!(Analysis: "alignment", "alignment {value} must be a power of two in [1, 16]");
        }
        Ok(Alignment(value as u8))
    }

    pub fn get(&self) -> usize {
        self.0 as usize
    }

    pub fn max(self, other: Alignment) -> Alignment {
        Alignment(self.0.max(other.0))
    }
}

/// A leaf value inside a struct: a numeric/bool scalar or an enum
/// reference (spec §3.2 "StructField").
#[derive(Debug, Clone)]
pub enum StructFieldType {
    Scalar(IntegralType),
    Bool,
    F32,
    F64,
    Enum(String),
    /// A nested struct, named by qualified name; resolved structs are
    /// looked up by name rather than embedded, so `StructDecl` stays
    /// acyclic-by-construction once validated (spec §4.3 step 3).
    Struct(String),
}

impl StructFieldType {
    /// The field's natural alignment. `resolve_struct`/`resolve_enum`
    /// look up already-validated declarations by qualified name; both
    /// are infallible here because a struct field's type reference is
    /// resolved (and, for nested structs, recursively validated)
    /// before this is ever called.
    pub fn natural_alignment(
        &self,
        resolve_struct: impl Fn(&str) -> Option<Alignment>,
        resolve_enum: impl Fn(&str) -> Option<usize>,
    ) -> usize {
        match self {
            StructFieldType::Scalar(t) => t.size(),
            StructFieldType::Bool => 1,
            StructFieldType::F32 => 4,
            StructFieldType::F64 => 8,
            StructFieldType::Enum(name) => resolve_enum(name).unwrap_or(4),
            StructFieldType::Struct(name) => resolve_struct(name).map(Alignment::get).unwrap_or(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub ty: StructFieldType,
}

/// A fixed-size inline record with no vtable (spec §3.2 "StructDecl").
#[derive(Debug, Clone)]
pub struct StructDecl {
    pub namespace: String,
    pub ident: String,
    pub alignment: Alignment,
    pub fields: Vec<StructField>,
}

impl StructDecl {
    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.ident)
    }
}

/// A table field's type, carrying the spec §3.2 invariants: scalars
/// carry a default; references carry a `required` flag.
#[derive(Debug, Clone)]
pub enum TableFieldType {
    Scalar {
        ty: IntegralType,
        default: i64,
    },
    Bool {
        default: bool,
    },
    F32 {
        default: f32,
    },
    F64 {
        default: f64,
    },
    Enum {
        name: String,
        default: i64,
    },
    String {
        required: bool,
    },
    Vector {
        element: Box<TableFieldType>,
        required: bool,
    },
    Table {
        name: String,
        required: bool,
    },
    Struct {
        name: String,
        required: bool,
    },
    Union {
        name: String,
        required: bool,
    },
}

#[derive(Debug, Clone)]
pub struct TableField {
    pub id: u16,
    pub name: String,
    pub ty: TableFieldType,
    pub deprecated: bool,
}

#[derive(Debug, Clone)]
pub struct TableDecl {
    pub namespace: String,
    pub ident: String,
    pub fields: Vec<TableField>,
}

impl TableDecl {
    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.ident)
    }
}

/// A union's declared member list: each member is a table type paired
/// with the `u8` tag it's assigned (1-based; 0 is reserved for `NONE`,
/// spec §3.1).
#[derive(Debug, Clone)]
pub struct UnionDecl {
    pub namespace: String,
    pub ident: String,
    /// `(member table name, tag)`, tags starting at 1 in declaration
    /// order.
    pub members: Vec<(String, u8)>,
}

impl UnionDecl {
    pub fn qualified_name(&self) -> String {
        qualify(&self.namespace, &self.ident)
    }

    pub fn tag_of(&self, member: &str) -> Option<u8> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, tag)| *tag)
    }
}

fn qualify(namespace: &str, ident: &str) -> String {
    if namespace.is_empty() {
        ident.to_string()
    } else {
        format!("{namespace}.{ident}")
    }
}

/// The validated IR produced by the analyzer (spec §6 "Schema output
/// from the analyzer"): every declaration plus a qualified-name index
/// for downstream code generation.
#[derive(Debug, Clone, Default)]
pub struct ValidatedSchema {
    pub enums: IndexMap<String, EnumDecl>,
    pub structs: IndexMap<String, StructDecl>,
    pub tables: IndexMap<String, TableDecl>,
    pub unions: IndexMap<String, UnionDecl>,
}

/// What a resolved type reference turned out to be (spec §4.3
/// "Namespace resolution").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedKind {
    Enum,
    Struct,
    Table,
    Union,
}

impl ValidatedSchema {
    pub fn resolve(&self, qualified: &str) -> Option<ResolvedKind> {
        if self.enums.contains_key(qualified) {
            Some(ResolvedKind::Enum)
        } else if self.structs.contains_key(qualified) {
            Some(ResolvedKind::Struct)
        } else if self.tables.contains_key(qualified) {
            Some(ResolvedKind::Table)
        } else if self.unions.contains_key(qualified) {
            Some(ResolvedKind::Union)
        } else {
            None
        }
    }
}
