//! The analyzer's input shape (spec §4.3 "Input", §6 "Schema input to
//! the analyzer").
//!
//! These are plain data types the (external, not built here) lexer and
//! parser are assumed to produce. No text is parsed in this crate; a
//! `RawSchema` is just a tree the analyzer walks. Grounded on the
//! `SchemaDefinition`/`FieldDefinition` shape in the pack's dynamic
//! FlatBuffer builder (`germanic`'s `dynamic/schema_def.rs` pattern) —
//! a flat, serde-free struct tree rather than an AST with spans.

use indexmap::IndexMap;

/// One parsed `.fbs` file: its includes (already resolved to their own
/// parsed trees by the caller) and its own top-level declarations.
#[derive(Debug, Clone, Default)]
pub struct RawSchema {
    pub includes: Vec<RawSchema>,
    pub decls: Vec<RawDecl>,
}

impl RawSchema {
    pub fn new(decls: Vec<RawDecl>) -> Self {
        RawSchema {
            includes: Vec::new(),
            decls,
        }
    }

    pub fn with_includes(decls: Vec<RawDecl>, includes: Vec<RawSchema>) -> Self {
        RawSchema { includes, decls }
    }
}

/// The four declaration kinds a `.fbs` file can contain. `Union` is
/// tracked structurally (spec §4.3 step 5) even though it shares
/// `RawDecl`'s shape with `Table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Enum,
    Struct,
    Table,
    Union,
}

/// One declaration, in whichever namespace was active via the most
/// recent `namespace` directive in its source file (spec §4.3 "Input").
#[derive(Debug, Clone)]
pub struct RawDecl {
    pub kind: DeclKind,
    pub namespace: String,
    pub ident: String,
    pub attrs: IndexMap<String, AttrValue>,
    /// Enum members (`kind == Enum`) as `(name, explicit value)`, where
    /// an absent value means "auto-assign" (spec §4.3 step 2).
    pub values: Vec<(String, Option<i64>)>,
    /// Struct/table/union fields (`kind != Enum`).
    pub fields: Vec<RawField>,
    /// The declared underlying type for an enum (spec §3.2), or the
    /// union's member type list for `kind == Union`.
    pub underlying_or_members: Vec<String>,
}

impl RawDecl {
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.ident.clone()
        } else {
            format!("{}.{}", self.namespace, self.ident)
        }
    }
}

/// A metadata attribute value (spec §6 "Metadata attributes"):
/// presence-only flags carry no payload, `force_align`/`id` carry an
/// integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Present,
    Int(i64),
    Str(String),
}

/// One field of a struct, table, or union-as-member-list.
#[derive(Debug, Clone)]
pub struct RawField {
    pub name: String,
    /// The type reference as written in the schema: a builtin scalar
    /// name (`"i32"`, `"bool"`, ...), `"string"`, `"[T]"` for a vector
    /// of `T`, or a (possibly namespace-qualified) identifier resolved
    /// by the analyzer.
    pub type_ref: String,
    pub attrs: IndexMap<String, AttrValue>,
    /// The field's declared id (`id: N` attribute), if present — used
    /// by the table/union validation pass (spec §4.3 step 5) to detect
    /// duplicate ids and derive a union's paired value-field id.
    pub id: Option<u16>,
    /// The default value as written (scalar/bool/enum-member text), if
    /// any.
    pub default: Option<String>,
}
