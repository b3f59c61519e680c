//! The semantic analyzer (spec §4.3): turns a tree of [`RawSchema`]s
//! into a [`ValidatedSchema`], or a `[context]: message` error.
//!
//! Grounded on the "rose-tree analysis state" design note (spec §9):
//! an explicit `Analyzer` object threads a namespace-qualified
//! declaration index, a memoization table for already-validated
//! structs (cycle detection and dedup in one pass), and a "current
//! context" stack for error-prefix construction. The `IndexMap` choice
//! (over a plain `HashMap`) is grounded on the same idiom visible in
//! the pack's `germanic` dynamic builder (`dynamic/builder.rs`):
//! deterministic iteration order so that two analyzer runs over the
//! same input always walk declarations in the same order, which in
//! turn keeps error messages and the output side table reproducible.

use indexmap::IndexMap;
use itertools::Itertools;
use log::warn;

use super::ir::{
    Alignment, EnumDecl, IntegralType, ResolvedKind, StructDecl, StructField, StructFieldType,
    TableDecl, TableField, TableFieldType, UnionDecl, ValidatedSchema,
};
use super::raw::{AttrValue, DeclKind, RawDecl, RawSchema};
use crate::error::{flat_bail, FlatError, FlatResult};

/// Threads the state needed across the whole analysis pipeline (spec
/// §4.3 "Pipeline").
pub struct Analyzer {
    decls: IndexMap<(String, String), RawDecl>,
    enums: IndexMap<String, EnumDecl>,
    structs: IndexMap<String, StructDecl>,
    /// Structs currently being validated, in DFS order — a revisit of
    /// anything in here is a cycle (spec §4.3 step 3).
    struct_stack: Vec<String>,
    context: Vec<String>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer {
            decls: IndexMap::new(),
            enums: IndexMap::new(),
            structs: IndexMap::new(),
            struct_stack: Vec::new(),
            context: Vec::new(),
        }
    }

    /// Run the full pipeline over `root` (spec §4.3 steps 1-5) and
    /// return the validated IR.
    pub fn analyze(mut self, root: &RawSchema) -> FlatResult<ValidatedSchema> {
        self.flatten(root);

        let enum_decls: Vec<RawDecl> = self
            .decls
            .values()
            .filter(|d| d.kind == DeclKind::Enum)
            .cloned()
            .collect();
        for decl in &enum_decls {
            self.validate_enum(decl)?;
        }

        let struct_decls: Vec<RawDecl> = self
            .decls
            .values()
            .filter(|d| d.kind == DeclKind::Struct)
            .cloned()
            .collect();
        for decl in &struct_decls {
            self.validate_struct(&decl.qualified_name())?;
        }

        let mut tables = IndexMap::new();
        let table_decls: Vec<RawDecl> = self
            .decls
            .values()
            .filter(|d| d.kind == DeclKind::Table)
            .cloned()
            .collect();
        for decl in &table_decls {
            let table = self.validate_table(decl)?;
            tables.insert(table.qualified_name(), table);
        }

        let mut unions = IndexMap::new();
        let union_decls: Vec<RawDecl> = self
            .decls
            .values()
            .filter(|d| d.kind == DeclKind::Union)
            .cloned()
            .collect();
        for decl in &union_decls {
            let union = self.validate_union(decl)?;
            unions.insert(union.qualified_name(), union);
        }

        Ok(ValidatedSchema {
            enums: self.enums,
            structs: self.structs,
            tables,
            unions,
        })
    }

    // ---- step 1: flatten --------------------------------------------------

    /// Walk the include tree, pairing each declaration with its
    /// effective namespace (spec §4.3 step 1). `RawDecl::namespace` is
    /// already set by the caller/parser; this just indexes everything
    /// under one flat map, includes first so a main-file declaration
    /// with the same (namespace, ident) as an included one wins (later
    /// insert overwrites, matching "closest to the root" precedence).
    fn flatten(&mut self, schema: &RawSchema) {
        for include in &schema.includes {
            self.flatten(include);
        }
        for decl in &schema.decls {
            self.decls
                .insert((decl.namespace.clone(), decl.ident.clone()), decl.clone());
        }
    }

    // ---- context-prefixed errors -------------------------------------------

    fn push_context(&mut self, ctx: impl Into<String>) {
        self.context.push(ctx.into());
    }

    fn pop_context(&mut self) {
        self.context.pop();
    }

    fn current_context(&self) -> String {
        self.context.last().cloned().unwrap_or_default()
    }

    fn err(&self, message: impl std::fmt::Display) -> FlatError {
        FlatError::analysis(self.current_context(), message)
    }

    // ---- step 2: validate enums --------------------------------------------

    fn validate_enum(&mut self, decl: &RawDecl) -> FlatResult<()> {
        self.push_context(decl.qualified_name());
        let result = self.validate_enum_inner(decl);
        self.pop_context();
        result
    }

    fn validate_enum_inner(&mut self, decl: &RawDecl) -> FlatResult<()> {
        if decl.attrs.contains_key("bit_flags") {
            flat_bail!(Analysis: self.current_context(), "enum `bit_flags` is not supported");
        }

        let underlying_name = decl
            .underlying_or_members
            .first()
            .map(String::as_str)
            .unwrap_or("i32");
        let underlying = IntegralType::from_name(underlying_name).ok_or_else(|| {
            self.err(format!(
                "enum underlying type `{underlying_name}` is not an integral type"
            ))
        })?;

        if let Some(dup) = decl.values.iter().map(|(name, _)| name).duplicates().next() {
            return Err(self.err(format!("duplicate enum member `{dup}`")));
        }

        let mut members: Vec<(String, i64)> = Vec::with_capacity(decl.values.len());
        let mut next_auto = 0i64;
        for (name, explicit) in &decl.values {
            let value = match explicit {
                Some(v) => *v,
                None => next_auto,
            };
            if !underlying.fits(value) {
                return Err(self.err(format!(
                    "enum member `{name}` value {value} does not fit `{underlying_name}`"
                )));
            }
            if let Some((prev_name, prev_value)) = members.last() {
                if value <= *prev_value {
                    return Err(self.err(format!(
                        "enum values must be strictly ascending: `{prev_name}` = {prev_value}, `{name}` = {value}"
                    )));
                }
            }
            members.push((name.clone(), value));
            next_auto = value + 1;
        }

        if members.is_empty() {
            return Err(self.err("enum must declare at least one member"));
        }

        self.enums.insert(
            decl.qualified_name(),
            EnumDecl {
                namespace: decl.namespace.clone(),
                ident: decl.ident.clone(),
                underlying,
                members,
            },
        );
        Ok(())
    }

    // ---- namespace resolution ----------------------------------------------

    /// Resolve a type reference per spec §4.3 "Namespace resolution":
    /// search `N`, then each namespace prefix of `N` stripped from the
    /// right, then `""`, for a declaration named `candidate.R`.
    fn resolve_namespace(&self, within_namespace: &str, reference: &str) -> Option<(String, String)> {
        let mut candidates = Vec::new();
        if within_namespace.is_empty() {
            candidates.push(String::new());
        } else {
            let parts: Vec<&str> = within_namespace.split('.').collect();
            for end in (0..=parts.len()).rev() {
                candidates.push(parts[..end].join("."));
            }
        }
        for candidate in &candidates {
            let key = (candidate.clone(), reference.to_string());
            if self.decls.contains_key(&key) || self.enums.contains_key(&qualify(candidate, reference))
                || self.structs.contains_key(&qualify(candidate, reference))
            {
                if candidate != within_namespace {
                    warn!(
                        "type `{reference}` resolved from namespace `{within_namespace}` via outer namespace `{candidate}`"
                    );
                }
                return Some(key);
            }
        }
        None
    }

    fn resolve_type(&self, within_namespace: &str, reference: &str) -> FlatResult<(String, String)> {
        self.resolve_namespace(within_namespace, reference).ok_or_else(|| {
            let tried: Vec<String> = if within_namespace.is_empty() {
                vec![String::new()]
            } else {
                let parts: Vec<&str> = within_namespace.split('.').collect();
                (0..=parts.len())
                    .rev()
                    .map(|end| parts[..end].join("."))
                    .collect()
            };
            self.err(format!(
                "type '{reference}' does not exist (checked in these namespaces: {})",
                tried.join(", ")
            ))
        })
    }

    // ---- steps 3-4: struct cycle detection + validation --------------------

    fn validate_struct(&mut self, qualified: &str) -> FlatResult<Alignment> {
        if let Some(existing) = self.structs.get(qualified) {
            return Ok(existing.alignment);
        }
        if let Some(pos) = self.struct_stack.iter().position(|s| s == qualified) {
            let cycle = self.struct_stack[pos..]
                .iter()
                .chain(std::iter::once(&qualified.to_string()))
                .cloned()
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(self.err(format!("cyclic dependency detected [{cycle}]")));
        }

        let decl = self
            .decls
            .values()
            .find(|d| d.kind == DeclKind::Struct && d.qualified_name() == qualified)
            .cloned()
            .ok_or_else(|| self.err(format!("struct `{qualified}` is not declared")))?;

        self.push_context(qualified.to_string());
        self.struct_stack.push(qualified.to_string());
        let result = self.validate_struct_inner(&decl);
        self.struct_stack.pop();
        self.pop_context();
        result
    }

    fn validate_struct_inner(&mut self, decl: &RawDecl) -> FlatResult<Alignment> {
        let mut fields = Vec::with_capacity(decl.fields.len());
        let mut natural_alignment = Alignment::new(1)?;

        if decl.fields.is_empty() {
            return Err(self.err("struct must declare at least one field"));
        }

        for field in &decl.fields {
            if field.attrs.contains_key("deprecated") {
                return Err(self.err(format!(
                    "field `{}`: `deprecated` is not allowed on struct fields",
                    field.name
                )));
            }

            let ty = self.resolve_struct_field_type(&decl.namespace, &field.type_ref)?;
            let field_align = match &ty {
                StructFieldType::Struct(name) => {
                    let a = self.validate_struct(name)?;
                    a.get()
                }
                other => other.natural_alignment(
                    |name| self.structs.get(name).map(|s| s.alignment),
                    |name| self.enums.get(name).map(|e| e.underlying.size()),
                ),
            };
            natural_alignment = natural_alignment.max(Alignment::new(field_align.next_power_of_two())?);

            fields.push(StructField {
                name: field.name.clone(),
                ty,
            });
        }

        let alignment = match decl.attrs.get("force_align") {
            Some(AttrValue::Int(n)) => {
                let requested = Alignment::new(*n as usize)?;
                if requested.get() < natural_alignment.get() {
                    return Err(self.err(format!(
                        "force_align {} is smaller than the natural alignment {}",
                        requested.get(),
                        natural_alignment.get()
                    )));
                }
                requested
            }
            _ => natural_alignment,
        };

        let qualified = decl.qualified_name();
        let struct_decl = StructDecl {
            namespace: decl.namespace.clone(),
            ident: decl.ident.clone(),
            alignment,
            fields,
        };
        self.structs.insert(qualified, struct_decl);
        Ok(alignment)
    }

    fn resolve_struct_field_type(
        &self,
        namespace: &str,
        type_ref: &str,
    ) -> FlatResult<StructFieldType> {
        if let Some(scalar) = IntegralType::from_name(type_ref) {
            return Ok(StructFieldType::Scalar(scalar));
        }
        match type_ref {
            "bool" => return Ok(StructFieldType::Bool),
            "f32" | "float" => return Ok(StructFieldType::F32),
            "f64" | "double" => return Ok(StructFieldType::F64),
            "string" | "table" | "union" => {
                return Err(self.err(format!(
                    "struct fields may not be `{type_ref}` (strings, tables, vectors, and unions are not allowed in structs)"
                )))
            }
            _ if type_ref.starts_with('[') => {
                return Err(
                    self.err("struct fields may not be vectors (vectors are not allowed in structs)")
                )
            }
            _ => {}
        }

        let (ref_ns, ref_ident) = self.resolve_type(namespace, type_ref)?;
        let qualified = qualify(&ref_ns, &ref_ident);
        if self.enums.contains_key(&qualified) {
            Ok(StructFieldType::Enum(qualified))
        } else if self
            .decls
            .get(&(ref_ns, ref_ident))
            .map(|d| d.kind == DeclKind::Struct)
            .unwrap_or(false)
        {
            Ok(StructFieldType::Struct(qualified))
        } else {
            Err(self.err(format!(
                "`{type_ref}` must resolve to an enum or a struct inside another struct"
            )))
        }
    }

    // ---- step 5 (supplemented): validate tables and unions -----------------

    fn validate_table(&mut self, decl: &RawDecl) -> FlatResult<TableDecl> {
        self.push_context(decl.qualified_name());
        let result = self.validate_table_inner(decl);
        self.pop_context();
        result
    }

    fn validate_table_inner(&mut self, decl: &RawDecl) -> FlatResult<TableDecl> {
        let mut fields = Vec::with_capacity(decl.fields.len());

        let ids: Vec<u16> = decl
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| field.id.unwrap_or(index as u16))
            .collect();
        if let Some(&dup) = ids.iter().duplicates().next() {
            return Err(self.err(format!("duplicate field id {dup}")));
        }

        for (index, field) in decl.fields.iter().enumerate() {
            let id = ids[index];
            let deprecated = field.attrs.contains_key("deprecated");
            let required = field.attrs.contains_key("required");

            let ty = self.resolve_table_field_type(&decl.namespace, field, required)?;
            if required && !matches!(
                ty,
                TableFieldType::String { .. }
                    | TableFieldType::Vector { .. }
                    | TableFieldType::Table { .. }
                    | TableFieldType::Struct { .. }
                    | TableFieldType::Union { .. }
            ) {
                return Err(self.err(format!(
                    "`required` is only meaningful on string/vector/table/struct/union fields, not on `{}`",
                    field.name
                )));
            }

            fields.push(TableField {
                id,
                name: field.name.clone(),
                ty,
                deprecated,
            });
        }

        Ok(TableDecl {
            namespace: decl.namespace.clone(),
            ident: decl.ident.clone(),
            fields,
        })
    }

    fn resolve_table_field_type(
        &self,
        namespace: &str,
        field: &super::raw::RawField,
        required: bool,
    ) -> FlatResult<TableFieldType> {
        let type_ref = field.type_ref.as_str();

        if let Some(scalar) = IntegralType::from_name(type_ref) {
            let default = field
                .default
                .as_ref()
                .and_then(|d| d.parse::<i64>().ok())
                .unwrap_or(0);
            return Ok(TableFieldType::Scalar {
                ty: scalar,
                default,
            });
        }
        match type_ref {
            "bool" => {
                let default = field
                    .default
                    .as_deref()
                    .map(|d| d == "true")
                    .unwrap_or(false);
                return Ok(TableFieldType::Bool { default });
            }
            "f32" | "float" => {
                let default = field
                    .default
                    .as_ref()
                    .and_then(|d| d.parse::<f32>().ok())
                    .unwrap_or(0.0);
                return Ok(TableFieldType::F32 { default });
            }
            "f64" | "double" => {
                let default = field
                    .default
                    .as_ref()
                    .and_then(|d| d.parse::<f64>().ok())
                    .unwrap_or(0.0);
                return Ok(TableFieldType::F64 { default });
            }
            "string" => return Ok(TableFieldType::String { required }),
            _ if type_ref.starts_with('[') && type_ref.ends_with(']') => {
                let inner = &type_ref[1..type_ref.len() - 1];
                let inner_field = super::raw::RawField {
                    name: field.name.clone(),
                    type_ref: inner.to_string(),
                    attrs: IndexMap::new(),
                    id: None,
                    default: None,
                };
                let element = self.resolve_table_field_type(namespace, &inner_field, false)?;
                return Ok(TableFieldType::Vector {
                    element: Box::new(element),
                    required,
                });
            }
            _ => {}
        }

        let (ref_ns, ref_ident) = self.resolve_type(namespace, type_ref)?;
        let qualified = qualify(&ref_ns, &ref_ident);
        match self.resolve_kind(&ref_ns, &ref_ident) {
            Some(ResolvedKind::Enum) => {
                let enum_decl = &self.enums[&qualified];
                let default = field
                    .default
                    .as_deref()
                    .and_then(|d| enum_decl.member_value(d))
                    .unwrap_or_else(|| enum_decl.members[0].1);
                Ok(TableFieldType::Enum {
                    name: qualified,
                    default,
                })
            }
            Some(ResolvedKind::Struct) => Ok(TableFieldType::Struct {
                name: qualified,
                required,
            }),
            Some(ResolvedKind::Table) => Ok(TableFieldType::Table {
                name: qualified,
                required,
            }),
            Some(ResolvedKind::Union) => Ok(TableFieldType::Union {
                name: qualified,
                required,
            }),
            None => {
                // Not yet validated as a table/union (validation order
                // runs enums/structs before tables/unions); check the
                // raw decl kind instead.
                match self.decls.get(&(ref_ns, ref_ident)).map(|d| d.kind) {
                    Some(DeclKind::Table) => Ok(TableFieldType::Table {
                        name: qualified,
                        required,
                    }),
                    Some(DeclKind::Union) => Ok(TableFieldType::Union {
                        name: qualified,
                        required,
                    }),
                    _ => Err(self.err(format!("`{type_ref}` does not resolve to a usable field type"))),
                }
            }
        }
    }

    fn resolve_kind(&self, namespace: &str, ident: &str) -> Option<ResolvedKind> {
        let qualified = qualify(namespace, ident);
        if self.enums.contains_key(&qualified) {
            Some(ResolvedKind::Enum)
        } else if self.structs.contains_key(&qualified) {
            Some(ResolvedKind::Struct)
        } else {
            None
        }
    }

    fn validate_union(&mut self, decl: &RawDecl) -> FlatResult<UnionDecl> {
        self.push_context(decl.qualified_name());
        if decl.underlying_or_members.is_empty() {
            let e = self.err("union must declare at least one member type");
            self.pop_context();
            return Err(e);
        }
        let members = decl
            .underlying_or_members
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), (i + 1) as u8))
            .collect();
        self.pop_context();
        Ok(UnionDecl {
            namespace: decl.namespace.clone(),
            ident: decl.ident.clone(),
            members,
        })
    }
}

fn qualify(namespace: &str, ident: &str) -> String {
    if namespace.is_empty() {
        ident.to_string()
    } else {
        format!("{namespace}.{ident}")
    }
}
