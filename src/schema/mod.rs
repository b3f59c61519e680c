//! Schema semantic analysis (spec §4.3): turns a raw, parser-produced
//! schema tree into the validated IR of spec §3.2.
//!
//! Feature-gated behind `analyzer` (on by default) because it pulls in
//! `indexmap`, which the encoder/decoder core never needs — the
//! `Cargo.toml` comment on the feature explains the split.

pub mod analyzer;
pub mod ir;
pub mod raw;

pub use analyzer::Analyzer;
pub use ir::ValidatedSchema;
pub use raw::{AttrValue, DeclKind, RawDecl, RawField, RawSchema};
