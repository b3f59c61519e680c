//! `flatforge`: a zero-copy FlatBuffers wire-format encoder, decoder,
//! and schema semantic analyzer.
//!
//! This crate implements the hard core of the FlatBuffers wire format:
//!
//! - [`builder`] — bottom-up buffer construction, with vtable
//!   deduplication, alignment, and per-type writers.
//! - [`decoder`] — offset-chased, lazy, bounds-checked reads over an
//!   immutable byte buffer.
//! - [`schema`] — a semantic analyzer that turns a parsed `.fbs` schema
//!   tree into a validated intermediate representation (feature
//!   `analyzer`, on by default).
//!
//! Lexing/parsing `.fbs` text, code generation from the validated IR,
//! a CLI, and include-file I/O are all external collaborators — this
//! crate only implements the encoder, the decoder, and the analyzer
//! that sits between a parsed schema and a code generator.

pub mod builder;
pub mod decoder;
pub mod error;
pub mod primitives;

#[cfg(feature = "analyzer")]
pub mod schema;

pub use builder::{Builder, BuilderOptions};
pub use decoder::{check_file_identifier, root_as_table, Str, Table};
pub use error::{FlatError, FlatResult};

#[cfg(all(test, feature = "analyzer"))]
mod scenario_tests;
