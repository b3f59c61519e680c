//! Crate-wide error type.
//!
//! One enum covers every fallible surface in `flatforge`: the decoder's
//! recoverable-by-construction taxonomy (spec §7), the encoder's single
//! overflow condition, and the schema analyzer's formatted `[context]:
//! message` failures.

use std::fmt;

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum FlatError {
    /// The buffer was too short, truncated, or otherwise structurally
    /// malformed at the given byte offset.
    #[error("parsing error at byte {byte_offset}: {message}")]
    ParsingError { byte_offset: usize, message: String },

    /// A `required` field (string/vector/table/union/struct) was absent.
    #[error("missing required field `{field_name}`")]
    MissingField { field_name: String },

    /// A string field's bytes were not valid UTF-8.
    #[error("invalid UTF-8 in string field: {message}")]
    Utf8Decoding {
        message: String,
        byte: Option<usize>,
    },

    /// A vector index was out of bounds.
    #[error("vector index {index} out of bounds for length {length}")]
    VectorIndexOutOfBounds { length: usize, index: usize },

    /// An enum's underlying integer did not match any declared member.
    #[error("unknown value {value} for enum `{name}`")]
    EnumUnknown { name: String, value: i64 },

    /// A union's type tag did not match any declared member.
    #[error("unknown union tag {tag} for `{name}`")]
    UnionUnknown { name: String, tag: u8 },

    /// The buffer being built would exceed the 2^31-1 byte position limit.
    #[error("encoded buffer would overflow the 32-bit position limit")]
    Overflow,

    /// A schema failed semantic validation. The message is already
    /// formatted as `[qualified.context]: description` (spec §4.3).
    #[error("{0}")]
    Analysis(String),
}

pub type FlatResult<T> = Result<T, FlatError>;

impl FlatError {
    /// Build an [`FlatError::Analysis`] with the standard `[context]: message`
    /// prefix used throughout the schema analyzer.
    pub fn analysis(context: impl fmt::Display, message: impl fmt::Display) -> Self {
        FlatError::Analysis(format!("[{context}]: {message}"))
    }
}

/// Construct a [`FlatError`] variant with `format!`-style interpolation,
/// without returning from the enclosing function.
///
/// ```ignore
/// let e = flat_err!(ParsingError { byte_offset: 4, message: "short read" });
/// ```
macro_rules! flat_err {
    (Analysis: $ctx:expr, $($arg:tt)*) => {
        $crate::error::FlatError::analysis($ctx, format!($($arg)*))
    };
    (ParsingError: $offset:expr, $($arg:tt)*) => {
        $crate::error::FlatError::ParsingError {
            byte_offset: $offset,
            message: format!($($arg)*),
        }
    };
    (MissingField: $($arg:tt)*) => {
        $crate::error::FlatError::MissingField {
            field_name: format!($($arg)*),
        }
    };
}

/// Like [`flat_err!`], but returns early from the enclosing function.
macro_rules! flat_bail {
    ($($args:tt)*) => {
        return Err(flat_err!($($args)*))
    };
}

pub(crate) use flat_bail;
pub(crate) use flat_err;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_error_formats_context_prefix() {
        let e = FlatError::analysis("Foo.Bar", "type does not exist");
        assert_eq!(e.to_string(), "[Foo.Bar]: type does not exist");
    }

    #[test]
    fn flat_bail_returns_expected_variant() {
        fn inner() -> FlatResult<()> {
            flat_bail!(ParsingError: 12, "buffer ended after {} bytes", 12);
        }
        let err = inner().unwrap_err();
        match err {
            FlatError::ParsingError { byte_offset, .. } => assert_eq!(byte_offset, 12),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
