use std::{fmt, io, sync::Arc};

use bstr::BString;
use thiserror::Error;

/// A byte that violated the grammar, displayed quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuotedByte(pub u8);

impl fmt::Display for QuotedByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            b'"' => f.write_str("'\"'"),
            c => write!(f, "'{}'", c.escape_ascii()),
        }
    }
}

/// The input violates the Bencode grammar.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{kind} at offset {offset}")]
pub struct SyntaxError {
    /// What went wrong.
    pub kind: SyntaxErrorKind,
    /// Bytes consumed when the error was detected, counting the offending byte.
    pub offset: u64,
}

impl SyntaxError {
    pub(crate) fn rebase(self, base: u64) -> Self {
        Self {
            offset: self.offset + base,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    #[error("invalid character {byte} {context}")]
    InvalidCharacter {
        /// The offending byte.
        byte: QuotedByte,
        /// What the scanner was looking for.
        context: &'static str,
    },
    #[error("string length overflows usize")]
    LengthOverflow,
    #[error("unexpected end of Bencode input")]
    UnexpectedEnd,
}

/// A well-formed value that cannot be stored in its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    /// Description of the Bencode value, such as `list` or `number 300`.
    pub value: String,
    /// Name of the destination type.
    pub target: &'static str,
    /// Offset of the first byte of the offending value.
    pub offset: u64,
    /// Enclosing record type, when binding a record field.
    pub record: Option<&'static str>,
    /// Resolved field name, when binding a record field.
    pub field: Option<&'static str>,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.record, self.field) {
            (Some(record), Some(field)) => write!(
                f,
                "bencode: cannot unmarshal {} into record field {record}.{field} of type {}",
                self.value, self.target
            ),
            _ => write!(
                f,
                "bencode: cannot unmarshal {} into value of type {}",
                self.value, self.target
            ),
        }
    }
}

impl core::error::Error for TypeMismatch {}

/// Everything that can go wrong while decoding.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("bencode: {0}")]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),
    #[error("bencode: unknown field {0:?}")]
    UnknownField(BString),
    #[error("bencode: unmarshal into an absent destination")]
    InvalidDestination,
    #[error("bencode: field {record}.{field} requests quoted-string decoding, which is not supported")]
    QuotedField {
        /// Enclosing record type.
        record: &'static str,
        /// Resolved field name.
        field: &'static str,
    },
    #[error("bencode: field {record}.{field} is flattened but not a record")]
    NotARecord {
        /// Enclosing record type.
        record: &'static str,
        /// Resolved field name.
        field: &'static str,
    },
    #[error("bencode: nesting exceeds {limit} levels at offset {offset}")]
    DepthLimitExceeded {
        /// The configured [`DecoderOptions::max_depth`](crate::DecoderOptions::max_depth).
        limit: usize,
        /// Offset of the first container past the limit.
        offset: u64,
    },
    #[error("bencode: read failed: {0}")]
    Io(Arc<io::Error>),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl DecodeError {
    /// Input offset the error refers to, if it has one.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Syntax(err) => Some(err.offset),
            Self::TypeMismatch(err) => Some(err.offset),
            Self::DepthLimitExceeded { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}
