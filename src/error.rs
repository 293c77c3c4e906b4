use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Any failure produced by the engine.
///
/// Each variant corresponds to the scope of the failure: a schema failure aborts everything built
/// on that schema, while field, parse, decode, and resource failures only affect the single call
/// that produced them.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The schema source could not be turned into a repository, or a lookup failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A value store mutation was rejected.
    #[error(transparent)]
    Field(#[from] FieldError),
    /// Text input failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Binary input failed to decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// A length-delimited field declared a length above the configured ceiling. Nothing was
    /// allocated for it.
    #[error("declared length {declared} at byte {offset} exceeds the limit of {limit} bytes")]
    ResourceExceeded {
        offset: usize,
        declared: u64,
        limit: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("malformed schema at {location}: {reason}")]
    Malformed { location: String, reason: String },
    #[error("field {message}.{field} refers to unknown type {type_name:?}")]
    UnresolvedReference {
        message: String,
        field: String,
        type_name: String,
    },
    #[error("message {message} uses field number {number} more than once")]
    DuplicateFieldNumber { message: String, number: u32 },
    #[error("no message type named {name:?}")]
    NotFound { name: String },
    #[error("schema source is not valid TOML: {0}")]
    Toml(String),
}

impl SchemaError {
    pub(crate) fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// Rejected mutation of a message's field storage.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("message {message} has no field number {number}")]
    NoSuchField { message: String, number: u32 },
    #[error("field {field} expects {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: &'static str,
    },
    #[error("field {field} is {}", cardinality_hint(.repeated))]
    Cardinality { field: String, repeated: bool },
    #[error("unknown field {number} has a payload that is not valid for its wire type: {reason}")]
    MalformedUnknown { number: u32, reason: &'static str },
}

fn cardinality_hint(repeated: &bool) -> &'static str {
    if *repeated {
        "repeated; use append"
    } else {
        "singular; use set"
    }
}

/// Text parse failure. Lines and columns are 1-based; columns count characters.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{line}:{column}: expected {expected}, found {found}")]
    UnexpectedToken {
        line: usize,
        column: usize,
        expected: &'static str,
        found: String,
    },
    #[error("{line}:{column}: message {message} has no field named {name:?}")]
    UnknownField {
        line: usize,
        column: usize,
        message: String,
        name: String,
    },
    #[error("{line}:{column}: field {field} cannot hold {found}: {reason}")]
    TypeMismatch {
        line: usize,
        column: usize,
        field: String,
        found: String,
        reason: String,
    },
    #[error("{line}:{column}: singular field {field} was already set")]
    DuplicateField {
        line: usize,
        column: usize,
        field: String,
    },
    #[error("{line}:{column}: {field} and {other} are both in oneof {oneof}")]
    OneofConflict {
        line: usize,
        column: usize,
        oneof: String,
        field: String,
        other: String,
    },
    #[error("{line}:{column}: nesting deeper than {limit} levels")]
    RecursionLimit {
        line: usize,
        column: usize,
        limit: u32,
    },
}

/// Binary decode failure. Offsets are relative to the start of the top-level buffer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("byte {offset}: needed {needed} bytes but only {remaining} remain")]
    Truncated {
        offset: usize,
        needed: u64,
        remaining: usize,
    },
    #[error("byte {offset}: varint is longer than 10 bytes or overflows 64 bits")]
    MalformedVarint { offset: usize },
    #[error("byte {offset}: invalid wire type {value}")]
    InvalidWireType { offset: usize, value: u8 },
    #[error("byte {offset}: field number {number} is out of range")]
    InvalidFieldNumber { offset: usize, number: u64 },
    #[error("byte {offset}: group encoding (field {number}) is not supported")]
    UnsupportedGroup { offset: usize, number: u32 },
    #[error("byte {offset}: string field {field} is not valid UTF-8")]
    InvalidUtf8 { offset: usize, field: String },
    #[error("byte {offset}: packed field {field} has length {len}, not a multiple of {width}")]
    InvalidPackedLength {
        offset: usize,
        field: String,
        len: usize,
        width: usize,
    },
    #[error("byte {offset}: nesting deeper than {limit} levels")]
    RecursionLimit { offset: usize, limit: u32 },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        let err = Error::from(DecodeError::Truncated {
            offset: 3,
            needed: 5,
            remaining: 4,
        });
        assert_eq!(err.to_string(), "byte 3: needed 5 bytes but only 4 remain");

        let err = Error::ResourceExceeded {
            offset: 1,
            declared: 1 << 40,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "declared length 1099511627776 at byte 1 exceeds the limit of 1024 bytes"
        );

        let err = FieldError::Cardinality {
            field: "Counter.count".into(),
            repeated: false,
        };
        assert_eq!(err.to_string(), "field Counter.count is singular; use set");
    }
}
