//! protodyn works with protobuf-style messages whose types are only known at run time. A
//! [`Schema`] describing the message types is loaded once, and any message type in it can then be
//! parsed from text, encoded to and decoded from the binary wire format, printed, and compared,
//! all without generated code.
//!
//! The pieces, leaves first:
//!
//! - [`schema`]: the immutable repository of message and enum descriptors. Message types may
//!   refer to themselves or to each other.
//! - [`message`]: per-instance field storage behind the [`MessageStore`] trait, with explicit
//!   presence for singular fields and verbatim storage of unknown fields.
//! - [`encode`] / [`decode`]: the binary wire format. Output is byte-for-byte what any conforming
//!   protobuf implementation produces for the same field order.
//! - [`text`]: a human-readable form, with round-trip guarantees of its own.
//! - [`compare`]: structural equivalence with a field-level diff report.
//!
//! # Example
//!
//! ```
//! # use protodyn::*;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::from_toml(r#"
//!     [[message]]
//!     name = "Counter"
//!
//!     [[message.field]]
//!     name = "count"
//!     number = 1
//!     kind = "int32"
//! "#)?;
//! let counter = schema.resolve("Counter")?;
//!
//! let msg = parse_text(counter, "count: 300")?;
//! let bytes = encode_binary(&msg);
//! assert_eq!(bytes, vec![0x08, 0xac, 0x02]);
//!
//! let back = decode_binary(counter, &bytes)?;
//! assert!(compare(&msg, &back).is_equal());
//! assert_eq!(print_text(&back), "count: 300\n");
//! # Ok(())
//! # }
//! ```
//!
//! # Limits
//!
//! Decoding and text parsing never allocate in proportion to a declared length before checking
//! it against [`Limits::max_length`], and refuse to nest messages deeper than
//! [`Limits::max_depth`]. The defaults are generous; use [`decode_binary_with`] and
//! [`parse_text_with`] to tighten them.
//!
//! # Logging
//!
//! The crate emits [`tracing`] events: `debug` for schema loading and for records salvaged as
//! unknown fields because of a wire type mismatch, `trace` for every unknown field and nested
//! message seen while decoding. No subscriber is installed by the library.

pub mod compare;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod message;
pub mod schema;
pub mod text;
pub mod value;
pub mod varint;
pub mod wire;

pub use self::compare::{compare, compare_with, Comparison, FieldDiff};
pub use self::config::{CompareOptions, Config, Limits};
pub use self::decode::{decode_binary, decode_binary_with, merge_binary};
pub use self::encode::{encode_binary, encode_into};
pub use self::error::{DecodeError, Error, FieldError, ParseError, Result, SchemaError};
pub use self::message::{DynamicMessage, IndexedMessage, MessageStore};
pub use self::schema::{
    Cardinality, EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor, MessageRef, Schema,
    SchemaSource,
};
pub use self::text::{parse_text, parse_text_with, print_text};
pub use self::value::{UnknownField, Value};
pub use self::wire::WireType;
