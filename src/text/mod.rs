//! The human-readable text form.
//!
//! ```text
//! # comments run to the end of the line
//! count: 300
//! name: "tab\there \xff"
//! child {
//!   flag: true
//! }
//! tags: 1
//! tags: 2
//! ```
//!
//! Scalars are written `name: literal`, nested messages `name { ... }` (a colon before the brace
//! is accepted). A repeated field gets one entry per value. Entries may be followed by `,` or
//! `;`.
//!
//! Literals:
//!
//! - Integers in decimal, `0x` hex, or octal with a leading `0`, with an optional `-`.
//! - Floats in decimal or exponent form, with an optional `f` suffix, plus `inf` and `nan`.
//! - `true` and `false` for booleans.
//! - Quoted strings and bytes, with `\n \t \r \" \' \\ \xHH` and octal `\NNN` escapes.
//!   Adjacent quoted literals are joined.
//! - Enum values by name or by number.

mod lexer;
mod parse;
mod print;

pub use self::parse::{parse_text, parse_text_with};
pub use self::print::print_text;
