//! Semantic equivalence of two messages.
//!
//! Two messages are equivalent when:
//!
//! - Every singular field has the same presence on both sides and, where present, equal values.
//!   A field explicitly set to its default differs from an absent field.
//! - Every repeated field has the same values in the same order.
//! - For every (field number, wire type) pair, the unknown fields carry the same raw payloads in
//!   the same order.
//!
//! Floats compare by bit pattern, so `0.0` and `-0.0` differ. Two NaNs are equal to each other
//! unless [`CompareOptions::nan_equal`] is turned off.
//!
//! Rather than stopping at the first difference, the checker walks both messages completely and
//! reports every difference with a path to the field.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::CompareOptions;
use crate::message::MessageStore;
use crate::value::{hex, Value};
use crate::wire::WireType;

/// One difference between two messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDiff {
    /// Dotted path to the field, e.g. `parts[1].label`. Unknown fields appear as
    /// `[number:wire_type]`.
    pub path: String,
    pub left: String,
    pub right: String,
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} != {}", self.path, self.left, self.right)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    Different(Vec<FieldDiff>),
}

impl Comparison {
    pub fn is_equal(&self) -> bool {
        matches!(self, Comparison::Equal)
    }

    pub fn diffs(&self) -> &[FieldDiff] {
        match self {
            Comparison::Equal => &[],
            Comparison::Different(diffs) => diffs.as_slice(),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Comparison::Equal => f.write_str("equal"),
            Comparison::Different(diffs) => {
                for (i, diff) in diffs.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{}", diff)?;
                }
                Ok(())
            }
        }
    }
}

const ABSENT: &str = "<absent>";

/// Compare two messages with the default options.
pub fn compare<'s, A, B>(a: &A, b: &B) -> Comparison
where
    A: MessageStore<'s>,
    B: MessageStore<'s>,
{
    compare_with(a, b, &CompareOptions::default())
}

/// Compare two messages. The two sides may use different store types.
pub fn compare_with<'s, A, B>(a: &A, b: &B, options: &CompareOptions) -> Comparison
where
    A: MessageStore<'s>,
    B: MessageStore<'s>,
{
    let mut checker = Checker {
        options,
        diffs: Vec::new(),
    };
    checker.messages(a, b, "");
    if checker.diffs.is_empty() {
        Comparison::Equal
    } else {
        Comparison::Different(checker.diffs)
    }
}

struct Checker<'o> {
    options: &'o CompareOptions,
    diffs: Vec<FieldDiff>,
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

impl Checker<'_> {
    fn diff(&mut self, path: String, left: impl fmt::Display, right: impl fmt::Display) {
        self.diffs.push(FieldDiff {
            path,
            left: left.to_string(),
            right: right.to_string(),
        });
    }

    fn messages<'s, A, B>(&mut self, a: &A, b: &B, prefix: &str)
    where
        A: MessageStore<'s>,
        B: MessageStore<'s>,
    {
        if a.message() != b.message() {
            let path = if prefix.is_empty() { "<root>" } else { prefix };
            self.diff(path.to_string(), a.message().name(), b.message().name());
            return;
        }

        for field in a.message().descriptor().fields_by_number() {
            let number = field.number();
            let path = join(prefix, field.name());
            if field.is_repeated() {
                let (la, lb) = (a.get_repeated(number), b.get_repeated(number));
                if la.len() != lb.len() {
                    self.diff(
                        path,
                        format_args!("{} values", la.len()),
                        format_args!("{} values", lb.len()),
                    );
                    continue;
                }
                for (i, (va, vb)) in la.iter().zip(lb).enumerate() {
                    self.values(va, vb, format!("{}[{}]", path, i));
                }
            } else {
                match (a.get(number), b.get(number)) {
                    (None, None) => (),
                    (Some(va), None) => self.diff(path, va, ABSENT),
                    (None, Some(vb)) => self.diff(path, ABSENT, vb),
                    (Some(va), Some(vb)) => self.values(va, vb, path),
                }
            }
        }

        self.unknown(a, b, prefix);
    }

    fn values<'s, A, B>(&mut self, a: &Value<A>, b: &Value<B>, path: String)
    where
        A: MessageStore<'s>,
        B: MessageStore<'s>,
    {
        let equal = match (a, b) {
            (Value::Message(ma), Value::Message(mb)) => {
                self.messages(&**ma, &**mb, &path);
                return;
            }
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::I32(x), Value::I32(y)) => x == y,
            (Value::I64(x), Value::I64(y)) => x == y,
            (Value::U32(x), Value::U32(y)) => x == y,
            (Value::U64(x), Value::U64(y)) => x == y,
            (Value::Enum(x), Value::Enum(y)) => x == y,
            (Value::F32(x), Value::F32(y)) => {
                x.to_bits() == y.to_bits() || (self.options.nan_equal && x.is_nan() && y.is_nan())
            }
            (Value::F64(x), Value::F64(y)) => {
                x.to_bits() == y.to_bits() || (self.options.nan_equal && x.is_nan() && y.is_nan())
            }
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Bytes(x), Value::Bytes(y)) => x == y,
            _ => false,
        };
        if !equal {
            self.diff(path, a, b);
        }
    }

    fn unknown<'s, A, B>(&mut self, a: &A, b: &B, prefix: &str)
    where
        A: MessageStore<'s>,
        B: MessageStore<'s>,
    {
        let mut groups: BTreeMap<(u32, WireType), (Vec<&[u8]>, Vec<&[u8]>)> = BTreeMap::new();
        for u in a.unknown_fields() {
            groups
                .entry((u.number(), u.wire_type()))
                .or_default()
                .0
                .push(u.data());
        }
        for u in b.unknown_fields() {
            groups
                .entry((u.number(), u.wire_type()))
                .or_default()
                .1
                .push(u.data());
        }
        for ((number, wire_type), (la, lb)) in groups {
            if la != lb {
                self.diff(
                    join(prefix, &format!("[{}:{}]", number, wire_type)),
                    summarize(&la),
                    summarize(&lb),
                );
            }
        }
    }
}

fn summarize(payloads: &[&[u8]]) -> String {
    if payloads.is_empty() {
        return ABSENT.to_string();
    }
    let parts: Vec<String> = payloads.iter().map(|p| format!("({})", hex(p))).collect();
    parts.join(" ")
}
