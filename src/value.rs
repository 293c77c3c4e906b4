use std::fmt;

use crate::schema::Kind;
use crate::wire::WireType;

/// A single field value.
///
/// `M` is the message store type used for nested messages; a nested message is owned by the
/// value holding it, so instance data is always a tree.
///
/// Several schema kinds share a variant. `I32` holds `int32`, `sint32`, and `sfixed32` values;
/// `U64` holds `uint64` and `fixed64`, and so on. The field's declared kind decides how the value
/// is encoded.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<M> {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// An enum value by number. Numbers the enum does not declare are kept as-is.
    Enum(i32),
    Message(Box<M>),
}

impl<M> Value<M> {
    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::Message(_) => "message",
        }
    }

    /// Whether this variant can be stored in a field of the given kind. For message kinds, only
    /// the variant is checked, not the message type.
    pub fn fits(&self, kind: Kind) -> bool {
        use crate::schema::Kind::*;
        matches!(
            (kind, self),
            (Int32 | Sint32 | Sfixed32, Value::I32(_))
                | (Int64 | Sint64 | Sfixed64, Value::I64(_))
                | (Uint32 | Fixed32, Value::U32(_))
                | (Uint64 | Fixed64, Value::U64(_))
                | (Bool, Value::Bool(_))
                | (Float, Value::F32(_))
                | (Double, Value::F64(_))
                | (String, Value::Str(_))
                | (Bytes, Value::Bytes(_))
                | (Enum(_), Value::Enum(_))
                | (Message(_), Value::Message(_))
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(val) = *self {
            Some(val)
        } else {
            None
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::U32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Value::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<i32> {
        match *self {
            Value::Enum(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&M> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut M> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }
}

/// A one-line summary, used in comparison reports. Nested messages are not expanded.
impl<M> fmt::Display for Value<M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{:?}", v),
            Value::F64(v) => write!(f, "{:?}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Bytes(v) => write!(f, "bytes({})", hex(v)),
            Value::Enum(v) => write!(f, "enum {}", v),
            Value::Message(_) => f.write_str("{ ... }"),
        }
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        s.push_str(&format!("{:02x}", b));
    }
    s
}

macro_rules! impl_value_from {
    ($t: ty, $p: ident) => {
        impl<M> From<$t> for Value<M> {
            fn from(v: $t) -> Self {
                Value::$p(v)
            }
        }
    };
}

impl_value_from!(bool, Bool);
impl_value_from!(i32, I32);
impl_value_from!(i64, I64);
impl_value_from!(u32, U32);
impl_value_from!(u64, U64);
impl_value_from!(f32, F32);
impl_value_from!(f64, F64);
impl_value_from!(String, Str);
impl_value_from!(Vec<u8>, Bytes);

impl<M> From<&str> for Value<M> {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<M> From<&[u8]> for Value<M> {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

/// A record the active schema could not interpret: either its field number is not declared, or
/// its wire type disagrees with the declared field.
///
/// The payload is kept exactly as it appeared after the record key, including the length prefix
/// of length-delimited records, and is never reinterpreted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnknownField {
    number: u32,
    wire_type: WireType,
    data: Vec<u8>,
}

impl UnknownField {
    pub(crate) fn new(number: u32, wire_type: WireType, data: Vec<u8>) -> Self {
        Self {
            number,
            wire_type,
            data,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    /// The raw payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}): {}", self.number, self.wire_type, hex(&self.data))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::Kind;

    type V = Value<()>;

    #[test]
    fn fits() {
        assert!(V::I32(1).fits(Kind::Sint32));
        assert!(V::I32(1).fits(Kind::Sfixed32));
        assert!(!V::I32(1).fits(Kind::Int64));
        assert!(V::U64(1).fits(Kind::Fixed64));
        assert!(!V::U64(1).fits(Kind::Uint32));
        assert!(V::from("hi").fits(Kind::String));
        assert!(!V::from("hi").fits(Kind::Bytes));
        assert!(V::from(&b"hi"[..]).fits(Kind::Bytes));
        assert!(!V::Enum(3).fits(Kind::Int32));
    }

    #[test]
    fn accessors() {
        let v = V::from(3.5f64);
        assert_eq!(v.as_f64(), Some(3.5));
        assert_eq!(v.as_f32(), None);
        assert_eq!(V::from(true).as_bool(), Some(true));
        assert_eq!(V::from("x").as_str(), Some("x"));
        assert_eq!(V::Enum(-2).as_enum(), Some(-2));
        assert!(V::I64(0).as_message().is_none());
    }

    #[test]
    fn display() {
        assert_eq!(V::I32(-7).to_string(), "-7");
        assert_eq!(V::F64(1.0).to_string(), "1.0");
        assert_eq!(V::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(V::Bytes(vec![0, 0xff]).to_string(), "bytes(00 ff)");
        let u = UnknownField::new(99, WireType::Varint, vec![0x96, 0x01]);
        assert_eq!(u.to_string(), "99 (varint): 96 01");
    }
}
