//! Binary decoding.
//!
//! Decoding is tolerant where the binary format allows it to be:
//!
//! - Records with undeclared field numbers are kept as unknown fields.
//! - A declared field arriving with a different wire type is also kept as an unknown field,
//!   under the number it was seen with.
//! - Repeated packable fields accept both packed and unpacked records, mixed in any order.
//! - A singular scalar seen more than once keeps the last value; a singular message seen more
//!   than once is merged.
//! - Non-minimal varints are accepted.
//!
//! Everything else (truncation, bad varints, bad keys, invalid UTF-8 in string fields, lengths
//! over the configured ceiling, nesting over the depth limit) fails the whole call.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace};

use crate::config::Limits;
use crate::error::{DecodeError, Result};
use crate::message::{DynamicMessage, MessageStore};
use crate::schema::{FieldDescriptor, Kind, MessageRef};
use crate::value::Value;
use crate::varint::{self, zigzag_decode_32, zigzag_decode_64, VarIntError};
use crate::wire::{Parser, Payload, Record, WireType};

/// Decode `data` as a message of the given type, with default limits.
pub fn decode_binary<'s>(message: MessageRef<'s>, data: &[u8]) -> Result<DynamicMessage<'s>> {
    decode_binary_with(message, data, &Limits::default())
}

/// Decode `data` into any message store, with the given limits.
pub fn decode_binary_with<'s, M: MessageStore<'s>>(
    message: MessageRef<'s>,
    data: &[u8],
    limits: &Limits,
) -> Result<M> {
    let mut msg = M::new(message);
    merge_binary(&mut msg, data, limits)?;
    Ok(msg)
}

/// Decode `data` on top of an existing message, following the same merge rules as repeated
/// records within one buffer.
pub fn merge_binary<'s, M: MessageStore<'s>>(
    msg: &mut M,
    data: &[u8],
    limits: &Limits,
) -> Result<()> {
    Decoder { limits }.merge(msg, data, 0, 0)
}

struct Decoder<'l> {
    limits: &'l Limits,
}

impl Decoder<'_> {
    fn merge<'s, M: MessageStore<'s>>(
        &self,
        msg: &mut M,
        data: &[u8],
        offset: usize,
        depth: u32,
    ) -> Result<()> {
        let message = msg.message();
        let descriptor = message.descriptor();
        for record in Parser::new(data, offset, self.limits.max_length) {
            let record = record?;
            let field = match descriptor.field(record.number) {
                Some(field) => field,
                None => {
                    trace!(
                        message = message.name(),
                        number = record.number,
                        wire_type = %record.wire_type,
                        "keeping unknown field"
                    );
                    msg.add_unknown(record.number, record.wire_type, record.raw.to_vec())?;
                    continue;
                }
            };

            if record.wire_type == field.wire_type() {
                self.merge_field(msg, message, field, &record, depth)?;
            } else if field.is_repeated()
                && field.kind().is_packable()
                && record.wire_type == WireType::Len
            {
                if let Payload::Len(bytes) = record.payload {
                    merge_packed(msg, field, bytes, record.payload_offset)?;
                }
            } else {
                debug!(
                    field = field.full_name(),
                    expected = %field.wire_type(),
                    found = %record.wire_type,
                    offset = record.offset,
                    "wire type mismatch, keeping record as unknown field"
                );
                msg.add_unknown(record.number, record.wire_type, record.raw.to_vec())?;
            }
        }
        Ok(())
    }

    fn merge_field<'s, M: MessageStore<'s>>(
        &self,
        msg: &mut M,
        message: MessageRef<'s>,
        field: &FieldDescriptor,
        record: &Record,
        depth: u32,
    ) -> Result<()> {
        let number = field.number();
        let value = match (message.nested(field), record.payload) {
            (Some(nested), Payload::Len(bytes)) => {
                if depth >= self.limits.max_depth {
                    return Err(DecodeError::RecursionLimit {
                        offset: record.offset,
                        limit: self.limits.max_depth,
                    }
                    .into());
                }
                // A singular message seen again is merged into the one already present
                let mut inner = match msg.take(number) {
                    Some(Value::Message(existing)) if !field.is_repeated() => *existing,
                    _ => M::new(nested),
                };
                trace!(field = field.full_name(), len = bytes.len(), "decoding nested message");
                self.merge(&mut inner, bytes, record.payload_offset, depth + 1)?;
                Value::Message(Box::new(inner))
            }
            (_, Payload::Len(bytes)) => len_value(field, bytes, record.payload_offset)?,
            (_, Payload::Varint(v)) => varint_value(field.kind(), v),
            (_, Payload::I32(v)) => fixed32_value(field.kind(), v),
            (_, Payload::I64(v)) => fixed64_value(field.kind(), v),
        };
        if field.is_repeated() {
            msg.append_repeated(number, value)?;
        } else {
            msg.set(number, value)?;
        }
        Ok(())
    }
}

fn merge_packed<'s, M: MessageStore<'s>>(
    msg: &mut M,
    field: &FieldDescriptor,
    bytes: &[u8],
    offset: usize,
) -> Result<()> {
    let kind = field.kind();
    let number = field.number();
    let width = match kind.wire_type() {
        WireType::I32 => 4,
        WireType::I64 => 8,
        _ => {
            let mut rest = bytes;
            while !rest.is_empty() {
                let at = offset + bytes.len() - rest.len();
                let v = varint::read(&mut rest).map_err(|e| match e {
                    VarIntError::Truncated => DecodeError::Truncated {
                        offset: at,
                        needed: rest.len() as u64 + 1,
                        remaining: rest.len(),
                    },
                    VarIntError::Malformed => DecodeError::MalformedVarint { offset: at },
                })?;
                msg.append_repeated(number, varint_value(kind, v))?;
            }
            return Ok(());
        }
    };
    if bytes.len() % width != 0 {
        return Err(DecodeError::InvalidPackedLength {
            offset,
            field: field.full_name().to_string(),
            len: bytes.len(),
            width,
        }
        .into());
    }
    for chunk in bytes.chunks_exact(width) {
        let value = if width == 4 {
            fixed32_value(kind, LittleEndian::read_u32(chunk))
        } else {
            fixed64_value(kind, LittleEndian::read_u64(chunk))
        };
        msg.append_repeated(number, value)?;
    }
    Ok(())
}

// 32-bit kinds keep the low 32 bits of the varint, so a sign-extended negative int32 comes back
// intact.
fn varint_value<M>(kind: Kind, v: u64) -> Value<M> {
    match kind {
        Kind::Int32 => Value::I32(v as i32),
        Kind::Int64 => Value::I64(v as i64),
        Kind::Uint32 => Value::U32(v as u32),
        Kind::Sint32 => Value::I32(zigzag_decode_32(v as u32)),
        Kind::Sint64 => Value::I64(zigzag_decode_64(v)),
        Kind::Bool => Value::Bool(v != 0),
        Kind::Enum(_) => Value::Enum(v as i32),
        _ => Value::U64(v),
    }
}

fn fixed32_value<M>(kind: Kind, v: u32) -> Value<M> {
    match kind {
        Kind::Fixed32 => Value::U32(v),
        Kind::Sfixed32 => Value::I32(v as i32),
        _ => Value::F32(f32::from_bits(v)),
    }
}

fn fixed64_value<M>(kind: Kind, v: u64) -> Value<M> {
    match kind {
        Kind::Fixed64 => Value::U64(v),
        Kind::Sfixed64 => Value::I64(v as i64),
        _ => Value::F64(f64::from_bits(v)),
    }
}

fn len_value<M>(field: &FieldDescriptor, bytes: &[u8], offset: usize) -> Result<Value<M>> {
    if field.kind() == Kind::String {
        let s = std::str::from_utf8(bytes).map_err(|e| DecodeError::InvalidUtf8 {
            offset: offset + e.valid_up_to(),
            field: field.full_name().to_string(),
        })?;
        Ok(Value::Str(s.to_string()))
    } else {
        Ok(Value::Bytes(bytes.to_vec()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::encode_binary;
    use crate::message::IndexedMessage;
    use crate::schema::*;
    use crate::Error;

    fn schema() -> Schema {
        Schema::load(
            &SchemaSource::new()
                .message(
                    MessageDef::new("test.Msg")
                        .field(FieldDef::new("count", 1, "int32"))
                        .field(FieldDef::new("name", 2, "string"))
                        .field(FieldDef::message("child", 3, "test.Msg"))
                        .field(FieldDef::new("nums", 4, "sint32").repeated())
                        .field(FieldDef::new("fixed", 5, "fixed64").repeated())
                        .field(FieldDef::new("flag", 6, "bool"))
                        .field(FieldDef::new("ratio", 7, "float"))
                        .field(FieldDef::enumeration("mood", 8, "test.Mood")),
                )
                .enumeration(EnumDef::new("test.Mood").value("CALM", 0)),
        )
        .unwrap()
    }

    #[test]
    fn count() {
        let schema = schema();
        let msg = decode_binary(schema.resolve("test.Msg").unwrap(), &[0x08, 0xac, 0x02]).unwrap();
        assert_eq!(msg.get(1), Some(&Value::I32(300)));
        assert!(msg.unknown_fields().is_empty());
    }

    #[test]
    fn scalars() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let data = [
            0x08, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01, // count: -1
            0x12, 0x03, b'a', b'b', b'c', // name
            0x30, 0x80, 0x01, // flag: any nonzero is true
            0x3d, 0x00, 0x00, 0xc0, 0x7f, // ratio: NaN
            0x40, 0x07, // mood: undeclared number is kept
        ];
        let msg = decode_binary(ty, &data).unwrap();
        assert_eq!(msg.get(1), Some(&Value::I32(-1)));
        assert_eq!(msg.get(2).and_then(|v| v.as_str()), Some("abc"));
        assert_eq!(msg.get(6), Some(&Value::Bool(true)));
        assert!(msg.get(7).and_then(|v| v.as_f32()).unwrap().is_nan());
        assert_eq!(msg.get(8), Some(&Value::Enum(7)));
    }

    #[test]
    fn non_minimal_varints() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let msg = decode_binary(ty, &[0x88, 0x00, 0x80, 0x80, 0x80, 0x80, 0x00]).unwrap();
        assert_eq!(msg.get(1), Some(&Value::I32(0)));
        assert_eq!(encode_binary(&msg), vec![0x08, 0x00]);
    }

    #[test]
    fn last_one_wins() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let msg = decode_binary(ty, &[0x08, 0x01, 0x08, 0x02]).unwrap();
        assert_eq!(msg.get(1), Some(&Value::I32(2)));
    }

    #[test]
    fn nested_merge() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let data = [
            0x1a, 0x02, 0x08, 0x05, // child { count: 5 }
            0x1a, 0x03, 0x12, 0x01, b'x', // child { name: "x" }
        ];
        let msg = decode_binary(ty, &data).unwrap();
        let child = msg.get(3).and_then(|v| v.as_message()).unwrap();
        assert_eq!(child.get(1), Some(&Value::I32(5)));
        assert_eq!(child.get(2).and_then(|v| v.as_str()), Some("x"));
    }

    #[test]
    fn packed_and_unpacked() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let data = [
            0x20, 0x01, // nums: -1
            0x22, 0x02, 0x02, 0x03, // nums: [1, -2] packed
            0x20, 0x04, // nums: 2
            0x2a, 0x08, 1, 0, 0, 0, 0, 0, 0, 0, // fixed: [1] packed
        ];
        let msg: IndexedMessage = decode_binary_with(ty, &data, &Limits::default()).unwrap();
        let nums: Vec<i32> = msg.get_repeated(4).iter().filter_map(|v| v.as_i32()).collect();
        assert_eq!(nums, vec![-1, 1, -2, 2]);
        assert_eq!(msg.get_repeated(5).len(), 1);
        assert_eq!(msg.get_repeated(5)[0].as_u64(), Some(1));
        assert!(msg.unknown_fields().is_empty());
    }

    #[test]
    fn bad_packed_length() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let err = decode_binary(ty, &[0x2a, 0x03, 1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            Error::Decode(DecodeError::InvalidPackedLength {
                offset: 2,
                field: "test.Msg.fixed".into(),
                len: 3,
                width: 8
            })
        );
        let err = decode_binary(ty, &[0x22, 0x02, 0x80, 0x80]).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Truncated { offset: 2, .. })));
    }

    #[test]
    fn unknown_preserved() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let data = [0x08, 0x01, 0x98, 0x06, 0x96, 0x01, 0x9a, 0x06, 0x01, 0xee];
        let msg = decode_binary(ty, &data).unwrap();
        let unknown = msg.unknown_fields();
        assert_eq!(unknown.len(), 2);
        assert_eq!(unknown[0].number(), 99);
        assert_eq!(unknown[0].wire_type(), WireType::Varint);
        assert_eq!(unknown[0].data(), &[0x96, 0x01]);
        assert_eq!(unknown[1].wire_type(), WireType::Len);
        assert_eq!(unknown[1].data(), &[0x01, 0xee]);
        assert_eq!(encode_binary(&msg), data.to_vec());
    }

    #[test]
    fn reserved_numbers_are_unknown() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let mut data = vec![0x08, 0x01];
        crate::wire::write_key(&mut data, 19000, WireType::Varint);
        data.push(0x01);
        crate::wire::write_key(&mut data, 19999, WireType::Len);
        data.extend_from_slice(&[0x01, 0xaa]);
        let msg = decode_binary(ty, &data).unwrap();
        let numbers: Vec<u32> = msg.unknown_fields().iter().map(|u| u.number()).collect();
        assert_eq!(numbers, vec![19000, 19999]);
        assert_eq!(encode_binary(&msg), data);
    }

    #[test]
    fn oneof_last_member_wins() {
        let schema = Schema::load(
            &SchemaSource::new().message(
                MessageDef::new("test.Choice")
                    .field(FieldDef::new("number", 1, "int32").oneof("value"))
                    .field(FieldDef::new("text", 2, "string").oneof("value"))
                    .field(FieldDef::message("nested", 3, "test.Choice").oneof("value")),
            ),
        )
        .unwrap();
        let ty = schema.resolve("test.Choice").unwrap();
        let data = [0x08, 0x05, 0x12, 0x01, b'x'];
        let msg = decode_binary(ty, &data).unwrap();
        assert!(!msg.has(1));
        assert_eq!(msg.get(2).and_then(|v| v.as_str()), Some("x"));
        assert_eq!(encode_binary(&msg), vec![0x12, 0x01, b'x']);

        let data = [0x12, 0x01, b'x', 0x1a, 0x00, 0x08, 0x05];
        let msg: IndexedMessage = decode_binary_with(ty, &data, &Limits::default()).unwrap();
        assert!(!msg.has(2));
        assert!(!msg.has(3));
        assert_eq!(msg.get(1), Some(&Value::I32(5)));
    }

    #[test]
    fn wire_type_mismatch_is_salvaged() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        // count is a varint field but arrives as fixed32; name is a string but arrives as a
        // varint
        let data = [0x0d, 1, 2, 3, 4, 0x10, 0x05];
        let msg = decode_binary(ty, &data).unwrap();
        assert!(!msg.has(1));
        assert!(!msg.has(2));
        let unknown = msg.unknown_fields();
        assert_eq!(unknown.len(), 2);
        assert_eq!(unknown[0].number(), 1);
        assert_eq!(unknown[0].wire_type(), WireType::I32);
        assert_eq!(unknown[1].number(), 2);
        assert_eq!(encode_binary(&msg), data.to_vec());
    }

    #[test]
    fn truncated() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let mut data = vec![0x12, 0x05];
        data.extend_from_slice(b"hello");
        assert!(decode_binary(ty, &data).is_ok());
        data.pop();
        let err = decode_binary(ty, &data).unwrap_err();
        assert_eq!(
            err,
            Error::Decode(DecodeError::Truncated {
                offset: 2,
                needed: 5,
                remaining: 4
            })
        );
    }

    #[test]
    fn nested_offsets() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        // child { name: <invalid utf-8> }
        let data = [0x08, 0x00, 0x1a, 0x04, 0x12, 0x02, b'a', 0xff];
        let err = decode_binary(ty, &data).unwrap_err();
        assert_eq!(
            err,
            Error::Decode(DecodeError::InvalidUtf8 {
                offset: 7,
                field: "test.Msg.name".into()
            })
        );
    }

    #[test]
    fn limits() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();

        let limits = Limits::new().max_length(4);
        let err = decode_binary_with::<DynamicMessage>(ty, &[0x12, 0x05, 0, 0, 0, 0, 0], &limits)
            .unwrap_err();
        assert_eq!(
            err,
            Error::ResourceExceeded {
                offset: 1,
                declared: 5,
                limit: 4
            }
        );

        // Three levels of child; the third is one too many
        let data = [0x1a, 0x04, 0x1a, 0x02, 0x1a, 0x00];
        let limits = Limits::new().max_depth(3);
        assert!(decode_binary_with::<DynamicMessage>(ty, &data, &limits).is_ok());
        let limits = Limits::new().max_depth(2);
        let err = decode_binary_with::<DynamicMessage>(ty, &data, &limits).unwrap_err();
        assert_eq!(
            err,
            Error::Decode(DecodeError::RecursionLimit { offset: 4, limit: 2 })
        );
    }
}
