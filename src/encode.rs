//! Binary encoding.
//!
//! Output is deterministic. Known fields come first in declaration order, with repeated values
//! in insertion order. Unknown fields follow, in the order they were added. All varints,
//! including record keys and length prefixes, are written in minimal form.

use crate::message::MessageStore;
use crate::schema::{FieldDescriptor, Kind};
use crate::value::Value;
use crate::varint::{self, zigzag_encode_32, zigzag_encode_64};
use crate::wire::{self, WireType};

/// Encode a message into a new buffer.
pub fn encode_binary<'s, M: MessageStore<'s>>(msg: &M) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_into(msg, &mut buf);
    buf
}

/// Encode a message, appending it to `buf`.
pub fn encode_into<'s, M: MessageStore<'s>>(msg: &M, buf: &mut Vec<u8>) {
    let message = msg.message();
    for field in message.descriptor().fields() {
        if field.is_repeated() {
            let values = msg.get_repeated(field.number());
            if values.is_empty() {
                continue;
            }
            if field.is_packed() {
                encode_packed(field, values, buf);
            } else {
                for value in values {
                    encode_field(field, value, buf);
                }
            }
        } else if let Some(value) = msg.get(field.number()) {
            encode_field(field, value, buf);
        }
    }
    for unknown in msg.unknown_fields() {
        wire::write_key(buf, unknown.number(), unknown.wire_type());
        buf.extend_from_slice(unknown.data());
    }
}

fn encode_field<'s, M: MessageStore<'s>>(
    field: &FieldDescriptor,
    value: &Value<M>,
    buf: &mut Vec<u8>,
) {
    wire::write_key(buf, field.number(), field.wire_type());
    encode_payload(field.kind(), value, buf);
}

// All values go into one length-delimited record. Only reached for packable kinds, whose
// payloads carry no length prefix of their own.
fn encode_packed<'s, M: MessageStore<'s>>(
    field: &FieldDescriptor,
    values: &[Value<M>],
    buf: &mut Vec<u8>,
) {
    let mut packed = Vec::new();
    for value in values {
        encode_payload(field.kind(), value, &mut packed);
    }
    wire::write_key(buf, field.number(), WireType::Len);
    varint::write(buf, packed.len() as u64);
    buf.extend_from_slice(&packed);
}

fn write_len(buf: &mut Vec<u8>, data: &[u8]) {
    varint::write(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Write a value's payload. The store has already checked that the value fits `kind`, so the
/// value variant decides the layout and `kind` only picks between the encodings that variant
/// allows.
fn encode_payload<'s, M: MessageStore<'s>>(kind: Kind, value: &Value<M>, buf: &mut Vec<u8>) {
    match value {
        Value::Bool(v) => varint::write(buf, *v as u64),
        Value::I32(v) => match kind {
            Kind::Sint32 => varint::write(buf, zigzag_encode_32(*v) as u64),
            Kind::Sfixed32 => buf.extend_from_slice(&v.to_le_bytes()),
            // Negative int32 values are sign-extended to 64 bits, taking 10 bytes
            _ => varint::write(buf, *v as i64 as u64),
        },
        Value::I64(v) => match kind {
            Kind::Sint64 => varint::write(buf, zigzag_encode_64(*v)),
            Kind::Sfixed64 => buf.extend_from_slice(&v.to_le_bytes()),
            _ => varint::write(buf, *v as u64),
        },
        Value::U32(v) => match kind {
            Kind::Fixed32 => buf.extend_from_slice(&v.to_le_bytes()),
            _ => varint::write(buf, *v as u64),
        },
        Value::U64(v) => match kind {
            Kind::Fixed64 => buf.extend_from_slice(&v.to_le_bytes()),
            _ => varint::write(buf, *v),
        },
        Value::F32(v) => buf.extend_from_slice(&v.to_bits().to_le_bytes()),
        Value::F64(v) => buf.extend_from_slice(&v.to_bits().to_le_bytes()),
        Value::Enum(v) => varint::write(buf, *v as i64 as u64),
        Value::Str(v) => write_len(buf, v.as_bytes()),
        Value::Bytes(v) => write_len(buf, v),
        Value::Message(v) => write_len(buf, &encode_binary(&**v)),
    }
}
