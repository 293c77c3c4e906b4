use crate::message::MessageStore;
use crate::schema::{FieldDescriptor, MessageRef};
use crate::value::Value;

const INDENT: &str = "  ";

/// Print a message in text form.
///
/// Fields appear in field-number order, one line per value. A singular field is printed exactly
/// when it is present, whatever its value. Unknown fields have no text form and are written as
/// comments, which the parser skips.
pub fn print_text<'s, M: MessageStore<'s>>(msg: &M) -> String {
    let mut out = String::new();
    print_fields(msg, 0, &mut out);
    out
}

fn print_fields<'s, M: MessageStore<'s>>(msg: &M, depth: usize, out: &mut String) {
    let message = msg.message();
    for field in message.descriptor().fields_by_number() {
        if field.is_repeated() {
            for value in msg.get_repeated(field.number()) {
                print_field(message, field, value, depth, out);
            }
        } else if let Some(value) = msg.get(field.number()) {
            print_field(message, field, value, depth, out);
        }
    }
    for unknown in msg.unknown_fields() {
        push_indent(out, depth);
        out.push_str("# ");
        out.push_str(&unknown.to_string());
        out.push('\n');
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn print_field<'s, M: MessageStore<'s>>(
    message: MessageRef<'s>,
    field: &FieldDescriptor,
    value: &Value<M>,
    depth: usize,
    out: &mut String,
) {
    push_indent(out, depth);
    out.push_str(field.name());
    match value {
        Value::Message(inner) => {
            out.push_str(" {\n");
            print_fields(&**inner, depth + 1, out);
            push_indent(out, depth);
            out.push_str("}\n");
        }
        Value::Bool(v) => push_line(out, if *v { "true" } else { "false" }),
        Value::I32(v) => push_line(out, &v.to_string()),
        Value::I64(v) => push_line(out, &v.to_string()),
        Value::U32(v) => push_line(out, &v.to_string()),
        Value::U64(v) => push_line(out, &v.to_string()),
        Value::F32(v) => push_line(out, &float(*v as f64, v.is_nan(), format!("{:?}", v))),
        Value::F64(v) => push_line(out, &float(*v, v.is_nan(), format!("{:?}", v))),
        Value::Str(v) => push_line(out, &quote(v.as_bytes(), true)),
        Value::Bytes(v) => push_line(out, &quote(v, false)),
        Value::Enum(v) => {
            let name = message.enumeration(field).and_then(|e| e.name_of(*v));
            match name {
                Some(name) => push_line(out, name),
                None => push_line(out, &v.to_string()),
            }
        }
    }
}

fn push_line(out: &mut String, literal: &str) {
    out.push_str(": ");
    out.push_str(literal);
    out.push('\n');
}

// `repr` is the shortest round-tripping form at the value's own width.
fn float(v: f64, nan: bool, repr: String) -> String {
    if nan {
        "nan".to_string()
    } else if v.is_infinite() {
        String::from(if v > 0.0 { "inf" } else { "-inf" })
    } else {
        repr
    }
}

/// Quote a string or bytes literal. Strings keep their non-ASCII characters; bytes are printed as
/// ASCII with everything else escaped.
fn quote(data: &[u8], utf8: bool) -> String {
    fn push_byte(out: &mut String, b: u8) {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }

    let mut out = String::with_capacity(data.len() + 2);
    out.push('"');
    match std::str::from_utf8(data) {
        Ok(s) if utf8 => {
            for c in s.chars() {
                if c.is_ascii() || c.is_control() {
                    let mut buf = [0u8; 4];
                    for &b in c.encode_utf8(&mut buf).as_bytes() {
                        push_byte(&mut out, b);
                    }
                } else {
                    out.push(c);
                }
            }
        }
        _ => {
            for &b in data {
                push_byte(&mut out, b);
            }
        }
    }
    out.push('"');
    out
}
