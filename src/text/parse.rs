use super::lexer::{Lexer, Token};
use crate::config::Limits;
use crate::error::{Error, ParseError, Result};
use crate::message::{DynamicMessage, MessageStore};
use crate::schema::{FieldDescriptor, Kind, MessageRef};
use crate::value::Value;

/// Parse text as a message of the given type, with default limits.
pub fn parse_text<'s>(message: MessageRef<'s>, text: &str) -> Result<DynamicMessage<'s>> {
    parse_text_with(message, text, &Limits::default())
}

/// Parse text into any message store, with the given limits.
///
/// Stops at the first error. Unlike binary decoding, a field name the message does not declare
/// is always an error.
pub fn parse_text_with<'s, M: MessageStore<'s>>(
    message: MessageRef<'s>,
    text: &str,
    limits: &Limits,
) -> Result<M> {
    let mut parser = TextParser {
        lexer: Lexer::new(text),
        limits,
    };
    let mut msg = M::new(message);
    parser.parse_fields(&mut msg, 0)?;
    Ok(msg)
}

struct TextParser<'a, 'l> {
    lexer: Lexer<'a>,
    limits: &'l Limits,
}

impl TextParser<'_, '_> {
    // Parse fields until end of input (depth 0) or a closing brace (any deeper level).
    fn parse_fields<'s, M: MessageStore<'s>>(&mut self, msg: &mut M, depth: u32) -> Result<()> {
        let message = msg.message();
        loop {
            let (token, pos) = self.lexer.next_token()?;
            let name = match token {
                Token::Eof if depth == 0 => return Ok(()),
                Token::RBrace if depth > 0 => return Ok(()),
                Token::Ident(name) => name,
                other => {
                    let expected = if depth == 0 {
                        "field name"
                    } else {
                        "field name or `}`"
                    };
                    return Err(self.lexer.unexpected(pos, expected, other).into());
                }
            };
            let field = match message.descriptor().field_by_name(&name) {
                Some(field) => field,
                None => {
                    let (line, column) = self.lexer.line_col(pos);
                    return Err(ParseError::UnknownField {
                        line,
                        column,
                        message: message.name().to_string(),
                        name,
                    }
                    .into());
                }
            };

            let value = match message.nested(field) {
                Some(nested) => {
                    if self.lexer.peek()? == &Token::Colon {
                        self.lexer.next_token()?;
                    }
                    let (token, brace) = self.lexer.next_token()?;
                    if token != Token::LBrace {
                        return Err(self.lexer.unexpected(brace, "`{`", token).into());
                    }
                    if depth >= self.limits.max_depth {
                        let (line, column) = self.lexer.line_col(brace);
                        return Err(ParseError::RecursionLimit {
                            line,
                            column,
                            limit: self.limits.max_depth,
                        }
                        .into());
                    }
                    let mut inner = M::new(nested);
                    self.parse_fields(&mut inner, depth + 1)?;
                    Value::Message(Box::new(inner))
                }
                None => {
                    let (token, colon) = self.lexer.next_token()?;
                    if token != Token::Colon {
                        return Err(self.lexer.unexpected(colon, "`:`", token).into());
                    }
                    self.parse_scalar(message, field)?
                }
            };

            if field.is_repeated() {
                msg.append_repeated(field.number(), value)?;
            } else if msg.has(field.number()) {
                let (line, column) = self.lexer.line_col(pos);
                return Err(ParseError::DuplicateField {
                    line,
                    column,
                    field: field.full_name().to_string(),
                }
                .into());
            } else if let Some(other) = oneof_member_set(msg, field) {
                let (line, column) = self.lexer.line_col(pos);
                let oneof = field
                    .oneof_index()
                    .map(|i| message.descriptor().oneofs()[i].name().to_string())
                    .unwrap_or_default();
                return Err(ParseError::OneofConflict {
                    line,
                    column,
                    oneof,
                    field: field.full_name().to_string(),
                    other,
                }
                .into());
            } else {
                msg.set(field.number(), value)?;
            }

            if matches!(self.lexer.peek()?, Token::Comma | Token::Semicolon) {
                self.lexer.next_token()?;
            }
        }
    }

    fn parse_scalar<'s, M>(
        &mut self,
        message: MessageRef<'s>,
        field: &FieldDescriptor,
    ) -> Result<Value<M>> {
        let (mut token, start) = self.lexer.next_token()?;
        let negative = token == Token::Minus;
        if negative {
            token = self.lexer.next_token()?.0;
        }
        let found = if negative {
            format!("-{}", token)
        } else {
            token.to_string()
        };
        let mismatch = |lexer: &Lexer, reason: &str| -> Error {
            let (line, column) = lexer.line_col(start);
            ParseError::TypeMismatch {
                line,
                column,
                field: field.full_name().to_string(),
                found: found.clone(),
                reason: reason.to_string(),
            }
            .into()
        };

        let kind = field.kind();
        let value = match (kind, token) {
            (Kind::Bool, Token::Ident(s)) if !negative => match s.as_str() {
                "true" | "True" | "t" => Value::Bool(true),
                "false" | "False" | "f" => Value::Bool(false),
                _ => return Err(mismatch(&self.lexer, "expected `true` or `false`")),
            },
            (Kind::Bool, Token::Number(s)) if !negative => match s.as_str() {
                "1" => Value::Bool(true),
                "0" => Value::Bool(false),
                _ => return Err(mismatch(&self.lexer, "expected `true` or `false`")),
            },
            (Kind::Float, Token::Number(s)) => match parse_float::<f32>(&s) {
                Some(v) => Value::F32(if negative { -v } else { v }),
                None => return Err(mismatch(&self.lexer, "not a valid float")),
            },
            (Kind::Double, Token::Number(s)) => match parse_float::<f64>(&s) {
                Some(v) => Value::F64(if negative { -v } else { v }),
                None => return Err(mismatch(&self.lexer, "not a valid double")),
            },
            (Kind::Float, Token::Ident(s)) => match special_float(&s) {
                Some(v) => Value::F32(if negative { -v as f32 } else { v as f32 }),
                None => return Err(mismatch(&self.lexer, "not a valid float")),
            },
            (Kind::Double, Token::Ident(s)) => match special_float(&s) {
                Some(v) => Value::F64(if negative { -v } else { v }),
                None => return Err(mismatch(&self.lexer, "not a valid double")),
            },
            (Kind::String, Token::Str(bytes)) if !negative => match String::from_utf8(bytes) {
                Ok(s) => Value::Str(s),
                Err(_) => return Err(mismatch(&self.lexer, "string fields must be valid UTF-8")),
            },
            (Kind::Bytes, Token::Str(bytes)) if !negative => Value::Bytes(bytes),
            (Kind::Enum(_), Token::Ident(s)) if !negative => {
                match message.enumeration(field).and_then(|e| e.number_of(&s)) {
                    Some(n) => Value::Enum(n),
                    None => return Err(mismatch(&self.lexer, "not a value of this enum")),
                }
            }
            (Kind::Enum(_), Token::Number(s)) => match integer(&s, negative) {
                Some(v) => match i32::try_from(v) {
                    Ok(v) => Value::Enum(v),
                    Err(_) => return Err(mismatch(&self.lexer, "out of range for an enum")),
                },
                None => return Err(mismatch(&self.lexer, "not an integer")),
            },
            (kind, Token::Number(s)) if is_integer_kind(kind) => {
                let v = match integer(&s, negative) {
                    Some(v) => v,
                    None => return Err(mismatch(&self.lexer, "not an integer")),
                };
                match integer_value(kind, v) {
                    Some(value) => value,
                    None => {
                        let reason = format!("out of range for {}", kind.name());
                        return Err(mismatch(&self.lexer, &reason));
                    }
                }
            }
            _ => {
                let reason = format!("expected a {} literal", kind.name());
                return Err(mismatch(&self.lexer, &reason));
            }
        };
        Ok(value)
    }
}

// Full name of another member of `field`'s oneof that is already present.
fn oneof_member_set<'s, M: MessageStore<'s>>(
    msg: &M,
    field: &FieldDescriptor,
) -> Option<String> {
    let descriptor = msg.message().descriptor();
    descriptor
        .oneof_siblings(field.number())
        .find(|&n| msg.has(n))
        .and_then(|n| descriptor.field(n))
        .map(|f| f.full_name().to_string())
}

fn is_integer_kind(kind: Kind) -> bool {
    use crate::schema::Kind::*;
    matches!(
        kind,
        Int32 | Int64 | Uint32 | Uint64 | Sint32 | Sint64 | Fixed32 | Sfixed32 | Fixed64 | Sfixed64
    )
}

fn integer_value<M>(kind: Kind, v: i128) -> Option<Value<M>> {
    use crate::schema::Kind::*;
    match kind {
        Int32 | Sint32 | Sfixed32 => i32::try_from(v).ok().map(Value::I32),
        Int64 | Sint64 | Sfixed64 => i64::try_from(v).ok().map(Value::I64),
        Uint32 | Fixed32 => u32::try_from(v).ok().map(Value::U32),
        Uint64 | Fixed64 => u64::try_from(v).ok().map(Value::U64),
        _ => None,
    }
}

/// An integer literal: decimal, `0x` hex, or octal with a leading zero.
fn integer(text: &str, negative: bool) -> Option<i128> {
    let magnitude = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if text.len() > 1 && text.starts_with('0') {
        u64::from_str_radix(&text[1..], 8).ok()?
    } else {
        text.parse::<u64>().ok()?
    };
    let magnitude = magnitude as i128;
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_float<F: std::str::FromStr>(text: &str) -> Option<F> {
    if text.starts_with("0x") || text.starts_with("0X") {
        return None;
    }
    let text = text
        .strip_suffix('f')
        .or_else(|| text.strip_suffix('F'))
        .unwrap_or(text);
    text.parse().ok()
}

fn special_float(ident: &str) -> Option<f64> {
    match ident.to_ascii_lowercase().as_str() {
        "inf" | "infinity" => Some(f64::INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::IndexedMessage;
    use crate::schema::*;

    fn schema() -> Schema {
        Schema::load(
            &SchemaSource::new()
                .message(
                    MessageDef::new("test.Msg")
                        .field(FieldDef::new("count", 1, "int32"))
                        .field(FieldDef::new("name", 2, "string"))
                        .field(FieldDef::message("child", 3, "test.Msg"))
                        .field(FieldDef::new("tags", 4, "uint32").repeated())
                        .field(FieldDef::new("on", 5, "bool"))
                        .field(FieldDef::new("ratio", 6, "double"))
                        .field(FieldDef::new("blob", 7, "bytes"))
                        .field(FieldDef::enumeration("mood", 8, "test.Mood"))
                        .field(FieldDef::new("tiny", 9, "float"))
                        .field(FieldDef::new("big", 10, "sfixed64"))
                        .field(FieldDef::new("word", 11, "string").oneof("pick"))
                        .field(FieldDef::new("num", 12, "int32").oneof("pick")),
                )
                .enumeration(EnumDef::new("test.Mood").value("CALM", 0).value("LOUD", 1)),
        )
        .unwrap()
    }

    #[test]
    fn count() {
        let schema = schema();
        let msg = parse_text(schema.resolve("test.Msg").unwrap(), "count: 300").unwrap();
        assert_eq!(msg.get(1), Some(&Value::I32(300)));
    }

    #[test]
    fn everything() {
        let schema = schema();
        let text = r#"
            # leading comment
            count: -12
            name: "h\x69"
            child {
              count: 0x10
              child: { on: t }
            }
            tags: 1, tags: 2; tags: 010
            ratio: -inf
            blob: "\000\xff"
            mood: LOUD
            tiny: 1.5f
            big: -9223372036854775808
        "#;
        let msg = parse_text(schema.resolve("test.Msg").unwrap(), text).unwrap();
        assert_eq!(msg.get(1), Some(&Value::I32(-12)));
        assert_eq!(msg.get(2).and_then(|v| v.as_str()), Some("hi"));
        let child = msg.get(3).and_then(|v| v.as_message()).unwrap();
        assert_eq!(child.get(1), Some(&Value::I32(16)));
        let grandchild = child.get(3).and_then(|v| v.as_message()).unwrap();
        assert_eq!(grandchild.get(5), Some(&Value::Bool(true)));
        let tags: Vec<u32> = msg.get_repeated(4).iter().filter_map(|v| v.as_u32()).collect();
        assert_eq!(tags, vec![1, 2, 8]);
        assert_eq!(msg.get(6).and_then(|v| v.as_f64()), Some(f64::NEG_INFINITY));
        assert_eq!(msg.get(7).and_then(|v| v.as_bytes()), Some(&[0u8, 0xff][..]));
        assert_eq!(msg.get(8), Some(&Value::Enum(1)));
        assert_eq!(msg.get(9), Some(&Value::F32(1.5)));
        assert_eq!(msg.get(10), Some(&Value::I64(i64::MIN)));
    }

    #[test]
    fn negative_zero() {
        let schema = schema();
        let msg = parse_text(schema.resolve("test.Msg").unwrap(), "ratio: -0.0").unwrap();
        let v = msg.get(6).and_then(|v| v.as_f64()).unwrap();
        assert_eq!(v.to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn open_enum() {
        let schema = schema();
        let msg = parse_text(schema.resolve("test.Msg").unwrap(), "mood: -3").unwrap();
        assert_eq!(msg.get(8), Some(&Value::Enum(-3)));
    }

    #[test]
    fn errors() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let err = |text: &str| parse_text(ty, text).unwrap_err();

        assert_eq!(
            err("count: 1\nnope: 2"),
            Error::Parse(ParseError::UnknownField {
                line: 2,
                column: 1,
                message: "test.Msg".into(),
                name: "nope".into()
            })
        );
        assert_eq!(
            err("count: 1\ncount: 2"),
            Error::Parse(ParseError::DuplicateField {
                line: 2,
                column: 1,
                field: "test.Msg.count".into()
            })
        );
        assert_eq!(
            err("count 1"),
            Error::Parse(ParseError::UnexpectedToken {
                line: 1,
                column: 7,
                expected: "`:`",
                found: "number `1`".into()
            })
        );
        assert_eq!(
            err("count: 3000000000"),
            Error::Parse(ParseError::TypeMismatch {
                line: 1,
                column: 8,
                field: "test.Msg.count".into(),
                found: "number `3000000000`".into(),
                reason: "out of range for int32".into()
            })
        );

        let test_cases = vec![
            "count: \"1\"",
            "count: 1.5",
            "count: true",
            "tags: -1",
            "name: 5",
            "name: \"\\xff\"",
            "on: yes",
            "on: -true",
            "mood: ANGRY",
            "ratio: 1.2.3",
            "ratio: 0x10",
            "blob: -\"x\"",
        ];
        for (index, case) in test_cases.into_iter().enumerate() {
            println!("Test #{}: {}", index, case);
            assert!(
                matches!(err(case), Error::Parse(ParseError::TypeMismatch { .. })),
                "Expected TypeMismatch, got {:?}",
                err(case)
            );
        }

        let test_cases = vec!["child { count: 1", "child count: 1", "}", "count: 1 }", ": 1"];
        for (index, case) in test_cases.into_iter().enumerate() {
            println!("Test #{}: {}", index, case);
            assert!(
                matches!(err(case), Error::Parse(ParseError::UnexpectedToken { .. })),
                "Expected UnexpectedToken, got {:?}",
                err(case)
            );
        }
    }

    #[test]
    fn oneof_members() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let msg: IndexedMessage =
            parse_text_with(ty, "count: 1 num: 3", &Limits::default()).unwrap();
        assert_eq!(msg.get(12), Some(&Value::I32(3)));
        assert!(!msg.has(11));

        assert_eq!(
            parse_text(ty, "word: \"a\" num: 1").unwrap_err(),
            Error::Parse(ParseError::OneofConflict {
                line: 1,
                column: 11,
                oneof: "pick".into(),
                field: "test.Msg.num".into(),
                other: "test.Msg.word".into()
            })
        );
        assert!(matches!(
            parse_text(ty, "num: 1 num: 2").unwrap_err(),
            Error::Parse(ParseError::DuplicateField { .. })
        ));
    }

    #[test]
    fn depth_limit() {
        let schema = schema();
        let ty = schema.resolve("test.Msg").unwrap();
        let text = "child { child { child { } } }";
        let limits = Limits::new().max_depth(3);
        assert!(parse_text_with::<DynamicMessage>(ty, text, &limits).is_ok());
        let limits = Limits::new().max_depth(2);
        assert_eq!(
            parse_text_with::<DynamicMessage>(ty, text, &limits).unwrap_err(),
            Error::Parse(ParseError::RecursionLimit {
                line: 1,
                column: 23,
                limit: 2
            })
        );
    }
}
