// Property tests: random messages through the binary and text codecs.

use proptest::prelude::*;
use protodyn::*;

const SCHEMA: &str = r#"
[[message]]
name = "prop.Sample"

[[message.field]]
name = "small"
number = 1
kind = "int32"

[[message.field]]
name = "signed"
number = 2
kind = "sint64"

[[message.field]]
name = "fixed"
number = 3
kind = "fixed32"

[[message.field]]
name = "ratio"
number = 4
kind = "double"

[[message.field]]
name = "weight"
number = 5
kind = "float"

[[message.field]]
name = "label"
number = 6
kind = "string"

[[message.field]]
name = "blob"
number = 7
kind = "bytes"

[[message.field]]
name = "flag"
number = 8
kind = "bool"

[[message.field]]
name = "state"
number = 9
kind = "enum"
type_name = "prop.State"

[[message.field]]
name = "child"
number = 10
kind = "message"
type_name = "prop.Sample"

[[message.field]]
name = "nums"
number = 11
kind = "int64"
cardinality = "repeated"
packed = true

[[message.field]]
name = "words"
number = 12
kind = "string"
cardinality = "repeated"

[[message.field]]
name = "kids"
number = 13
kind = "message"
type_name = "prop.Sample"
cardinality = "repeated"

[[message.field]]
name = "offsets"
number = 14
kind = "sfixed32"
cardinality = "repeated"

[[enum]]
name = "prop.State"
value = [ { name = "OFF", number = 0 }, { name = "ON", number = 1 } ]
"#;

#[derive(Clone, Debug)]
enum Op {
    Small(i32),
    Signed(i64),
    Fixed(u32),
    Ratio(f64),
    Weight(f32),
    Label(String),
    Blob(Vec<u8>),
    Flag(bool),
    State(i32),
    Num(i64),
    Word(String),
    Offset(i32),
    UnknownVarint(u32, u64),
    UnknownLen(u32, Vec<u8>),
}

#[derive(Clone, Debug)]
struct Tree {
    ops: Vec<Op>,
    child: Option<Box<Tree>>,
    kids: Vec<Tree>,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<i32>().prop_map(Op::Small),
        any::<i64>().prop_map(Op::Signed),
        any::<u32>().prop_map(Op::Fixed),
        any::<f64>().prop_map(Op::Ratio),
        any::<f32>().prop_map(Op::Weight),
        any::<String>().prop_map(Op::Label),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Op::Blob),
        any::<bool>().prop_map(Op::Flag),
        any::<i32>().prop_map(Op::State),
        any::<i64>().prop_map(Op::Num),
        "[a-z ]{0,8}".prop_map(Op::Word),
        any::<i32>().prop_map(Op::Offset),
        (100u32..200, any::<u64>()).prop_map(|(n, v)| Op::UnknownVarint(n, v)),
        (100u32..200, prop::collection::vec(any::<u8>(), 0..8))
            .prop_map(|(n, v)| Op::UnknownLen(n, v)),
    ]
}

fn tree() -> impl Strategy<Value = Tree> {
    let ops = || prop::collection::vec(op(), 0..10);
    let leaf = ops().prop_map(|ops| Tree {
        ops,
        child: None,
        kids: Vec::new(),
    });
    leaf.prop_recursive(3, 24, 3, move |inner| {
        (
            ops(),
            prop::option::of(inner.clone()),
            prop::collection::vec(inner, 0..3),
        )
            .prop_map(|(ops, child, kids)| Tree {
                ops,
                child: child.map(Box::new),
                kids,
            })
    })
}

fn build<'s, M: MessageStore<'s>>(ty: MessageRef<'s>, tree: &Tree, unknowns: bool) -> M {
    let mut msg = M::new(ty);
    for op in &tree.ops {
        let result = match op {
            Op::Small(v) => msg.set(1, Value::I32(*v)),
            Op::Signed(v) => msg.set(2, Value::I64(*v)),
            Op::Fixed(v) => msg.set(3, Value::U32(*v)),
            Op::Ratio(v) => msg.set(4, Value::F64(*v)),
            Op::Weight(v) => msg.set(5, Value::F32(*v)),
            Op::Label(v) => msg.set(6, Value::Str(v.clone())),
            Op::Blob(v) => msg.set(7, Value::Bytes(v.clone())),
            Op::Flag(v) => msg.set(8, Value::Bool(*v)),
            Op::State(v) => msg.set(9, Value::Enum(*v)),
            Op::Num(v) => msg.append_repeated(11, Value::I64(*v)),
            Op::Word(v) => msg.append_repeated(12, Value::Str(v.clone())),
            Op::Offset(v) => msg.append_repeated(14, Value::I32(*v)),
            Op::UnknownVarint(n, v) if unknowns => {
                let mut data = Vec::new();
                varint::write(&mut data, *v);
                msg.add_unknown(*n, WireType::Varint, data)
            }
            Op::UnknownLen(n, v) if unknowns => {
                let mut data = Vec::new();
                varint::write(&mut data, v.len() as u64);
                data.extend_from_slice(v);
                msg.add_unknown(*n, WireType::Len, data)
            }
            Op::UnknownVarint(..) | Op::UnknownLen(..) => Ok(()),
        };
        result.unwrap();
    }
    if let Some(child) = &tree.child {
        msg.set(10, Value::Message(Box::new(build(ty, child, unknowns))))
            .unwrap();
    }
    for kid in &tree.kids {
        msg.append_repeated(13, Value::Message(Box::new(build(ty, kid, unknowns))))
            .unwrap();
    }
    msg
}

fn binary_roundtrip<'s, M: MessageStore<'s>>(
    ty: MessageRef<'s>,
    tree: &Tree,
) -> Result<(), TestCaseError> {
    let msg: M = build(ty, tree, true);
    let bytes = encode_binary(&msg);
    let back: M = decode_binary_with(ty, &bytes, &Limits::default()).unwrap();
    let cmp = compare(&msg, &back);
    prop_assert!(cmp.is_equal(), "{}", cmp);
    prop_assert_eq!(encode_binary(&back), bytes);
    Ok(())
}

proptest! {
    #[test]
    fn binary_roundtrip_dynamic(tree in tree()) {
        let schema = Schema::from_toml(SCHEMA).unwrap();
        let ty = schema.resolve("prop.Sample").unwrap();
        binary_roundtrip::<DynamicMessage>(ty, &tree)?;
    }

    #[test]
    fn binary_roundtrip_indexed(tree in tree()) {
        let schema = Schema::from_toml(SCHEMA).unwrap();
        let ty = schema.resolve("prop.Sample").unwrap();
        binary_roundtrip::<IndexedMessage>(ty, &tree)?;
    }

    #[test]
    fn stores_agree(tree in tree()) {
        // Both stores encode the same content to the same bytes, and decode each other's output.
        let schema = Schema::from_toml(SCHEMA).unwrap();
        let ty = schema.resolve("prop.Sample").unwrap();
        let dynamic: DynamicMessage = build(ty, &tree, true);
        let indexed: IndexedMessage = build(ty, &tree, true);
        let bytes = encode_binary(&dynamic);
        prop_assert_eq!(&encode_binary(&indexed), &bytes);
        let back: IndexedMessage = decode_binary_with(ty, &bytes, &Limits::default()).unwrap();
        prop_assert!(compare(&dynamic, &back).is_equal());
    }

    #[test]
    fn text_roundtrip(tree in tree()) {
        let schema = Schema::from_toml(SCHEMA).unwrap();
        let ty = schema.resolve("prop.Sample").unwrap();
        let msg: DynamicMessage = build(ty, &tree, false);
        let text = print_text(&msg);
        let back = parse_text(ty, &text).unwrap();
        let cmp = compare(&msg, &back);
        prop_assert!(cmp.is_equal(), "{}\n{}", cmp, text);
        prop_assert_eq!(print_text(&back), text);
    }

    #[test]
    fn truncation_is_detected(tree in tree()) {
        let schema = Schema::from_toml(SCHEMA).unwrap();
        let ty = schema.resolve("prop.Sample").unwrap();
        let msg: DynamicMessage = build(ty, &tree, true);
        let bytes = encode_binary(&msg);
        prop_assume!(!bytes.is_empty());
        let err = decode_binary(ty, &bytes[..bytes.len() - 1]).unwrap_err();
        prop_assert!(
            matches!(err, Error::Decode(DecodeError::Truncated { .. })),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn unknown_field_bytes_survive(v: u64, small: i32) {
        let schema = Schema::from_toml(SCHEMA).unwrap();
        let ty = schema.resolve("prop.Sample").unwrap();
        let mut data = vec![0x08];
        varint::write(&mut data, small as i64 as u64);
        data.extend_from_slice(&[0x98, 0x06]);
        varint::write(&mut data, v);
        let msg = decode_binary(ty, &data).unwrap();
        prop_assert_eq!(msg.unknown_fields().len(), 1);
        prop_assert_eq!(msg.unknown_fields()[0].number(), 99);
        prop_assert_eq!(encode_binary(&msg), data);
    }

    #[test]
    fn explicit_zero_is_present(field in 1u32..10) {
        let schema = Schema::from_toml(SCHEMA).unwrap();
        let ty = schema.resolve("prop.Sample").unwrap();
        let zero: Value<DynamicMessage> = match field {
            1 => Value::I32(0),
            2 => Value::I64(0),
            3 => Value::U32(0),
            4 => Value::F64(0.0),
            5 => Value::F32(0.0),
            6 => Value::Str(String::new()),
            7 => Value::Bytes(Vec::new()),
            8 => Value::Bool(false),
            _ => Value::Enum(0),
        };
        let mut msg = DynamicMessage::new(ty);
        msg.set(field, zero).unwrap();
        let bytes = encode_binary(&msg);
        prop_assert!(!bytes.is_empty());
        let back = decode_binary(ty, &bytes).unwrap();
        prop_assert!(back.has(field));
        prop_assert!(!compare(&back, &DynamicMessage::new(ty)).is_equal());
    }

    #[test]
    fn varint_minimal(v: u64) {
        let mut buf = Vec::new();
        varint::write(&mut buf, v);
        prop_assert_eq!(buf.len(), varint::encoded_len(v));
        prop_assert!(buf.len() <= varint::MAX_VARINT_LEN);
        let mut rest = &buf[..];
        prop_assert_eq!(varint::read(&mut rest), Ok(v));
        prop_assert!(rest.is_empty());
    }

    #[test]
    fn varint_padding_accepted(v in 0u64..(1 << 56)) {
        let mut buf = Vec::new();
        varint::write(&mut buf, v);
        let last = buf.len() - 1;
        buf[last] |= 0x80;
        buf.push(0);
        let mut rest = &buf[..];
        prop_assert_eq!(varint::read(&mut rest), Ok(v));
    }

    #[test]
    fn zigzag(v32: i32, v64: i64) {
        prop_assert_eq!(varint::zigzag_decode_32(varint::zigzag_encode_32(v32)), v32);
        prop_assert_eq!(varint::zigzag_decode_64(varint::zigzag_encode_64(v64)), v64);
        // Small magnitudes stay small.
        prop_assert_eq!(varint::zigzag_encode_64(-1), 1);
        prop_assert_eq!(varint::zigzag_encode_32(1), 2);
    }
}
