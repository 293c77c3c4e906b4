#![no_main]
use libfuzzer_sys::fuzz_target;
use protodyn::*;

const SCHEMA: &str = r#"
[[message]]
name = "fuzz.Node"

[[message.field]]
name = "id"
number = 1
kind = "sint32"

[[message.field]]
name = "name"
number = 2
kind = "string"

[[message.field]]
name = "next"
number = 3
kind = "message"
type_name = "fuzz.Node"

[[message.field]]
name = "values"
number = 4
kind = "fixed64"
cardinality = "repeated"
packed = true

[[message.field]]
name = "children"
number = 5
kind = "message"
type_name = "fuzz.Node"
cardinality = "repeated"
"#;

fuzz_target!(|data: &[u8]| {
    let schema = Schema::from_toml(SCHEMA).unwrap();
    let ty = schema.resolve("fuzz.Node").unwrap();
    let limits = Limits::new().max_length(1 << 20).max_depth(32);
    if let Ok(msg) = decode_binary_with::<DynamicMessage>(ty, data, &limits) {
        // Whatever decodes must survive a second pass unchanged, in either store.
        let bytes = encode_binary(&msg);
        let again: IndexedMessage = decode_binary_with(ty, &bytes, &limits).unwrap();
        assert!(compare(&msg, &again).is_equal());
        assert_eq!(encode_binary(&again), bytes);
    }
});
