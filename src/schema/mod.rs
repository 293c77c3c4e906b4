//! The schema repository.
//!
//! A [`Schema`] is built once from a [`SchemaSource`] and is immutable afterwards. Message and
//! enum descriptors live in arenas and refer to each other by [`MessageId`] / [`EnumId`], so a
//! message type may contain itself (directly or through other types) without the descriptors
//! needing to own each other.
//!
//! Lookups hand out [`MessageRef`] handles: a schema reference paired with a message id. Every
//! message instance carries one, which ties the instance's lifetime to the schema's.
//!
//! # Examples
//!
//! ```
//! # use protodyn::schema::*;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::from_toml(r#"
//!     [[message]]
//!     name = "demo.Node"
//!
//!     [[message.field]]
//!     name = "value"
//!     number = 1
//!     kind = "sint64"
//!
//!     [[message.field]]
//!     name = "children"
//!     number = 2
//!     kind = "message"
//!     type_name = "demo.Node"
//!     cardinality = "repeated"
//! "#)?;
//! let node = schema.resolve("demo.Node")?;
//! let children = node.descriptor().field_by_name("children").unwrap();
//! assert_eq!(node.nested(children).unwrap(), node);
//! # Ok(())
//! # }
//! ```

mod source;

pub use self::source::*;

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::wire::{self, WireType};

/// Index of a message descriptor within its [`Schema`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u32);

/// Index of an enum descriptor within its [`Schema`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnumId(u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Singular,
    Repeated,
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality::Singular
    }
}

/// The declared value kind of a field.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Bool,
    Fixed32,
    Sfixed32,
    Float,
    Fixed64,
    Sfixed64,
    Double,
    String,
    Bytes,
    Enum(EnumId),
    Message(MessageId),
}

impl Kind {
    /// Look up a scalar kind by its schema name. `enum` and `message` need a referenced type and
    /// are not returned here.
    pub fn scalar_from_name(name: &str) -> Option<Kind> {
        use self::Kind::*;
        Some(match name {
            "int32" => Int32,
            "int64" => Int64,
            "uint32" => Uint32,
            "uint64" => Uint64,
            "sint32" => Sint32,
            "sint64" => Sint64,
            "bool" => Bool,
            "fixed32" => Fixed32,
            "sfixed32" => Sfixed32,
            "float" => Float,
            "fixed64" => Fixed64,
            "sfixed64" => Sfixed64,
            "double" => Double,
            "string" => String,
            "bytes" => Bytes,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        use self::Kind::*;
        match self {
            Int32 => "int32",
            Int64 => "int64",
            Uint32 => "uint32",
            Uint64 => "uint64",
            Sint32 => "sint32",
            Sint64 => "sint64",
            Bool => "bool",
            Fixed32 => "fixed32",
            Sfixed32 => "sfixed32",
            Float => "float",
            Fixed64 => "fixed64",
            Sfixed64 => "sfixed64",
            Double => "double",
            String => "string",
            Bytes => "bytes",
            Enum(_) => "enum",
            Message(_) => "message",
        }
    }

    /// The wire type every value of this kind is encoded with.
    pub fn wire_type(&self) -> WireType {
        use self::Kind::*;
        match self {
            Int32 | Int64 | Uint32 | Uint64 | Sint32 | Sint64 | Bool | Enum(_) => WireType::Varint,
            Fixed32 | Sfixed32 | Float => WireType::I32,
            Fixed64 | Sfixed64 | Double => WireType::I64,
            String | Bytes | Message(_) => WireType::Len,
        }
    }

    /// Whether repeated values of this kind may be packed into one length-delimited record.
    pub fn is_packable(&self) -> bool {
        self.wire_type() != WireType::Len
    }
}

#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    name: String,
    full_name: String,
    number: u32,
    cardinality: Cardinality,
    kind: Kind,
    packed: bool,
    oneof: Option<usize>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field name qualified by its message name, e.g. `demo.Node.value`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn wire_type(&self) -> WireType {
        self.kind.wire_type()
    }

    /// Whether repeated values are written as a single packed record.
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Index into [`MessageDescriptor::oneofs`] of the oneof this field belongs to.
    pub fn oneof_index(&self) -> Option<usize> {
        self.oneof
    }
}

/// A set of singular fields of which at most one is present at a time.
#[derive(Clone, Debug)]
pub struct OneofDescriptor {
    name: String,
    numbers: Vec<u32>,
}

impl OneofDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member field numbers, in declaration order.
    pub fn numbers(&self) -> &[u32] {
        &self.numbers
    }
}

#[derive(Clone, Debug)]
pub struct MessageDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
    by_number: BTreeMap<u32, usize>,
    by_name: BTreeMap<String, usize>,
    oneofs: Vec<OneofDescriptor>,
}

impl MessageDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Fields in ascending field-number order.
    pub fn fields_by_number(&self) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.by_number.values().map(move |&i| &self.fields[i])
    }

    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.index_of(number).map(|i| &self.fields[i])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Position of the field with this number in [`fields`][Self::fields].
    pub fn index_of(&self, number: u32) -> Option<usize> {
        self.by_number.get(&number).copied()
    }

    pub fn oneofs(&self) -> &[OneofDescriptor] {
        &self.oneofs
    }

    /// The other members of the oneof field `number` belongs to. Empty if it belongs to none.
    pub fn oneof_siblings(&self, number: u32) -> impl Iterator<Item = u32> + '_ {
        self.field(number)
            .and_then(|f| f.oneof)
            .map(|i| self.oneofs[i].numbers.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
            .filter(move |&n| n != number)
    }
}

#[derive(Clone, Debug)]
pub struct EnumDescriptor {
    name: String,
    values: Vec<(String, i32)>,
}

impl EnumDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[(String, i32)] {
        &self.values
    }

    /// The symbolic name for `number`, if it is a declared value.
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, n)| *n == number)
            .map(|(name, _)| name.as_str())
    }

    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// An immutable set of message and enum descriptors.
#[derive(Clone, Debug)]
pub struct Schema {
    messages: Vec<MessageDescriptor>,
    enums: Vec<EnumDescriptor>,
    message_names: BTreeMap<String, MessageId>,
}

impl Schema {
    /// Build a repository from a parsed schema source, validating every field and resolving every
    /// type reference.
    pub fn load(source: &SchemaSource) -> Result<Self> {
        let type_re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .map_err(|e| SchemaError::malformed("<schema>", e.to_string()))?;
        let ident_re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| SchemaError::malformed("<schema>", e.to_string()))?;

        // First pass: intern every type name so fields can refer to types declared later, or to
        // their own message.
        let mut message_names = BTreeMap::new();
        let mut enum_names = BTreeMap::new();
        for (i, msg) in source.messages.iter().enumerate() {
            if !type_re.is_match(&msg.name) {
                return Err(SchemaError::malformed(&msg.name, "invalid message name").into());
            }
            if message_names.insert(msg.name.clone(), MessageId(i as u32)).is_some() {
                return Err(
                    SchemaError::malformed(&msg.name, "type declared more than once").into(),
                );
            }
        }
        for (i, en) in source.enums.iter().enumerate() {
            if !type_re.is_match(&en.name) {
                return Err(SchemaError::malformed(&en.name, "invalid enum name").into());
            }
            if message_names.contains_key(&en.name)
                || enum_names.insert(en.name.clone(), EnumId(i as u32)).is_some()
            {
                return Err(SchemaError::malformed(&en.name, "type declared more than once").into());
            }
        }

        let enums = source
            .enums
            .iter()
            .map(|en| load_enum(en, &ident_re))
            .collect::<Result<Vec<_>>>()?;

        let messages = source
            .messages
            .iter()
            .map(|msg| load_message(msg, &ident_re, &message_names, &enum_names))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            messages = messages.len(),
            enums = enums.len(),
            "loaded schema"
        );
        Ok(Self {
            messages,
            enums,
            message_names,
        })
    }

    /// Parse a TOML schema source and load it.
    pub fn from_toml(src: &str) -> Result<Self> {
        let source = SchemaSource::from_toml(src)?;
        Self::load(&source)
    }

    /// Find a message type by its full name. A leading `.` is ignored.
    pub fn resolve(&self, name: &str) -> Result<MessageRef<'_>> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.message_names
            .get(name)
            .map(|&id| MessageRef { schema: self, id })
            .ok_or_else(|| {
                SchemaError::NotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    pub fn message(&self, id: MessageId) -> &MessageDescriptor {
        &self.messages[id.0 as usize]
    }

    pub fn enumeration(&self, id: EnumId) -> &EnumDescriptor {
        &self.enums[id.0 as usize]
    }

    /// Every message type, in source order.
    pub fn messages(&self) -> impl Iterator<Item = MessageRef<'_>> + '_ {
        (0..self.messages.len()).map(move |i| MessageRef {
            schema: self,
            id: MessageId(i as u32),
        })
    }
}

fn load_enum(def: &EnumDef, ident_re: &Regex) -> Result<EnumDescriptor> {
    if def.values.is_empty() {
        return Err(SchemaError::malformed(&def.name, "enum has no values").into());
    }
    let mut values: Vec<(String, i32)> = Vec::with_capacity(def.values.len());
    for value in def.values.iter() {
        let location = format!("{}.{}", def.name, value.name);
        if !ident_re.is_match(&value.name) {
            return Err(SchemaError::malformed(location, "invalid enum value name").into());
        }
        if values.iter().any(|(n, _)| *n == value.name) {
            return Err(
                SchemaError::malformed(location, "enum value name used more than once").into(),
            );
        }
        if values.iter().any(|(_, v)| *v == value.number) {
            return Err(
                SchemaError::malformed(location, "enum value number used more than once").into(),
            );
        }
        values.push((value.name.clone(), value.number));
    }
    Ok(EnumDescriptor {
        name: def.name.clone(),
        values,
    })
}

fn load_message(
    def: &MessageDef,
    ident_re: &Regex,
    message_names: &BTreeMap<String, MessageId>,
    enum_names: &BTreeMap<String, EnumId>,
) -> Result<MessageDescriptor> {
    let mut fields = Vec::with_capacity(def.fields.len());
    let mut by_number = BTreeMap::new();
    let mut by_name = BTreeMap::new();
    let mut oneofs: Vec<OneofDescriptor> = Vec::new();

    for (index, field) in def.fields.iter().enumerate() {
        let full_name = format!("{}.{}", def.name, field.name);
        if !ident_re.is_match(&field.name) {
            return Err(SchemaError::malformed(full_name, "invalid field name").into());
        }
        if !wire::is_valid_field_number(field.number) {
            return Err(SchemaError::malformed(
                full_name,
                format!("field number {} is out of range or reserved", field.number),
            )
            .into());
        }
        if by_number.insert(field.number, index).is_some() {
            return Err(SchemaError::DuplicateFieldNumber {
                message: def.name.clone(),
                number: field.number,
            }
            .into());
        }
        if by_name.insert(field.name.clone(), index).is_some() {
            return Err(SchemaError::malformed(full_name, "field name used more than once").into());
        }

        let kind = resolve_kind(def, field, &full_name, message_names, enum_names)?;

        if field.packed {
            if field.cardinality != Cardinality::Repeated {
                return Err(
                    SchemaError::malformed(full_name, "only repeated fields can be packed").into(),
                );
            }
            if !kind.is_packable() {
                return Err(SchemaError::malformed(
                    full_name,
                    format!("{} fields cannot be packed", kind.name()),
                )
                .into());
            }
        }

        let oneof = match &field.oneof {
            Some(name) => {
                if !ident_re.is_match(name) {
                    return Err(SchemaError::malformed(full_name, "invalid oneof name").into());
                }
                if field.cardinality == Cardinality::Repeated {
                    return Err(SchemaError::malformed(
                        full_name,
                        "repeated fields cannot be part of a oneof",
                    )
                    .into());
                }
                let i = match oneofs.iter().position(|o| o.name == *name) {
                    Some(i) => i,
                    None => {
                        oneofs.push(OneofDescriptor {
                            name: name.clone(),
                            numbers: Vec::new(),
                        });
                        oneofs.len() - 1
                    }
                };
                oneofs[i].numbers.push(field.number);
                Some(i)
            }
            None => None,
        };

        fields.push(FieldDescriptor {
            name: field.name.clone(),
            full_name,
            number: field.number,
            cardinality: field.cardinality,
            kind,
            packed: field.packed,
            oneof,
        });
    }

    // Oneof names share the field namespace.
    if let Some(clash) = oneofs.iter().find(|o| by_name.contains_key(&o.name)) {
        return Err(SchemaError::malformed(
            format!("{}.{}", def.name, clash.name),
            "oneof name is also a field name",
        )
        .into());
    }

    Ok(MessageDescriptor {
        name: def.name.clone(),
        fields,
        by_number,
        by_name,
        oneofs,
    })
}

fn resolve_kind(
    message: &MessageDef,
    field: &FieldDef,
    full_name: &str,
    message_names: &BTreeMap<String, MessageId>,
    enum_names: &BTreeMap<String, EnumId>,
) -> Result<Kind> {
    let type_name = field
        .type_name
        .as_deref()
        .map(|n| n.strip_prefix('.').unwrap_or(n));
    let unresolved = |type_name: &str| SchemaError::UnresolvedReference {
        message: message.name.clone(),
        field: field.name.clone(),
        type_name: type_name.to_string(),
    };
    match (field.kind.as_str(), type_name) {
        ("message", Some(type_name)) => message_names
            .get(type_name)
            .map(|&id| Kind::Message(id))
            .ok_or_else(|| unresolved(type_name).into()),
        ("enum", Some(type_name)) => enum_names
            .get(type_name)
            .map(|&id| Kind::Enum(id))
            .ok_or_else(|| unresolved(type_name).into()),
        ("message", None) | ("enum", None) => Err(SchemaError::malformed(
            full_name,
            format!("{} fields need a type_name", field.kind),
        )
        .into()),
        (kind, type_name) => {
            let kind = Kind::scalar_from_name(kind).ok_or_else(|| {
                SchemaError::malformed(full_name, format!("unknown kind {:?}", kind))
            })?;
            if type_name.is_some() {
                return Err(SchemaError::malformed(
                    full_name,
                    format!("{} fields do not take a type_name", kind.name()),
                )
                .into());
            }
            Ok(kind)
        }
    }
}

/// A message type within a particular schema.
#[derive(Copy, Clone)]
pub struct MessageRef<'s> {
    schema: &'s Schema,
    id: MessageId,
}

impl<'s> MessageRef<'s> {
    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn descriptor(&self) -> &'s MessageDescriptor {
        self.schema.message(self.id)
    }

    pub fn name(&self) -> &'s str {
        self.descriptor().name()
    }

    /// The message type of a message-kind field, or `None` for any other kind.
    pub fn nested(&self, field: &FieldDescriptor) -> Option<MessageRef<'s>> {
        match field.kind() {
            Kind::Message(id) => Some(MessageRef {
                schema: self.schema,
                id,
            }),
            _ => None,
        }
    }

    /// The enum type of an enum-kind field, or `None` for any other kind.
    pub fn enumeration(&self, field: &FieldDescriptor) -> Option<&'s EnumDescriptor> {
        match field.kind() {
            Kind::Enum(id) => Some(self.schema.enumeration(id)),
            _ => None,
        }
    }
}

impl PartialEq for MessageRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.id == other.id
    }
}

impl Eq for MessageRef<'_> {}

impl fmt::Debug for MessageRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MessageRef({})", self.name())
    }
}
