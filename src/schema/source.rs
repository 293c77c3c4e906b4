use serde::{Deserialize, Serialize};

use super::Cardinality;
use crate::error::{Result, SchemaError};

/// The declarative description a [`Schema`][super::Schema] is loaded from.
///
/// This is usually read from TOML, with one `[[message]]` table per message type and one
/// `[[enum]]` table per enum type:
///
/// ```toml
/// [[message]]
/// name = "demo.Point"
///
/// [[message.field]]
/// name = "x"
/// number = 1
/// kind = "sint32"
///
/// [[message.field]]
/// name = "tags"
/// number = 2
/// kind = "enum"
/// type_name = "demo.Tag"
/// cardinality = "repeated"
/// packed = true
///
/// [[enum]]
/// name = "demo.Tag"
/// value = [ { name = "NONE", number = 0 }, { name = "HOT", number = 1 } ]
/// ```
///
/// It can also be assembled in code with the builder methods.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SchemaSource {
    #[serde(rename = "message")]
    pub messages: Vec<MessageDef>,
    #[serde(rename = "enum")]
    pub enums: Vec<EnumDef>,
}

impl SchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml(src: &str) -> Result<Self> {
        toml::from_str(src).map_err(|e| SchemaError::Toml(e.to_string()).into())
    }

    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    pub fn enumeration(mut self, enumeration: EnumDef) -> Self {
        self.enums.push(enumeration);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageDef {
    pub name: String,
    #[serde(rename = "field", default)]
    pub fields: Vec<FieldDef>,
}

impl MessageDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// One field of a [`MessageDef`].
///
/// `kind` is one of the scalar kind names (`int32`, `sint64`, `double`, `string`, ...), or
/// `message` / `enum`, in which case `type_name` names the referenced type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    pub number: u32,
    pub kind: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub packed: bool,
    /// Name of the oneof this field belongs to. Fields sharing a name are mutually exclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oneof: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, number: u32, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number,
            kind: kind.into(),
            cardinality: Cardinality::Singular,
            type_name: None,
            packed: false,
            oneof: None,
        }
    }

    /// A field holding a nested message of the named type.
    pub fn message(name: impl Into<String>, number: u32, type_name: impl Into<String>) -> Self {
        Self::new(name, number, "message").type_name(type_name)
    }

    /// A field holding a value of the named enum type.
    pub fn enumeration(
        name: impl Into<String>,
        number: u32,
        type_name: impl Into<String>,
    ) -> Self {
        Self::new(name, number, "enum").type_name(type_name)
    }

    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    pub fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn oneof(mut self, oneof: impl Into<String>) -> Self {
        self.oneof = Some(oneof.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDef {
    pub name: String,
    #[serde(rename = "value", default)]
    pub values: Vec<EnumValueDef>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push(EnumValueDef {
            name: name.into(),
            number,
        });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumValueDef {
    pub name: String,
    pub number: i32,
}
