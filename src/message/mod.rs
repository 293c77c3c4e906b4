//! Per-instance field storage.
//!
//! The codecs and the equivalence checker never touch storage directly. They go through the
//! [`MessageStore`] trait, which has two implementations:
//!
//! - [`DynamicMessage`], keyed by field number, works for any message type.
//! - [`IndexedMessage`], which lays out one slot per declared field and addresses them by
//!   declaration index.
//!
//! Both enforce the same rules. A value must fit the field's declared kind, singular fields are
//! set and repeated fields are appended, and a singular field's presence is tracked separately
//! from its value.

mod dynamic;
mod indexed;

pub use self::dynamic::DynamicMessage;
pub use self::indexed::IndexedMessage;

use std::fmt;

use crate::error::FieldError;
use crate::schema::{FieldDescriptor, MessageRef};
use crate::value::{UnknownField, Value};
use crate::wire::{self, WireType};

/// Storage for one message instance, bound to a message type from a schema.
pub trait MessageStore<'s>: Sized + Clone + PartialEq + fmt::Debug {
    /// An empty instance of the given message type.
    fn new(message: MessageRef<'s>) -> Self;

    /// The message type this instance was created for.
    fn message(&self) -> MessageRef<'s>;

    /// The value of a singular field, or `None` if it is not present. Repeated and undeclared
    /// fields are never present.
    fn get(&self, number: u32) -> Option<&Value<Self>>;

    /// The values of a repeated field in insertion order. Empty for singular and undeclared
    /// fields.
    fn get_repeated(&self, number: u32) -> &[Value<Self>];

    /// Set a singular field, marking it present. Setting a member of a oneof clears the other
    /// members.
    fn set(&mut self, number: u32, value: Value<Self>) -> Result<(), FieldError>;

    /// Append to a repeated field.
    fn append_repeated(&mut self, number: u32, value: Value<Self>) -> Result<(), FieldError>;

    /// Remove a singular field's value, leaving the field absent.
    fn take(&mut self, number: u32) -> Option<Value<Self>>;

    /// Unknown fields in the order they were added.
    fn unknown_fields(&self) -> &[UnknownField];

    /// Keep a record the schema does not account for. `data` is the payload exactly as it
    /// followed the record key, which must be a single well-formed payload for `wire_type`.
    fn add_unknown(
        &mut self,
        number: u32,
        wire_type: WireType,
        data: Vec<u8>,
    ) -> Result<(), FieldError>;

    /// Whether a singular field is present.
    fn has(&self, number: u32) -> bool {
        self.get(number).is_some()
    }
}

/// Check that `value` may be stored in field `number` of `message`, with the given cardinality.
/// Returns the field descriptor on success.
pub(crate) fn check_value<'s, M: MessageStore<'s>>(
    message: MessageRef<'s>,
    number: u32,
    value: &Value<M>,
    repeated: bool,
) -> Result<&'s FieldDescriptor, FieldError> {
    let field = message
        .descriptor()
        .field(number)
        .ok_or_else(|| FieldError::NoSuchField {
            message: message.name().to_string(),
            number,
        })?;
    if field.is_repeated() != repeated {
        return Err(FieldError::Cardinality {
            field: field.full_name().to_string(),
            repeated: field.is_repeated(),
        });
    }
    if !value.fits(field.kind()) {
        return Err(FieldError::TypeMismatch {
            field: field.full_name().to_string(),
            expected: field.kind().name().to_string(),
            actual: value.kind_name(),
        });
    }
    if let (Some(expected), Value::Message(nested)) = (message.nested(field), value) {
        if nested.message() != expected {
            return Err(FieldError::TypeMismatch {
                field: field.full_name().to_string(),
                expected: expected.name().to_string(),
                actual: "message of another type",
            });
        }
    }
    Ok(field)
}

// Reserved numbers only restrict what a schema may declare; they are valid on the wire.
pub(crate) fn check_unknown(
    number: u32,
    wire_type: WireType,
    data: &[u8],
) -> Result<(), FieldError> {
    if !(wire::MIN_FIELD_NUMBER..=wire::MAX_FIELD_NUMBER).contains(&number) {
        return Err(FieldError::MalformedUnknown {
            number,
            reason: "field number is out of range",
        });
    }
    wire::validate_payload(wire_type, data)
        .map_err(|reason| FieldError::MalformedUnknown { number, reason })
}
