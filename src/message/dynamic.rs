use std::collections::BTreeMap;

use super::{check_unknown, check_value, MessageStore};
use crate::compare::compare;
use crate::error::FieldError;
use crate::schema::MessageRef;
use crate::value::{UnknownField, Value};
use crate::wire::WireType;

/// A message whose fields are looked up by number at run time. Works for any message type in a
/// schema.
#[derive(Clone, Debug)]
pub struct DynamicMessage<'s> {
    message: MessageRef<'s>,
    singular: BTreeMap<u32, Value<DynamicMessage<'s>>>,
    repeated: BTreeMap<u32, Vec<Value<DynamicMessage<'s>>>>,
    unknown: Vec<UnknownField>,
}

impl<'s> MessageStore<'s> for DynamicMessage<'s> {
    fn new(message: MessageRef<'s>) -> Self {
        Self {
            message,
            singular: BTreeMap::new(),
            repeated: BTreeMap::new(),
            unknown: Vec::new(),
        }
    }

    fn message(&self) -> MessageRef<'s> {
        self.message
    }

    fn get(&self, number: u32) -> Option<&Value<Self>> {
        self.singular.get(&number)
    }

    fn get_repeated(&self, number: u32) -> &[Value<Self>] {
        self.repeated
            .get(&number)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn set(&mut self, number: u32, value: Value<Self>) -> Result<(), FieldError> {
        check_value(self.message, number, &value, false)?;
        for other in self.message.descriptor().oneof_siblings(number) {
            self.singular.remove(&other);
        }
        self.singular.insert(number, value);
        Ok(())
    }

    fn append_repeated(&mut self, number: u32, value: Value<Self>) -> Result<(), FieldError> {
        check_value(self.message, number, &value, true)?;
        self.repeated.entry(number).or_default().push(value);
        Ok(())
    }

    fn take(&mut self, number: u32) -> Option<Value<Self>> {
        self.singular.remove(&number)
    }

    fn unknown_fields(&self) -> &[UnknownField] {
        &self.unknown
    }

    fn add_unknown(
        &mut self,
        number: u32,
        wire_type: WireType,
        data: Vec<u8>,
    ) -> Result<(), FieldError> {
        check_unknown(number, wire_type, &data)?;
        self.unknown.push(UnknownField::new(number, wire_type, data));
        Ok(())
    }
}

/// Semantic equality, as decided by [`compare`].
impl PartialEq for DynamicMessage<'_> {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other).is_equal()
    }
}
