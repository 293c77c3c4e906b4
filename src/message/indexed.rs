use super::{check_unknown, check_value, MessageStore};
use crate::compare::compare;
use crate::error::FieldError;
use crate::schema::{Cardinality, MessageRef};
use crate::value::{UnknownField, Value};
use crate::wire::WireType;

#[derive(Clone, Debug)]
enum Slot<'s> {
    Singular(Option<Value<IndexedMessage<'s>>>),
    Repeated(Vec<Value<IndexedMessage<'s>>>),
}

/// A message with one storage slot per declared field, laid out in declaration order when the
/// instance is created.
///
/// Field numbers are translated to slot positions through the descriptor, so lookups never search
/// a map of present fields. Behaves identically to [`DynamicMessage`][super::DynamicMessage] in
/// every other respect.
#[derive(Clone, Debug)]
pub struct IndexedMessage<'s> {
    message: MessageRef<'s>,
    slots: Vec<Slot<'s>>,
    unknown: Vec<UnknownField>,
}

impl<'s> IndexedMessage<'s> {
    fn slot_mut(&mut self, number: u32) -> Option<&mut Slot<'s>> {
        let index = self.message.descriptor().index_of(number)?;
        self.slots.get_mut(index)
    }
}

impl<'s> MessageStore<'s> for IndexedMessage<'s> {
    fn new(message: MessageRef<'s>) -> Self {
        let slots = message
            .descriptor()
            .fields()
            .iter()
            .map(|f| match f.cardinality() {
                Cardinality::Singular => Slot::Singular(None),
                Cardinality::Repeated => Slot::Repeated(Vec::new()),
            })
            .collect();
        Self {
            message,
            slots,
            unknown: Vec::new(),
        }
    }

    fn message(&self) -> MessageRef<'s> {
        self.message
    }

    fn get(&self, number: u32) -> Option<&Value<Self>> {
        let index = self.message.descriptor().index_of(number)?;
        match self.slots.get(index) {
            Some(Slot::Singular(v)) => v.as_ref(),
            _ => None,
        }
    }

    fn get_repeated(&self, number: u32) -> &[Value<Self>] {
        let slot = self
            .message
            .descriptor()
            .index_of(number)
            .and_then(|i| self.slots.get(i));
        match slot {
            Some(Slot::Repeated(v)) => v.as_slice(),
            _ => &[],
        }
    }

    fn set(&mut self, number: u32, value: Value<Self>) -> Result<(), FieldError> {
        check_value(self.message, number, &value, false)?;
        for other in self.message.descriptor().oneof_siblings(number) {
            self.take(other);
        }
        if let Some(Slot::Singular(slot)) = self.slot_mut(number) {
            *slot = Some(value);
        }
        Ok(())
    }

    fn append_repeated(&mut self, number: u32, value: Value<Self>) -> Result<(), FieldError> {
        check_value(self.message, number, &value, true)?;
        if let Some(Slot::Repeated(slot)) = self.slot_mut(number) {
            slot.push(value);
        }
        Ok(())
    }

    fn take(&mut self, number: u32) -> Option<Value<Self>> {
        match self.slot_mut(number) {
            Some(Slot::Singular(slot)) => slot.take(),
            _ => None,
        }
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
impl PartialEq for IndexedMessage<'_> {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other).is_equal()
    }
}
