use serde::Serialize;
use std::sync::Arc;

use crate::schema::{FieldSchema, FieldValue};

/// One parsed bill: every schema field mapped to a value or `None`.
///
/// Records are only produced through [`RecordBuilder`] and are immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    schema: Arc<FieldSchema>,
    values: Vec<Option<FieldValue>>,
}

impl Record {
    /// A record with every field absent.
    pub fn empty(schema: Arc<FieldSchema>) -> Self {
        let values = vec![None; schema.len()];
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let idx = self.schema.position(name)?;
        self.values[idx].as_ref()
    }

    /// `(field name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.schema
            .field_names()
            .zip(self.values.iter().map(Option::as_ref))
    }

    pub fn values(&self) -> &[Option<FieldValue>] {
        &self.values
    }

    /// True when no field was extracted.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Accumulates matcher output. The first value set for a field sticks.
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self { record: Record::empty(schema) }
    }

    /// Set `name` unless an earlier matcher already filled it. Returns whether
    /// the value was stored. Unknown field names and values of the wrong kind
    /// are ignored.
    pub fn set_if_absent(&mut self, name: &str, value: FieldValue) -> bool {
        let Some(idx) = self.record.schema.position(name) else {
            return false;
        };
        if !self.record.schema.kind_of(name).is_some_and(|k| k.accepts(&value)) {
            return false;
        }
        let slot = &mut self.record.values[idx];
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    /// True while no field has been set.
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    pub fn build(self) -> Record {
        self.record
    }
}
