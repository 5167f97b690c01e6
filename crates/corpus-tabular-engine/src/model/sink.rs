use std::collections::BTreeMap;

use super::item::ItemId;
use super::value::Value;

/// Annotation storage contract.
///
/// The typed setters form the zero-boxing path; `set_value` is the boxed
/// fallback. `has_typed_storage` is probed once per column at converter
/// setup, never per line.
pub trait AnnotationSink {
    fn set_string(&mut self, item: ItemId, key: &str, value: &str);
    fn set_integer(&mut self, item: ItemId, key: &str, value: i32);
    fn set_long(&mut self, item: ItemId, key: &str, value: i64);
    fn set_float(&mut self, item: ItemId, key: &str, value: f32);
    fn set_double(&mut self, item: ItemId, key: &str, value: f64);
    fn set_boolean(&mut self, item: ItemId, key: &str, value: bool);
    fn set_value(&mut self, item: ItemId, key: &str, value: Value);

    /// Whether `key` has a dedicated primitive-typed consumer.
    fn has_typed_storage(&self, key: &str) -> bool {
        let _ = key;
        false
    }
}

/// In-memory [`AnnotationSink`] storing everything as [`Value`]s.
///
/// Reports typed storage for every key, exercising the primitive path.
#[derive(Debug, Default)]
pub struct MemorySink {
    values: BTreeMap<(ItemId, String), Value>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, item: ItemId, key: &str) -> Option<&Value> {
        self.values.get(&(item, key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(ItemId, String), &Value)> {
        self.values.iter()
    }
}

impl AnnotationSink for MemorySink {
    fn set_string(&mut self, item: ItemId, key: &str, value: &str) {
        self.set_value(item, key, Value::String(value.to_string()));
    }

    fn set_integer(&mut self, item: ItemId, key: &str, value: i32) {
        self.set_value(item, key, Value::Integer(value));
    }

    fn set_long(&mut self, item: ItemId, key: &str, value: i64) {
        self.set_value(item, key, Value::Long(value));
    }

    fn set_float(&mut self, item: ItemId, key: &str, value: f32) {
        self.set_value(item, key, Value::Float(value));
    }

    fn set_double(&mut self, item: ItemId, key: &str, value: f64) {
        self.set_value(item, key, Value::Double(value));
    }

    fn set_boolean(&mut self, item: ItemId, key: &str, value: bool) {
        self.set_value(item, key, Value::Boolean(value));
    }

    fn set_value(&mut self, item: ItemId, key: &str, value: Value) {
        self.values.insert((item, key.to_string()), value);
    }

    fn has_typed_storage(&self, _key: &str) -> bool {
        true
    }
}

/// A sink without typed consumers, forcing the boxed path. Test double.
#[derive(Debug, Default)]
pub struct BoxedOnlySink {
    pub inner: MemorySink,
}

impl AnnotationSink for BoxedOnlySink {
    fn set_string(&mut self, item: ItemId, key: &str, value: &str) {
        self.inner.set_string(item, key, value);
    }

    fn set_integer(&mut self, item: ItemId, key: &str, value: i32) {
        self.inner.set_integer(item, key, value);
    }

    fn set_long(&mut self, item: ItemId, key: &str, value: i64) {
        self.inner.set_long(item, key, value);
    }

    fn set_float(&mut self, item: ItemId, key: &str, value: f32) {
        self.inner.set_float(item, key, value);
    }

    fn set_double(&mut self, item: ItemId, key: &str, value: f64) {
        self.inner.set_double(item, key, value);
    }

    fn set_boolean(&mut self, item: ItemId, key: &str, value: bool) {
        self.inner.set_boolean(item, key, value);
    }

    fn set_value(&mut self, item: ItemId, key: &str, value: Value) {
        self.inner.set_value(item, key, value);
    }
}
