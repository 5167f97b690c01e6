use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::convert::context::Cursor;
use crate::error::{ConvertError, SchemaError};
use crate::model::{AnnotationSink, Constraint, ItemId, LayerBinding, Value, ValueType};

use super::Resolve;

/// Rejects numeric values outside a declared range.
#[derive(Debug, Clone, Copy)]
pub struct IntRangeVerifier {
    min: i64,
    max: i64,
}

impl IntRangeVerifier {
    pub const NAME: &'static str = "int-range";

    fn check(&self, value: i64, cx: &dyn Cursor) -> Result<(), ConvertError> {
        if value < self.min || value > self.max {
            return Err(ConvertError::content(
                cx.line(),
                cx.raw(),
                format!(
                    "verifier `{}` rejected value outside [{}, {}]",
                    Self::NAME,
                    self.min,
                    self.max
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FloatRangeVerifier {
    min: f64,
    max: f64,
}

impl FloatRangeVerifier {
    pub const NAME: &'static str = "float-range";

    fn check(&self, value: f64, cx: &dyn Cursor) -> Result<(), ConvertError> {
        if value < self.min || value > self.max {
            return Err(ConvertError::content(
                cx.line(),
                cx.raw(),
                format!(
                    "verifier `{}` rejected value outside [{}, {}]",
                    Self::NAME,
                    self.min,
                    self.max
                ),
            ));
        }
        Ok(())
    }
}

/// Rejects strings outside a declared value set.
#[derive(Debug, Clone)]
pub struct ValueSetVerifier {
    allowed: BTreeSet<String>,
}

impl ValueSetVerifier {
    pub const NAME: &'static str = "value-set";

    fn check(&self, value: &str, cx: &dyn Cursor) -> Result<(), ConvertError> {
        if !self.allowed.contains(value) {
            return Err(ConvertError::content(
                cx.line(),
                cx.raw(),
                format!("verifier `{}` rejected undeclared value", Self::NAME),
            ));
        }
        Ok(())
    }
}

/// Closed set of type-specialized annotation resolvers.
///
/// The variant is selected once, at setup, from the annotation's declared
/// value type; the numeric and boolean variants additionally record whether
/// the sink has a typed consumer for the key, choosing the zero-boxing path
/// over the boxed `set_value` fallback.
pub enum BasicResolver {
    String {
        sink: Rc<RefCell<dyn AnnotationSink>>,
        key: String,
        verifier: Option<ValueSetVerifier>,
    },
    Integer {
        sink: Rc<RefCell<dyn AnnotationSink>>,
        key: String,
        typed: bool,
        verifier: Option<IntRangeVerifier>,
    },
    Long {
        sink: Rc<RefCell<dyn AnnotationSink>>,
        key: String,
        typed: bool,
        verifier: Option<IntRangeVerifier>,
    },
    Float {
        sink: Rc<RefCell<dyn AnnotationSink>>,
        key: String,
        typed: bool,
        verifier: Option<FloatRangeVerifier>,
    },
    Double {
        sink: Rc<RefCell<dyn AnnotationSink>>,
        key: String,
        typed: bool,
        verifier: Option<FloatRangeVerifier>,
    },
    Boolean {
        sink: Rc<RefCell<dyn AnnotationSink>>,
        key: String,
        typed: bool,
    },
    /// Stores the raw text verbatim through the boxed path.
    Other {
        sink: Rc<RefCell<dyn AnnotationSink>>,
        key: String,
    },
}

impl BasicResolver {
    /// Selects the variant for `key` as declared on the bound layer.
    pub fn for_annotation(binding: &LayerBinding, key: &str) -> Result<Self, SchemaError> {
        let annotation = binding.manifest.annotation(key).ok_or_else(|| {
            SchemaError::UnknownAnnotation {
                layer: binding.manifest.id.clone(),
                key: key.to_string(),
            }
        })?;
        let sink = Rc::clone(&binding.sink);
        let typed = sink.borrow().has_typed_storage(key);
        let key = key.to_string();

        let int_verifier = match annotation.constraint {
            Constraint::IntRange { min, max } => Some(IntRangeVerifier { min, max }),
            _ => None,
        };
        let float_verifier = match annotation.constraint {
            Constraint::FloatRange { min, max } => Some(FloatRangeVerifier { min, max }),
            _ => None,
        };
        let set_verifier = match &annotation.constraint {
            Constraint::OneOf(allowed) => Some(ValueSetVerifier {
                allowed: allowed.clone(),
            }),
            _ => None,
        };

        Ok(match annotation.value_type {
            ValueType::String => BasicResolver::String {
                sink,
                key,
                verifier: set_verifier,
            },
            ValueType::Integer => BasicResolver::Integer {
                sink,
                key,
                typed,
                verifier: int_verifier,
            },
            ValueType::Long => BasicResolver::Long {
                sink,
                key,
                typed,
                verifier: int_verifier,
            },
            ValueType::Float => BasicResolver::Float {
                sink,
                key,
                typed,
                verifier: float_verifier,
            },
            ValueType::Double => BasicResolver::Double {
                sink,
                key,
                typed,
                verifier: float_verifier,
            },
            ValueType::Boolean => BasicResolver::Boolean { sink, key, typed },
            ValueType::Other => BasicResolver::Other { sink, key },
        })
    }
}

fn parse_bool(raw: &str, cx: &dyn Cursor, key: &str) -> Result<bool, ConvertError> {
    match raw {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConvertError::content(
            cx.line(),
            cx.raw(),
            format!("invalid boolean for `{key}`"),
        )),
    }
}

impl Resolve for BasicResolver {
    fn process(&mut self, cx: &dyn Cursor) -> Result<ItemId, ConvertError> {
        let item = cx.item();
        match self {
            BasicResolver::String { sink, key, verifier } => {
                let raw = cx.raw();
                if let Some(v) = verifier {
                    v.check(raw, cx)?;
                }
                sink.borrow_mut().set_string(item, key, raw);
            }
            BasicResolver::Integer {
                sink,
                key,
                typed,
                verifier,
            } => {
                let value: i32 = cx.raw().trim().parse().map_err(|_| {
                    ConvertError::content(cx.line(), cx.raw(), format!("invalid integer for `{key}`"))
                })?;
                if let Some(v) = verifier {
                    v.check(value as i64, cx)?;
                }
                if *typed {
                    sink.borrow_mut().set_integer(item, key, value);
                } else {
                    sink.borrow_mut().set_value(item, key, Value::Integer(value));
                }
            }
            BasicResolver::Long {
                sink,
                key,
                typed,
                verifier,
            } => {
                let value: i64 = cx.raw().trim().parse().map_err(|_| {
                    ConvertError::content(cx.line(), cx.raw(), format!("invalid integer for `{key}`"))
                })?;
                if let Some(v) = verifier {
                    v.check(value, cx)?;
                }
                if *typed {
                    sink.borrow_mut().set_long(item, key, value);
                } else {
                    sink.borrow_mut().set_value(item, key, Value::Long(value));
                }
            }
            BasicResolver::Float {
                sink,
                key,
                typed,
                verifier,
            } => {
                let value: f32 = cx.raw().trim().parse().map_err(|_| {
                    ConvertError::content(cx.line(), cx.raw(), format!("invalid number for `{key}`"))
                })?;
                if let Some(v) = verifier {
                    v.check(value as f64, cx)?;
                }
                if *typed {
                    sink.borrow_mut().set_float(item, key, value);
                } else {
                    sink.borrow_mut().set_value(item, key, Value::Float(value));
                }
            }
            BasicResolver::Double {
                sink,
                key,
                typed,
                verifier,
            } => {
                let value: f64 = cx.raw().trim().parse().map_err(|_| {
                    ConvertError::content(cx.line(), cx.raw(), format!("invalid number for `{key}`"))
                })?;
                if let Some(v) = verifier {
                    v.check(value, cx)?;
                }
                if *typed {
                    sink.borrow_mut().set_double(item, key, value);
                } else {
                    sink.borrow_mut().set_value(item, key, Value::Double(value));
                }
            }
            BasicResolver::Boolean { sink, key, typed } => {
                let value = parse_bool(cx.raw().trim(), cx, key)?;
                if *typed {
                    sink.borrow_mut().set_boolean(item, key, value);
                } else {
                    sink.borrow_mut().set_value(item, key, Value::Boolean(value));
                }
            }
            BasicResolver::Other { sink, key } => {
                sink.borrow_mut()
                    .set_value(item, key, Value::String(cx.raw().to_string()));
            }
        }
        Ok(item)
    }
}
