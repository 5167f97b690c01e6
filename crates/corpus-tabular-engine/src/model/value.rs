use serde::{Deserialize, Serialize};

/// Declared value type of an annotation.
///
/// Selects, once at converter setup, which type-specialized resolver variant
/// handles a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    /// Stored verbatim through the boxed path.
    Other,
}

/// A typed annotation value, used on the boxed storage path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Integer(_) => ValueType::Integer,
            Value::Long(_) => ValueType::Long,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::Boolean(_) => ValueType::Boolean,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_reports_its_type() {
        assert_eq!(Value::Integer(3).value_type(), ValueType::Integer);
        assert_eq!(
            Value::String("x".into()).value_type(),
            ValueType::String
        );
    }

    #[test]
    fn display_matches_raw_forms() {
        assert_eq!(Value::Long(-7).to_string(), "-7");
        assert_eq!(Value::Boolean(true).to_string(), "true");
    }
}
