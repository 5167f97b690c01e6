use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::value::ValueType;

/// Declared constraint on an annotation's values.
///
/// The matching resolver variant derives its verifier from this at setup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    #[default]
    None,
    IntRange {
        min: i64,
        max: i64,
    },
    FloatRange {
        min: f64,
        max: f64,
    },
    OneOf(BTreeSet<String>),
}

/// Declaration of one annotation on a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationManifest {
    pub key: String,
    pub value_type: ValueType,
    pub constraint: Constraint,
}

impl AnnotationManifest {
    pub fn new(key: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            key: key.into(),
            value_type,
            constraint: Constraint::None,
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = constraint;
        self
    }
}

/// Declaration of a layer: its annotations and whether undeclared keys from
/// metadata lines may be stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerManifest {
    pub id: String,
    pub annotations: Vec<AnnotationManifest>,
    pub allow_unknown_keys: bool,
}

impl LayerManifest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            annotations: Vec::new(),
            allow_unknown_keys: false,
        }
    }

    pub fn with_annotation(mut self, annotation: AnnotationManifest) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn allowing_unknown_keys(mut self) -> Self {
        self.allow_unknown_keys = true;
        self
    }

    pub fn annotation(&self, key: &str) -> Option<&AnnotationManifest> {
        self.annotations.iter().find(|a| a.key == key)
    }
}

/// A-priori per-layer size estimates, used only for buffer pre-sizing.
pub trait MetadataRegistry {
    /// Expected number of items per block batch in `layer`, from prior runs.
    fn item_count_estimate(&self, layer: &str) -> Option<usize>;
}

/// In-memory [`MetadataRegistry`].
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    estimates: BTreeMap<String, usize>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_estimate(&mut self, layer: impl Into<String>, estimate: usize) {
        self.estimates.insert(layer.into(), estimate);
    }
}

impl MetadataRegistry for MemoryRegistry {
    fn item_count_estimate(&self, layer: &str) -> Option<usize> {
        self.estimates.get(layer).copied()
    }
}
