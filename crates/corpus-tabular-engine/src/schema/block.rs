use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

use super::attribute::AttributeSchema;
use super::resolver::ResolverSpec;
use super::separator::Separator;

/// Default label marking a field as carrying no value.
pub const DEFAULT_NO_ENTRY_LABEL: &str = "_";

/// How a substitute redirects or extends the default one-item-per-line flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubstituteKind {
    /// The item produced by the column's resolver is registered under the
    /// member name, replacing whatever held it.
    Replacement,
    /// A fresh item is created for this column and registered under the
    /// member name.
    Addition,
    /// Annotations from this column are written to the named member instead
    /// of the current item.
    Target,
}

impl SubstituteKind {
    pub fn label(self) -> &'static str {
        match self {
            SubstituteKind::Replacement => "replacement",
            SubstituteKind::Addition => "addition",
            SubstituteKind::Target => "target",
        }
    }
}

/// Redirects a column to a named member instead of a plain annotation write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstituteSchema {
    pub kind: SubstituteKind,
    pub name: String,
}

impl SubstituteSchema {
    pub fn new(kind: SubstituteKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// One column of a content line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Layer the column's annotations (or structural effects) go to.
    pub layer: String,
    /// Annotation key written by the default resolver.
    pub key: Option<String>,
    /// Overrides the block's no-entry label for this column.
    pub no_entry_label: Option<String>,
    /// Skip this column entirely.
    pub ignore: bool,
    pub resolver: Option<ResolverSpec>,
    /// At most one substitute per [`SubstituteKind`].
    pub substitutes: Vec<SubstituteSchema>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layer: layer.into(),
            key: None,
            no_entry_label: None,
            ignore: false,
            resolver: None,
            substitutes: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_no_entry_label(mut self, label: impl Into<String>) -> Self {
        self.no_entry_label = Some(label.into());
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverSpec) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_substitute(mut self, substitute: SubstituteSchema) -> Self {
        self.substitutes.push(substitute);
        self
    }

    pub fn substitute(&self, kind: SubstituteKind) -> Option<&SubstituteSchema> {
        self.substitutes.iter().find(|s| s.kind == kind)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if !self.ignore && self.key.is_none() && self.resolver.is_none() {
            return Err(SchemaError::UnboundColumn(self.name.clone()));
        }
        for kind in [
            SubstituteKind::Replacement,
            SubstituteKind::Addition,
            SubstituteKind::Target,
        ] {
            if self.substitutes.iter().filter(|s| s.kind == kind).count() > 1 {
                return Err(SchemaError::DuplicateSubstitute {
                    column: self.name.clone(),
                    kind: kind.label().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One hierarchical level of a tabular format: a document holding sentences,
/// a sentence holding token rows, and so on.
///
/// Nested blocks form a tree by value, so the hierarchy is acyclic by
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSchema {
    /// Layer this block's containers and items are created in.
    pub layer: String,
    /// Overrides the table-level separator for this block's content lines.
    pub separator: Option<Separator>,
    /// Absent means "the first non-empty line begins a block".
    pub begin: Option<AttributeSchema>,
    /// Absent means the block ends when its own begin matches again, when the
    /// parent ends, or at end of input.
    pub end: Option<AttributeSchema>,
    /// Free-form attribute lines (comments, metadata).
    pub attributes: Vec<AttributeSchema>,
    pub columns: Vec<ColumnSchema>,
    /// Absorbs fields beyond the declared columns.
    pub fallback_column: Option<ColumnSchema>,
    pub blocks: Vec<BlockSchema>,
    /// Label marking an absent field value; defaults to `_`.
    pub no_entry_label: Option<String>,
    /// Columns map to fields strictly by position.
    pub column_order_fixed: bool,
}

impl BlockSchema {
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            separator: None,
            begin: None,
            end: None,
            attributes: Vec::new(),
            columns: Vec::new(),
            fallback_column: None,
            blocks: Vec::new(),
            no_entry_label: None,
            column_order_fixed: true,
        }
    }

    pub fn with_separator(mut self, separator: Separator) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn with_begin(mut self, begin: AttributeSchema) -> Self {
        self.begin = Some(begin);
        self
    }

    pub fn with_end(mut self, end: AttributeSchema) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_fallback_column(mut self, column: ColumnSchema) -> Self {
        self.fallback_column = Some(column);
        self
    }

    pub fn with_block(mut self, block: BlockSchema) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_no_entry_label(mut self, label: impl Into<String>) -> Self {
        self.no_entry_label = Some(label.into());
        self
    }

    pub fn with_free_column_order(mut self) -> Self {
        self.column_order_fixed = false;
        self
    }

    /// Effective no-entry label for fields of this block.
    pub fn effective_no_entry_label(&self) -> &str {
        self.no_entry_label.as_deref().unwrap_or(DEFAULT_NO_ENTRY_LABEL)
    }

    /// Number of blocks in this subtree, including this one.
    pub(crate) fn count_blocks(&self) -> usize {
        1 + self.blocks.iter().map(BlockSchema::count_blocks).sum::<usize>()
    }

    pub(crate) fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() && self.blocks.is_empty() {
            return Err(SchemaError::EmptyBlock(self.layer.clone()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }
            column.validate()?;
        }
        if let Some(fallback) = &self.fallback_column {
            fallback.validate()?;
        }
        for block in &self.blocks {
            block.validate()?;
        }
        Ok(())
    }
}
