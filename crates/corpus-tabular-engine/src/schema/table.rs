use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

use super::block::BlockSchema;
use super::separator::Separator;

/// Root descriptor of a tabular corpus format.
///
/// Validated once at construction and immutable afterwards; the runtime
/// handler tree is compiled from it at converter start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Default column separator for all blocks without an override.
    pub separator: Separator,
    /// Layer group the converted layers belong to.
    pub group: String,
    pub root: BlockSchema,
    #[serde(skip)]
    block_count: OnceLock<usize>,
}

impl TableSchema {
    pub fn new(
        separator: Separator,
        group: impl Into<String>,
        root: BlockSchema,
    ) -> Result<Self, SchemaError> {
        root.validate()?;
        Ok(Self {
            separator,
            group: group.into(),
            root,
            block_count: OnceLock::new(),
        })
    }

    /// Total number of blocks in the schema tree, computed on first use and
    /// cached. Always `1 + Σ(nested counts)`.
    pub fn block_count(&self) -> usize {
        *self.block_count.get_or_init(|| self.root.count_blocks())
    }
}

impl PartialEq for TableSchema {
    fn eq(&self, other: &Self) -> bool {
        self.separator == other.separator && self.group == other.group && self.root == other.root
    }
}
