use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of a resolver implementation.
///
/// The well-known variants form a closed set the engine instantiates itself;
/// `Custom` names are reserved for host-registered implementations and are
/// rejected here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolverId {
    /// Builds one dependency tree per enclosing block from a head column.
    Dependency,
    /// Groups the item stream into segment containers.
    Segments,
    /// Parses a single `key=value` assignment.
    Metadata,
    /// Parses a `key1=v1;key2=v2;...` assignment list.
    PropertyList,
    /// A fully-qualified implementation name.
    Custom(String),
}

impl ResolverId {
    /// Resolves a declared resolver name.
    pub fn named(name: &str) -> ResolverId {
        match name {
            "dependency" => ResolverId::Dependency,
            "segments" => ResolverId::Segments,
            "metadata" => ResolverId::Metadata,
            "property-list" => ResolverId::PropertyList,
            other => ResolverId::Custom(other.to_string()),
        }
    }
}

/// Resolver identity plus its options map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSpec {
    pub id: ResolverId,
    pub options: BTreeMap<String, String>,
}

impl ResolverSpec {
    pub fn new(id: ResolverId) -> Self {
        Self {
            id,
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}
