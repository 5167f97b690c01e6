//! # Collaborator Model
//!
//! Contracts the conversion pipeline consumes, and an in-memory realization
//! of each for tests and self-contained hosts.
//!
//! - **`item`**: item/container creation ([`ItemStore`])
//! - **`sink`**: annotation storage ([`AnnotationSink`], typed + boxed paths)
//! - **`structure`**: dependency structure assembly and publishing
//! - **`mapping`**: inter-layer index mappings ([`MappingWriter`])
//! - **`supply`**: segment container supply ([`ComponentSupplier`])
//! - **`manifest`**: layer/annotation declarations and size estimates
//!
//! [`ConversionTarget`] bundles one binding per layer; [`MemoryCorpus`] wires
//! a fully in-memory target and keeps concrete handles for inspection.

pub mod item;
pub mod manifest;
pub mod mapping;
pub mod sink;
pub mod structure;
pub mod supply;
pub mod value;

pub use item::{ContainerId, ItemId, ItemStore, MemoryStore};
pub use manifest::{
    AnnotationManifest, Constraint, LayerManifest, MemoryRegistry, MetadataRegistry,
};
pub use mapping::{MappingWriter, MemoryMappingWriter};
pub use sink::{AnnotationSink, BoxedOnlySink, MemorySink};
pub use structure::{
    Edge, EdgeSource, MemoryStructureBuilder, MemoryStructureCache, Structure, StructureBuilder,
    StructureCache,
};
pub use supply::{ComponentSupplier, StoreSupplier};
pub use value::{Value, ValueType};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::SchemaError;

/// Everything the pipeline may touch on one layer.
#[derive(Clone)]
pub struct LayerBinding {
    pub manifest: LayerManifest,
    pub store: Rc<RefCell<dyn ItemStore>>,
    pub sink: Rc<RefCell<dyn AnnotationSink>>,
    /// Output cache, present on structure layers.
    pub structures: Option<Rc<RefCell<dyn StructureCache>>>,
    /// Structure assembly, present on structure layers.
    pub builder: Option<Rc<RefCell<dyn StructureBuilder>>>,
    /// Segment container supply, present on segment layers.
    pub supplier: Option<Rc<RefCell<dyn ComponentSupplier>>>,
}

impl LayerBinding {
    pub fn new(
        manifest: LayerManifest,
        store: Rc<RefCell<dyn ItemStore>>,
        sink: Rc<RefCell<dyn AnnotationSink>>,
    ) -> Self {
        Self {
            manifest,
            store,
            sink,
            structures: None,
            builder: None,
            supplier: None,
        }
    }
}

/// Per-conversion assembly of layer bindings, mapping writers, and the
/// metadata registry. All handles are `Rc`-shared within one conversion;
/// independent conversions build independent targets.
#[derive(Clone)]
pub struct ConversionTarget {
    layers: BTreeMap<String, LayerBinding>,
    registry: Rc<dyn MetadataRegistry>,
    mappings: BTreeMap<(String, String), Rc<RefCell<dyn MappingWriter>>>,
}

impl ConversionTarget {
    pub fn new(registry: Rc<dyn MetadataRegistry>) -> Self {
        Self {
            layers: BTreeMap::new(),
            registry,
            mappings: BTreeMap::new(),
        }
    }

    pub fn add_layer(&mut self, binding: LayerBinding) {
        self.layers.insert(binding.manifest.id.clone(), binding);
    }

    /// Looks a layer up, failing with a definition error.
    pub fn layer(&self, id: &str) -> Result<&LayerBinding, SchemaError> {
        self.layers
            .get(id)
            .ok_or_else(|| SchemaError::UnknownLayer(id.to_string()))
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerBinding> {
        self.layers.values()
    }

    pub fn add_mapping(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        writer: Rc<RefCell<dyn MappingWriter>>,
    ) {
        self.mappings.insert((from.into(), to.into()), writer);
    }

    /// Probes for a writable mapping between two layers.
    pub fn mapping(&self, from: &str, to: &str) -> Option<Rc<RefCell<dyn MappingWriter>>> {
        self.mappings
            .get(&(from.to_string(), to.to_string()))
            .map(Rc::clone)
    }

    pub fn registry(&self) -> &dyn MetadataRegistry {
        self.registry.as_ref()
    }
}

/// Fully in-memory [`ConversionTarget`] with concrete handles kept around so
/// converted content can be inspected afterwards.
pub struct MemoryCorpus {
    target: ConversionTarget,
    stores: BTreeMap<String, Rc<RefCell<MemoryStore>>>,
    sinks: BTreeMap<String, Rc<RefCell<MemorySink>>>,
    caches: BTreeMap<String, Rc<RefCell<MemoryStructureCache>>>,
    mappings: BTreeMap<(String, String), Rc<RefCell<MemoryMappingWriter>>>,
}

impl MemoryCorpus {
    pub fn new(manifests: impl IntoIterator<Item = LayerManifest>) -> Self {
        Self::with_estimates(manifests, &[])
    }

    /// Like [`MemoryCorpus::new`], with a-priori item-count estimates for
    /// buffer pre-sizing.
    pub fn with_estimates(
        manifests: impl IntoIterator<Item = LayerManifest>,
        estimates: &[(&str, usize)],
    ) -> Self {
        let mut registry = MemoryRegistry::new();
        for (layer, estimate) in estimates {
            registry.set_estimate(*layer, *estimate);
        }
        let mut target = ConversionTarget::new(Rc::new(registry));

        let mut stores = BTreeMap::new();
        let mut sinks = BTreeMap::new();
        let mut caches = BTreeMap::new();
        for manifest in manifests {
            let id = manifest.id.clone();
            let store = Rc::new(RefCell::new(MemoryStore::new()));
            let sink = Rc::new(RefCell::new(MemorySink::new()));
            let cache = Rc::new(RefCell::new(MemoryStructureCache::new()));
            let supplier = StoreSupplier::new(
                Rc::clone(&store) as Rc<RefCell<dyn ItemStore>>
            );

            let mut binding = LayerBinding::new(
                manifest,
                Rc::clone(&store) as Rc<RefCell<dyn ItemStore>>,
                Rc::clone(&sink) as Rc<RefCell<dyn AnnotationSink>>,
            );
            binding.structures =
                Some(Rc::clone(&cache) as Rc<RefCell<dyn StructureCache>>);
            binding.builder = Some(Rc::new(RefCell::new(MemoryStructureBuilder::new())));
            binding.supplier = Some(Rc::new(RefCell::new(supplier)));
            target.add_layer(binding);

            stores.insert(id.clone(), store);
            sinks.insert(id.clone(), sink);
            caches.insert(id, cache);
        }

        Self {
            target,
            stores,
            sinks,
            caches,
            mappings: BTreeMap::new(),
        }
    }

    /// Registers an in-memory mapping writer for `from` → `to`.
    pub fn add_mapping(&mut self, from: &str, to: &str) {
        let writer = Rc::new(RefCell::new(MemoryMappingWriter::new()));
        self.target.add_mapping(
            from,
            to,
            Rc::clone(&writer) as Rc<RefCell<dyn MappingWriter>>,
        );
        self.mappings
            .insert((from.to_string(), to.to_string()), writer);
    }

    pub fn target(&self) -> ConversionTarget {
        self.target.clone()
    }

    pub fn annotation(&self, layer: &str, item: ItemId, key: &str) -> Option<Value> {
        self.sinks
            .get(layer)
            .and_then(|s| s.borrow().get(item, key).cloned())
    }

    pub fn annotation_count(&self, layer: &str) -> usize {
        self.sinks.get(layer).map_or(0, |s| s.borrow().len())
    }

    pub fn item_count(&self, layer: &str) -> usize {
        self.stores.get(layer).map_or(0, |s| s.borrow().item_count())
    }

    pub fn container_count(&self, layer: &str) -> usize {
        self.stores
            .get(layer)
            .map_or(0, |s| s.borrow().container_count())
    }

    pub fn members(&self, layer: &str, container: ContainerId) -> Vec<ItemId> {
        self.stores
            .get(layer)
            .map_or_else(Vec::new, |s| s.borrow().members(container).to_vec())
    }

    pub fn structures(&self, layer: &str) -> Vec<(usize, Structure)> {
        self.caches.get(layer).map_or_else(Vec::new, |c| {
            c.borrow().iter().map(|(i, s)| (i, s.clone())).collect()
        })
    }

    pub fn mapping_entries(&self, from: &str, to: &str) -> Vec<(Vec<usize>, Vec<usize>)> {
        self.mappings
            .get(&(from.to_string(), to.to_string()))
            .map_or_else(Vec::new, |w| w.borrow().entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_layer_lookup_is_a_definition_error() {
        let corpus = MemoryCorpus::new([LayerManifest::new("tok")]);
        let target = corpus.target();
        assert!(target.layer("tok").is_ok());
        assert!(matches!(
            target.layer("missing"),
            Err(SchemaError::UnknownLayer(_))
        ));
    }

    #[test]
    fn memory_corpus_wires_every_layer() {
        let corpus = MemoryCorpus::new([LayerManifest::new("tok"), LayerManifest::new("sent")]);
        let target = corpus.target();
        let binding = target.layer("tok").unwrap();
        assert!(binding.structures.is_some());
        assert!(binding.builder.is_some());
        assert!(binding.supplier.is_some());
    }

    #[test]
    fn mapping_probe_finds_registered_writers_only() {
        let mut corpus = MemoryCorpus::new([LayerManifest::new("tok")]);
        corpus.add_mapping("tok", "chunk");
        let target = corpus.target();
        assert!(target.mapping("tok", "chunk").is_some());
        assert!(target.mapping("chunk", "tok").is_none());
    }
}
