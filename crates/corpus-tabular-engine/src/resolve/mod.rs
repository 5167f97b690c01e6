//! # Resolver Framework
//!
//! Resolvers turn the raw text of one field into a typed annotation or a
//! structural effect. Which resolver handles a column is decided once, at
//! converter setup:
//!
//! - no declared resolver → a [`BasicResolver`] variant picked from the
//!   annotation's declared value type
//! - a well-known [`ResolverId`](crate::schema::ResolverId) → one of the
//!   engine's own implementations (dependency trees, segmentation,
//!   metadata/property lines)
//!
//! Stateful resolvers accumulate across lines and materialize at batch
//! boundaries (`end_batch`) or at the end of the whole input (`end_input`).

pub mod basic;
pub mod composite;
pub mod dependency;
pub mod segment;

pub use basic::BasicResolver;
pub use composite::KeyValueResolver;
pub use dependency::DependencyResolver;
pub use segment::SegmentResolver;

use std::rc::Rc;

use crate::convert::buffer::DEFAULT_ESTIMATE;
use crate::convert::context::Cursor;
use crate::error::{ConvertError, SchemaError};
use crate::model::{ContainerId, ConversionTarget, ItemId};
use crate::schema::{ColumnSchema, ResolverId, ResolverSpec};

/// Closing context of one block batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchInfo {
    /// Container of the closing block instance.
    pub container: ContainerId,
    /// Number of items created in the batch.
    pub len: usize,
    /// Physical line at which the batch closed, for error context.
    pub line: usize,
}

/// A pluggable unit converting raw text into annotations or structure.
pub trait Resolve {
    /// Handles one field, writing an annotation or effect, and returns the
    /// item the write went to.
    fn process(&mut self, cx: &dyn Cursor) -> Result<ItemId, ConvertError>;

    /// Materializes per-batch state when the enclosing block closes.
    fn end_batch(&mut self, batch: &BatchInfo) -> Result<(), ConvertError> {
        let _ = batch;
        Ok(())
    }

    /// Flushes cross-batch state once the whole input is consumed.
    fn end_input(&mut self) -> Result<(), ConvertError> {
        Ok(())
    }

    /// Releases buffers and collaborator handles. Idempotent.
    fn close(&mut self) {}
}

/// Instantiates the resolver for a content column.
pub fn for_column(
    column: &ColumnSchema,
    block_layer: &str,
    target: &ConversionTarget,
) -> Result<Box<dyn Resolve>, SchemaError> {
    match &column.resolver {
        Some(spec) => from_spec(spec, &column.layer, block_layer, target),
        None => {
            let key = column
                .key
                .as_deref()
                .ok_or_else(|| SchemaError::UnboundColumn(column.name.clone()))?;
            let binding = target.layer(&column.layer)?;
            Ok(Box::new(BasicResolver::for_annotation(binding, key)?))
        }
    }
}

/// Instantiates the resolver carried by a delimiter or attribute rule.
/// Attribute data always applies to items of the block's own layer.
pub fn for_attribute(
    spec: &ResolverSpec,
    block_layer: &str,
    target: &ConversionTarget,
) -> Result<Box<dyn Resolve>, SchemaError> {
    match &spec.id {
        ResolverId::Metadata | ResolverId::PropertyList => {
            from_spec(spec, block_layer, block_layer, target)
        }
        other => Err(SchemaError::Option {
            key: "resolver".to_string(),
            message: format!("{other:?} cannot drive an attribute line"),
        }),
    }
}

fn from_spec(
    spec: &ResolverSpec,
    layer: &str,
    block_layer: &str,
    target: &ConversionTarget,
) -> Result<Box<dyn Resolve>, SchemaError> {
    match &spec.id {
        ResolverId::Dependency => {
            let binding = target.layer(layer)?;
            let builder = binding.builder.clone().ok_or_else(|| {
                SchemaError::MissingCollaborator {
                    layer: layer.to_string(),
                    collaborator: "structure builder".to_string(),
                    resolver: "dependency".to_string(),
                }
            })?;
            let cache = binding.structures.clone().ok_or_else(|| {
                SchemaError::MissingCollaborator {
                    layer: layer.to_string(),
                    collaborator: "structure cache".to_string(),
                    resolver: "dependency".to_string(),
                }
            })?;
            let estimate = target
                .registry()
                .item_count_estimate(block_layer)
                .unwrap_or(DEFAULT_ESTIMATE);
            Ok(Box::new(DependencyResolver::from_spec(
                spec, builder, cache, estimate,
            )?))
        }
        ResolverId::Segments => {
            let binding = target.layer(layer)?;
            let supplier = binding.supplier.clone().ok_or_else(|| {
                SchemaError::MissingCollaborator {
                    layer: layer.to_string(),
                    collaborator: "component supplier".to_string(),
                    resolver: "segments".to_string(),
                }
            })?;
            let forward = target.mapping(block_layer, layer);
            let backward = target.mapping(layer, block_layer);
            Ok(Box::new(SegmentResolver::from_spec(
                spec,
                supplier,
                Rc::clone(&binding.store),
                forward,
                backward,
            )?))
        }
        ResolverId::Metadata => {
            let binding = target.layer(layer)?;
            Ok(Box::new(KeyValueResolver::metadata(spec, binding)?))
        }
        ResolverId::PropertyList => {
            let binding = target.layer(layer)?;
            Ok(Box::new(KeyValueResolver::property_list(spec, binding)?))
        }
        ResolverId::Custom(name) => Err(SchemaError::UnknownResolver(name.clone())),
    }
}
