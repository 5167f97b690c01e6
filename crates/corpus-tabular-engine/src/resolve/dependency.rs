use std::cell::RefCell;
use std::rc::Rc;

use crate::convert::buffer::BatchBuffer;
use crate::convert::context::Cursor;
use crate::error::{ConvertError, SchemaError};
use crate::model::{Edge, EdgeSource, ItemId, StructureBuilder, StructureCache};
use crate::schema::ResolverSpec;

use super::{BatchInfo, Resolve};

const DEFAULT_ROOT_LABEL: &str = "0";
const DEFAULT_OFFSET: i64 = 1;

/// Head reference recorded for one position of the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Head {
    Root,
    Index(usize),
}

/// Builds one dependency tree per enclosing block from a head-index column.
///
/// Edges are created target-first while streaming and parked, together with
/// their head pointers, in two position-indexed buffers. Sources are
/// attached and the structure is built and published when the block closes.
pub struct DependencyResolver {
    root_label: String,
    offset: i64,
    builder: Rc<RefCell<dyn StructureBuilder>>,
    cache: Rc<RefCell<dyn StructureCache>>,
    edges: BatchBuffer<Edge>,
    heads: BatchBuffer<Head>,
}

impl DependencyResolver {
    pub fn from_spec(
        spec: &ResolverSpec,
        builder: Rc<RefCell<dyn StructureBuilder>>,
        cache: Rc<RefCell<dyn StructureCache>>,
        estimate: usize,
    ) -> Result<Self, SchemaError> {
        let root_label = spec.option("root").unwrap_or(DEFAULT_ROOT_LABEL).to_string();
        let offset = match spec.option("offset") {
            None => DEFAULT_OFFSET,
            Some(raw) => raw.parse().map_err(|_| SchemaError::Option {
                key: "offset".to_string(),
                message: format!("`{raw}` is not an integer"),
            })?,
        };
        Ok(Self {
            root_label,
            offset,
            builder,
            cache,
            edges: BatchBuffer::with_estimate(estimate),
            heads: BatchBuffer::with_estimate(estimate),
        })
    }

    fn parse_head(&self, cx: &dyn Cursor) -> Result<Head, ConvertError> {
        let raw = cx.raw().trim();
        if raw == self.root_label {
            return Ok(Head::Root);
        }
        let value: i64 = raw.parse().map_err(|_| {
            ConvertError::content(cx.line(), cx.raw(), "invalid head reference")
        })?;
        let index = value - self.offset;
        if index < 0 {
            return Err(ConvertError::content(
                cx.line(),
                cx.raw(),
                format!("head reference {value} resolves to a negative position"),
            ));
        }
        Ok(Head::Index(index as usize))
    }
}

impl Resolve for DependencyResolver {
    fn process(&mut self, cx: &dyn Cursor) -> Result<ItemId, ConvertError> {
        let head = self.parse_head(cx)?;
        let position = cx.index();
        let edge = self.builder.borrow_mut().new_edge(cx.item());
        self.edges.put(position, edge)?;
        self.heads.put(position, head)?;
        Ok(cx.item())
    }

    fn end_batch(&mut self, batch: &BatchInfo) -> Result<(), ConvertError> {
        let len = self.edges.len();

        // Attach sources now that every target of the batch is known.
        for position in 0..len {
            let head = match self.heads.get(position) {
                Some(head) => *head,
                None => continue,
            };
            let source = match head {
                Head::Root => EdgeSource::Root,
                Head::Index(head_position) => {
                    let target = self
                        .edges
                        .get(head_position)
                        .map(|e| e.target)
                        .ok_or_else(|| {
                            ConvertError::content(
                                batch.line,
                                format!("{}", head_position + 1),
                                format!(
                                    "head points at position {head_position} outside a batch of {len}"
                                ),
                            )
                        })?;
                    EdgeSource::Item(target)
                }
            };
            if let Some(edge) = self.edges.get_mut(position) {
                edge.source = source;
            }
        }

        let mut nodes = Vec::with_capacity(len);
        let mut edges = Vec::with_capacity(len);
        for position in 0..len {
            if let Some(edge) = self.edges.take(position) {
                nodes.push(edge.target);
                edges.push(edge);
            }
        }

        let mut structure = {
            let mut builder = self.builder.borrow_mut();
            builder.add_nodes(&nodes);
            builder.add_edges(edges);
            builder.set_boundary_container(batch.container);
            builder.build()
        };
        // Mirror the enclosing container's identity onto the structure.
        structure.index = batch.container.0;
        structure.augmented = false;
        structure.alive = true;

        tracing::trace!(
            container = batch.container.0,
            nodes = structure.nodes.len(),
            "dependency structure published"
        );
        self.cache
            .borrow_mut()
            .publish(batch.container.0, structure);

        self.edges.clear();
        self.heads.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.edges.release();
        self.heads.release();
    }
}
