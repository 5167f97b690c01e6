//! Segmentation: grouping a linear item stream into coarser segment
//! containers.
//!
//! The strategy state machines live in [`strategy`]; [`SegmentResolver`]
//! owns the member buffer, the component supplier, and the lazily opened
//! mapping writers.

pub mod strategy;

use std::cell::RefCell;
use std::rc::Rc;

use crate::convert::context::Cursor;
use crate::error::{ConvertError, SchemaError};
use crate::model::{ComponentSupplier, ItemId, ItemStore, MappingWriter};
use crate::schema::ResolverSpec;

use super::{BatchInfo, Resolve};
use strategy::{CloseMode, Step, Strategy};

/// A mapping writer that is `begin()`ed on first use and `end()`ed once at
/// run end, so untouched mappings never open.
struct LazyMapping {
    writer: Rc<RefCell<dyn MappingWriter>>,
    opened: bool,
}

impl LazyMapping {
    fn new(writer: Rc<RefCell<dyn MappingWriter>>) -> Self {
        Self {
            writer,
            opened: false,
        }
    }

    fn map(&mut self, source_indices: &[usize], target_indices: &[usize]) {
        let mut writer = self.writer.borrow_mut();
        if !self.opened {
            writer.begin();
            self.opened = true;
        }
        writer.map(source_indices, target_indices);
    }

    fn finish(&mut self) {
        if self.opened {
            self.writer.borrow_mut().end();
            self.opened = false;
        }
    }

    fn close(&mut self) {
        self.writer.borrow_mut().close();
    }
}

/// Groups items into segment containers with one of the four strategies.
pub struct SegmentResolver {
    strategy: Strategy,
    supplier: Rc<RefCell<dyn ComponentSupplier>>,
    /// Store of the segment layer, where members are attached.
    store: Rc<RefCell<dyn ItemStore>>,
    /// Item positions → segment position.
    forward: Option<LazyMapping>,
    /// Segment position → item positions.
    backward: Option<LazyMapping>,
    pending: Vec<ItemId>,
    active: bool,
}

impl SegmentResolver {
    pub fn from_spec(
        spec: &ResolverSpec,
        supplier: Rc<RefCell<dyn ComponentSupplier>>,
        store: Rc<RefCell<dyn ItemStore>>,
        forward: Option<Rc<RefCell<dyn MappingWriter>>>,
        backward: Option<Rc<RefCell<dyn MappingWriter>>>,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            strategy: Strategy::from_spec(spec)?,
            supplier,
            store,
            forward: forward.map(LazyMapping::new),
            backward: backward.map(LazyMapping::new),
            pending: Vec::new(),
            active: false,
        })
    }

    fn close_segment(&mut self, mode: CloseMode) -> Result<(), ConvertError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let members = std::mem::take(&mut self.pending);
        if mode == CloseMode::Discard || members.is_empty() {
            return Ok(());
        }

        let container = self.supplier.borrow_mut().next();
        {
            let mut store = self.store.borrow_mut();
            for member in &members {
                store.add_member(container, *member);
            }
            store.end_container(container);
        }

        let positions: Vec<usize> = members.iter().map(|m| m.0).collect();
        if let Some(forward) = &mut self.forward {
            forward.map(&positions, &[container.0]);
        }
        if let Some(backward) = &mut self.backward {
            backward.map(&[container.0], &positions);
        }
        tracing::trace!(
            segment = container.0,
            members = positions.len(),
            "segment closed"
        );
        Ok(())
    }

    fn run_step(&mut self, step: Step, item: ItemId) -> Result<(), ConvertError> {
        if let Some(mode) = step.close_before {
            self.close_segment(mode)?;
        }
        if step.append {
            self.pending.push(item);
            self.active = true;
        }
        if step.close_after {
            self.close_segment(CloseMode::Flush)?;
        }
        Ok(())
    }
}

impl Resolve for SegmentResolver {
    fn process(&mut self, cx: &dyn Cursor) -> Result<ItemId, ConvertError> {
        let step = {
            let value = cx.raw().trim();
            self.strategy.step(value, self.active)
        };
        self.run_step(step, cx.item())?;
        Ok(cx.item())
    }

    fn end_batch(&mut self, _batch: &BatchInfo) -> Result<(), ConvertError> {
        // Segments may span blocks; nothing materializes here.
        Ok(())
    }

    fn end_input(&mut self) -> Result<(), ConvertError> {
        let mode = self.strategy.trailing_mode();
        self.close_segment(mode)?;
        self.strategy.reset();
        if let Some(forward) = &mut self.forward {
            forward.finish();
        }
        if let Some(backward) = &mut self.backward {
            backward.finish();
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(forward) = &mut self.forward {
            forward.close();
        }
        if let Some(backward) = &mut self.backward {
            backward.close();
        }
        self.supplier.borrow_mut().close();
        self.pending = Vec::new();
        self.active = false;
    }
}
