use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::{ConvertError, SchemaError};
use crate::model::{ContainerId, ConversionTarget, ItemId, ItemStore};
use crate::resolve::{self, BatchInfo, Resolve};
use crate::schema::{
    AttributeSchema, AttributeTarget, BlockSchema, ColumnSchema, Separator, SubstituteKind,
    TableSchema,
};

use super::classify::LineInfo;
use super::context::ResolverContext;
use super::matcher::{AttributeMatcher, MatchOutcome};
use super::{ConvertOptions, ShortRowPolicy};

/// Whether a handler claimed a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    Consumed,
    /// The line matched nothing in this subtree; the caller decides.
    Rejected,
}

/// Which attribute runtime a deferred payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrSlot {
    Begin,
    End,
    Attribute(usize),
}

struct AttributeRuntime {
    matcher: AttributeMatcher,
    target: AttributeTarget,
    resolver: Option<Box<dyn Resolve>>,
}

impl AttributeRuntime {
    fn build(
        schema: &AttributeSchema,
        block_layer: &str,
        target: &ConversionTarget,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            matcher: AttributeMatcher::compile(&schema.pattern)?,
            target: schema.target,
            resolver: schema
                .resolver
                .as_ref()
                .map(|spec| resolve::for_attribute(spec, block_layer, target))
                .transpose()?,
        })
    }
}

struct ColumnRuntime {
    ignore: bool,
    no_entry: Option<String>,
    resolver: Option<Box<dyn Resolve>>,
    replacement: Option<String>,
    addition: Option<String>,
    target_member: Option<String>,
}

impl ColumnRuntime {
    fn build(
        schema: &ColumnSchema,
        block_layer: &str,
        target: &ConversionTarget,
    ) -> Result<Self, SchemaError> {
        let resolver = if schema.ignore {
            None
        } else {
            Some(resolve::for_column(schema, block_layer, target)?)
        };
        Ok(Self {
            ignore: schema.ignore,
            no_entry: schema.no_entry_label.clone(),
            resolver,
            replacement: schema
                .substitute(SubstituteKind::Replacement)
                .map(|s| s.name.clone()),
            addition: schema
                .substitute(SubstituteKind::Addition)
                .map(|s| s.name.clone()),
            target_member: schema
                .substitute(SubstituteKind::Target)
                .map(|s| s.name.clone()),
        })
    }
}

/// Runtime mirror of one [`BlockSchema`] node.
///
/// Holds the compiled matchers, the column resolvers, and the child
/// handlers; the only classification state that survives a line is the
/// pending multi-line attribute slot and the open-batch bookkeeping.
pub struct BlockHandler {
    layer: String,
    store: Rc<RefCell<dyn ItemStore>>,
    separator: Separator,
    begin: Option<AttributeRuntime>,
    end: Option<AttributeRuntime>,
    attributes: Vec<AttributeRuntime>,
    pending_attribute: Option<usize>,
    columns: Vec<ColumnRuntime>,
    fallback: Option<ColumnRuntime>,
    children: Vec<BlockHandler>,
    active_child: Option<usize>,
    no_entry: String,
    fixed_order: bool,
    short_rows: ShortRowPolicy,
    active: bool,
    container: Option<ContainerId>,
    batch_len: usize,
    last_item: Option<ItemId>,
    deferred: Vec<(AttrSlot, String)>,
    field_spans: Vec<(usize, usize)>,
    members: BTreeMap<String, ItemId>,
}

impl BlockHandler {
    /// Compiles one schema node and, recursively, its children.
    pub fn build(
        schema: &BlockSchema,
        table: &TableSchema,
        target: &ConversionTarget,
        options: &ConvertOptions,
    ) -> Result<Self, SchemaError> {
        let binding = target.layer(&schema.layer)?;
        let begin = schema
            .begin
            .as_ref()
            .map(|a| AttributeRuntime::build(a, &schema.layer, target))
            .transpose()?;
        let end = schema
            .end
            .as_ref()
            .map(|a| AttributeRuntime::build(a, &schema.layer, target))
            .transpose()?;
        let attributes = schema
            .attributes
            .iter()
            .map(|a| AttributeRuntime::build(a, &schema.layer, target))
            .collect::<Result<Vec<_>, _>>()?;
        let columns = schema
            .columns
            .iter()
            .map(|c| ColumnRuntime::build(c, &schema.layer, target))
            .collect::<Result<Vec<_>, _>>()?;
        let fallback = schema
            .fallback_column
            .as_ref()
            .map(|c| ColumnRuntime::build(c, &schema.layer, target))
            .transpose()?;
        let children = schema
            .blocks
            .iter()
            .map(|b| BlockHandler::build(b, table, target, options))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            layer: schema.layer.clone(),
            store: Rc::clone(&binding.store),
            separator: schema
                .separator
                .clone()
                .unwrap_or_else(|| table.separator.clone()),
            begin,
            end,
            attributes,
            pending_attribute: None,
            columns,
            fallback,
            children,
            active_child: None,
            no_entry: schema.effective_no_entry_label().to_string(),
            fixed_order: schema.column_order_fixed,
            short_rows: options.short_rows,
            active: false,
            container: None,
            batch_len: 0,
            last_item: None,
            deferred: Vec::new(),
            field_spans: Vec::new(),
            members: BTreeMap::new(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Classifies one line against this subtree.
    pub fn feed(
        &mut self,
        line: &LineInfo<'_>,
        cx: &mut ResolverContext,
    ) -> Result<FeedOutcome, ConvertError> {
        if self.active {
            return self.feed_active(line, cx);
        }
        if !self.is_begin_line(line) {
            return Ok(FeedOutcome::Rejected);
        }
        self.open_batch();
        if self.begin.is_some() {
            // Explicit begin delimiters consume their line.
            self.apply_attribute(AttrSlot::Begin, line, cx)?;
            Ok(FeedOutcome::Consumed)
        } else {
            // Implicit begin: the first non-empty line is already content
            // (or a deeper begin, or an attribute).
            self.feed_active(line, cx)
        }
    }

    fn is_begin_line(&self, line: &LineInfo<'_>) -> bool {
        match &self.begin {
            Some(begin) => begin.matcher.test(line) != MatchOutcome::Failed,
            None => !line.is_blank,
        }
    }

    fn is_end_line(&self, line: &LineInfo<'_>) -> bool {
        match &self.end {
            Some(end) => end.matcher.test(line) != MatchOutcome::Failed,
            None => false,
        }
    }

    fn feed_active(
        &mut self,
        line: &LineInfo<'_>,
        cx: &mut ResolverContext,
    ) -> Result<FeedOutcome, ConvertError> {
        // Innermost first: an open child sees the line before our own tests.
        if let Some(i) = self.active_child {
            let outcome = self.children[i].feed(line, cx)?;
            if !self.children[i].active {
                self.active_child = None;
            }
            if outcome == FeedOutcome::Consumed {
                return Ok(FeedOutcome::Consumed);
            }
        }

        if self.is_end_line(line) {
            self.apply_attribute(AttrSlot::End, line, cx)?;
            self.close_batch(line.number)?;
            return Ok(FeedOutcome::Consumed);
        }
        if self.end.is_none()
            && let Some(begin) = &self.begin
            && begin.matcher.test(line) != MatchOutcome::Failed
        {
            // Without an end delimiter, the next begin line bounds the batch.
            self.close_batch(line.number)?;
            self.open_batch();
            self.apply_attribute(AttrSlot::Begin, line, cx)?;
            return Ok(FeedOutcome::Consumed);
        }

        for i in 0..self.children.len() {
            if self.children[i].active {
                continue;
            }
            if self.children[i].feed(line, cx)? == FeedOutcome::Consumed {
                if self.children[i].active {
                    self.active_child = Some(i);
                }
                return Ok(FeedOutcome::Consumed);
            }
        }

        if self.try_attribute(line, cx)? {
            return Ok(FeedOutcome::Consumed);
        }

        if line.is_blank {
            // Blank lines never count as content; let an ancestor claim them.
            return Ok(FeedOutcome::Rejected);
        }
        if !self.columns.is_empty() || self.fallback.is_some() {
            self.process_content_line(line, cx)?;
            return Ok(FeedOutcome::Consumed);
        }
        Ok(FeedOutcome::Rejected)
    }

    /// Tries the pending multi-line attribute first, then the declared tests
    /// in order. A partial match keeps (or makes) its test the pending one.
    fn try_attribute(
        &mut self,
        line: &LineInfo<'_>,
        cx: &mut ResolverContext,
    ) -> Result<bool, ConvertError> {
        let failed_pending = match self.pending_attribute.take() {
            Some(i) => match self.attributes[i].matcher.test(line) {
                MatchOutcome::Matched => {
                    self.apply_attribute(AttrSlot::Attribute(i), line, cx)?;
                    return Ok(true);
                }
                MatchOutcome::PartlyMatched => {
                    self.apply_attribute(AttrSlot::Attribute(i), line, cx)?;
                    self.pending_attribute = Some(i);
                    return Ok(true);
                }
                MatchOutcome::Failed => Some(i),
            },
            None => None,
        };

        for i in 0..self.attributes.len() {
            if failed_pending == Some(i) {
                continue;
            }
            match self.attributes[i].matcher.test(line) {
                MatchOutcome::Matched => {
                    self.apply_attribute(AttrSlot::Attribute(i), line, cx)?;
                    return Ok(true);
                }
                MatchOutcome::PartlyMatched => {
                    self.apply_attribute(AttrSlot::Attribute(i), line, cx)?;
                    self.pending_attribute = Some(i);
                    return Ok(true);
                }
                MatchOutcome::Failed => {}
            }
        }
        Ok(false)
    }

    fn attr_runtime_mut(&mut self, slot: AttrSlot) -> Option<&mut AttributeRuntime> {
        match slot {
            AttrSlot::Begin => self.begin.as_mut(),
            AttrSlot::End => self.end.as_mut(),
            AttrSlot::Attribute(i) => self.attributes.get_mut(i),
        }
    }

    /// Routes a recognized attribute's payload to its resolver, either
    /// deferred to the next item or applied to the previous one.
    fn apply_attribute(
        &mut self,
        slot: AttrSlot,
        line: &LineInfo<'_>,
        cx: &mut ResolverContext,
    ) -> Result<(), ConvertError> {
        let (payload, target) = match self.attr_runtime_mut(slot) {
            Some(runtime) if runtime.resolver.is_some() => {
                (runtime.matcher.payload(line).to_string(), runtime.target)
            }
            _ => return Ok(()),
        };
        match target {
            AttributeTarget::NextItem => {
                self.deferred.push((slot, payload));
            }
            AttributeTarget::PreviousItem => {
                let item = self.last_item.ok_or_else(|| {
                    ConvertError::content(
                        line.number,
                        line.content,
                        "attribute applies to the previous item but none exists",
                    )
                })?;
                let container = self.require_container(line)?;
                cx.reposition(container, item, self.batch_len.saturating_sub(1), line.number);
                cx.set_raw(&payload);
                if let Some(runtime) = self.attr_runtime_mut(slot)
                    && let Some(resolver) = runtime.resolver.as_mut()
                {
                    resolver.process(&*cx)?;
                }
            }
        }
        Ok(())
    }

    fn apply_deferred(
        &mut self,
        container: ContainerId,
        item: ItemId,
        index: usize,
        line_number: usize,
        cx: &mut ResolverContext,
    ) -> Result<(), ConvertError> {
        if self.deferred.is_empty() {
            return Ok(());
        }
        let deferred = std::mem::take(&mut self.deferred);
        for (slot, payload) in deferred {
            cx.reposition(container, item, index, line_number);
            cx.set_raw(&payload);
            if let Some(runtime) = self.attr_runtime_mut(slot)
                && let Some(resolver) = runtime.resolver.as_mut()
            {
                resolver.process(&*cx)?;
            }
        }
        Ok(())
    }

    fn require_container(&self, line: &LineInfo<'_>) -> Result<ContainerId, ConvertError> {
        self.container.ok_or_else(|| {
            ConvertError::content(line.number, line.content, "no open block instance")
        })
    }

    /// Splits a content line, maps fields to columns, creates the line's
    /// item, and dispatches every field to its column's resolver.
    fn process_content_line(
        &mut self,
        line: &LineInfo<'_>,
        cx: &mut ResolverContext,
    ) -> Result<(), ConvertError> {
        let container = self.require_container(line)?;
        let text = line.content;

        self.field_spans.clear();
        self.separator.split_spans(text, &mut self.field_spans);
        let field_count = self.field_spans.len();
        let column_count = self.columns.len();

        if field_count > column_count && self.fallback.is_none() {
            return Err(ConvertError::content(
                line.number,
                text,
                format!(
                    "expected {column_count} fields, found {field_count}, and no fallback column is declared"
                ),
            ));
        }
        if field_count < column_count
            && self.fixed_order
            && self.short_rows == ShortRowPolicy::Error
        {
            return Err(ConvertError::content(
                line.number,
                text,
                format!("expected {column_count} fields, found {field_count}"),
            ));
        }

        let item = self.store.borrow_mut().new_item(container);
        let index = self.batch_len;
        self.batch_len += 1;
        self.members.clear();
        self.apply_deferred(container, item, index, line.number, cx)?;

        for fi in 0..self.field_spans.len() {
            let (start, end) = self.field_spans[fi];
            let field = &text[start..end];
            let column = if fi < column_count {
                &mut self.columns[fi]
            } else {
                match self.fallback.as_mut() {
                    Some(fallback) => fallback,
                    None => break,
                }
            };
            dispatch_field(
                column,
                field,
                &self.no_entry,
                &self.store,
                &mut self.members,
                container,
                item,
                index,
                line.number,
                text,
                cx,
            )?;
        }

        self.last_item = Some(item);
        Ok(())
    }

    fn open_batch(&mut self) {
        let container = self.store.borrow_mut().begin_container();
        self.container = Some(container);
        self.active = true;
        self.batch_len = 0;
        self.last_item = None;
        self.pending_attribute = None;
        self.deferred.clear();
    }

    /// Closes the current batch: open children first, then every resolver's
    /// `end_batch`, then the container itself.
    fn close_batch(&mut self, line_number: usize) -> Result<(), ConvertError> {
        if let Some(i) = self.active_child.take() {
            self.children[i].close_batch(line_number)?;
        }
        let container = match self.container.take() {
            Some(container) => container,
            None => return Ok(()),
        };
        let batch = BatchInfo {
            container,
            len: self.batch_len,
            line: line_number,
        };
        for resolver in self.resolvers_mut() {
            resolver.end_batch(&batch)?;
        }
        self.store.borrow_mut().end_container(container);
        tracing::trace!(
            layer = %self.layer,
            container = container.0,
            items = self.batch_len,
            "block closed"
        );
        self.active = false;
        self.batch_len = 0;
        self.last_item = None;
        self.pending_attribute = None;
        self.deferred.clear();
        Ok(())
    }

    /// Ends the run: closes any open batch, then flushes cross-batch
    /// resolver state bottom-up.
    pub fn finish(&mut self, line_number: usize) -> Result<(), ConvertError> {
        if self.active {
            self.close_batch(line_number)?;
        }
        for child in &mut self.children {
            child.finish(line_number)?;
        }
        for resolver in self.resolvers_mut() {
            resolver.end_input()?;
        }
        Ok(())
    }

    /// Releases resolver buffers and collaborator handles.
    pub fn close(&mut self) {
        for resolver in self.resolvers_mut() {
            resolver.close();
        }
        for child in &mut self.children {
            child.close();
        }
    }

    fn resolvers_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Resolve>> {
        let columns = self
            .columns
            .iter_mut()
            .chain(self.fallback.as_mut())
            .filter_map(|c| c.resolver.as_mut());
        let attributes = self
            .begin
            .iter_mut()
            .chain(self.end.iter_mut())
            .chain(self.attributes.iter_mut())
            .filter_map(|a| a.resolver.as_mut());
        columns.chain(attributes)
    }
}

/// Dispatches one field to its column, honoring no-entry labels and
/// substitutes. Free function so the handler's disjoint fields can be
/// borrowed independently.
#[allow(clippy::too_many_arguments)]
fn dispatch_field(
    column: &mut ColumnRuntime,
    field: &str,
    block_no_entry: &str,
    store: &Rc<RefCell<dyn ItemStore>>,
    members: &mut BTreeMap<String, ItemId>,
    container: ContainerId,
    item: ItemId,
    index: usize,
    line_number: usize,
    text: &str,
    cx: &mut ResolverContext,
) -> Result<(), ConvertError> {
    if column.ignore {
        return Ok(());
    }
    let no_entry = column.no_entry.as_deref().unwrap_or(block_no_entry);
    if field == no_entry {
        return Ok(());
    }

    let mut dispatch_item = item;
    if let Some(name) = &column.target_member {
        dispatch_item = *members.get(name).ok_or_else(|| {
            ConvertError::content(
                line_number,
                text,
                format!("unknown member `{name}` for target substitute"),
            )
        })?;
    }
    if column.addition.is_some() {
        dispatch_item = store.borrow_mut().new_item(container);
    }

    cx.reposition(container, dispatch_item, index, line_number);
    cx.set_raw(field);
    let produced = match column.resolver.as_mut() {
        Some(resolver) => resolver.process(&*cx)?,
        None => dispatch_item,
    };

    if let Some(name) = &column.addition {
        members.insert(name.clone(), dispatch_item);
    }
    if let Some(name) = &column.replacement {
        members.insert(name.clone(), produced);
    }
    Ok(())
}
