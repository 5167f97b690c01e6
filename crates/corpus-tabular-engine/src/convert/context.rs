use crate::model::{ContainerId, ItemId};

/// Read access to the conversion cursor, as resolvers see it.
pub trait Cursor {
    /// Container of the current block instance.
    fn container(&self) -> ContainerId;
    /// Item the current field belongs to.
    fn item(&self) -> ItemId;
    /// Position of the current item within its batch.
    fn index(&self) -> usize;
    /// Raw text of the current field.
    fn raw(&self) -> &str;
    /// Physical line number, for error context.
    fn line(&self) -> usize;
}

/// The mutable cursor, owned by the converter and updated in place for every
/// dispatched field.
#[derive(Debug, Default)]
pub struct ResolverContext {
    container: ContainerId,
    item: ItemId,
    index: usize,
    raw: String,
    line: usize,
}

impl ResolverContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repositions the cursor. The raw field text is set separately via
    /// [`ResolverContext::set_raw`] to reuse its buffer.
    pub fn reposition(
        &mut self,
        container: ContainerId,
        item: ItemId,
        index: usize,
        line: usize,
    ) {
        self.container = container;
        self.item = item;
        self.index = index;
        self.line = line;
    }

    pub fn set_raw(&mut self, raw: &str) {
        self.raw.clear();
        self.raw.push_str(raw);
    }
}

impl Cursor for ResolverContext {
    fn container(&self) -> ContainerId {
        self.container
    }

    fn item(&self) -> ItemId {
        self.item
    }

    fn index(&self) -> usize {
        self.index
    }

    fn raw(&self) -> &str {
        &self.raw
    }

    fn line(&self) -> usize {
        self.line
    }
}

/// Proxy cursor overriding only the raw text.
///
/// Composite resolvers re-dispatch sub-fields through this, so nested
/// resolvers observe the exact item/index/container of the outer call.
pub struct RawOverride<'a> {
    base: &'a dyn Cursor,
    raw: &'a str,
}

impl<'a> RawOverride<'a> {
    pub fn new(base: &'a dyn Cursor, raw: &'a str) -> Self {
        Self { base, raw }
    }
}

impl Cursor for RawOverride<'_> {
    fn container(&self) -> ContainerId {
        self.base.container()
    }

    fn item(&self) -> ItemId {
        self.base.item()
    }

    fn index(&self) -> usize {
        self.base.index()
    }

    fn raw(&self) -> &str {
        self.raw
    }

    fn line(&self) -> usize {
        self.base.line()
    }
}
