use std::cell::RefCell;
use std::rc::Rc;

use super::item::{ContainerId, ItemId, ItemStore};

/// Supplies fresh segment containers on demand.
pub trait ComponentSupplier {
    /// Advances to a fresh container and returns its id.
    fn next(&mut self) -> ContainerId;
    /// Item identity of the most recently supplied container, if the backing
    /// layer models containers as items.
    fn current_item(&self) -> Option<ItemId>;
    /// Releases the supplier. Idempotent.
    fn close(&mut self);
}

/// [`ComponentSupplier`] backed by a layer's [`ItemStore`].
pub struct StoreSupplier {
    store: Rc<RefCell<dyn ItemStore>>,
    current: Option<ContainerId>,
}

impl StoreSupplier {
    pub fn new(store: Rc<RefCell<dyn ItemStore>>) -> Self {
        Self {
            store,
            current: None,
        }
    }

    pub fn current(&self) -> Option<ContainerId> {
        self.current
    }
}

impl ComponentSupplier for StoreSupplier {
    fn next(&mut self) -> ContainerId {
        let id = self.store.borrow_mut().begin_container();
        self.current = Some(id);
        id
    }

    fn current_item(&self) -> Option<ItemId> {
        // Containers in the backing store are not modeled as items.
        None
    }

    fn close(&mut self) {
        self.current = None;
    }
}
