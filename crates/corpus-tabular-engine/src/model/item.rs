use serde::{Deserialize, Serialize};

/// Positional identity of an item within its layer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ItemId(pub usize);

/// Positional identity of a container within its layer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ContainerId(pub usize);

/// Item and container creation operations the conversion pipeline invokes on
/// a layer. The object model behind it is the host's business.
pub trait ItemStore {
    /// Opens a new container and returns its positional id.
    fn begin_container(&mut self) -> ContainerId;
    /// Creates a new item inside `container`.
    fn new_item(&mut self, container: ContainerId) -> ItemId;
    /// Adds an existing item (usually from another layer) as a member of
    /// `container`.
    fn add_member(&mut self, container: ContainerId, member: ItemId);
    /// Marks a container complete. No items may be added afterwards.
    fn end_container(&mut self, container: ContainerId);
    fn item_count(&self) -> usize;
    fn container_count(&self) -> usize;
}

/// In-memory [`ItemStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Vec<ItemRecord>,
    containers: Vec<ContainerRecord>,
}

#[derive(Debug)]
struct ItemRecord {
    container: Option<ContainerId>,
}

#[derive(Debug)]
struct ContainerRecord {
    members: Vec<ItemId>,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self, container: ContainerId) -> &[ItemId] {
        self.containers
            .get(container.0)
            .map(|c| c.members.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_closed(&self, container: ContainerId) -> bool {
        self.containers
            .get(container.0)
            .is_some_and(|c| c.closed)
    }
}

impl ItemStore for MemoryStore {
    fn begin_container(&mut self) -> ContainerId {
        let id = ContainerId(self.containers.len());
        self.containers.push(ContainerRecord {
            members: Vec::new(),
            closed: false,
        });
        id
    }

    fn new_item(&mut self, container: ContainerId) -> ItemId {
        let id = ItemId(self.items.len());
        self.items.push(ItemRecord {
            container: Some(container),
        });
        if let Some(c) = self.containers.get_mut(container.0) {
            c.members.push(id);
        }
        id
    }

    fn add_member(&mut self, container: ContainerId, member: ItemId) {
        if let Some(c) = self.containers.get_mut(container.0) {
            c.members.push(member);
        }
    }

    fn end_container(&mut self, container: ContainerId) {
        if let Some(c) = self.containers.get_mut(container.0) {
            c.closed = true;
        }
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn container_count(&self) -> usize {
        self.containers.len()
    }
}
