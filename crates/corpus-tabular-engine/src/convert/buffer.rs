use crate::error::ConvertError;

/// Maximum position a batch buffer will grow to accommodate.
pub const MAX_POSITION: usize = i32::MAX as usize;

/// Default batch capacity when no a-priori estimate is available.
pub const DEFAULT_ESTIMATE: usize = 100;

/// Growable buffer keyed by position within a batch.
///
/// Slots are explicitly optional, so "no value recorded at this position" is
/// distinguishable from any recorded value. Growth doubles the capacity,
/// capped at [`MAX_POSITION`]; `clear` keeps the allocation for the next
/// batch, `release` drops it.
#[derive(Debug)]
pub struct BatchBuffer<T> {
    slots: Vec<Option<T>>,
    len: usize,
}

impl<T> BatchBuffer<T> {
    pub fn with_estimate(estimate: usize) -> Self {
        let capacity = estimate.clamp(1, MAX_POSITION);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, len: 0 }
    }

    /// Highest occupied position + 1.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn put(&mut self, position: usize, value: T) -> Result<(), ConvertError> {
        if position >= MAX_POSITION {
            return Err(ConvertError::Capacity {
                position,
                max: MAX_POSITION,
            });
        }
        if position >= self.slots.len() {
            let grown = (self.slots.len() * 2)
                .max(position + 1)
                .min(MAX_POSITION);
            self.slots.resize_with(grown, || None);
        }
        self.slots[position] = Some(value);
        self.len = self.len.max(position + 1);
        Ok(())
    }

    pub fn get(&self, position: usize) -> Option<&T> {
        self.slots.get(position).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut T> {
        self.slots.get_mut(position).and_then(Option::as_mut)
    }

    pub fn take(&mut self, position: usize) -> Option<T> {
        self.slots.get_mut(position).and_then(Option::take)
    }

    /// Empties all slots while keeping the allocation.
    pub fn clear(&mut self) {
        for slot in &mut self.slots[..self.len] {
            *slot = None;
        }
        self.len = 0;
    }

    /// Drops the backing storage.
    pub fn release(&mut self) {
        self.slots = Vec::new();
        self.len = 0;
    }
}
