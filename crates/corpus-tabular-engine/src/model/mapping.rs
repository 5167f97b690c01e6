/// Writer for one direction of an inter-layer index mapping.
///
/// Lifecycle is explicit: `begin` before the first `map`, `end` after the
/// last, `close` always (idempotent, also safe without `begin`).
pub trait MappingWriter {
    fn begin(&mut self);
    fn map(&mut self, source_indices: &[usize], target_indices: &[usize]);
    fn end(&mut self);
    fn close(&mut self);
}

/// In-memory [`MappingWriter`] recording every mapped pair.
#[derive(Debug, Default)]
pub struct MemoryMappingWriter {
    pub entries: Vec<(Vec<usize>, Vec<usize>)>,
    pub begun: bool,
    pub ended: bool,
    pub closed: bool,
}

impl MemoryMappingWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MappingWriter for MemoryMappingWriter {
    fn begin(&mut self) {
        self.begun = true;
    }

    fn map(&mut self, source_indices: &[usize], target_indices: &[usize]) {
        self.entries
            .push((source_indices.to_vec(), target_indices.to_vec()));
    }

    fn end(&mut self) {
        self.ended = true;
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_records_lifecycle_and_entries() {
        let mut writer = MemoryMappingWriter::new();
        writer.begin();
        writer.map(&[0], &[3, 4]);
        writer.end();
        writer.close();

        assert!(writer.begun && writer.ended && writer.closed);
        assert_eq!(writer.entries, vec![(vec![0], vec![3, 4])]);
    }
}
