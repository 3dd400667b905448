//! Registry mapping buffer ids to live buffers.
//!
//! The registry lock only guards the id table. Reads clone the buffer handle
//! out and release the table before taking the buffer's own lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{BookmarkId, BufferError, BufferId, BufferOptions, ReadOutcome, StreamBuffer};

/// Shared table of buffers polled by outer layers.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: Mutex<HashMap<BufferId, Arc<StreamBuffer>>>,
}

impl BufferRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<BufferId, Arc<StreamBuffer>>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create and register a new buffer.
    pub fn create_buffer(&self, options: BufferOptions) -> (BufferId, Arc<StreamBuffer>) {
        let buffer = Arc::new(StreamBuffer::new(options));
        let id = self.register(Arc::clone(&buffer));
        (id, buffer)
    }

    /// Register an existing buffer under a fresh id.
    pub fn register(&self, buffer: Arc<StreamBuffer>) -> BufferId {
        let id = BufferId::new();
        self.table().insert(id, buffer);
        id
    }

    pub fn get(&self, id: BufferId) -> Result<Arc<StreamBuffer>, BufferError> {
        self.table()
            .get(&id)
            .cloned()
            .ok_or(BufferError::UnknownUuid(id))
    }

    pub fn remove(&self, id: BufferId) -> Option<Arc<StreamBuffer>> {
        self.table().remove(&id)
    }

    /// Read through a registered buffer.
    ///
    /// A transient buffer that hands out its outcome is dropped from the
    /// registry in the same call.
    pub fn read(
        &self,
        id: BufferId,
        bookmark: Option<BookmarkId>,
        limit: usize,
    ) -> Result<ReadOutcome, BufferError> {
        let buffer = self.get(id)?;
        let outcome = buffer.read(bookmark, limit)?;

        if buffer.is_disposed() {
            debug!(buffer = %id, "Disposing finished buffer");
            self.remove(id);
        }
        Ok(outcome)
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_buffer() {
        let registry = BufferRegistry::new();
        let id = BufferId::new();
        assert_eq!(
            registry.read(id, None, 10),
            Err(BufferError::UnknownUuid(id))
        );
    }

    #[test]
    fn test_transient_buffer_removed_after_outcome() {
        let registry = BufferRegistry::new();
        let (id, buffer) = registry.create_buffer(BufferOptions::transient());
        buffer.push("started");
        buffer.set_status(true, "finished");

        let ReadOutcome::Data { bookmark, data } = registry.read(id, None, 100).unwrap() else {
            panic!("expected data");
        };
        assert_eq!(data, vec!["started"]);
        assert_eq!(registry.len(), 1);

        let outcome = registry.read(id, Some(bookmark), 100).unwrap();
        assert!(matches!(outcome, ReadOutcome::Finished { .. }));
        assert!(registry.is_empty());
        assert_eq!(
            registry.read(id, Some(bookmark), 100),
            Err(BufferError::UnknownUuid(id))
        );
    }

    #[test]
    fn test_persistent_buffer_stays_registered() {
        let registry = BufferRegistry::new();
        let (id, buffer) = registry.create_buffer(BufferOptions::persistent());
        buffer.set_status(false, "server stopped");

        let ReadOutcome::Data { bookmark, .. } = registry.read(id, None, 100).unwrap() else {
            panic!("expected data");
        };
        registry.read(id, Some(bookmark), 100).unwrap();

        assert_eq!(registry.len(), 1);
        buffer.push("server started");
        let ReadOutcome::Data { data, .. } = registry.read(id, None, 100).unwrap() else {
            panic!("expected data");
        };
        assert_eq!(data, vec!["server started"]);
    }
}
