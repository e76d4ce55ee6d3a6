use std::collections::HashMap;
use std::sync::{Arc, PoisonError, Weak};

use crate::iterator::CursorSlot;

pub(crate) type IteratorId = u64;

/// The live iterators of one session.
///
/// Entries are weak: an iterator owns its cursor slot, the registry only
/// needs to reach it when the session closes. All access goes through the
/// session's registry mutex.
#[derive(Debug, Default)]
pub(crate) struct IteratorRegistry {
    next_id: IteratorId,
    live: HashMap<IteratorId, Weak<CursorSlot>>,
}

impl IteratorRegistry {
    pub(crate) fn new() -> IteratorRegistry {
        IteratorRegistry::default()
    }

    pub(crate) fn register(&mut self, slot: &Arc<CursorSlot>) -> IteratorId {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, Arc::downgrade(slot));
        id
    }

    /// Returns false if the id was not tracked, i.e. it was already
    /// deregistered or swept by `invalidate_all`.
    pub(crate) fn deregister(&mut self, id: IteratorId) -> bool {
        self.live.remove(&id).is_some()
    }

    /// Destroys every tracked iterator and empties the registry, returning how
    /// many iterators were still active.
    pub(crate) fn invalidate_all(&mut self) -> usize {
        let mut invalidated = 0;
        for (_, slot) in self.live.drain() {
            let Some(slot) = slot.upgrade() else { continue };
            // A panic in the middle of an iterator call must not keep its
            // cursor alive past the handle.
            let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if state.destroy() {
                invalidated += 1;
            }
        }
        invalidated
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
