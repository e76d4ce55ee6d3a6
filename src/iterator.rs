use std::sync::{Arc, Mutex, PoisonError, Weak};

use log::debug;

use crate::engine::Cursor;
use crate::error::{Error, Result};
use crate::registry::IteratorId;
use crate::session::Shared;

/// What a cursor slot holds: the engine cursor while the iterator is alive,
/// then the terminal destroyed marker.
#[derive(Debug)]
pub(crate) enum CursorState {
    Active(Box<dyn Cursor>),
    Destroyed,
}

impl CursorState {
    /// Releases the cursor. Returns false if it was already released.
    pub(crate) fn destroy(&mut self) -> bool {
        match std::mem::replace(self, CursorState::Destroyed) {
            CursorState::Active(cursor) => {
                drop(cursor);
                true
            }
            CursorState::Destroyed => false,
        }
    }
}

/// Shared between an iterator and its session's registry. The session's
/// close takes this lock before releasing the cursor, so a call in flight on
/// the iterator finishes before the engine handle goes away.
pub(crate) type CursorSlot = Mutex<CursorState>;

/// A cursor over a session's key space in bytewise key order.
///
/// An iterator is `Active` until it is destroyed, explicitly with
/// [`destroy`](DbIterator::destroy), on drop, or when its session closes.
/// After that every positioning or read call fails with [`Error::Destroyed`]
/// and [`valid`](DbIterator::valid) is false.
///
/// While active the iterator is either positioned on an entry or exhausted
/// (unpositioned, or moved past either end). Reading or stepping an exhausted
/// iterator fails with [`Error::InvalidPosition`]; seeking makes it usable
/// again.
#[derive(Debug)]
pub struct DbIterator {
    id: IteratorId,
    slot: Arc<CursorSlot>,
    session: Weak<Shared>,
}

impl DbIterator {
    pub(crate) fn new(id: IteratorId, slot: Arc<CursorSlot>, session: Weak<Shared>) -> DbIterator {
        DbIterator { id, slot, session }
    }

    pub fn seek_to_first(&mut self) -> Result<()> {
        self.reposition(|c| c.seek_to_first())
    }

    pub fn seek_to_last(&mut self) -> Result<()> {
        self.reposition(|c| c.seek_to_last())
    }

    /// Positions at the first key at or after `target`.
    pub fn seek(&mut self, target: &[u8]) -> Result<()> {
        self.reposition(|c| c.seek(target))
    }

    pub fn next(&mut self) -> Result<()> {
        self.step(|c| c.next())
    }

    pub fn prev(&mut self) -> Result<()> {
        self.step(|c| c.prev())
    }

    /// True iff positioned on an entry. Never fails: a destroyed iterator is
    /// simply not valid.
    pub fn valid(&self) -> bool {
        match self.slot.lock() {
            Ok(state) => matches!(&*state, CursorState::Active(c) if c.valid()),
            Err(_) => false,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        match self.slot.lock() {
            Ok(state) => matches!(&*state, CursorState::Destroyed),
            Err(_) => true,
        }
    }

    pub fn key(&self) -> Result<Vec<u8>> {
        self.read(|c| c.key().to_vec())
    }

    pub fn value(&self) -> Result<Vec<u8>> {
        self.read(|c| c.value().to_vec())
    }

    pub fn entry(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        self.read(|c| (c.key().to_vec(), c.value().to_vec()))
    }

    /// Deregisters from the session and releases the cursor. Idempotent, and
    /// harmless after the session has closed. Poisoned locks are taken over,
    /// the cursor is released regardless.
    pub fn destroy(&mut self) -> Result<()> {
        if let Some(shared) = self.session.upgrade() {
            shared.registry.lock().unwrap_or_else(PoisonError::into_inner).deregister(self.id);
        }
        if self.slot.lock().unwrap_or_else(PoisonError::into_inner).destroy() {
            debug!("iterator {} destroyed", self.id);
        }
        Ok(())
    }

    fn with_cursor<T>(&self, f: impl FnOnce(&mut dyn Cursor) -> Result<T>) -> Result<T> {
        let mut state = self.slot.lock()?;
        match &mut *state {
            CursorState::Active(cursor) => f(cursor.as_mut()),
            CursorState::Destroyed => Err(Error::Destroyed),
        }
    }

    fn reposition(&mut self, f: impl FnOnce(&mut dyn Cursor)) -> Result<()> {
        self.with_cursor(|c| {
            f(&mut *c);
            Ok(c.status()?)
        })
    }

    fn step(&mut self, f: impl FnOnce(&mut dyn Cursor)) -> Result<()> {
        self.with_cursor(|c| {
            if !c.valid() {
                return Err(Error::InvalidPosition);
            }
            f(&mut *c);
            Ok(c.status()?)
        })
    }

    fn read<T>(&self, f: impl FnOnce(&dyn Cursor) -> T) -> Result<T> {
        self.with_cursor(|c| if c.valid() { Ok(f(&*c)) } else { Err(Error::InvalidPosition) })
    }
}

impl Drop for DbIterator {
    fn drop(&mut self) {
        let _ = self.destroy();
    }
}
