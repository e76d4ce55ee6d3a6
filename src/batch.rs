use std::fmt::{Debug, Formatter};

use crate::codec::batch::{self, Record};
use crate::codec::bincodec;
use crate::error::Result;

/// An ordered buffer of puts and deletes, applied atomically by
/// [`Session::write`](crate::session::Session::write).
///
/// The batch is built without any session and keeps its operations in the
/// serialized form the engine consumes. Operations are applied in insertion
/// order; a later operation on a key shadows an earlier one only through that
/// order. A batch stays intact after a write and can be submitted again.
#[derive(Clone, PartialEq)]
pub struct WriteBatch {
    rep: Vec<u8>,
}

impl WriteBatch {
    pub fn new() -> WriteBatch {
        WriteBatch { rep: batch::empty() }
    }

    /// Queues a put of `value` under `key`.
    ///
    /// Encoding into an in-memory buffer only fails on allocation limits.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.push(&Record::Put(key.into(), value.into()))
    }

    /// Queues a delete of `key`.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.push(&Record::Delete(key.into()))
    }

    /// Drops every queued operation.
    pub fn clear(&mut self) {
        self.rep.clear();
        self.rep.extend_from_slice(&batch::empty());
    }

    /// Appends the operations of `other` after the ones already queued.
    pub fn append(&mut self, other: &WriteBatch) {
        let count = self.len() + other.len();
        self.rep.extend_from_slice(&other.rep[batch::HEADER_SIZE..]);
        batch::set_count(&mut self.rep, count);
    }

    /// Number of queued operations.
    pub fn len(&self) -> u32 {
        batch::count(&self.rep)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size in bytes of the serialized batch. Good enough for flush
    /// heuristics, not a contract.
    pub fn approximate_size(&self) -> usize {
        self.rep.len()
    }

    /// The serialized form handed to the engine.
    pub(crate) fn rep(&self) -> &[u8] {
        &self.rep
    }

    fn push(&mut self, record: &Record) -> Result<()> {
        let count = self.len() + 1;
        bincodec::serialize_into(&mut self.rep, record)?;
        batch::set_count(&mut self.rep, count);
        Ok(())
    }
}

impl Default for WriteBatch {
    fn default() -> Self {
        WriteBatch::new()
    }
}

impl Debug for WriteBatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBatch")
            .field("len", &self.len())
            .field("approximate_size", &self.approximate_size())
            .finish()
    }
}
