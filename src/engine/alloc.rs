use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Allocates the buffers an engine hands back to callers (values read by
/// point lookups, entries decoded while replaying a log, and so on).
///
/// Engines receive the allocator through their options instead of reaching
/// for process-wide state, so a test can substitute an instrumented one.
pub trait BufferAllocator: Debug + Send + Sync {
    /// Returns an empty buffer able to hold at least `len` bytes.
    fn allocate(&self, len: usize) -> Vec<u8>;

    /// Copies `data` into a freshly allocated buffer.
    fn copy(&self, data: &[u8]) -> Vec<u8> {
        let mut buf = self.allocate(data.len());
        buf.extend_from_slice(data);
        buf
    }
}

/// Plain heap allocation.
#[derive(Debug, Default)]
pub struct SystemAllocator;

impl BufferAllocator for SystemAllocator {
    fn allocate(&self, len: usize) -> Vec<u8> {
        Vec::with_capacity(len)
    }
}

/// Heap allocation that counts what it hands out.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    allocations: AtomicUsize,
    bytes: AtomicUsize,
}

impl CountingAllocator {
    pub fn new() -> CountingAllocator {
        CountingAllocator::default()
    }

    /// Number of buffers allocated so far.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Total bytes requested so far.
    pub fn bytes(&self) -> usize {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl BufferAllocator for CountingAllocator {
    fn allocate(&self, len: usize) -> Vec<u8> {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len, Ordering::Relaxed);
        Vec::with_capacity(len)
    }
}
