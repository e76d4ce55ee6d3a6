use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use self::alloc::{BufferAllocator, SystemAllocator};
use self::status::Result;

pub mod alloc;
pub mod logfile;
pub mod memory;
pub mod status;

/// An ordered key/value storage engine, where both keys and values are
/// arbitrary byte strings stored in bytewise key order.
///
/// This is the boundary the session consumes. Point operations and batch
/// writes take `&self`: an engine must be safe to call from several threads
/// at once. Closing the engine is dropping it.
///
/// The Engine trait is designed as `trait object` compatible, the session
/// holds it as a `Box<dyn Engine>` and never knows which engine it talks to.
pub trait Engine: Debug + Send + Sync {
    /// Gets the value with a given key, `NotFound` if absent.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Sets a value for a key, overwrite the existing value if any.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes a key. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Applies a serialized batch (see [`crate::codec::batch`]) atomically:
    /// either every record takes effect or none does.
    fn write(&self, rep: &[u8]) -> Result<()>;

    /// Opens a cursor over the key space. The cursor starts unpositioned.
    fn cursor(&self) -> Box<dyn Cursor>;

    /// Compacts the underlying storage for the key range `[begin, end]`,
    /// `None` meaning the start or the end of the key space.
    fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()>;
}

/// An engine-level cursor with sequential position state.
///
/// `key` and `value` are only meaningful while `valid` is true; the caller
/// guarantees that.
pub trait Cursor: Debug + Send {
    fn valid(&self) -> bool;
    fn seek_to_first(&mut self);
    fn seek_to_last(&mut self);
    /// Positions at the first key >= `target`.
    fn seek(&mut self, target: &[u8]);
    fn next(&mut self);
    fn prev(&mut self);
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
    /// The first error the cursor hit, if any.
    fn status(&self) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineType {
    Memory,
    Log,
}

/// Options an engine is opened with.
#[derive(Debug, Clone)]
pub struct Options {
    pub engine: EngineType,
    /// Create the store if it does not exist.
    pub create_if_missing: bool,
    /// Fail if the store already exists.
    pub error_if_exists: bool,
    /// Flush every write to stable storage before returning.
    pub sync: bool,
    pub allocator: Arc<dyn BufferAllocator>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            engine: EngineType::Log,
            create_if_missing: false,
            error_if_exists: false,
            sync: false,
            allocator: Arc::new(SystemAllocator),
        }
    }
}

impl Options {
    pub fn new(engine: EngineType) -> Options {
        Options { engine, ..Options::default() }
    }

    pub fn create_if_missing(mut self, create_if_missing: bool) -> Options {
        self.create_if_missing = create_if_missing;
        self
    }

    pub fn error_if_exists(mut self, error_if_exists: bool) -> Options {
        self.error_if_exists = error_if_exists;
        self
    }

    pub fn sync(mut self, sync: bool) -> Options {
        self.sync = sync;
        self
    }

    pub fn allocator(mut self, allocator: Arc<dyn BufferAllocator>) -> Options {
        self.allocator = allocator;
        self
    }
}

/// Opens an engine of the configured type at `path`.
pub fn open(path: &Path, options: &Options) -> Result<Box<dyn Engine>> {
    match options.engine {
        EngineType::Memory => Ok(Box::new(memory::Memory::new(Arc::clone(&options.allocator)))),
        EngineType::Log => Ok(Box::new(logfile::LogEngine::open(path, options)?)),
    }
}
