use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use log::{debug, info, warn};

use crate::batch::WriteBatch;
use crate::config::Config;
use crate::engine::{self, Engine, Options};
use crate::error::{Error, Result};
use crate::iterator::{CursorState, DbIterator};
use crate::registry::IteratorRegistry;

/// State shared between a session and the iterators it hands out.
///
/// The session is the sole owner of the engine handle. Iterators only keep a
/// weak reference to this state, to deregister themselves; they never reach
/// the handle through it.
#[derive(Debug)]
pub(crate) struct Shared {
    path: PathBuf,
    /// `None` once the session is closed. Readers hold the lock for as long as
    /// they use the handle, so close cannot release it under them.
    handle: RwLock<Option<Box<dyn Engine>>>,
    pub(crate) registry: Mutex<IteratorRegistry>,
}

/// An open database: the engine handle plus the bookkeeping that keeps every
/// iterator derived from it from outliving it.
///
/// A session can be shared between threads. Point operations run
/// concurrently; `close` waits for them, for iterator creation and for any
/// iterator call in flight, then destroys every live iterator and releases
/// the handle. Every later call fails with [`Error::Closed`].
#[derive(Debug)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Opens the store at `path` with the default engine.
    pub fn open(path: impl AsRef<Path>, create_if_missing: bool) -> Result<Session> {
        Session::open_with(path, Options::default().create_if_missing(create_if_missing))
    }

    pub fn open_with(path: impl AsRef<Path>, options: Options) -> Result<Session> {
        let path = path.as_ref();
        let handle = engine::open(path, &options).map_err(Error::open_failed)?;
        info!("opened {:?} store at {}", options.engine, path.display());
        Ok(Session {
            shared: Arc::new(Shared {
                path: path.to_path_buf(),
                handle: RwLock::new(Some(handle)),
                registry: Mutex::new(IteratorRegistry::new()),
            }),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Session> {
        Session::open_with(&cfg.path, Options::from(cfg))
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn is_closed(&self) -> bool {
        match self.shared.handle.read() {
            Ok(handle) => handle.is_none(),
            Err(_) => true,
        }
    }

    /// Destroys every live iterator, then releases the engine handle.
    /// Closing a closed session does nothing.
    ///
    /// A panic on another thread does not stop the close: poisoned locks are
    /// taken over, since the iterators must be gone before the handle is.
    pub fn close(&self) -> Result<()> {
        let mut handle = self.shared.handle.write().unwrap_or_else(PoisonError::into_inner);
        let Some(engine) = handle.take() else { return Ok(()) };
        let invalidated = self
            .shared
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .invalidate_all();
        drop(engine);
        info!(
            "closed store at {}, {} live iterators destroyed",
            self.path().display(),
            invalidated
        );
        Ok(())
    }

    /// Whether `key` is present. A missing key is not an error.
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        self.with_engine(|engine| match engine.get(key) {
            Ok(_) => Ok(true),
            Err(status) if status.is_not_found() => Ok(false),
            Err(status) => Err(status.into()),
        })
    }

    /// Gets the value stored under `key`. An absent key is
    /// [`Error::NotFound`]; a key stored with an empty value returns an empty
    /// vector.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.with_engine(|engine| Ok(engine.get(key)?))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_engine(|engine| Ok(engine.put(key, value)?))
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.with_engine(|engine| Ok(engine.delete(key)?))
    }

    /// Applies `batch` atomically. The batch is left as it was and may be
    /// written again.
    pub fn write(&self, batch: &WriteBatch) -> Result<()> {
        self.with_engine(|engine| Ok(engine.write(batch.rep())?))
    }

    /// Compacts the key range `[begin, end]`, `None` meaning the start or the
    /// end of the key space.
    ///
    /// This can block for a long time and cannot be cancelled. A concurrent
    /// `close` waits for it to finish.
    pub fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        self.with_engine(|engine| {
            let start = Instant::now();
            engine.compact_range(begin, end)?;
            debug!("compact_range on {} took {:?}", self.path().display(), start.elapsed());
            Ok(())
        })
    }

    /// Opens an iterator, registered with this session before it is
    /// returned, so a concurrent close either sees it or fails the call.
    pub fn new_iterator(&self) -> Result<DbIterator> {
        self.with_engine(|engine| {
            let slot = Arc::new(Mutex::new(CursorState::Active(engine.cursor())));
            let id = self.shared.registry.lock()?.register(&slot);
            debug!("iterator {} registered on {}", id, self.path().display());
            Ok(DbIterator::new(id, slot, Arc::downgrade(&self.shared)))
        })
    }

    /// Number of iterators currently registered.
    pub fn live_iterators(&self) -> Result<usize> {
        Ok(self.shared.registry.lock()?.len())
    }

    /// Every key starting with `prefix`, in key order.
    pub fn prefixed_keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut iter = self.new_iterator()?;
        iter.seek(prefix)?;
        let mut keys = vec![];
        while iter.valid() {
            let key = iter.key()?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key);
            iter.next()?;
        }
        iter.destroy()?;
        Ok(keys)
    }

    /// Deletes, in one batch, every key starting with `prefix` at the time of
    /// the call. Returns how many keys were deleted.
    pub fn remove_prefix(&self, prefix: &[u8]) -> Result<usize> {
        let keys = self.prefixed_keys(prefix)?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut batch = WriteBatch::new();
        for key in &keys {
            batch.delete(key)?;
        }
        self.write(&batch)?;
        debug!("removed {} keys with prefix {}", keys.len(), hex::encode(prefix));
        Ok(keys.len())
    }

    /// Runs `f` against the handle with the closed check and the use of the
    /// handle under one read lock.
    fn with_engine<T>(&self, f: impl FnOnce(&dyn Engine) -> Result<T>) -> Result<T> {
        let handle = self.shared.handle.read()?;
        match handle.as_deref() {
            Some(engine) => f(engine),
            None => Err(Error::Closed),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("closing store at {} on drop: {}", self.path().display(), err);
        }
    }
}
