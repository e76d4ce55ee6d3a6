//! A directory-backed engine: an append-only log of batch representations
//! plus an in-memory ordered index rebuilt from the log on open.
//!
//! Every write, whether a single put/delete or a whole batch, becomes one
//! frame in `<dir>/data.log`:
//!
//! ```text
//! +------------------+---------------------------+
//! | len: u32 (BE)    | batch representation      |
//! +------------------+---------------------------+
//! ```
//!
//! A frame is either replayed whole or the open fails, so a batch is never
//! observed half-applied after a restart. Compaction rewrites the log so it
//! holds only the live entries.
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use log::{debug, error, info, warn};

use super::alloc::BufferAllocator;
use super::memory::Memory;
use super::status::{Result, Status};
use super::{Cursor, Engine, Options};
use crate::codec::batch::{self, Record};

const LOG_FILE: &str = "data.log";
const COMPACT_FILE: &str = "data.log.compact";
const FRAME_HEADER_SIZE: usize = 4;
/// Live entries per frame when the log is rewritten.
const COMPACT_FRAME_RECORDS: usize = 1024;

/// The append side of the log.
trait LogSink: Debug + Send {
    fn size(&self) -> io::Result<u64>;
    fn append(&mut self, buf: &[u8]) -> io::Result<()>;
    fn sync(&self) -> io::Result<()>;
    fn truncate(&self, len: u64) -> io::Result<()>;
}

impl LogSink for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn append(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf)
    }

    fn sync(&self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

#[derive(Debug)]
struct LogWriter {
    sink: Box<dyn LogSink>,
    /// Set once a failed append could not be cut back out of the log. The log
    /// may then end in a torn frame, so every later append fails until
    /// compaction rewrites it from the index.
    failed: Option<Status>,
}

impl LogWriter {
    fn new(sink: Box<dyn LogSink>) -> LogWriter {
        LogWriter { sink, failed: None }
    }

    /// Appends one frame. If the write or the sync fails, the log is cut back
    /// to where the frame started.
    fn append(&mut self, frame: &[u8], sync: bool) -> Result<()> {
        if let Some(status) = &self.failed {
            return Err(status.clone());
        }
        let offset = self.sink.size()?;
        let Err(err) = self.write_frame(frame, sync) else { return Ok(()) };
        match self.sink.truncate(offset) {
            Ok(()) => {
                warn!("append failed, log cut back to {} bytes: {}", offset, err);
                Err(err.into())
            }
            Err(rollback) => {
                let status = Status::io_error(format!(
                    "log unusable: append failed ({}) and rollback failed ({})",
                    err, rollback
                ));
                error!("{}", status);
                self.failed = Some(status.clone());
                Err(status)
            }
        }
    }

    fn write_frame(&mut self, frame: &[u8], sync: bool) -> io::Result<()> {
        self.sink.append(frame)?;
        if sync {
            self.sink.sync()?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct LogEngine {
    dir: PathBuf,
    index: Memory,
    /// Holding the lock orders log appends with index updates.
    writer: Mutex<LogWriter>,
    sync: bool,
}

impl LogEngine {
    pub fn open(dir: &Path, options: &Options) -> Result<LogEngine> {
        let log_path = dir.join(LOG_FILE);
        if dir.exists() && !dir.is_dir() {
            return Err(Status::invalid_argument(format!("{}: not a directory", dir.display())));
        }

        if log_path.exists() {
            if options.error_if_exists {
                return Err(Status::invalid_argument(format!(
                    "{}: exists (error_if_exists is true)",
                    dir.display()
                )));
            }
        } else {
            if !options.create_if_missing {
                return Err(Status::invalid_argument(format!(
                    "{}: does not exist (create_if_missing is false)",
                    dir.display()
                )));
            }
            fs::create_dir_all(dir)?;
            File::create(&log_path)?.sync_all()?;
            sync_dir(dir)?;
            info!("created store at {}", dir.display());
        }

        // A compaction that never reached its rename.
        let compact_path = dir.join(COMPACT_FILE);
        if compact_path.is_file() {
            warn!("removing unfinished compaction {}", compact_path.display());
            fs::remove_file(&compact_path)?;
        }

        let start = Instant::now();
        let buf = fs::read(&log_path)?;
        let (data, frames) = replay(&buf, options.allocator.as_ref())?;
        debug!(
            "replayed {} frames ({} bytes) into {} entries from {} in {:?}",
            frames,
            buf.len(),
            data.len(),
            log_path.display(),
            start.elapsed()
        );

        let file = OpenOptions::new().append(true).open(&log_path)?;
        Ok(LogEngine {
            dir: dir.to_path_buf(),
            index: Memory::with_data(data, Arc::clone(&options.allocator)),
            writer: Mutex::new(LogWriter::new(Box::new(file))),
            sync: options.sync,
        })
    }

    /// Current size of the log on disk.
    pub fn log_size(&self) -> Result<u64> {
        Ok(fs::metadata(self.dir.join(LOG_FILE))?.len())
    }

    fn append(&self, rep: &[u8]) -> Result<()> {
        // Validate the whole batch before anything reaches the log.
        let records = batch::records(rep)?.collect::<Result<Vec<_>>>()?;
        let frame = frame(rep)?;
        let mut writer = self.writer.lock().map_err(poisoned)?;
        writer.append(&frame, self.sync)?;
        self.index.apply(records)
    }

    /// Writes every live entry to `path` and returns an append handle on it.
    fn write_compacted(&self, path: &Path, data: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<File> {
        let mut out = File::create(path)?;
        let entries = data.iter().collect::<Vec<_>>();
        for chunk in entries.chunks(COMPACT_FRAME_RECORDS) {
            let records = chunk
                .iter()
                .map(|(k, v)| Record::Put(k.as_slice().into(), v.as_slice().into()))
                .collect::<Vec<_>>();
            out.write_all(&frame(&batch::encode(&records)?)?)?;
        }
        out.sync_all()?;
        Ok(OpenOptions::new().append(true).open(path)?)
    }
}

fn poisoned<T>(err: PoisonError<T>) -> Status {
    Status::io_error(err.to_string())
}

fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

fn remove_unfinished(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!("removing unfinished compaction {}: {}", path.display(), err);
        }
    }
}

fn frame(rep: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(rep.len())
        .map_err(|_| Status::invalid_argument(format!("batch of {} bytes too large", rep.len())))?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + rep.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(rep);
    Ok(frame)
}

/// Rebuilds the index from a log image, returning it with the frame count.
fn replay(
    mut buf: &[u8],
    allocator: &dyn BufferAllocator,
) -> Result<(BTreeMap<Vec<u8>, Vec<u8>>, usize)> {
    let total = buf.len();
    let mut data = BTreeMap::new();
    let mut frames = 0;
    while !buf.is_empty() {
        let offset = total - buf.len();
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(Status::corruption(format!("truncated frame header at offset {}", offset)));
        }
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        let body = &buf[FRAME_HEADER_SIZE..];
        if body.len() < len {
            return Err(Status::corruption(format!(
                "truncated frame at offset {}: want {} bytes, have {}",
                offset,
                len,
                body.len()
            )));
        }
        let records = batch::records(&body[..len])?.collect::<Result<Vec<_>>>()?;
        for record in records {
            match record {
                Record::Put(key, value) => {
                    data.insert(allocator.copy(&key), allocator.copy(&value));
                }
                Record::Delete(key) => {
                    data.remove(key.as_ref());
                }
            }
        }
        buf = &body[len..];
        frames += 1;
    }
    Ok((data, frames))
}

impl Engine for LogEngine {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.index.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(&batch::encode(&[Record::Put(key.into(), value.into())])?)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.append(&batch::encode(&[Record::Delete(key.into())])?)
    }

    fn write(&self, rep: &[u8]) -> Result<()> {
        self.append(rep)
    }

    fn cursor(&self) -> Box<dyn Cursor> {
        self.index.cursor()
    }

    /// Rewrites the whole log. The log has no per-range layout, so the range
    /// only shows up in the log line.
    ///
    /// The new log is written next to the old one and renamed over it. Appends
    /// move to the new log only once the rename has happened, through a handle
    /// opened before it. A successful compaction also clears a failed append
    /// state, since the new log holds exactly the index.
    fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        let start = Instant::now();
        let mut writer = self.writer.lock().map_err(poisoned)?;
        let before = self.log_size()?;
        let data = self.index.snapshot()?;

        let compact_path = self.dir.join(COMPACT_FILE);
        let file = match self.write_compacted(&compact_path, &data) {
            Ok(file) => file,
            Err(status) => {
                remove_unfinished(&compact_path);
                return Err(status);
            }
        };
        if let Err(err) = fs::rename(&compact_path, self.dir.join(LOG_FILE)) {
            remove_unfinished(&compact_path);
            return Err(err.into());
        }
        *writer = LogWriter::new(Box::new(file));
        sync_dir(&self.dir)?;

        info!(
            "compacted {} [{}, {}]: {} entries, {} -> {} bytes in {:?}",
            self.dir.display(),
            begin.map(hex::encode).unwrap_or_default(),
            end.map(hex::encode).unwrap_or_default(),
            data.len(),
            before,
            self.log_size()?,
            start.elapsed()
        );
        Ok(())
    }
}
