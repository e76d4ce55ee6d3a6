use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use super::alloc::BufferAllocator;
use super::status::{Result, Status};
use super::{Cursor, Engine};
use crate::codec::batch::{self, Record};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory engine over an ordered map.
///
/// The map sits behind an `Arc` so that a cursor can pin the state it was
/// opened on: writers clone the map only while some cursor still holds the
/// old one. That clone is O(n) and happens on the first write after a cursor
/// is opened, once per pinned state. Keep cursors short-lived on large stores;
/// a destroyed or dropped cursor releases its pin right away.
#[derive(Debug)]
pub struct Memory {
    data: RwLock<Arc<Map>>,
    allocator: Arc<dyn BufferAllocator>,
}

impl Memory {
    pub fn new(allocator: Arc<dyn BufferAllocator>) -> Memory {
        Memory { data: RwLock::new(Arc::new(BTreeMap::new())), allocator }
    }

    pub(crate) fn with_data(data: Map, allocator: Arc<dyn BufferAllocator>) -> Memory {
        Memory { data: RwLock::new(Arc::new(data)), allocator }
    }

    /// Pins the current state of the map.
    pub(crate) fn snapshot(&self) -> Result<Arc<Map>> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(Arc::clone(&data))
    }

    pub(crate) fn apply(&self, records: Vec<Record>) -> Result<()> {
        let mut data = self.data.write().map_err(poisoned)?;
        let data = Arc::make_mut(&mut *data);
        for record in records {
            match record {
                Record::Put(key, value) => {
                    data.insert(key.into_owned(), value.into_owned());
                }
                Record::Delete(key) => {
                    data.remove(key.as_ref());
                }
            }
        }
        Ok(())
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> Status {
    Status::io_error(err.to_string())
}

impl Engine for Memory {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let data = self.data.read().map_err(poisoned)?;
        match data.get(key) {
            Some(value) => Ok(self.allocator.copy(value)),
            None => Err(Status::not_found(hex::encode(key))),
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.apply(vec![Record::Put(key.into(), value.into())])
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.apply(vec![Record::Delete(key.into())])
    }

    fn write(&self, rep: &[u8]) -> Result<()> {
        // Decode everything before touching the map, a bad record must leave
        // no partial state behind.
        let records = batch::records(rep)?.collect::<Result<Vec<_>>>()?;
        self.apply(records)
    }

    fn cursor(&self) -> Box<dyn Cursor> {
        match self.snapshot() {
            Ok(data) => Box::new(MapCursor::new(data)),
            Err(status) => Box::new(MapCursor::failed(status)),
        }
    }

    fn compact_range(&self, _begin: Option<&[u8]>, _end: Option<&[u8]>) -> Result<()> {
        Ok(())
    }
}

/// A cursor over a pinned map.
#[derive(Debug)]
pub(crate) struct MapCursor {
    data: Arc<Map>,
    current: Option<Vec<u8>>,
    status: Option<Status>,
}

impl MapCursor {
    pub(crate) fn new(data: Arc<Map>) -> MapCursor {
        MapCursor { data, current: None, status: None }
    }

    fn failed(status: Status) -> MapCursor {
        MapCursor { data: Arc::new(BTreeMap::new()), current: None, status: Some(status) }
    }

    fn position(&mut self, found: Option<(&Vec<u8>, &Vec<u8>)>) {
        self.current = found.map(|(k, _)| k.clone());
    }
}

impl Cursor for MapCursor {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn seek_to_first(&mut self) {
        let data = Arc::clone(&self.data);
        self.position(data.iter().next());
    }

    fn seek_to_last(&mut self) {
        let data = Arc::clone(&self.data);
        self.position(data.iter().next_back());
    }

    fn seek(&mut self, target: &[u8]) {
        let data = Arc::clone(&self.data);
        let range = (Bound::Included(target), Bound::Unbounded);
        self.position(data.range::<[u8], _>(range).next());
    }

    fn next(&mut self) {
        let Some(current) = self.current.take() else { return };
        let data = Arc::clone(&self.data);
        let range = (Bound::Excluded(current.as_slice()), Bound::Unbounded);
        self.position(data.range::<[u8], _>(range).next());
    }

    fn prev(&mut self) {
        let Some(current) = self.current.take() else { return };
        let data = Arc::clone(&self.data);
        let range = (Bound::Unbounded, Bound::Excluded(current.as_slice()));
        self.position(data.range::<[u8], _>(range).next_back());
    }

    fn key(&self) -> &[u8] {
        self.current.as_deref().unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().and_then(|k| self.data.get(k)).map(Vec::as_slice).unwrap_or_default()
    }

    fn status(&self) -> Result<()> {
        match &self.status {
            Some(status) => Err(status.clone()),
            None => Ok(()),
        }
    }
}
