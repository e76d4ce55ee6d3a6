//! Serialized representation of a write batch, the only form in which a batch
//! crosses the engine boundary.
//!
//! Layout:
//!
//! ```text
//! +-----------------+----------+----------+-----+
//! | count: u32 (BE) | record 1 | record 2 | ... |
//! +-----------------+----------+----------+-----+
//! ```
//!
//! Each record is a bincodec encoded [`Record`]. Records are applied in the
//! order they appear.
use std::borrow::Cow;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::codec::bincodec;
use crate::engine::status::{Result, Status};

pub const HEADER_SIZE: usize = 4;

/// One batch operation. Byte fields borrow from the representation when
/// decoding, so replaying a batch does not copy keys until the engine stores
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record<'a> {
    Put(
        #[serde(with = "serde_bytes")]
        #[serde(borrow)]
        Cow<'a, [u8]>,
        #[serde(with = "serde_bytes")]
        #[serde(borrow)]
        Cow<'a, [u8]>,
    ),
    Delete(
        #[serde(with = "serde_bytes")]
        #[serde(borrow)]
        Cow<'a, [u8]>,
    ),
}

/// An empty representation: just the header with a zero count.
pub fn empty() -> Vec<u8> {
    vec![0; HEADER_SIZE]
}

pub fn count(rep: &[u8]) -> u32 {
    match rep.get(..HEADER_SIZE) {
        Some(header) => u32::from_be_bytes([header[0], header[1], header[2], header[3]]),
        None => 0,
    }
}

pub fn set_count(rep: &mut [u8], count: u32) {
    rep[..HEADER_SIZE].copy_from_slice(&count.to_be_bytes());
}

/// Encodes `records` into a complete representation.
pub fn encode(records: &[Record]) -> Result<Vec<u8>> {
    let mut rep = empty();
    for record in records {
        bincodec::options().serialize_into(&mut rep, record)?;
    }
    set_count(&mut rep, records.len() as u32);
    Ok(rep)
}

/// Decodes the records of a representation, checking the header count
/// against the body.
pub fn records(rep: &[u8]) -> Result<Records<'_>> {
    if rep.len() < HEADER_SIZE {
        return Err(Status::corruption(format!("batch too small: {} bytes", rep.len())));
    }
    Ok(Records { rest: &rep[HEADER_SIZE..], remaining: count(rep), failed: false })
}

#[derive(Debug)]
pub struct Records<'a> {
    rest: &'a [u8],
    remaining: u32,
    failed: bool,
}

impl<'a> Records<'a> {
    fn decode_next(&mut self) -> Result<Record<'a>> {
        let options = bincodec::options();
        let mut de = bincode::Deserializer::from_slice(self.rest, options);
        let record = Record::deserialize(&mut de)?;
        // The slice deserializer does not report how much it consumed. Records
        // are always written canonically, so the bytes just decoded must be
        // the record's own encoding; anything else is not a record we wrote.
        let encoded = bincodec::serialize(&record).map_err(|e| Status::corruption(e.to_string()))?;
        if !self.rest.starts_with(&encoded) {
            return Err(Status::corruption("non-canonical batch record encoding"));
        }
        self.rest = &self.rest[encoded.len()..];
        Ok(record)
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.remaining == 0 {
            if self.rest.is_empty() {
                return None;
            }
            self.failed = true;
            return Some(Err(Status::corruption(format!(
                "{} trailing bytes after last batch record",
                self.rest.len()
            ))));
        }
        self.remaining -= 1;
        let res = self.decode_next();
        if res.is_err() {
            self.failed = true;
        }
        Some(res)
    }
}
