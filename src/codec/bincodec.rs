//! Bincodec is binary encoding for rust values. For details, see:
//! https://github.com/bincode-org/bincode
//!
//! By default, the bincode::(de)serialize functions use fixed-length integer
//! encoding, despite DefaultOptions using variable-length encoding. This module
//! pins one set of options (big endian, varint lengths) so that batch records
//! and log records written by one call site decode the same way everywhere.
//!
//! Note that DefaultOptions rejects trailing bytes, which is what a
//! whole-buffer decode wants. Sequential decoders build their own
//! `bincode::Deserializer` over a slice with these options.
use bincode::{DefaultOptions, Options};
use serde::Serialize;

use crate::error::Result;

pub fn options() -> impl Options {
    DefaultOptions::new().with_big_endian().with_varint_encoding()
}

pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let res = options().serialize(value)?;
    Ok(res)
}

/// Appends the encoding of `value` to `buf`.
pub fn serialize_into<T: Serialize>(buf: &mut Vec<u8>, value: &T) -> Result<()> {
    options().serialize_into(buf, value)?;
    Ok(())
}
