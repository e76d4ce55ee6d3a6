use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use lvdb::error::Result;
use lvdb::{Error, WriteBatch};

#[test]
fn test_batch_applies_in_order() -> Result<()> {
    setup!(db);
    db.put(b"gone", b"x")?;

    let mut batch = WriteBatch::new();
    batch.put(b"k", b"1")?;
    batch.delete(b"k")?;
    batch.put(b"k", b"2")?;
    batch.delete(b"gone")?;
    batch.put(b"new", b"")?;
    db.write(&batch)?;

    assert_eq!(b"2".to_vec(), db.get(b"k")?);
    assert!(matches!(db.get(b"gone"), Err(Error::NotFound(_))));
    assert_eq!(Vec::<u8>::new(), db.get(b"new")?);

    // the batch survives the write and can be submitted again
    assert_eq!(5, batch.len());
    db.put(b"gone", b"y")?;
    db.write(&batch)?;
    assert!(!db.has(b"gone")?);

    teardown!(db);
    Ok(())
}

#[test]
fn test_empty_batch() -> Result<()> {
    setup!(db);
    db.write(&WriteBatch::new())?;

    let mut batch = WriteBatch::new();
    batch.put(b"k", b"v")?;
    batch.clear();
    db.write(&batch)?;
    assert!(!db.has(b"k")?);

    teardown!(db);
    Ok(())
}

/// A reader either sees none of a batch's keys or all of them.
#[test]
fn test_batch_is_atomic_to_readers() -> Result<()> {
    setup!(db);
    let db = Arc::new(db);
    let done = Arc::new(AtomicBool::new(false));
    const KEYS: u32 = 16;
    const ROUNDS: u32 = 50;

    let reader = {
        let (db, done) = (Arc::clone(&db), Arc::clone(&done));
        thread::spawn(move || -> Result<()> {
            while !done.load(Ordering::Acquire) {
                let mut iter = db.new_iterator()?;
                iter.seek_to_first()?;
                let mut values = vec![];
                while iter.valid() {
                    values.push(iter.value()?);
                    iter.next()?;
                }
                if let Some(first) = values.first() {
                    assert_eq!(KEYS as usize, values.len());
                    assert!(values.iter().all(|v| v == first), "torn batch: {:?}", values);
                }
            }
            Ok(())
        })
    };

    for round in 0..ROUNDS {
        let mut batch = WriteBatch::new();
        for key in 0..KEYS {
            batch.put(&key.to_be_bytes(), &round.to_be_bytes())?;
        }
        db.write(&batch)?;
    }
    done.store(true, Ordering::Release);
    reader.join().map_err(|_| Error::Internal("reader panicked".into()))??;

    let mut iter = db.new_iterator()?;
    iter.seek_to_last()?;
    assert_eq!((ROUNDS - 1).to_be_bytes().to_vec(), iter.value()?);
    Ok(())
}

#[test]
fn test_append() -> Result<()> {
    setup!(db);
    let mut first = WriteBatch::new();
    first.put(b"a", b"1")?;
    let mut second = WriteBatch::new();
    second.put(b"b", b"2")?;
    second.delete(b"a")?;

    first.append(&second);
    assert_eq!(3, first.len());
    db.write(&first)?;
    assert!(!db.has(b"a")?);
    assert_eq!(b"2".to_vec(), db.get(b"b")?);

    teardown!(db);
    Ok(())
}
