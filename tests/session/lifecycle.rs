use std::sync::Arc;
use std::thread;

use lvdb::error::Result;
use lvdb::Error;
use lvdb::WriteBatch;

#[test]
fn test_point_round_trip() -> Result<()> {
    setup!(db);

    db.put(b"k", b"v")?;
    assert_eq!(b"v".to_vec(), db.get(b"k")?);
    assert!(db.has(b"k")?);

    db.put(b"k", b"v2")?;
    assert_eq!(b"v2".to_vec(), db.get(b"k")?);

    db.delete(b"k")?;
    assert!(matches!(db.get(b"k"), Err(Error::NotFound(_))));
    assert!(!db.has(b"k")?);

    // deleting an absent key is fine
    db.delete(b"never")?;

    teardown!(db);
    Ok(())
}

#[test]
fn test_empty_value() -> Result<()> {
    setup!(db);

    db.put(b"k", b"")?;
    assert_eq!(Vec::<u8>::new(), db.get(b"k")?);
    assert!(db.has(b"k")?);

    teardown!(db);
    Ok(())
}

#[test]
fn test_close_invalidates_everything() -> Result<()> {
    setup!(db);
    db.put(b"a", b"1")?;
    db.put(b"b", b"2")?;

    let mut first = db.new_iterator()?;
    let mut second = db.new_iterator()?;
    first.seek_to_first()?;
    second.seek_to_last()?;
    assert_eq!(2, db.live_iterators()?);

    teardown!(db);
    assert!(db.is_closed());
    assert_eq!(0, db.live_iterators()?);

    assert_eq!(Err(Error::Closed), db.get(b"a"));
    assert_eq!(Err(Error::Closed), db.put(b"c", b"3"));
    assert_eq!(Err(Error::Closed), db.delete(b"a"));
    assert_eq!(Err(Error::Closed), db.write(&WriteBatch::new()));
    assert_eq!(Err(Error::Closed), db.compact_range(None, None));
    assert!(matches!(db.new_iterator(), Err(Error::Closed)));

    for iter in [&mut first, &mut second] {
        assert!(!iter.valid());
        assert!(iter.is_destroyed());
        assert_eq!(Err(Error::Destroyed), iter.next());
        assert_eq!(Err(Error::Destroyed), iter.seek(b"a"));
        assert_eq!(Err(Error::Destroyed), iter.value());
    }

    // closing and destroying again are both no-ops
    db.close()?;
    first.destroy()?;
    first.destroy()?;
    Ok(())
}

#[test]
fn test_concurrent_readers_and_close() -> Result<()> {
    setup!(db);
    for i in 0..64u32 {
        db.put(&i.to_be_bytes(), b"v")?;
    }
    let db = Arc::new(db);

    let readers = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || -> Result<()> {
                loop {
                    match db.get(&7u32.to_be_bytes()) {
                        Ok(v) => assert_eq!(b"v".to_vec(), v),
                        Err(Error::Closed) => return Ok(()),
                        Err(err) => return Err(err),
                    }
                    match db.new_iterator() {
                        Ok(mut iter) => match iter.seek_to_first() {
                            Ok(()) | Err(Error::Destroyed) => {}
                            Err(err) => return Err(err),
                        },
                        Err(Error::Closed) => return Ok(()),
                        Err(err) => return Err(err),
                    }
                }
            })
        })
        .collect::<Vec<_>>();

    thread::sleep(std::time::Duration::from_millis(20));
    db.close()?;
    for reader in readers {
        reader.join().map_err(|_| Error::Internal("reader panicked".into()))??;
    }
    assert_eq!(0, db.live_iterators()?);
    Ok(())
}

#[test]
fn test_compact_range() -> Result<()> {
    setup!(db);
    for i in 0..200u32 {
        db.put(b"counter", &i.to_be_bytes())?;
    }
    db.put(b"other", b"x")?;

    db.compact_range(None, None)?;
    db.compact_range(Some(b"a"), Some(b"z"))?;
    db.compact_range(Some(b"z"), None)?;

    assert_eq!(199u32.to_be_bytes().to_vec(), db.get(b"counter")?);
    assert_eq!(b"x".to_vec(), db.get(b"other")?);

    teardown!(db);
    Ok(())
}

#[test]
fn test_prefix_helpers() -> Result<()> {
    setup!(db);
    for key in ["user:1", "user:2", "user:10", "group:1", "users"] {
        db.put(key.as_bytes(), b"")?;
    }

    assert_eq!(
        vec![b"user:1".to_vec(), b"user:10".to_vec(), b"user:2".to_vec()],
        db.prefixed_keys(b"user:")?
    );
    assert_eq!(3, db.remove_prefix(b"user:")?);
    assert!(db.prefixed_keys(b"user:")?.is_empty());
    assert!(db.has(b"users")?);
    assert!(db.has(b"group:1")?);
    assert_eq!(0, db.live_iterators()?);

    teardown!(db);
    Ok(())
}
