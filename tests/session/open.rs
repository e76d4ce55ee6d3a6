use std::fs;
use std::sync::Arc;

use lvdb::config::Config;
use lvdb::engine::alloc::CountingAllocator;
use lvdb::engine::{EngineType, Options};
use lvdb::error::Result;
use lvdb::{Error, Session, WriteBatch};

#[test]
fn test_reopen_keeps_data() -> Result<()> {
    setup!(db, dir);
    let path = dir.path().join("db");
    db.put(b"a", b"1")?;
    let mut batch = WriteBatch::new();
    batch.put(b"b", b"2")?;
    batch.put(b"c", b"")?;
    batch.delete(b"a")?;
    db.write(&batch)?;
    teardown!(db);

    let db = Session::open(&path, false)?;
    assert_eq!(path, db.path());
    assert!(!db.has(b"a")?);
    assert_eq!(b"2".to_vec(), db.get(b"b")?);
    assert_eq!(Vec::<u8>::new(), db.get(b"c")?);
    teardown!(db);
    Ok(())
}

#[test]
fn test_reopen_after_compaction() -> Result<()> {
    setup!(db, dir);
    for i in 0..100u32 {
        db.put(format!("k{}", i % 10).as_bytes(), &i.to_be_bytes())?;
    }
    db.compact_range(None, None)?;
    teardown!(db);

    let db = Session::open(dir.path().join("db"), false)?;
    assert_eq!(10, db.prefixed_keys(b"k")?.len());
    assert_eq!(99u32.to_be_bytes().to_vec(), db.get(b"k9")?);
    teardown!(db);
    Ok(())
}

#[test]
fn test_missing_store() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("missing");

    match Session::open(&path, false) {
        Err(Error::OpenFailed(msg)) => assert!(msg.contains("does not exist"), "{}", msg),
        other => panic!("expected OpenFailed, got {:?}", other),
    }
    assert!(!path.exists());
    Ok(())
}

#[test]
fn test_error_if_exists() -> Result<()> {
    setup!(db, dir);
    teardown!(db);

    let options = Options::new(EngineType::Log).create_if_missing(true).error_if_exists(true);
    let res = Session::open_with(dir.path().join("db"), options);
    assert!(matches!(res, Err(Error::OpenFailed(_))));
    Ok(())
}

#[test]
fn test_corrupted_log() -> Result<()> {
    setup!(db, dir);
    db.put(b"key", b"value")?;
    teardown!(db);

    let log = dir.path().join("db").join("data.log");
    let mut image = fs::read(&log)?;
    image.truncate(image.len() - 2);
    fs::write(&log, image)?;

    match Session::open(dir.path().join("db"), true) {
        Err(Error::OpenFailed(msg)) => assert!(msg.starts_with("Corruption: "), "{}", msg),
        other => panic!("expected OpenFailed, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_injected_allocator() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let alloc = Arc::new(CountingAllocator::new());
    let options = Options::new(EngineType::Memory).allocator(alloc.clone());
    let db = Session::open_with("ignored", options)?;

    db.put(b"k", b"value")?;
    assert_eq!(0, alloc.allocations());
    db.get(b"k")?;
    db.get(b"k")?;
    assert_eq!(2, alloc.allocations());
    assert_eq!(10, alloc.bytes());

    db.close()?;
    Ok(())
}

#[test]
fn test_from_config() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("lvdb.toml");
    let store = dir.path().join("store");
    fs::write(&file, format!("path = {:?}\n", store.to_string_lossy()))?;

    let cfg = Config::new(&file.to_string_lossy())?;
    let db = Session::from_config(&cfg)?;
    db.put(b"k", b"v")?;
    db.close()?;
    assert!(store.join("data.log").exists());
    Ok(())
}
