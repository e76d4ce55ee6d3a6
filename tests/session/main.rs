macro_rules! setup {
    ($db:ident) => {
        let _ = env_logger::builder().is_test(true).try_init();
        let _dir = tempfile::tempdir()?;
        let $db = lvdb::Session::open(_dir.path().join("db"), true)?;
    };
    ($db:ident, $dir:ident) => {
        let _ = env_logger::builder().is_test(true).try_init();
        let $dir = tempfile::tempdir()?;
        let $db = lvdb::Session::open($dir.path().join("db"), true)?;
    };
}

macro_rules! teardown {
    ($db:ident) => {
        $db.close()?;
    };
}

mod batch;
mod lifecycle;
mod open;
