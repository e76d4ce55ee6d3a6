use std::sync::Arc;

use serde::Deserialize;

use crate::engine::alloc::SystemAllocator;
use crate::engine::{EngineType, Options};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    pub path: String,
    pub engine: EngineType,

    pub create_if_missing: bool,
    pub error_if_exists: bool,
    pub sync: bool,
}

impl Config {
    /// Loads the configuration from built-in defaults, then `file` if it is
    /// not empty, then `LVDB_*` environment variables.
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("path", "data")?
            .set_default("engine", "Log")?
            .set_default("create_if_missing", true)?
            .set_default("error_if_exists", false)?
            .set_default("sync", false)?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("LVDB"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}

impl From<&Config> for Options {
    fn from(cfg: &Config) -> Self {
        Options {
            engine: cfg.engine,
            create_if_missing: cfg.create_if_missing,
            error_if_exists: cfg.error_if_exists,
            sync: cfg.sync,
            allocator: Arc::new(SystemAllocator),
        }
    }
}
