pub mod error;

pub mod codec;
pub mod engine;

pub mod batch;
pub mod config;
pub mod iterator;
mod registry;
pub mod session;

pub use batch::WriteBatch;
pub use error::{Error, Result};
pub use iterator::DbIterator;
pub use session::Session;
