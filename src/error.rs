use std::fmt::{Debug, Display, Formatter};
use std::sync::PoisonError;

use config::ConfigError;

use crate::engine::status::{Code, Status};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the session, iterator and batch APIs.
///
/// Engine statuses are converted once, at the engine boundary, and never
/// reach a caller in their raw form. Lifecycle violations (`Closed`,
/// `Destroyed`) are detected locally and never touch the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The store is missing, corrupt or inaccessible at open time.
    OpenFailed(String),
    /// Operation on a closed session.
    Closed,
    /// Operation on a destroyed iterator, either explicitly or by the
    /// cascade of its session's close.
    Destroyed,
    /// Key absent on a point read.
    NotFound(String),
    /// Key/value read or step on an iterator that is not positioned.
    InvalidPosition,
    IO(String),
    /// Engine-detected data corruption, kept apart from `IO` so callers may
    /// decide to repair or rebuild.
    Corruption(String),
    NotSupported(String),
    InvalidArgument(String),
    Internal(String),
}

impl Error {
    /// Maps a status reported while opening a store. Whatever the engine
    /// reports, the caller sees `OpenFailed` with the engine's diagnostic.
    pub fn open_failed(status: Status) -> Error {
        Error::OpenFailed(status.to_string())
    }

    /// The diagnostic text carried by the error, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Error::OpenFailed(s)
            | Error::NotFound(s)
            | Error::IO(s)
            | Error::Corruption(s)
            | Error::NotSupported(s)
            | Error::InvalidArgument(s)
            | Error::Internal(s) => Some(s),
            Error::Closed | Error::Destroyed | Error::InvalidPosition => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::OpenFailed(s) => write!(f, "open failed: {}", s),
            Error::Closed => write!(f, "database is closed"),
            Error::Destroyed => write!(f, "iterator is destroyed"),
            Error::InvalidPosition => write!(f, "iterator is not positioned on an entry"),
            Error::NotFound(s)
            | Error::IO(s)
            | Error::Corruption(s)
            | Error::NotSupported(s)
            | Error::InvalidArgument(s)
            | Error::Internal(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for Error {}

/// The error mapper: every engine status lands on exactly one error kind and
/// keeps the engine text.
impl From<Status> for Error {
    fn from(status: Status) -> Self {
        let message = status.to_string();
        match status.code() {
            Code::NotFound => Error::NotFound(message),
            Code::Corruption => Error::Corruption(message),
            Code::NotSupported => Error::NotSupported(message),
            Code::InvalidArgument => Error::InvalidArgument(message),
            Code::IOError => Error::IO(message),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for Error {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Internal(err.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::Internal(err.to_string())
    }
}
