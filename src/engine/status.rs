use std::fmt::{Display, Formatter};

/// Status codes reported by a storage engine. This is the closed set the
/// error mapper understands; an engine has to fold whatever it detects into
/// one of these.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Code {
    NotFound,
    Corruption,
    NotSupported,
    InvalidArgument,
    IOError,
}

/// A non-ok engine status: a code plus the engine's diagnostic text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    code: Code,
    message: String,
}

pub type Result<T> = std::result::Result<T, Status>;

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Status {
        Status { code, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Status {
        Status::new(Code::NotFound, message)
    }

    pub fn corruption(message: impl Into<String>) -> Status {
        Status::new(Code::Corruption, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Status {
        Status::new(Code::NotSupported, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Status {
        Status::new(Code::InvalidArgument, message)
    }

    pub fn io_error(message: impl Into<String>) -> Status {
        Status::new(Code::IOError, message)
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Code::NotFound
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.code {
            Code::NotFound => "NotFound",
            Code::Corruption => "Corruption",
            Code::NotSupported => "Not implemented",
            Code::InvalidArgument => "Invalid argument",
            Code::IOError => "IO error",
        };
        write!(f, "{}: {}", prefix, self.message)
    }
}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        Status::io_error(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for Status {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        Status::corruption(err.to_string())
    }
}
