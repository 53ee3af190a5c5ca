//! Error types for the CountDb engine.

use std::fmt;
use std::io;

/// The result type used throughout CountDb.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for CountDb operations.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred.
    Io(io::Error),

    /// The bytecode stream ended in the middle of an instruction.
    IncompleteEncoding(String),

    /// An instruction's target is not a named counter.
    InvalidTarget(String),

    /// A counter index points beyond the resolved id list.
    IndexOutOfRange {
        /// The index found in the bytecode.
        index: usize,
        /// The number of resolved counter ids.
        len: usize,
    },

    /// A value-kind code outside the defined encoding table.
    InvalidValueKind(u8),

    /// Data corruption was detected in the journal or storage.
    Corruption(String),

    /// The persistent sink rejected or failed a write.
    Storage(String),

    /// An invalid argument was provided.
    InvalidArgument(String),

    /// A serialization or deserialization error occurred.
    Serialization(String),
}

impl Error {
    /// Creates a new incomplete-encoding error.
    pub fn incomplete(msg: impl Into<String>) -> Self {
        Error::IncompleteEncoding(msg.into())
    }

    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Returns true if this error aborts compilation of a script.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Error::IncompleteEncoding(_)
                | Error::InvalidTarget(_)
                | Error::IndexOutOfRange { .. }
                | Error::InvalidValueKind(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::IncompleteEncoding(msg) => write!(f, "Invalid encoding: {}", msg),
            Error::InvalidTarget(msg) => write!(f, "Invalid target: {}", msg),
            Error::IndexOutOfRange { index, len } => {
                write!(f, "Counter index {} out of range (have {} ids)", index, len)
            }
            Error::InvalidValueKind(kind) => write!(f, "Invalid value kind: {:#x}", kind),
            Error::Corruption(msg) => write!(f, "Data corruption: {}", msg),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
