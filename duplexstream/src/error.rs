//! Errors raised by streams and by the duplex adapter

use std::fmt;

use crate::encoding::Encoding;

/// Which half of a duplex pairing an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Readable,
    Writable,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Readable => write!(f, "readable"),
            Side::Writable => write!(f, "writable"),
        }
    }
}

/// Error type for stream operations
///
/// `InvalidArgument` is the only variant the duplex adapter raises itself.
/// Everything else originates in a concrete readable or writable and is
/// relayed by the adapter as-is.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("invalid argument: not {0}")]
    InvalidArgument(Side),

    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("invalid {0} data")]
    InvalidData(Encoding),

    #[error("write after end")]
    WriteAfterEnd,

    #[error("underlying {0} stream is gone")]
    Detached(Side),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, StreamError::InvalidArgument(_))
    }
}
