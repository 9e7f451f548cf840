//! Stream capabilities
//!
//! A stream is anything with an identity and an event bus. On top of that it
//! may be able to produce data ([`Readable`]), accept data ([`Writable`]) or
//! both. The traits are independent; a duplex stream simply implements the
//! two of them.

use crate::encoding::Encoding;
use crate::error::StreamError;
use crate::events::EventBus;
use crate::idgen::Handle;

pub trait Stream: Send + Sync {
    /// Identity reported to writables in `pipe`/`unpipe` events
    fn handle(&self) -> Handle;

    /// Notification channel of this stream
    fn events(&self) -> &EventBus;
}

/// Producer of `data` and `end` events
pub trait Readable: Stream {
    /// `false` once the stream has ended or cannot produce data at all
    fn is_readable(&self) -> bool;

    /// Stop emitting `data` until `resume` is called
    fn pause(&self);

    fn resume(&self);

    fn is_paused(&self) -> bool;

    /// Emit text chunks decoded with the named encoding from now on
    ///
    /// # Errors
    ///
    /// Implementations reject identifiers they do not know, usually with
    /// `StreamError::UnknownEncoding`.
    fn set_encoding(&self, encoding: &str) -> Result<(), StreamError>;

    fn encoding(&self) -> Option<Encoding>;
}

/// Consumer of data, emitting `drain` after back-pressure and `finish` after `end`
pub trait Writable: Stream {
    /// `false` once the stream has ended or cannot accept data at all
    fn is_writable(&self) -> bool;

    /// Accept a chunk for output
    ///
    /// Returns `false` when the caller should stop writing until `drain`.
    ///
    /// # Errors
    ///
    /// Whatever the concrete writable fails with, e.g. `StreamError::WriteAfterEnd`.
    fn write(&self, chunk: &[u8]) -> Result<bool, StreamError>;

    /// Signal that no more data will be written
    ///
    /// # Errors
    ///
    /// Whatever the concrete writable fails with while flushing.
    fn end(&self) -> Result<(), StreamError>;
}
