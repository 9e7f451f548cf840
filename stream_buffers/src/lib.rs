//! Buffer-backed streams
//!
//! In-memory stand-ins for real data sources and sinks, used to exercise
//! `duplexstream` without touching any OS resource.
//!
//! # Example
//! ```
//! use duplexstream::{EventKind, Stream, StreamEvent};
//! use stream_buffers::ReadableStreamBuffer;
//!
//! let readable = ReadableStreamBuffer::new();
//! readable.events().on(EventKind::Data, |event| {
//!     if let StreamEvent::Data(chunk) = event {
//!         assert_eq!(chunk.to_string_lossy(), "Hello!");
//!     }
//! });
//! readable.put(b"Hello!").unwrap();
//! ```

pub mod buffer;
pub mod readable;
pub mod writable;

pub use buffer::Buffer;
pub use readable::{ReadableOptions, ReadableStreamBuffer};
pub use writable::{WritableOptions, WritableStreamBuffer};
