pub mod duplex;
pub mod encoding;
pub mod error;
pub mod events;
pub mod idgen;
pub mod pipe;
pub mod stdio;
pub mod stream;

// Re-export the duplex stream for convenience
pub use duplex::DuplexStream;

// Re-export stream capabilities
pub use stream::{Readable, Stream, Writable};

// Re-export event types
pub use events::{Chunk, EventBus, EventKind, ListenerId, StreamEvent, WeakEventBus};

// Re-export piping
pub use pipe::{pipe, pipe_with, PipeOptions, Pipeline};

pub use encoding::{Encoding, TextDecoder};
pub use error::{Side, StreamError};
pub use idgen::{Handle, IdGen};
pub use stdio::{IoReadable, IoWritable};
