//! Readable stream fed by hand
//!
//! Data `put` into a [`ReadableStreamBuffer`] is emitted right away as `data`
//! events of at most `chunk_size` bytes. While paused, data accumulates and is
//! emitted on `resume`. After `stop`, the stream emits `end` once everything
//! buffered has been emitted.

use parking_lot::Mutex;
use std::fmt;

use duplexstream::{
    Chunk, Encoding, EventBus, Handle, Readable, Stream, StreamError, StreamEvent, TextDecoder,
};

use crate::buffer::Buffer;

/// Default maximum size of one `data` chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadableOptions {
    pub chunk_size: usize,
    /// Capacity to reserve up front
    pub initial_size: usize,
}

impl Default for ReadableOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            initial_size: 8 * 1024,
        }
    }
}

#[derive(Debug)]
struct ReadState {
    paused: bool,
    stopped: bool,
    ended: bool,
    /// An emission loop is running further up the stack
    flushing: bool,
    decoder: Option<TextDecoder>,
}

pub struct ReadableStreamBuffer {
    handle: Handle,
    events: EventBus,
    buffer: Buffer,
    chunk_size: usize,
    state: Mutex<ReadState>,
}

impl ReadableStreamBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ReadableOptions::default())
    }

    #[must_use]
    pub fn with_options(options: ReadableOptions) -> Self {
        let handle = Handle::next();
        Self {
            handle,
            events: EventBus::new(&format!("readable buffer {}", handle.id())),
            buffer: Buffer::with_capacity(options.initial_size),
            chunk_size: options.chunk_size.max(1),
            state: Mutex::new(ReadState {
                paused: false,
                stopped: false,
                ended: false,
                flushing: false,
                decoder: None,
            }),
        }
    }

    /// Queue raw bytes for emission
    ///
    /// # Errors
    ///
    /// Returns `StreamError::WriteAfterEnd` after `stop`.
    pub fn put(&self, data: &[u8]) -> Result<(), StreamError> {
        if self.state.lock().stopped {
            return Err(StreamError::WriteAfterEnd);
        }
        self.buffer.append(data);
        self.flush();
        Ok(())
    }

    /// Queue text, converted to bytes with `encoding` (UTF-8 if `None`)
    ///
    /// # Errors
    ///
    /// Returns `StreamError::WriteAfterEnd` after `stop`, or
    /// `StreamError::InvalidData` if `text` does not fit `encoding`.
    pub fn put_str(&self, text: &str, encoding: Option<Encoding>) -> Result<(), StreamError> {
        let bytes = encoding.unwrap_or(Encoding::Utf8).encode(text)?;
        self.put(&bytes)
    }

    /// No more data will be put; `end` follows the buffered data
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if state.stopped {
                log::warn!("ReadableStreamBuffer::stop() called twice: {state:?}");
                return;
            }
            state.stopped = true;
        }
        self.flush();
    }

    /// Bytes buffered but not emitted yet
    #[must_use]
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Emit buffered data until paused, empty, or ended
    fn flush(&self) {
        {
            let mut state = self.state.lock();
            if state.flushing {
                // The running loop will pick up the new data
                return;
            }
            state.flushing = true;
        }

        // Emit outside the lock
        while let Some(event) = self.next_event() {
            self.events.emit(&event);
        }
    }

    /// Next event to emit; clears the `flushing` flag when there is none
    fn next_event(&self) -> Option<StreamEvent> {
        let mut state = self.state.lock();
        while !state.paused && !state.ended {
            let data = self.buffer.take(self.chunk_size);
            if !data.is_empty() {
                let chunk = match state.decoder.as_mut() {
                    Some(decoder) => Chunk::from(decoder.decode_chunk(&data)),
                    None => Chunk::from(data),
                };
                if chunk.is_empty() {
                    // Held back by the decoder until the rest arrives
                    continue;
                }
                return Some(StreamEvent::Data(chunk));
            }
            if !state.stopped {
                break;
            }
            if let Some(text) = state.decoder.as_mut().and_then(TextDecoder::finish) {
                return Some(StreamEvent::Data(Chunk::from(text)));
            }
            state.ended = true;
            return Some(StreamEvent::End);
        }
        state.flushing = false;
        None
    }
}

impl Default for ReadableStreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for ReadableStreamBuffer {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn events(&self) -> &EventBus {
        &self.events
    }
}

impl Readable for ReadableStreamBuffer {
    fn is_readable(&self) -> bool {
        !self.state.lock().ended
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn resume(&self) {
        self.state.lock().paused = false;
        self.flush();
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn set_encoding(&self, encoding: &str) -> Result<(), StreamError> {
        let encoding = encoding.parse::<Encoding>()?;
        self.state.lock().decoder = Some(encoding.decoder());
        Ok(())
    }

    fn encoding(&self) -> Option<Encoding> {
        self.state.lock().decoder.as_ref().map(TextDecoder::encoding)
    }
}

impl fmt::Debug for ReadableStreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        write!(
            f,
            "ReadableStreamBuffer(handle={:?}, size={}, paused={}, stopped={}, ended={})",
            self.handle,
            self.buffer.len(),
            state.paused,
            state.stopped,
            state.ended
        )
    }
}
