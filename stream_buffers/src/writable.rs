//! Writable stream collecting everything written into memory
//!
//! With a high-water mark set, `write` reports back-pressure once the
//! collected contents reach the mark. Taking the contents out with
//! `get_contents` then emits `drain`.

use parking_lot::Mutex;
use std::fmt;

use duplexstream::{Encoding, EventBus, Handle, Stream, StreamError, StreamEvent, Writable};

use crate::buffer::Buffer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WritableOptions {
    /// Report back-pressure once this many bytes are held
    pub high_water_mark: Option<usize>,
}

#[derive(Debug)]
struct WriteState {
    ended: bool,
    need_drain: bool,
}

pub struct WritableStreamBuffer {
    handle: Handle,
    events: EventBus,
    buffer: Buffer,
    high_water_mark: Option<usize>,
    state: Mutex<WriteState>,
}

impl WritableStreamBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(WritableOptions::default())
    }

    #[must_use]
    pub fn with_options(options: WritableOptions) -> Self {
        let handle = Handle::next();
        Self {
            handle,
            events: EventBus::new(&format!("writable buffer {}", handle.id())),
            buffer: Buffer::new(),
            high_water_mark: options.high_water_mark,
            state: Mutex::new(WriteState {
                ended: false,
                need_drain: false,
            }),
        }
    }

    /// Bytes collected so far
    #[must_use]
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    fn below_high_water_mark(&self) -> bool {
        self.high_water_mark
            .map_or(true, |mark| self.buffer.len() < mark)
    }

    /// Take out everything collected so far
    ///
    /// Emits `drain` if a previous `write` reported back-pressure.
    #[must_use]
    pub fn get_contents(&self) -> Vec<u8> {
        let contents = self.buffer.take_all();
        let drain = {
            let mut state = self.state.lock();
            let drain = state.need_drain && !state.ended && self.below_high_water_mark();
            if drain {
                state.need_drain = false;
            }
            drain
        };
        if drain {
            self.events.emit(&StreamEvent::Drain);
        }
        contents
    }

    /// Take out everything collected so far, decoded as text
    #[must_use]
    pub fn get_contents_as_string(&self, encoding: Encoding) -> String {
        encoding.decode(&self.get_contents())
    }
}

impl Default for WritableStreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for WritableStreamBuffer {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn events(&self) -> &EventBus {
        &self.events
    }
}

impl Writable for WritableStreamBuffer {
    fn is_writable(&self) -> bool {
        !self.state.lock().ended
    }

    fn write(&self, chunk: &[u8]) -> Result<bool, StreamError> {
        let mut state = self.state.lock();
        if state.ended {
            return Err(StreamError::WriteAfterEnd);
        }
        self.buffer.append(chunk);
        let ok = self.below_high_water_mark();
        if !ok {
            state.need_drain = true;
        }
        Ok(ok)
    }

    fn end(&self) -> Result<(), StreamError> {
        {
            let mut state = self.state.lock();
            if state.ended {
                log::warn!("WritableStreamBuffer::end() called on already ended writable: {state:?}");
                return Ok(());
            }
            state.ended = true;
        }
        self.events.emit(&StreamEvent::Finish);
        Ok(())
    }
}

impl fmt::Debug for WritableStreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        write!(
            f,
            "WritableStreamBuffer(handle={:?}, size={}, ended={}, need_drain={})",
            self.handle,
            self.buffer.len(),
            state.ended,
            state.need_drain
        )
    }
}
