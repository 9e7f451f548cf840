//! Streams over `std::io` readers and writers
//!
//! [`IoReadable`] does not read on its own: the owner drives it with
//! [`IoReadable::pump`] or [`IoReadable::pump_to_end`], and each successful
//! read is emitted as one `data` event. This keeps all event delivery on the
//! caller's thread.

use parking_lot::Mutex;
use std::fmt;
use std::io::{ErrorKind, Read, Write};

use crate::encoding::{Encoding, TextDecoder};
use crate::error::StreamError;
use crate::events::{Chunk, EventBus, StreamEvent};
use crate::idgen::Handle;
use crate::stream::{Readable, Stream, Writable};

/// Default read size for `IoReadable::pump`
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

struct ReadState<R> {
    reader: R,
    paused: bool,
    ended: bool,
    decoder: Option<TextDecoder>,
}

/// Readable stream over any `std::io::Read`
pub struct IoReadable<R> {
    handle: Handle,
    events: EventBus,
    chunk_size: usize,
    state: Mutex<ReadState<R>>,
}

impl<R: Read + Send> IoReadable<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    #[must_use]
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        let handle = Handle::next();
        Self {
            handle,
            events: EventBus::new(&format!("io readable {}", handle.id())),
            chunk_size: chunk_size.max(1),
            state: Mutex::new(ReadState {
                reader,
                paused: false,
                ended: false,
                decoder: None,
            }),
        }
    }

    /// Read once from the underlying reader and emit the result
    ///
    /// Emits `data` for a non-empty read, or `end` when the reader reports
    /// EOF. Does nothing while paused or after the end. With an encoding set,
    /// a read holding only part of a character emits nothing until the rest
    /// arrives.
    ///
    /// Returns the number of bytes read.
    ///
    /// # Errors
    ///
    /// A failed read is emitted as an `error` event, ends the stream, and is
    /// also returned as `StreamError::Io` with the same error kind.
    pub fn pump(&self) -> Result<usize, StreamError> {
        let mut buf = vec![0u8; self.chunk_size];
        let (result, events) = {
            let mut state = self.state.lock();
            if state.paused || state.ended {
                return Ok(0);
            }
            let result = loop {
                match state.reader.read(&mut buf) {
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    other => break other,
                }
            };
            let mut events = Vec::with_capacity(2);
            match result {
                Ok(0) => {
                    state.ended = true;
                    if let Some(text) = state.decoder.as_mut().and_then(TextDecoder::finish) {
                        events.push(StreamEvent::Data(Chunk::from(text)));
                    }
                    events.push(StreamEvent::End);
                }
                Ok(n) => {
                    buf.truncate(n);
                    match state.decoder.as_mut() {
                        Some(decoder) => {
                            let text = decoder.decode_chunk(&buf);
                            if !text.is_empty() {
                                events.push(StreamEvent::Data(Chunk::from(text)));
                            }
                        }
                        None => events.push(StreamEvent::Data(Chunk::from(buf))),
                    }
                }
                Err(_) => state.ended = true,
            }
            (result, events)
        };

        // Emit outside the lock
        for event in &events {
            self.events.emit(event);
        }
        match result {
            Ok(n) => Ok(n),
            Err(e) => {
                let kind = e.kind();
                self.events.emit(&StreamEvent::error(StreamError::Io(e)));
                Err(StreamError::Io(kind.into()))
            }
        }
    }

    /// Pump until the end of input, or until a listener pauses the stream
    ///
    /// Returns the total number of bytes emitted.
    ///
    /// # Errors
    ///
    /// See [`IoReadable::pump`].
    pub fn pump_to_end(&self) -> Result<usize, StreamError> {
        let mut total = 0;
        loop {
            let n = self.pump()?;
            if n == 0 {
                return Ok(total);
            }
            total += n;
        }
    }
}

impl<R: Read + Send> Stream for IoReadable<R> {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn events(&self) -> &EventBus {
        &self.events
    }
}

impl<R: Read + Send> Readable for IoReadable<R> {
    fn is_readable(&self) -> bool {
        !self.state.lock().ended
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn resume(&self) {
        self.state.lock().paused = false;
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

impl<R> fmt::Debug for IoReadable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        write!(
            f,
            "IoReadable(handle={:?}, paused={}, ended={})",
            self.handle, state.paused, state.ended
        )
    }
}

struct WriteState<W> {
    writer: W,
    ended: bool,
}

/// Writable stream over any `std::io::Write`
///
/// Every write goes straight through and is flushed, so `write` always
/// reports `true` and `drain` is never emitted.
pub struct IoWritable<W> {
    handle: Handle,
    events: EventBus,
    state: Mutex<WriteState<W>>,
}

impl<W: Write + Send> IoWritable<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        let handle = Handle::next();
        Self {
            handle,
            events: EventBus::new(&format!("io writable {}", handle.id())),
            state: Mutex::new(WriteState {
                writer,
                ended: false,
            }),
        }
    }

    /// Consume the stream and return the inner writer
    pub fn into_inner(self) -> W {
        self.state.into_inner().writer
    }
}

impl<W: Write + Send> Stream for IoWritable<W> {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn events(&self) -> &EventBus {
        &self.events
    }
}

impl<W: Write + Send> Writable for IoWritable<W> {
    fn is_writable(&self) -> bool {
        !self.state.lock().ended
    }

    fn write(&self, chunk: &[u8]) -> Result<bool, StreamError> {
        let mut state = self.state.lock();
        if state.ended {
            return Err(StreamError::WriteAfterEnd);
        }
        state.writer.write_all(chunk)?;
        state.writer.flush()?;
        Ok(true)
    }

    fn end(&self) -> Result<(), StreamError> {
        {
            let mut state = self.state.lock();
            if state.ended {
                log::warn!("IoWritable::end() called on already ended writable: {self:?}");
                return Ok(());
            }
            state.ended = true;
            state.writer.flush()?;
        }
        self.events.emit(&StreamEvent::Finish);
        Ok(())
    }
}

impl<W> fmt::Debug for IoWritable<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IoWritable(handle={:?})", self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    fn collect_data(readable: &IoReadable<Cursor<Vec<u8>>>) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        readable.events().on(crate::events::EventKind::Data, move |event| {
            if let StreamEvent::Data(chunk) = event {
                seen_clone.lock().push(chunk.to_string_lossy().into_owned());
            }
        });
        seen
    }

    #[test]
    fn test_pump_emits_chunks_then_end() {
        let readable = IoReadable::with_chunk_size(Cursor::new(b"Hello!".to_vec()), 4);
        let seen = collect_data(&readable);

        assert_eq!(readable.pump_to_end().unwrap(), 6);
        assert_eq!(*seen.lock(), vec!["Hell".to_string(), "o!".to_string()]);
        assert!(!readable.is_readable());
    }

    #[test]
    fn test_paused_readable_does_not_read() {
        let readable = IoReadable::new(Cursor::new(b"data".to_vec()));
        let seen = collect_data(&readable);

        readable.pause();
        assert_eq!(readable.pump().unwrap(), 0);
        assert!(seen.lock().is_empty());
        assert!(readable.is_readable());

        readable.resume();
        assert_eq!(readable.pump().unwrap(), 4);
    }

    #[test]
    fn test_encoding_produces_text_chunks() {
        let readable = IoReadable::new(Cursor::new(vec![0xab]));
        readable.set_encoding("hex").unwrap();
        let seen = collect_data(&readable);

        readable.pump().unwrap();
        assert_eq!(*seen.lock(), vec!["ab".to_string()]);
        assert_eq!(readable.encoding(), Some(Encoding::Hex));
    }

    #[test]
    fn test_encoding_keeps_characters_split_across_reads() {
        let readable = IoReadable::with_chunk_size(Cursor::new("aé€".as_bytes().to_vec()), 1);
        readable.set_encoding("utf8").unwrap();
        let seen = collect_data(&readable);

        assert_eq!(readable.pump_to_end().unwrap(), 6);
        assert_eq!(*seen.lock(), vec!["a", "é", "€"]);
    }

    #[test]
    fn test_end_flushes_held_back_input() {
        let readable = IoReadable::with_chunk_size(Cursor::new(b"Hi".to_vec()), 4);
        readable.set_encoding("base64").unwrap();
        let seen = collect_data(&readable);

        readable.pump_to_end().unwrap();
        assert_eq!(*seen.lock(), vec!["SGk="]);
    }

    #[test]
    fn test_writable_writes_through() {
        let writable = IoWritable::new(Vec::new());
        assert!(writable.write(b"abc").unwrap());
        writable.end().unwrap();
        assert!(matches!(writable.write(b"x"), Err(StreamError::WriteAfterEnd)));
        assert_eq!(writable.into_inner(), b"abc".to_vec());
    }
}
