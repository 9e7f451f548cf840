//! Test doubles around the buffer-backed streams

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use duplexstream::{
    Encoding, EventBus, EventKind, Handle, Readable, Stream, StreamError, StreamEvent, Writable,
};
use stream_buffers::ReadableStreamBuffer;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Readable buffer that records the flow-control calls it receives
#[derive(Default)]
pub struct RecordingReadable {
    pub inner: ReadableStreamBuffer,
    pub pause_calls: AtomicUsize,
    pub resume_calls: AtomicUsize,
    pub encodings: Mutex<Vec<String>>,
}

impl RecordingReadable {
    pub fn pause_calls(&self) -> usize {
        self.pause_calls.load(Ordering::SeqCst)
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }
}

impl Stream for RecordingReadable {
    fn handle(&self) -> Handle {
        self.inner.handle()
    }

    fn events(&self) -> &EventBus {
        self.inner.events()
    }
}

impl Readable for RecordingReadable {
    fn is_readable(&self) -> bool {
        self.inner.is_readable()
    }

    fn pause(&self) {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.pause();
    }

    fn resume(&self) {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resume();
    }

    fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }

    fn set_encoding(&self, encoding: &str) -> Result<(), StreamError> {
        self.encodings.lock().push(encoding.to_string());
        self.inner.set_encoding(encoding)
    }

    fn encoding(&self) -> Option<Encoding> {
        self.inner.encoding()
    }
}

/// Writable that accepts nothing: every write fails with a broken pipe
pub struct BrokenWritable {
    handle: Handle,
    events: EventBus,
}

impl BrokenWritable {
    pub fn new() -> Self {
        Self {
            handle: Handle::next(),
            events: EventBus::new("broken writable"),
        }
    }
}

impl Stream for BrokenWritable {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn events(&self) -> &EventBus {
        &self.events
    }
}

impl Writable for BrokenWritable {
    fn is_writable(&self) -> bool {
        true
    }

    fn write(&self, _chunk: &[u8]) -> Result<bool, StreamError> {
        Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into())
    }

    fn end(&self) -> Result<(), StreamError> {
        Ok(())
    }
}

/// Collect every event of the given kinds emitted on `bus`
pub fn record(bus: &EventBus, kinds: &[EventKind]) -> Arc<Mutex<Vec<StreamEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for &kind in kinds {
        let seen = Arc::clone(&seen);
        bus.on(kind, move |event| seen.lock().push(event.clone()));
    }
    seen
}

/// Count the events of one kind emitted on `bus`
pub fn count(bus: &EventBus, kind: EventKind) -> Arc<AtomicUsize> {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = Arc::clone(&counter);
    bus.on(kind, move |_| {
        counter_clone.fetch_add(1, Ordering::SeqCst);
    });
    counter
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Register a listener on `bus` that sets the returned flag once it is freed
pub fn watch_drop(bus: &EventBus) -> Arc<AtomicBool> {
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = DropFlag(Arc::clone(&dropped));
    bus.on(EventKind::Finish, move |_| {
        let _ = &flag;
    });
    dropped
}
