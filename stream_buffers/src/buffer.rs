//! Shared buffer with internal locking
//!
//! Backing storage of the stream buffers: appended to at the back, drained
//! from the front.

use parking_lot::Mutex;
use std::sync::Arc;

/// Shared buffer with internal locking
///
/// A thread-safe buffer backed by `Arc<Mutex<Vec<u8>>>`. Multiple clones
/// share the same underlying data.
///
/// # Example
///
/// ```
/// use stream_buffers::Buffer;
///
/// let buffer = Buffer::new();
/// buffer.append(b"hello world");
///
/// assert_eq!(buffer.take(5), b"hello");
/// assert_eq!(buffer.take_all(), b" world");
/// assert!(buffer.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Buffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Arc::new(Mutex::new(Vec::with_capacity(capacity))))
    }

    pub fn append(&self, data: &[u8]) {
        self.0.lock().extend_from_slice(data);
    }

    /// Remove and return up to `max` bytes from the front
    #[must_use]
    pub fn take(&self, max: usize) -> Vec<u8> {
        let mut buf = self.0.lock();
        let n = max.min(buf.len());
        buf.drain(..n).collect()
    }

    /// Remove and return everything
    #[must_use]
    pub fn take_all(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buffer = Buffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_take_drains_front() {
        let buffer = Buffer::new();
        buffer.append(b"hello");
        buffer.append(b" world");

        assert_eq!(buffer.take(3), b"hel");
        assert_eq!(buffer.take(100), b"lo world");
        assert!(buffer.take(1).is_empty());
    }

    #[test]
    fn test_clone_shares_data() {
        let buffer1 = Buffer::new();
        let buffer2 = buffer1.clone();

        buffer1.append(b"from buffer1");

        assert_eq!(buffer2.take_all(), b"from buffer1");
        assert!(buffer1.is_empty());
    }
}
