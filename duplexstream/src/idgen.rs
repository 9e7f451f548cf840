use std::sync::atomic::{AtomicI64, Ordering};

/// Identity of a stream, reported in `pipe`/`unpipe` notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    id: i64,
}

impl Handle {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self { id }
    }

    /// Allocate a process-wide unique handle
    #[must_use]
    pub fn next() -> Self {
        Self::new(STREAM_IDS.get_next())
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }
}

static STREAM_IDS: IdGen = IdGen::new();

/// Thread-safe ID generator
#[derive(Debug)]
pub struct IdGen {
    next_id: AtomicI64,
}

impl IdGen {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
        }
    }

    /// Get the next unique ID
    pub fn get_next(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}
