//! Duplex stream built from a separate readable and writable
//!
//! [`DuplexStream`] does no I/O of its own. Commands go inward:
//!
//! - `pause`, `resume`, `set_encoding` to the readable
//! - `write`, `end` to the writable
//!
//! and notifications come outward:
//!
//! - `data`, `end`, `error` from the readable
//! - `drain`, `finish`, `error` from the writable
//!
//! are re-emitted on the duplex stream's own bus, synchronously and in the
//! order the collaborators emit them.
//!
//! # Ownership
//!
//! The collaborators stay owned by the caller. The duplex stream keeps `Weak`
//! references only; once a collaborator is dropped, commands aimed at it are
//! dropped with a warning or fail with `StreamError::Detached`.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::encoding::Encoding;
use crate::error::{Side, StreamError};
use crate::events::{EventBus, EventKind, ListenerId};
use crate::idgen::Handle;
use crate::stream::{Readable, Stream, Writable};

const READABLE_EVENTS: [EventKind; 3] = [EventKind::Data, EventKind::End, EventKind::Error];
const WRITABLE_EVENTS: [EventKind; 3] = [EventKind::Drain, EventKind::Finish, EventKind::Error];

pub struct DuplexStream {
    handle: Handle,
    events: EventBus,
    readable: Weak<dyn Readable>,
    writable: Weak<dyn Writable>,
    readable_relays: Vec<ListenerId>,
    writable_relays: Vec<ListenerId>,
}

impl DuplexStream {
    /// Combine `readable` and `writable` into one stream
    ///
    /// # Errors
    ///
    /// Returns `StreamError::InvalidArgument` if `readable` does not report
    /// itself readable or `writable` does not report itself writable. Nothing
    /// is subscribed on either collaborator in that case.
    pub fn new<R, W>(readable: &Arc<R>, writable: &Arc<W>) -> Result<Self, StreamError>
    where
        R: Readable + 'static,
        W: Writable + 'static,
    {
        if !readable.is_readable() {
            return Err(StreamError::InvalidArgument(Side::Readable));
        }
        if !writable.is_writable() {
            return Err(StreamError::InvalidArgument(Side::Writable));
        }

        let handle = Handle::next();
        let events = EventBus::new(&format!("duplex {}", handle.id()));

        let readable_relays = READABLE_EVENTS
            .iter()
            .map(|&kind| relay(readable.events(), kind, &events))
            .collect();
        let writable_relays = WRITABLE_EVENTS
            .iter()
            .map(|&kind| relay(writable.events(), kind, &events))
            .collect();

        log::debug!(
            "duplex {}: readable {}, writable {}",
            handle.id(),
            readable.handle().id(),
            writable.handle().id()
        );

        let readable: Weak<R> = Arc::downgrade(readable);
        let writable: Weak<W> = Arc::downgrade(writable);
        Ok(Self {
            handle,
            events,
            readable,
            writable,
            readable_relays,
            writable_relays,
        })
    }

    /// The wrapped readable, if it is still alive
    #[must_use]
    pub fn readable(&self) -> Option<Arc<dyn Readable>> {
        self.readable.upgrade()
    }

    /// The wrapped writable, if it is still alive
    #[must_use]
    pub fn writable(&self) -> Option<Arc<dyn Writable>> {
        self.writable.upgrade()
    }
}

/// Re-emit every `kind` event of `source` on `target`
fn relay(source: &EventBus, kind: EventKind, target: &EventBus) -> ListenerId {
    let target = target.clone();
    source.on(kind, move |event| {
        target.emit(event);
    })
}

impl Stream for DuplexStream {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn events(&self) -> &EventBus {
        &self.events
    }
}

impl Readable for DuplexStream {
    fn is_readable(&self) -> bool {
        self.readable().is_some_and(|r| r.is_readable())
    }

    fn pause(&self) {
        match self.readable() {
            Some(readable) => readable.pause(),
            None => log::warn!("duplex {}: pause() on a dropped readable", self.handle.id()),
        }
    }

    fn resume(&self) {
        match self.readable() {
            Some(readable) => readable.resume(),
            None => log::warn!("duplex {}: resume() on a dropped readable", self.handle.id()),
        }
    }

    fn is_paused(&self) -> bool {
        self.readable().is_some_and(|r| r.is_paused())
    }

    fn set_encoding(&self, encoding: &str) -> Result<(), StreamError> {
        self.readable()
            .ok_or(StreamError::Detached(Side::Readable))?
            .set_encoding(encoding)
    }

    fn encoding(&self) -> Option<Encoding> {
        self.readable().and_then(|r| r.encoding())
    }
}

impl Writable for DuplexStream {
    fn is_writable(&self) -> bool {
        self.writable().is_some_and(|w| w.is_writable())
    }

    fn write(&self, chunk: &[u8]) -> Result<bool, StreamError> {
        self.writable()
            .ok_or(StreamError::Detached(Side::Writable))?
            .write(chunk)
    }

    fn end(&self) -> Result<(), StreamError> {
        self.writable()
            .ok_or(StreamError::Detached(Side::Writable))?
            .end()
    }
}

impl fmt::Debug for DuplexStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DuplexStream(handle={:?}, readable={:?}, writable={:?})",
            self.handle,
            self.readable().map(|r| r.handle()),
            self.writable().map(|w| w.handle()),
        )
    }
}

impl Drop for DuplexStream {
    fn drop(&mut self) {
        if let Some(readable) = self.readable() {
            for id in &self.readable_relays {
                readable.events().off(*id);
            }
        }
        if let Some(writable) = self.writable() {
            for id in &self.writable_relays {
                writable.events().off(*id);
            }
        }
    }
}
