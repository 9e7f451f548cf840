//! Event Bus
//!
//! Every stream owns one bus. Listeners are registered per event kind and
//! invoked synchronously, in registration order, by `emit`.
//!
//! # Dispatch and re-entrancy
//!
//! `emit` snapshots the matching listeners under the lock and releases the
//! lock before calling them. A listener can therefore:
//!
//! - register or remove listeners on the same bus,
//! - emit further events (they are dispatched immediately, nested),
//! - call back into the stream that is emitting (pause it, for example).
//!
//! A listener removed while an emission is in flight still receives that
//! emission, because it was already part of the snapshot.
//!
//! # Async consumers
//!
//! `subscribe` hands out a broadcast receiver that sees every event emitted
//! after the subscription, in emission order. Drop the receiver to
//! unsubscribe.

use parking_lot::Mutex;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::StreamError;
use crate::idgen::Handle;

// ============================================================================
// Payload
// ============================================================================

/// Payload of a `data` event
///
/// Cloning a chunk shares the payload, so a relayed chunk is the very same
/// allocation the producer emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Bytes(Arc<[u8]>),
    Text(Arc<str>),
}

impl Chunk {
    /// Raw bytes of the chunk (UTF-8 for text chunks)
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Chunk::Bytes(bytes) => bytes,
            Chunk::Text(text) => text.as_bytes(),
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Chunk::Bytes(_) => None,
            Chunk::Text(text) => Some(&**text),
        }
    }

    #[must_use]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match self {
            Chunk::Bytes(bytes) => String::from_utf8_lossy(bytes),
            Chunk::Text(text) => Cow::Borrowed(&**text),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// True if both chunks share one allocation
    #[must_use]
    pub fn same_payload(&self, other: &Chunk) -> bool {
        match (self, other) {
            (Chunk::Bytes(a), Chunk::Bytes(b)) => Arc::ptr_eq(a, b),
            (Chunk::Text(a), Chunk::Text(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&[u8]> for Chunk {
    fn from(bytes: &[u8]) -> Self {
        Chunk::Bytes(Arc::from(bytes))
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(bytes: Vec<u8>) -> Self {
        Chunk::Bytes(Arc::from(bytes))
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Chunk::Text(Arc::from(text))
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Chunk::Text(Arc::from(text))
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A readable produced a chunk
    Data(Chunk),
    /// A readable has no more data
    End,
    /// A writable that reported back-pressure can take more data
    Drain,
    /// A writable has been ended and flushed everything
    Finish,
    /// A source identified by the handle started piping into this writable
    Pipe(Handle),
    /// A source identified by the handle stopped piping into this writable
    Unpipe(Handle),
    Error(Arc<StreamError>),
}

impl StreamEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Data(_) => EventKind::Data,
            StreamEvent::End => EventKind::End,
            StreamEvent::Drain => EventKind::Drain,
            StreamEvent::Finish => EventKind::Finish,
            StreamEvent::Pipe(_) => EventKind::Pipe,
            StreamEvent::Unpipe(_) => EventKind::Unpipe,
            StreamEvent::Error(_) => EventKind::Error,
        }
    }

    #[must_use]
    pub fn error(err: StreamError) -> Self {
        StreamEvent::Error(Arc::new(err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Data,
    End,
    Drain,
    Finish,
    Pipe,
    Unpipe,
    Error,
}

// ============================================================================
// Listener Types
// ============================================================================

type Listener = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

/// Token returned by `on`/`once`, used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    listener: Listener,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("once", &self.once)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Internal State
// ============================================================================

struct BusState {
    next_id: u64,
    listeners: Vec<Registration>,
    broadcast: Option<tokio::sync::broadcast::Sender<StreamEvent>>,
    debug_hint: String,
}

// ============================================================================
// Main Bus
// ============================================================================

/// Per-stream event bus
///
/// Clones share the same listeners.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusState>>,
}

impl EventBus {
    #[must_use]
    pub fn new(debug_hint: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusState {
                next_id: 1,
                listeners: Vec::new(),
                broadcast: None,
                debug_hint: debug_hint.to_string(),
            })),
        }
    }

    /// Register a listener for every event of `kind`
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(listener))
    }

    /// Register a listener for the next event of `kind` only
    pub fn once<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(listener))
    }

    fn register(&self, kind: EventKind, once: bool, listener: Listener) -> ListenerId {
        let mut state = self.inner.lock();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state.listeners.push(Registration {
            id,
            kind,
            once,
            listener,
        });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered (anymore).
    pub fn off(&self, id: ListenerId) -> bool {
        let mut state = self.inner.lock();
        let before = state.listeners.len();
        state.listeners.retain(|reg| reg.id != id);
        state.listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .lock()
            .listeners
            .iter()
            .filter(|reg| reg.kind == kind)
            .count()
    }

    /// A handle that does not keep the listeners alive
    #[must_use]
    pub fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribe to all events from now on
    ///
    /// # Arguments
    /// * `channel_capacity` - Capacity of the broadcast channel (only used when
    ///   creating it; raised to 1 if zero)
    #[must_use]
    pub fn subscribe(
        &self,
        channel_capacity: usize,
    ) -> tokio::sync::broadcast::Receiver<StreamEvent> {
        let mut state = self.inner.lock();
        match &state.broadcast {
            Some(sender) => sender.subscribe(),
            None => {
                let (tx, rx) = tokio::sync::broadcast::channel(channel_capacity.max(1));
                state.broadcast = Some(tx);
                rx
            }
        }
    }

    /// Dispatch an event to its listeners and subscribers
    ///
    /// Returns `true` if anybody received the event.
    pub fn emit(&self, event: &StreamEvent) -> bool {
        let kind = event.kind();
        let (listeners, subscribers) = {
            let mut state = self.inner.lock();

            let mut selected = Vec::new();
            state.listeners.retain(|reg| {
                if reg.kind != kind {
                    return true;
                }
                selected.push(Arc::clone(&reg.listener));
                !reg.once
            });

            let subscribers = state
                .broadcast
                .as_ref()
                .and_then(|tx| tx.send(event.clone()).ok())
                .unwrap_or(0);

            log::debug!(
                "bus.emit: {} {:?}, listeners: {}, subscribers: {}",
                state.debug_hint,
                kind,
                selected.len(),
                subscribers
            );

            (selected, subscribers)
        };

        if listeners.is_empty() && subscribers == 0 {
            if let StreamEvent::Error(err) = event {
                log::warn!("bus.emit: unhandled error event: {err}");
            }
            return false;
        }

        // Listeners run outside the lock
        for listener in &listeners {
            listener(event);
        }
        true
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("EventBus")
            .field("debug_hint", &state.debug_hint)
            .field("listeners", &state.listeners)
            .field(
                "subscribers",
                &state.broadcast.as_ref().map_or(0, |tx| tx.receiver_count()),
            )
            .finish()
    }
}

/// Non-owning handle to an [`EventBus`], from [`EventBus::downgrade`]
#[derive(Clone, Debug)]
pub struct WeakEventBus {
    inner: Weak<Mutex<BusState>>,
}

impl WeakEventBus {
    /// The bus, if its stream is still alive
    #[must_use]
    pub fn upgrade(&self) -> Option<EventBus> {
        self.inner.upgrade().map(|inner| EventBus { inner })
    }
}
