//! Piping a readable into a writable
//!
//! [`pipe`] wires the two streams together with listeners:
//!
//! - source `data`: written to the destination; a `false` result pauses the source
//! - destination `drain`: resumes the source
//! - source `end`: ends the destination (unless `PipeOptions::end` is off)
//! - `error` on either side: the pipeline is taken apart
//!
//! After wiring, the destination emits `pipe` with the source's handle.
//!
//! The listeners keep the pipeline alive for as long as the streams live.
//! Dropping the returned [`Pipeline`] does not stop the flow; call
//! [`Pipeline::unpipe`] for that. The pipeline itself holds neither stream
//! nor their buses, so dropping both streams frees everything.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::events::{EventKind, ListenerId, StreamEvent, WeakEventBus};
use crate::idgen::Handle;
use crate::stream::{Readable, Writable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeOptions {
    /// End the destination when the source ends
    pub end: bool,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self { end: true }
    }
}

struct PipelineState {
    source: Handle,
    destination: Handle,
    source_events: WeakEventBus,
    destination_events: WeakEventBus,
    source_listeners: Mutex<Vec<ListenerId>>,
    destination_listeners: Mutex<Vec<ListenerId>>,
    active: AtomicBool,
}

impl PipelineState {
    /// Remove all listeners. Returns `false` if already done.
    fn cleanup(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        let source_ids: Vec<ListenerId> = self.source_listeners.lock().drain(..).collect();
        if let Some(events) = self.source_events.upgrade() {
            for id in source_ids {
                events.off(id);
            }
        }
        let destination_ids: Vec<ListenerId> =
            self.destination_listeners.lock().drain(..).collect();
        if let Some(events) = self.destination_events.upgrade() {
            for id in destination_ids {
                events.off(id);
            }
        }
        log::debug!(
            "pipe {} -> {}: cleaned up",
            self.source.id(),
            self.destination.id()
        );
        true
    }
}

/// A running pipe between two streams
pub struct Pipeline {
    state: Arc<PipelineState>,
}

impl Pipeline {
    #[must_use]
    pub fn source(&self) -> Handle {
        self.state.source
    }

    #[must_use]
    pub fn destination(&self) -> Handle {
        self.state.destination
    }

    /// `false` once the source ended, either side failed, or `unpipe` was called
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Stop piping and emit `unpipe` on the destination
    ///
    /// Does nothing if the pipeline is no longer active.
    pub fn unpipe(&self) {
        if !self.state.cleanup() {
            return;
        }
        if let Some(events) = self.state.destination_events.upgrade() {
            events.emit(&StreamEvent::Unpipe(self.state.source));
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline(source={:?}, destination={:?}, active={})",
            self.state.source,
            self.state.destination,
            self.is_active()
        )
    }
}

/// Pipe `source` into `destination` with default options
pub fn pipe<S, D>(source: &Arc<S>, destination: &Arc<D>) -> Pipeline
where
    S: Readable + ?Sized + 'static,
    D: Writable + ?Sized + 'static,
{
    pipe_with(source, destination, PipeOptions::default())
}

/// Pipe `source` into `destination`
pub fn pipe_with<S, D>(source: &Arc<S>, destination: &Arc<D>, options: PipeOptions) -> Pipeline
where
    S: Readable + ?Sized + 'static,
    D: Writable + ?Sized + 'static,
{
    let state = Arc::new(PipelineState {
        source: source.handle(),
        destination: destination.handle(),
        source_events: source.events().downgrade(),
        destination_events: destination.events().downgrade(),
        source_listeners: Mutex::new(Vec::new()),
        destination_listeners: Mutex::new(Vec::new()),
        active: AtomicBool::new(true),
    });

    let weak_source: Weak<S> = Arc::downgrade(source);
    let weak_destination: Weak<D> = Arc::downgrade(destination);

    let on_data = {
        let source = weak_source.clone();
        let destination = weak_destination.clone();
        let state = Arc::clone(&state);
        move |event: &StreamEvent| {
            let StreamEvent::Data(chunk) = event else {
                return;
            };
            let Some(destination) = destination.upgrade() else {
                return;
            };
            if !destination.is_writable() {
                return;
            }
            match destination.write(chunk.as_bytes()) {
                Ok(true) => {}
                Ok(false) => {
                    if let Some(source) = source.upgrade() {
                        source.pause();
                    }
                }
                Err(err) => {
                    state.cleanup();
                    destination.events().emit(&StreamEvent::error(err));
                }
            }
        }
    };

    let on_end = {
        let destination = weak_destination.clone();
        let state = Arc::clone(&state);
        move |_: &StreamEvent| {
            if !state.cleanup() || !options.end {
                return;
            }
            if let Some(destination) = destination.upgrade() {
                if let Err(err) = destination.end() {
                    destination.events().emit(&StreamEvent::error(err));
                }
            }
        }
    };

    let on_drain = {
        let source = weak_source;
        move |_: &StreamEvent| {
            if let Some(source) = source.upgrade() {
                if source.is_readable() {
                    source.resume();
                }
            }
        }
    };

    let on_error = {
        let state = Arc::clone(&state);
        move |event: &StreamEvent| {
            let StreamEvent::Error(err) = event else {
                return;
            };
            if state.cleanup() {
                log::warn!(
                    "pipe {} -> {}: unpiped on error: {err}",
                    state.source.id(),
                    state.destination.id()
                );
            }
        }
    };

    {
        let mut ids = state.source_listeners.lock();
        ids.push(source.events().on(EventKind::Data, on_data));
        ids.push(source.events().on(EventKind::End, on_end));
        ids.push(source.events().on(EventKind::Error, on_error.clone()));
    }
    {
        let mut ids = state.destination_listeners.lock();
        ids.push(destination.events().on(EventKind::Drain, on_drain));
        ids.push(destination.events().on(EventKind::Error, on_error));
    }

    log::debug!(
        "pipe {} -> {}: wired (end={})",
        state.source.id(),
        state.destination.id(),
        options.end
    );

    destination.events().emit(&StreamEvent::Pipe(state.source));

    Pipeline { state }
}
