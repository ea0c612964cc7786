//! Upload events and the per-session listener registry

use crate::UploadError;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// Kinds of events a session raises
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Progress,
    Error,
    Done,
    Cancel,
    Pause,
}

impl EventKind {
    const ALL: [EventKind; 5] = [
        EventKind::Progress,
        EventKind::Error,
        EventKind::Done,
        EventKind::Cancel,
        EventKind::Pause,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Only the latest occurrence of these kinds is buffered
    fn is_singleton(self) -> bool {
        matches!(self, EventKind::Done | EventKind::Cancel | EventKind::Pause)
    }
}

/// An event raised by an upload session
#[derive(Clone, Debug)]
pub enum UploadEvent {
    /// Bytes confirmed by the endpoint
    Progress(u64),
    /// A transfer attempt failed
    Error(Arc<UploadError>),
    /// The upload completed
    Done,
    /// The upload was cancelled
    Cancelled,
    /// The upload was paused
    Paused,
}

impl UploadEvent {
    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Progress(_) => EventKind::Progress,
            Self::Error(_) => EventKind::Error,
            Self::Done => EventKind::Done,
            Self::Cancelled => EventKind::Cancel,
            Self::Paused => EventKind::Pause,
        }
    }
}

/// Event listener
pub type Listener = Arc<dyn Fn(&UploadEvent) + Send + Sync>;

#[derive(Default)]
struct Slot {
    listener: Option<Listener>,
    pending: VecDeque<UploadEvent>,
}

/// Delivers events to at most one listener per kind, buffering events raised
/// before that listener is registered.
pub(crate) struct EventDispatcher {
    // Serializes delivery so buffered events always precede live ones. It is
    // re-entrant so listeners can drive the session that notified them.
    delivery: ReentrantMutex<()>,
    slots: Mutex<[Slot; 5]>,
}

impl EventDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            delivery: ReentrantMutex::new(()),
            slots: Mutex::new(Default::default()),
        }
    }

    /// Deliver an event, or buffer it if nobody listens yet
    pub(crate) fn emit(&self, event: UploadEvent) {
        let _delivery = self.delivery.lock();
        let kind = event.kind();

        let listener = {
            let mut slots = self.slots.lock();
            let slot = &mut slots[kind.index()];
            match &slot.listener {
                Some(listener) => Arc::clone(listener),
                None => {
                    if kind.is_singleton() {
                        slot.pending.clear();
                    }
                    slot.pending.push_back(event);
                    return;
                }
            }
        };

        listener(&event);
    }

    /// Register the listener for a kind, replacing any previous one, and flush
    /// the events buffered for it
    pub(crate) fn subscribe(&self, kind: EventKind, listener: Listener) {
        let _delivery = self.delivery.lock();

        let pending = {
            let mut slots = self.slots.lock();
            let slot = &mut slots[kind.index()];
            slot.listener = Some(Arc::clone(&listener));
            std::mem::take(&mut slot.pending)
        };

        for event in pending {
            listener(&event);
        }
    }

    #[cfg(test)]
    fn pending(&self, kind: EventKind) -> usize {
        self.slots.lock()[kind.index()].pending.len()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.lock();
        let mut list = f.debug_map();
        for kind in EventKind::ALL {
            let slot = &slots[kind.index()];
            list.entry(&kind, &(slot.listener.is_some(), slot.pending.len()));
        }
        list.finish()
    }
}
