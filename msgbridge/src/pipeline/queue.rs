//! Ordered dispatch queue of in-flight inbound messages.
//!
//! Entries are appended in arrival order and only ever leave from the head.
//! An entry still waiting for its photo blocks every entry behind it, so
//! the UI sees messages in exactly the order the protocol delivered them.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;

use msgbridge_proto::message::InboundMessage;

/// Sequence number of a queued entry, increasing with arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

impl EntryId {
    /// The raw sequence number.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of the asynchronous step an entry was waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoPayload {
    /// The photo was downloaded to this local file.
    Downloaded(PathBuf),
    /// The download failed; the entry is shown as a failure notice.
    Failed(String),
}

/// One inbound message waiting to be shown.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    id: EntryId,
    message: InboundMessage,
    is_incoming: bool,
    payload: Option<PhotoPayload>,
    ready: bool,
}

impl PendingEntry {
    /// Sequence number of this entry.
    #[must_use]
    pub const fn id(&self) -> EntryId {
        self.id
    }

    /// The protocol message.
    #[must_use]
    pub const fn message(&self) -> &InboundMessage {
        &self.message
    }

    /// Whether the entry came in from the protocol. Always true for queued entries.
    #[must_use]
    pub const fn is_incoming(&self) -> bool {
        self.is_incoming
    }

    /// The fetched artifact, once the fetch completed.
    #[must_use]
    pub const fn payload(&self) -> Option<&PhotoPayload> {
        self.payload.as_ref()
    }

    /// Whether nothing asynchronous is outstanding for this entry.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }
}

/// FIFO of [`PendingEntry`] values, drained strictly from the head.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    entries: VecDeque<PendingEntry>,
    next_id: u64,
}

impl DispatchQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the tail.
    ///
    /// The entry is ready right away unless the message needs a photo.
    pub fn enqueue(&mut self, message: InboundMessage) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        let ready = !message.needs_photo();
        self.entries.push_back(PendingEntry {
            id,
            message,
            is_incoming: true,
            payload: None,
            ready,
        });
        id
    }

    /// Attach the fetch outcome to a waiting entry and mark it ready.
    ///
    /// Returns `false`, changing nothing, if the entry is unknown or was
    /// already ready: every entry is resolved at most once.
    pub fn resolve(&mut self, id: EntryId, payload: PhotoPayload) -> bool {
        let Ok(index) = self.entries.binary_search_by_key(&id, |entry| entry.id) else {
            return false;
        };
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        if entry.ready {
            return false;
        }
        entry.payload = Some(payload);
        entry.ready = true;
        true
    }

    /// Remove and return the head entry if it is ready.
    pub fn pop_ready(&mut self) -> Option<PendingEntry> {
        if self.entries.front()?.ready {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Remove and return every ready entry at the head, stopping at the
    /// first entry that is still waiting.
    pub fn drain_ready(&mut self) -> Vec<PendingEntry> {
        std::iter::from_fn(|| self.pop_ready()).collect()
    }

    /// The entry blocking the queue, if the head is still waiting.
    #[must_use]
    pub fn blocked_on(&self) -> Option<&PendingEntry> {
        self.entries.front().filter(|entry| !entry.ready)
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every queued entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
