//! Batched read acknowledgements.

use std::collections::BTreeSet;

use parking_lot::Mutex;

use msgbridge_proto::peer::PeerId;

use super::Session;
use crate::host::Host;
use crate::protocol::Protocol;

/// Conversations with messages shown but not yet acknowledged as read.
///
/// Registering is idempotent. [`flush`](Self::flush) takes the whole set
/// in one step, so a peer registered while a flush is running ends up
/// either in that flush or in the next one.
#[derive(Debug, Default)]
pub struct PendingReadSet {
    peers: Mutex<BTreeSet<PeerId>>,
}

impl PendingReadSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a conversation. Returns `false` if it was already pending.
    pub fn register(&self, peer: PeerId) -> bool {
        self.peers.lock().insert(peer)
    }

    /// Acknowledge every pending conversation once and empty the set.
    ///
    /// Returns the number of acknowledgements issued.
    pub fn flush(&self, mut mark_read: impl FnMut(PeerId)) -> usize {
        let peers = std::mem::take(&mut *self.peers.lock());
        let count = peers.len();
        for peer in peers {
            mark_read(peer);
        }
        count
    }

    /// Whether `peer` is pending.
    #[must_use]
    pub fn contains(&self, peer: PeerId) -> bool {
        self.peers.lock().contains(&peer)
    }

    /// Number of pending conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// Forget every pending conversation without acknowledging it.
    pub fn clear(&self) {
        self.peers.lock().clear();
    }
}

impl<P: Protocol + 'static, H: Host> Session<P, H> {
    /// Send one read acknowledgement per pending conversation.
    pub fn flush_pending_reads(&self) -> usize {
        let protocol = &self.protocol;
        let flushed = self.pending_reads.flush(|peer| protocol.mark_read(peer));
        if flushed > 0 {
            tracing::debug!(count = flushed, "read acknowledgements sent");
        }
        flushed
    }
}
