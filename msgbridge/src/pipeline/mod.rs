//! Ordered message-ingestion pipeline.
//!
//! A [`Session`] owns everything scoped to one protocol connection: the
//! [`DispatchQueue`] of inbound messages, the set of conversations with
//! unacknowledged reads, the image handles stored for inbound photos and
//! the in-flight photo fetches and sends.
//!
//! Inbound flow: `on_message` -> classify/suppress -> enqueue -> (fetch
//! photo) -> drain in arrival order -> route to the host -> flush reads.
//! Outbound flow: `send_message` -> compose -> split -> submit sends ->
//! report failures back into the conversation.
//!
//! All work happens on the task that drives the session. Fetch and send
//! completions are futures collected in one [`FuturesUnordered`] set and
//! handled one at a time by [`Session::next_completion`] or
//! [`Session::run`], so queue and read-set mutations never interleave.

pub mod classify;
pub mod compose;
pub mod queue;
pub mod receipts;
pub mod report;
mod resolve;
mod route;

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use tokio::sync::mpsc;

use msgbridge_proto::message::InboundMessage;
use msgbridge_proto::peer::PeerId;

use crate::host::{Host, ImageHandle};
use crate::protocol::{Protocol, ProtocolError};

pub use compose::{ComposeError, ComposeOptions, Outgoing};
pub use queue::{DispatchQueue, EntryId, PendingEntry, PhotoPayload};
pub use receipts::PendingReadSet;
pub use report::{SEND_FAILED_NOTICE, SendKind};
pub use route::PHOTO_FAILED_NOTICE;

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// The account this session is logged in as.
    pub own_id: PeerId,
    /// Outgoing message composition.
    pub compose: ComposeOptions,
}

impl SessionConfig {
    /// Settings for `own_id` with default composition options.
    #[must_use]
    pub fn new(own_id: PeerId) -> Self {
        Self {
            own_id,
            compose: ComposeOptions::default(),
        }
    }
}

/// Outcome of one asynchronous protocol request.
#[derive(Debug)]
enum Completion {
    Photo {
        entry: EntryId,
        result: Result<PathBuf, ProtocolError>,
    },
    Sent {
        to: PeerId,
        kind: SendKind,
        result: Result<(), ProtocolError>,
    },
}

/// What [`Session::send_message`] handed to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    /// Number of text sends, one per chunk.
    pub chunks: usize,
    /// Whether an attachment was submitted as a document send.
    pub document: bool,
}

/// Event handled by one turn of [`Session::run`].
enum Turn {
    Inbound(Option<InboundMessage>),
    Completed(Completion),
}

/// Connection-scoped pipeline state.
pub struct Session<P: Protocol + 'static, H: Host> {
    protocol: Arc<P>,
    host: H,
    config: SessionConfig,
    queue: DispatchQueue,
    pending_reads: PendingReadSet,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
    images: Vec<ImageHandle>,
}

impl<P: Protocol + 'static, H: Host> Session<P, H> {
    /// Create a session over a protocol client and a host UI.
    pub fn new(protocol: Arc<P>, host: H, config: SessionConfig) -> Self {
        Self {
            protocol,
            host,
            config,
            queue: DispatchQueue::new(),
            pending_reads: PendingReadSet::new(),
            in_flight: FuturesUnordered::new(),
            images: Vec::new(),
        }
    }

    /// The protocol client.
    pub const fn protocol(&self) -> &Arc<P> {
        &self.protocol
    }

    /// The host UI.
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Session settings.
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of inbound messages not yet dispatched.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Conversations waiting for a read acknowledgement.
    pub const fn pending_reads(&self) -> &PendingReadSet {
        &self.pending_reads
    }

    /// Number of fetches and sends not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Image handles stored for photos shown in this session.
    pub fn stored_images(&self) -> &[ImageHandle] {
        &self.images
    }

    /// Wait for one outstanding fetch or send and handle its outcome.
    ///
    /// Returns `false` without waiting if nothing is in flight.
    pub async fn next_completion(&mut self) -> bool {
        let Some(completion) = self.in_flight.next().await else {
            return false;
        };
        self.complete(completion);
        true
    }

    /// Handle completions until nothing is in flight.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    /// Drive the session from an inbound message channel.
    ///
    /// Messages and completions are handled one at a time in the order
    /// they become ready. When the channel closes, the remaining
    /// completions are settled and the loop returns.
    pub async fn run(&mut self, mut inbound: mpsc::Receiver<InboundMessage>) {
        loop {
            let turn = tokio::select! {
                message = inbound.recv() => Turn::Inbound(message),
                Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    Turn::Completed(completion)
                }
            };
            match turn {
                Turn::Inbound(Some(message)) => self.on_message(message),
                Turn::Inbound(None) => break,
                Turn::Completed(completion) => self.complete(completion),
            }
        }
        tracing::debug!(in_flight = self.in_flight.len(), "inbound channel closed, settling");
        self.settle().await;
    }

    /// The account presence became active: acknowledge deferred reads.
    pub fn presence_became_active(&self) -> usize {
        if self.host.is_presence_active() {
            self.flush_pending_reads()
        } else {
            0
        }
    }

    /// End of the connection.
    ///
    /// Releases every stored image, forgets pending reads and drops queued
    /// entries and outstanding requests. Entries still waiting for a photo
    /// are logged.
    pub fn close(&mut self) {
        for handle in self.images.drain(..) {
            self.host.release_image(handle);
        }
        self.pending_reads.clear();
        if let Some(blocked) = self.queue.blocked_on() {
            tracing::warn!(
                entry = %blocked.id(),
                queued = self.queue.len(),
                "closing session with undelivered messages"
            );
        }
        self.queue.clear();
        self.in_flight.clear();
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Photo { entry, result } => self.on_photo_loaded(entry, result),
            Completion::Sent { to, kind, result } => {
                report::report_send(&self.host, to, kind, &result);
            }
        }
    }
}
