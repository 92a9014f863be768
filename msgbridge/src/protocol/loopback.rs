//! Loopback protocol client for testing and replay.
//!
//! [`LoopbackProtocol`] keeps everything in process: photos are served from
//! an in-memory table and written to a download directory, sends are
//! recorded, and a small peer directory answers `lookup_peer`. Photo
//! fetches can be gated so tests decide exactly when (and in which order)
//! each download completes.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use msgbridge_proto::message::PhotoDescriptor;
use msgbridge_proto::peer::{Peer, PeerId};

use super::{Protocol, ProtocolError};

/// A call made against the [`LoopbackProtocol`], in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolCall {
    /// A photo download was started.
    FetchPhoto(i64),
    /// A text message was sent.
    SendText {
        /// Destination peer.
        to: PeerId,
        /// Message text.
        text: String,
    },
    /// A document was sent.
    SendDocument {
        /// Destination peer.
        to: PeerId,
        /// Local file that was uploaded.
        path: PathBuf,
    },
    /// A conversation was acknowledged as read.
    MarkRead(PeerId),
}

type Gate = oneshot::Receiver<Result<(), ProtocolError>>;
type GateHandle = oneshot::Sender<Result<(), ProtocolError>>;

/// In-process [`Protocol`] implementation that records every call.
pub struct LoopbackProtocol {
    /// Where downloaded photos are written.
    download_dir: PathBuf,
    /// Simulated download latency for ungated photos.
    latency: Duration,
    /// Photo contents keyed by photo id.
    photos: Mutex<HashMap<i64, Vec<u8>>>,
    /// Contents served for photo ids missing from `photos`.
    fallback_photo: Mutex<Option<Vec<u8>>>,
    /// Receiving halves of gated downloads, taken by `fetch_photo`.
    gates: Mutex<HashMap<i64, Gate>>,
    /// Sending halves of gated downloads, used by `release_photo`/`fail_photo`.
    gate_handles: Mutex<HashMap<i64, GateHandle>>,
    /// Known peers for `lookup_peer`.
    peers: Mutex<HashMap<PeerId, Peer>>,
    /// Peers every send to which is rejected.
    failing: Mutex<BTreeSet<PeerId>>,
    /// Call log.
    calls: Mutex<Vec<ProtocolCall>>,
}

impl LoopbackProtocol {
    /// Create a loopback client that writes downloaded photos to `download_dir`.
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            latency: Duration::ZERO,
            photos: Mutex::new(HashMap::new()),
            fallback_photo: Mutex::new(None),
            gates: Mutex::new(HashMap::new()),
            gate_handles: Mutex::new(HashMap::new()),
            peers: Mutex::new(HashMap::new()),
            failing: Mutex::new(BTreeSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Delay every ungated photo download by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Register a known peer with its display name.
    pub fn add_peer(&self, id: PeerId, name: impl Into<String>) {
        self.peers.lock().insert(
            id,
            Peer {
                id,
                name: name.into(),
            },
        );
    }

    /// Serve `bytes` when photo `id` is fetched.
    pub fn add_photo(&self, id: i64, bytes: impl Into<Vec<u8>>) {
        self.photos.lock().insert(id, bytes.into());
    }

    /// Serve `bytes` for any photo id without explicit contents.
    pub fn serve_any_photo(&self, bytes: impl Into<Vec<u8>>) {
        *self.fallback_photo.lock() = Some(bytes.into());
    }

    /// Hold the download of photo `id` until it is released or failed.
    pub fn gate_photo(&self, id: i64) {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(id, rx);
        self.gate_handles.lock().insert(id, tx);
    }

    /// Let a gated download of photo `id` complete successfully.
    ///
    /// Returns `false` if the photo was not gated.
    pub fn release_photo(&self, id: i64) -> bool {
        self.open_gate(id, Ok(()))
    }

    /// Let a gated download of photo `id` fail.
    ///
    /// Returns `false` if the photo was not gated.
    pub fn fail_photo(&self, id: i64) -> bool {
        self.open_gate(id, Err(ProtocolError::Rejected(format!("photo {id} unavailable"))))
    }

    fn open_gate(&self, id: i64, outcome: Result<(), ProtocolError>) -> bool {
        let Some(handle) = self.gate_handles.lock().remove(&id) else {
            return false;
        };
        handle.send(outcome).is_ok()
    }

    /// Reject every future send to `peer`.
    pub fn fail_sends_to(&self, peer: PeerId) {
        self.failing.lock().insert(peer);
    }

    /// All calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProtocolCall> {
        self.calls.lock().clone()
    }

    /// Texts sent so far, in submission order.
    #[must_use]
    pub fn sent_texts(&self) -> Vec<(PeerId, String)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ProtocolCall::SendText { to, text } => Some((*to, text.clone())),
                _ => None,
            })
            .collect()
    }

    /// Documents sent so far, in submission order.
    #[must_use]
    pub fn sent_documents(&self) -> Vec<(PeerId, PathBuf)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ProtocolCall::SendDocument { to, path } => Some((*to, path.clone())),
                _ => None,
            })
            .collect()
    }

    /// Conversations acknowledged as read so far, in order.
    #[must_use]
    pub fn marked_read(&self) -> Vec<PeerId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ProtocolCall::MarkRead(peer) => Some(*peer),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ProtocolCall) {
        self.calls.lock().push(call);
    }

    fn send_outcome(&self, to: PeerId) -> Result<(), ProtocolError> {
        if self.failing.lock().contains(&to) {
            return Err(ProtocolError::Rejected(format!("sending to {to} not permitted")));
        }
        Ok(())
    }
}

impl Protocol for LoopbackProtocol {
    async fn fetch_photo(&self, photo: &PhotoDescriptor) -> Result<PathBuf, ProtocolError> {
        self.record(ProtocolCall::FetchPhoto(photo.id));

        let gate = self.gates.lock().remove(&photo.id);
        if let Some(gate) = gate {
            gate.await.map_err(|_| ProtocolError::ConnectionClosed)??;
        } else if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let bytes = self
            .photos
            .lock()
            .get(&photo.id)
            .cloned()
            .or_else(|| self.fallback_photo.lock().clone())
            .ok_or_else(|| ProtocolError::NotFound(format!("photo {}", photo.id)))?;

        let path = self.download_dir.join(format!("photo-{}.jpg", photo.id));
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    async fn send_text(&self, to: PeerId, text: &str) -> Result<(), ProtocolError> {
        self.record(ProtocolCall::SendText {
            to,
            text: text.to_string(),
        });
        self.send_outcome(to)
    }

    async fn send_document(&self, to: PeerId, path: &Path) -> Result<(), ProtocolError> {
        self.record(ProtocolCall::SendDocument {
            to,
            path: path.to_path_buf(),
        });
        self.send_outcome(to)
    }

    fn mark_read(&self, peer: PeerId) {
        self.record(ProtocolCall::MarkRead(peer));
    }

    fn lookup_peer(&self, id: PeerId) -> Option<Peer> {
        self.peers.lock().get(&id).cloned()
    }
}
