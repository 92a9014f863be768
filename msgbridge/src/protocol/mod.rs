//! Protocol client abstraction.
//!
//! Defines the [`Protocol`] trait the pipeline uses to talk to the remote
//! messaging service. Implementations include:
//! - [`loopback::LoopbackProtocol`]: in-process client for tests and replay

pub mod loopback;

use std::future::Future;
use std::path::{Path, PathBuf};

use msgbridge_proto::message::PhotoDescriptor;
use msgbridge_proto::peer::{Peer, PeerId};

/// Errors reported by the protocol client.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The service refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The connection to the service is gone.
    #[error("connection closed")]
    ConnectionClosed,

    /// The requested object does not exist on the service.
    #[error("not found: {0}")]
    NotFound(String),

    /// Local I/O failed while handling the request.
    #[error("protocol I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client for the remote messaging service.
///
/// Fetches and sends are asynchronous; the returned futures resolve
/// exactly once with the outcome. `mark_read` is fire-and-forget and
/// `lookup_peer` only consults the client's local peer cache.
pub trait Protocol: Send + Sync {
    /// Download a photo and return the local path of the stored file.
    fn fetch_photo(
        &self,
        photo: &PhotoDescriptor,
    ) -> impl Future<Output = Result<PathBuf, ProtocolError>> + Send;

    /// Send one text message to a peer.
    fn send_text(
        &self,
        to: PeerId,
        text: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Upload a local file and send it as a document to a peer.
    fn send_document(
        &self,
        to: PeerId,
        path: &Path,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Acknowledge every message in a conversation as read.
    fn mark_read(&self, peer: PeerId);

    /// Look up a known peer.
    fn lookup_peer(&self, id: PeerId) -> Option<Peer>;
}
