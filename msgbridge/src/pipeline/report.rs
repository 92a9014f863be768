//! Reporting of failed sends back into the conversation.

use msgbridge_proto::message::Timestamp;
use msgbridge_proto::peer::{Destination, PeerId};

use crate::host::{Host, MessageFlags};
use crate::protocol::ProtocolError;

/// Notice shown in a conversation when a send to it failed.
pub const SEND_FAILED_NOTICE: &str = "Sending message failed. Maybe you don't have the permission \
                                      to send to this peer, or the peer does no longer exist.";

/// What a completed send carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    /// One text chunk.
    Text,
    /// An attachment sent as a document.
    Document,
}

/// Show a failure notice in the conversation with `to` if the send failed.
///
/// Successful sends have no visible effect. Returns whether a notice was
/// shown.
pub fn report_send(
    host: &impl Host,
    to: PeerId,
    kind: SendKind,
    result: &Result<(), ProtocolError>,
) -> bool {
    let Err(error) = result else {
        tracing::trace!(%to, ?kind, "send completed");
        return false;
    };
    tracing::warn!(%to, ?kind, error = %error, "send failed");

    let flags = MessageFlags::ERROR | MessageFlags::SYSTEM;
    match Destination::of(to) {
        Some(Destination::Chat(chat)) => {
            host.deliver_chat_message(chat, chat, SEND_FAILED_NOTICE, flags, Timestamp::now());
        }
        Some(Destination::EncryptedSession(peer) | Destination::Direct(peer)) => {
            host.deliver_direct_message(peer, SEND_FAILED_NOTICE, flags, Timestamp::now());
        }
        None => {
            tracing::warn!(%to, "no conversation to report the failure in");
            return false;
        }
    }
    true
}
