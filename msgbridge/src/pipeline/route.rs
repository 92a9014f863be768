//! Queue draining and peer routing.
//!
//! Ready entries leave the queue head one at a time, are classified and
//! rendered, and are delivered to the conversation their destination
//! names. Delivery registers the conversation for a read acknowledgement;
//! reads are flushed after every dispatch while presence is active.

use msgbridge_proto::message::{Document, InboundMessage};
use msgbridge_proto::peer::Destination;

use super::Session;
use super::classify::{self, Classification};
use super::queue::{PendingEntry, PhotoPayload};
use crate::host::{Host, MessageFlags};
use crate::markup;
use crate::protocol::Protocol;

/// Shown in place of a photo whose download failed.
pub const PHOTO_FAILED_NOTICE: &str = "[PHOTO] (download failed)";

impl<P: Protocol + 'static, H: Host> Session<P, H> {
    /// Dispatch every ready entry at the head of the queue.
    pub(super) fn drain(&mut self) -> usize {
        let mut dispatched = 0;
        while let Some(entry) = self.queue.pop_ready() {
            self.dispatch(&entry);
            dispatched += 1;
        }
        if let Some(blocked) = self.queue.blocked_on() {
            tracing::debug!(
                entry = %blocked.id(),
                waiting = self.queue.len() - 1,
                "queue blocked on photo download"
            );
        }
        dispatched
    }

    fn dispatch(&mut self, entry: &PendingEntry) {
        let message = entry.message();
        let protocol = &self.protocol;
        let classification = classify::classify(message, |id| protocol.lookup_peer(id));

        let (text, flags) = match classification {
            Classification::Suppressed(reason) => {
                tracing::debug!(message_id = message.id, ?reason, "message not shown");
                return;
            }
            Classification::Document(document) => {
                self.offer_document(message, &document, false);
                return;
            }
            Classification::EncryptedDocument(document) => {
                self.offer_document(message, &document, true);
                return;
            }
            Classification::PhotoPending => match self.render_photo(entry) {
                Some(rendered) => rendered,
                None => return,
            },
            Classification::ServiceEvent(text) => (text, MessageFlags::SYSTEM),
            other => match other.display_text() {
                Some(text) => (text, MessageFlags::RECV),
                None => return,
            },
        };

        self.deliver(message, &text, flags);
        if self.host.is_presence_active() {
            self.flush_pending_reads();
        }
    }

    fn offer_document(&self, message: &InboundMessage, document: &Document, encrypted: bool) {
        if message.from == self.config.own_id {
            tracing::debug!(message_id = message.id, "own document not offered");
            return;
        }
        self.host.offer_file(message.from, document, encrypted);
    }

    fn render_photo(&mut self, entry: &PendingEntry) -> Option<(String, MessageFlags)> {
        let path = match entry.payload() {
            Some(PhotoPayload::Downloaded(path)) => path,
            Some(PhotoPayload::Failed(_)) => {
                return Some((
                    PHOTO_FAILED_NOTICE.to_string(),
                    MessageFlags::SYSTEM | MessageFlags::ERROR,
                ));
            }
            None => {
                tracing::error!(entry = %entry.id(), "photo dispatched without payload");
                return None;
            }
        };
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "reading downloaded photo failed");
                return None;
            }
        };
        let Some(handle) = self.host.store_image(bytes) else {
            tracing::error!(path = %path.display(), "image store refused photo");
            return None;
        };
        self.images.push(handle);
        Some((
            markup::image_tag(handle),
            MessageFlags::RECV | MessageFlags::IMAGES,
        ))
    }

    /// Show a rendered message in its conversation.
    ///
    /// Only direct echoes of this account's own messages are flagged as
    /// sent; chat and encrypted-session echoes keep their inbound flags.
    fn deliver(&self, message: &InboundMessage, text: &str, flags: MessageFlags) {
        let outgoing = message.from == self.config.own_id;

        match Destination::of(message.to) {
            Some(Destination::Chat(chat)) => {
                if self.host.is_chat_visible(chat) {
                    self.host
                        .deliver_chat_message(chat, message.from, text, flags, message.date);
                } else {
                    tracing::debug!(%chat, message_id = message.id, "chat not shown, delivery skipped");
                }
                self.pending_reads.register(chat);
            }
            Some(Destination::EncryptedSession(session)) => {
                self.host
                    .deliver_direct_message(session, text, flags, message.date);
                self.pending_reads.register(session);
            }
            Some(Destination::Direct(to)) if outgoing => {
                let flags = flags.without(MessageFlags::RECV) | MessageFlags::SEND;
                self.host.deliver_direct_message(to, text, flags, message.date);
            }
            Some(Destination::Direct(_)) => {
                self.host
                    .deliver_direct_message(message.from, text, flags, message.date);
                self.pending_reads.register(message.from);
            }
            None => {
                tracing::debug!(message_id = message.id, to = %message.to, "unroutable destination");
            }
        }
    }
}
