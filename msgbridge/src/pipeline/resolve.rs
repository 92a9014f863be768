//! Inbound ingestion and photo fetch resolution.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;

use msgbridge_proto::message::{InboundMessage, Media, PhotoDescriptor, Timestamp};

use super::classify;
use super::queue::{EntryId, PhotoPayload};
use super::{Completion, Session};
use crate::host::Host;
use crate::protocol::{Protocol, ProtocolError};

impl<P: Protocol + 'static, H: Host> Session<P, H> {
    /// Ingest one message delivered by the protocol.
    ///
    /// Messages older than the host's history threshold and messages that
    /// can never be shown are dropped here. Everything else is queued; a
    /// photo starts downloading right away, and whatever is ready at the
    /// head of the queue is dispatched before this returns.
    pub fn on_message(&mut self, message: InboundMessage) {
        if self.is_outside_history(&message) {
            tracing::debug!(
                message_id = message.id,
                date = %message.date,
                "message older than history threshold dropped"
            );
            return;
        }
        if let Some(reason) = classify::suppression(&message) {
            tracing::debug!(message_id = message.id, ?reason, "message suppressed");
            return;
        }

        let photo = match &message.media {
            Media::Photo(photo) if message.needs_photo() => Some(photo.clone()),
            _ => None,
        };
        let entry = self.queue.enqueue(message);
        if let Some(photo) = photo {
            self.start_fetch(entry, photo);
        }
        self.drain();
    }

    fn is_outside_history(&self, message: &InboundMessage) -> bool {
        let days = self.host.history_threshold_days();
        days > 0 && !message.date.is_unset() && message.date < Timestamp::now().days_before(days)
    }

    fn start_fetch(&mut self, entry: EntryId, photo: PhotoDescriptor) {
        tracing::debug!(%entry, photo_id = photo.id, "fetching photo");
        let protocol = Arc::clone(&self.protocol);
        self.in_flight.push(
            async move {
                let result = protocol.fetch_photo(&photo).await;
                Completion::Photo { entry, result }
            }
            .boxed(),
        );
    }

    pub(super) fn on_photo_loaded(&mut self, entry: EntryId, result: Result<PathBuf, ProtocolError>) {
        let payload = match result {
            Ok(path) => PhotoPayload::Downloaded(path),
            Err(e) => {
                tracing::warn!(%entry, error = %e, "photo download failed");
                PhotoPayload::Failed(e.to_string())
            }
        };
        if !self.queue.resolve(entry, payload) {
            tracing::warn!(%entry, "completion for unknown or already resolved entry ignored");
            return;
        }
        self.drain();
    }
}
