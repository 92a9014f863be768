//! Console host used by the replay binary.
//!
//! Prints every delivery to stdout as one line and keeps the image store,
//! file offers and staging in an inner [`RecordingHost`].

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::DateTime;

use msgbridge_proto::message::{Document, Timestamp};
use msgbridge_proto::peer::PeerId;

use super::recording::RecordingHost;
use super::{Host, ImageHandle, MessageFlags, StoredImage};

/// [`Host`] that prints deliveries to stdout.
///
/// Every chat window counts as visible and presence is always active.
pub struct ConsoleHost {
    inner: RecordingHost,
    timestamp_format: String,
    history_threshold_days: u32,
}

impl ConsoleHost {
    /// Create a console host that stages attachments in `staging_dir`.
    pub fn new(
        staging_dir: impl Into<PathBuf>,
        timestamp_format: impl Into<String>,
        history_threshold_days: u32,
    ) -> Self {
        Self {
            inner: RecordingHost::new().with_staging_dir(staging_dir),
            timestamp_format: timestamp_format.into(),
            history_threshold_days,
        }
    }

    /// Format the time column of a delivery line.
    ///
    /// Falls back to the raw timestamp if the format string is unusable.
    #[must_use]
    pub fn format_time(&self, at: Timestamp) -> String {
        let at = if at.is_unset() { Timestamp::now() } else { at };
        let Some(dt) = DateTime::from_timestamp(at.as_secs(), 0) else {
            return at.to_string();
        };
        let mut out = String::new();
        if write!(out, "{}", dt.format(&self.timestamp_format)).is_err() {
            return at.to_string();
        }
        out
    }

    /// Format one delivery line.
    #[must_use]
    pub fn format_line(
        &self,
        conversation: PeerId,
        sender: Option<PeerId>,
        text: &str,
        flags: MessageFlags,
        at: Timestamp,
    ) -> String {
        let time = self.format_time(at);
        let tag = if flags == MessageFlags::empty() {
            String::new()
        } else {
            format!(" ({flags})")
        };
        match sender {
            Some(sender) => format!("[{time}] {conversation} <{sender}>{tag} {text}"),
            None => format!("[{time}] {conversation}{tag} {text}"),
        }
    }
}

impl Host for ConsoleHost {
    fn deliver_chat_message(
        &self,
        chat: PeerId,
        sender: PeerId,
        text: &str,
        flags: MessageFlags,
        at: Timestamp,
    ) {
        println!("{}", self.format_line(chat, Some(sender), text, flags, at));
        self.inner.deliver_chat_message(chat, sender, text, flags, at);
    }

    fn deliver_direct_message(&self, peer: PeerId, text: &str, flags: MessageFlags, at: Timestamp) {
        println!("{}", self.format_line(peer, None, text, flags, at));
        self.inner.deliver_direct_message(peer, text, flags, at);
    }

    fn offer_file(&self, sender: PeerId, document: &Document, encrypted: bool) {
        let kind = if encrypted {
            "encrypted file"
        } else {
            "file"
        };
        println!(
            "[{}] {sender} offers {kind} {:?} ({} bytes)",
            self.format_time(Timestamp::now()),
            document.name,
            document.size
        );
        self.inner.offer_file(sender, document, encrypted);
    }

    fn store_image(&self, bytes: Vec<u8>) -> Option<ImageHandle> {
        self.inner.store_image(bytes)
    }

    fn release_image(&self, handle: ImageHandle) {
        self.inner.release_image(handle);
    }

    fn stored_image(&self, handle: ImageHandle) -> Option<StoredImage> {
        self.inner.stored_image(handle)
    }

    fn stage_temp_file(&self, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        self.inner.stage_temp_file(name, bytes)
    }

    fn is_chat_visible(&self, _chat: PeerId) -> bool {
        true
    }

    fn is_presence_active(&self) -> bool {
        true
    }

    fn history_threshold_days(&self) -> u32 {
        self.history_threshold_days
    }
}
