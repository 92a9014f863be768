//! In-memory host that records every UI call.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use msgbridge_proto::message::{Document, Timestamp};
use msgbridge_proto::peer::PeerId;

use super::{Host, ImageHandle, MessageFlags, StoredImage};

/// One message shown by the host, in the order it was shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Shown in a group chat window.
    Chat {
        /// The chat.
        chat: PeerId,
        /// Who the message is attributed to.
        sender: PeerId,
        /// Rendered text.
        text: String,
        /// Display flags.
        flags: MessageFlags,
        /// Message time.
        at: Timestamp,
    },
    /// Shown in a one-to-one conversation.
    Direct {
        /// The conversation partner.
        peer: PeerId,
        /// Rendered text.
        text: String,
        /// Display flags.
        flags: MessageFlags,
        /// Message time.
        at: Timestamp,
    },
}

impl Delivery {
    /// Rendered text of the delivery.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Chat { text, .. } | Self::Direct { text, .. } => text,
        }
    }

    /// Display flags of the delivery.
    #[must_use]
    pub const fn flags(&self) -> MessageFlags {
        match self {
            Self::Chat { flags, .. } | Self::Direct { flags, .. } => *flags,
        }
    }
}

/// A document offered through file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOffer {
    /// Who sent the document.
    pub sender: PeerId,
    /// The document.
    pub document: Document,
    /// Whether it arrived through an encrypted session.
    pub encrypted: bool,
}

/// [`Host`] implementation that keeps everything in memory.
///
/// Defaults: presence active, no chat window visible, no history cut-off,
/// and no staging directory (staging fails until one is set).
pub struct RecordingHost {
    deliveries: Mutex<Vec<Delivery>>,
    offers: Mutex<Vec<FileOffer>>,
    images: Mutex<HashMap<ImageHandle, StoredImage>>,
    next_image: AtomicU32,
    released: Mutex<Vec<ImageHandle>>,
    visible_chats: Mutex<BTreeSet<PeerId>>,
    presence_active: AtomicBool,
    history_threshold_days: AtomicU32,
    staging_dir: Mutex<Option<PathBuf>>,
}

impl RecordingHost {
    /// Create an empty recording host.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            offers: Mutex::new(Vec::new()),
            images: Mutex::new(HashMap::new()),
            next_image: AtomicU32::new(1),
            released: Mutex::new(Vec::new()),
            visible_chats: Mutex::new(BTreeSet::new()),
            presence_active: AtomicBool::new(true),
            history_threshold_days: AtomicU32::new(0),
            staging_dir: Mutex::new(None),
        }
    }

    /// Stage attachments into `dir`.
    #[must_use]
    pub fn with_staging_dir(self, dir: impl Into<PathBuf>) -> Self {
        *self.staging_dir.lock() = Some(dir.into());
        self
    }

    /// Mark a chat window as shown.
    pub fn show_chat(&self, chat: PeerId) {
        self.visible_chats.lock().insert(chat);
    }

    /// Set whether the account presence is active.
    pub fn set_presence_active(&self, active: bool) {
        self.presence_active.store(active, Ordering::SeqCst);
    }

    /// Set the history cut-off in days.
    pub fn set_history_threshold_days(&self, days: u32) {
        self.history_threshold_days.store(days, Ordering::SeqCst);
    }

    /// Put an image into the store as if the user had inserted it.
    pub fn add_image(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> ImageHandle {
        let handle = ImageHandle::new(self.next_image.fetch_add(1, Ordering::SeqCst));
        self.images.lock().insert(
            handle,
            StoredImage {
                name: name.into(),
                bytes: bytes.into(),
            },
        );
        handle
    }

    /// Everything delivered so far.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Texts of everything delivered so far.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .iter()
            .map(|d| d.text().to_string())
            .collect()
    }

    /// Documents offered so far.
    #[must_use]
    pub fn offers(&self) -> Vec<FileOffer> {
        self.offers.lock().clone()
    }

    /// Images currently in the store.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.lock().len()
    }

    /// Images released so far.
    #[must_use]
    pub fn released_images(&self) -> Vec<ImageHandle> {
        self.released.lock().clone()
    }
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for RecordingHost {
    fn deliver_chat_message(
        &self,
        chat: PeerId,
        sender: PeerId,
        text: &str,
        flags: MessageFlags,
        at: Timestamp,
    ) {
        self.deliveries.lock().push(Delivery::Chat {
            chat,
            sender,
            text: text.to_string(),
            flags,
            at,
        });
    }

    fn deliver_direct_message(&self, peer: PeerId, text: &str, flags: MessageFlags, at: Timestamp) {
        self.deliveries.lock().push(Delivery::Direct {
            peer,
            text: text.to_string(),
            flags,
            at,
        });
    }

    fn offer_file(&self, sender: PeerId, document: &Document, encrypted: bool) {
        self.offers.lock().push(FileOffer {
            sender,
            document: document.clone(),
            encrypted,
        });
    }

    fn store_image(&self, bytes: Vec<u8>) -> Option<ImageHandle> {
        if bytes.is_empty() {
            return None;
        }
        let handle = ImageHandle::new(self.next_image.fetch_add(1, Ordering::SeqCst));
        self.images.lock().insert(
            handle,
            StoredImage {
                name: format!("image-{handle}"),
                bytes,
            },
        );
        Some(handle)
    }

    fn release_image(&self, handle: ImageHandle) {
        self.images.lock().remove(&handle);
        self.released.lock().push(handle);
    }

    fn stored_image(&self, handle: ImageHandle) -> Option<StoredImage> {
        self.images.lock().get(&handle).cloned()
    }

    fn stage_temp_file(&self, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let Some(dir) = self.staging_dir.lock().clone() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no staging directory available",
            ));
        };
        let path = dir.join(name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    fn is_chat_visible(&self, chat: PeerId) -> bool {
        self.visible_chats.lock().contains(&chat)
    }

    fn is_presence_active(&self) -> bool {
        self.presence_active.load(Ordering::SeqCst)
    }

    fn history_threshold_days(&self) -> u32 {
        self.history_threshold_days.load(Ordering::SeqCst)
    }
}
