//! Host chat UI abstraction.
//!
//! The pipeline never renders anything itself. Everything user-visible goes
//! through the [`Host`] trait: conversation deliveries, file-transfer
//! offers, the image store and temp-file staging for attachments, plus the
//! presence and visibility state that gates delivery and read receipts.
//!
//! Implementations:
//! - [`recording::RecordingHost`]: records every call, for tests
//! - [`console::ConsoleHost`]: prints deliveries to stdout, for replay

pub mod console;
pub mod recording;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;

use msgbridge_proto::message::{Document, Timestamp};
use msgbridge_proto::peer::PeerId;

/// Display flags attached to a delivered message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MessageFlags(u8);

impl MessageFlags {
    /// Sent by this account.
    pub const SEND: Self = Self(1);
    /// Received from someone else.
    pub const RECV: Self = Self(1 << 1);
    /// System notice rather than user content.
    pub const SYSTEM: Self = Self(1 << 2);
    /// Error notice.
    pub const ERROR: Self = Self(1 << 3);
    /// Contains inline images.
    pub const IMAGES: Self = Self(1 << 4);

    const NAMES: [(Self, &'static str); 5] = [
        (Self::SEND, "send"),
        (Self::RECV, "recv"),
        (Self::SYSTEM, "system"),
        (Self::ERROR, "error"),
        (Self::IMAGES, "images"),
    ];

    /// No flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Whether every flag in `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `self` with every flag in `other` cleared.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MessageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for MessageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Handle of an image held by the host's image store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageHandle(u32);

impl ImageHandle {
    /// Wrap a raw image-store id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw image-store id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An image held by the host's image store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// File name the image was stored under.
    pub name: String,
    /// Image contents.
    pub bytes: Vec<u8>,
}

/// The host chat UI.
///
/// All calls are synchronous and happen on the pipeline's event loop.
pub trait Host: Send + Sync {
    /// Show a message in a group chat window.
    fn deliver_chat_message(
        &self,
        chat: PeerId,
        sender: PeerId,
        text: &str,
        flags: MessageFlags,
        at: Timestamp,
    );

    /// Show a message in a one-to-one conversation with `peer`.
    fn deliver_direct_message(&self, peer: PeerId, text: &str, flags: MessageFlags, at: Timestamp);

    /// Offer a received document through the UI's file-transfer mechanism.
    fn offer_file(&self, sender: PeerId, document: &Document, encrypted: bool);

    /// Add an image to the image store, or `None` if the store refused it.
    fn store_image(&self, bytes: Vec<u8>) -> Option<ImageHandle>;

    /// Drop an image previously added with [`store_image`](Self::store_image).
    fn release_image(&self, handle: ImageHandle);

    /// Look up an image the user embedded in an outgoing message.
    fn stored_image(&self, handle: ImageHandle) -> Option<StoredImage>;

    /// Write attachment bytes to a temporary file and return its path.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the temporary file cannot be written.
    fn stage_temp_file(&self, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf>;

    /// Whether the window for `chat` is currently shown.
    fn is_chat_visible(&self, chat: PeerId) -> bool;

    /// Whether the account's presence is active (online and not away).
    fn is_presence_active(&self) -> bool;

    /// Messages older than this many days are ignored; `0` disables the cut-off.
    fn history_threshold_days(&self) -> u32;
}
