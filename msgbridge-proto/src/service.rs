//! Service actions carried by system events (membership, titles, rekeying).

use serde::{Deserialize, Serialize};

/// What a service/system event reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServiceAction {
    /// A group chat was created.
    ChatCreate {
        /// Title of the new chat.
        title: String,
    },
    /// A chat title changed.
    ChatEditTitle {
        /// The new title.
        new_title: String,
    },
    /// A chat photo changed.
    ChatEditPhoto,
    /// A chat photo was removed.
    ChatDeletePhoto,
    /// A user was added to a chat.
    ChatAddUser {
        /// The added user's id.
        user: i64,
    },
    /// A user was removed from a chat.
    ChatDeleteUser {
        /// The removed user's id.
        user: i64,
    },
    /// The message time-to-live of an encrypted session was set.
    SetMessageTtl {
        /// TTL in seconds.
        ttl: i32,
    },
    /// Messages were marked read.
    ReadMessages {
        /// Number of messages.
        count: i32,
    },
    /// Messages were deleted.
    DeleteMessages {
        /// Number of messages.
        count: i32,
    },
    /// Messages were screenshotted.
    ScreenshotMessages {
        /// Number of messages.
        count: i32,
    },
    /// The peer announced its protocol layer.
    NotifyLayer {
        /// Protocol layer version.
        layer: i32,
    },
    /// A key exchange was requested.
    RequestKey {
        /// Key exchange identifier.
        exchange_id: u64,
    },
    /// A key exchange was accepted.
    AcceptKey {
        /// Key exchange identifier.
        exchange_id: u64,
    },
    /// A key exchange was committed.
    CommitKey {
        /// Key exchange identifier.
        exchange_id: u64,
    },
    /// A key exchange was aborted.
    AbortKey {
        /// Key exchange identifier.
        exchange_id: u64,
    },
    /// Any action this bridge does not render.
    #[serde(other)]
    Unsupported,
}
