//! Peer identifiers and destination kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of peer a [`PeerId`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerKind {
    /// A regular user account.
    User,
    /// A group chat.
    Chat,
    /// An end-to-end encrypted one-to-one session.
    EncryptedChat,
    /// A peer type this bridge does not understand.
    #[serde(other)]
    Unknown,
}

impl PeerKind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Chat => "chat",
            Self::EncryptedChat => "secret",
            Self::Unknown => "unknown",
        }
    }
}

/// Identifies a peer on the remote service (user, chat or encrypted session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId {
    /// What kind of peer this is.
    pub kind: PeerKind,
    /// Numeric identifier, unique within its kind.
    pub id: i64,
}

impl PeerId {
    /// Creates a user peer identifier.
    #[must_use]
    pub const fn user(id: i64) -> Self {
        Self {
            kind: PeerKind::User,
            id,
        }
    }

    /// Creates a group chat peer identifier.
    #[must_use]
    pub const fn chat(id: i64) -> Self {
        Self {
            kind: PeerKind::Chat,
            id,
        }
    }

    /// Creates an encrypted session peer identifier.
    #[must_use]
    pub const fn encrypted_chat(id: i64) -> Self {
        Self {
            kind: PeerKind::EncryptedChat,
            id,
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.id)
    }
}

/// Error returned when a textual peer identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerIdParseError {
    /// The input is not of the form `kind:id`.
    #[error("expected `kind:id`, got {0:?}")]
    Malformed(String),
    /// The kind prefix is not one of `user`, `chat`, `secret` or `unknown`.
    #[error("unknown peer kind {0:?}")]
    UnknownKind(String),
    /// The numeric part is not a valid integer.
    #[error("invalid peer number {0:?}")]
    InvalidNumber(String),
}

impl FromStr for PeerId {
    type Err = PeerIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| PeerIdParseError::Malformed(s.to_string()))?;
        let kind = match kind {
            "user" => PeerKind::User,
            "chat" => PeerKind::Chat,
            "secret" => PeerKind::EncryptedChat,
            "unknown" => PeerKind::Unknown,
            other => return Err(PeerIdParseError::UnknownKind(other.to_string())),
        };
        let id = id
            .parse()
            .map_err(|_| PeerIdParseError::InvalidNumber(id.to_string()))?;
        Ok(Self { kind, id })
    }
}

/// Where a message is delivered, derived from its destination peer.
///
/// Unknown peer kinds have no destination; messages addressed to them are
/// never shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// A group chat room.
    Chat(PeerId),
    /// An encrypted one-to-one session.
    EncryptedSession(PeerId),
    /// A plain one-to-one conversation.
    Direct(PeerId),
}

impl Destination {
    /// Classifies a destination peer, or `None` for unknown peer kinds.
    #[must_use]
    pub const fn of(peer: PeerId) -> Option<Self> {
        match peer.kind {
            PeerKind::Chat => Some(Self::Chat(peer)),
            PeerKind::EncryptedChat => Some(Self::EncryptedSession(peer)),
            PeerKind::User => Some(Self::Direct(peer)),
            PeerKind::Unknown => None,
        }
    }

    /// The peer this destination points at.
    #[must_use]
    pub const fn peer(&self) -> PeerId {
        match self {
            Self::Chat(peer) | Self::EncryptedSession(peer) | Self::Direct(peer) => *peer,
        }
    }
}

/// A resolved peer with the name the UI should show for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// The peer's identifier.
    pub id: PeerId,
    /// Display name (user alias or chat title).
    pub name: String,
}
