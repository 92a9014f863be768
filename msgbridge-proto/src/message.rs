//! Inbound message records as delivered by the protocol client.
//!
//! An [`InboundMessage`] is immutable once received. It carries the raw
//! text, an optional [`Media`] descriptor and, for service events, a
//! [`ServiceAction`](crate::service::ServiceAction).

use serde::{Deserialize, Serialize};

use crate::peer::PeerId;
use crate::service::ServiceAction;

/// Seconds since the UNIX epoch, as reported by the remote service.
///
/// A zero timestamp means the service did not report a date.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    /// Creates a timestamp from seconds since the UNIX epoch.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Seconds since the UNIX epoch.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// Whether the service left the date unset.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        self.0 == 0
    }

    /// The instant `days` days before `self`.
    #[must_use]
    pub fn days_before(&self, days: u32) -> Self {
        Self(self.0.saturating_sub(i64::from(days) * 86_400))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Lifecycle flags the protocol client keeps on every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageState {
    /// The message body is an empty update.
    pub empty: bool,
    /// The message is a deletion marker.
    pub deleted: bool,
    /// The message has been fully created on the service.
    pub created: bool,
    /// The message was sent by this very session and is being echoed back.
    pub session_outbound: bool,
}

impl Default for MessageState {
    fn default() -> Self {
        Self {
            empty: false,
            deleted: false,
            created: true,
            session_outbound: false,
        }
    }
}

/// Remote photo that has to be downloaded before it can be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoDescriptor {
    /// Photo identifier on the remote service.
    pub id: i64,
    /// Size of the largest available rendition, in bytes.
    #[serde(default)]
    pub size: u64,
}

/// A document attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier on the remote service.
    pub id: i64,
    /// Original file name.
    #[serde(default)]
    pub name: String,
    /// MIME type reported by the sender.
    #[serde(default)]
    pub mime_type: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// Media attached to an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Media {
    /// No media, plain text only.
    #[default]
    None,
    /// A photo that must be fetched.
    Photo(PhotoDescriptor),
    /// A photo sent inside an encrypted session.
    EncryptedPhoto {
        /// Size in bytes.
        size: u64,
    },
    /// A document.
    Document(Document),
    /// A document sent inside an encrypted session.
    EncryptedDocument(Document),
    /// A shared location.
    Geo {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
    /// A shared contact card.
    Contact {
        /// Contact's first name.
        first_name: String,
        /// Contact's last name.
        last_name: String,
        /// Contact's phone number.
        phone: String,
    },
}

/// One message received from the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message identifier on the remote service.
    pub id: i64,
    /// Who sent the message.
    pub from: PeerId,
    /// Where the message was sent (user, chat or encrypted session).
    pub to: PeerId,
    /// When the message was sent.
    #[serde(default)]
    pub date: Timestamp,
    /// Raw message text. `None` when the service sent no body at all.
    #[serde(default)]
    pub text: Option<String>,
    /// Lifecycle flags.
    #[serde(default)]
    pub state: MessageState,
    /// Attached media.
    #[serde(default)]
    pub media: Media,
    /// Service action, present only for service/system events.
    #[serde(default)]
    pub action: Option<ServiceAction>,
}

impl InboundMessage {
    /// Creates a plain text message with default lifecycle flags.
    #[must_use]
    pub fn text(id: i64, from: PeerId, to: PeerId, text: impl Into<String>) -> Self {
        Self {
            id,
            from,
            to,
            date: Timestamp::default(),
            text: Some(text.into()),
            state: MessageState::default(),
            media: Media::None,
            action: None,
        }
    }

    /// Attaches media to this message.
    #[must_use]
    pub fn with_media(mut self, media: Media) -> Self {
        self.media = media;
        self
    }

    /// Turns this message into a service event.
    #[must_use]
    pub fn with_action(mut self, action: ServiceAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Sets the date this message was sent.
    #[must_use]
    pub fn with_date(mut self, date: Timestamp) -> Self {
        self.date = date;
        self
    }

    /// Whether this is a service/system event rather than user content.
    #[must_use]
    pub const fn is_service(&self) -> bool {
        self.action.is_some()
    }

    /// Whether displaying this message needs a photo download first.
    #[must_use]
    pub const fn needs_photo(&self) -> bool {
        matches!(self.media, Media::Photo(_)) && !self.is_service()
    }
}
