//! Content classification for inbound messages.
//!
//! [`classify`] decides what an inbound message is (service event, photo,
//! document, location, contact or text) and renders the display string.
//! It has no side effects; the only collaborator is a peer lookup used to
//! name the actors of service events.

use msgbridge_proto::message::{Document, InboundMessage, Media};
use msgbridge_proto::peer::{Destination, Peer, PeerId};
use msgbridge_proto::service::ServiceAction;

use crate::markup;

/// Why a message is not shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The message is an empty update.
    Empty,
    /// The message is a deletion marker.
    Deleted,
    /// The message has not been fully created yet.
    NotCreated,
    /// The service sent no body at all.
    NoBody,
    /// Echo of a message this session sent.
    SessionEcho,
    /// The destination peer type is not understood.
    UnknownDestination,
    /// A service event with an action this bridge does not render.
    UnsupportedAction,
    /// A peer named by the message could not be resolved.
    UnresolvablePeer,
    /// Nothing left to display.
    EmptyText,
}

/// What an inbound message is, and how it is displayed.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// A service event rendered as a sentence.
    ServiceEvent(String),
    /// A photo that can only be shown once downloaded.
    PhotoPending,
    /// A document for file-transfer delivery.
    Document(Document),
    /// A document from an encrypted session, for file-transfer delivery.
    EncryptedDocument(Document),
    /// Escaped text, or a placeholder for unsupported media.
    PlainText(String),
    /// A map link for a shared location.
    Geo(String),
    /// A shared contact card.
    Contact {
        /// Full name.
        name: String,
        /// Phone number.
        phone: String,
    },
    /// The message must not be shown.
    Suppressed(SuppressReason),
}

impl Classification {
    /// Display markup for text-like classifications.
    ///
    /// Photos, documents and suppressed messages have no text of their own.
    #[must_use]
    pub fn display_text(&self) -> Option<String> {
        match self {
            Self::ServiceEvent(text) | Self::PlainText(text) | Self::Geo(text) => {
                Some(text.clone())
            }
            Self::Contact { name, phone } => Some(format!(
                "<b>{}</b><br>{}",
                markup::escape(name),
                markup::escape(phone)
            )),
            Self::PhotoPending
            | Self::Document(_)
            | Self::EncryptedDocument(_)
            | Self::Suppressed(_) => None,
        }
    }
}

/// Check whether a message must never be shown, regardless of content.
///
/// Covers empty updates, deletion markers, messages not yet created,
/// messages without a body, echoes of this session's own sends and
/// destinations of unknown peer type.
#[must_use]
pub fn suppression(message: &InboundMessage) -> Option<SuppressReason> {
    let state = &message.state;
    if state.empty {
        Some(SuppressReason::Empty)
    } else if state.deleted {
        Some(SuppressReason::Deleted)
    } else if !state.created {
        Some(SuppressReason::NotCreated)
    } else if message.text.is_none() {
        Some(SuppressReason::NoBody)
    } else if state.session_outbound {
        Some(SuppressReason::SessionEcho)
    } else if Destination::of(message.to).is_none() {
        Some(SuppressReason::UnknownDestination)
    } else {
        None
    }
}

/// Classify one inbound message.
pub fn classify(
    message: &InboundMessage,
    lookup_peer: impl Fn(PeerId) -> Option<Peer>,
) -> Classification {
    if let Some(reason) = suppression(message) {
        return Classification::Suppressed(reason);
    }

    if let Some(action) = &message.action {
        return match format_service(message.from, action, lookup_peer) {
            Ok(text) => Classification::ServiceEvent(text),
            Err(reason) => Classification::Suppressed(reason),
        };
    }

    match &message.media {
        Media::Photo(_) => Classification::PhotoPending,
        Media::Document(document) => Classification::Document(document.clone()),
        Media::EncryptedDocument(document) => Classification::EncryptedDocument(document.clone()),
        Media::EncryptedPhoto { size } => Classification::PlainText(format!(
            "[ENCRYPTED PHOTO] (not yet supported) {}",
            format_size(*size)
        )),
        Media::Contact {
            first_name,
            last_name,
            phone,
        } => Classification::Contact {
            name: format!("{first_name} {last_name}"),
            phone: phone.clone(),
        },
        Media::Geo {
            latitude,
            longitude,
        } => Classification::Geo(format_geo(*latitude, *longitude)),
        Media::None => match message.text.as_deref() {
            Some(text) if !text.is_empty() => Classification::PlainText(markup::escape(text)),
            _ => Classification::Suppressed(SuppressReason::EmptyText),
        },
    }
}

/// Render a service event as `"<actor> <action>."`.
///
/// # Errors
///
/// Returns the reason the event cannot be rendered: an unresolvable actor
/// or member, or an unsupported action.
pub fn format_service(
    actor: PeerId,
    action: &ServiceAction,
    lookup_peer: impl Fn(PeerId) -> Option<Peer>,
) -> Result<String, SuppressReason> {
    let actor = lookup_peer(actor).ok_or(SuppressReason::UnresolvablePeer)?;
    let member = |user: i64| {
        lookup_peer(PeerId::user(user))
            .map(|peer| markup::escape(&peer.name))
            .ok_or(SuppressReason::UnresolvablePeer)
    };

    let text = match action {
        ServiceAction::ChatCreate { title } => format!("created chat {}", markup::escape(title)),
        ServiceAction::ChatEditTitle { new_title } => {
            format!("changed title to {}", markup::escape(new_title))
        }
        ServiceAction::ChatEditPhoto => "changed photo".to_string(),
        ServiceAction::ChatDeletePhoto => "deleted photo".to_string(),
        ServiceAction::ChatAddUser { user } => format!("added user {}", member(*user)?),
        ServiceAction::ChatDeleteUser { user } => format!("deleted user {}", member(*user)?),
        ServiceAction::SetMessageTtl { ttl } => format!("set ttl to {ttl} seconds"),
        ServiceAction::ReadMessages { count } => format!("{count} messages marked read"),
        ServiceAction::DeleteMessages { count } => format!("{count} messages deleted"),
        ServiceAction::ScreenshotMessages { count } => format!("{count} messages screenshoted"),
        ServiceAction::NotifyLayer { layer } => format!("updated layer to {layer}"),
        ServiceAction::RequestKey { exchange_id } => format!("Request rekey #{exchange_id:016x}"),
        ServiceAction::AcceptKey { exchange_id } => format!("Accept rekey #{exchange_id:016x}"),
        ServiceAction::CommitKey { exchange_id } => format!("Commit rekey #{exchange_id:016x}"),
        ServiceAction::AbortKey { exchange_id } => format!("Abort rekey #{exchange_id:016x}"),
        ServiceAction::Unsupported => return Err(SuppressReason::UnsupportedAction),
    };
    tracing::debug!(action = %text, "service message");
    Ok(format!("{} {text}.", markup::escape(&actor.name)))
}

/// OpenStreetMap link for a location, as both link text and target.
#[must_use]
pub fn format_geo(latitude: f64, longitude: f64) -> String {
    let url = format!("http://openstreetmap.org/?lat={latitude:.6}&lon={longitude:.6}&zoom=20");
    format!("<a href=\"{url}\">{url}</a>")
}

/// Human-readable size with SI units.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["kB", "MB", "GB", "TB", "PB", "EB"];
    match bytes {
        1 => "1 byte".to_string(),
        0..1000 => format!("{bytes} bytes"),
        _ => {
            let mut value = bytes as f64 / 1000.0;
            let mut unit = UNITS[0];
            for next in UNITS.iter().skip(1).copied() {
                if value < 1000.0 {
                    break;
                }
                value /= 1000.0;
                unit = next;
            }
            format!("{value:.1} {unit}")
        }
    }
}
