//! Outgoing message composition.
//!
//! A user message is markup from the host UI. An embedded `<img>` becomes
//! a document send of the staged image; the rest of the text is reduced
//! to plain text and split into protocol-sized chunks, one text send each.
//! Length is checked before anything is staged, so an over-length message
//! produces no sends at all.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;

use msgbridge_proto::peer::PeerId;
use msgbridge_proto::{DEFAULT_MAX_CHUNK_COUNT, MAX_CHUNK_SIZE};

use super::report::SendKind;
use super::{Completion, Session, Submitted};
use crate::host::{Host, ImageHandle};
use crate::markup;
use crate::protocol::Protocol;

/// Errors returned to the caller of [`Session::send_message`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    /// The text does not fit into the allowed number of chunks.
    #[error("message too long: {length} characters (max {limit})")]
    OverLength {
        /// Length of the text in code points.
        length: usize,
        /// Largest length that can be sent.
        limit: usize,
    },
}

/// How outgoing messages are normalized and split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Code points per chunk, at most [`MAX_CHUNK_SIZE`].
    pub max_chunk_size: usize,
    /// Chunks per message.
    pub max_chunk_count: usize,
    /// Strip tags and decode entities from messages without an image.
    pub normalize_markup: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: MAX_CHUNK_SIZE,
            max_chunk_count: DEFAULT_MAX_CHUNK_COUNT,
            normalize_markup: true,
        }
    }
}

impl ComposeOptions {
    /// Effective chunk size, clamped to `1..=MAX_CHUNK_SIZE`.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.max_chunk_size.clamp(1, MAX_CHUNK_SIZE)
    }

    /// Effective chunk count; anything below one counts as one.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.max_chunk_count.max(1)
    }

    /// Longest message, in code points, that can be sent.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.chunk_size().saturating_mul(self.chunk_count())
    }
}

/// A composed message, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// Staged image to send as a document, if any.
    pub attachment: Option<PathBuf>,
    /// Text chunks, in send order.
    pub chunks: Vec<String>,
}

/// Split `text` into chunks of at most `chunk_size` code points.
///
/// Empty text yields no chunks.
///
/// # Errors
///
/// Returns [`ComposeError::OverLength`] if more than `chunk_count` chunks
/// would be needed.
pub fn split_chunks(
    text: &str,
    chunk_size: usize,
    chunk_count: usize,
) -> Result<Vec<&str>, ComposeError> {
    let chunk_size = chunk_size.max(1);
    let limit = chunk_size.saturating_mul(chunk_count.max(1));
    let length = text.chars().count();
    if length > limit {
        return Err(ComposeError::OverLength { length, limit });
    }

    let mut chunks = Vec::with_capacity(length.div_ceil(chunk_size));
    let mut rest = text;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(chunk_size)
            .map_or(rest.len(), |(index, _)| index);
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }
    Ok(chunks)
}

/// Turn host markup into an attachment and text chunks.
///
/// # Errors
///
/// Returns [`ComposeError::OverLength`] if the text is too long; nothing is
/// staged in that case.
pub fn compose(
    text: &str,
    options: &ComposeOptions,
    host: &impl Host,
) -> Result<Outgoing, ComposeError> {
    let image = markup::find_embedded_image(text);
    let body = if image.is_some() || options.normalize_markup {
        markup::to_plain_text(text)
    } else {
        text.to_string()
    };
    let chunks = split_chunks(&body, options.chunk_size(), options.chunk_count())?
        .into_iter()
        .map(str::to_string)
        .collect();

    let attachment = match image {
        Some(image) => match image.handle {
            Some(handle) => stage_image(host, handle),
            None => {
                tracing::warn!("embedded image names no stored image, sending text only");
                None
            }
        },
        None => None,
    };
    Ok(Outgoing { attachment, chunks })
}

/// Split text typed outside the host UI, which carries no markup.
///
/// Angle brackets and entities are ordinary characters here, so the text
/// is sent exactly as given and never produces an attachment.
///
/// # Errors
///
/// Returns [`ComposeError::OverLength`] if the text is too long.
pub fn compose_plain(text: &str, options: &ComposeOptions) -> Result<Outgoing, ComposeError> {
    let chunks = split_chunks(text, options.chunk_size(), options.chunk_count())?
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok(Outgoing {
        attachment: None,
        chunks,
    })
}

fn stage_image(host: &impl Host, handle: ImageHandle) -> Option<PathBuf> {
    let Some(image) = host.stored_image(handle) else {
        tracing::warn!(%handle, "embedded image not in image store, sending text only");
        return None;
    };
    match host.stage_temp_file(&image.name, &image.bytes) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(%handle, error = %e, "staging attachment failed, sending text only");
            None
        }
    }
}

impl<P: Protocol + 'static, H: Host> Session<P, H> {
    /// Compose a user message and submit its sends to `to`.
    ///
    /// The attachment, if any, is submitted first, then every text chunk in
    /// order. Each send completes on its own; failures are reported into
    /// the conversation as they arrive.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::OverLength`] without submitting anything if
    /// the text is too long.
    pub fn send_message(&mut self, to: PeerId, text: &str) -> Result<Submitted, ComposeError> {
        let outgoing = compose(text, &self.config.compose, &self.host)?;
        Ok(self.submit(to, outgoing))
    }

    /// Send plain text verbatim, e.g. a message given on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::OverLength`] without submitting anything if
    /// the text is too long.
    pub fn send_plain_text(&mut self, to: PeerId, text: &str) -> Result<Submitted, ComposeError> {
        let outgoing = compose_plain(text, &self.config.compose)?;
        Ok(self.submit(to, outgoing))
    }

    fn submit(&mut self, to: PeerId, outgoing: Outgoing) -> Submitted {
        let submitted = Submitted {
            chunks: outgoing.chunks.len(),
            document: outgoing.attachment.is_some(),
        };

        if let Some(path) = outgoing.attachment {
            let protocol = Arc::clone(&self.protocol);
            self.in_flight.push(
                async move {
                    let result = protocol.send_document(to, &path).await;
                    Completion::Sent {
                        to,
                        kind: SendKind::Document,
                        result,
                    }
                }
                .boxed(),
            );
        }
        for chunk in outgoing.chunks {
            let protocol = Arc::clone(&self.protocol);
            self.in_flight.push(
                async move {
                    let result = protocol.send_text(to, &chunk).await;
                    Completion::Sent {
                        to,
                        kind: SendKind::Text,
                        result,
                    }
                }
                .boxed(),
            );
        }

        tracing::debug!(
            %to,
            chunks = submitted.chunks,
            document = submitted.document,
            "message submitted"
        );
        submitted
    }
}
