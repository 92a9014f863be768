//! Recorded inbound streams for replay.
//!
//! A replay file holds one JSON object per line: either an inbound message
//! or a peer (`{"id": {...}, "name": "..."}`) to register with the
//! protocol client's peer directory. Blank lines and lines starting with
//! `#` are skipped.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use msgbridge_proto::message::InboundMessage;
use msgbridge_proto::peer::Peer;

/// Errors that can occur when loading a replay file.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// The file could not be read.
    #[error("failed to read replay file {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A line is not a message or a peer.
    #[error("invalid record on line {line}: {source}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// One line of a replay file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReplayRecord {
    /// An inbound message, fed to the session in file order.
    Message(Box<InboundMessage>),
    /// A peer known to the protocol client.
    Peer(Peer),
}

/// Parse replay records from JSON-lines text.
///
/// # Errors
///
/// Returns [`ReplayError::Parse`] for the first line that is neither a
/// message nor a peer.
pub fn parse_records(input: &str) -> Result<Vec<ReplayRecord>, ReplayError> {
    input
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, text)| {
            serde_json::from_str(text).map_err(|source| ReplayError::Parse { line, source })
        })
        .collect()
}

/// Read and parse a replay file.
///
/// # Errors
///
/// Returns [`ReplayError`] if the file cannot be read or a line does not
/// parse.
pub fn load(path: &Path) -> Result<Vec<ReplayRecord>, ReplayError> {
    let input = std::fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_records(&input)?;
    tracing::debug!(path = %path.display(), records = records.len(), "replay file loaded");
    Ok(records)
}
