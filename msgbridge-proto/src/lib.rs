//! Protocol-level message model shared by the `MsgBridge` pipeline.
//!
//! These types describe what the remote messaging service hands to the
//! bridge: peer identifiers, inbound message records with their media and
//! service-action descriptors, and the protocol's size limits.

pub mod message;
pub mod peer;
pub mod service;

/// Maximum number of Unicode code points the protocol accepts in one message.
pub const MAX_CHUNK_SIZE: usize = 4096;

/// Default maximum number of chunks one composed message may be split into.
pub const DEFAULT_MAX_CHUNK_COUNT: usize = 4;
