//! `MsgBridge`: message-handling core of a chat protocol bridge.
//!
//! Inbound protocol messages are classified, photos are fetched, and the
//! results are handed to the host UI strictly in arrival order. Outbound
//! messages are split into protocol-sized chunks and submitted, with
//! failures reported back into the conversation.

pub mod config;
pub mod host;
pub mod markup;
pub mod pipeline;
pub mod protocol;
pub mod replay;
