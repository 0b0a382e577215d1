//! # LinkHive Sync Protocol
//!
//! Wire types and codecs shared by the sync engine (client) and the
//! sync server.
//!
//! This crate provides:
//! - The bookmark and group data model with identity keys
//! - Pull/reconciliation and mutation message types
//! - The UI ↔ engine request/response contract
//! - The push event envelope
//! - The line-oriented SSE framing codec (encoder + incremental parser)
//!
//! All payloads are JSON text. The SSE parser is a small state machine
//! that accepts arbitrary chunk boundaries: feeding it the same bytes
//! split differently always yields the same frames.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod messages;
mod model;
mod sse;

pub use error::{ProtocolError, ProtocolResult};
pub use event::{ChangeKind, EventEnvelope, BOOKMARK_EVENT_PREFIX, GROUP_EVENT_PREFIX};
pub use messages::{
    EngineRequest, EngineResponse, FetchMode, ItemDraft, PullRequest, PullResponse,
};
pub use model::{Group, IdentityKeyed, Item};
pub use sse::{encode_comment, encode_event, SseFrame, SseParser};
