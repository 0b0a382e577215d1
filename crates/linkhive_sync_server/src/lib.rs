//! # LinkHive Sync Server
//!
//! Server-side event relay for LinkHive.
//!
//! This crate provides:
//! - A per-user subscriber registry (publish/subscribe, GC on last
//!   unsubscribe)
//! - Per-connection stream sessions framing events as SSE with
//!   monotonic ids
//! - A fingerprint polling fallback for out-of-band change detection
//! - Periodic keepalive comments
//!
//! # Architecture
//!
//! The relay is in-memory and not durable: events reach only the
//! listeners connected at publish time. Clients that were offline learn
//! of changes through the polling fallback or their own next full sync.
//! Every per-connection resource (registry entry, poll timer, keepalive
//! timer) is torn down idempotently when the session closes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod fingerprint;
mod registry;
mod relay;
mod session;

pub use config::RelayConfig;
pub use error::{RelayError, RelayResult};
pub use fingerprint::{Fingerprint, FingerprintSource};
pub use registry::{SubscriberId, SubscriberRegistry};
pub use relay::EventRelay;
pub use session::StreamSession;
