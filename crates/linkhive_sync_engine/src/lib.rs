//! # LinkHive Sync Engine
//!
//! Client-side sync engine for LinkHive.
//!
//! This crate provides:
//! - A persistent cache of items and groups with per-collection TTLs
//! - Single-flight coalescing of concurrent fetches
//! - Full and progressive (paginated) reconciliation
//! - A realtime push client with backoff, jitter, and resume cursors
//! - A mutation pipeline with an echo-suppression window
//! - The typed UI ↔ engine request/response bridge
//!
//! ## Architecture
//!
//! The engine treats the server as the source of truth: every
//! reconciliation is a wholesale collection replace, never a field
//! merge. Reads go through the cache; a stale read blocks on one shared
//! revalidation. Writes confirm remotely first, patch the cache from
//! the confirmed response, then refetch in the background.
//!
//! ## Key invariants
//!
//! - At most one in-flight fetch per key, however many callers ask
//! - Merges are append-only and preserve the order of already-cached rows
//! - Reconnect delay is bounded and resets after a successful connect
//! - A local mutation suppresses realtime echo refetches for a window
//! - Logout clears every persisted slot and the resume state

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bridge;
mod cache;
mod config;
mod error;
mod mutation;
mod orchestrator;
mod realtime;
mod single_flight;
mod store;
mod transport;

pub use bridge::EngineBridge;
pub use cache::{CacheStore, CachedRead, Collection};
pub use config::{RetryConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use mutation::MutationPipeline;
pub use orchestrator::{merge_rows, FetchKey, Snapshot, SyncNotice, SyncOrchestrator};
pub use realtime::{EventSource, EventTransport, RealtimeClient};
pub use single_flight::SingleFlight;
pub use store::{FileStateStore, MemoryStateStore, StateStore};
pub use transport::{MockTransport, SyncTransport};
