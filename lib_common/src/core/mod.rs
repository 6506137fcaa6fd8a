//! # Core Engine Module
//!
//! The shared state of the live-data pipeline and the operations that read and
//! write it. The poll loop (`ingestors::tennis_polling`) is the only writer;
//! HTTP handlers and WebSocket sessions only read and subscribe.
//!
//! ## Core Components:
//!
//! - **`snapshot_cache`**: TTL-bounded store of the latest snapshot per match id.
//!
//! - **`live_state`**: the live match set behind an atomically swapped `Arc`,
//!   plus `MatchLookup`, the live-then-cache point query.
//!
//! - **`dispatcher`**: the subscriber registry and publish policy. It decides,
//!   per subscriber, whether a publish results in an update, a heartbeat or
//!   nothing at all.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Subscriber registry and per-subscriber publish policy.
pub mod dispatcher;
/// Live match set and two-tier lookup.
pub mod live_state;
/// TTL-bounded snapshot store.
pub mod snapshot_cache;

// --- Public API Re-exports ---
pub use dispatcher::{Dispatcher, FrameKind, LiveFrame, PublishReport, SubscriberId, Subscription};
pub use live_state::{match_id_of, LiveState, MatchLookup};
pub use snapshot_cache::SnapshotCache;
