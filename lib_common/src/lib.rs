//! # lib_common
//!
//! The live-data synchronization core for the tennis feed. The crate is split
//! into folder-based modules, each behind a cargo feature of the same name:
//!
//! - **`markets`**: pure transforms over betting-market payloads (market grouping).
//! - **`core`**: the snapshot cache, the live match set with its lookup service,
//!   and the broadcast dispatcher that fans updates out to subscribers.
//! - **`retrieve`**: the HTTP JSON client used to talk to the upstream feed.
//! - **`ingestors`**: the poll-merge loop that ties everything together.
//! - **`configs`**: pipeline options and their defaults.
//! - **`utils`**: content fingerprinting.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

#[cfg(any(feature = "core", feature = "markets", feature = "retrieve"))]
pub mod errors;

#[cfg(feature = "configs")]
pub mod configs;
#[cfg(feature = "core")]
pub mod core;
#[cfg(feature = "ingestors")]
pub mod ingestors;
#[cfg(feature = "markets")]
pub mod markets;
#[cfg(feature = "retrieve")]
pub mod retrieve;
#[cfg(feature = "utils")]
pub mod utils;
