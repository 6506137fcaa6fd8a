//! # Data Ingestors Module
//!
//! Clients that pull data from external feeds into the pipeline state.
//!
//! ## Contained Modules:
//! - **`tennis_polling`**: A self-scheduling REST client that polls the tennis
//!   live feed, groups each match's markets and publishes the result.
//!
//! The primary types are re-exported so they can be reached as
//! `lib_common::ingestors::...`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The self-scheduling REST client for the tennis live feed.
pub mod tennis_polling;

pub use tennis_polling::{
    parse_feed_body, placeholder_match, CycleOutcome, FeedSource, HttpFeedSource, PollPhase,
    TennisPollingPlugin, PLACEHOLDER_MATCH_ID,
};
