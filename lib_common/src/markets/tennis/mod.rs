//! # Tennis Feed Transforms
//!
//! - **`market_grouper`**: buckets a match's raw odds markets by their `group`
//!   attribute and attaches the result to a copy of the match.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Groups raw odds markets by their `group` field.
pub mod market_grouper;

pub use market_grouper::{group_markets, process_matches, GroupedMarkets};
