//! # Betting Markets Module
//!
//! Transforms over the betting-market payloads embedded in upstream match
//! records. Match records are treated as opaque JSON; only the market source is
//! inspected.
//!
//! ## Contained Modules:
//!
//! - **`tennis`**: market grouping for the tennis live feed.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Tennis feed transforms.
pub mod tennis;
