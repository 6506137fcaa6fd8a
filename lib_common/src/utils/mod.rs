//! # Utilities Module
//!
//! General-purpose helpers shared by the `core` and `ingestors` modules.
//!
//! ## Contained Modules:
//!
//! - **`fingerprint`**: deterministic SHA-256 digests over canonical JSON, used
//!   by the dispatcher to detect whether the live set changed between publishes.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Content fingerprints for change detection.
pub mod fingerprint;

pub use fingerprint::{fingerprint, Fingerprint};
