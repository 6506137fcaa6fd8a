//! # Data Retrieval Module
//!
//! Generic HTTP retrieval used by the ingestors.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: a JSON `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, with a per-request timeout and optional retries with
//!   exponential backoff. Failures come back as `FeedError` values.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// HTTP JSON client with timeout and retry middleware.
pub mod ky_http;
