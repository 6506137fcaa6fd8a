//! # Error Taxonomy
//!
//! One enum per failure family of the pipeline. None of these is fatal to the
//! process: each is handled at the boundary that produced it (a fetch cycle, a
//! single record, a single subscriber, a single lookup).

use thiserror::Error;

/// A failed attempt to obtain a usable match list from the upstream feed.
///
/// Recovered by retrying on the next cycle; live state is left untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The HTTP client could not be built.
    #[error("failed to build feed client: {0}")]
    Client(String),

    /// Connection, DNS or protocol failure before a status was received.
    #[error("transport error fetching {url}: {reason}")]
    Transport {
        /// The URL that was being fetched.
        url: String,
        /// Lower-level error text.
        reason: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("timed out fetching {url}")]
    Timeout {
        /// The URL that was being fetched.
        url: String,
    },

    /// The upstream answered with a non-2xx status.
    #[error("upstream {url} answered with status {status}")]
    Status {
        /// The URL that was being fetched.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error body, if one could be read.
        body: Option<String>,
    },

    /// The body was not JSON, or not a list of records.
    #[error("malformed feed body: {0}")]
    Malformed(String),

    /// The feed returned an empty list where data was expected.
    #[error("feed returned no matches")]
    EmptyFeed,
}

/// A market source that cannot be grouped.
///
/// Recovered by leaving that record's markets ungrouped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupingError {
    /// The market source is neither a sequence nor a mapping.
    #[error("market source must be an array or an object, found {found}")]
    UnsupportedShape {
        /// JSON type name of the offending value.
        found: &'static str,
    },
}

/// Errors raised by the broadcast dispatcher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
    /// The dispatcher is shutting down and accepts no new subscribers.
    #[error("dispatcher is closed")]
    Closed,
}

/// Outcome of a point lookup that found nothing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Neither the live set nor the cache holds the match.
    #[error("match {0} not found")]
    NotFound(String),
}

/// Every initial fetch attempt failed; the live set was seeded with a placeholder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// All configured sources were tried and failed.
    #[error("all {attempts} feed sources failed, last error: {last}")]
    AllSourcesFailed {
        /// Number of sources tried.
        attempts: usize,
        /// The error from the last source tried.
        last: FeedError,
    },
}
