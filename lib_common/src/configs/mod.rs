//! # Configuration Modules
//!
//! Options recognized by the live-data pipeline. Process-level concerns (port,
//! log directory, where the options come from) live in the server crate.

/// Pipeline options and their defaults.
pub mod pipeline;

pub use pipeline::PipelineConfig;
