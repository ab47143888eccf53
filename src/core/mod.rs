//! Core business logic module
//!
//! This module contains the domain models, the transcript source and
//! writer, the batch queue and the harvester that ties them together.

pub mod config;
pub mod error_handling;
pub mod formatter;
pub mod harvester;
pub mod input;
pub mod metadata;
pub mod models;
pub mod queue;
pub mod transcript_source;
pub mod writer;


// Re-export commonly used types
pub use config::AppConfig;
pub use harvester::TranscriptHarvester;
