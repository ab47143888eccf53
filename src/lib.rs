//! Transcript Harvester - Core Library
//!
//! This library fetches YouTube transcripts and writes them to disk,
//! either one video at a time or in batches drained from a queue.

pub mod core;
pub mod utils;

// Re-export commonly used types
pub use core::{
    config::AppConfig,
    formatter::OutputFormat,
    harvester::{HarvestEvent, HarvestOutcome, HarvestSummary, TranscriptHarvester},
    models::{AppError, AppResult, TaskStatus, Transcript, TranscriptSnippet},
    queue::TranscriptQueue,
    transcript_source::{TranscriptSource, YoutubeTranscriptSource},
};

pub use utils::validation::extract_video_id;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize the library with default settings
pub fn init() -> anyhow::Result<()> {
    // 已初始化时忽略
    utils::logging::init_tracing(utils::logging::DEFAULT_FILTER);
    tracing::info!("{} v{} initialized", NAME, VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
        // Second call must not fail either
        assert!(init().is_ok());
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "transcript-harvester");
    }
}
