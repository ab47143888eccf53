//! Core data models for the transcript harvester

use serde::{Deserialize, Serialize};

/// Task status enumeration

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,

    Processing,

    Completed,

    Failed,

    Skipped,
}

impl TaskStatus {
    /// Whether the item has left the queue's working set
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

/// A single caption cue

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]

pub struct TranscriptSnippet {
    pub text: String,

    /// Offset from the start of the video, in seconds
    pub start: f64,

    /// Cue length in seconds
    pub duration: f64,
}

impl TranscriptSnippet {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A fetched transcript with its language information

#[derive(Debug, Clone, Serialize, Deserialize)]

pub struct Transcript {
    pub video_id: String,

    pub language: String,

    pub language_code: String,

    /// Auto-generated captions rather than uploaded ones
    pub is_generated: bool,

    pub snippets: Vec<TranscriptSnippet>,
}

impl Transcript {
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Snippet texts joined by newlines
    pub fn text(&self) -> String {
        self.snippets
            .iter()
            .map(|snippet| snippet.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn total_duration(&self) -> f64 {
        self.snippets
            .iter()
            .map(TranscriptSnippet::end)
            .fold(0.0, f64::max)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a TranscriptSnippet;
    type IntoIter = std::slice::Iter<'a, TranscriptSnippet>;

    fn into_iter(self) -> Self::IntoIter {
        self.snippets.iter()
    }
}

/// Work queue entry

#[derive(Debug, Clone, Serialize, Deserialize)]

pub struct QueueItem {
    pub id: String,

    pub video_id: String,

    pub status: TaskStatus,

    pub added_at: chrono::DateTime<chrono::Utc>,

    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,

    pub error_message: Option<String>,

    pub output_path: Option<String>,
}

/// Video metadata from the YouTube Data API

#[derive(Debug, Clone, Default, Serialize, Deserialize)]

pub struct VideoMetadata {
    pub video_id: String,

    pub title: String,

    pub channel_id: String,

    pub channel_name: String,

    pub upload_date: String,

    /// ISO 8601 duration as reported by the API, e.g. `PT4M13S`
    pub duration: String,

    pub duration_seconds: u64,

    pub views: u64,

    pub likes: u64,

    pub comment_count: u64,

    pub tags: Vec<String>,

    pub has_captions: bool,

    pub crawl_date: String,
}

/// Application error types

#[derive(Debug, thiserror::Error)]

pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transcript error: {0}")]
    Transcript(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("System error: {0}")]
    System(String),
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        Transcript {
            video_id: "KhPQtXQpiZc".to_string(),
            language: "English".to_string(),
            language_code: "en".to_string(),
            is_generated: false,
            snippets: vec![
                TranscriptSnippet::new("hello", 0.0, 1.5),
                TranscriptSnippet::new("world", 1.5, 2.25),
            ],
        }
    }

    #[test]
    fn test_transcript_text_and_duration() {
        let transcript = sample();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.text(), "hello\nworld");
        assert!((transcript.total_duration() - 3.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_transcript_duration() {
        let mut transcript = sample();
        transcript.snippets.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.total_duration(), 0.0);
    }

    #[test]
    fn test_iterating_snippets_in_order() {
        let transcript = sample();
        let texts: Vec<&str> = (&transcript)
            .into_iter()
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(texts, vec!["hello", "world"]);
    }

    #[test]
    fn test_finished_statuses() {
        assert!(!TaskStatus::Pending.is_finished());
        assert!(!TaskStatus::Processing.is_finished());
        assert!(TaskStatus::Completed.is_finished());
        assert!(TaskStatus::Failed.is_finished());
        assert!(TaskStatus::Skipped.is_finished());
    }
}
