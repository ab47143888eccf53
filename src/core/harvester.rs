//! Transcript Harvester - orchestrates fetching and writing transcripts
//!
//! Single videos go through [`TranscriptHarvester::fetch_to_file`]; batches
//! are enqueued on the harvester's [`TranscriptQueue`] and drained by
//! [`TranscriptHarvester::run_queue`] with bounded concurrency.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::core::config::{AppConfig, FetchConfig};
use crate::core::error_handling::{FetchError, RetryExecutor, RetryPolicy, RetryStats};
use crate::core::metadata::MetadataClient;
use crate::core::models::{AppError, AppResult, QueueItem, Transcript};
use crate::core::queue::TranscriptQueue;
use crate::core::transcript_source::{TranscriptSource, YoutubeTranscriptSource};
use crate::core::writer::TranscriptWriter;
use crate::utils::validation::extract_video_id;

/// Events emitted while harvesting
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum HarvestEvent {
    TaskStarted {
        item_id: String,
        video_id: String,
    },
    TaskCompleted {
        item_id: String,
        video_id: String,
        path: PathBuf,
        snippets: usize,
    },
    TaskFailed {
        item_id: String,
        video_id: String,
        error: String,
    },
    TaskSkipped {
        item_id: String,
        video_id: String,
        reason: String,
    },
    /// Put back as pending because a circuit breaker is open
    TaskDeferred {
        item_id: String,
        video_id: String,
        retry_after_ms: u64,
    },
    MetadataWritten {
        video_id: String,
        path: PathBuf,
    },
    RunFinished {
        summary: HarvestSummary,
    },
}

pub type EventSender = mpsc::UnboundedSender<HarvestEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<HarvestEvent>;

/// Result of harvesting a single video
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub video_id: String,
    pub path: PathBuf,
    pub snippet_count: usize,
    pub bytes_written: u64,
    pub language_code: String,
    pub is_generated: bool,
    pub metadata_path: Option<PathBuf>,
}

/// Totals for one queue run
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct HarvestSummary {
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Left pending for a later run while a circuit breaker was open
    pub deferred: usize,
    pub snippets: usize,
    pub elapsed_ms: u64,
}

impl HarvestSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Why a single video did not produce a file
#[derive(Debug)]
enum ItemError {
    AlreadyExists(PathBuf),
    Fetch(FetchError),
    App(AppError),
}

impl From<ItemError> for AppError {
    fn from(error: ItemError) -> Self {
        match error {
            ItemError::AlreadyExists(path) => AppError::Validation(format!(
                "Output file already exists: {} (use --overwrite to replace it)",
                path.display()
            )),
            ItemError::Fetch(e) => AppError::Transcript(e.to_string()),
            ItemError::App(e) => e,
        }
    }
}

pub struct TranscriptHarvester {
    fetch: FetchConfig,
    source: Arc<dyn TranscriptSource>,
    writer: TranscriptWriter,
    retry: RetryExecutor,
    metadata: Option<MetadataClient>,
    queue: TranscriptQueue,
    event_tx: Option<EventSender>,
}

impl TranscriptHarvester {
    pub fn new(config: &AppConfig, source: Arc<dyn TranscriptSource>) -> Self {
        let retry = RetryExecutor::new(RetryPolicy {
            base_delay: Duration::from_millis(config.fetch.retry_base_delay_ms),
            ..RetryPolicy::with_retries(config.fetch.retry_attempts)
        });

        Self {
            fetch: config.fetch.clone(),
            source,
            writer: TranscriptWriter::new(
                config.output.directory.clone(),
                config.output.format,
                config.output.overwrite,
            ),
            retry,
            metadata: None,
            queue: TranscriptQueue::new(),
            event_tx: None,
        }
    }

    /// Build a harvester talking to YouTube, with metadata lookups when
    /// enabled and an API key is configured
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let source = Arc::new(YoutubeTranscriptSource::new()?);
        let mut harvester = Self::new(config, source);

        if config.metadata.enabled {
            match config.metadata.api_key.as_deref() {
                Some(key) => {
                    let client = MetadataClient::new(
                        key,
                        Duration::from_secs(config.fetch.timeout_seconds),
                    )?;
                    harvester = harvester.with_metadata(client);
                }
                None => warn!("Metadata enabled but YOUTUBE_API_KEY is not set, skipping"),
            }
        }

        Ok(harvester)
    }

    pub fn with_metadata(mut self, client: MetadataClient) -> Self {
        self.metadata = Some(client);
        self
    }

    /// Receive [`HarvestEvent`]s; replaces any previous subscriber
    pub fn subscribe(&mut self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        rx
    }

    pub fn queue(&self) -> &TranscriptQueue {
        &self.queue
    }

    pub fn writer(&self) -> &TranscriptWriter {
        &self.writer
    }

    pub async fn retry_stats(&self) -> RetryStats {
        self.retry.get_stats().await
    }

    fn emit(&self, event: HarvestEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Fetch a transcript with retries, without writing it
    pub async fn fetch_transcript(&self, video_id: &str) -> Result<Transcript, FetchError> {
        let source = self.source.as_ref();
        let languages: &[String] = &self.fetch.languages;
        let preserve_formatting = self.fetch.preserve_formatting;

        self.retry
            .execute(move |ctx| {
                debug!(
                    video_id,
                    attempt = ctx.attempt_number,
                    source = source.name(),
                    "Fetching transcript"
                );
                source.fetch(video_id, languages, preserve_formatting)
            })
            .await
    }

    /// Fetch one video's transcript and write it to a file.
    ///
    /// `video` may be a bare id or a YouTube URL. Without `output_path` the
    /// file lands in the configured output directory as `<id>.<ext>`.
    #[instrument(skip(self, output_path))]
    pub async fn fetch_to_file(
        &self,
        video: &str,
        output_path: Option<PathBuf>,
    ) -> AppResult<HarvestOutcome> {
        let video_id = extract_video_id(video).ok_or_else(|| {
            AppError::Validation(format!("Not a YouTube video id or URL: '{}'", video))
        })?;
        let path = output_path.unwrap_or_else(|| self.writer.output_path_for(&video_id));

        Ok(self.harvest(&video_id, path).await?)
    }

    async fn harvest(&self, video_id: &str, path: PathBuf) -> Result<HarvestOutcome, ItemError> {
        if !self.writer.overwrites() && path.exists() {
            return Err(ItemError::AlreadyExists(path));
        }

        let transcript = self
            .fetch_transcript(video_id)
            .await
            .map_err(ItemError::Fetch)?;

        info!(
            video_id,
            snippets = transcript.len(),
            language = %transcript.language_code,
            generated = transcript.is_generated,
            "Fetched transcript"
        );

        let written = match self.writer.write(&transcript, &path).await {
            Ok(outcome) => outcome,
            Err(AppError::Validation(_)) => return Err(ItemError::AlreadyExists(path)),
            Err(e) => return Err(ItemError::App(e)),
        };

        let metadata_path = self.write_metadata(video_id, &written.path).await;

        Ok(HarvestOutcome {
            video_id: video_id.to_string(),
            path: written.path,
            snippet_count: written.snippet_count,
            bytes_written: written.bytes_written,
            language_code: transcript.language_code,
            is_generated: transcript.is_generated,
            metadata_path,
        })
    }

    /// Metadata is best effort and never fails the transcript
    async fn write_metadata(&self, video_id: &str, transcript_path: &Path) -> Option<PathBuf> {
        let client = self.metadata.as_ref()?;
        let result = match client.fetch(video_id).await {
            Ok(metadata) => self.writer.write_metadata(&metadata, transcript_path).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(path) => {
                self.emit(HarvestEvent::MetadataWritten {
                    video_id: video_id.to_string(),
                    path: path.clone(),
                });
                Some(path)
            }
            Err(e) => {
                warn!(video_id, "Failed to fetch metadata: {}", e);
                None
            }
        }
    }

    /// Enqueue videos by id or URL, returning accepted item ids and the
    /// inputs that could not be resolved
    pub fn enqueue<I, S>(&self, inputs: I) -> (Vec<String>, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for input in inputs {
            let input = input.as_ref();
            match extract_video_id(input) {
                Some(video_id) => accepted.push(self.queue.add_video(video_id)),
                None => {
                    warn!("Skipping invalid video reference: {}", input);
                    rejected.push(input.to_string());
                }
            }
        }
        (accepted, rejected)
    }

    /// Process up to `max_items` pending queue items (`None` drains the queue)
    pub async fn run_queue(&self, max_items: Option<usize>) -> HarvestSummary {
        let started = Instant::now();
        let limit = max_items.unwrap_or(usize::MAX);

        let mut batch = Vec::new();
        while batch.len() < limit {
            match self.queue.pop_next_video() {
                Some(item) => batch.push(item),
                None => break,
            }
        }

        if batch.is_empty() {
            debug!("Queue empty, nothing to harvest");
            return HarvestSummary::default();
        }

        info!(
            items = batch.len(),
            concurrency = self.fetch.concurrent_fetches,
            "Starting transcript harvest"
        );

        let results: Vec<ItemResult> = stream::iter(batch)
            .map(|item| self.process_item(item))
            .buffer_unordered(self.fetch.concurrent_fetches.max(1))
            .collect()
            .await;

        let mut summary = HarvestSummary {
            attempted: results.len(),
            ..Default::default()
        };
        for result in results {
            match result {
                ItemResult::Completed(snippets) => {
                    summary.completed += 1;
                    summary.snippets += snippets;
                }
                ItemResult::Failed => summary.failed += 1,
                ItemResult::Skipped => summary.skipped += 1,
                ItemResult::Deferred => summary.deferred += 1,
            }
        }
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            deferred = summary.deferred,
            "Transcript harvest finished"
        );
        self.emit(HarvestEvent::RunFinished {
            summary: summary.clone(),
        });
        summary
    }

    async fn process_item(&self, item: QueueItem) -> ItemResult {
        self.emit(HarvestEvent::TaskStarted {
            item_id: item.id.clone(),
            video_id: item.video_id.clone(),
        });

        let path = self.writer.output_path_for(&item.video_id);
        match self.harvest(&item.video_id, path).await {
            Ok(outcome) => {
                let path_text = outcome.path.display().to_string();
                self.queue.mark_completed(&item.id, Some(path_text));
                self.emit(HarvestEvent::TaskCompleted {
                    item_id: item.id,
                    video_id: item.video_id,
                    path: outcome.path,
                    snippets: outcome.snippet_count,
                });
                ItemResult::Completed(outcome.snippet_count)
            }
            Err(ItemError::AlreadyExists(path)) => {
                let reason = format!("{} already exists", path.display());
                info!(video_id = %item.video_id, "Skipping: {}", reason);
                self.queue.mark_skipped(&item.id, reason.clone());
                self.emit(HarvestEvent::TaskSkipped {
                    item_id: item.id,
                    video_id: item.video_id,
                    reason,
                });
                ItemResult::Skipped
            }
            Err(ItemError::Fetch(FetchError::CircuitOpen { retry_after_ms, .. })) => {
                warn!(
                    video_id = %item.video_id,
                    retry_after_ms,
                    "Circuit breaker open, leaving item pending"
                );
                self.queue.requeue(&item.id);
                self.emit(HarvestEvent::TaskDeferred {
                    item_id: item.id,
                    video_id: item.video_id,
                    retry_after_ms,
                });
                ItemResult::Deferred
            }
            Err(other) => {
                let message = AppError::from(other).to_string();
                error!(video_id = %item.video_id, "Harvest failed: {}", message);
                self.queue.mark_failed(&item.id, message.clone());
                self.emit(HarvestEvent::TaskFailed {
                    item_id: item.id,
                    video_id: item.video_id,
                    error: message,
                });
                ItemResult::Failed
            }
        }
    }
}

enum ItemResult {
    Completed(usize),
    Failed,
    Skipped,
    Deferred,
}
