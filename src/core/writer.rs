//! Writes rendered transcripts to disk

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::formatter::{render, OutputFormat};
use crate::core::models::{AppError, AppResult, Transcript, VideoMetadata};
use crate::utils::file_utils::sanitize_filename;

/// Result of a successful write
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub snippet_count: usize,
}

/// Transcript file writer
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    output_dir: PathBuf,
    format: OutputFormat,
    overwrite: bool,
}

impl TranscriptWriter {
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat, overwrite: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
            overwrite,
        }
    }

    pub fn overwrites(&self) -> bool {
        self.overwrite
    }

    /// `<output_dir>/<video_id>.<ext>`
    pub fn output_path_for(&self, video_id: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}",
            sanitize_filename(video_id),
            self.format.extension()
        ))
    }

    /// `<video_id>.meta.json` in the transcript's directory
    pub fn metadata_path_for(transcript_path: &Path, video_id: &str) -> PathBuf {
        parent_dir(transcript_path).join(format!("{}.meta.json", sanitize_filename(video_id)))
    }

    /// Render and write a transcript to `path`.
    ///
    /// An existing file is left alone unless overwriting is enabled.
    pub async fn write(&self, transcript: &Transcript, path: &Path) -> AppResult<WriteOutcome> {
        if !self.overwrite && fs::try_exists(path).await? {
            return Err(AppError::Validation(format!(
                "Output file already exists: {}",
                path.display()
            )));
        }

        let content = render(transcript, self.format)?;
        write_atomic(path, content.as_bytes(), self.overwrite).await?;

        info!(
            video_id = %transcript.video_id,
            snippets = transcript.len(),
            "Wrote transcript to {}",
            path.display()
        );

        Ok(WriteOutcome {
            path: path.to_path_buf(),
            bytes_written: content.len() as u64,
            snippet_count: transcript.len(),
        })
    }

    /// Write metadata JSON next to the transcript at `transcript_path`;
    /// always overwrites
    pub async fn write_metadata(
        &self,
        metadata: &VideoMetadata,
        transcript_path: &Path,
    ) -> AppResult<PathBuf> {
        let path = Self::metadata_path_for(transcript_path, &metadata.video_id);
        let json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| AppError::Parse(format!("Failed to serialize metadata: {}", e)))?;
        write_atomic(&path, &json, true).await?;
        debug!("Wrote metadata to {}", path.display());
        Ok(path)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write through a sibling temp file, then publish it under `path`.
///
/// With `clobber` the temp file is renamed over any existing file. Without
/// it the file is published by hard link, which fails if `path` appeared in
/// the meantime.
async fn write_atomic(path: &Path, bytes: &[u8], clobber: bool) -> AppResult<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(&parent).await?;

    let file_name = path
        .file_name()
        .ok_or_else(|| AppError::Validation(format!("Not a file path: {}", path.display())))?;
    let temp_path = parent.join(format!(
        ".{}.{}.part",
        file_name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    ));

    let result = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        if clobber {
            fs::rename(&temp_path, path).await
        } else {
            fs::hard_link(&temp_path, path).await?;
            fs::remove_file(&temp_path).await
        }
    }
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Err(AppError::Validation(format!(
                    "Output file already exists: {}",
                    path.display()
                )))
            } else {
                Err(AppError::Io(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::TranscriptSnippet;

    fn sample() -> Transcript {
        Transcript {
            video_id: "KhPQtXQpiZc".to_string(),
            language: "English".to_string(),
            language_code: "en".to_string(),
            is_generated: false,
            snippets: vec![
                TranscriptSnippet::new("first line", 0.0, 1.0),
                TranscriptSnippet::new("second line", 1.0, 1.0),
            ],
        }
    }

    #[test]
    fn test_output_path_for() {
        let writer = TranscriptWriter::new("out", OutputFormat::Srt, false);
        assert_eq!(
            writer.output_path_for("KhPQtXQpiZc"),
            PathBuf::from("out").join("KhPQtXQpiZc.srt")
        );
        assert_eq!(
            TranscriptWriter::metadata_path_for(Path::new("elsewhere/t.txt"), "KhPQtXQpiZc"),
            PathBuf::from("elsewhere").join("KhPQtXQpiZc.meta.json")
        );
        assert_eq!(
            TranscriptWriter::metadata_path_for(Path::new("t.txt"), "KhPQtXQpiZc"),
            PathBuf::from(".").join("KhPQtXQpiZc.meta.json")
        );
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let temp = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(temp.path().join("out"), OutputFormat::Text, false);
        let path = writer.output_path_for("KhPQtXQpiZc");

        let outcome = writer.write(&sample(), &path).await.unwrap();
        assert_eq!(outcome.snippet_count, 2);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "first line\nsecond line\n");
        assert_eq!(outcome.bytes_written, written.len() as u64);

        // No temp files left behind
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_file_is_not_overwritten() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("transcript.txt");
        std::fs::write(&path, "keep me").unwrap();

        let writer = TranscriptWriter::new(temp.path(), OutputFormat::Text, false);
        let result = writer.write(&sample(), &path).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");

        let overwriting = TranscriptWriter::new(temp.path(), OutputFormat::Text, true);
        tokio_test::assert_ok!(overwriting.write(&sample(), &path).await);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "first line\nsecond line\n"
        );
    }

    #[tokio::test]
    async fn test_write_metadata() {
        let temp = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(temp.path(), OutputFormat::Text, false);
        let metadata = VideoMetadata {
            video_id: "KhPQtXQpiZc".to_string(),
            title: "A talk".to_string(),
            ..Default::default()
        };
        let transcript_path = temp.path().join("elsewhere").join("t.txt");
        let path = writer
            .write_metadata(&metadata, &transcript_path)
            .await
            .unwrap();
        assert_eq!(
            path,
            temp.path().join("elsewhere").join("KhPQtXQpiZc.meta.json")
        );
        let parsed: VideoMetadata =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.title, "A talk");
    }

    #[tokio::test]
    async fn test_publish_without_clobber_keeps_late_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("KhPQtXQpiZc.txt");
        // Appeared after the writer's existence check
        std::fs::write(&path, "written by someone else").unwrap();

        let result = write_atomic(&path, b"ours", false).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "written by someone else"
        );

        let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);

        tokio_test::assert_ok!(write_atomic(&path, b"ours", true).await);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ours");
    }
}
