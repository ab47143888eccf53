//! Batch input parsing
//!
//! Accepts either a CSV export with a recognisable id/url column or a plain
//! list with one video per line. Each entry goes through
//! [`extract_video_id`](crate::utils::validation::extract_video_id).

use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::core::models::{AppError, AppResult};
use crate::utils::encoding::decode_text;
use crate::utils::validation::extract_video_id;

/// Header names that identify the video column, compared case-insensitively
pub const VIDEO_COLUMN_NAMES: &[&str] = &["video_id", "videoid", "id", "url", "video_url", "link"];

/// A rejected input entry with its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub line: usize,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct InputStats {
    pub encoding: String,
    pub total_entries: usize,
    pub duplicates: usize,
    pub rejected: Vec<RejectedEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct VideoList {
    /// Unique video ids in first-seen order
    pub video_ids: Vec<String>,
    pub stats: InputStats,
}

/// Read and parse a batch file
pub fn read_video_list(path: &Path) -> AppResult<VideoList> {
    let bytes = std::fs::read(path)?;
    let (text, encoding, had_errors) = decode_text(&bytes);
    if had_errors {
        warn!("Input {} contains undecodable bytes", path.display());
    }

    let mut list = parse_video_list(&text)?;
    list.stats.encoding = encoding.to_string();
    info!(
        "Read {} videos from {} ({} rejected, {} duplicates)",
        list.video_ids.len(),
        path.display(),
        list.stats.rejected.len(),
        list.stats.duplicates
    );
    Ok(list)
}

/// Parse batch input already decoded to text
pub fn parse_video_list(text: &str) -> AppResult<VideoList> {
    let content: String = text
        .lines()
        .map(|line| {
            if line.trim_start().starts_with('#') {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let delimiter = detect_delimiter(&content);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let mut list = VideoList::default();
    let mut seen = HashSet::new();
    let mut column: Option<usize> = None;
    let mut first_record = true;

    for record in reader.records() {
        let record = record.map_err(|e| AppError::Parse(format!("Invalid batch input: {}", e)))?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

        if record.iter().all(str::is_empty) {
            continue;
        }

        if first_record {
            first_record = false;
            if let Some(index) = header_column(&record) {
                debug!(column = index, "Using header column for video ids");
                column = Some(index);
                continue;
            }
        }

        let value = record.get(column.unwrap_or(0)).unwrap_or_default();
        if value.is_empty() {
            continue;
        }
        list.stats.total_entries += 1;

        match extract_video_id(value) {
            Some(video_id) => {
                if seen.insert(video_id.clone()) {
                    list.video_ids.push(video_id);
                } else {
                    list.stats.duplicates += 1;
                }
            }
            None => list.stats.rejected.push(RejectedEntry {
                line,
                value: value.to_string(),
            }),
        }
    }

    Ok(list)
}

fn header_column(record: &csv::StringRecord) -> Option<usize> {
    VIDEO_COLUMN_NAMES.iter().find_map(|name| {
        record
            .iter()
            .position(|field| field.eq_ignore_ascii_case(name))
    })
}

fn detect_delimiter(content: &str) -> u8 {
    let first_line = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|d| first_line.bytes().filter(|b| b == d).count())
        .filter(|d| first_line.as_bytes().contains(d))
        .unwrap_or(b',')
}
