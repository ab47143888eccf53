//! Video metadata lookup through the YouTube Data API v3
//!
//! Optional: only used when an API key is configured. Counts arrive as
//! strings and any field may be missing, so parsing is lenient and defaults
//! to zero or empty values.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::models::{AppError, AppResult, VideoMetadata};
use crate::utils::network::build_http_client;

/// Documentation: https://developers.google.com/youtube/v3/docs/videos
pub const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";

pub struct MetadataClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl MetadataClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Config("YouTube API key is empty".to_string()));
        }

        Ok(Self {
            client: build_http_client(timeout)?,
            api_key,
            endpoint: VIDEOS_ENDPOINT.to_string(),
        })
    }

    /// Point the client at a different endpoint (proxies, test servers)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn fetch(&self, video_id: &str) -> AppResult<VideoMetadata> {
        debug!(video_id, "Fetching video metadata");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("id", video_id),
                ("key", self.api_key.as_str()),
                ("part", "snippet,statistics,contentDetails"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        let metadata = parse_video_response(video_id, &response)?;
        info!(
            video_id,
            title = %metadata.title,
            channel = %metadata.channel_name,
            "Fetched video metadata"
        );
        Ok(metadata)
    }
}

/// Build [`VideoMetadata`] from a `videos.list` response body
pub fn parse_video_response(video_id: &str, response: &Value) -> AppResult<VideoMetadata> {
    let item = response["items"]
        .as_array()
        .and_then(|items| items.first())
        .ok_or_else(|| AppError::Parse(format!("No video found for id {}", video_id)))?;

    let snippet = &item["snippet"];
    let statistics = &item["statistics"];
    let details = &item["contentDetails"];

    let text = |value: &Value| value.as_str().unwrap_or_default().to_string();
    let count = |value: &Value| -> u64 {
        match value {
            Value::String(s) => s.parse().unwrap_or(0),
            Value::Number(n) => n.as_u64().unwrap_or(0),
            _ => 0,
        }
    };

    let duration = text(&details["duration"]);

    Ok(VideoMetadata {
        video_id: video_id.to_string(),
        title: text(&snippet["title"]),
        channel_id: text(&snippet["channelId"]),
        channel_name: text(&snippet["channelTitle"]),
        upload_date: text(&snippet["publishedAt"]),
        duration_seconds: parse_iso8601_duration(&duration),
        duration,
        views: count(&statistics["viewCount"]),
        likes: count(&statistics["likeCount"]),
        comment_count: count(&statistics["commentCount"]),
        tags: snippet["tags"]
            .as_array()
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        has_captions: details["caption"].as_str() == Some("true"),
        crawl_date: chrono::Utc::now().to_rfc3339(),
    })
}

/// Parse an ISO 8601 duration such as `PT1H2M3S` into whole seconds.
///
/// Only the time part is supported; anything else yields 0.
pub fn parse_iso8601_duration(duration: &str) -> u64 {
    let Some(rest) = duration.strip_prefix("PT") else {
        return 0;
    };

    let mut total = 0.0;
    let mut number = String::new();
    for ch in rest.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
            continue;
        }
        let value: f64 = number.parse().unwrap_or(0.0);
        number.clear();
        total += match ch {
            'H' => value * 3600.0,
            'M' => value * 60.0,
            'S' => value,
            _ => 0.0,
        };
    }

    total as u64
}
