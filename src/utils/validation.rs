//! URL and video identifier validation utilities

use anyhow::{anyhow, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];

/// Path prefixes that carry the video id as the next path segment
const ID_PATH_PREFIXES: &[&str] = &["embed", "shorts", "live", "v"];

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static regex"))
}

/// Validate URL syntax
pub fn validate_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| anyhow!("Invalid URL format: {}", e))
}

/// Check whether a string is a well-formed video id
pub fn is_valid_video_id(candidate: &str) -> bool {
    video_id_regex().is_match(candidate)
}

/// Check if URL points at YouTube
pub fn is_youtube_url(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => parsed
            .host_str()
            .map(|host| host == "youtu.be" || YOUTUBE_HOSTS.contains(&host))
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Extract a video id from a bare id or any common YouTube URL form
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if is_valid_video_id(input) {
        return Some(input.to_string());
    }

    // Accept scheme-less URLs such as "youtu.be/abc" by retrying with https
    let parsed = Url::parse(input)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| Url::parse(&format!("https://{input}")).ok())?;

    let host = parsed.host_str()?;

    let candidate = if host == "youtu.be" {
        parsed.path_segments()?.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host) {
        let mut segments = parsed.path_segments()?;
        match segments.next() {
            Some("watch") => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some(prefix) if ID_PATH_PREFIXES.contains(&prefix) => {
                segments.next().map(str::to_string)
            }
            _ => None,
        }
    } else {
        None
    }?;

    is_valid_video_id(&candidate).then_some(candidate)
}
