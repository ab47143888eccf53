//! Transcript sources
//!
//! [`TranscriptSource`] is the seam between the harvester and YouTube. The
//! production implementation wraps the `yt-transcript-rs` client; tests plug
//! in canned sources.

use async_trait::async_trait;
use tracing::{debug, info};
use yt_transcript_rs::api::YouTubeTranscriptApi;
use yt_transcript_rs::errors::{CouldNotRetrieveTranscript, CouldNotRetrieveTranscriptReason};

use crate::core::error_handling::{errors, FetchError};
use crate::core::models::{AppError, AppResult, Transcript, TranscriptSnippet};

/// Something that can produce a transcript for a video id
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the transcript in the first available language of `languages`
    async fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
        preserve_formatting: bool,
    ) -> Result<Transcript, FetchError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Transcript source backed by YouTube's caption endpoints
pub struct YoutubeTranscriptSource {
    api: YouTubeTranscriptApi,
}

impl YoutubeTranscriptSource {
    pub fn new() -> AppResult<Self> {
        let api = YouTubeTranscriptApi::new(None, None, None).map_err(|e| {
            AppError::Transcript(format!("Failed to create transcript client: {}", e))
        })?;
        info!("Initialized YouTube transcript source");
        Ok(Self { api })
    }
}

#[async_trait]
impl TranscriptSource for YoutubeTranscriptSource {
    async fn fetch(
        &self,
        video_id: &str,
        languages: &[String],
        preserve_formatting: bool,
    ) -> Result<Transcript, FetchError> {
        let language_refs: Vec<&str> = languages.iter().map(String::as_str).collect();
        debug!(video_id, languages = ?language_refs, "Requesting transcript");

        let fetched = self
            .api
            .fetch_transcript(video_id, &language_refs, preserve_formatting)
            .await
            .map_err(|e| classify_error(&e))?;

        Ok(Transcript {
            video_id: video_id.to_string(),
            language: fetched.language.clone(),
            language_code: fetched.language_code.clone(),
            is_generated: fetched.is_generated,
            snippets: fetched
                .snippets
                .iter()
                .map(|s| TranscriptSnippet::new(s.text.clone(), s.start, s.duration))
                .collect(),
        })
    }

    fn name(&self) -> &'static str {
        "youtube"
    }
}

/// Map a client failure onto a [`FetchError`].
///
/// Videos that will never yield a transcript fail permanently, blocks are
/// throttling and get the steeper backoff, transport failures are retried.
pub fn classify_error(error: &CouldNotRetrieveTranscript) -> FetchError {
    use CouldNotRetrieveTranscriptReason as Reason;

    let video_id = error.video_id.as_str();
    let Some(reason) = &error.reason else {
        return classify_message(video_id, &error.to_string());
    };

    match reason {
        Reason::TranscriptsDisabled => {
            errors::unavailable_error(video_id, "subtitles are disabled for this video")
        }
        Reason::NoTranscriptFound {
            requested_language_codes,
            ..
        } => errors::unavailable_error(
            video_id,
            format!(
                "no transcript in any of the requested languages {:?}",
                requested_language_codes
            ),
        ),
        Reason::VideoUnavailable => {
            errors::unavailable_error(video_id, "the video is no longer available")
        }
        Reason::VideoUnplayable { reason, .. } => errors::unavailable_error(
            video_id,
            format!(
                "the video is unplayable: {}",
                reason.as_deref().unwrap_or("no reason given")
            ),
        ),
        Reason::InvalidVideoId => errors::unavailable_error(video_id, "invalid video id"),
        Reason::AgeRestricted => {
            errors::unavailable_error(video_id, "the video is age restricted")
        }
        Reason::TranslationUnavailable(details)
        | Reason::TranslationLanguageUnavailable(details) => {
            errors::unavailable_error(video_id, format!("translation unavailable: {}", details))
        }
        Reason::IpBlocked(_) => {
            errors::rate_limited_error("YouTube is blocking requests from this IP")
        }
        Reason::RequestBlocked(_) => errors::rate_limited_error("YouTube blocked the request"),
        Reason::YouTubeRequestFailed(details) => {
            errors::network_error(format!("request to YouTube failed: {}", details), true)
        }
        Reason::YouTubeDataUnparsable(details) => errors::parsing_error(
            format!("could not parse YouTube page data: {}", details),
            false,
        ),
        Reason::FailedToCreateConsentCookie => FetchError::ExternalService {
            message: "failed to accept the YouTube consent cookie".to_string(),
            service: "youtube".to_string(),
            is_retryable: true,
            backoff_multiplier: 2.0,
        },
    }
}

const PERMANENT_MARKERS: &[&str] = &[
    "disabled",
    "no transcript",
    "unavailable",
    "invalid video id",
    "age restricted",
    "age-restricted",
    "private",
];

const THROTTLE_MARKERS: &[&str] = &[
    "too many requests",
    "429",
    "ip blocked",
    "request blocked",
    "captcha",
];

const NETWORK_MARKERS: &[&str] = &["timed out", "timeout", "connection", "dns"];

/// Fallback for failures that carry no reason. The video id is removed
/// first so it cannot match a marker.
fn classify_message(video_id: &str, message: &str) -> FetchError {
    let lower = if video_id.is_empty() {
        message.to_ascii_lowercase()
    } else {
        message.replace(video_id, "").to_ascii_lowercase()
    };
    let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if contains_any(THROTTLE_MARKERS) {
        errors::rate_limited_error(message)
    } else if contains_any(PERMANENT_MARKERS) {
        errors::unavailable_error(video_id, message)
    } else if contains_any(NETWORK_MARKERS) {
        errors::network_error(message, true)
    } else {
        FetchError::ExternalService {
            message: message.to_string(),
            service: "youtube".to_string(),
            is_retryable: true,
            backoff_multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error_handling::ErrorCategory;
    use CouldNotRetrieveTranscriptReason as Reason;

    fn failure(video_id: &str, reason: Option<Reason>) -> CouldNotRetrieveTranscript {
        CouldNotRetrieveTranscript {
            video_id: video_id.to_string(),
            reason,
        }
    }

    #[test]
    fn test_classify_permanent_reasons() {
        let reasons = vec![
            Reason::TranscriptsDisabled,
            Reason::VideoUnavailable,
            Reason::VideoUnplayable {
                reason: Some("Sign in to confirm you're not a bot".to_string()),
                sub_reasons: vec![],
            },
            Reason::InvalidVideoId,
            Reason::AgeRestricted,
            Reason::TranslationLanguageUnavailable("xx".to_string()),
        ];
        for reason in reasons {
            let label = format!("{:?}", reason);
            let error = classify_error(&failure("KhPQtXQpiZc", Some(reason)));
            assert_eq!(error.category(), ErrorCategory::Unavailable, "{label}");
            assert!(!error.is_retryable(), "{label}");
        }
    }

    #[test]
    fn test_video_id_never_drives_classification() {
        let disabled = classify_error(&failure("ab429cdefgh", Some(Reason::TranscriptsDisabled)));
        assert_eq!(disabled.category(), ErrorCategory::Unavailable);
        assert!(!disabled.is_retryable());

        let gone = classify_error(&failure("xdnsQtXQpiZ", Some(Reason::VideoUnavailable)));
        assert_eq!(gone.category(), ErrorCategory::Unavailable);

        // Without a reason only the message text is left
        let bare = classify_error(&failure("x429timeout", None));
        assert_eq!(bare.category(), ErrorCategory::ExternalService);
        assert_eq!(bare.backoff_multiplier(), 2.0);
    }

    #[test]
    fn test_classify_blocks_as_throttling() {
        for reason in [Reason::IpBlocked(None), Reason::RequestBlocked(None)] {
            let error = classify_error(&failure("KhPQtXQpiZc", Some(reason)));
            assert_eq!(error.category(), ErrorCategory::ExternalService);
            assert!(error.is_retryable());
            assert_eq!(error.backoff_multiplier(), 3.0);
        }
    }

    #[test]
    fn test_classify_transport_and_parse_failures() {
        let failed = classify_error(&failure(
            "KhPQtXQpiZc",
            Some(Reason::YouTubeRequestFailed("connection reset".to_string())),
        ));
        assert_eq!(failed.category(), ErrorCategory::Network);
        assert!(failed.is_retryable());

        let unparsable = classify_error(&failure(
            "KhPQtXQpiZc",
            Some(Reason::YouTubeDataUnparsable("missing captions json".to_string())),
        ));
        assert_eq!(unparsable.category(), ErrorCategory::Parsing);
        assert!(!unparsable.is_retryable());
    }

    #[test]
    fn test_classify_message_fallback() {
        let throttled = classify_message("KhPQtXQpiZc", "YouTube is receiving Too Many Requests");
        assert_eq!(throttled.category(), ErrorCategory::ExternalService);
        assert_eq!(throttled.backoff_multiplier(), 3.0);

        let timeout = classify_message("KhPQtXQpiZc", "operation timed out");
        assert_eq!(timeout.category(), ErrorCategory::Network);

        let gone = classify_message("KhPQtXQpiZc", "Video unavailable");
        assert_eq!(gone.category(), ErrorCategory::Unavailable);

        let unknown = classify_message("KhPQtXQpiZc", "something odd happened");
        assert_eq!(unknown.category(), ErrorCategory::ExternalService);
        assert!(unknown.is_retryable());
    }
}
