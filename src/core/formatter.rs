//! Transcript rendering
//!
//! `Text` is the plain one-snippet-per-line dump; the subtitle formats keep
//! cue timing so the output can be loaded back into a player.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::core::models::{AppError, AppResult, Transcript, TranscriptSnippet};

/// Output format for written transcripts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One snippet text per line
    #[default]
    Text,
    /// One snippet per line prefixed with `[HH:MM:SS.mmm]`
    Timestamped,
    Srt,
    WebVtt,
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Text,
        OutputFormat::Timestamped,
        OutputFormat::Srt,
        OutputFormat::WebVtt,
        OutputFormat::Json,
    ];

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text | OutputFormat::Timestamped => "txt",
            OutputFormat::Srt => "srt",
            OutputFormat::WebVtt => "vtt",
            OutputFormat::Json => "json",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Timestamped => "timestamped",
            OutputFormat::Srt => "srt",
            OutputFormat::WebVtt => "webvtt",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "timestamped" => Ok(OutputFormat::Timestamped),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" | "webvtt" => Ok(OutputFormat::WebVtt),
            "json" => Ok(OutputFormat::Json),
            other => Err(AppError::Validation(format!(
                "Unknown output format '{}', expected one of: text, timestamped, srt, webvtt, json",
                other
            ))),
        }
    }
}

/// Render a transcript in the given format
pub fn render(transcript: &Transcript, format: OutputFormat) -> AppResult<String> {
    match format {
        OutputFormat::Text => Ok(render_lines(transcript, |s| single_line(&s.text))),
        OutputFormat::Timestamped => Ok(render_lines(transcript, |s| {
            format!("[{}] {}", format_timestamp(s.start, '.'), single_line(&s.text))
        })),
        OutputFormat::Srt => Ok(render_srt(transcript)),
        OutputFormat::WebVtt => Ok(render_webvtt(transcript)),
        OutputFormat::Json => serde_json::to_string_pretty(transcript)
            .map(|mut json| {
                json.push('\n');
                json
            })
            .map_err(|e| AppError::Parse(format!("Failed to serialize transcript: {}", e))),
    }
}

fn render_lines<F>(transcript: &Transcript, line: F) -> String
where
    F: Fn(&TranscriptSnippet) -> String,
{
    let mut out = String::new();
    for snippet in transcript {
        out.push_str(&line(snippet));
        out.push('\n');
    }
    out
}

fn render_srt(transcript: &Transcript) -> String {
    let mut out = String::new();
    for (index, cue) in cues(transcript).iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", index + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_timestamp(cue.start, ','),
            format_timestamp(cue.end, ',')
        );
        let _ = writeln!(out, "{}", cue.text);
    }
    out
}

fn render_webvtt(transcript: &Transcript) -> String {
    let mut out = String::from("WEBVTT\n");
    for cue in cues(transcript) {
        let _ = writeln!(
            out,
            "\n{} --> {}\n{}",
            format_timestamp(cue.start, '.'),
            format_timestamp(cue.end, '.'),
            cue.text
        );
    }
    out
}

struct Cue {
    text: String,
    start: f64,
    end: f64,
}

/// Subtitle cues: snippets without text are dropped, and each end is
/// clamped to the next cue's start
fn cues(transcript: &Transcript) -> Vec<Cue> {
    let mut cues: Vec<Cue> = transcript
        .snippets
        .iter()
        .filter_map(|snippet| {
            let text = cue_text(&snippet.text);
            (!text.is_empty()).then(|| Cue {
                text,
                start: snippet.start,
                end: snippet.end(),
            })
        })
        .collect();

    for i in 1..cues.len() {
        let next_start = cues[i].start;
        let cue = &mut cues[i - 1];
        if next_start > cue.start && next_start < cue.end {
            cue.end = next_start;
        }
    }
    cues
}

/// A blank line ends a cue, so cue text keeps only non-blank lines
fn cue_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse embedded line breaks so each snippet stays on one line
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Format seconds as `HH:MM:SS<sep>mmm`
pub fn format_timestamp(seconds: f64, millis_separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        hours, minutes, secs, millis_separator, millis
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(snippets: Vec<TranscriptSnippet>) -> Transcript {
        Transcript {
            video_id: "KhPQtXQpiZc".to_string(),
            language: "English".to_string(),
            language_code: "en".to_string(),
            is_generated: true,
            snippets,
        }
    }

    fn sample() -> Transcript {
        transcript(vec![
            TranscriptSnippet::new("hey there", 0.0, 1.54),
            TranscriptSnippet::new("how are\nyou", 1.54, 4.16),
            TranscriptSnippet::new("bye", 3.0, 2.0),
        ])
    }

    #[test]
    fn test_text_is_one_line_per_snippet() {
        let out = render(&sample(), OutputFormat::Text).unwrap();
        assert_eq!(out, "hey there\nhow are you\nbye\n");
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_timestamped() {
        let out = render(&sample(), OutputFormat::Timestamped).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "[00:00:00.000] hey there");
        assert_eq!(lines[1], "[00:00:01.540] how are you");
    }

    #[test]
    fn test_srt_numbering_and_clamping() {
        let out = render(&sample(), OutputFormat::Srt).unwrap();
        let expected = "1\n00:00:00,000 --> 00:00:01,540\nhey there\n\n\
                        2\n00:00:01,540 --> 00:00:03,000\nhow are\nyou\n\n\
                        3\n00:00:03,000 --> 00:00:05,000\nbye\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_webvtt() {
        let out = render(&sample(), OutputFormat::WebVtt).unwrap();
        assert!(out.starts_with("WEBVTT\n\n00:00:00.000 --> 00:00:01.540\nhey there\n"));
        assert!(out.ends_with("00:00:03.000 --> 00:00:05.000\nbye\n"));
    }

    #[test]
    fn test_cues_skip_empty_text_and_blank_lines() {
        let ragged = transcript(vec![
            TranscriptSnippet::new("  ", 0.0, 1.0),
            TranscriptSnippet::new("a\n\n  b\n", 1.0, 1.0),
            TranscriptSnippet::new("", 2.0, 1.0),
            TranscriptSnippet::new("c", 3.0, 1.0),
        ]);

        let srt = render(&ragged, OutputFormat::Srt).unwrap();
        assert_eq!(
            srt,
            "1\n00:00:01,000 --> 00:00:02,000\na\nb\n\n\
             2\n00:00:03,000 --> 00:00:04,000\nc\n"
        );
        assert!(!srt.contains("\n\n\n"));

        let vtt = render(&ragged, OutputFormat::WebVtt).unwrap();
        assert_eq!(
            vtt,
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\na\nb\n\n\
             00:00:03.000 --> 00:00:04.000\nc\n"
        );

        // Plain text still keeps one line per snippet
        let text = render(&ragged, OutputFormat::Text).unwrap();
        assert_eq!(text, "\na b\n\nc\n");
    }

    #[test]
    fn test_empty_transcript() {
        let empty = transcript(Vec::new());
        assert_eq!(render(&empty, OutputFormat::Text).unwrap(), "");
        assert_eq!(render(&empty, OutputFormat::Srt).unwrap(), "");
        assert_eq!(render(&empty, OutputFormat::WebVtt).unwrap(), "WEBVTT\n");
        let json: serde_json::Value =
            serde_json::from_str(&render(&empty, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["snippets"], serde_json::json!([]));
    }

    #[test]
    fn test_json_keeps_metadata() {
        let json: serde_json::Value =
            serde_json::from_str(&render(&sample(), OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["video_id"], "KhPQtXQpiZc");
        assert_eq!(json["is_generated"], true);
        assert_eq!(json["snippets"][1]["text"], "how are\nyou");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0, ','), "00:00:00,000");
        assert_eq!(format_timestamp(3723.4567, '.'), "01:02:03.457");
        assert_eq!(format_timestamp(-5.0, '.'), "00:00:00.000");
    }

    #[test]
    fn test_parse_format_names() {
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("vtt".parse::<OutputFormat>().unwrap(), OutputFormat::WebVtt);
        assert_eq!("webvtt".parse::<OutputFormat>().unwrap(), OutputFormat::WebVtt);
        assert!("docx".parse::<OutputFormat>().is_err());
        for format in OutputFormat::ALL {
            assert_eq!(format.name().parse::<OutputFormat>().unwrap(), format);
        }
    }
}
