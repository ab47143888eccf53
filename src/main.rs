use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use transcript_harvester::core::config::parse_language_list;
use transcript_harvester::core::input::read_video_list;
use transcript_harvester::utils::logging::{filter_directive, init_tracing};
use transcript_harvester::{
    AppConfig, HarvestSummary, OutputFormat, TranscriptHarvester, NAME, VERSION,
};

/// Fetch YouTube transcripts and write them to files
#[derive(Debug, Parser)]
#[command(name = "transcript-harvester", version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use this config file instead of the platform default
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch one video's transcript
    Fetch {
        /// Video id or YouTube URL
        video: String,

        /// Output file (default: <output dir>/<id>.<ext>)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Fetch transcripts for many videos through the queue
    Batch {
        /// Video ids or URLs
        videos: Vec<String>,

        /// Read videos from a CSV or one-per-line file
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Output directory
        #[arg(short = 'd', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Concurrent fetches
        #[arg(short = 'j', long, value_name = "N")]
        jobs: Option<usize>,

        /// Process at most N videos
        #[arg(long, value_name = "N")]
        max: Option<usize>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Inspect or reset the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Comma separated language codes in order of preference
    #[arg(short, long, value_name = "LANGS")]
    languages: Option<String>,

    /// text, timestamped, srt, webvtt or json
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Keep inline formatting tags in caption text
    #[arg(long)]
    preserve_formatting: bool,

    /// Replace existing transcript files
    #[arg(long)]
    overwrite: bool,

    /// Also write video metadata (needs YOUTUBE_API_KEY)
    #[arg(long)]
    metadata: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Overwrite the config file with defaults
    Reset,
    /// Check the configuration and report problems
    Validate,
}

impl CommonArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(languages) = &self.languages {
            config.fetch.languages = parse_language_list(languages);
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.preserve_formatting {
            config.fetch.preserve_formatting = true;
        }
        if self.overwrite {
            config.output.overwrite = true;
        }
        if self.metadata {
            config.metadata.enabled = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::get_config_path()?,
    };

    match cli.command {
        Command::Config { action } => run_config(&action, &config_path),
        Command::Fetch {
            video,
            output,
            common,
        } => {
            let (mut config, created) = load_config(&config_path)?;
            common.apply(&mut config);
            start(&config, cli.verbose, &config_path, created)?;

            let harvester = TranscriptHarvester::from_config(&config)?;
            let outcome = harvester.fetch_to_file(&video, output).await?;
            println!(
                "{}: {} snippets ({}{}) -> {}",
                outcome.video_id,
                outcome.snippet_count,
                outcome.language_code,
                if outcome.is_generated { ", generated" } else { "" },
                outcome.path.display()
            );
            if let Some(path) = outcome.metadata_path {
                println!("metadata -> {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Batch {
            videos,
            input,
            output_dir,
            jobs,
            max,
            common,
        } => {
            let (mut config, created) = load_config(&config_path)?;
            common.apply(&mut config);
            if let Some(dir) = output_dir {
                config.output.directory = dir;
            }
            if let Some(jobs) = jobs {
                config.fetch.concurrent_fetches = jobs;
            }
            if max.is_some() {
                config.queue.burst_max = max;
            }
            start(&config, cli.verbose, &config_path, created)?;

            let mut inputs = videos;
            let mut unreadable = 0;
            if let Some(path) = input {
                let list = read_video_list(&path)
                    .with_context(|| format!("Failed to read video list {}", path.display()))?;
                for rejected in &list.stats.rejected {
                    warn!(
                        "{}:{}: not a video id or URL: {}",
                        path.display(),
                        rejected.line,
                        rejected.value
                    );
                }
                unreadable += list.stats.rejected.len();
                inputs.extend(list.video_ids);
            }
            if inputs.is_empty() {
                anyhow::bail!("No videos given; pass ids or URLs, or --input FILE");
            }

            let harvester = TranscriptHarvester::from_config(&config)?;
            let (accepted, rejected) = harvester.enqueue(&inputs);
            unreadable += rejected.len();
            info!(
                accepted = accepted.len(),
                rejected = unreadable,
                "Queued videos"
            );

            let summary = harvester.run_queue(config.queue.burst_max).await;
            println!(
                "{} attempted, {} completed, {} skipped, {} failed ({} snippets, {} ms)",
                summary.attempted,
                summary.completed,
                summary.skipped,
                summary.failed,
                summary.snippets,
                summary.elapsed_ms
            );
            if summary.deferred > 0 {
                println!(
                    "{} videos deferred while YouTube kept failing; run again later",
                    summary.deferred
                );
            }
            let left = harvester.queue().pending_count().saturating_sub(summary.deferred);
            if left > 0 {
                println!("{} videos left over the burst limit", left);
            }
            if unreadable > 0 {
                println!("{} inputs were not video ids or URLs", unreadable);
            }

            if batch_succeeded(&summary, unreadable) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// A batch fails when any item failed or was deferred, or any input was
/// not a video
fn batch_succeeded(summary: &HarvestSummary, unreadable_inputs: usize) -> bool {
    !summary.has_failures() && summary.deferred == 0 && unreadable_inputs == 0
}

/// Stored configuration with environment overrides applied, and whether the
/// file was just created
fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    let (mut config, created) = AppConfig::load_or_create(path)?;
    config.apply_env_overrides();
    Ok((config, created))
}

/// Validate the final configuration and bring up logging
fn start(config: &AppConfig, verbose: u8, config_path: &Path, created: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    init_tracing(&filter_directive(&config.advanced.log_level, verbose));
    info!("{} v{} starting", NAME, VERSION);
    if created {
        info!("Created default configuration at {}", config_path.display());
    }
    Ok(())
}

fn run_config(action: &ConfigAction, path: &Path) -> Result<ExitCode> {
    match action {
        ConfigAction::Show => {
            let (mut config, _) = load_config(path)?;
            // The key itself stays out of the printed config
            if config.metadata.api_key.is_some() {
                config.metadata.api_key = Some("<set>".to_string());
            }
            println!("{}", config.export()?);
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Reset => {
            AppConfig::reset_at(path)?;
            println!("Reset {}", path.display());
        }
        ConfigAction::Validate => {
            load_config(path)?.0.validate()?;
            println!("Configuration OK");
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_exit_status() {
        let clean = HarvestSummary {
            attempted: 2,
            completed: 1,
            skipped: 1,
            ..Default::default()
        };
        assert!(batch_succeeded(&clean, 0));

        // A bad line in the input file fails the batch even if every
        // queued video went through
        assert!(!batch_succeeded(&clean, 1));

        let failed = HarvestSummary {
            failed: 1,
            ..clean.clone()
        };
        assert!(!batch_succeeded(&failed, 0));

        let deferred = HarvestSummary {
            deferred: 3,
            ..clean
        };
        assert!(!batch_succeeded(&deferred, 0));
    }

    #[test]
    fn test_cli_parses_batch_flags() {
        let cli = Cli::try_parse_from([
            "transcript-harvester",
            "-vv",
            "batch",
            "KhPQtXQpiZc",
            "-i",
            "videos.csv",
            "-j",
            "4",
            "--max",
            "10",
            "-f",
            "srt",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Batch {
                videos,
                input,
                jobs,
                max,
                common,
                ..
            } => {
                assert_eq!(videos, vec!["KhPQtXQpiZc"]);
                assert_eq!(input, Some(PathBuf::from("videos.csv")));
                assert_eq!(jobs, Some(4));
                assert_eq!(max, Some(10));
                assert_eq!(common.format, Some(OutputFormat::Srt));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
