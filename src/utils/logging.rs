use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor a level is given
pub const DEFAULT_FILTER: &str = "transcript_harvester=info";

/// Build the filter directive for a configured level plus `-v` count.
///
/// Each verbosity step raises the level by one, saturating at `trace`.
pub fn filter_directive(level: &str, verbosity: u8) -> String {
    const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    let base = LEVELS.iter().position(|l| *l == level).unwrap_or(2);
    let index = (base + verbosity as usize).min(LEVELS.len() - 1);
    format!("transcript_harvester={}", LEVELS[index])
}

/// Initialise the global subscriber. `RUST_LOG` wins over `directive`.
pub fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| directive.into());

    // Repeated initialisation (tests, embedding) is not an error
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
