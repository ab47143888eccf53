//! Network utilities and helpers

use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Get user agent string
pub fn get_user_agent() -> &'static str {
    concat!("TranscriptHarvester/", env!("CARGO_PKG_VERSION"))
}

/// Build the shared HTTP client used for API calls
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(get_user_agent())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_version() {
        assert!(get_user_agent().starts_with("TranscriptHarvester/"));
        assert!(get_user_agent().ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(DEFAULT_TIMEOUT).is_ok());
    }
}
