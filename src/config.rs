use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the dashboard host
///
/// Holds the remote API location, the two poll intervals, the video retry
/// backoff and the export directory. Defaults assume a local detection
/// backend on port 8000, with the status polled every second and the roster
/// every three seconds.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote detection API
    pub api_base_url: String,

    /// Address the dashboard host binds to
    pub bind_addr: String,

    /// Interval between `/stream_status` polls
    pub status_poll_interval: Duration,

    /// Interval between `/who-sleeping` polls
    pub roster_poll_interval: Duration,

    /// Delay before re-pointing the video source after a load error
    pub video_retry_backoff: Duration,

    /// Directory CSV exports are written into
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: "http://localhost:8000".to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            status_poll_interval: Duration::from_secs(1),
            roster_poll_interval: Duration::from_secs(3),
            video_retry_backoff: Duration::from_millis(1500),
            export_dir: PathBuf::from("exports"),
        }
    }
}

impl Config {
    /// Build a configuration from environment variables, falling back to the
    /// defaults for anything unset
    ///
    /// Recognised variables: `SLEEPWATCH_API_URL`, `SLEEPWATCH_BIND`,
    /// `SLEEPWATCH_EXPORT_DIR`.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(url) = env::var("SLEEPWATCH_API_URL") {
            config.api_base_url = url;
        }
        if let Ok(addr) = env::var("SLEEPWATCH_BIND") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = env::var("SLEEPWATCH_EXPORT_DIR") {
            config.export_dir = PathBuf::from(dir);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_deployment() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.status_poll_interval, Duration::from_secs(1));
        assert_eq!(config.roster_poll_interval, Duration::from_secs(3));
        assert_eq!(config.video_retry_backoff, Duration::from_millis(1500));
    }
}
