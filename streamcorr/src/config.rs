// streamcorr: Configuration support

use std::time::Duration;

use clap::Parser;

/// Runtime configuration, sourced from CLI flags or their matching environment variables (CLI
/// wins on conflict). Defaults match the configuration surface in the specification.
#[derive(Debug, Clone, Parser)]
#[command(name = "streamcorr", about = "Correlates identities across two upstream streams")]
pub struct Config {
    /// Upstream and sink host.
    #[arg(long, env = "HOST", default_value = "localhost")]
    pub host: String,

    /// Upstream and sink port.
    #[arg(long, env = "PORT", default_value_t = 7299)]
    pub port: u16,

    /// Pending entry age, in seconds, at which it becomes orphaned.
    #[arg(long, env = "ORPHAN_TIMEOUT", default_value_t = 60)]
    pub orphan_timeout_secs: u64,

    /// Cadence, in seconds, of the orphan flusher.
    #[arg(long, env = "FLUSH_INTERVAL", default_value_t = 2)]
    pub flush_interval_secs: u64,

    /// Initial sink retry backoff, in milliseconds.
    #[arg(long, env = "POST_RETRY_DELAY", default_value_t = 200)]
    pub post_retry_delay_ms: u64,

    /// Sink retry attempts per classification.
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Soft cap on the pending table; excess oldest entries are evicted as orphans.
    #[arg(long, env = "MAX_PENDING_SIZE", default_value_t = 10_000)]
    pub max_pending_size: usize,

    /// Max concurrent in-flight sink submissions.
    #[arg(long, env = "SINK_CONCURRENCY", default_value_t = 64)]
    pub sink_concurrency: usize,

    /// Terminal-drain wall-clock cap, in seconds.
    #[arg(long, env = "SHUTDOWN_DEADLINE", default_value_t = 10)]
    pub shutdown_deadline_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7299,
            orphan_timeout_secs: 60,
            flush_interval_secs: 2,
            post_retry_delay_ms: 200,
            max_retries: 3,
            max_pending_size: 10_000,
            sink_concurrency: 64,
            shutdown_deadline_secs: 10,
        }
    }
}

impl Config {
    pub fn source_a_url(&self) -> String {
        format!("http://{}:{}/source/a", self.host, self.port)
    }

    pub fn source_b_url(&self) -> String {
        format!("http://{}:{}/source/b", self.host, self.port)
    }

    pub fn sink_url(&self) -> String {
        format!("http://{}:{}/sink/a", self.host, self.port)
    }

    pub fn orphan_timeout(&self) -> Duration {
        Duration::from_secs(self.orphan_timeout_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn post_retry_delay(&self) -> Duration {
        Duration::from_millis(self.post_retry_delay_ms)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_urls_match_spec_surface() {
        let config = Config::default();
        assert_eq!(config.source_a_url(), "http://localhost:7299/source/a");
        assert_eq!(config.source_b_url(), "http://localhost:7299/source/b");
        assert_eq!(config.sink_url(), "http://localhost:7299/sink/a");
    }
}
