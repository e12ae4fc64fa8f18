// Connection configuration, read from the environment with defaults
//
// TRANSMISSION_READ_TIMEOUT_MS: Per-receive deadline in ms, 0 = none (default: none)
// TRANSMISSION_RECEIVE_CHUNK:   Minimum bytes asked of a stream per receive (default: 4096)
// TRANSMISSION_MAX_FRAME_LEN:   Largest accepted length-prefixed frame (default: unlimited)
// TRANSMISSION_SOCKET_BUFFER:   SO_SNDBUF/SO_RCVBUF for socket backends (default: OS)
use std::env;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;

pub const DEFAULT_RECEIVE_CHUNK: usize = 4096;

const ENV_READ_TIMEOUT_MS: &str = "TRANSMISSION_READ_TIMEOUT_MS";
const ENV_RECEIVE_CHUNK: &str = "TRANSMISSION_RECEIVE_CHUNK";
const ENV_MAX_FRAME_LEN: &str = "TRANSMISSION_MAX_FRAME_LEN";
const ENV_SOCKET_BUFFER: &str = "TRANSMISSION_SOCKET_BUFFER";

// Process-wide defaults, read once on first use
static DEFAULT_CONFIG: Lazy<ConnectionConfig> = Lazy::new(ConnectionConfig::from_env);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Deadline for one backend receive. Without one a read can block forever.
    pub read_timeout: Option<Duration>,
    pub receive_chunk: usize,
    pub max_frame_len: Option<u64>,
    pub socket_buffer_size: Option<usize>,
    /// Attached to every log event of the connection.
    pub label: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            read_timeout: None,
            receive_chunk: DEFAULT_RECEIVE_CHUNK,
            max_frame_len: None,
            socket_buffer_size: None,
            label: None,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let read_timeout = env_parse::<u64>(ENV_READ_TIMEOUT_MS)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let receive_chunk = env_parse::<usize>(ENV_RECEIVE_CHUNK)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RECEIVE_CHUNK);

        ConnectionConfig {
            read_timeout,
            receive_chunk,
            max_frame_len: env_parse(ENV_MAX_FRAME_LEN),
            socket_buffer_size: env_parse::<usize>(ENV_SOCKET_BUFFER).filter(|n| *n > 0),
            label: None,
        }
    }

    /// The environment-derived defaults used by the convenience constructors.
    pub fn global() -> &'static ConnectionConfig {
        &DEFAULT_CONFIG
    }

    /// A zero duration is treated as "no deadline".
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_receive_chunk(mut self, chunk: usize) -> Self {
        self.receive_chunk = chunk.max(1);
        self
    }

    pub fn with_max_frame_len(mut self, max: u64) -> Self {
        self.max_frame_len = Some(max);
        self
    }

    pub fn with_socket_buffer_size(mut self, size: usize) -> Self {
        self.socket_buffer_size = Some(size);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = ConnectionConfig::new()
            .with_read_timeout(Duration::from_millis(250))
            .with_receive_chunk(0)
            .with_max_frame_len(1024)
            .with_socket_buffer_size(65536)
            .with_label("server");

        assert_eq!(config.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.receive_chunk, 1);
        assert_eq!(config.max_frame_len, Some(1024));
        assert_eq!(config.socket_buffer_size, Some(65536));
        assert_eq!(config.label.as_deref(), Some("server"));
    }

    #[test]
    fn zero_timeout_means_none() {
        let config = ConnectionConfig::new().with_read_timeout(Duration::ZERO);
        assert_eq!(config.read_timeout, None);
    }

    #[test]
    fn reads_environment() {
        env::set_var(ENV_READ_TIMEOUT_MS, "1500");
        env::set_var(ENV_RECEIVE_CHUNK, "not a number");
        env::set_var(ENV_MAX_FRAME_LEN, "4096");
        env::remove_var(ENV_SOCKET_BUFFER);

        let config = ConnectionConfig::from_env();

        env::remove_var(ENV_READ_TIMEOUT_MS);
        env::remove_var(ENV_RECEIVE_CHUNK);
        env::remove_var(ENV_MAX_FRAME_LEN);

        assert_eq!(config.read_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.receive_chunk, DEFAULT_RECEIVE_CHUNK);
        assert_eq!(config.max_frame_len, Some(4096));
        assert_eq!(config.socket_buffer_size, None);
    }
}
