// Shared helpers for the connection test suites
use std::io::IsTerminal;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use transmission::{managed_pair, Connection, ConnectionConfig};

// test suite "constructor"
#[ctor::ctor]
fn init() {
    if std::io::stderr().is_terminal() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Generous deadline so a broken test fails instead of hanging.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn test_config() -> ConnectionConfig {
    ConnectionConfig::new().with_read_timeout(TEST_TIMEOUT)
}

#[allow(dead_code)]
pub fn short_timeout_config() -> ConnectionConfig {
    ConnectionConfig::new().with_read_timeout(Duration::from_millis(50))
}

#[allow(dead_code)]
pub fn pair() -> (Connection, Connection) {
    managed_pair(test_config()).expect("creating managed pair")
}
