// client: request/reply helper over a framed connection, for senders, probes, etc.
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Local};
use tracing::debug;
use transmission::{Connection, ConnectionConfig, ConnectionKind, PrefixWidth, Result};

/// Sends length-prefixed frames and reads the peer's framed replies.
pub struct FrameClient {
    connection: Connection,
    width: PrefixWidth,
    sent: u64,
}

impl FrameClient {
    pub fn connect(host: &str, port: u16, kind: ConnectionKind, width: PrefixWidth) -> Result<Self> {
        let config = ConnectionConfig::global().clone().with_label("client");
        let connection = Connection::connect_with(host, port, kind, config)?;
        Ok(Self::from_connection(connection, width))
    }

    /// Like `connect`, but a reply that takes longer than `timeout` fails.
    pub fn connect_with_timeout(
        host: &str,
        port: u16,
        kind: ConnectionKind,
        width: PrefixWidth,
        timeout: Duration,
    ) -> Result<Self> {
        let config = ConnectionConfig::global()
            .clone()
            .with_label("client")
            .with_read_timeout(timeout);
        let connection = Connection::connect_with(host, port, kind, config)?;
        Ok(Self::from_connection(connection, width))
    }

    pub fn from_connection(connection: Connection, width: PrefixWidth) -> Self {
        FrameClient {
            connection,
            width,
            sent: 0,
        }
    }

    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.connection.write_with_length_prefix(payload, self.width)?;
        self.sent += 1;
        debug!(seq = self.sent, bytes = payload.len(), "frame sent");
        Ok(())
    }

    pub fn receive(&mut self) -> Result<Bytes> {
        self.connection.read_with_length_prefix(self.width)
    }

    /// Send one frame and wait for the next frame back.
    pub fn request(&mut self, payload: &[u8]) -> Result<Bytes> {
        self.send(payload)?;
        self.receive()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn close(&self) -> Result<()> {
        self.connection.close()
    }
}

/// One line per reply: local time, sequence number, size and the payload
/// (as text when it is valid UTF-8, hex otherwise).
pub fn format_reply(seq: u64, payload: &[u8], at: DateTime<Local>) -> String {
    let date_str = at.format("%Y/%m/%d %H:%M:%S%.6f").to_string();
    let body = match std::str::from_utf8(payload) {
        Ok(text) => format!("\"{}\"", text.escape_debug()),
        Err(_) => payload.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" "),
    };
    format!("{} {:>6} {:>8}B {}", date_str, seq, payload.len(), body)
}
