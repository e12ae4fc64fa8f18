// transmission-echod: frame echo server over TCP, UDP or a Unix socket
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use transmission::{
    Connection, ConnectionConfig, ConnectionKind, Listener, PrefixWidth, TransmissionError,
};

const DEFAULT_PORT: u16 = 3490;
const DEFAULT_SOCKET: &str = "/tmp/transmission-echod.sock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Tcp,
    Udp,
    Unix,
}

#[derive(Parser, Debug)]
#[command(name = "transmission-echod")]
#[command(about = "Echo length-prefixed frames back to their sender", long_about = None)]
struct Args {
    /// Port to listen on (tcp and udp)
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind (tcp and udp)
    #[arg(short, long, default_value = "0.0.0.0")]
    address: String,

    #[arg(short, long, value_enum, default_value_t = Kind::Tcp)]
    kind: Kind,

    /// Socket path (unix)
    #[arg(long, default_value = DEFAULT_SOCKET)]
    path: PathBuf,

    /// Width of the length prefix in bits: 8, 16, 32 or 64
    #[arg(short = 'b', long, default_value_t = 32)]
    prefix_bits: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let width = PrefixWidth::try_from(args.prefix_bits)?;
    let config = ConnectionConfig::global().clone().with_label("echod");

    let listener = match args.kind {
        Kind::Tcp => Listener::bind_with((args.address.as_str(), args.port), ConnectionKind::Tcp, config),
        Kind::Udp => Listener::bind_with((args.address.as_str(), args.port), ConnectionKind::Udp, config),
        Kind::Unix => Listener::bind_unix(&args.path, config),
    }
    .with_context(|| format!("binding {:?} listener", args.kind))?;

    info!(kind = ?args.kind, addr = ?listener.local_addr(), prefix = %width, "echo server ready");

    // A datagram listener yields a single connection that serves every peer.
    if args.kind == Kind::Udp {
        let connection = listener.accept().context("opening datagram connection")?;
        serve(&connection, width);
        return Ok(());
    }

    loop {
        match listener.accept() {
            Ok(connection) => {
                thread::spawn(move || serve(&connection, width));
            }
            Err(TransmissionError::Closed) => break,
            Err(e) => warn!(error = %e, "accept failed"),
        }
    }
    Ok(())
}

fn serve(connection: &Connection, width: PrefixWidth) {
    let id = connection.identifier();
    let mut frames = 0u64;

    loop {
        let frame = match connection.read_with_length_prefix(width) {
            Ok(frame) => frame,
            Err(e) if e.is_terminal() => break,
            Err(e) if e.is_timeout() => continue,
            Err(e) => {
                error!(connection = id, error = %e, "read failed");
                break;
            }
        };

        if let Err(e) = connection.write_with_length_prefix(&frame, width) {
            error!(connection = id, error = %e, "echo failed");
            break;
        }
        frames += 1;
    }

    info!(connection = id, frames, "connection finished");
    let _ = connection.close();
}
