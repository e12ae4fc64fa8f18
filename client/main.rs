// transmission-send: send framed messages and print the replies
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use transmission::{ConnectionKind, PrefixWidth};
use transmission_client::{format_reply, FrameClient};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Tcp,
    Udp,
}

impl From<Kind> for ConnectionKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Tcp => ConnectionKind::Tcp,
            Kind::Udp => ConnectionKind::Udp,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "transmission-send")]
#[command(about = "Send length-prefixed frames and print the replies", long_about = None)]
struct Args {
    #[arg(short = 'a', long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 3490)]
    port: u16,

    #[arg(short, long, value_enum, default_value_t = Kind::Tcp)]
    kind: Kind,

    /// Width of the length prefix in bits: 8, 16, 32 or 64
    #[arg(short = 'b', long, default_value_t = 32)]
    prefix_bits: u32,

    /// How many times to send the message
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u64,

    /// Seconds to wait for each reply (0 waits forever)
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    message: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let width = PrefixWidth::try_from(args.prefix_bits)?;

    let mut client = FrameClient::connect_with_timeout(
        &args.host,
        args.port,
        args.kind.into(),
        width,
        Duration::from_secs(args.timeout),
    )
    .with_context(|| format!("connecting to {}:{}", args.host, args.port))?;

    eprintln!("Connected to {}:{} ({:?}, {} prefix)", args.host, args.port, args.kind, width);

    for seq in 1..=args.count {
        let reply = client
            .request(args.message.as_bytes())
            .with_context(|| format!("waiting for reply {}", seq))?;
        println!("{}", format_reply(seq, &reply, chrono::Local::now()));
    }

    client.close()?;
    Ok(())
}
