// throughput.rs - Benchmark framed write/read throughput per backend
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use transmission::PrefixWidth;

use crate::setup::{connection_pair, BenchBackend};

pub struct ThroughputResult {
    pub test_name: String,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes: u64,
    pub duration: Duration,
}

impl ThroughputResult {
    pub fn frames_per_sec(&self) -> f64 {
        self.frames_received as f64 / self.duration.as_secs_f64()
    }

    pub fn mib_per_sec(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0) / self.duration.as_secs_f64()
    }

    pub fn lost(&self) -> u64 {
        self.frames_sent - self.frames_received
    }
}

/// One writer thread, one reader thread, `frames` frames of `payload_len`.
pub fn bench_framed(
    backend: BenchBackend,
    frames: u64,
    payload_len: usize,
    width: PrefixWidth,
) -> Result<ThroughputResult> {
    println!(
        "\n=== Benchmarking {} framing: {} x {}B, {} prefix ===",
        backend, frames, payload_len, width
    );

    let (sender, receiver) = connection_pair(backend)?;
    let payload = vec![0xA5u8; payload_len];

    let start = Instant::now();
    let writer = thread::spawn(move || -> transmission::Result<()> {
        for _ in 0..frames {
            sender.write_with_length_prefix(&payload, width)?;
        }
        Ok(())
    });

    let mut received = 0u64;
    let mut bytes = 0u64;
    while received < frames {
        match receiver.read_with_length_prefix(width) {
            Ok(frame) => {
                received += 1;
                bytes += frame.len() as u64;
            }
            // Remaining datagrams were dropped.
            Err(e) if backend.is_lossy() && e.is_timeout() => break,
            Err(e) => return Err(e.into()),
        }
    }
    let duration = start.elapsed();

    writer
        .join()
        .map_err(|_| anyhow!("writer thread panicked"))??;

    Ok(ThroughputResult {
        test_name: format!("{} {}B/{}", backend, payload_len, width),
        frames_sent: frames,
        frames_received: received,
        bytes,
        duration,
    })
}

/// Same workload over every backend.
pub fn bench_backends(frames: u64, payload_len: usize) -> Result<Vec<ThroughputResult>> {
    BenchBackend::ALL
        .iter()
        .map(|backend| bench_framed(*backend, frames, payload_len, PrefixWidth::U32))
        .collect()
}

/// Payload sizes from tiny to large over TCP.
pub fn bench_payload_sizes(total_bytes: u64) -> Result<Vec<ThroughputResult>> {
    [16usize, 256, 4096, 65_536]
        .iter()
        .map(|len| bench_framed(BenchBackend::Tcp, (total_bytes / *len as u64).max(1), *len, PrefixWidth::U32))
        .collect()
}

/// Every prefix width with a payload each can describe.
pub fn bench_prefix_widths(frames: u64) -> Result<Vec<ThroughputResult>> {
    PrefixWidth::ALL
        .iter()
        .map(|width| bench_framed(BenchBackend::Tcp, frames, 200, *width))
        .collect()
}

/// Pull a raw byte stream with exact reads versus bounded reads.
pub fn bench_read_modes(total_bytes: usize, read_size: usize) -> Result<Vec<ThroughputResult>> {
    println!(
        "\n=== Benchmarking exact vs bounded reads: {} bytes, {}B reads ===",
        total_bytes, read_size
    );

    let mut results = vec![];
    for exact in [true, false] {
        let (sender, receiver) = connection_pair(BenchBackend::Tcp)?;
        let chunk = vec![0x5Au8; 64 * 1024];

        let start = Instant::now();
        let writer = thread::spawn(move || -> transmission::Result<()> {
            let mut left = total_bytes;
            while left > 0 {
                let n = left.min(chunk.len());
                sender.write(&chunk[..n])?;
                left -= n;
            }
            Ok(())
        });

        let mut bytes = 0usize;
        let mut reads = 0u64;
        while bytes < total_bytes {
            let want = read_size.min(total_bytes - bytes);
            let data = if exact {
                receiver.read_exact(want)?
            } else {
                receiver.read_up_to(want)?
            };
            bytes += data.len();
            reads += 1;
        }
        let duration = start.elapsed();
        writer
            .join()
            .map_err(|_| anyhow!("writer thread panicked"))??;

        results.push(ThroughputResult {
            test_name: format!("{} read {}B", if exact { "exact" } else { "bounded" }, read_size),
            frames_sent: reads,
            frames_received: reads,
            bytes: bytes as u64,
            duration,
        });
    }
    Ok(results)
}

pub fn print_throughput_results(results: &[ThroughputResult]) {
    println!("\n╔═══════════════════════════════════════════════════════════════════════════════╗");
    println!("║                      THROUGHPUT BENCHMARK RESULTS                             ║");
    println!("╠═══════════════════════════════════════════════════════════════════════════════╣");
    println!("║ Test Name            │ Duration │    Frames │   Frames/s │    MiB/s │    Lost ║");
    println!("╠═══════════════════════════════════════════════════════════════════════════════╣");

    for result in results {
        println!(
            "║ {:<20} │ {:>6.2}s │ {:>9} │ {:>10.0} │ {:>8.1} │ {:>7} ║",
            result.test_name,
            result.duration.as_secs_f64(),
            result.frames_received,
            result.frames_per_sec(),
            result.mib_per_sec(),
            result.lost()
        );
    }

    println!("╚═══════════════════════════════════════════════════════════════════════════════╝");

    if let Some(best) = results
        .iter()
        .max_by(|a, b| a.mib_per_sec().total_cmp(&b.mib_per_sec()))
    {
        println!("\nHighest bandwidth: {} ({:.1} MiB/s)", best.test_name, best.mib_per_sec());
    }
}
