// concurrency.rs - Benchmark concurrent writers and readers sharing one connection
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use transmission::PrefixWidth;

use crate::setup::{connection_pair, BenchBackend};

pub struct ConcurrencyResult {
    pub test_name: String,
    pub num_threads: usize,
    pub duration: Duration,
    pub total_frames: u64,
    pub throughput: f64,
    /// Frames whose bytes came from more than one writer.
    pub corrupt_frames: u64,
}

// Every byte of a frame carries the writer's tag.
fn tagged_frame(tag: u8, seq: usize) -> Vec<u8> {
    vec![tag; 16 + (seq * 31) % 480]
}

/// `num_threads` writers share one sender; one reader checks every frame.
pub fn bench_concurrent_writers(
    backend: BenchBackend,
    num_threads: usize,
    frames_per_thread: usize,
) -> Result<ConcurrencyResult> {
    println!(
        "\n=== Benchmarking {} Writers on one {} connection ===",
        num_threads, backend
    );

    let (sender, receiver) = connection_pair(backend)?;
    let sender = Arc::new(sender);

    let start = Instant::now();
    let mut handles = vec![];
    for thread_id in 0..num_threads {
        let sender = Arc::clone(&sender);

        handles.push(thread::spawn(move || -> transmission::Result<()> {
            let tag = (thread_id % 256) as u8;
            for seq in 0..frames_per_thread {
                sender.write_with_length_prefix(&tagged_frame(tag, seq), PrefixWidth::U16)?;
            }
            Ok(())
        }));
    }

    let expected = (num_threads * frames_per_thread) as u64;
    let mut total = 0u64;
    let mut corrupt = 0u64;
    while total < expected {
        match receiver.read_with_length_prefix(PrefixWidth::U16) {
            Ok(frame) => {
                total += 1;
                if frame.iter().any(|b| *b != frame[0]) {
                    corrupt += 1;
                }
            }
            Err(e) if backend.is_lossy() && e.is_timeout() => break,
            Err(e) => return Err(e.into()),
        }
    }
    let duration = start.elapsed();

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow!("writer thread panicked"))??;
    }

    Ok(ConcurrencyResult {
        test_name: format!("{} x{} writers", backend, num_threads),
        num_threads,
        duration,
        total_frames: total,
        throughput: total as f64 / duration.as_secs_f64(),
        corrupt_frames: corrupt,
    })
}

/// Writer scalability: 1, 2, 4, 8, 16 threads
pub fn bench_writer_scalability(frames_per_thread: usize) -> Result<Vec<ConcurrencyResult>> {
    println!("\n=== Benchmarking Writer Scalability ===");

    let mut results = vec![];
    for num_threads in [1, 2, 4, 8, 16] {
        results.push(bench_concurrent_writers(BenchBackend::Tcp, num_threads, frames_per_thread)?);

        // Small delay between tests
        thread::sleep(Duration::from_millis(200));
    }
    Ok(results)
}

/// `num_threads` readers share one receiver; frames must arrive whole.
pub fn bench_concurrent_readers(num_threads: usize, frames: usize) -> Result<ConcurrencyResult> {
    println!("\n=== Benchmarking {} Readers on one managed connection ===", num_threads);

    let (sender, receiver) = connection_pair(BenchBackend::Managed)?;
    let receiver = Arc::new(receiver);
    let remaining = Arc::new(AtomicU64::new(frames as u64));
    let corrupt = Arc::new(AtomicU64::new(0));

    let start = Instant::now();
    let mut handles = vec![];
    for _ in 0..num_threads {
        let receiver = Arc::clone(&receiver);
        let remaining = Arc::clone(&remaining);
        let corrupt = Arc::clone(&corrupt);

        handles.push(thread::spawn(move || -> transmission::Result<()> {
            // Claim a frame before reading it so no reader waits for one
            // that will never come.
            while remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok()
            {
                let frame = receiver.read_with_length_prefix(PrefixWidth::U16)?;
                if frame.iter().any(|b| *b != frame[0]) {
                    corrupt.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(())
        }));
    }

    // Header and payload as separate writes, so readers race for the halves.
    for seq in 0..frames {
        let frame = tagged_frame((seq % 256) as u8, seq);
        sender.write(&(frame.len() as u16).to_be_bytes())?;
        sender.write(&frame)?;
    }

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow!("reader thread panicked"))??;
    }
    let duration = start.elapsed();

    Ok(ConcurrencyResult {
        test_name: format!("managed x{} readers", num_threads),
        num_threads,
        duration,
        total_frames: frames as u64,
        throughput: frames as f64 / duration.as_secs_f64(),
        corrupt_frames: corrupt.load(Ordering::Relaxed),
    })
}

/// Burst vs paced writes over TCP
pub fn bench_burst_vs_paced(frames: usize) -> Result<Vec<ConcurrencyResult>> {
    println!("\n=== Benchmarking Burst vs Paced Load ===");

    let mut results = vec![];
    for pace in [None, Some(Duration::from_micros(200))] {
        let (sender, receiver) = connection_pair(BenchBackend::Tcp)?;

        let start = Instant::now();
        let writer = thread::spawn(move || -> transmission::Result<()> {
            for seq in 0..frames {
                sender.write_with_length_prefix(&tagged_frame(1, seq), PrefixWidth::U32)?;
                if let Some(pace) = pace {
                    thread::sleep(pace);
                }
            }
            Ok(())
        });

        let mut corrupt = 0u64;
        for _ in 0..frames {
            let frame = receiver.read_with_length_prefix(PrefixWidth::U32)?;
            if frame.iter().any(|b| *b != 1) {
                corrupt += 1;
            }
        }
        let duration = start.elapsed();
        writer
            .join()
            .map_err(|_| anyhow!("writer thread panicked"))??;

        results.push(ConcurrencyResult {
            test_name: match pace {
                None => format!("Burst ({} frames)", frames),
                Some(p) => format!("Paced ({}us gap)", p.as_micros()),
            },
            num_threads: 1,
            duration,
            total_frames: frames as u64,
            throughput: frames as f64 / duration.as_secs_f64(),
            corrupt_frames: corrupt,
        });
    }
    Ok(results)
}

pub fn print_concurrency_results(results: &[ConcurrencyResult]) {
    println!("\n╔═══════════════════════════════════════════════════════════════════════════════╗");
    println!("║                    CONCURRENCY BENCHMARK RESULTS                              ║");
    println!("╠═══════════════════════════════════════════════════════════════════════════════╣");
    println!("║ Test Name            │ Threads │ Duration │   Frames │ Throughput │ Corrupt ║");
    println!("╠═══════════════════════════════════════════════════════════════════════════════╣");

    for result in results {
        println!(
            "║ {:<20} │ {:>7} │ {:>6.2}s │ {:>8} │ {:>8.0} /s │ {:>7} ║",
            result.test_name,
            result.num_threads,
            result.duration.as_secs_f64(),
            result.total_frames,
            result.throughput,
            result.corrupt_frames
        );
    }

    println!("╚═══════════════════════════════════════════════════════════════════════════════╝");

    // Calculate scalability efficiency
    if results.len() > 1 {
        println!("\n=== Scalability Analysis ===");
        if let Some(baseline) = results.first() {
            for result in results.iter().skip(1) {
                let speedup = result.throughput / baseline.throughput;
                println!("  {}: {:.2}x of {}", result.test_name, speedup, baseline.test_name);
            }
        }
    }

    let corrupt: u64 = results.iter().map(|r| r.corrupt_frames).sum();
    if corrupt > 0 {
        println!("\n!! {} frames mixed bytes from different writers", corrupt);
    } else {
        println!("\nAll frames arrived intact");
    }
}
