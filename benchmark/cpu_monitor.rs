// cpu_monitor.rs - CPU usage sampling while a benchmark runs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use sysinfo::{CpuRefreshKind, Pid, ProcessRefreshKind, RefreshKind, System};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

pub struct CpuStats {
    pub avg_cpu_percent: f32,
    pub peak_cpu_percent: f32,
    pub samples: usize,
}

fn sample_until(pid: Pid, stop: &AtomicBool) -> CpuStats {
    let mut sys = System::new_with_specifics(
        RefreshKind::new()
            .with_cpu(CpuRefreshKind::everything())
            .with_processes(ProcessRefreshKind::everything()),
    );

    // The first reading only establishes a baseline.
    sys.refresh_process(pid);
    thread::sleep(SAMPLE_INTERVAL);

    let mut samples = vec![];
    while !stop.load(Ordering::Relaxed) {
        if sys.refresh_process(pid) {
            if let Some(process) = sys.process(pid) {
                samples.push(process.cpu_usage());
            }
        }
        thread::sleep(SAMPLE_INTERVAL);
    }

    let avg = if !samples.is_empty() {
        samples.iter().sum::<f32>() / samples.len() as f32
    } else {
        0.0
    };

    CpuStats {
        avg_cpu_percent: avg,
        peak_cpu_percent: samples.iter().copied().fold(0.0f32, f32::max),
        samples: samples.len(),
    }
}

/// Run a benchmark while sampling this process's CPU usage.
pub fn run_with_cpu_monitor<F, R>(name: &str, benchmark_fn: F) -> Result<(R, CpuStats)>
where
    F: FnOnce() -> R,
{
    println!("\n=== Running {} with CPU monitoring ===", name);

    let pid = sysinfo::get_current_pid().map_err(|e| anyhow!("current pid: {}", e))?;
    let stop = Arc::new(AtomicBool::new(false));

    let monitor_handle = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || sample_until(pid, &stop))
    };

    let result = benchmark_fn();

    stop.store(true, Ordering::Relaxed);
    let cpu_stats = monitor_handle
        .join()
        .map_err(|_| anyhow!("cpu monitor thread panicked"))?;

    println!(
        "CPU Stats: avg={:.1}%, peak={:.1}%, samples={}",
        cpu_stats.avg_cpu_percent, cpu_stats.peak_cpu_percent, cpu_stats.samples
    );

    Ok((result, cpu_stats))
}
