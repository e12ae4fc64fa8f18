// transmission-bench: framing throughput and concurrency benchmark suite
// Tests TCP, UDP and managed backends, prefix widths, exact vs bounded reads
mod concurrency;
mod cpu_monitor;
mod setup;
mod throughput;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use setup::BenchBackend;

#[derive(Parser)]
#[command(name = "transmission-bench")]
#[command(about = "Transmission framing benchmark suite", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run all benchmark cases
    #[arg(short, long)]
    all: bool,

    /// Run specific case (shorthand for 'case' subcommand)
    #[arg(short = 'c', long = "case", value_name = "NAME")]
    case: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run specific benchmark case
    Case {
        /// Case name to run
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List all available benchmark cases
    List,
}

fn print_banner() {
    println!("╔═══════════════════════════════════════════════════════════════════════════╗");
    println!("║                                                                           ║");
    println!("║                 TRANSMISSION FRAMING BENCHMARK SUITE                      ║");
    println!("║                                                                           ║");
    println!("║  Testing: TCP/UDP/managed backends, prefix widths, concurrent writers     ║");
    println!("║                                                                           ║");
    println!("╚═══════════════════════════════════════════════════════════════════════════╝");
}

fn list_cases() {
    println!("\n=== Available Benchmark Cases ===\n");

    println!("THROUGHPUT:");
    println!("  throughput-tcp      - Framed throughput over loopback TCP");
    println!("  throughput-udp      - Framed throughput over loopback UDP (lossy)");
    println!("  throughput-managed  - Framed throughput over an in-process session");
    println!("  throughput-sizes    - Payload sizes 16B to 64KiB over TCP");
    println!("  throughput-widths   - 8/16/32/64-bit length prefixes");
    println!("  read-modes          - Exact vs bounded reads of a raw stream");
    println!("  throughput-all      - Run all throughput tests");
    println!();

    println!("CONCURRENCY:");
    println!("  concurrency-writers - 4 writers sharing one TCP connection");
    println!("  concurrency-readers - 4 readers sharing one managed connection");
    println!("  concurrency-scale   - Writer scalability (1,2,4,8,16 threads)");
    println!("  concurrency-burst   - Burst vs paced writes");
    println!("  concurrency-all     - Run all concurrency tests");
    println!();

    println!("CPU:");
    println!("  cpu-tcp             - TCP throughput with CPU sampling");
    println!();

    println!("COMPREHENSIVE:");
    println!("  quick               - Quick benchmark suite (~10 seconds)");
    println!("  full                - Full benchmark suite (~1 minute)");
    println!();

    println!("Usage:");
    println!("  transmission-bench -a                       # Run all benchmarks");
    println!("  transmission-bench -c throughput-all        # Run all throughput tests");
    println!("  transmission-bench case concurrency-scale   # Run scalability test");
    println!("  transmission-bench list                     # Show this list");
}

fn run_throughput(backend: BenchBackend) -> Result<()> {
    let result = throughput::bench_framed(backend, 100_000, 512, transmission::PrefixWidth::U32)?;
    throughput::print_throughput_results(&[result]);
    Ok(())
}

fn run_throughput_sizes() -> Result<()> {
    let results = throughput::bench_payload_sizes(256 * 1024 * 1024)?;
    throughput::print_throughput_results(&results);
    Ok(())
}

fn run_throughput_widths() -> Result<()> {
    let results = throughput::bench_prefix_widths(100_000)?;
    throughput::print_throughput_results(&results);
    Ok(())
}

fn run_read_modes() -> Result<()> {
    let mut results = throughput::bench_read_modes(64 * 1024 * 1024, 100)?;
    results.extend(throughput::bench_read_modes(64 * 1024 * 1024, 16 * 1024)?);
    throughput::print_throughput_results(&results);
    Ok(())
}

fn run_throughput_all() -> Result<()> {
    println!("\n=== COMPREHENSIVE THROUGHPUT TESTS ===\n");

    let results = throughput::bench_backends(100_000, 512)?;
    throughput::print_throughput_results(&results);

    run_throughput_sizes()?;
    run_throughput_widths()?;
    run_read_modes()
}

fn run_concurrency_writers() -> Result<()> {
    let result = concurrency::bench_concurrent_writers(BenchBackend::Tcp, 4, 25_000)?;
    concurrency::print_concurrency_results(&[result]);
    Ok(())
}

fn run_concurrency_readers() -> Result<()> {
    let result = concurrency::bench_concurrent_readers(4, 100_000)?;
    concurrency::print_concurrency_results(&[result]);
    Ok(())
}

fn run_concurrency_scale() -> Result<()> {
    let results = concurrency::bench_writer_scalability(10_000)?;
    concurrency::print_concurrency_results(&results);
    Ok(())
}

fn run_concurrency_burst() -> Result<()> {
    let results = concurrency::bench_burst_vs_paced(5_000)?;
    concurrency::print_concurrency_results(&results);
    Ok(())
}

fn run_concurrency_all() -> Result<()> {
    println!("\n=== COMPREHENSIVE CONCURRENCY TESTS ===\n");

    let results = vec![
        concurrency::bench_concurrent_writers(BenchBackend::Tcp, 1, 100_000)?,
        concurrency::bench_concurrent_writers(BenchBackend::Tcp, 4, 25_000)?,
        concurrency::bench_concurrent_writers(BenchBackend::Managed, 4, 25_000)?,
        concurrency::bench_concurrent_readers(4, 100_000)?,
    ];
    concurrency::print_concurrency_results(&results);

    run_concurrency_scale()?;
    run_concurrency_burst()
}

fn run_cpu_tcp() -> Result<()> {
    let (result, _stats) = cpu_monitor::run_with_cpu_monitor("tcp throughput", || {
        throughput::bench_framed(BenchBackend::Tcp, 200_000, 512, transmission::PrefixWidth::U32)
    })?;
    throughput::print_throughput_results(&[result?]);
    Ok(())
}

fn run_quick_suite() -> Result<()> {
    println!("\n╔═══════════════════════════════════════════════════════════════════════════╗");
    println!("║                         QUICK BENCHMARK SUITE                             ║");
    println!("║                          (Estimated: 10 seconds)                          ║");
    println!("╚═══════════════════════════════════════════════════════════════════════════╝");

    let results = throughput::bench_backends(20_000, 512)?;
    throughput::print_throughput_results(&results);

    let results = vec![
        concurrency::bench_concurrent_writers(BenchBackend::Tcp, 1, 10_000)?,
        concurrency::bench_concurrent_writers(BenchBackend::Tcp, 4, 2_500)?,
    ];
    concurrency::print_concurrency_results(&results);

    println!("\n✓ Quick benchmark suite completed!");
    Ok(())
}

fn run_full_suite() -> Result<()> {
    println!("\n╔═══════════════════════════════════════════════════════════════════════════╗");
    println!("║                         FULL BENCHMARK SUITE                              ║");
    println!("║                          (Estimated: 1 minute)                            ║");
    println!("╚═══════════════════════════════════════════════════════════════════════════╝");

    run_throughput_all()?;
    println!("\n{}", "─".repeat(79));

    run_concurrency_all()?;
    println!("\n{}", "─".repeat(79));

    run_cpu_tcp()?;

    println!("\n✓ Full benchmark suite completed!");
    Ok(())
}

fn run_case(name: &str) -> Result<()> {
    match name {
        // Throughput
        "throughput-tcp" => run_throughput(BenchBackend::Tcp),
        "throughput-udp" => run_throughput(BenchBackend::Udp),
        "throughput-managed" => run_throughput(BenchBackend::Managed),
        "throughput-sizes" => run_throughput_sizes(),
        "throughput-widths" => run_throughput_widths(),
        "read-modes" => run_read_modes(),
        "throughput-all" => run_throughput_all(),

        // Concurrency
        "concurrency-writers" => run_concurrency_writers(),
        "concurrency-readers" => run_concurrency_readers(),
        "concurrency-scale" => run_concurrency_scale(),
        "concurrency-burst" => run_concurrency_burst(),
        "concurrency-all" => run_concurrency_all(),

        "cpu-tcp" => run_cpu_tcp(),

        // Suites
        "quick" => run_quick_suite(),
        "full" => run_full_suite(),

        _ => bail!(
            "unknown benchmark case '{}'; run 'transmission-bench list' to see available cases",
            name
        ),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    print_banner();

    if cli.all {
        run_full_suite()?;
    } else if let Some(case_name) = cli.case {
        // Handle -c/--case flag
        run_case(&case_name)?;
    } else {
        match cli.command {
            Some(Commands::Case { name }) => run_case(&name)?,
            Some(Commands::List) => list_cases(),
            None => {
                // No arguments provided
                println!("\nNo benchmark specified. Use one of:");
                println!("  transmission-bench -a              # Run all benchmarks");
                println!("  transmission-bench -c <case>       # Run specific case");
                println!("  transmission-bench case <case>     # Run specific case");
                println!("  transmission-bench list            # List available cases");
                println!("  transmission-bench --help          # Show help");
                println!("\nFor a quick start, try: transmission-bench -c quick");
            }
        }
    }
    Ok(())
}
