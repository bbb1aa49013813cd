mod report;
mod scenarios;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "stress", about = "Contention scenarios for the taglock primitives")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Hammer a plain counter from many threads and verify no lost updates.
    Exclusion {
        /// Worker threads; 0 means one per CPU.
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Increments performed by each worker.
        #[arg(short, long, default_value = "200000")]
        iterations: u64,

        /// Use the owner-tracking mode instead of the anonymous mode.
        #[arg(long)]
        tracked: bool,
    },
    /// Let waiters time out against a held lock and verify bounded waits.
    Timeout {
        /// Threads waiting on the held lock.
        #[arg(short, long, default_value = "8")]
        waiters: usize,

        /// How long the holder keeps the lock, in milliseconds.
        #[arg(long, default_value = "400")]
        hold_ms: u64,

        /// Per-waiter acquisition budget, in milliseconds.
        #[arg(long, default_value = "100")]
        timeout_ms: u64,
    },
    /// Measure acquire/release throughput.
    Throughput {
        /// Worker threads; 0 means one per CPU.
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Measurement window, in milliseconds.
        #[arg(short, long, default_value = "2000")]
        duration_ms: u64,

        /// Use the owner-tracking mode instead of the anonymous mode.
        #[arg(long)]
        tracked: bool,
    },
}

fn resolve_threads(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Exclusion {
            threads,
            iterations,
            tracked,
        } => {
            if iterations == 0 {
                bail!("iterations must be positive");
            }
            scenarios::exclusion(resolve_threads(threads), iterations, tracked)
        }
        Command::Timeout {
            waiters,
            hold_ms,
            timeout_ms,
        } => {
            if waiters == 0 {
                bail!("waiters must be positive");
            }
            if timeout_ms >= hold_ms {
                bail!("timeout-ms must be below hold-ms, otherwise waiters may acquire the lock");
            }
            scenarios::timeout(waiters, hold_ms, timeout_ms)
        }
        Command::Throughput {
            threads,
            duration_ms,
            tracked,
        } => {
            if duration_ms == 0 {
                bail!("duration-ms must be positive");
            }
            scenarios::throughput(resolve_threads(threads), duration_ms, tracked)
        }
    }
}
