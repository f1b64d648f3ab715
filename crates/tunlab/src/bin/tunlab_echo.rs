//! Fallback acknowledgment responder for the auto-test.
//!
//! Reads one command line at a time and answers each with a single
//! `ack` line, optionally after a fixed turnaround delay. Exits cleanly
//! when its stdin closes.

use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Line-oriented ack responder.
#[derive(Parser, Debug)]
#[command(name = "tunlab-echo", about = "Line-oriented ack responder")]
struct Cli {
    /// Fixed turnaround latency applied before each ack, in milliseconds.
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let latency = Duration::from_millis(cli.latency_ms);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(_line) = lines.next_line().await? {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        stdout.write_all(b"ack\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}
