//! tunlab — test-harness supervisor for tunnel-emulation experiments.
//!
//! - Interactive mode: line-oriented command protocol on stdin
//!   (`tunnel`, `prompt`, `halt`)
//! - `--auto-test`: timed RTT benchmark against one channel
//!
//! SIGINT/SIGTERM tear down every registered process group before the
//! process exits non-zero.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing_subscriber::EnvFilter;

use tunlab::autotest::{summary_line, AutoTestConfig, AutoTestRunner};
use tunlab::dispatch::{Dispatcher, Flow};
use tunlab::registry::TunnelRegistry;

/// Test-harness supervisor for tunnel emulators.
#[derive(Parser, Debug)]
#[command(name = "tunlab", about = "Test-harness supervisor for tunnel emulators")]
struct Cli {
    /// Run the automated RTT benchmark instead of the interactive shell.
    #[arg(long, default_value_t = false)]
    auto_test: bool,

    /// Benchmark duration in seconds.
    #[arg(long, default_value_t = 60)]
    duration: u64,

    /// Seconds between synthetic packets.
    #[arg(long, default_value_t = 0.1)]
    interval: f64,

    /// Channel id the benchmark drives.
    #[arg(long, default_value_t = 1)]
    tunnel_id: u32,

    /// Directory receiving the sent/recv/rtt event logs.
    #[arg(long, default_value = "experiment_logs")]
    log_dir: PathBuf,

    /// Upper bound on any single read from a child, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    read_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr; stdout carries only protocol output
    // (readline responses, RTT lines, the summary).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut registry = TunnelRegistry::new(Duration::from_millis(cli.read_timeout_ms));

    let code = if cli.auto_test {
        run_auto_test(&mut registry, &cli).await?
    } else {
        run_interactive(&mut registry).await?
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Interactive dispatcher loop. Returns the process exit code.
async fn run_interactive(registry: &mut TunnelRegistry) -> anyhow::Result<i32> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut dispatcher = Dispatcher::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    emit("tunlab supervisor is running");

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if dispatcher.handle_line(registry, &line).await == Flow::Halt {
                        return Ok(0);
                    }
                }
                Ok(None) => {
                    // stdin closed: same teardown as an explicit halt.
                    tracing::info!("stdin closed, tearing down all tunnel channels");
                    registry.teardown_all().await;
                    return Ok(0);
                }
                Err(e) => {
                    registry.teardown_all().await;
                    return Err(e.into());
                }
            },
            name = caught_signal(&mut sigint, &mut sigterm) => {
                registry.teardown_all().await;
                tracing::error!(signal = name, "caught signal, tore down all tunnel channels");
                return Ok(1);
            }
        }
    }
}

/// Auto-test mode. Returns the process exit code.
async fn run_auto_test(registry: &mut TunnelRegistry, cli: &Cli) -> anyhow::Result<i32> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let config = AutoTestConfig {
        duration: Duration::from_secs(cli.duration),
        interval: Duration::from_secs_f64(cli.interval),
        tunnel_id: cli.tunnel_id,
        log_dir: cli.log_dir.clone(),
    };
    let mut runner = AutoTestRunner::new(config)?;

    let outcome = tokio::select! {
        result = runner.run(registry) => Some(result),
        name = caught_signal(&mut sigint, &mut sigterm) => {
            tracing::error!(signal = name, "caught signal during auto-test");
            None
        }
    };

    registry.teardown_all().await;
    match outcome {
        Some(result) => {
            // A spawn failure in auto mode aborts the run.
            let report = result?;
            emit(&summary_line(&report));
            Ok(0)
        }
        None => Ok(1),
    }
}

/// Resolves when either termination signal arrives, yielding its name.
async fn caught_signal(sigint: &mut Signal, sigterm: &mut Signal) -> &'static str {
    tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

fn emit(line: &str) {
    let mut out = std::io::stdout();
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}
