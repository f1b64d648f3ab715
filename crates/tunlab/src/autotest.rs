//! Automated RTT benchmark against one tunnel channel.
//!
//! Sends a synthetic packet command on a fixed interval, timestamps the
//! send and the acknowledgment, and appends the sent/recv/RTT event
//! logs. When no channel exists under the benchmark id, a fallback echo
//! responder is launched so the run always has a peer.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::HarnessError;
use crate::eventlog::{unix_now, EventLogs};
use crate::registry::TunnelRegistry;

/// Command written to the channel for each synthetic packet.
const SEND_PACKET: &str = "send_packet";

/// Environment override for locating the fallback echo responder.
pub const ECHO_BIN_ENV: &str = "TUNLAB_ECHO_BIN";

/// Delay after spawning the fallback responder before measuring starts.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct AutoTestConfig {
    pub duration: Duration,
    pub interval: Duration,
    pub tunnel_id: u32,
    pub log_dir: PathBuf,
}

/// Totals reported after a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoTestReport {
    pub sent: u64,
    pub acked: u64,
    /// Mean of all recorded RTTs, in milliseconds. `None` when nothing
    /// was acknowledged.
    pub mean_rtt_ms: Option<f64>,
}

pub struct AutoTestRunner {
    config: AutoTestConfig,
    logs: EventLogs,
}

impl AutoTestRunner {
    /// Open the event logs and prepare a runner. Fails if the log
    /// directory cannot be created or opened.
    pub fn new(config: AutoTestConfig) -> std::io::Result<Self> {
        let logs = EventLogs::open(&config.log_dir)?;
        Ok(Self { config, logs })
    }

    /// Ensure a channel exists under the benchmark id, launching the
    /// fallback echo responder when none does.
    async fn ensure_peer(&self, registry: &mut TunnelRegistry) -> Result<(), HarnessError> {
        let id = self.config.tunnel_id;
        if registry.contains(id) {
            return Ok(());
        }
        let echo_bin =
            std::env::var(ECHO_BIN_ENV).unwrap_or_else(|_| "tunlab-echo".to_string());
        tracing::warn!(
            id,
            bin = %echo_bin,
            "no channel under benchmark id, launching fallback echo responder"
        );
        registry.spawn(id, &[echo_bin]).await?;
        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(())
    }

    /// Run the timed send/ack loop and return the totals.
    ///
    /// A write failure aborts the loop; a missing or late acknowledgment
    /// only skips that packet's RTT record.
    pub async fn run(&mut self, registry: &mut TunnelRegistry) -> Result<AutoTestReport, HarnessError> {
        self.ensure_peer(registry).await?;

        let id = self.config.tunnel_id;
        emit(&format!(
            "Starting auto-test for {} seconds, sending a packet every {:.2} seconds...",
            self.config.duration.as_secs(),
            self.config.interval.as_secs_f64(),
        ));

        let end = Instant::now() + self.config.duration;
        let mut report = AutoTestReport::default();
        let mut rtt_sum_ms = 0.0;

        while Instant::now() < end {
            let t_send = unix_now();
            if let Err(e) = self.logs.log_sent(t_send) {
                tracing::warn!(error = %e, "failed to append sent log record");
            }
            report.sent += 1;

            if let Err(e) = registry.write_line(id, SEND_PACKET).await {
                tracing::error!(error = %e, "aborting auto-test: packet command write failed");
                break;
            }

            match registry.read_line(id).await {
                Ok(Some(_ack)) => {
                    let t_ack = unix_now();
                    report.acked += 1;
                    if let Err(e) = self.logs.log_recv(t_ack) {
                        tracing::warn!(error = %e, "failed to append recv log record");
                    }

                    let rtt_ms = (t_ack - t_send) * 1000.0;
                    if rtt_ms < 0.0 {
                        tracing::warn!(rtt_ms, "negative RTT, clock skew or event reordering");
                    }
                    if let Err(e) = self.logs.log_rtt(t_send, t_ack, rtt_ms) {
                        tracing::warn!(error = %e, "failed to append rtt log record");
                    }
                    rtt_sum_ms += rtt_ms;
                    emit(&format!("RTT for packet: {rtt_ms:.2} ms"));
                }
                Ok(None) => {
                    tracing::warn!(id, "no ACK received for packet, channel output closed");
                }
                Err(HarnessError::ReadTimeout { .. }) => {
                    tracing::warn!(id, "no ACK received for packet within read timeout");
                }
                Err(e) => {
                    tracing::error!(error = %e, "aborting auto-test: ack read failed");
                    break;
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }

        if report.acked > 0 {
            report.mean_rtt_ms = Some(rtt_sum_ms / report.acked as f64);
        }
        Ok(report)
    }
}

/// Print one benchmark line to stdout and flush it through, keeping the
/// measurement stream usable from a pipe.
fn emit(line: &str) {
    let mut out = std::io::stdout();
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

/// Format the end-of-run summary printed to stdout.
pub fn summary_line(report: &AutoTestReport) -> String {
    match report.mean_rtt_ms {
        Some(mean) => format!(
            "Auto-test completed. Total packets sent: {}, ACKed: {}, mean RTT: {:.2} ms",
            report.sent, report.acked, mean
        ),
        None => format!(
            "Auto-test completed. Total packets sent: {}, ACKed: {}",
            report.sent, report.acked
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reports_positive_mean() {
        let report = AutoTestReport {
            sent: 4,
            acked: 2,
            mean_rtt_ms: Some(12.5),
        };
        let line = summary_line(&report);
        assert!(line.contains("sent: 4"));
        assert!(line.contains("ACKed: 2"));
        assert!(line.contains("12.50 ms"));
        assert!(!line.contains("-12.50"), "mean RTT must not be negated");
    }

    #[test]
    fn summary_without_acks_omits_mean() {
        let report = AutoTestReport::default();
        assert_eq!(
            summary_line(&report),
            "Auto-test completed. Total packets sent: 0, ACKed: 0"
        );
    }
}
