//! Append-only event logs for the RTT benchmark.
//!
//! Three plain-text logs, one record per line, consumed downstream by
//! the plotting and binning tools:
//!
//! - `sent.log` — send timestamp
//! - `recv.log` — ack timestamp
//! - `rttevents.log` — send timestamp, ack timestamp, RTT in ms
//!
//! Timestamps are seconds since the Unix epoch with microsecond
//! precision. Logs are only ever appended to, never truncated.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SENT_LOG: &str = "sent.log";
pub const RECV_LOG: &str = "recv.log";
pub const RTT_LOG: &str = "rttevents.log";

pub struct EventLogs {
    sent: File,
    recv: File,
    rtt: File,
}

impl EventLogs {
    /// Open the three logs under `dir`, creating the directory and any
    /// missing files. Existing content is preserved.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let open = |name: &str| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))
        };
        Ok(Self {
            sent: open(SENT_LOG)?,
            recv: open(RECV_LOG)?,
            rtt: open(RTT_LOG)?,
        })
    }

    pub fn log_sent(&mut self, t_send: f64) -> std::io::Result<()> {
        writeln!(self.sent, "{t_send:.6}")
    }

    pub fn log_recv(&mut self, t_ack: f64) -> std::io::Result<()> {
        writeln!(self.recv, "{t_ack:.6}")
    }

    pub fn log_rtt(&mut self, t_send: f64, t_ack: f64, rtt_ms: f64) -> std::io::Result<()> {
        writeln!(self.rtt, "{t_send:.6} {t_ack:.6} {rtt_ms:.2}")
    }
}

/// Seconds since the Unix epoch as a float, the timestamp unit used in
/// every log record.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
