//! One supervised tunnel child: spawn, line-oriented pipe I/O, and
//! process-group teardown.
//!
//! The child is started as the leader of a fresh session so that a
//! group-targeted signal reaches every descendant it spawns. The
//! emulator binaries fork their own workers, and reclaiming only the
//! immediate child would leave those behind.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::HarnessError;

/// Grace period between SIGTERM and SIGKILL escalation during teardown.
const TERM_GRACE: Duration = Duration::from_millis(500);

/// A bidirectional line channel to one spawned emulator process.
pub struct TunnelChannel {
    id: u32,
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    /// Bytes read from the child but not yet consumed as a full line.
    /// Kept across calls so a timed-out read loses nothing.
    pending: Vec<u8>,
    pgid: libc::pid_t,
}

impl TunnelChannel {
    /// Spawn `argv` as the leader of its own process group, with stdin
    /// and stdout connected as pipes.
    pub fn spawn(id: u32, argv: &[String]) -> Result<Self, HarnessError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| HarnessError::Usage("empty command line".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::piped()).stdout(Stdio::piped());

        // SAFETY: setsid is async-signal-safe and called in the child
        // between fork and exec; it detaches the child into a fresh
        // session whose group id equals the child's pid.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let command = argv.join(" ");
        let spawn_err = |source| HarnessError::Spawn {
            command: command.clone(),
            source,
        };

        let mut child = cmd.spawn().map_err(spawn_err)?;
        let pid = child.id().unwrap_or(0) as libc::pid_t;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_err(std::io::Error::other("child stdin not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_err(std::io::Error::other("child stdout not captured")))?;

        tracing::info!(id, pid, command = %command, "tunnel child launched");

        Ok(Self {
            id,
            child,
            stdin,
            stdout,
            pending: Vec::new(),
            pgid: pid,
        })
    }

    /// Write one command line (newline appended) to the child's stdin.
    pub async fn write_line(&mut self, text: &str) -> Result<(), HarnessError> {
        let id = self.id;
        let closed = |_| HarnessError::ChannelClosed { id };
        self.stdin
            .write_all(text.as_bytes())
            .await
            .map_err(closed)?;
        self.stdin.write_all(b"\n").await.map_err(closed)?;
        self.stdin.flush().await.map_err(closed)
    }

    /// Read one line from the child's stdout, bounded by `timeout`.
    ///
    /// Returns `Ok(None)` once the child has closed its output. A read
    /// that exceeds the bound yields [`HarnessError::ReadTimeout`];
    /// partial data stays buffered for the next call.
    pub async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, HarnessError> {
        let id = self.id;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            let read = tokio::time::timeout_at(deadline, self.stdout.read_buf(&mut self.pending));
            match read.await {
                Err(_) => return Err(HarnessError::ReadTimeout { id, timeout }),
                Ok(Err(_)) => return Err(HarnessError::ChannelClosed { id }),
                Ok(Ok(0)) => {
                    // End of stream. An unterminated tail still counts
                    // as the child's final line.
                    if self.pending.is_empty() {
                        return Ok(None);
                    }
                    let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
                    self.pending.clear();
                    return Ok(Some(line));
                }
                Ok(Ok(_)) => {}
            }
        }
    }

    /// Terminate the child's entire process group and reap the child.
    ///
    /// SIGTERM first, then SIGKILL to the group if it has not exited
    /// within [`TERM_GRACE`].
    pub async fn teardown(mut self) {
        let id = self.id;
        if self.pgid > 0 {
            // SAFETY: pgid is the group our child leads; worst case the
            // group is already gone and killpg reports ESRCH.
            unsafe {
                libc::killpg(self.pgid, libc::SIGTERM);
            }
        }
        match tokio::time::timeout(TERM_GRACE, self.child.wait()).await {
            Ok(_) => tracing::debug!(id, "tunnel child exited"),
            Err(_) => {
                tracing::warn!(id, "tunnel child ignored SIGTERM, escalating to SIGKILL");
                if self.pgid > 0 {
                    // SAFETY: same as above.
                    unsafe {
                        libc::killpg(self.pgid, libc::SIGKILL);
                    }
                }
                let _ = self.child.wait().await;
            }
        }
    }
}
