//! Error taxonomy for the supervisor.
//!
//! Every variant is local to one command or one benchmark iteration;
//! nothing here terminates the process. Only `halt`, stdin end-of-file,
//! and termination signals end a run.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("channel {id} is closed or was never launched")]
    ChannelClosed { id: u32 },
    #[error("no line from channel {id} within {timeout:?}")]
    ReadTimeout { id: u32, timeout: Duration },
    #[error("{0}")]
    Usage(String),
}
