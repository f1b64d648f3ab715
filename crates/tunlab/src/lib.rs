//! Test-harness supervisor for network-emulation experiments.
//!
//! Spawns and drives black-box tunnel emulator processes over
//! line-oriented stdin/stdout pipes. Two front ends share the same
//! process registry:
//!
//! - **Interactive** — a small textual command protocol read from stdin
//!   (`tunnel`, `prompt`, `halt`)
//! - **Auto-test** — a timed RTT benchmark that writes synthetic packet
//!   commands through one channel and appends send/ack/RTT event logs
//!
//! Every child is spawned as the leader of its own process group so a
//! single teardown reliably reaches everything the child spawns in turn.

pub mod autotest;
pub mod channel;
pub mod dispatch;
pub mod error;
pub mod eventlog;
pub mod expand;
pub mod registry;
