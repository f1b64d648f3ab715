//! Registry of live tunnel channels.
//!
//! The registry exclusively owns every [`TunnelChannel`] it holds; all
//! channel I/O and teardown goes through it. It is constructed once per
//! supervisor run and passed explicitly to whichever loop drives it.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::channel::TunnelChannel;
use crate::error::HarnessError;

pub struct TunnelRegistry {
    channels: BTreeMap<u32, TunnelChannel>,
    read_timeout: Duration,
}

impl TunnelRegistry {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            channels: BTreeMap::new(),
            read_timeout,
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.channels.contains_key(&id)
    }

    /// Live channel ids, in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        self.channels.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Launch `argv` in its own process group and store it under `id`.
    ///
    /// A live channel already registered under `id` is torn down first,
    /// so its process group is never leaked by the replacement.
    pub async fn spawn(&mut self, id: u32, argv: &[String]) -> Result<(), HarnessError> {
        if let Some(old) = self.channels.remove(&id) {
            tracing::warn!(id, "replacing live channel, tearing down old process group");
            old.teardown().await;
        }
        let channel = TunnelChannel::spawn(id, argv)?;
        self.channels.insert(id, channel);
        Ok(())
    }

    /// Write one command line to channel `id`.
    pub async fn write_line(&mut self, id: u32, text: &str) -> Result<(), HarnessError> {
        let channel = self
            .channels
            .get_mut(&id)
            .ok_or(HarnessError::ChannelClosed { id })?;
        channel.write_line(text).await
    }

    /// Read one line from channel `id`, bounded by the configured read
    /// timeout. `Ok(None)` means the child closed its output.
    pub async fn read_line(&mut self, id: u32) -> Result<Option<String>, HarnessError> {
        let timeout = self.read_timeout;
        let channel = self
            .channels
            .get_mut(&id)
            .ok_or(HarnessError::ChannelClosed { id })?;
        channel.read_line(timeout).await
    }

    /// Terminate the process group registered under `id` and drop the
    /// channel. Unknown ids are a no-op.
    pub async fn teardown(&mut self, id: u32) {
        if let Some(channel) = self.channels.remove(&id) {
            channel.teardown().await;
        }
    }

    /// Tear down every registered channel.
    pub async fn teardown_all(&mut self) {
        while let Some((_, channel)) = self.channels.pop_first() {
            channel.teardown().await;
        }
    }
}
