use std::time::Duration;

use serde::Deserialize;

use crate::protocol::{
    BACKCHANNEL_INTERVAL_MS, CYCLE_INTERVAL_MS, INDEXED_CHUNK_SIZE, INDEXED_PREFIX, MAX_CHUNKS,
    MAX_MESSAGE_LEN, RANGE_CHUNK_SIZE, RANGE_PREFIX,
};

/// When a sender stops presenting data frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Keep cycling, over every chunk if all are acknowledged, until the
    /// peer sends an explicit completion signal.
    #[default]
    AwaitDoneSignal,
    /// Finish as soon as every chunk is acknowledged.
    StopOnFullAck,
}

/// Range-variant session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RangeSessionConfig {
    pub prefix: String,
    pub chunk_size: usize,
    pub cycle_interval_ms: u64,
    pub backchannel_interval_ms: u64,
    pub completion: CompletionPolicy,
    /// Frames declaring a longer message are dropped unread.
    pub max_message_len: usize,
}

impl Default for RangeSessionConfig {
    fn default() -> Self {
        Self {
            prefix: RANGE_PREFIX.to_string(),
            chunk_size: RANGE_CHUNK_SIZE,
            cycle_interval_ms: CYCLE_INTERVAL_MS,
            backchannel_interval_ms: BACKCHANNEL_INTERVAL_MS,
            completion: CompletionPolicy::AwaitDoneSignal,
            max_message_len: MAX_MESSAGE_LEN,
        }
    }
}

impl RangeSessionConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn backchannel_interval(&self) -> Duration {
        Duration::from_millis(self.backchannel_interval_ms)
    }
}

/// Indexed-variant session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndexedConfig {
    pub prefix: String,
    pub chunk_size: usize,
    pub cycle_interval_ms: u64,
    /// Frames declaring more chunks are dropped unread.
    pub max_chunks: usize,
}

impl Default for IndexedConfig {
    fn default() -> Self {
        Self {
            prefix: INDEXED_PREFIX.to_string(),
            chunk_size: INDEXED_CHUNK_SIZE,
            cycle_interval_ms: CYCLE_INTERVAL_MS,
            max_chunks: MAX_CHUNKS,
        }
    }
}

impl IndexedConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

/// Audio backchannel settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackchannelConfig {
    /// Quiet period after the last inbound frame before acknowledging.
    pub debounce_ms: u64,
    /// Minimum gap between two acknowledgments.
    pub min_interval_ms: u64,
    /// Pause between queued audio sends.
    pub inter_message_delay_ms: u64,
    /// Playback volume, 0 to 100.
    pub volume: u8,
}

impl Default for BackchannelConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            min_interval_ms: BACKCHANNEL_INTERVAL_MS,
            inter_message_delay_ms: 100,
            volume: 20,
        }
    }
}

impl BackchannelConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn inter_message_delay(&self) -> Duration {
        Duration::from_millis(self.inter_message_delay_ms)
    }
}
