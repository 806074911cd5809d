//! Configuration system for the render pipeline
//!
//! A [`RenderProfile`] resolves to a concrete [`RenderOptions`], which can also
//! be loaded from or saved to JSON.

use crate::core::constants::{
    DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SHARED_POLL_INTERVAL_MS,
    DEFAULT_USER_AGENT, RENDER_WORKER_THREAD_NAME,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How view snapshots travel from the control thread to the render worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStrategy {
    /// One-shot request per render, acknowledged with the view actually used
    Message,
    /// Lock-free shared record, last write wins, no acknowledgement
    SharedMemory,
}

impl Default for ChannelStrategy {
    fn default() -> Self {
        Self::Message
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderProfile {
    Balanced,
    LowLatency,
    HighThroughput,
    Custom(RenderOptions),
}

impl RenderProfile {
    pub fn resolve(&self) -> RenderOptions {
        match self {
            Self::Balanced => RenderOptions {
                channel: ChannelConfig {
                    strategy: ChannelStrategy::Message,
                    shared_poll_interval_ms: DEFAULT_SHARED_POLL_INTERVAL_MS,
                },
                worker: WorkerConfig {
                    thread_pool_size: 4,
                    thread_name: RENDER_WORKER_THREAD_NAME.to_string(),
                },
                tile_fetch: TileFetchConfig {
                    max_concurrent: DEFAULT_MAX_CONCURRENT_FETCHES,
                    request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
                    user_agent: DEFAULT_USER_AGENT.to_string(),
                },
            },
            Self::LowLatency => RenderOptions {
                channel: ChannelConfig {
                    strategy: ChannelStrategy::Message,
                    shared_poll_interval_ms: 16,
                },
                worker: WorkerConfig {
                    thread_pool_size: 2,
                    thread_name: RENDER_WORKER_THREAD_NAME.to_string(),
                },
                tile_fetch: TileFetchConfig {
                    max_concurrent: 8,
                    request_timeout_ms: 5_000,
                    user_agent: DEFAULT_USER_AGENT.to_string(),
                },
            },
            Self::HighThroughput => RenderOptions {
                channel: ChannelConfig {
                    strategy: ChannelStrategy::SharedMemory,
                    shared_poll_interval_ms: DEFAULT_SHARED_POLL_INTERVAL_MS,
                },
                worker: WorkerConfig {
                    thread_pool_size: 8,
                    thread_name: RENDER_WORKER_THREAD_NAME.to_string(),
                },
                tile_fetch: TileFetchConfig {
                    max_concurrent: 32,
                    request_timeout_ms: 15_000,
                    user_agent: DEFAULT_USER_AGENT.to_string(),
                },
            },
            Self::Custom(options) => options.clone(),
        }
    }
}

impl Default for RenderProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub channel: ChannelConfig,
    pub worker: WorkerConfig,
    pub tile_fetch: TileFetchConfig,
}

impl RenderOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_strategy(mut self, strategy: ChannelStrategy) -> Self {
        self.channel.strategy = strategy;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderProfile::default().resolve()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub strategy: ChannelStrategy,
    /// Upper bound on how long the shared-memory reader blocks before
    /// checking for tile data and shutdown
    pub shared_poll_interval_ms: u64,
}

impl ChannelConfig {
    pub fn shared_poll_interval(&self) -> Duration {
        Duration::from_millis(self.shared_poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Threads the backend may bring up for tessellation and uploads
    pub thread_pool_size: usize,
    pub thread_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileFetchConfig {
    /// Maximum number of tiles loading at once
    pub max_concurrent: usize,
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl TileFetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for TileFetchConfig {
    fn default() -> Self {
        RenderOptions::default().tile_fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_pick_strategies() {
        assert_eq!(
            RenderProfile::Balanced.resolve().channel.strategy,
            ChannelStrategy::Message
        );
        assert_eq!(
            RenderProfile::HighThroughput.resolve().channel.strategy,
            ChannelStrategy::SharedMemory
        );

        let custom = RenderOptions::default().with_strategy(ChannelStrategy::SharedMemory);
        assert_eq!(RenderProfile::Custom(custom.clone()).resolve(), custom);
    }

    #[test]
    fn test_options_json_round_trip() {
        let options = RenderProfile::LowLatency.resolve();
        let json = options.to_json_string().unwrap();
        assert!(json.contains("\"message\""));
        assert_eq!(RenderOptions::from_json_str(&json).unwrap(), options);
    }

    #[test]
    fn test_invalid_json_is_a_serialization_error() {
        let err = RenderOptions::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, crate::Error::Serialization(_)));
    }
}
