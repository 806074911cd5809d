//! Network fetch layer
//!
//! The demand tracker hands out [`FetchJob`]s; a [`TileFetcher`] turns them
//! into raw tile bytes. [`HttpTileFetcher`] downloads over HTTP on the async
//! runtime and reports back through a channel that the control thread polls
//! once per tick.

use super::source::SourceId;
use crate::core::config::TileFetchConfig;
use crate::core::geo::{Point, TileKey};
use crate::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// A tile download request produced by the demand tracker
#[derive(Debug, Clone, PartialEq)]
pub struct FetchJob {
    pub tile: TileKey,
    pub source: SourceId,
    /// Center of the tile in map units
    pub center: Point,
    /// Map units per pixel at the tile's zoom level
    pub resolution: f64,
    pub url: String,
}

/// Result of a fetch job
#[derive(Debug)]
pub struct FetchOutcome {
    pub tile: TileKey,
    pub source: SourceId,
    pub data: Result<Vec<u8>>,
}

/// Anything that can start tile downloads and report their results
pub trait TileFetcher: Send {
    /// Start downloading the tile described by `job`; must not block.
    fn fetch(&self, job: FetchJob);

    /// Results that arrived since the last call (non-blocking)
    fn poll_completed(&self) -> Vec<FetchOutcome>;
}

/// Fetcher that downloads each job once with a shared `reqwest` client.
/// Retrying failed tiles is left to the caller.
pub struct HttpTileFetcher {
    client: reqwest::Client,
    result_tx: Sender<FetchOutcome>,
    result_rx: Receiver<FetchOutcome>,
}

impl HttpTileFetcher {
    pub fn new(config: &TileFetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(config.max_concurrent.max(1))
            .build()?;
        let (result_tx, result_rx) = unbounded();
        Ok(Self {
            client,
            result_tx,
            result_rx,
        })
    }

    async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Fetch(format!("HTTP {} for {}", response.status(), url)));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

impl TileFetcher for HttpTileFetcher {
    fn fetch(&self, job: FetchJob) {
        let client = self.client.clone();
        let result_tx = self.result_tx.clone();

        log::debug!("fetch tile {} of {} from {}", job.tile, job.source, job.url);
        crate::runtime::spawn(async move {
            let data = Self::download(&client, &job.url).await;
            match &data {
                Ok(bytes) => log::debug!("downloaded tile {} ({} bytes)", job.tile, bytes.len()),
                Err(e) => log::warn!("tile {} download failed: {}", job.tile, e),
            }
            let _ = result_tx.send(FetchOutcome {
                tile: job.tile,
                source: job.source,
                data,
            });
        });
    }

    fn poll_completed(&self) -> Vec<FetchOutcome> {
        self.result_rx.try_iter().collect()
    }
}
