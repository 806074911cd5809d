//! Per-frame tile demand
//!
//! Every tick the tracker works out which tiles of a source cover the
//! visible extent, marks the idle ones as wanted in the frame's
//! [`WantedTileSet`](crate::core::view::WantedTileSet) and queues a fetch for
//! each one that is not queued yet.

use super::fetch::{FetchJob, TileFetcher};
use super::queue::TileFetchQueue;
use super::source::{SourceId, TileSource};
use super::state::{TileState, TileStore};
use crate::core::geo::TileKey;
use crate::core::view::{FrameState, WantedTileSet};
use crate::prelude::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct TileDemandTracker {
    stores: HashMap<SourceId, TileStore>,
    queue: TileFetchQueue,
}

impl TileDemandTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the idle tiles covering `frame_state` as wanted and queues fetches
    /// for those not already queued. Returns the keys wanted this tick.
    pub fn compute_wanted(
        &mut self,
        frame_state: &mut FrameState,
        source: &dyn TileSource,
    ) -> HashSet<TileKey> {
        let grid = source.tile_grid();
        let source_id = source.id();
        let z = grid.zoom_for_resolution(frame_state.view_state.resolution);
        let range = grid.tile_range_for_extent(&frame_state.extent, z);
        let tile_resolution = grid.resolution(z);

        let store = self.stores.entry(source_id).or_default();
        let wanted_tiles = frame_state.wanted_tiles.for_source(source_id);

        let mut wanted = HashSet::default();
        let mut enqueued = 0;
        for key in range.keys() {
            if store.get_or_create(key).state != TileState::Idle {
                continue;
            }
            wanted_tiles.insert(key, true);
            wanted.insert(key);

            if !self.queue.is_key_queued(source_id, key) {
                self.queue.enqueue(FetchJob {
                    tile: key,
                    source: source_id,
                    center: grid.tile_coord_center(key),
                    resolution: tile_resolution,
                    url: source.tile_url(key),
                });
                enqueued += 1;
            }
        }

        log::trace!(
            "{}: zoom {} range {:?}, {} wanted, {} newly queued",
            source_id,
            z,
            range,
            wanted.len(),
            enqueued
        );
        wanted
    }

    /// Drops waiting jobs for tiles not in `wanted`, then starts queued jobs
    /// until `max_loading` fetches are in flight. Dropped tiles stay idle and
    /// are queued again once they are wanted. Returns how many were started.
    pub fn dispatch(
        &mut self,
        fetcher: &dyn TileFetcher,
        max_loading: usize,
        wanted: &WantedTileSet,
    ) -> usize {
        let dropped = self
            .queue
            .retain_waiting(|job| wanted.is_wanted(job.source, &job.tile));
        if dropped > 0 {
            log::debug!("dropped {} queued tiles no longer wanted", dropped);
        }

        let mut started = 0;
        while self.queue.loading_count() < max_loading {
            let Some(job) = self.queue.next_job() else {
                break;
            };
            self.stores
                .entry(job.source)
                .or_default()
                .set_state(job.tile, TileState::Loading);
            fetcher.fetch(job);
            started += 1;
        }
        if started > 0 {
            log::debug!(
                "started {} tile fetches ({} loading, {} waiting)",
                started,
                self.queue.loading_count(),
                self.queue.waiting_count()
            );
        }
        started
    }

    /// Records the final state of a fetched tile and releases its queue key
    pub fn complete(&mut self, source: SourceId, key: TileKey, state: TileState) {
        self.queue.complete(source, key);
        self.stores.entry(source).or_default().set_state(key, state);
    }

    pub fn tile_state(&self, source: SourceId, key: &TileKey) -> Option<TileState> {
        self.stores.get(&source).and_then(|store| store.state(key))
    }

    pub fn store(&self, source: SourceId) -> Option<&TileStore> {
        self.stores.get(&source)
    }

    pub fn queue(&self) -> &TileFetchQueue {
        &self.queue
    }
}
