use super::fetch::FetchJob;
use super::source::SourceId;
use crate::core::geo::TileKey;
use crate::prelude::HashSet;
use std::collections::VecDeque;

type QueueKey = (SourceId, TileKey);

/// Tiles with a fetch waiting or in flight. A key is held from `enqueue`
/// until `complete`, so it can never be queued twice.
#[derive(Debug, Default)]
pub struct TileFetchQueue {
    keys: HashSet<QueueKey>,
    waiting: VecDeque<FetchJob>,
    loading: HashSet<QueueKey>,
    enqueued_total: u64,
}

impl TileFetchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `job` unless its key is already present. Returns whether it was added.
    pub fn enqueue(&mut self, job: FetchJob) -> bool {
        if !self.keys.insert((job.source, job.tile)) {
            log::trace!("tile {} of {} already queued", job.tile, job.source);
            return false;
        }
        self.enqueued_total += 1;
        self.waiting.push_back(job);
        true
    }

    pub fn is_key_queued(&self, source: SourceId, key: TileKey) -> bool {
        self.keys.contains(&(source, key))
    }

    /// Takes the oldest waiting job and marks it loading
    pub fn next_job(&mut self) -> Option<FetchJob> {
        let job = self.waiting.pop_front()?;
        self.loading.insert((job.source, job.tile));
        Some(job)
    }

    /// Releases the key once its fetch has resolved. Returns whether it was queued.
    pub fn complete(&mut self, source: SourceId, key: TileKey) -> bool {
        self.loading.remove(&(source, key));
        if !self.keys.remove(&(source, key)) {
            return false;
        }
        // A key completed before it was dispatched leaves no job behind.
        self.waiting
            .retain(|job| !(job.source == source && job.tile == key));
        true
    }

    /// Drops waiting jobs rejected by `keep` and releases their keys.
    /// Loading jobs are untouched. Returns how many were dropped.
    pub fn retain_waiting(&mut self, mut keep: impl FnMut(&FetchJob) -> bool) -> usize {
        let keys = &mut self.keys;
        let before = self.waiting.len();
        self.waiting.retain(|job| {
            if keep(job) {
                return true;
            }
            keys.remove(&(job.source, job.tile));
            false
        });
        before - self.waiting.len()
    }

    /// Number of distinct keys waiting or loading
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn loading_count(&self) -> usize {
        self.loading.len()
    }

    /// Jobs accepted since creation
    pub fn enqueued_total(&self) -> u64 {
        self.enqueued_total
    }
}
