//! Recording doubles shared by the integration tests
#![allow(dead_code)]

use offscreen_map::core::config::WorkerConfig;
use offscreen_map::prelude::*;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Start(Vec<u64>),
    Ingest(TileKey, Extent, usize),
    Resize(Size),
    Render(RenderSnapshot),
}

/// Backend that records every call it receives
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Arc<Mutex<Vec<BackendCall>>>,
    pub fail_start: bool,
    /// When set, each render waits for one token (or for the sender to drop)
    pub gate: Option<crossbeam_channel::Receiver<()>>,
}

impl RecordingBackend {
    pub fn new() -> (Self, Arc<Mutex<Vec<BackendCall>>>) {
        let backend = Self::default();
        let calls = Arc::clone(&backend.calls);
        (backend, calls)
    }

    /// Backend whose renders block until the returned sender releases them
    pub fn gated() -> (Self, Arc<Mutex<Vec<BackendCall>>>, crossbeam_channel::Sender<()>) {
        let (release, gate) = crossbeam_channel::unbounded();
        let backend = Self {
            gate: Some(gate),
            ..Self::default()
        };
        let calls = Arc::clone(&backend.calls);
        (backend, calls, release)
    }

    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn start(&mut self, surfaces: &dyn SurfaceProvider, _config: &WorkerConfig) -> Result<()> {
        if self.fail_start {
            return Err(Error::InitializationFailure("no GPU adapter".to_string()));
        }
        let ids = surfaces.list_surfaces().iter().map(|s| s.id()).collect();
        self.calls.lock().unwrap().push(BackendCall::Start(ids));
        Ok(())
    }

    fn ingest_tile_data(&mut self, bytes: Vec<u8>, tile_coord: TileKey, extent: Extent) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Ingest(tile_coord, extent, bytes.len()));
        Ok(())
    }

    fn resize(&mut self, size: Size) -> Result<()> {
        self.calls.lock().unwrap().push(BackendCall::Resize(size));
        Ok(())
    }

    fn render(&mut self, snapshot: &RenderSnapshot) -> Result<()> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        self.calls.lock().unwrap().push(BackendCall::Render(*snapshot));
        Ok(())
    }
}

pub fn renders(calls: &Mutex<Vec<BackendCall>>) -> Vec<RenderSnapshot> {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter_map(|c| match c {
            BackendCall::Render(s) => Some(*s),
            _ => None,
        })
        .collect()
}

pub fn ingested(calls: &Mutex<Vec<BackendCall>>) -> Vec<TileKey> {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter_map(|c| match c {
            BackendCall::Ingest(key, _, _) => Some(*key),
            _ => None,
        })
        .collect()
}

/// Polls `condition` until it holds or five seconds pass
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Fetcher whose downloads are completed by hand from the test
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    pub jobs: Arc<Mutex<Vec<FetchJob>>>,
    completed: Arc<Mutex<Vec<FetchOutcome>>>,
}

impl ScriptedFetcher {
    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn resolve(&self, job: &FetchJob, data: Result<Vec<u8>>) {
        self.completed.lock().unwrap().push(FetchOutcome {
            tile: job.tile,
            source: job.source,
            data,
        });
    }
}

impl TileFetcher for ScriptedFetcher {
    fn fetch(&self, job: FetchJob) {
        self.jobs.lock().unwrap().push(job);
    }

    fn poll_completed(&self) -> Vec<FetchOutcome> {
        std::mem::take(&mut *self.completed.lock().unwrap())
    }
}

/// 4x4 tiles of 256 units at zoom 2; resolutions are 4, 2, 1, ...
pub fn test_source() -> XyzSource {
    XyzSource::new(
        "mem://{z}/{x}/{y}",
        XyzTileGrid::new(Extent::new(0.0, 0.0, 1024.0, 1024.0), 256, 4),
    )
}

pub fn surface() -> SurfaceSet {
    SurfaceSet::single(Surface::new(7, Size::new(256, 256)))
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
