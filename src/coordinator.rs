//! Control-thread driver
//!
//! [`ControlThreadCoordinator`] owns the current [`ViewState`], works out tile
//! demand and issues at most one render request per display tick. When the
//! worker reports the view it actually rendered, the [`DisplayLayer`]
//! transform is recomputed so the stale bitmap lines up with the current view.

use crate::core::config::{ChannelStrategy, RenderOptions, RenderProfile};
use crate::core::geo::{Point, Size};
use crate::core::view::{FrameState, RenderSnapshot, ViewState};
use crate::rendering::backend::{RenderBackend, SurfaceSet};
use crate::rendering::channel::{open_channel, RenderChannel};
use crate::rendering::messages::{TileData, WorkerCommand, WorkerEvent};
use crate::rendering::shared::SharedFrameBuffer;
use crate::rendering::transform::CompensationTransform;
use crate::rendering::worker::RenderWorkerLoop;
use crate::tiles::demand::TileDemandTracker;
use crate::tiles::fetch::{HttpTileFetcher, TileFetcher};
use crate::tiles::router::{TileDataRouter, TransferBuffer};
use crate::tiles::source::{SourceId, TileSource, XyzSource};
use crate::tiles::state::TileState;
use crate::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// The visual layer holding the worker's latest bitmap
#[derive(Debug, Clone)]
pub struct DisplayLayer {
    size: Size,
    rendered: Option<ViewState>,
    transform: CompensationTransform,
    frames_presented: u64,
}

impl DisplayLayer {
    fn new() -> Self {
        Self {
            size: Size::default(),
            rendered: None,
            transform: CompensationTransform::identity(),
            frames_presented: 0,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// View of the bitmap currently shown, if any render was acknowledged
    pub fn rendered_view(&self) -> Option<&ViewState> {
        self.rendered.as_ref()
    }

    pub fn transform(&self) -> &CompensationTransform {
        &self.transform
    }

    pub fn css_transform(&self) -> String {
        self.transform.to_css_string()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    fn refresh(&mut self, current: &ViewState) {
        self.transform = match &self.rendered {
            Some(rendered) => CompensationTransform::compute(current, rendered),
            None => CompensationTransform::identity(),
        };
    }
}

/// Builder for [`ControlThreadCoordinator`]
pub struct CoordinatorBuilder {
    profile: RenderProfile,
    view_state: ViewState,
    tile_source: Option<Box<dyn TileSource>>,
    fetcher: Option<Box<dyn TileFetcher>>,
    initial_tile: Option<TileData>,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            profile: RenderProfile::default(),
            view_state: ViewState::default(),
            tile_source: None,
            fetcher: None,
            initial_tile: None,
        }
    }

    /// Set the performance profile
    pub fn with_profile(mut self, profile: RenderProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set custom options
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.profile = RenderProfile::Custom(options);
        self
    }

    /// Keep the current profile but force a channel strategy
    pub fn with_strategy(mut self, strategy: ChannelStrategy) -> Self {
        self.profile = RenderProfile::Custom(self.profile.resolve().with_strategy(strategy));
        self
    }

    pub fn with_view_state(mut self, view_state: ViewState) -> Self {
        self.view_state = view_state;
        self
    }

    /// Set the tile source; defaults to OpenStreetMap
    pub fn with_tile_source(mut self, source: Box<dyn TileSource>) -> Self {
        self.tile_source = Some(source);
        self
    }

    /// Set the fetch layer; defaults to [`HttpTileFetcher`]
    pub fn with_fetcher(mut self, fetcher: Box<dyn TileFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Tile payload sent along with the surface hand-off
    pub fn with_initial_tile(mut self, tile: TileData) -> Self {
        self.initial_tile = Some(tile);
        self
    }

    /// Starts the render worker on its own thread and hands it `surfaces`
    pub fn spawn(
        self,
        backend: Box<dyn RenderBackend>,
        surfaces: SurfaceSet,
    ) -> Result<ControlThreadCoordinator> {
        let options = self.profile.resolve();
        let source = match self.tile_source {
            Some(source) => source,
            None => Box::new(XyzSource::openstreetmap()),
        };
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Box::new(HttpTileFetcher::new(&options.tile_fetch)?),
        };

        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let (channel, shared) = open_channel(options.channel.strategy, command_tx.clone());

        let transfer_failed =
            |_| Error::ChannelTransferFailure("render worker command channel closed".to_string());
        if let Some(buffer) = &shared {
            command_tx
                .send(WorkerCommand::SharedBuffer(Arc::clone(buffer)))
                .map_err(transfer_failed)?;
        }
        command_tx
            .send(WorkerCommand::Surface {
                surfaces,
                initial_tile: self.initial_tile,
            })
            .map_err(transfer_failed)?;

        let worker = RenderWorkerLoop::new(
            backend,
            options.worker.clone(),
            options.channel.shared_poll_interval(),
            event_tx,
        )
        .spawn(command_rx)?;

        log::info!(
            "render worker spawned ({:?} strategy, source {})",
            options.channel.strategy,
            source.id()
        );

        let mut display = DisplayLayer::new();
        display.refresh(&self.view_state);
        Ok(ControlThreadCoordinator {
            router: TileDataRouter::new(command_tx.clone()),
            options,
            view_state: self.view_state,
            channel,
            commands: command_tx,
            events: event_rx,
            tracker: TileDemandTracker::new(),
            source,
            fetcher,
            outstanding: false,
            worker_ready: false,
            started: false,
            display,
            shared,
            worker: Some(worker),
            requests_submitted: 0,
        })
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ControlThreadCoordinator {
    options: RenderOptions,
    view_state: ViewState,
    channel: Box<dyn RenderChannel>,
    commands: Sender<WorkerCommand>,
    events: Receiver<WorkerEvent>,
    router: TileDataRouter,
    tracker: TileDemandTracker,
    source: Box<dyn TileSource>,
    fetcher: Box<dyn TileFetcher>,
    outstanding: bool,
    worker_ready: bool,
    started: bool,
    display: DisplayLayer,
    shared: Option<Arc<SharedFrameBuffer>>,
    worker: Option<JoinHandle<Result<()>>>,
    requests_submitted: u64,
}

impl ControlThreadCoordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Fresh frame state for this tick from the current view
    pub fn frame_state(&self, size: Size) -> FrameState {
        FrameState::new(size, self.view_state)
    }

    /// One display tick: drains worker events and finished downloads,
    /// computes tile demand, then submits `frame_state` unless a request is
    /// still outstanding, in which case `frame_state.animate` is set.
    pub fn render(&mut self, frame_state: &mut FrameState) -> Result<&DisplayLayer> {
        self.process_events()?;
        self.pump_tiles()?;

        self.tracker
            .compute_wanted(frame_state, self.source.as_ref());
        self.tracker
            .dispatch(
                self.fetcher.as_ref(),
                self.options.tile_fetch.max_concurrent,
                &frame_state.wanted_tiles,
            );

        if self.outstanding {
            log::trace!("render request outstanding, revisiting next tick");
            frame_state.animate = true;
        } else {
            self.channel.submit(RenderSnapshot::from(&*frame_state))?;
            self.outstanding = self.channel.acknowledges();
            self.requests_submitted += 1;
        }

        self.display.size = frame_state.size;
        self.display.refresh(&self.view_state);
        Ok(&self.display)
    }

    /// Handles every event the worker has sent so far
    pub fn process_events(&mut self) -> Result<()> {
        let events: Vec<WorkerEvent> = self.events.try_iter().collect();
        for event in events {
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: WorkerEvent) -> Result<()> {
        log::trace!("control thread received {}", event.kind());
        match event {
            WorkerEvent::Ready => {
                self.worker_ready = true;
                self.router.on_worker_ready()?;
            }
            WorkerEvent::Started => self.started = true,
            WorkerEvent::Rendered { view_state } => {
                self.outstanding = false;
                self.display.rendered = Some(view_state);
                self.display.frames_presented += 1;
                self.display.refresh(&self.view_state);
            }
            WorkerEvent::RenderFailed { message, .. } => {
                log::warn!("worker could not render: {}", message);
                self.outstanding = false;
            }
            WorkerEvent::InitializationFailed { message } => {
                return Err(Error::InitializationFailure(message));
            }
        }
        Ok(())
    }

    fn pump_tiles(&mut self) -> Result<()> {
        for outcome in self.fetcher.poll_completed() {
            if outcome.source != self.source.id() {
                log::warn!("dropping tile {} from unknown {}", outcome.tile, outcome.source);
                continue;
            }
            match outcome.data {
                Ok(bytes) => {
                    self.tracker
                        .complete(outcome.source, outcome.tile, TileState::Loaded);
                    let extent = self.source.tile_grid().tile_extent(outcome.tile);
                    self.router
                        .push_tile_data(TransferBuffer::new(bytes), outcome.tile, extent)?;
                }
                Err(e) => {
                    log::warn!("tile {} failed: {}", outcome.tile, e);
                    self.tracker
                        .complete(outcome.source, outcome.tile, TileState::Error);
                }
            }
        }
        Ok(())
    }

    /// Blocks until the worker reports `READY`
    pub fn wait_until_ready(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while !self.worker_ready {
            if !self.wait_for_event(deadline)? {
                return Err(Error::InvalidState(format!(
                    "render worker not ready after {:?}",
                    timeout
                )));
            }
        }
        Ok(())
    }

    /// Blocks until the outstanding render request, if any, is answered.
    /// Returns `false` on timeout.
    pub fn wait_for_render(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        while self.outstanding {
            if !self.wait_for_event(deadline)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn wait_for_event(&mut self, deadline: Instant) -> Result<bool> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.events.recv_timeout(remaining) {
            Ok(event) => self.handle_event(event).map(|_| true),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(Error::InitializationFailure(
                "render worker exited".to_string(),
            )),
        }
    }

    pub fn set_view_state(&mut self, view_state: ViewState) {
        self.view_state = view_state;
        self.display.refresh(&self.view_state);
    }

    pub fn set_center(&mut self, center: Point) {
        self.view_state.center = center;
        self.display.refresh(&self.view_state);
    }

    pub fn set_resolution(&mut self, resolution: f64) {
        self.view_state.resolution = resolution;
        self.display.refresh(&self.view_state);
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.view_state.rotation = rotation;
        self.display.refresh(&self.view_state);
    }

    pub fn pan_by_pixels(&mut self, dx: f64, dy: f64) {
        self.view_state.pan_by_pixels(dx, dy);
        self.display.refresh(&self.view_state);
    }

    pub fn zoom_by(&mut self, factor: f64) {
        self.view_state.zoom_by(factor);
        self.display.refresh(&self.view_state);
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view_state
    }

    pub fn display(&self) -> &DisplayLayer {
        &self.display
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn strategy(&self) -> ChannelStrategy {
        self.channel.strategy()
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    pub fn is_worker_ready(&self) -> bool {
        self.worker_ready
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn source_id(&self) -> SourceId {
        self.source.id()
    }

    pub fn tracker(&self) -> &TileDemandTracker {
        &self.tracker
    }

    pub fn router(&self) -> &TileDataRouter {
        &self.router
    }

    /// Hands a tile payload to the worker outside the fetch pipeline
    pub fn push_tile_data(&mut self, data: TileData) -> Result<()> {
        self.router
            .push_tile_data(TransferBuffer::new(data.bytes), data.tile_coord, data.extent)
    }

    pub fn requests_submitted(&self) -> u64 {
        self.requests_submitted
    }

    /// Stops the worker and waits for its thread
    pub fn shutdown(mut self) -> Result<()> {
        self.stop();
        match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::InvalidState("render worker panicked".to_string()))?,
            None => Ok(()),
        }
    }

    fn stop(&mut self) {
        log::debug!("stopping render worker");
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(buffer) = &self.shared {
            buffer.close();
        }
    }
}

impl Drop for ControlThreadCoordinator {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}
