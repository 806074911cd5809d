//! Render worker state machine
//!
//! ```text
//! Uninitialized --start--> AwaitingSurface --SURFACE--> Initializing
//!     --bring-up ok--> Ready <--> Rendering
//! ```
//!
//! Frame and tile commands that arrive before `Ready` are kept in arrival
//! order and replayed once, right after bring-up. Under the shared-memory
//! strategy the loop waits on the [`SharedFrameBuffer`] instead of on render
//! requests and always draws the latest published record.

use super::backend::{RenderBackend, SurfaceProvider, SurfaceSet};
use super::messages::{TileData, WorkerCommand, WorkerEvent};
use super::shared::SharedFrameBuffer;
use crate::core::config::WorkerConfig;
use crate::core::geo::Size;
use crate::core::view::RenderSnapshot;
use crate::{Error, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    AwaitingSurface,
    Initializing,
    Ready,
    Rendering,
}

/// Whether the worker loop keeps going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

#[derive(Debug)]
enum Deferred {
    Frame(RenderSnapshot),
    Tile(TileData),
}

pub struct RenderWorkerLoop {
    state: WorkerState,
    backend: Box<dyn RenderBackend>,
    config: WorkerConfig,
    poll_interval: Duration,
    events: Sender<WorkerEvent>,
    surfaces: Option<SurfaceSet>,
    shared: Option<Arc<SharedFrameBuffer>>,
    last_generation: u32,
    deferred: VecDeque<Deferred>,
    snapshot: Option<RenderSnapshot>,
    current_size: Option<Size>,
    frames_rendered: u64,
}

impl RenderWorkerLoop {
    pub fn new(
        backend: Box<dyn RenderBackend>,
        config: WorkerConfig,
        poll_interval: Duration,
        events: Sender<WorkerEvent>,
    ) -> Self {
        Self {
            state: WorkerState::Uninitialized,
            backend,
            config,
            poll_interval,
            events,
            surfaces: None,
            shared: None,
            last_generation: 0,
            deferred: VecDeque::new(),
            snapshot: None,
            current_size: None,
            frames_rendered: 0,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, WorkerState::Ready | WorkerState::Rendering)
    }

    /// The snapshot consumed by the last successful render
    pub fn snapshot(&self) -> Option<&RenderSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn start(&mut self) -> Result<()> {
        if self.state != WorkerState::Uninitialized {
            return Err(Error::InvalidState(format!(
                "worker started twice (state {:?})",
                self.state
            )));
        }
        self.state = WorkerState::AwaitingSurface;
        log::debug!("render worker awaiting surface");
        Ok(())
    }

    pub fn handle_command(&mut self, command: WorkerCommand) -> Result<LoopControl> {
        log::trace!("worker received {} in {:?}", command.kind(), self.state);
        match command {
            WorkerCommand::Surface {
                surfaces,
                initial_tile,
            } => self.initialize(surfaces, initial_tile)?,
            WorkerCommand::FrameState(snapshot) => {
                if self.is_ready() {
                    self.render(snapshot, true);
                } else {
                    self.deferred.push_back(Deferred::Frame(snapshot));
                }
            }
            WorkerCommand::TileData(data) => {
                if self.is_ready() {
                    self.ingest(data);
                } else {
                    self.deferred.push_back(Deferred::Tile(data));
                }
            }
            WorkerCommand::SharedBuffer(buffer) => {
                if self.shared.is_some() {
                    log::warn!("replacing the shared frame buffer");
                }
                self.shared = Some(buffer);
                self.last_generation = 0;
            }
            WorkerCommand::Shutdown => return Ok(LoopControl::Exit),
        }
        Ok(LoopControl::Continue)
    }

    fn initialize(&mut self, surfaces: SurfaceSet, initial_tile: Option<TileData>) -> Result<()> {
        if self.state != WorkerState::AwaitingSurface {
            return Err(Error::InvalidState(format!(
                "surface received in state {:?}",
                self.state
            )));
        }
        self.state = WorkerState::Initializing;
        log::info!(
            "render worker initializing with {} surface(s), {} pool threads",
            surfaces.list_surfaces().len(),
            self.config.thread_pool_size
        );

        if let Err(e) = self.backend.start(&surfaces, &self.config) {
            let message = e.to_string();
            log::error!("render backend failed to start: {}", message);
            self.emit(WorkerEvent::InitializationFailed {
                message: message.clone(),
            });
            return Err(Error::InitializationFailure(message));
        }
        self.surfaces = Some(surfaces);
        self.state = WorkerState::Ready;
        self.emit(WorkerEvent::Ready);

        if let Some(tile) = initial_tile {
            self.ingest(tile);
        }
        let flushed = self.deferred.len();
        while let Some(deferred) = self.deferred.pop_front() {
            match deferred {
                Deferred::Frame(snapshot) => self.render(snapshot, true),
                Deferred::Tile(data) => self.ingest(data),
            }
        }
        log::info!("render worker started, replayed {} deferred commands", flushed);
        self.emit(WorkerEvent::Started);
        Ok(())
    }

    fn render(&mut self, snapshot: RenderSnapshot, acknowledge: bool) {
        self.state = WorkerState::Rendering;
        let result = self.draw(&snapshot);
        self.state = WorkerState::Ready;

        match result {
            Ok(()) => {
                self.snapshot = Some(snapshot);
                self.frames_rendered += 1;
                if acknowledge {
                    self.emit(WorkerEvent::Rendered {
                        view_state: snapshot.view_state,
                    });
                }
            }
            Err(e) => {
                log::warn!("render failed: {}", e);
                if acknowledge {
                    self.emit(WorkerEvent::RenderFailed {
                        view_state: snapshot.view_state,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    fn draw(&mut self, snapshot: &RenderSnapshot) -> Result<()> {
        if self.current_size != Some(snapshot.size) {
            log::debug!("resizing render target to {:?}", snapshot.size);
            self.backend.resize(snapshot.size)?;
            self.current_size = Some(snapshot.size);
        }
        self.backend.render(snapshot)
    }

    fn ingest(&mut self, data: TileData) {
        let tile_coord = data.tile_coord;
        if let Err(e) = self
            .backend
            .ingest_tile_data(data.bytes, data.tile_coord, data.extent)
        {
            log::warn!("failed to ingest tile {}: {}", tile_coord, e);
        }
    }

    fn emit(&self, event: WorkerEvent) {
        let kind = event.kind();
        if self.events.send(event).is_err() {
            log::debug!("control thread gone, dropping {}", kind);
        }
    }

    /// Runs the loop on the current thread until shutdown or until the command
    /// channel closes. Only an initialization failure ends it with an error.
    pub fn run(mut self, commands: Receiver<WorkerCommand>) -> Result<()> {
        self.start()?;
        loop {
            let control = if self.shared.is_some() && self.is_ready() {
                self.shared_step(&commands)?
            } else {
                match commands.recv() {
                    Ok(command) => self.dispatch(command)?,
                    Err(_) => LoopControl::Exit,
                }
            };
            if control == LoopControl::Exit {
                break;
            }
        }
        log::info!(
            "render worker exiting after {} frames",
            self.frames_rendered
        );
        Ok(())
    }

    /// Spawns [`run`](Self::run) on a dedicated thread
    pub fn spawn(self, commands: Receiver<WorkerCommand>) -> Result<JoinHandle<Result<()>>> {
        let name = self.config.thread_name.clone();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || self.run(commands))?;
        Ok(handle)
    }

    fn dispatch(&mut self, command: WorkerCommand) -> Result<LoopControl> {
        match self.handle_command(command) {
            Err(e @ Error::InitializationFailure(_)) => Err(e),
            Err(e) => {
                log::warn!("worker ignored command: {}", e);
                Ok(LoopControl::Continue)
            }
            ok => ok,
        }
    }

    fn shared_step(&mut self, commands: &Receiver<WorkerCommand>) -> Result<LoopControl> {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    if self.dispatch(command)? == LoopControl::Exit {
                        return Ok(LoopControl::Exit);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(LoopControl::Exit),
            }
        }

        let Some(buffer) = self.shared.clone() else {
            return Ok(LoopControl::Continue);
        };
        if buffer.is_closed() {
            return Ok(LoopControl::Exit);
        }
        if let Some((snapshot, generation)) =
            buffer.wait_and_load(self.last_generation, self.poll_interval)
        {
            if self.last_generation != 0 {
                let skipped = (generation.wrapping_sub(self.last_generation) / 2).saturating_sub(1);
                if skipped > 0 {
                    log::trace!("coalesced {} intermediate frame states", skipped);
                }
            }
            self.last_generation = generation;
            self.render(snapshot, false);
        }
        Ok(LoopControl::Continue)
    }
}
