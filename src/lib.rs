//! # offscreen-map
//!
//! Control-thread orchestration for a tiled map renderer whose drawing runs
//! on an isolated render worker.
//!
//! The control side owns the view, decides which tiles are wanted, and hands
//! one view snapshot per display tick to the worker through a
//! [`RenderChannel`]. Because the worker always renders a slightly older
//! snapshot, the visible layer is corrected with a
//! [`CompensationTransform`] every time the view changes or a render
//! completes.

pub mod coordinator;
pub mod core;
pub mod prelude;
pub mod rendering;
pub mod runtime;
pub mod tiles;

pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::{ChannelStrategy, RenderOptions, RenderProfile},
    geo::{Extent, Point, Size, TileKey},
    view::{FrameState, RenderSnapshot, ViewState, WantedTileSet},
};

pub use coordinator::{ControlThreadCoordinator, CoordinatorBuilder, DisplayLayer};

pub use rendering::{
    backend::{RenderBackend, Surface, SurfaceProvider, SurfaceSet},
    channel::{MessageChannel, RenderChannel, SharedMemoryChannel},
    messages::{TileData, WorkerCommand, WorkerEvent},
    shared::SharedFrameBuffer,
    transform::CompensationTransform,
    worker::{LoopControl, RenderWorkerLoop, WorkerState},
};

pub use tiles::{
    demand::TileDemandTracker,
    fetch::{FetchJob, FetchOutcome, HttpTileFetcher, TileFetcher},
    grid::{TileGrid, TileRange, XyzTileGrid},
    queue::TileFetchQueue,
    router::{TileDataRouter, TransferBuffer},
    source::{SourceId, TileSource, XyzSource},
    state::{Tile, TileState, TileStore},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backend or thread-pool bring-up failed inside the render worker.
    #[error("Initialization failure: {0}")]
    InitializationFailure(String),

    /// An ownership transfer was rejected (detached buffer, closed channel).
    #[error("Channel transfer failure: {0}")]
    ChannelTransferFailure(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
