//! Prelude module for common offscreen-map types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use offscreen_map::prelude::*;`

pub use crate::core::{
    config::{
        ChannelConfig, ChannelStrategy, RenderOptions, RenderProfile, TileFetchConfig,
        WorkerConfig,
    },
    geo::{Extent, Point, Size, TileKey},
    view::{FrameState, RenderSnapshot, ViewState, WantedTileSet},
};

pub use crate::coordinator::{ControlThreadCoordinator, CoordinatorBuilder, DisplayLayer};

pub use crate::rendering::{
    backend::{RenderBackend, Surface, SurfaceProvider, SurfaceSet},
    channel::RenderChannel,
    messages::{TileData, WorkerCommand, WorkerEvent},
    transform::CompensationTransform,
    worker::WorkerState,
};

pub use crate::tiles::{
    demand::TileDemandTracker,
    fetch::{FetchJob, FetchOutcome, HttpTileFetcher, TileFetcher},
    grid::{TileGrid, XyzTileGrid},
    router::TransferBuffer,
    source::{SourceId, TileSource, XyzSource},
    state::TileState,
};

pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::{Error, Result};

pub use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
