//! Messages exchanged between the control thread and the render worker

use super::backend::SurfaceSet;
use super::shared::SharedFrameBuffer;
use crate::core::geo::{Extent, TileKey};
use crate::core::view::{RenderSnapshot, ViewState};
use std::sync::Arc;

/// A decoded tile payload on its way into the worker
#[derive(Debug, PartialEq)]
pub struct TileData {
    pub bytes: Vec<u8>,
    pub tile_coord: TileKey,
    pub extent: Extent,
}

/// Control thread → render worker
#[derive(Debug)]
pub enum WorkerCommand {
    /// One-time display surface hand-off, optionally with a first tile
    Surface {
        surfaces: SurfaceSet,
        initial_tile: Option<TileData>,
    },
    /// Render request under the message strategy
    FrameState(RenderSnapshot),
    TileData(TileData),
    /// One-time shared record hand-off under the shared-memory strategy
    SharedBuffer(Arc<SharedFrameBuffer>),
    Shutdown,
}

impl WorkerCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Surface { .. } => "SURFACE",
            Self::FrameState(_) => "FRAME_STATE",
            Self::TileData(_) => "TILE_DATA",
            Self::SharedBuffer(_) => "SHARED_BUFFER",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

/// Render worker → control thread
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Backend bring-up finished
    Ready,
    /// Initial surface and all deferred commands have been processed
    Started,
    /// A render request completed; carries the view actually drawn
    Rendered { view_state: ViewState },
    /// A render request failed; the request slot is free again
    RenderFailed { view_state: ViewState, message: String },
    InitializationFailed { message: String },
}

impl WorkerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Started => "STARTED",
            Self::Rendered { .. } => "RENDERED",
            Self::RenderFailed { .. } => "RENDER_FAILED",
            Self::InitializationFailed { .. } => "INITIALIZATION_FAILED",
        }
    }
}
