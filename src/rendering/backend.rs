//! Capabilities the render worker needs from its environment
//!
//! The GPU backend never looks surfaces up by itself; it is handed a
//! [`SurfaceProvider`] listing the surfaces transferred to the worker.

use crate::core::config::WorkerConfig;
use crate::core::geo::{Extent, Size, TileKey};
use crate::core::view::RenderSnapshot;
use crate::Result;

/// Handle to a display surface. Not `Clone`: it is handed to the worker once.
#[derive(Debug, PartialEq, Eq)]
pub struct Surface {
    id: u64,
    size: Size,
}

impl Surface {
    pub fn new(id: u64, size: Size) -> Self {
        Self { id, size }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> Size {
        self.size
    }
}

/// Lists the drawing surfaces available to a backend
pub trait SurfaceProvider {
    fn list_surfaces(&self) -> &[Surface];
}

/// Surfaces owned by the render worker
#[derive(Debug, Default)]
pub struct SurfaceSet {
    surfaces: Vec<Surface>,
}

impl SurfaceSet {
    pub fn new(surfaces: Vec<Surface>) -> Self {
        Self { surfaces }
    }

    pub fn single(surface: Surface) -> Self {
        Self::new(vec![surface])
    }
}

impl SurfaceProvider for SurfaceSet {
    fn list_surfaces(&self) -> &[Surface] {
        &self.surfaces
    }
}

/// GPU renderer driven by the render worker
pub trait RenderBackend: Send {
    /// Brings up the device and its thread pool against the given surfaces
    fn start(&mut self, surfaces: &dyn SurfaceProvider, config: &WorkerConfig) -> Result<()>;

    fn ingest_tile_data(&mut self, bytes: Vec<u8>, tile_coord: TileKey, extent: Extent)
        -> Result<()>;

    fn resize(&mut self, size: Size) -> Result<()>;

    fn render(&mut self, snapshot: &RenderSnapshot) -> Result<()>;
}
