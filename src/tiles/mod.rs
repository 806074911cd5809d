//! Tile demand, fetching and hand-off to the render worker

pub mod demand;
pub mod fetch;
pub mod grid;
pub mod queue;
pub mod router;
pub mod source;
pub mod state;

// Re-exports for convenience
pub use demand::TileDemandTracker;
pub use fetch::{FetchJob, FetchOutcome, HttpTileFetcher, TileFetcher};
pub use grid::{TileGrid, TileRange, XyzTileGrid};
pub use queue::TileFetchQueue;
pub use router::{TileDataRouter, TransferBuffer};
pub use source::{SourceId, TileSource, XyzSource};
pub use state::{Tile, TileState, TileStore};
