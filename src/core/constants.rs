//! Core constants shared by the tile grid, the fetch layer and the worker.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Half the width of the EPSG:3857 world in meters (π · 6378137).
pub const WEB_MERCATOR_HALF_WORLD: f64 = 20_037_508.342_789_244;

/// Highest zoom level of the default XYZ grid.
pub const DEFAULT_MAX_ZOOM: u8 = 19;

/// How long a blocked shared-memory reader sleeps before re-checking its command queue.
pub const DEFAULT_SHARED_POLL_INTERVAL_MS: u64 = 50;

/// Default cap on simultaneously loading tiles.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

/// Default per-request timeout for tile downloads.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_USER_AGENT: &str = "offscreen-map/0.1.0";

pub const RENDER_WORKER_THREAD_NAME: &str = "render-worker";
