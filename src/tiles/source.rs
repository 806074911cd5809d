use super::grid::{TileGrid, XyzTileGrid};
use crate::core::geo::TileKey;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_SOURCE_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique identity of a tile source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u32);

impl SourceId {
    /// Allocates a fresh id
    pub fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Anything that can describe a tile pyramid and produce URLs for its tiles
pub trait TileSource: Send + Sync {
    fn id(&self) -> SourceId;

    fn tile_grid(&self) -> &dyn TileGrid;

    /// Build a URL for the requested `key`.
    fn tile_url(&self, key: TileKey) -> String;
}

/// Source backed by an XYZ URL template containing `{z}`, `{x}`, `{y}` and
/// optionally `{s}` for a rotating subdomain
pub struct XyzSource {
    id: SourceId,
    grid: XyzTileGrid,
    template: String,
    subdomains: Vec<String>,
}

impl XyzSource {
    pub fn new(template: impl Into<String>, grid: XyzTileGrid) -> Self {
        Self {
            id: SourceId::next(),
            grid,
            template: template.into(),
            subdomains: Vec::new(),
        }
    }

    pub fn with_subdomains<S: Into<String>>(mut self, subdomains: impl IntoIterator<Item = S>) -> Self {
        self.subdomains = subdomains.into_iter().map(Into::into).collect();
        self
    }

    /// The default OpenStreetMap tile server
    pub fn openstreetmap() -> Self {
        Self::new(
            "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
            XyzTileGrid::web_mercator(),
        )
        .with_subdomains(["a", "b", "c"])
    }
}

impl TileSource for XyzSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn tile_grid(&self) -> &dyn TileGrid {
        &self.grid
    }

    fn tile_url(&self, key: TileKey) -> String {
        let mut url = self
            .template
            .replace("{z}", &key.z.to_string())
            .replace("{x}", &key.x.to_string())
            .replace("{y}", &key.y.to_string());
        if !self.subdomains.is_empty() {
            let idx = ((key.x as usize) + (key.y as usize)) % self.subdomains.len();
            url = url.replace("{s}", &self.subdomains[idx]);
        }
        url
    }
}
