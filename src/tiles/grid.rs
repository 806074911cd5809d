use crate::core::constants::{DEFAULT_MAX_ZOOM, TILE_SIZE, WEB_MERCATOR_HALF_WORLD};
use crate::core::geo::{Extent, Point, TileKey};

/// Tile-grid / projection service consumed by the demand tracker
pub trait TileGrid: Send + Sync {
    /// Zoom level whose resolution is nearest to `resolution`
    fn zoom_for_resolution(&self, resolution: f64) -> u8;

    /// Tiles at `zoom` intersecting `extent`, clipped to the grid
    fn tile_range_for_extent(&self, extent: &Extent, zoom: u8) -> TileRange;

    /// Map units per pixel at `zoom`
    fn resolution(&self, zoom: u8) -> f64;

    /// Center of a tile in map units
    fn tile_coord_center(&self, key: TileKey) -> Point;

    /// Extent of a tile in map units
    fn tile_extent(&self, key: TileKey) -> Extent;
}

/// Inclusive rectangle of tile indices at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub z: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    pub fn new(z: u8, min_x: u32, max_x: u32, min_y: u32, max_y: u32) -> Self {
        Self {
            z,
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn empty(z: u8) -> Self {
        Self::new(z, 1, 0, 1, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            ((self.max_x - self.min_x) as usize + 1) * ((self.max_y - self.min_y) as usize + 1)
        }
    }

    /// Keys in the range, column by column
    pub fn keys(&self) -> impl Iterator<Item = TileKey> {
        let range = *self;
        let xs = if range.is_empty() {
            1..=0
        } else {
            range.min_x..=range.max_x
        };
        xs.flat_map(move |x| (range.min_y..=range.max_y).map(move |y| TileKey::new(range.z, x, y)))
    }
}

/// XYZ grid with a top-left origin and resolutions halving at each zoom level
#[derive(Debug, Clone, PartialEq)]
pub struct XyzTileGrid {
    extent: Extent,
    tile_size: u32,
    resolutions: Vec<f64>,
}

impl XyzTileGrid {
    /// Grid covering `extent` with `max_zoom + 1` levels; zoom 0 is one tile
    pub fn new(extent: Extent, tile_size: u32, max_zoom: u8) -> Self {
        let tile_size = tile_size.max(1);
        let max_resolution = extent.width().max(extent.height()) / tile_size as f64;
        let resolutions = (0..=max_zoom)
            .map(|z| max_resolution / 2_f64.powi(z as i32))
            .collect();
        Self {
            extent,
            tile_size,
            resolutions,
        }
    }

    /// The EPSG:3857 grid used by OpenStreetMap-style tile servers
    pub fn web_mercator() -> Self {
        Self::new(
            Extent::new(
                -WEB_MERCATOR_HALF_WORLD,
                -WEB_MERCATOR_HALF_WORLD,
                WEB_MERCATOR_HALF_WORLD,
                WEB_MERCATOR_HALF_WORLD,
            ),
            TILE_SIZE,
            DEFAULT_MAX_ZOOM,
        )
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn max_zoom(&self) -> u8 {
        (self.resolutions.len() - 1) as u8
    }

    fn origin(&self) -> Point {
        Point::new(self.extent.min_x, self.extent.max_y)
    }

    fn tile_span(&self, zoom: u8) -> f64 {
        self.resolution(zoom) * self.tile_size as f64
    }

    /// Tiles per axis, capped so every index fits a `u32`
    fn tiles_across(&self, span: f64) -> (i64, i64) {
        const MAX_ACROSS: i64 = u32::MAX as i64 + 1;
        (
            ((self.extent.width() / span).ceil() as i64).min(MAX_ACROSS),
            ((self.extent.height() / span).ceil() as i64).min(MAX_ACROSS),
        )
    }
}

impl TileGrid for XyzTileGrid {
    fn zoom_for_resolution(&self, resolution: f64) -> u8 {
        let Some(i) = self.resolutions.iter().position(|r| *r <= resolution) else {
            return self.max_zoom();
        };
        if i == 0 {
            return 0;
        }
        // Ties go to the sharper level.
        if self.resolutions[i - 1] - resolution < resolution - self.resolutions[i] {
            (i - 1) as u8
        } else {
            i as u8
        }
    }

    fn tile_range_for_extent(&self, extent: &Extent, zoom: u8) -> TileRange {
        let zoom = zoom.min(self.max_zoom());
        let span = self.tile_span(zoom);
        let origin = self.origin();
        let (across_x, across_y) = self.tiles_across(span);

        let min_x = ((extent.min_x - origin.x) / span).floor() as i64;
        let max_x = ((extent.max_x - origin.x) / span).ceil() as i64 - 1;
        let min_y = ((origin.y - extent.max_y) / span).floor() as i64;
        let max_y = ((origin.y - extent.min_y) / span).ceil() as i64 - 1;

        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        let max_x = max_x.min(across_x - 1);
        let max_y = max_y.min(across_y - 1);

        if min_x > max_x || min_y > max_y {
            return TileRange::empty(zoom);
        }
        TileRange::new(
            zoom,
            min_x as u32,
            max_x as u32,
            min_y as u32,
            max_y as u32,
        )
    }

    fn resolution(&self, zoom: u8) -> f64 {
        let index = (zoom as usize).min(self.resolutions.len() - 1);
        self.resolutions[index]
    }

    fn tile_coord_center(&self, key: TileKey) -> Point {
        let span = self.tile_span(key.z);
        let origin = self.origin();
        Point::new(
            origin.x + (key.x as f64 + 0.5) * span,
            origin.y - (key.y as f64 + 0.5) * span,
        )
    }

    fn tile_extent(&self, key: TileKey) -> Extent {
        let span = self.tile_span(key.z);
        let origin = self.origin();
        let min_x = origin.x + key.x as f64 * span;
        let max_y = origin.y - key.y as f64 * span;
        Extent::new(min_x, max_y - span, min_x + span, max_y)
    }
}
