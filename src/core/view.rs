//! View state and the per-tick frame records built from it

use crate::core::geo::{Extent, Point, Size, TileKey};
use crate::prelude::HashMap;
use crate::tiles::source::SourceId;
use serde::{Deserialize, Serialize};

/// Camera of the map: center in map units, resolution in map units per pixel,
/// rotation in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub center: Point,
    pub resolution: f64,
    pub rotation: f64,
}

impl ViewState {
    pub fn new(center: Point, resolution: f64, rotation: f64) -> Self {
        Self {
            center,
            resolution,
            rotation,
        }
    }

    /// Moves the center by a screen-space offset in pixels (x right, y down)
    pub fn pan_by_pixels(&mut self, dx: f64, dy: f64) {
        let delta = Point::new(dx * self.resolution, -dy * self.resolution).rotate(self.rotation);
        self.center = self.center.add(&delta);
    }

    /// Multiplies the resolution; factors above 1 zoom out. Non-positive or
    /// non-finite factors are ignored.
    pub fn zoom_by(&mut self, factor: f64) {
        if factor.is_finite() && factor > 0.0 {
            self.resolution *= factor;
        }
    }

    /// Map extent covered by a surface of `size` pixels, taking rotation into account
    pub fn extent_for_size(&self, size: Size) -> Extent {
        let half_w = self.resolution * size.width as f64 / 2.0;
        let half_h = self.resolution * size.height as f64 / 2.0;
        let corners = [
            Point::new(-half_w, -half_h),
            Point::new(-half_w, half_h),
            Point::new(half_w, half_h),
            Point::new(half_w, -half_h),
        ];
        Extent::bounding(
            corners
                .iter()
                .map(|c| c.rotate(self.rotation).add(&self.center)),
        )
        .unwrap_or_else(|| Extent::new(self.center.x, self.center.y, self.center.x, self.center.y))
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(Point::default(), 1.0, 0.0)
    }
}

/// Tiles marked wanted during one tick, keyed by tile source
#[derive(Debug, Clone, Default)]
pub struct WantedTileSet {
    by_source: HashMap<SourceId, HashMap<TileKey, bool>>,
}

impl WantedTileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wanted map for `source`, created on first sight of the source
    pub fn for_source(&mut self, source: SourceId) -> &mut HashMap<TileKey, bool> {
        self.by_source.entry(source).or_default()
    }

    pub fn get(&self, source: SourceId) -> Option<&HashMap<TileKey, bool>> {
        self.by_source.get(&source)
    }

    pub fn is_wanted(&self, source: SourceId, key: &TileKey) -> bool {
        self.get(source)
            .and_then(|tiles| tiles.get(key).copied())
            .unwrap_or(false)
    }

    pub fn contains_source(&self, source: SourceId) -> bool {
        self.by_source.contains_key(&source)
    }

    /// Total number of wanted entries across all sources
    pub fn len(&self) -> usize {
        self.by_source
            .values()
            .map(|tiles| tiles.values().filter(|wanted| **wanted).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One tick's render-request context, built fresh by the control thread
#[derive(Debug, Clone)]
pub struct FrameState {
    pub size: Size,
    pub view_state: ViewState,
    /// Visible map extent for `size` and `view_state`
    pub extent: Extent,
    pub wanted_tiles: WantedTileSet,
    /// Set when the host scheduler should revisit on the next tick
    pub animate: bool,
}

impl FrameState {
    pub fn new(size: Size, view_state: ViewState) -> Self {
        Self {
            size,
            view_state,
            extent: view_state.extent_for_size(size),
            wanted_tiles: WantedTileSet::new(),
            animate: false,
        }
    }
}

/// The view and size a render worker consumes; replaced wholesale on every update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub size: Size,
    pub view_state: ViewState,
}

impl RenderSnapshot {
    pub fn new(size: Size, view_state: ViewState) -> Self {
        Self { size, view_state }
    }

    /// Column-major 4x4 matrix taking map coordinates to clip space:
    /// translate by -center, rotate by -rotation, scale by 2 / (size · resolution)
    pub fn view_matrix(&self) -> [[f32; 4]; 4] {
        let view = &self.view_state;
        let width = (self.size.width.max(1) as f64) * view.resolution;
        let height = (self.size.height.max(1) as f64) * view.resolution;
        let sx = 2.0 / width;
        let sy = 2.0 / height;
        let (sin, cos) = view.rotation.sin_cos();

        let m00 = sx * cos;
        let m01 = sx * sin;
        let m10 = -sy * sin;
        let m11 = sy * cos;
        let tx = -(m00 * view.center.x + m01 * view.center.y);
        let ty = -(m10 * view.center.x + m11 * view.center.y);

        [
            [m00 as f32, m10 as f32, 0.0, 0.0],
            [m01 as f32, m11 as f32, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [tx as f32, ty as f32, 0.0, 1.0],
        ]
    }
}

impl From<&FrameState> for RenderSnapshot {
    fn from(frame_state: &FrameState) -> Self {
        Self::new(frame_state.size, frame_state.view_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(m: &[[f32; 4]; 4], p: Point) -> (f32, f32) {
        let (x, y) = (p.x as f32, p.y as f32);
        (
            m[0][0] * x + m[1][0] * y + m[3][0],
            m[0][1] * x + m[1][1] * y + m[3][1],
        )
    }

    #[test]
    fn test_extent_for_unrotated_view() {
        let view = ViewState::new(Point::new(100.0, 50.0), 2.0, 0.0);
        let extent = view.extent_for_size(Size::new(800, 600));
        assert_eq!(extent, Extent::new(-700.0, -550.0, 900.0, 650.0));
    }

    #[test]
    fn test_extent_grows_when_rotated() {
        let view = ViewState::new(Point::default(), 1.0, std::f64::consts::FRAC_PI_4);
        let extent = view.extent_for_size(Size::new(100, 100));
        let expected = 100.0 * std::f64::consts::SQRT_2;
        assert!((extent.width() - expected).abs() < 1e-9);
        assert!((extent.height() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_pan_and_zoom() {
        let mut view = ViewState::new(Point::default(), 2.0, 0.0);
        view.pan_by_pixels(10.0, 5.0);
        assert_eq!(view.center, Point::new(20.0, -10.0));

        view.zoom_by(0.5);
        assert_eq!(view.resolution, 1.0);
        view.zoom_by(0.0);
        view.zoom_by(f64::NAN);
        assert_eq!(view.resolution, 1.0);
    }

    #[test]
    fn test_view_matrix_maps_center_and_edges() {
        let view = ViewState::new(Point::new(1000.0, -500.0), 4.0, 0.0);
        let snapshot = RenderSnapshot::new(Size::new(200, 100), view);
        let m = snapshot.view_matrix();

        let (cx, cy) = apply(&m, view.center);
        assert!(cx.abs() < 1e-5 && cy.abs() < 1e-5);

        let (rx, _) = apply(&m, Point::new(1000.0 + 400.0, -500.0));
        assert!((rx - 1.0).abs() < 1e-5);
        let (_, ty) = apply(&m, Point::new(1000.0, -500.0 + 200.0));
        assert!((ty - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_wanted_tile_set_is_lazy_per_source() {
        let mut wanted = WantedTileSet::new();
        let source = SourceId::from_raw(7);
        assert!(!wanted.contains_source(source));

        wanted.for_source(source).insert(TileKey::new(1, 0, 0), true);
        assert!(wanted.contains_source(source));
        assert!(wanted.is_wanted(source, &TileKey::new(1, 0, 0)));
        assert!(!wanted.is_wanted(source, &TileKey::new(1, 1, 0)));
        assert_eq!(wanted.len(), 1);
    }
}
