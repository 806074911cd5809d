//! Display-time correction for render lag
//!
//! The worker always draws a view that is somewhat older than the one the
//! control thread currently shows. The bitmap it produced is therefore
//! scaled, rotated and shifted so that it lines up with the current view
//! until a fresher render arrives.

use crate::core::view::ViewState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompensationTransform {
    /// Horizontal shift in pixels
    pub dx: f64,
    /// Vertical shift in pixels (screen y grows downwards)
    pub dy: f64,
    pub scale: f64,
    /// Rotation in radians
    pub d_rot: f64,
}

impl CompensationTransform {
    pub fn identity() -> Self {
        Self {
            dx: 0.0,
            dy: 0.0,
            scale: 1.0,
            d_rot: 0.0,
        }
    }

    /// Transform mapping a bitmap rendered for `rendered` onto `current`
    pub fn compute(current: &ViewState, rendered: &ViewState) -> Self {
        let resolution = current.resolution;
        Self {
            dx: (rendered.center.x - current.center.x) / resolution,
            dy: (current.center.y - rendered.center.y) / resolution,
            scale: rendered.resolution / resolution,
            d_rot: current.rotation - rendered.rotation,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// 2x3 affine matrix `[a, b, c, d, e, f]`: uniform scale, then rotation,
    /// then translation by `(dx, dy)`
    pub fn to_matrix(&self) -> [f64; 6] {
        let (sin, cos) = self.d_rot.sin_cos();
        [
            self.scale * cos,
            self.scale * sin,
            -self.scale * sin,
            self.scale * cos,
            self.dx,
            self.dy,
        ]
    }

    /// Maps a pixel of the rendered bitmap to its position in the current view
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.to_matrix();
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// CSS-style `matrix(a, b, c, d, e, f)` string
    pub fn to_css_string(&self) -> String {
        let [a, b, c, d, e, f] = self.to_matrix();
        format!("matrix({}, {}, {}, {}, {}, {})", a, b, c, d, e, f)
    }
}

impl Default for CompensationTransform {
    fn default() -> Self {
        Self::identity()
    }
}
