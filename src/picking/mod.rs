//! GPU picking.
//!
//! The scene is drawn once more into an offscreen `Rgba8Unorm` target with
//! every object writing only its [`InstanceColor`]. The requested rectangle is
//! read back, reduced to its distinct colors and mapped to objects through the
//! scene's instance map. Background and locked objects map to nothing.

mod readback;
mod selection;

pub use readback::InstanceTarget;
pub use selection::{apply_selection, SelectionAction};

use glam::Vec2;
use std::collections::HashMap;

use crate::scene::{InstanceColor, ObjectId, Scene};

/// Default minimum pixel count for a color inside a drag box.
pub const DEFAULT_NOISE_THRESHOLD: u32 = 3;

/// Pick rectangle in logical (unscaled) screen coordinates, origin top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickRect {
    pub min: Vec2,
    pub max: Vec2,
}

/// Rectangle in framebuffer pixels, inside the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

impl PickRect {
    /// Single-pixel pick at `p`.
    pub fn point(p: Vec2) -> Self {
        Self { min: p, max: p }
    }

    /// Drag box between two corners in any order.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn is_point(&self) -> bool {
        self.min == self.max
    }

    /// Scale by the device pixel ratio and clamp to the viewport.
    ///
    /// A point covers the one pixel it falls in. Returns `None` when nothing
    /// of the rectangle lies inside the viewport.
    pub fn to_pixels(&self, pixels_per_point: f32, viewport: (u32, u32)) -> Option<PixelRect> {
        let (vw, vh) = viewport;
        if vw == 0 || vh == 0 {
            return None;
        }
        let dpr = if pixels_per_point > 0.0 { pixels_per_point } else { 1.0 };
        let min = (self.min * dpr).floor();
        let max = if self.is_point() {
            min + Vec2::ONE
        } else {
            (self.max * dpr).ceil().max(min + Vec2::ONE)
        };

        if max.x <= 0.0 || max.y <= 0.0 || min.x >= vw as f32 || min.y >= vh as f32 {
            return None;
        }
        let x0 = min.x.max(0.0) as u32;
        let y0 = min.y.max(0.0) as u32;
        let x1 = (max.x as u32).min(vw);
        let y1 = (max.y as u32).min(vh);
        Some(PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Distinct instance colors in `pixels`, most frequent first.
///
/// The background is never reported. When `filter_noise` is set, colors
/// covering fewer than `threshold` pixels are dropped as edge artifacts.
pub fn distinct_colors(pixels: &[[u8; 4]], threshold: u32, filter_noise: bool) -> Vec<InstanceColor> {
    let mut counts: HashMap<InstanceColor, u32> = HashMap::new();
    for p in pixels {
        let color = InstanceColor([p[0], p[1], p[2]]);
        if !color.is_background() {
            *counts.entry(color).or_default() += 1;
        }
    }
    let mut colors: Vec<(InstanceColor, u32)> = counts
        .into_iter()
        .filter(|&(_, n)| !filter_noise || n >= threshold)
        .collect();
    colors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    colors.into_iter().map(|(c, _)| c).collect()
}

/// Owners of `colors`; unmapped colors are ignored.
pub fn resolve(scene: &Scene, colors: &[InstanceColor]) -> Vec<ObjectId> {
    colors.iter().filter_map(|&c| scene.resolve_color(c)).collect()
}

/// Picking state: the noise threshold and the reusable offscreen target.
pub struct Selector {
    pub noise_threshold: u32,
    target: Option<InstanceTarget>,
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_THRESHOLD)
    }
}

impl Selector {
    pub fn new(noise_threshold: u32) -> Self {
        Self {
            noise_threshold,
            target: None,
        }
    }

    /// Objects covering the pixels read back for `rect`, most pixels first.
    pub fn resolve_pixels(&self, scene: &Scene, rect: PixelRect, pixels: &[[u8; 4]]) -> Vec<ObjectId> {
        let colors = distinct_colors(pixels, self.noise_threshold, rect.area() > 1);
        resolve(scene, &colors)
    }

    pub(crate) fn target_mut(&mut self) -> &mut Option<InstanceTarget> {
        &mut self.target
    }
}
