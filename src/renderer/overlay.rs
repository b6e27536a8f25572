//! Screen-space drag box, drawn after the scene without depth.

use flat_shading::OverlayVertex;
use glam::Vec2;

const FILL: [f32; 4] = [0.3, 0.55, 1.0, 0.15];
const OUTLINE: [f32; 4] = [0.3, 0.55, 1.0, 0.9];

/// Drag box corners in framebuffer pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragBox {
    pub min: Vec2,
    pub max: Vec2,
}

fn to_ndc(p: Vec2, viewport: (u32, u32)) -> [f32; 2] {
    let w = viewport.0.max(1) as f32;
    let h = viewport.1.max(1) as f32;
    [p.x / w * 2.0 - 1.0, 1.0 - p.y / h * 2.0]
}

/// Triangle-list fill and line-list outline for `rect`.
pub fn drag_box_vertices(rect: DragBox, viewport: (u32, u32)) -> (Vec<OverlayVertex>, Vec<OverlayVertex>) {
    let corners = [
        rect.min,
        Vec2::new(rect.max.x, rect.min.y),
        rect.max,
        Vec2::new(rect.min.x, rect.max.y),
    ]
    .map(|p| to_ndc(p, viewport));
    let v = |i: usize, color: [f32; 4]| OverlayVertex {
        position: corners[i],
        color,
    };
    let fill = [0, 1, 2, 0, 2, 3].map(|i| v(i, FILL)).to_vec();
    let outline = [0, 1, 1, 2, 2, 3, 3, 0].map(|i| v(i, OUTLINE)).to_vec();
    (fill, outline)
}
