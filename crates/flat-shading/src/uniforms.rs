//! GPU-side data layouts shared with `scene.wgsl`.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Render mode numbers as seen by the shader.
pub mod mode {
    pub const WIREFRAME: u32 = 0;
    pub const SHADED: u32 = 1;
    pub const LIGHTED: u32 = 2;
    pub const GHOSTED: u32 = 3;
    pub const INSTANCE: u32 = 4;
}

/// Bits of [`ObjectSettings::visibility`].
pub mod visibility {
    pub const SHOW_POINTS: u32 = 1;
    pub const SHOW_LINES: u32 = 2;
    pub const SHOW_FACES: u32 = 4;
    pub const VISIBLE: u32 = 8;
    pub const ALL: u32 = SHOW_POINTS | SHOW_LINES | SHOW_FACES | VISIBLE;
}

/// Per-frame uniform (group 0, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniform {
    /// Combined projection * view
    pub view_proj: [[f32; 4]; 4],
    /// View matrix only
    pub view: [[f32; 4]; 4],
    /// Camera world position (w unused)
    pub camera_position: [f32; 4],
    /// Tint mixed into selected objects
    pub selection_color: [f32; 4],
    /// Multiplied into every fragment alpha (ghosted mode)
    pub global_opacity: f32,
    /// One of [`mode`]
    pub mode: u32,
    pub _pad: [u32; 2],
}

impl Default for FrameUniform {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
            camera_position: [0.0, 0.0, 0.0, 1.0],
            selection_color: [1.0, 0.6, 0.0, 1.0],
            global_opacity: 1.0,
            mode: mode::SHADED,
            _pad: [0; 2],
        }
    }
}

impl FrameUniform {
    pub fn new(proj: Mat4, view: Mat4, camera_position: glam::Vec3) -> Self {
        Self {
            view_proj: (proj * view).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            camera_position: camera_position.extend(1.0).to_array(),
            ..Default::default()
        }
    }
}

/// Per-object display state, one entry per object slot (group 1, binding 1).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectSettings {
    /// Picking color, rgb in 0..1; zero for locked objects
    pub instance_color: [f32; 4],
    pub opacity: f32,
    /// Non-zero when selected
    pub selected: u32,
    /// Bitset of [`visibility`]
    pub visibility: u32,
    pub _pad: u32,
}

impl Default for ObjectSettings {
    fn default() -> Self {
        Self {
            instance_color: [0.0; 4],
            opacity: 1.0,
            selected: 0,
            visibility: visibility::ALL,
            _pad: 0,
        }
    }
}

/// Screen-space vertex for the drag-box overlay. Position is in NDC.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct OverlayVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}
