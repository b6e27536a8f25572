//! Scene objects and their display state.

use glam::{EulerRot, Mat4, Quat, Vec3};
use std::fmt;

use super::geometry::{Geometry, GeometryAdapter, GeometryKind, ObjectGeometry};

/// Stable identity of a scene object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// RGB picking key written by the instance pass.
///
/// `(0, 0, 0)` is reserved for the cleared background.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceColor(pub [u8; 3]);

impl InstanceColor {
    pub const BACKGROUND: Self = Self([0, 0, 0]);

    /// Color for the n-th pickable object (n >= 1), spread over 24 bits.
    pub fn from_index(n: u32) -> Self {
        assert!(n > 0 && n < (1 << 24), "instance index {n} outside 24-bit range");
        Self([(n & 0xff) as u8, ((n >> 8) & 0xff) as u8, ((n >> 16) & 0xff) as u8])
    }

    pub fn index(self) -> u32 {
        let [r, g, b] = self.0;
        r as u32 | (g as u32) << 8 | (b as u32) << 16
    }

    /// Normalized RGBA for the settings buffer.
    pub fn to_rgba(self) -> [f32; 4] {
        let [r, g, b] = self.0;
        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
    }

    pub fn is_background(self) -> bool {
        self == Self::BACKGROUND
    }
}

/// Per-object display options handed to the geometry adapter.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectStyle {
    pub show_points: bool,
    pub show_lines: bool,
    pub show_faces: bool,
    pub point_color: [f32; 4],
    pub line_color: [f32; 4],
    pub face_color: [f32; 4],
    /// Falls back to `face_color` when unset
    pub backface_color: Option<[f32; 4]>,
    pub opacity: f32,
}

impl Default for ObjectStyle {
    fn default() -> Self {
        Self {
            show_points: false,
            show_lines: true,
            show_faces: true,
            point_color: [0.1, 0.1, 0.1, 1.0],
            line_color: [0.15, 0.15, 0.15, 1.0],
            face_color: [0.75, 0.75, 0.78, 1.0],
            backface_color: None,
            opacity: 1.0,
        }
    }
}

impl ObjectStyle {
    pub fn with_face_color(mut self, color: [f32; 4]) -> Self {
        self.face_color = color;
        self
    }

    pub fn with_line_color(mut self, color: [f32; 4]) -> Self {
        self.line_color = color;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_points(mut self, show: bool) -> Self {
        self.show_points = show;
        self
    }

    pub fn backface(&self) -> [f32; 4] {
        self.backface_color.unwrap_or(self.face_color)
    }

    /// Visibility bits of the settings buffer (without the object-visible bit).
    pub fn kind_bits(&self) -> u32 {
        use flat_shading::visibility as v;
        let mut bits = 0;
        if self.show_points {
            bits |= v::SHOW_POINTS;
        }
        if self.show_lines {
            bits |= v::SHOW_LINES;
        }
        if self.show_faces {
            bits |= v::SHOW_FACES;
        }
        bits
    }
}

/// Local transform: scale, then XYZ Euler rotation, then translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    /// Euler angles in radians
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::ZYX, self.rotation.z, self.rotation.y, self.rotation.x);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.translation)
    }
}

/// One entity of the scene forest.
#[derive(Clone, Debug)]
pub struct SceneObject {
    pub(crate) id: ObjectId,
    pub name: String,
    pub geometry: Geometry,
    pub style: ObjectStyle,
    pub transform: Transform,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) children: Vec<ObjectId>,
    pub(crate) is_selected: bool,
    pub(crate) is_locked: bool,
    pub(crate) is_visible: bool,
    pub(crate) instance_color: InstanceColor,
}

impl SceneObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    pub fn is_selected(&self) -> bool {
        self.is_selected
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    pub fn instance_color(&self) -> InstanceColor {
        self.instance_color
    }

    /// Tags are drawn as screen labels, not through the consolidated buffers.
    pub fn is_tag(&self) -> bool {
        matches!(self.geometry, Geometry::Tag(_))
    }

    /// Run the geometry adapter for every kind.
    pub fn read_geometry(&self) -> ObjectGeometry {
        let g = &self.geometry;
        let s = &self.style;
        let mut out = ObjectGeometry::default();
        out[GeometryKind::Points] = g.read_points(s);
        out[GeometryKind::Lines] = g.read_lines(s);
        out[GeometryKind::FrontFaces] = g.read_frontfaces(s);
        out[GeometryKind::BackFaces] = g.read_backfaces(s);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_color_roundtrip_edges() {
        for n in [1u32, 255, 256, 65_535, 65_536, (1 << 24) - 1] {
            let c = InstanceColor::from_index(n);
            assert_eq!(c.index(), n);
            assert!(!c.is_background());
        }
    }

    #[test]
    #[should_panic(expected = "outside 24-bit range")]
    fn test_instance_color_zero_reserved() {
        let _ = InstanceColor::from_index(0);
    }

    #[test]
    fn test_instance_color_rgba_exact_in_unorm8() {
        let c = InstanceColor([3, 128, 255]);
        let rgba = c.to_rgba();
        let back: Vec<u8> = rgba[..3].iter().map(|v| (v * 255.0).round() as u8).collect();
        assert_eq!(back, vec![3, 128, 255]);
    }

    #[test]
    fn test_transform_order() {
        let t = Transform {
            translation: Vec3::new(1.0, 0.0, 0.0),
            rotation: Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };
        let p = t.to_matrix().transform_point3(Vec3::X);
        // scale 2 -> (2,0,0), rotate 90deg about Z -> (0,2,0), translate -> (1,2,0)
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_style_kind_bits() {
        use flat_shading::visibility as v;
        let s = ObjectStyle::default();
        assert_eq!(s.kind_bits(), v::SHOW_LINES | v::SHOW_FACES);
        let s = s.with_points(true);
        assert_eq!(s.kind_bits(), v::SHOW_POINTS | v::SHOW_LINES | v::SHOW_FACES);
    }
}
