//! Geometry kinds and the adapter that turns them into drawable arrays.
//!
//! Every concrete geometry implements [`GeometryAdapter`]; [`Geometry`] is the
//! closed set the scene stores and dispatches over.

use glam::Vec3;
use std::collections::HashSet;
use std::ops::{Index, IndexMut};

use super::object::ObjectStyle;
use crate::util::Bounds;

/// The four consolidated buffer kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Points,
    Lines,
    FrontFaces,
    BackFaces,
}

impl GeometryKind {
    pub const ALL: [GeometryKind; 4] = [
        GeometryKind::Points,
        GeometryKind::Lines,
        GeometryKind::FrontFaces,
        GeometryKind::BackFaces,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Element indices per primitive.
    pub fn arity(self) -> usize {
        match self {
            GeometryKind::Points => 1,
            GeometryKind::Lines => 2,
            GeometryKind::FrontFaces | GeometryKind::BackFaces => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GeometryKind::Points => "points",
            GeometryKind::Lines => "lines",
            GeometryKind::FrontFaces => "frontfaces",
            GeometryKind::BackFaces => "backfaces",
        }
    }

    pub fn is_faces(self) -> bool {
        matches!(self, GeometryKind::FrontFaces | GeometryKind::BackFaces)
    }
}

/// Positions, colors and element indices of one kind, local to the object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryArrays {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub elements: Vec<u32>,
}

impl GeometryArrays {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.elements.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Check internal consistency; the message names the first problem found.
    pub fn validate(&self, kind: GeometryKind) -> Result<(), String> {
        if self.colors.len() != self.positions.len() {
            return Err(format!(
                "{} colors for {} positions",
                self.colors.len(),
                self.positions.len()
            ));
        }
        if self.elements.len() % kind.arity() != 0 {
            return Err(format!(
                "element count {} is not a multiple of {}",
                self.elements.len(),
                kind.arity()
            ));
        }
        let count = self.positions.len() as u32;
        if let Some(bad) = self.elements.iter().find(|&&e| e >= count) {
            return Err(format!("element {bad} out of range for {count} vertices"));
        }
        if self.positions.iter().flatten().any(|c| !c.is_finite()) {
            return Err("non-finite position".to_string());
        }
        Ok(())
    }
}

/// Arrays for all four kinds of one object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectGeometry {
    arrays: [GeometryArrays; 4],
}

impl ObjectGeometry {
    pub fn iter(&self) -> impl Iterator<Item = (GeometryKind, &GeometryArrays)> {
        GeometryKind::ALL.into_iter().map(move |k| (k, &self.arrays[k.index()]))
    }

    /// Bounds over every kind's positions.
    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(
            self.arrays
                .iter()
                .flat_map(|a| a.positions.iter().map(|&p| Vec3::from_array(p))),
        )
    }

    pub fn validate(&self) -> Result<(), (GeometryKind, String)> {
        for (kind, arrays) in self.iter() {
            arrays.validate(kind).map_err(|reason| (kind, reason))?;
        }
        Ok(())
    }
}

impl Index<GeometryKind> for ObjectGeometry {
    type Output = GeometryArrays;
    fn index(&self, kind: GeometryKind) -> &GeometryArrays {
        &self.arrays[kind.index()]
    }
}

impl IndexMut<GeometryKind> for ObjectGeometry {
    fn index_mut(&mut self, kind: GeometryKind) -> &mut GeometryArrays {
        &mut self.arrays[kind.index()]
    }
}

/// Producer of drawable arrays for one geometry. Any kind may be empty.
pub trait GeometryAdapter {
    fn read_points(&self, style: &ObjectStyle) -> GeometryArrays;

    fn read_lines(&self, _style: &ObjectStyle) -> GeometryArrays {
        GeometryArrays::default()
    }

    fn read_frontfaces(&self, _style: &ObjectStyle) -> GeometryArrays {
        GeometryArrays::default()
    }

    /// Front faces with reversed winding and the backface color.
    fn read_backfaces(&self, style: &ObjectStyle) -> GeometryArrays {
        let mut arrays = self.read_frontfaces(style);
        for tri in arrays.elements.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
        let color = style.backface();
        arrays.colors.iter_mut().for_each(|c| *c = color);
        arrays
    }

    /// Local-space bounds.
    fn bounds(&self) -> Bounds;
}

fn to_arrays(points: &[Vec3]) -> Vec<[f32; 3]> {
    points.iter().map(|p| p.to_array()).collect()
}

/// Loose points with optional per-point colors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Vec3>,
    pub colors: Option<Vec<[f32; 4]>>,
}

impl GeometryAdapter for PointCloud {
    fn read_points(&self, style: &ObjectStyle) -> GeometryArrays {
        GeometryArrays {
            positions: to_arrays(&self.points),
            colors: self
                .colors
                .clone()
                .unwrap_or_else(|| vec![style.point_color; self.points.len()]),
            elements: (0..self.points.len() as u32).collect(),
        }
    }

    fn bounds(&self) -> Bounds {
        Bounds::from_points(self.points.iter().copied())
    }
}

/// Open or closed chain of segments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polyline {
    pub points: Vec<Vec3>,
    pub closed: bool,
}

impl GeometryAdapter for Polyline {
    fn read_points(&self, style: &ObjectStyle) -> GeometryArrays {
        GeometryArrays {
            positions: to_arrays(&self.points),
            colors: vec![style.point_color; self.points.len()],
            elements: (0..self.points.len() as u32).collect(),
        }
    }

    fn read_lines(&self, style: &ObjectStyle) -> GeometryArrays {
        let n = self.points.len() as u32;
        if n < 2 {
            return GeometryArrays::default();
        }
        let mut elements: Vec<u32> = (0..n - 1).flat_map(|i| [i, i + 1]).collect();
        if self.closed && n > 2 {
            elements.extend([n - 1, 0]);
        }
        GeometryArrays {
            positions: to_arrays(&self.points),
            colors: vec![style.line_color; self.points.len()],
            elements,
        }
    }

    fn bounds(&self) -> Bounds {
        Bounds::from_points(self.points.iter().copied())
    }
}

/// Polygon mesh; faces are vertex loops, counter-clockwise seen from the front.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Vec<u32>>,
}

impl Mesh {
    /// Unique undirected edges in first-seen order.
    fn edges(&self) -> Vec<[u32; 2]> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for face in &self.faces {
            let n = face.len();
            let segments = if n == 2 { 1 } else if n < 2 { 0 } else { n };
            for i in 0..segments {
                let (a, b) = (face[i], face[(i + 1) % n]);
                if seen.insert((a.min(b), a.max(b))) {
                    edges.push([a, b]);
                }
            }
        }
        edges
    }
}

impl GeometryAdapter for Mesh {
    fn read_points(&self, style: &ObjectStyle) -> GeometryArrays {
        GeometryArrays {
            positions: to_arrays(&self.vertices),
            colors: vec![style.point_color; self.vertices.len()],
            elements: (0..self.vertices.len() as u32).collect(),
        }
    }

    fn read_lines(&self, style: &ObjectStyle) -> GeometryArrays {
        GeometryArrays {
            positions: to_arrays(&self.vertices),
            colors: vec![style.line_color; self.vertices.len()],
            elements: self.edges().into_iter().flatten().collect(),
        }
    }

    /// Fan triangulation; valid for convex polygons.
    fn read_frontfaces(&self, style: &ObjectStyle) -> GeometryArrays {
        let mut elements = Vec::new();
        for face in self.faces.iter().filter(|f| f.len() >= 3) {
            for i in 1..face.len() - 1 {
                elements.extend([face[0], face[i], face[i + 1]]);
            }
        }
        GeometryArrays {
            positions: to_arrays(&self.vertices),
            colors: vec![style.face_color; self.vertices.len()],
            elements,
        }
    }

    fn bounds(&self) -> Bounds {
        Bounds::from_points(self.vertices.iter().copied())
    }
}

/// Axis-aligned box centred on the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cuboid {
    pub size: Vec3,
}

impl Cuboid {
    pub fn cube(edge: f32) -> Self {
        Self { size: Vec3::splat(edge) }
    }

    pub fn to_mesh(&self) -> Mesh {
        let h = self.size * 0.5;
        let vertices = vec![
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
        ];
        let faces = vec![
            vec![0, 3, 2, 1], // bottom (-z)
            vec![4, 5, 6, 7], // top (+z)
            vec![0, 1, 5, 4], // -y
            vec![1, 2, 6, 5], // +x
            vec![2, 3, 7, 6], // +y
            vec![3, 0, 4, 7], // -x
        ];
        Mesh { vertices, faces }
    }
}

impl GeometryAdapter for Cuboid {
    fn read_points(&self, style: &ObjectStyle) -> GeometryArrays {
        self.to_mesh().read_points(style)
    }

    fn read_lines(&self, style: &ObjectStyle) -> GeometryArrays {
        self.to_mesh().read_lines(style)
    }

    fn read_frontfaces(&self, style: &ObjectStyle) -> GeometryArrays {
        self.to_mesh().read_frontfaces(style)
    }

    fn bounds(&self) -> Bounds {
        Bounds::new(-self.size * 0.5, self.size * 0.5)
    }
}

/// Text label anchored at a point. Drawn by the shell, never buffered.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub text: String,
    pub anchor: Vec3,
    pub color: [f32; 4],
}

impl Tag {
    pub fn new(text: impl Into<String>, anchor: Vec3) -> Self {
        Self {
            text: text.into(),
            anchor,
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl GeometryAdapter for Tag {
    fn read_points(&self, _style: &ObjectStyle) -> GeometryArrays {
        GeometryArrays::default()
    }

    fn bounds(&self) -> Bounds {
        Bounds::new(self.anchor, self.anchor)
    }
}

/// Closed set of geometry kinds stored in the scene.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    PointCloud(PointCloud),
    Polyline(Polyline),
    Mesh(Mesh),
    Cuboid(Cuboid),
    Tag(Tag),
}

impl Geometry {
    fn adapter(&self) -> &dyn GeometryAdapter {
        match self {
            Geometry::PointCloud(g) => g,
            Geometry::Polyline(g) => g,
            Geometry::Mesh(g) => g,
            Geometry::Cuboid(g) => g,
            Geometry::Tag(g) => g,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::PointCloud(_) => "PointCloud",
            Geometry::Polyline(_) => "Polyline",
            Geometry::Mesh(_) => "Mesh",
            Geometry::Cuboid(_) => "Cuboid",
            Geometry::Tag(_) => "Tag",
        }
    }
}

impl GeometryAdapter for Geometry {
    fn read_points(&self, style: &ObjectStyle) -> GeometryArrays {
        self.adapter().read_points(style)
    }

    fn read_lines(&self, style: &ObjectStyle) -> GeometryArrays {
        self.adapter().read_lines(style)
    }

    fn read_frontfaces(&self, style: &ObjectStyle) -> GeometryArrays {
        self.adapter().read_frontfaces(style)
    }

    fn read_backfaces(&self, style: &ObjectStyle) -> GeometryArrays {
        self.adapter().read_backfaces(style)
    }

    fn bounds(&self) -> Bounds {
        self.adapter().bounds()
    }
}

impl From<PointCloud> for Geometry {
    fn from(g: PointCloud) -> Self {
        Geometry::PointCloud(g)
    }
}

impl From<Polyline> for Geometry {
    fn from(g: Polyline) -> Self {
        Geometry::Polyline(g)
    }
}

impl From<Mesh> for Geometry {
    fn from(g: Mesh) -> Self {
        Geometry::Mesh(g)
    }
}

impl From<Cuboid> for Geometry {
    fn from(g: Cuboid) -> Self {
        Geometry::Cuboid(g)
    }
}

impl From<Tag> for Geometry {
    fn from(g: Tag) -> Self {
        Geometry::Tag(g)
    }
}
