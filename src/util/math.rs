//! Bounding boxes and geometry fingerprints.

use glam::{Mat4, Vec3};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Axis-aligned bounding box.
#[derive(Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Empty box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box enclosing all points; empty for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut b = Self::EMPTY;
        for p in points {
            b.expand_by_point(p);
        }
        b
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Half the diagonal length.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.size().length() * 0.5
    }

    /// Box enclosing the eight transformed corners.
    pub fn transformed(&self, m: Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let (a, b) = (self.min, self.max);
        Self::from_points(
            [
                Vec3::new(a.x, a.y, a.z),
                Vec3::new(b.x, a.y, a.z),
                Vec3::new(a.x, b.y, a.z),
                Vec3::new(b.x, b.y, a.z),
                Vec3::new(a.x, a.y, b.z),
                Vec3::new(b.x, a.y, b.z),
                Vec3::new(a.x, b.y, b.z),
                Vec3::new(b.x, b.y, b.z),
            ]
            .into_iter()
            .map(|p| m.transform_point3(p)),
        )
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bounds({:?} - {:?})", self.min, self.max)
    }
}

/// Fingerprint of a slice of plain values, compared bit-for-bit.
pub fn content_hash<T: bytemuck::Pod>(values: &[T]) -> u64 {
    let mut hasher = DefaultHasher::new();
    let bytes: &[u8] = bytemuck::cast_slice(values);
    bytes.len().hash(&mut hasher);
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_expand() {
        let mut b = Bounds::EMPTY;
        assert!(b.is_empty());
        b.expand_by_point(Vec3::new(1.0, -2.0, 0.5));
        b.expand_by_point(Vec3::new(-1.0, 2.0, 0.0));
        assert!(!b.is_empty());
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 0.5));
        assert_eq!(b.center(), Vec3::new(0.0, 0.0, 0.25));
    }

    #[test]
    fn test_bounds_transformed() {
        let b = Bounds::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let t = b.transformed(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(t.center(), Vec3::new(10.0, 0.0, 0.0));
        assert!(Bounds::EMPTY.transformed(Mat4::IDENTITY).is_empty());
    }

    #[test]
    fn test_content_hash() {
        let a = [1.0f32, 2.0, 3.0];
        let b = [1.0f32, 2.0, 3.5];
        assert_eq!(content_hash(&a), content_hash(&a));
        assert_ne!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash::<u32>(&[]), content_hash(&[0u32]));
    }
}
