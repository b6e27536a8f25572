//! Opaque/transparent partition and back-to-front ordering.

use glam::{Mat4, Vec3};

use crate::buffers::BufferManager;
use crate::scene::Scene;

/// Bounding-box centres per buffered slot, valid for one combination of
/// scene membership, transform, data and buffer generations.
#[derive(Debug, Default)]
pub struct DrawOrderCache {
    key: Option<[u64; 4]>,
    /// World-space centre per slot index
    centers: Vec<Vec3>,
    rebuilds: u64,
}

/// Slots for one frame, in draw order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawOrder {
    pub opaque: Vec<u32>,
    /// Farthest first
    pub transparent: Vec<u32>,
}

impl DrawOrderCache {
    /// Number of centre recomputations so far.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    fn refresh(&mut self, scene: &Scene, buffers: &BufferManager) {
        let key = [
            scene.membership_generation(),
            scene.transform_generation(),
            scene.data_generation(),
            buffers.generation(),
        ];
        if self.key == Some(key) && self.centers.len() == buffers.len() {
            return;
        }
        self.centers = buffers
            .slots()
            .iter()
            .map(|slot| {
                let world = scene.world_transform(slot.id);
                slot.local_bounds.transformed(world).center()
            })
            .collect();
        self.key = Some(key);
        self.rebuilds += 1;
    }

    /// Split visible slots by effective opacity and sort the transparent ones
    /// by view-space depth of their centre.
    pub fn order(&mut self, scene: &Scene, buffers: &BufferManager, view: Mat4, global_opacity: f32) -> DrawOrder {
        self.refresh(scene, buffers);
        let mut out = DrawOrder::default();
        let mut transparent: Vec<(f32, u32)> = Vec::new();
        for slot in buffers.slots() {
            let Some(object) = scene.get(slot.id) else {
                continue;
            };
            if !object.is_visible() {
                continue;
            }
            if object.style.opacity * global_opacity < 1.0 {
                let center = self.centers.get(slot.index as usize).copied().unwrap_or_default();
                // camera looks down -Z: more negative is farther
                let depth = view.transform_point3(center).z;
                transparent.push((depth, slot.index));
            } else {
                out.opaque.push(slot.index);
            }
        }
        transparent.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        out.transparent = transparent.into_iter().map(|(_, i)| i).collect();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Cuboid, ObjectStyle, Transform};

    fn row_of_cubes(opacity: f32) -> (Scene, BufferManager) {
        let mut scene = Scene::new();
        for x in [0.0, 5.0, -5.0] {
            let id = scene.add("cube", Cuboid::cube(1.0), ObjectStyle::default().with_opacity(opacity));
            scene.set_transform(id, Transform::from_translation(Vec3::new(x, 0.0, 0.0))).unwrap();
        }
        let mut bm = BufferManager::new();
        assert!(bm.add_scene(&scene).is_empty());
        (scene, bm)
    }

    /// Camera on +X looking at the origin.
    fn view_from_plus_x() -> Mat4 {
        Mat4::look_at_rh(Vec3::new(20.0, 0.0, 0.0), Vec3::ZERO, Vec3::Z)
    }

    #[test]
    fn test_transparent_back_to_front() {
        let (scene, bm) = row_of_cubes(0.5);
        let mut cache = DrawOrderCache::default();
        let order = cache.order(&scene, &bm, view_from_plus_x(), 1.0);
        assert!(order.opaque.is_empty());
        // slot 2 sits at x=-5 (farthest), slot 1 at x=5 (nearest)
        assert_eq!(order.transparent, vec![2, 0, 1]);
    }

    #[test]
    fn test_opaque_unless_global_opacity_lowers_it() {
        let (scene, bm) = row_of_cubes(1.0);
        let mut cache = DrawOrderCache::default();
        let order = cache.order(&scene, &bm, view_from_plus_x(), 1.0);
        assert_eq!(order.opaque, vec![0, 1, 2]);
        assert!(order.transparent.is_empty());

        let ghosted = cache.order(&scene, &bm, view_from_plus_x(), 0.3);
        assert!(ghosted.opaque.is_empty());
        assert_eq!(ghosted.transparent.len(), 3);
    }

    #[test]
    fn test_hidden_objects_skipped() {
        let (mut scene, bm) = row_of_cubes(1.0);
        let id = scene.ids()[1];
        scene.set_visible(id, false).unwrap();
        let order = DrawOrderCache::default().order(&scene, &bm, Mat4::IDENTITY, 1.0);
        assert_eq!(order.opaque, vec![0, 2]);
    }

    #[test]
    fn test_cache_reused_until_generation_changes() {
        let (mut scene, bm) = row_of_cubes(0.5);
        let mut cache = DrawOrderCache::default();
        cache.order(&scene, &bm, view_from_plus_x(), 1.0);
        cache.order(&scene, &bm, Mat4::IDENTITY, 1.0);
        assert_eq!(cache.rebuilds(), 1);

        let id = scene.ids()[0];
        scene
            .set_transform(id, Transform::from_translation(Vec3::new(-10.0, 0.0, 0.0)))
            .unwrap();
        let order = cache.order(&scene, &bm, view_from_plus_x(), 1.0);
        assert_eq!(cache.rebuilds(), 2);
        assert_eq!(order.transparent, vec![0, 2, 1]);
    }
}
