//! Consolidated geometry buffers.
//!
//! Every buffered object appends its points, lines, front faces and back faces
//! to four shared arrays. Each vertex carries the object's slot index, which
//! the vertex shader uses to fetch the slot's world transform and
//! [`ObjectSettings`] from storage buffers. A whole scene is therefore drawn
//! with at most four indexed draws per pass.
//!
//! Transform, settings and same-size data edits become [`PendingWrite`]s at
//! byte offsets inside the existing GPU buffers; anything that changes vertex
//! or element counts requires [`BufferManager::clear`] plus a rebuild.

mod draw;
mod gpu;

pub use draw::{DrawCommand, DrawSet};
pub use gpu::{GpuBuffers, ShaderSet};

use flat_shading::{visibility, ObjectSettings};
use glam::Mat4;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::scene::{GeometryArrays, GeometryKind, ObjectGeometry, ObjectId, Scene, SceneObject};
use crate::util::{content_hash, Bounds, Error, Result};

/// Vertex and element span of one object inside one kind's arrays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindRange {
    pub vertex_start: u32,
    pub vertex_count: u32,
    pub element_start: u32,
    pub element_count: u32,
}

impl KindRange {
    pub fn elements(&self) -> std::ops::Range<u32> {
        self.element_start..self.element_start + self.element_count
    }
}

/// Flat arrays of one geometry kind for the whole scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsolidatedArrays {
    /// xyz per vertex
    pub positions: Vec<f32>,
    /// rgba per vertex
    pub colors: Vec<f32>,
    /// Absolute vertex indices
    pub elements: Vec<u32>,
    /// Slot index per vertex
    pub object_index: Vec<u32>,
}

impl ConsolidatedArrays {
    pub fn vertex_count(&self) -> u32 {
        (self.positions.len() / 3) as u32
    }

    pub fn element_count(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Append local arrays, offsetting elements by the running vertex count.
    fn append(&mut self, slot: u32, arrays: &GeometryArrays) -> KindRange {
        let range = KindRange {
            vertex_start: self.vertex_count(),
            vertex_count: arrays.positions.len() as u32,
            element_start: self.element_count(),
            element_count: arrays.elements.len() as u32,
        };
        self.positions.extend(arrays.positions.iter().flatten());
        self.colors.extend(arrays.colors.iter().flatten());
        self.elements.extend(arrays.elements.iter().map(|e| e + range.vertex_start));
        self.object_index
            .extend(std::iter::repeat(slot).take(arrays.positions.len()));
        range
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.elements.clear();
        self.object_index.clear();
    }
}

/// Bookkeeping for one buffered object.
#[derive(Clone, Debug)]
pub struct ObjectSlot {
    pub id: ObjectId,
    pub index: u32,
    pub ranges: [KindRange; 4],
    /// Hash of the local element arrays; topology fingerprint
    element_hash: [u64; 4],
    /// Hash of positions and colors, to skip no-op data writes
    data_hash: [u64; 4],
    pub local_bounds: Bounds,
}

impl ObjectSlot {
    pub fn range(&self, kind: GeometryKind) -> KindRange {
        self.ranges[kind.index()]
    }
}

/// Destination of a partial upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferTarget {
    Positions(GeometryKind),
    Colors(GeometryKind),
    Transforms,
    Settings,
}

/// Bytes waiting to be written into an existing GPU buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingWrite {
    pub target: BufferTarget,
    pub offset: u64,
    pub bytes: Vec<u8>,
}

const TRANSFORM_STRIDE: u64 = std::mem::size_of::<[[f32; 4]; 4]>() as u64;
const SETTINGS_STRIDE: u64 = std::mem::size_of::<ObjectSettings>() as u64;

/// Owner of the consolidated arrays and their GPU copies.
#[derive(Default)]
pub struct BufferManager {
    kinds: [ConsolidatedArrays; 4],
    transforms: Vec<[[f32; 4]; 4]>,
    settings: Vec<ObjectSettings>,
    slots: Vec<ObjectSlot>,
    lookup: HashMap<ObjectId, usize>,
    pending: Vec<PendingWrite>,
    gpu: Option<GpuBuffers>,
    /// Incremented by every `create_buffers`
    generation: u64,
}

impl BufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all arrays and slots. GPU buffers stay until the next upload.
    pub fn clear(&mut self) {
        for k in &mut self.kinds {
            k.clear();
        }
        self.transforms.clear();
        self.settings.clear();
        self.slots.clear();
        self.lookup.clear();
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.lookup.contains_key(&id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn kind(&self, kind: GeometryKind) -> &ConsolidatedArrays {
        &self.kinds[kind.index()]
    }

    pub fn transforms(&self) -> &[[[f32; 4]; 4]] {
        &self.transforms
    }

    pub fn settings(&self) -> &[ObjectSettings] {
        &self.settings
    }

    pub fn slots(&self) -> &[ObjectSlot] {
        &self.slots
    }

    pub fn slot(&self, id: ObjectId) -> Option<&ObjectSlot> {
        self.lookup.get(&id).map(|&i| &self.slots[i])
    }

    pub fn pending_writes(&self) -> &[PendingWrite] {
        &self.pending
    }

    pub fn gpu(&self) -> Option<&GpuBuffers> {
        self.gpu.as_ref()
    }

    /// Settings record derived from the object's current state.
    pub fn settings_for(object: &SceneObject) -> ObjectSettings {
        let mut bits = object.style.kind_bits();
        if object.is_visible() {
            bits |= visibility::VISIBLE;
        }
        let instance_color = if object.is_locked() {
            [0.0; 4]
        } else {
            object.instance_color().to_rgba()
        };
        ObjectSettings {
            instance_color,
            opacity: object.style.opacity,
            selected: object.is_selected() as u32,
            visibility: bits,
            _pad: 0,
        }
    }

    /// Append one object's geometry. Malformed geometry rejects the object
    /// and leaves the arrays untouched.
    pub fn add_object(&mut self, object: &SceneObject, world: Mat4) -> Result<u32> {
        let geometry = object.read_geometry();
        self.add_object_geometry(object, &geometry, world)
    }

    fn add_object_geometry(&mut self, object: &SceneObject, geometry: &ObjectGeometry, world: Mat4) -> Result<u32> {
        assert!(
            !self.lookup.contains_key(&object.id()),
            "object {} is already buffered",
            object.id()
        );
        geometry
            .validate()
            .map_err(|(kind, reason)| Error::malformed(object.id(), kind.label(), reason))?;

        let index = self.slots.len() as u32;
        let mut ranges = [KindRange::default(); 4];
        let mut element_hash = [0; 4];
        let mut data_hash = [0; 4];
        for (kind, arrays) in geometry.iter() {
            ranges[kind.index()] = self.kinds[kind.index()].append(index, arrays);
            element_hash[kind.index()] = content_hash(&arrays.elements);
            data_hash[kind.index()] = data_fingerprint(arrays);
        }

        self.transforms.push(world.to_cols_array_2d());
        self.settings.push(Self::settings_for(object));
        self.lookup.insert(object.id(), self.slots.len());
        self.slots.push(ObjectSlot {
            id: object.id(),
            index,
            ranges,
            element_hash,
            data_hash,
            local_bounds: geometry.bounds(),
        });
        Ok(index)
    }

    /// Buffer every non-tag object of the scene in order. Geometry is read in
    /// parallel; rejected objects are logged and returned.
    pub fn add_scene(&mut self, scene: &Scene) -> Vec<Error> {
        let objects: Vec<&SceneObject> = scene.iter().filter(|o| !o.is_tag()).collect();
        let read: Vec<ObjectGeometry> = objects.par_iter().map(|o| o.read_geometry()).collect();

        let mut rejected = Vec::new();
        for (object, geometry) in objects.into_iter().zip(read) {
            let world = scene.world_transform(object.id());
            if let Err(e) = self.add_object_geometry(object, &geometry, world) {
                warn!("rejected {}: {}", object.name, e);
                rejected.push(e);
            }
        }
        rejected
    }

    /// Upload all arrays, replacing previous GPU buffers.
    pub fn create_buffers(&mut self, device: &wgpu::Device, objects_layout: &wgpu::BindGroupLayout) {
        self.gpu = Some(GpuBuffers::new(device, objects_layout, self));
        self.pending.clear();
        self.generation += 1;
        debug!(
            "create_buffers gen={} objects={} points={} lines={} faces={}+{}",
            self.generation,
            self.slots.len(),
            self.kind(GeometryKind::Points).element_count(),
            self.kind(GeometryKind::Lines).element_count() / 2,
            self.kind(GeometryKind::FrontFaces).element_count() / 3,
            self.kind(GeometryKind::BackFaces).element_count() / 3,
        );
    }

    fn slot_position(&self, id: ObjectId) -> Result<usize> {
        self.lookup.get(&id).copied().ok_or(Error::UnknownObject(id))
    }

    /// Replace one slot's world matrix.
    pub fn update_object_transform(&mut self, id: ObjectId, world: Mat4) -> Result<()> {
        let slot = self.slot_position(id)?;
        let cols = world.to_cols_array_2d();
        if self.transforms[slot] == cols {
            return Ok(());
        }
        self.transforms[slot] = cols;
        self.pending.push(PendingWrite {
            target: BufferTarget::Transforms,
            offset: slot as u64 * TRANSFORM_STRIDE,
            bytes: bytemuck::bytes_of(&cols).to_vec(),
        });
        Ok(())
    }

    /// True when `geometry` has the same counts and element indices as the
    /// buffered slot, so it can be written in place.
    pub fn matches_layout(&self, id: ObjectId, geometry: &ObjectGeometry) -> bool {
        let Some(slot) = self.slot(id) else {
            return false;
        };
        geometry.iter().all(|(kind, arrays)| {
            let r = slot.range(kind);
            r.vertex_count as usize == arrays.positions.len()
                && r.element_count as usize == arrays.elements.len()
                && slot.element_hash[kind.index()] == content_hash(&arrays.elements)
        })
    }

    /// Overwrite one object's positions and colors in place.
    ///
    /// Returns whether anything changed. Panics if counts or element indices
    /// differ from the buffered slot: structural changes need a rebuild.
    pub fn update_object_data(&mut self, id: ObjectId, geometry: &ObjectGeometry) -> Result<bool> {
        let pos = self.slot_position(id)?;
        geometry
            .validate()
            .map_err(|(kind, reason)| Error::malformed(id, kind.label(), reason))?;

        self.slots[pos].local_bounds = geometry.bounds();
        let mut changed = false;
        for (kind, arrays) in geometry.iter() {
            let k = kind.index();
            let range = self.slots[pos].ranges[k];
            assert!(
                range.vertex_count as usize == arrays.positions.len()
                    && range.element_count as usize == arrays.elements.len(),
                "structural change in object {} {}: {}/{} vertices/elements buffered, {}/{} given; rebuild required",
                id,
                kind.label(),
                range.vertex_count,
                range.element_count,
                arrays.positions.len(),
                arrays.elements.len(),
            );
            assert!(
                self.slots[pos].element_hash[k] == content_hash(&arrays.elements),
                "element order changed in object {} {}; rebuild required",
                id,
                kind.label(),
            );

            let fingerprint = data_fingerprint(arrays);
            if self.slots[pos].data_hash[k] == fingerprint {
                continue;
            }
            self.slots[pos].data_hash[k] = fingerprint;
            changed = true;

            let vs = range.vertex_start as usize;
            let vc = range.vertex_count as usize;
            let dst = &mut self.kinds[k];
            let positions: &[f32] = bytemuck::cast_slice(&arrays.positions);
            let colors: &[f32] = bytemuck::cast_slice(&arrays.colors);
            dst.positions[vs * 3..(vs + vc) * 3].copy_from_slice(positions);
            dst.colors[vs * 4..(vs + vc) * 4].copy_from_slice(colors);

            self.pending.push(PendingWrite {
                target: BufferTarget::Positions(kind),
                offset: (vs * 12) as u64,
                bytes: bytemuck::cast_slice(positions).to_vec(),
            });
            self.pending.push(PendingWrite {
                target: BufferTarget::Colors(kind),
                offset: (vs * 16) as u64,
                bytes: bytemuck::cast_slice(colors).to_vec(),
            });
        }
        Ok(changed)
    }

    /// Refresh every slot's settings from the scene; one write if any changed.
    pub fn update_settings(&mut self, scene: &Scene) {
        let mut changed = false;
        for (slot, settings) in self.slots.iter().zip(self.settings.iter_mut()) {
            if let Some(object) = scene.get(slot.id) {
                let fresh = Self::settings_for(object);
                if *settings != fresh {
                    *settings = fresh;
                    changed = true;
                }
            }
        }
        if changed {
            self.pending.retain(|w| w.target != BufferTarget::Settings);
            self.pending.push(PendingWrite {
                target: BufferTarget::Settings,
                offset: 0,
                bytes: bytemuck::cast_slice(&self.settings).to_vec(),
            });
        }
    }

    /// Replace one slot's settings.
    pub fn update_object_settings(&mut self, id: ObjectId, settings: ObjectSettings) -> Result<()> {
        let slot = self.slot_position(id)?;
        if self.settings[slot] == settings {
            return Ok(());
        }
        self.settings[slot] = settings;
        self.pending.push(PendingWrite {
            target: BufferTarget::Settings,
            offset: slot as u64 * SETTINGS_STRIDE,
            bytes: bytemuck::bytes_of(&settings).to_vec(),
        });
        Ok(())
    }

    /// Write pending partial updates into the GPU buffers.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        let Some(gpu) = &self.gpu else {
            // nothing uploaded yet; create_buffers will take the CPU arrays
            return;
        };
        for write in self.pending.drain(..) {
            queue.write_buffer(gpu.target(write.target), write.offset, &write.bytes);
        }
    }
}

fn data_fingerprint(arrays: &GeometryArrays) -> u64 {
    content_hash(&arrays.positions) ^ content_hash(&arrays.colors).rotate_left(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Cuboid, Mesh, ObjectStyle, PointCloud, Polyline, Tag};
    use glam::Vec3;

    fn mixed_scene() -> (Scene, Vec<ObjectId>) {
        let mut scene = Scene::new();
        let a = scene.add("cube", Cuboid::cube(1.0), ObjectStyle::default());
        let b = scene.add(
            "line",
            Polyline {
                points: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                closed: false,
            },
            ObjectStyle::default(),
        );
        let c = scene.add(
            "cloud",
            PointCloud {
                points: vec![Vec3::ONE; 5],
                colors: None,
            },
            ObjectStyle::default(),
        );
        (scene, vec![a, b, c])
    }

    fn build(scene: &Scene) -> BufferManager {
        let mut bm = BufferManager::new();
        assert!(bm.add_scene(scene).is_empty());
        bm
    }

    #[test]
    fn test_elements_in_range_after_appends() {
        let (scene, _) = mixed_scene();
        let bm = build(&scene);
        for kind in GeometryKind::ALL {
            let k = bm.kind(kind);
            let count = k.vertex_count();
            assert!(k.elements.iter().all(|&e| e < count), "{kind:?}");
            assert_eq!(k.object_index.len() as u32, count);
            assert_eq!(k.colors.len(), k.positions.len() / 3 * 4);
        }
    }

    #[test]
    fn test_slot_ranges_and_object_index() {
        let (scene, ids) = mixed_scene();
        let bm = build(&scene);
        assert_eq!(bm.len(), 3);
        assert_eq!(bm.transforms().len(), 3);
        assert_eq!(bm.settings().len(), 3);

        let line = bm.slot(ids[1]).unwrap();
        let points = line.range(GeometryKind::Points);
        // cube contributed 8 points first
        assert_eq!(points.vertex_start, 8);
        let k = bm.kind(GeometryKind::Points);
        let vs = points.vertex_start as usize;
        let ve = vs + points.vertex_count as usize;
        assert!(k.object_index[vs..ve].iter().all(|&i| i == line.index));

        // cloud has no faces and that is fine
        let cloud = bm.slot(ids[2]).unwrap();
        assert_eq!(cloud.range(GeometryKind::FrontFaces).element_count, 0);
    }

    #[test]
    fn test_tags_not_buffered() {
        let mut scene = Scene::new();
        scene.add("label", Tag::new("hello", Vec3::ZERO), ObjectStyle::default());
        let bm = build(&scene);
        assert!(bm.is_empty());
    }

    #[test]
    fn test_malformed_object_rejected_others_kept() {
        let (mut scene, _) = mixed_scene();
        let bad = scene.add(
            "bad",
            Mesh {
                vertices: vec![Vec3::ZERO, Vec3::X],
                faces: vec![vec![0, 1, 7]],
            },
            ObjectStyle::default(),
        );
        let mut bm = BufferManager::new();
        let rejected = bm.add_scene(&scene);
        assert_eq!(rejected.len(), 1);
        assert!(matches!(&rejected[0], Error::MalformedGeometry { object, .. } if *object == bad));
        assert_eq!(bm.len(), 3);
        assert!(!bm.contains(bad));
    }

    #[test]
    fn test_partial_update_equals_rebuild() {
        let (mut scene, ids) = mixed_scene();
        let mut bm = build(&scene);

        // same counts, new positions
        scene
            .set_geometry(
                ids[1],
                Polyline {
                    points: vec![Vec3::new(5.0, 5.0, 5.0), Vec3::new(6.0, 5.0, 5.0), Vec3::new(6.0, 7.0, 5.0)],
                    closed: false,
                },
            )
            .unwrap();
        let geometry = scene.get(ids[1]).unwrap().read_geometry();
        assert!(bm.matches_layout(ids[1], &geometry));
        assert!(bm.update_object_data(ids[1], &geometry).unwrap());

        let rebuilt = build(&scene);
        for kind in GeometryKind::ALL {
            assert_eq!(bm.kind(kind), rebuilt.kind(kind), "{kind:?}");
        }
        assert_eq!(
            bm.slot(ids[1]).unwrap().local_bounds,
            rebuilt.slot(ids[1]).unwrap().local_bounds
        );

        // the pending write carries exactly the rebuilt byte range
        let range = rebuilt.slot(ids[1]).unwrap().range(GeometryKind::Lines);
        let write = bm
            .pending_writes()
            .iter()
            .find(|w| w.target == BufferTarget::Positions(GeometryKind::Lines))
            .unwrap();
        let start = range.vertex_start as usize * 3;
        let end = start + range.vertex_count as usize * 3;
        let expected: &[u8] = bytemuck::cast_slice(&rebuilt.kind(GeometryKind::Lines).positions[start..end]);
        assert_eq!(write.offset, range.vertex_start as u64 * 12);
        assert_eq!(write.bytes, expected);
    }

    #[test]
    fn test_unchanged_data_writes_nothing() {
        let (scene, ids) = mixed_scene();
        let mut bm = build(&scene);
        let geometry = scene.get(ids[0]).unwrap().read_geometry();
        assert!(!bm.update_object_data(ids[0], &geometry).unwrap());
        assert!(bm.pending_writes().is_empty());
    }

    #[test]
    #[should_panic(expected = "rebuild required")]
    fn test_structural_change_panics() {
        let (mut scene, ids) = mixed_scene();
        let mut bm = build(&scene);
        scene
            .set_geometry(
                ids[1],
                Polyline {
                    points: vec![Vec3::ZERO, Vec3::X],
                    closed: false,
                },
            )
            .unwrap();
        let geometry = scene.get(ids[1]).unwrap().read_geometry();
        assert!(!bm.matches_layout(ids[1], &geometry));
        let _ = bm.update_object_data(ids[1], &geometry);
    }

    #[test]
    #[should_panic(expected = "element order changed")]
    fn test_reordered_elements_panic() {
        let mut scene = Scene::new();
        let tri = Mesh {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            faces: vec![vec![0, 1, 2]],
        };
        let id = scene.add("tri", tri, ObjectStyle::default());
        let mut bm = build(&scene);
        // same counts, different topology
        let rotated = Mesh {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            faces: vec![vec![1, 2, 0]],
        };
        scene.set_geometry(id, rotated).unwrap();
        let geometry = scene.get(id).unwrap().read_geometry();
        assert!(!bm.matches_layout(id, &geometry));
        let _ = bm.update_object_data(id, &geometry);
    }

    #[test]
    fn test_transform_write_offset() {
        let (scene, ids) = mixed_scene();
        let mut bm = build(&scene);
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        bm.update_object_transform(ids[2], m).unwrap();
        let w = &bm.pending_writes()[0];
        assert_eq!(w.target, BufferTarget::Transforms);
        assert_eq!(w.offset, 2 * 64);
        assert_eq!(w.bytes.len(), 64);
        assert_eq!(bm.transforms()[2], m.to_cols_array_2d());
        assert!(matches!(
            bm.update_object_transform(ObjectId::new(999), m),
            Err(Error::UnknownObject(_))
        ));
    }

    #[test]
    fn test_settings_follow_scene() {
        let (mut scene, ids) = mixed_scene();
        let mut bm = build(&scene);
        scene.set_selected(ids[0], true).unwrap();
        scene.set_visible(ids[1], false).unwrap();
        scene.set_locked(ids[2], true).unwrap();
        bm.update_settings(&scene);

        let s = bm.settings();
        assert_eq!(s[0].selected, 1);
        assert_eq!(s[1].visibility & visibility::VISIBLE, 0);
        assert_eq!(s[2].instance_color, [0.0; 4]);
        assert_eq!(bm.pending_writes().len(), 1);
        assert_eq!(bm.pending_writes()[0].bytes.len(), 3 * 32);

        // no change, no write
        bm.update_settings(&scene);
        assert_eq!(bm.pending_writes().len(), 1);
    }

    #[test]
    fn test_update_object_settings_offset() {
        let (scene, ids) = mixed_scene();
        let mut bm = build(&scene);
        let mut s = bm.settings()[1];
        s.selected = 1;
        bm.update_object_settings(ids[1], s).unwrap();
        assert_eq!(bm.pending_writes()[0].offset, 32);
    }

    #[test]
    fn test_clear_resets_everything() {
        let (scene, _) = mixed_scene();
        let mut bm = build(&scene);
        bm.clear();
        assert!(bm.is_empty());
        for kind in GeometryKind::ALL {
            assert_eq!(bm.kind(kind).vertex_count(), 0);
        }
        assert!(bm.transforms().is_empty());
        // re-adding after clear works
        assert!(bm.add_scene(&scene).is_empty());
        assert_eq!(bm.len(), 3);
    }

    #[test]
    #[should_panic(expected = "already buffered")]
    fn test_double_add_panics() {
        let (scene, ids) = mixed_scene();
        let mut bm = build(&scene);
        let obj = scene.get(ids[0]).unwrap();
        let _ = bm.add_object(obj, Mat4::IDENTITY);
    }
}
