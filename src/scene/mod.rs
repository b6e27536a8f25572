//! Scene graph: an ordered forest of objects plus the instance-color map.
//!
//! The scene records what changed since the renderer last looked
//! ([`SceneChanges`]) so buffer updates can be targeted instead of rebuilding
//! everything.

mod geometry;
mod object;

pub use geometry::*;
pub use object::*;

use glam::Mat4;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::util::{Bounds, Error, Result};

/// Pending mutations, drained by the renderer once per frame.
#[derive(Clone, Debug, Default)]
pub struct SceneChanges {
    /// Objects whose geometry or colors changed (same ids, maybe same counts)
    pub data: HashSet<ObjectId>,
    /// Objects whose world transform changed
    pub transforms: HashSet<ObjectId>,
    /// Selection, lock or visibility changed somewhere
    pub settings: bool,
}

impl SceneChanges {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.transforms.is_empty() && !self.settings
    }
}

/// Ordered forest of [`SceneObject`]s.
#[derive(Debug, Default)]
pub struct Scene {
    objects: HashMap<ObjectId, SceneObject>,
    /// Insertion order; defines buffer slot order
    order: Vec<ObjectId>,
    instance_map: HashMap<InstanceColor, ObjectId>,
    next_id: u64,
    next_color: u32,
    /// Colors released by removed objects, reused before fresh ones
    free_colors: Vec<InstanceColor>,
    /// Bumped on add/remove
    membership_generation: u64,
    /// Bumped on any transform change
    transform_generation: u64,
    /// Bumped on geometry or style edits
    data_generation: u64,
    changes: SceneChanges,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn membership_generation(&self) -> u64 {
        self.membership_generation
    }

    pub fn transform_generation(&self) -> u64 {
        self.transform_generation
    }

    pub fn data_generation(&self) -> u64 {
        self.data_generation
    }

    /// Add a root object.
    ///
    /// # Panics
    ///
    /// Panics if 2^24 - 1 objects are alive at once, which exhausts the
    /// instance colors.
    pub fn add(&mut self, name: impl Into<String>, geometry: impl Into<Geometry>, style: ObjectStyle) -> ObjectId {
        self.insert(name.into(), geometry.into(), style, None)
    }

    /// Add an object under `parent`; it inherits the parent's world transform.
    pub fn add_child(
        &mut self,
        parent: ObjectId,
        name: impl Into<String>,
        geometry: impl Into<Geometry>,
        style: ObjectStyle,
    ) -> Result<ObjectId> {
        if !self.objects.contains_key(&parent) {
            return Err(Error::UnknownObject(parent));
        }
        Ok(self.insert(name.into(), geometry.into(), style, Some(parent)))
    }

    fn insert(&mut self, name: String, geometry: Geometry, style: ObjectStyle, parent: Option<ObjectId>) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId::new(self.next_id);
        let instance_color = match self.free_colors.pop() {
            Some(color) => color,
            None => {
                self.next_color += 1;
                InstanceColor::from_index(self.next_color)
            }
        };

        debug!("scene add {} '{}' ({})", id, name, geometry.type_name());
        let object = SceneObject {
            id,
            name,
            geometry,
            style,
            transform: Transform::default(),
            parent,
            children: Vec::new(),
            is_selected: false,
            is_locked: false,
            is_visible: true,
            instance_color,
        };
        if let Some(p) = parent.and_then(|p| self.objects.get_mut(&p)) {
            p.children.push(id);
        }
        self.objects.insert(id, object);
        self.order.push(id);
        self.instance_map.insert(instance_color, id);
        self.membership_generation += 1;
        id
    }

    /// Remove an object and its whole subtree. Returns the removed ids.
    pub fn remove(&mut self, id: ObjectId) -> Result<Vec<ObjectId>> {
        let parent = self.objects.get(&id).ok_or(Error::UnknownObject(id))?.parent;
        if let Some(parent) = parent.and_then(|p| self.objects.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }

        let removed = self.subtree(id);
        for r in &removed {
            if let Some(obj) = self.objects.remove(r) {
                self.instance_map.remove(&obj.instance_color);
                self.free_colors.push(obj.instance_color);
            }
            self.changes.data.remove(r);
            self.changes.transforms.remove(r);
        }
        let gone: HashSet<_> = removed.iter().copied().collect();
        self.order.retain(|o| !gone.contains(o));
        self.membership_generation += 1;
        debug!("scene remove {} ({} objects)", id, removed.len());
        Ok(removed)
    }

    /// `id` followed by all its descendants, depth first.
    pub fn subtree(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(obj) = self.objects.get(&cur) {
                out.push(cur);
                stack.extend(obj.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    /// Objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    pub fn ids(&self) -> &[ObjectId] {
        &self.order
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut SceneObject> {
        self.objects.get_mut(&id).ok_or(Error::UnknownObject(id))
    }

    /// World matrix: parent chain composed root-first.
    pub fn world_transform(&self, id: ObjectId) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        let mut cur = self.objects.get(&id);
        while let Some(obj) = cur {
            m = obj.transform.to_matrix() * m;
            cur = obj.parent.and_then(|p| self.objects.get(&p));
        }
        m
    }

    /// World-space bounds of one object.
    pub fn world_bounds(&self, id: ObjectId) -> Bounds {
        match self.objects.get(&id) {
            Some(obj) => obj.geometry.bounds().transformed(self.world_transform(id)),
            None => Bounds::EMPTY,
        }
    }

    /// Bounds of all visible objects.
    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds::EMPTY;
        for obj in self.iter().filter(|o| o.is_visible) {
            b.expand_by_box(&self.world_bounds(obj.id));
        }
        b
    }

    /// Set the local transform; children are marked for refresh too.
    pub fn set_transform(&mut self, id: ObjectId, transform: Transform) -> Result<()> {
        self.object_mut(id)?.transform = transform;
        for d in self.subtree(id) {
            self.changes.transforms.insert(d);
        }
        self.transform_generation += 1;
        Ok(())
    }

    /// Replace geometry. The renderer decides between partial update and rebuild.
    pub fn set_geometry(&mut self, id: ObjectId, geometry: impl Into<Geometry>) -> Result<()> {
        self.object_mut(id)?.geometry = geometry.into();
        self.changes.data.insert(id);
        self.data_generation += 1;
        Ok(())
    }

    /// Replace style. Colors go through the data path, show flags and opacity
    /// through settings.
    pub fn set_style(&mut self, id: ObjectId, style: ObjectStyle) -> Result<()> {
        self.object_mut(id)?.style = style;
        self.changes.data.insert(id);
        self.changes.settings = true;
        self.data_generation += 1;
        Ok(())
    }

    pub fn set_visible(&mut self, id: ObjectId, visible: bool) -> Result<()> {
        self.object_mut(id)?.is_visible = visible;
        self.changes.settings = true;
        Ok(())
    }

    /// Locking deselects and drops the object from the instance map.
    pub fn set_locked(&mut self, id: ObjectId, locked: bool) -> Result<()> {
        let obj = self.objects.get_mut(&id).ok_or(Error::UnknownObject(id))?;
        obj.is_locked = locked;
        if locked {
            obj.is_selected = false;
            self.instance_map.remove(&obj.instance_color);
        } else {
            self.instance_map.insert(obj.instance_color, id);
        }
        self.changes.settings = true;
        Ok(())
    }

    /// Set the selection flag. Locked objects stay unselected.
    pub fn set_selected(&mut self, id: ObjectId, selected: bool) -> Result<()> {
        let obj = self.object_mut(id)?;
        let value = selected && !obj.is_locked;
        if obj.is_selected != value {
            obj.is_selected = value;
            self.changes.settings = true;
        }
        Ok(())
    }

    pub fn select_all(&mut self) {
        for obj in self.objects.values_mut() {
            if !obj.is_locked && !obj.is_selected {
                obj.is_selected = true;
                self.changes.settings = true;
            }
        }
    }

    pub fn deselect_all(&mut self) {
        for obj in self.objects.values_mut() {
            if obj.is_selected {
                obj.is_selected = false;
                self.changes.settings = true;
            }
        }
    }

    /// Selected objects in insertion order.
    pub fn selected(&self) -> Vec<ObjectId> {
        self.iter().filter(|o| o.is_selected).map(|o| o.id).collect()
    }

    /// Owner of a picked color. Background and locked objects map to nothing.
    pub fn resolve_color(&self, color: InstanceColor) -> Option<ObjectId> {
        self.instance_map.get(&color).copied()
    }

    pub fn instance_map_len(&self) -> usize {
        self.instance_map.len()
    }

    /// Hand pending changes to the caller and start a fresh set.
    pub fn take_changes(&mut self) -> SceneChanges {
        std::mem::take(&mut self.changes)
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}
