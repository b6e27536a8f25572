//! The viewer context: scene, renderer, settings and redraw state in one
//! explicitly owned value. The application shell calls into it and nothing
//! here is global.

use glam::Vec2;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::camera::ViewMode;
use crate::picking::{apply_selection, PickRect, SelectionAction};
use crate::redraw::RedrawScheduler;
use crate::renderer::{DragBox, FrameStats, RenderMode, Renderer, TagLabel};
use crate::scene::{Geometry, ObjectId, ObjectStyle, Scene, Transform};
use crate::settings::Settings;
use crate::util::{Bounds, Result};

pub struct Viewer {
    scene: Scene,
    renderer: Renderer,
    settings: Settings,
    redraw: RedrawScheduler,
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Viewer {
    pub fn new(settings: Settings) -> Self {
        let mut redraw = RedrawScheduler::new(Duration::from_millis(settings.redraw_interval_ms));
        // first frame
        redraw.request_redraw();
        Self {
            scene: Scene::new(),
            renderer: Renderer::new(&settings),
            redraw,
            settings,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        self.redraw.request_redraw();
        &mut self.renderer
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace settings and push them into renderer and camera.
    pub fn set_settings(&mut self, settings: Settings) {
        self.renderer.apply_settings(&settings);
        self.redraw
            .set_interval(Duration::from_millis(settings.redraw_interval_ms));
        self.settings = settings;
        self.redraw.request_redraw();
    }

    /// Compile shaders and build pipelines on the given device.
    pub fn attach(&mut self, device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, format: wgpu::TextureFormat) -> Result<()> {
        self.renderer.attach(device, queue, format)?;
        self.redraw.request_redraw();
        Ok(())
    }

    pub fn add_object(&mut self, name: impl Into<String>, geometry: impl Into<Geometry>, style: ObjectStyle) -> ObjectId {
        self.redraw.request_redraw();
        self.scene.add(name, geometry, style)
    }

    pub fn add_child(
        &mut self,
        parent: ObjectId,
        name: impl Into<String>,
        geometry: impl Into<Geometry>,
        style: ObjectStyle,
    ) -> Result<ObjectId> {
        let id = self.scene.add_child(parent, name, geometry, style)?;
        self.redraw.request_redraw();
        Ok(id)
    }

    /// Remove an object and its children.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<Vec<ObjectId>> {
        let removed = self.scene.remove(id)?;
        self.redraw.request_redraw();
        Ok(removed)
    }

    pub fn set_transform(&mut self, id: ObjectId, transform: Transform) -> Result<()> {
        self.scene.set_transform(id, transform)?;
        self.redraw.request_redraw();
        Ok(())
    }

    pub fn set_geometry(&mut self, id: ObjectId, geometry: impl Into<Geometry>) -> Result<()> {
        self.scene.set_geometry(id, geometry)?;
        self.redraw.request_redraw();
        Ok(())
    }

    pub fn set_style(&mut self, id: ObjectId, style: ObjectStyle) -> Result<()> {
        self.scene.set_style(id, style)?;
        self.redraw.request_redraw();
        Ok(())
    }

    pub fn set_visible(&mut self, id: ObjectId, visible: bool) -> Result<()> {
        self.scene.set_visible(id, visible)?;
        self.redraw.request_redraw();
        Ok(())
    }

    pub fn set_locked(&mut self, id: ObjectId, locked: bool) -> Result<()> {
        self.scene.set_locked(id, locked)?;
        self.redraw.request_redraw();
        Ok(())
    }

    pub fn set_selected(&mut self, id: ObjectId, selected: bool) -> Result<()> {
        self.scene.set_selected(id, selected)?;
        self.redraw.request_redraw();
        Ok(())
    }

    pub fn select_all(&mut self) {
        self.scene.select_all();
        self.redraw.request_redraw();
    }

    pub fn deselect_all(&mut self) {
        self.scene.deselect_all();
        self.redraw.request_redraw();
    }

    pub fn selection(&self) -> Vec<ObjectId> {
        self.scene.selected()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.renderer.render_mode()
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.renderer.set_render_mode(mode);
        self.settings.render_mode = self.renderer.render_mode();
        self.redraw.request_redraw();
    }

    pub fn set_show_grid(&mut self, show: bool) {
        self.renderer.show_grid = show;
        self.settings.show_grid = show;
        self.redraw.request_redraw();
    }

    /// Snap the camera to a view preset.
    pub fn set_view(&mut self, view: ViewMode) {
        self.renderer.camera.reset_position(view);
        self.settings.view = view;
        self.redraw.request_redraw();
    }

    /// Framebuffer size for projection and picking. Call before handling
    /// input for a frame so picks use the current size.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if self.renderer.viewport() != (width, height) {
            self.renderer.set_viewport(width, height);
            self.redraw.request_redraw();
        }
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.renderer.camera.pan(dx, dy);
        self.redraw.request_redraw();
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.renderer.camera.rotate(dx, dy);
        self.redraw.request_redraw();
    }

    pub fn zoom(&mut self, steps: f32) {
        self.renderer.camera.zoom(steps);
        self.redraw.request_redraw();
    }

    /// Frame the selection, or the whole scene when nothing is selected.
    pub fn focus_selection(&mut self) {
        let selected = self.scene.selected();
        let bounds = if selected.is_empty() {
            self.scene.bounds()
        } else {
            let mut b = Bounds::EMPTY;
            for id in selected {
                b.expand_by_box(&self.scene.world_bounds(id));
            }
            b
        };
        self.renderer.camera.focus(&bounds);
        self.redraw.request_redraw();
    }

    /// Objects under `rect` without touching the selection.
    pub fn pick(&mut self, rect: PickRect, pixels_per_point: f32) -> Result<Vec<ObjectId>> {
        self.renderer.pick(&mut self.scene, rect, pixels_per_point)
    }

    /// Pick and apply `action` to the selection. Returns the objects hit.
    pub fn request_pick(&mut self, rect: PickRect, pixels_per_point: f32, action: SelectionAction) -> Result<Vec<ObjectId>> {
        let hits = self.pick(rect, pixels_per_point)?;
        let changed = apply_selection(&mut self.scene, action, &hits);
        debug!(?action, hits = hits.len(), changed = changed.len(), "pick applied");
        self.redraw.request_redraw();
        Ok(hits)
    }

    /// Show or clear the drag box (corners in logical points).
    pub fn set_drag_box(&mut self, corners: Option<(Vec2, Vec2)>, pixels_per_point: f32) {
        let rect = corners.map(|(a, b)| DragBox {
            min: a.min(b) * pixels_per_point,
            max: a.max(b) * pixels_per_point,
        });
        if rect != self.renderer.drag_box() {
            self.renderer.set_drag_box(rect);
            self.redraw.request_redraw();
        }
    }

    pub fn request_redraw(&mut self) {
        self.redraw.request_redraw();
    }

    /// Whether the shell should repaint at `now`; at most once per tick.
    pub fn poll_redraw(&mut self, now: Instant) -> bool {
        self.redraw.poll(now)
    }

    pub fn time_to_next_redraw(&self, now: Instant) -> Option<Duration> {
        self.redraw.time_to_next(now)
    }

    pub fn render(&mut self, target: &wgpu::TextureView, width: u32, height: u32) -> Result<FrameStats> {
        self.renderer.render(&mut self.scene, target, width, height)
    }

    /// Tag labels in framebuffer pixels.
    pub fn tag_labels(&self, width: u32, height: u32) -> Vec<TagLabel> {
        self.renderer.tag_labels(&self.scene, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Cuboid, Tag};
    use glam::Vec3;

    #[test]
    fn test_edits_coalesce_into_one_redraw() {
        let mut v = Viewer::default();
        let now = Instant::now();
        assert!(v.poll_redraw(now));
        let a = v.add_object("a", Cuboid::cube(1.0), ObjectStyle::default());
        v.set_selected(a, true).unwrap();
        v.set_visible(a, false).unwrap();
        v.set_visible(a, true).unwrap();
        assert!(!v.poll_redraw(now + Duration::from_millis(10)));
        assert!(v.poll_redraw(now + Duration::from_millis(100)));
        assert!(!v.poll_redraw(now + Duration::from_millis(300)));
    }

    #[test]
    fn test_viewport_resize_requests_redraw() {
        let mut v = Viewer::default();
        let now = Instant::now();
        assert!(v.poll_redraw(now));

        v.set_viewport(320, 240);
        assert_eq!(v.renderer().viewport(), (320, 240));
        assert!(v.redraw.is_dirty());
        assert!(v.poll_redraw(now + Duration::from_millis(100)));

        // same size every frame is not a change
        v.set_viewport(320, 240);
        assert!(!v.redraw.is_dirty());
    }

    #[test]
    fn test_remove_drops_subtree_and_selection() {
        let mut v = Viewer::default();
        let p = v.add_object("p", Cuboid::cube(1.0), ObjectStyle::default());
        let c = v.add_child(p, "c", Cuboid::cube(1.0), ObjectStyle::default()).unwrap();
        v.select_all();
        assert_eq!(v.selection(), vec![p, c]);
        let removed = v.remove_object(p).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(v.selection().is_empty());
        assert!(v.scene().is_empty());
    }

    #[test]
    fn test_render_mode_and_view_persist_in_settings() {
        let mut v = Viewer::default();
        v.set_render_mode(RenderMode::Ghosted);
        v.set_view(ViewMode::Front);
        assert_eq!(v.settings().render_mode, RenderMode::Ghosted);
        assert_eq!(v.settings().view, ViewMode::Front);
        assert_eq!(v.renderer().camera.view(), ViewMode::Front);
        assert_eq!(v.renderer().camera.target(), Vec3::ZERO);
    }

    #[test]
    fn test_focus_selection_targets_selected_bounds() {
        let mut v = Viewer::default();
        let a = v.add_object("a", Cuboid::cube(2.0), ObjectStyle::default());
        let b = v.add_object("b", Cuboid::cube(2.0), ObjectStyle::default());
        v.set_transform(b, Transform::from_translation(Vec3::new(10.0, 0.0, 0.0))).unwrap();
        v.set_selected(b, true).unwrap();
        v.focus_selection();
        let cam = &v.renderer().camera;
        assert!((cam.target() - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
        assert!(((cam.position() - cam.target()).length() - cam.distance()).abs() < 1e-3);

        v.set_selected(b, false).unwrap();
        v.set_selected(a, true).unwrap();
        v.focus_selection();
        assert!(v.renderer().camera.target().length() < 1e-4);
    }

    #[test]
    fn test_tags_are_labels_not_buffers() {
        let mut v = Viewer::default();
        v.add_object("tag", Tag::new("hello", Vec3::ZERO), ObjectStyle::default());
        let labels = v.tag_labels(640, 480);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "hello");
    }

    #[test]
    fn test_drag_box_scaled_to_pixels() {
        let mut v = Viewer::default();
        v.set_drag_box(Some((Vec2::new(30.0, 10.0), Vec2::new(10.0, 20.0))), 2.0);
        let rect = v.renderer().drag_box().unwrap();
        assert_eq!(rect.min, Vec2::new(20.0, 20.0));
        assert_eq!(rect.max, Vec2::new(60.0, 40.0));
        v.set_drag_box(None, 2.0);
        assert!(v.renderer().drag_box().is_none());
    }
}
