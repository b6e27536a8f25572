//! Frame orchestration.
//!
//! Per frame the renderer brings the consolidated buffers up to date with the
//! scene (rebuild on membership or layout changes, partial writes otherwise),
//! writes the frame uniform, splits visible objects into opaque and
//! transparent sets, and encodes grid, opaque, transparent and overlay draws.
//! Picking reuses the same buffers with the instance-color pipelines.

mod grid;
mod mode;
mod order;
mod overlay;
mod passes;
mod pipelines;
mod resources;

pub use mode::RenderMode;
pub use order::{DrawOrder, DrawOrderCache};
pub use overlay::DragBox;
pub use passes::FrameStats;
pub use pipelines::{Pipelines, DEPTH_FORMAT, INSTANCE_FORMAT};
pub use resources::DepthTexture;

use flat_shading::{BindGroupLayouts, FrameUniform};
use glam::{Mat4, Vec2, Vec3};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};
use wgpu::util::DeviceExt;

use crate::buffers::{BufferManager, DrawSet};
use crate::camera::Camera;
use crate::picking::{PickRect, Selector};
use crate::scene::{Geometry, ObjectId, Scene};
use crate::settings::Settings;
use crate::util::{Error, Result};
use resources::LineBuffers;

/// Frames slower than this are logged.
const SLOW_FRAME_MS: f32 = 16.0;

/// Device objects and everything created from them.
pub struct GpuState {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub format: wgpu::TextureFormat,
    layouts: BindGroupLayouts,
    pipelines: Pipelines,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    depth: Option<DepthTexture>,
    /// Grid step the buffers were built for
    grid: Option<(f32, LineBuffers)>,
}

/// A tag projected to the viewport, in framebuffer pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct TagLabel {
    pub id: ObjectId,
    pub text: String,
    pub position: Vec2,
    pub color: [f32; 4],
}

pub struct Renderer {
    pub camera: Camera,
    pub show_grid: bool,
    pub background: [f32; 4],
    /// Global opacity in ghosted mode
    pub ghost_opacity: f32,
    pub selection_color: [f32; 4],
    buffers: BufferManager,
    selector: Selector,
    order: DrawOrderCache,
    gpu: Option<GpuState>,
    render_mode: RenderMode,
    viewport: (u32, u32),
    /// Scene membership generation the buffers were built from
    built_membership: Option<u64>,
    drag_box: Option<DragBox>,
    rejected: usize,
}

impl Renderer {
    pub fn new(settings: &Settings) -> Self {
        let mut renderer = Self {
            camera: Camera::default(),
            show_grid: true,
            background: [0.0; 4],
            ghost_opacity: 0.35,
            selection_color: [1.0, 0.6, 0.0, 1.0],
            buffers: BufferManager::new(),
            selector: Selector::default(),
            order: DrawOrderCache::default(),
            gpu: None,
            render_mode: RenderMode::default(),
            viewport: (0, 0),
            built_membership: None,
            drag_box: None,
            rejected: 0,
        };
        renderer.apply_settings(settings);
        renderer.camera.reset_position(settings.view);
        renderer
    }

    /// Take display, camera and picking options from `settings`.
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.set_render_mode(settings.render_mode);
        self.show_grid = settings.show_grid;
        self.background = settings.background_color;
        self.ghost_opacity = settings.ghost_opacity;
        self.selection_color = settings.selection_color;
        self.selector.noise_threshold = settings.pick_noise_threshold;

        let cam = &mut self.camera;
        cam.pandelta = settings.pan_delta;
        cam.rotationdelta = settings.rotation_delta;
        cam.zoomdelta = settings.zoom_delta;
        cam.scale = settings.units.scale();
        cam.fov = settings.fov;
        cam.near = settings.near;
        cam.far = settings.far;
    }

    /// Compile shaders and build pipelines for `format`. Shader errors are
    /// fatal for the caller.
    #[tracing::instrument(skip_all, fields(format = ?format))]
    pub fn attach(&mut self, device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, format: wgpu::TextureFormat) -> Result<()> {
        let layouts = flat_shading::create_bind_group_layouts(&device);
        let pipelines = pipelines::create_pipelines(&device, &layouts, format)?;

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame_uniform_buffer"),
            contents: bytemuck::bytes_of(&FrameUniform::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &layouts.frame,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        self.gpu = Some(GpuState {
            device,
            queue,
            format,
            layouts,
            pipelines,
            frame_buffer,
            frame_bind_group,
            depth: None,
            grid: None,
        });
        // buffers belong to the previous device, if any
        self.built_membership = None;
        info!("renderer attached");
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn gpu(&self) -> Option<&GpuState> {
        self.gpu.as_ref()
    }

    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    /// Switch display mode. `Instance` is reserved for the picking pass.
    pub fn set_render_mode(&mut self, mode: RenderMode) {
        if mode == RenderMode::Instance {
            warn!("instance mode is only used for picking; keeping {}", self.render_mode.label());
            return;
        }
        if mode != self.render_mode {
            debug!("render mode {} -> {}", self.render_mode.label(), mode.label());
            self.render_mode = mode;
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Framebuffer size used for projection and picking.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    /// Drag box in framebuffer pixels, drawn over the next frames.
    pub fn set_drag_box(&mut self, rect: Option<DragBox>) {
        self.drag_box = rect;
    }

    pub fn drag_box(&self) -> Option<DragBox> {
        self.drag_box
    }

    /// Buffers reflect the current scene membership.
    pub fn is_ready(&self, scene: &Scene) -> bool {
        self.built_membership == Some(scene.membership_generation())
            && (self.gpu.is_none() || self.buffers.gpu().is_some())
    }

    fn global_opacity(&self) -> f32 {
        if self.render_mode == RenderMode::Ghosted {
            self.ghost_opacity
        } else {
            1.0
        }
    }

    fn rebuild(&mut self, scene: &Scene) -> Vec<Error> {
        let _span = info_span!("rebuild", objects = scene.len()).entered();
        self.buffers.clear();
        let rejected = self.buffers.add_scene(scene);
        if let Some(gpu) = &self.gpu {
            self.buffers.create_buffers(&gpu.device, &gpu.layouts.objects);
        }
        self.built_membership = Some(scene.membership_generation());
        self.order.invalidate();
        self.rejected = rejected.len();
        rejected
    }

    /// Bring the buffers up to date with pending scene changes.
    ///
    /// Membership changes, layout changes and previously rejected objects
    /// trigger a full rebuild; same-layout edits are written in place.
    /// Returns the objects rejected by a rebuild.
    pub fn sync(&mut self, scene: &mut Scene) -> Vec<Error> {
        let changes = scene.take_changes();
        if !self.is_ready(scene) {
            let rejected = self.rebuild(scene);
            self.flush();
            return rejected;
        }

        let mut needs_rebuild = false;
        for &id in &changes.data {
            let Some(object) = scene.get(id) else {
                continue;
            };
            if object.is_tag() {
                continue;
            }
            let geometry = object.read_geometry();
            if !self.buffers.matches_layout(id, &geometry) {
                needs_rebuild = true;
                break;
            }
            if let Err(e) = self.buffers.update_object_data(id, &geometry) {
                // malformed now; a rebuild rejects it
                debug!("partial update of {} failed: {}", id, e);
                needs_rebuild = true;
                break;
            }
        }
        if needs_rebuild {
            let rejected = self.rebuild(scene);
            self.flush();
            return rejected;
        }

        for &id in &changes.transforms {
            if self.buffers.contains(id) {
                // contains() was checked
                let _ = self.buffers.update_object_transform(id, scene.world_transform(id));
            }
        }
        if changes.settings {
            self.buffers.update_settings(scene);
        }
        self.flush();
        Vec::new()
    }

    fn flush(&mut self) {
        if let Some(gpu) = &self.gpu {
            self.buffers.flush(&gpu.queue);
        }
    }

    fn frame_uniform(&self, mode: RenderMode, global_opacity: f32) -> FrameUniform {
        let (w, h) = self.viewport;
        let proj = self.camera.projection(w, h);
        let view = self.camera.viewworld();
        FrameUniform {
            selection_color: self.selection_color,
            global_opacity,
            mode: mode.shader_mode(),
            ..FrameUniform::new(proj, view, self.camera.position())
        }
    }

    fn update_grid(&mut self) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        let step = grid::grid_step(self.camera.distance() / self.camera.scale.max(f32::EPSILON)) * self.camera.scale;
        if gpu.grid.as_ref().is_some_and(|(s, _)| (s - step).abs() <= step * 1e-3) {
            return;
        }
        let lines = grid::grid_lines(step);
        gpu.grid = Some((step, grid::upload(&gpu.device, &lines)));
    }

    /// Draw one frame into `target` (`width` x `height` framebuffer pixels).
    #[tracing::instrument(skip_all, fields(w = width, h = height, mode = ?self.render_mode))]
    pub fn render(&mut self, scene: &mut Scene, target: &wgpu::TextureView, width: u32, height: u32) -> Result<FrameStats> {
        let start = Instant::now();
        if self.gpu.is_none() {
            return Err(Error::NoGpu);
        }
        self.set_viewport(width, height);
        if width == 0 || height == 0 {
            return Ok(FrameStats::default());
        }

        self.sync(scene);
        let global_opacity = self.global_opacity();
        let view = self.camera.viewworld();
        let order = self.order.order(scene, &self.buffers, view, global_opacity);
        let tags = scene.iter().filter(|o| o.is_tag() && o.is_visible()).count();
        let uniform = self.frame_uniform(self.render_mode, global_opacity);
        if self.show_grid {
            self.update_grid();
        }

        let Some(gpu) = &mut self.gpu else {
            return Err(Error::NoGpu);
        };
        gpu.queue.write_buffer(&gpu.frame_buffer, 0, bytemuck::bytes_of(&uniform));
        DepthTexture::ensure(&mut gpu.depth, &gpu.device, "depth_texture", (width, height));

        let gpu = &*gpu;
        let Some(depth) = &gpu.depth else {
            return Err(Error::NoGpu);
        };
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });
        passes::ScenePass {
            gpu,
            buffers: &self.buffers,
            order: &order,
            grid: gpu.grid.as_ref().filter(|_| self.show_grid).map(|(_, g)| g),
            mode: self.render_mode,
            background: self.background,
        }
        .encode(&mut encoder, target, &depth.view);

        if let Some(rect) = self.drag_box {
            passes::encode_overlay(gpu, &mut encoder, target, rect, (width, height));
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let elapsed_ms = start.elapsed().as_secs_f32() * 1000.0;
        if elapsed_ms > SLOW_FRAME_MS {
            warn!("slow render: {:.1} ms ({} objects)", elapsed_ms, self.buffers.len());
        }
        Ok(FrameStats {
            opaque: order.opaque.len(),
            transparent: order.transparent.len(),
            tags,
            rejected: self.rejected,
            elapsed_ms,
        })
    }

    /// Objects under `rect` (logical points), most covered first.
    ///
    /// Runs the instance pass synchronously and blocks on the read-back.
    /// Locked objects, tags, the grid and the background never resolve.
    #[tracing::instrument(skip_all)]
    pub fn pick(&mut self, scene: &mut Scene, rect: PickRect, pixels_per_point: f32) -> Result<Vec<ObjectId>> {
        if self.gpu.is_none() {
            return Err(Error::NoGpu);
        }
        self.sync(scene);
        let Some(pixels) = rect.to_pixels(pixels_per_point, self.viewport) else {
            return Ok(Vec::new());
        };
        let uniform = self.frame_uniform(RenderMode::Instance, 1.0);

        let Some(gpu) = &self.gpu else {
            return Err(Error::NoGpu);
        };
        gpu.queue.write_buffer(&gpu.frame_buffer, 0, bytemuck::bytes_of(&uniform));

        let buffers = &self.buffers;
        let colors = self
            .selector
            .capture(&gpu.device, &gpu.queue, self.viewport, pixels, |pass| {
                let Some(objects) = buffers.gpu() else {
                    return;
                };
                pass.set_bind_group(0, &gpu.frame_bind_group, &[]);
                pass.set_bind_group(1, objects.bind_group(), &[]);
                buffers.draw(pass, &gpu.pipelines.instance_set(), RenderMode::Instance, DrawSet::All);
            })?;
        let hits = self.selector.resolve_pixels(scene, pixels, &colors);
        debug!(hits = hits.len(), "pick");
        Ok(hits)
    }

    /// Screen positions of visible tags, in framebuffer pixels. Tags behind
    /// the camera or outside the viewport are skipped.
    pub fn tag_labels(&self, scene: &Scene, width: u32, height: u32) -> Vec<TagLabel> {
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let view_proj = self.camera.projection(width, height) * self.camera.viewworld();
        scene
            .iter()
            .filter(|o| o.is_visible())
            .filter_map(|o| {
                let Geometry::Tag(tag) = &o.geometry else {
                    return None;
                };
                let world = scene.world_transform(o.id()).transform_point3(tag.anchor);
                let clip = view_proj * world.extend(1.0);
                if clip.w <= 0.0 {
                    return None;
                }
                let ndc = Vec3::new(clip.x, clip.y, clip.z) / clip.w;
                if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || !(0.0..=1.0).contains(&ndc.z) {
                    return None;
                }
                Some(TagLabel {
                    id: o.id(),
                    text: tag.text.clone(),
                    position: Vec2::new((ndc.x + 1.0) * 0.5 * width as f32, (1.0 - ndc.y) * 0.5 * height as f32),
                    color: tag.color,
                })
            })
            .collect()
    }

    /// Projection for the current viewport.
    pub fn projection(&self) -> Mat4 {
        self.camera.projection(self.viewport.0, self.viewport.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Cuboid, ObjectStyle, Polyline, Tag, Transform};

    fn renderer() -> Renderer {
        Renderer::new(&Settings::default())
    }

    #[test]
    fn test_settings_applied() {
        let settings = Settings {
            render_mode: RenderMode::Wireframe,
            units: crate::camera::Units::Centimeters,
            pick_noise_threshold: 7,
            ..Default::default()
        };
        let r = Renderer::new(&settings);
        assert_eq!(r.render_mode(), RenderMode::Wireframe);
        assert_eq!(r.camera.scale, 100.0);
        assert_eq!(r.selector().noise_threshold, 7);
    }

    #[test]
    fn test_instance_mode_not_displayable() {
        let mut r = renderer();
        r.set_render_mode(RenderMode::Shaded);
        r.set_render_mode(RenderMode::Instance);
        assert_eq!(r.render_mode(), RenderMode::Shaded);
    }

    #[test]
    fn test_sync_builds_then_gates_on_membership() {
        let mut scene = Scene::new();
        scene.add("a", Cuboid::cube(1.0), ObjectStyle::default());
        let mut r = renderer();
        assert!(!r.is_ready(&scene));
        assert!(r.sync(&mut scene).is_empty());
        assert!(r.is_ready(&scene));
        assert_eq!(r.buffers().len(), 1);

        scene.add("b", Cuboid::cube(2.0), ObjectStyle::default());
        assert!(!r.is_ready(&scene));
        r.sync(&mut scene);
        assert_eq!(r.buffers().len(), 2);
    }

    #[test]
    fn test_sync_partial_vs_rebuild() {
        let mut scene = Scene::new();
        let line = scene.add(
            "line",
            Polyline {
                points: vec![Vec3::ZERO, Vec3::X],
                closed: false,
            },
            ObjectStyle::default(),
        );
        let mut r = renderer();
        r.sync(&mut scene);

        // same layout: written in place
        scene
            .set_geometry(
                line,
                Polyline {
                    points: vec![Vec3::ZERO, Vec3::Y],
                    closed: false,
                },
            )
            .unwrap();
        r.sync(&mut scene);
        assert!(!r.buffers().pending_writes().is_empty());

        // more vertices: rebuilt, pending writes dropped
        scene
            .set_geometry(
                line,
                Polyline {
                    points: vec![Vec3::ZERO, Vec3::Y, Vec3::Z],
                    closed: false,
                },
            )
            .unwrap();
        r.sync(&mut scene);
        assert!(r.buffers().pending_writes().is_empty());
        assert_eq!(r.buffers().kind(crate::scene::GeometryKind::Lines).vertex_count(), 3);
    }

    #[test]
    fn test_geometry_edit_reorders_transparent() {
        let segment = |x: f32| Polyline {
            points: vec![Vec3::new(x, 0.0, 0.0), Vec3::new(x, 1.0, 1.0)],
            closed: false,
        };
        let glass = ObjectStyle::default().with_opacity(0.5);
        let mut scene = Scene::new();
        let a = scene.add("a", segment(-5.0), glass.clone());
        scene.add("b", segment(5.0), glass);
        let mut r = renderer();
        r.sync(&mut scene);

        let view = Mat4::look_at_rh(Vec3::new(20.0, 0.0, 0.0), Vec3::ZERO, Vec3::Z);
        let before = r.order.order(&scene, &r.buffers, view, 1.0);
        assert_eq!(before.transparent, vec![0, 1]);

        // same counts, so this goes through the in-place path
        scene.set_geometry(a, segment(10.0)).unwrap();
        r.sync(&mut scene);
        let generation = r.buffers().generation();
        let after = r.order.order(&scene, &r.buffers, view, 1.0);
        assert_eq!(r.buffers().generation(), generation);
        assert_eq!(r.buffers().slot(a).unwrap().local_bounds.center().x, 10.0);
        assert_eq!(after.transparent, vec![1, 0]);
        assert_eq!(r.order.rebuilds(), 2);
    }

    #[test]
    fn test_settings_written_only_when_flagged() {
        use crate::buffers::BufferTarget;
        let mut scene = Scene::new();
        let a = scene.add("a", Cuboid::cube(1.0), ObjectStyle::default());
        let mut r = renderer();
        r.sync(&mut scene);

        scene.set_transform(a, Transform::from_translation(Vec3::X)).unwrap();
        r.sync(&mut scene);
        let targets: Vec<_> = r.buffers().pending_writes().iter().map(|w| w.target).collect();
        assert_eq!(targets, vec![BufferTarget::Transforms]);

        scene.set_selected(a, true).unwrap();
        r.sync(&mut scene);
        let slot = r.buffers().slot(a).unwrap().index as usize;
        assert_eq!(r.buffers().settings()[slot].selected, 1);
        assert!(r
            .buffers()
            .pending_writes()
            .iter()
            .any(|w| w.target == BufferTarget::Settings));

        scene.set_style(a, ObjectStyle::default().with_opacity(0.25)).unwrap();
        r.sync(&mut scene);
        assert_eq!(r.buffers().settings()[slot].opacity, 0.25);
    }

    #[test]
    fn test_sync_transforms_children() {
        let mut scene = Scene::new();
        let parent = scene.add("p", Cuboid::cube(1.0), ObjectStyle::default());
        let child = scene.add_child(parent, "c", Cuboid::cube(1.0), ObjectStyle::default()).unwrap();
        let mut r = renderer();
        r.sync(&mut scene);

        scene
            .set_transform(parent, Transform::from_translation(Vec3::new(0.0, 0.0, 4.0)))
            .unwrap();
        r.sync(&mut scene);
        let slot = r.buffers().slot(child).unwrap().index as usize;
        assert_eq!(r.buffers().transforms()[slot][3][2], 4.0);
    }

    #[test]
    fn test_render_and_pick_require_gpu() {
        let mut scene = Scene::new();
        let mut r = renderer();
        assert!(matches!(
            r.pick(&mut scene, PickRect::point(Vec2::ZERO), 1.0),
            Err(Error::NoGpu)
        ));
    }

    #[test]
    fn test_tag_labels_project_and_cull() {
        let mut scene = Scene::new();
        let visible = scene.add("origin", Tag::new("origin", Vec3::ZERO), ObjectStyle::default());
        let hidden = scene.add("hidden", Tag::new("hidden", Vec3::ZERO), ObjectStyle::default());
        scene.set_visible(hidden, false).unwrap();
        scene.add("far", Tag::new("far", Vec3::new(1.0e4, 0.0, 0.0)), ObjectStyle::default());

        let r = renderer();
        let labels = r.tag_labels(&scene, 200, 100);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].id, visible);
        // the target is the origin, so it lands in the middle
        assert!((labels[0].position - Vec2::new(100.0, 50.0)).length() < 1e-3);
        assert!(r.tag_labels(&scene, 0, 100).is_empty());
    }
}
