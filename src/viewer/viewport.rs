//! 3D viewport widget: renders the scene into a texture egui can paint and
//! maps pointer input onto camera moves and picks.

use std::time::Instant;

use egui::{Color32, FontId, Pos2, Rect, Sense, Vec2};
use glam::Vec2 as GVec2;
use tracing::warn;

use crate::picking::{PickRect, SelectionAction};
use crate::renderer::FrameStats;
use crate::Viewer;

/// Points of scroll per zoom step
const SCROLL_PER_STEP: f32 = 50.0;

struct RenderTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DragMode {
    Select,
    Deselect,
}

pub struct Viewport {
    texture_id: Option<egui::TextureId>,
    render_texture: Option<RenderTexture>,
    /// Box drag in progress: start corner relative to the viewport, in points
    box_drag: Option<(Pos2, DragMode)>,
    pub last_stats: FrameStats,
    pub last_error: Option<String>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self {
            texture_id: None,
            render_texture: None,
            box_drag: None,
            last_stats: FrameStats::default(),
            last_error: None,
        }
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        viewer: &mut Viewer,
        render_state: Option<&egui_wgpu::RenderState>,
    ) -> egui::Response {
        let available = ui.available_size();
        let (rect, response) = ui.allocate_exact_size(available, Sense::click_and_drag());
        let ppp = ui.ctx().pixels_per_point();

        let width = ((rect.width() * ppp) as u32).max(1);
        let height = ((rect.height() * ppp) as u32).max(1);
        // picks in handle_input project with this size
        viewer.set_viewport(width, height);

        let interacted = self.handle_input(ui, &response, rect, viewer, ppp);

        if let Some(render_state) = render_state {
            let resized = self.ensure_render_texture(render_state, width, height);
            let now = Instant::now();
            // camera moves render immediately; scene edits wait for the tick
            let due = viewer.poll_redraw(now);
            if due || interacted || resized {
                if let Some(rt) = &self.render_texture {
                    match viewer.render(&rt.view, width, height) {
                        Ok(stats) => {
                            self.last_stats = stats;
                            self.last_error = None;
                        }
                        Err(e) => {
                            if self.last_error.is_none() {
                                warn!("render failed: {}", e);
                            }
                            self.last_error = Some(e.to_string());
                        }
                    }
                }
            }
            if let Some(wait) = viewer.time_to_next_redraw(now) {
                ui.ctx().request_repaint_after(wait);
            }
        }

        if let Some(texture_id) = self.texture_id {
            ui.painter().image(
                texture_id,
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
            self.paint_tags(ui, rect, viewer, width, height, ppp);
        } else {
            ui.painter().rect_filled(rect, 0.0, Color32::from_rgb(30, 30, 30));
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No GPU",
                FontId::proportional(16.0),
                Color32::GRAY,
            );
        }

        response
    }

    fn paint_tags(&self, ui: &egui::Ui, rect: Rect, viewer: &Viewer, width: u32, height: u32, ppp: f32) {
        let painter = ui.painter_at(rect);
        for label in viewer.tag_labels(width, height) {
            let pos = rect.min + Vec2::new(label.position.x, label.position.y) / ppp;
            let [r, g, b, a] = label.color.map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8);
            painter.text(
                pos,
                egui::Align2::LEFT_BOTTOM,
                &label.text,
                FontId::proportional(13.0),
                Color32::from_rgba_unmultiplied(r, g, b, a),
            );
        }
    }

    /// Returns true when the camera moved this frame.
    fn handle_input(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        rect: Rect,
        viewer: &mut Viewer,
        ppp: f32,
    ) -> bool {
        let modifiers = ui.input(|i| i.modifiers);
        let local = |p: Pos2| GVec2::new(p.x - rect.min.x, p.y - rect.min.y);
        let mut moved = false;

        // Box select with shift, box deselect with ctrl
        if response.drag_started_by(egui::PointerButton::Primary) && (modifiers.shift || modifiers.command) {
            if let Some(pos) = response.interact_pointer_pos() {
                let mode = if modifiers.shift { DragMode::Select } else { DragMode::Deselect };
                self.box_drag = Some((pos, mode));
            }
        }

        if let Some((start, mode)) = self.box_drag {
            let pos = ui
                .input(|i| i.pointer.latest_pos())
                .map(|p| rect.clamp(p))
                .unwrap_or(start);
            if response.drag_stopped() {
                self.box_drag = None;
                viewer.set_drag_box(None, ppp);
                let action = match mode {
                    DragMode::Select => SelectionAction::DragSelect,
                    DragMode::Deselect => SelectionAction::DragDeselect,
                };
                let pick = PickRect::from_corners(local(start), local(pos));
                if let Err(e) = viewer.request_pick(pick, ppp, action) {
                    warn!("box pick failed: {}", e);
                }
            } else {
                viewer.set_drag_box(Some((local(start), local(pos))), ppp);
            }
        } else if response.dragged_by(egui::PointerButton::Primary) {
            let delta = response.drag_delta();
            viewer.rotate(delta.x, delta.y);
            moved = true;
        } else if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            let delta = response.drag_delta();
            viewer.pan(delta.x, delta.y);
            moved = true;
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let action = if modifiers.shift {
                    SelectionAction::MultiSelect
                } else if modifiers.command {
                    SelectionAction::Deselect
                } else {
                    SelectionAction::Select
                };
                if let Err(e) = viewer.request_pick(PickRect::point(local(pos)), ppp, action) {
                    warn!("pick failed: {}", e);
                }
            }
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                viewer.zoom(scroll / SCROLL_PER_STEP);
                moved = true;
            }
            if ui.input(|i| i.key_pressed(egui::Key::F)) {
                viewer.focus_selection();
                moved = true;
            }
        }

        moved
    }

    /// Returns true when the texture was (re)created.
    fn ensure_render_texture(&mut self, render_state: &egui_wgpu::RenderState, width: u32, height: u32) -> bool {
        if self.render_texture.as_ref().is_some_and(|rt| rt.size == (width, height)) {
            return false;
        }

        let device = &render_state.device;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewport_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: render_state.target_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut renderer = render_state.renderer.write();
        if let Some(old_id) = self.texture_id.take() {
            renderer.free_texture(&old_id);
        }
        self.texture_id = Some(renderer.register_native_texture(device, &view, wgpu::FilterMode::Linear));

        self.render_texture = Some(RenderTexture {
            texture,
            view,
            size: (width, height),
        });
        true
    }

    pub fn texture_size(&self) -> Option<(u32, u32)> {
        self.render_texture.as_ref().map(|rt| (rt.texture.width(), rt.texture.height()))
    }
}
