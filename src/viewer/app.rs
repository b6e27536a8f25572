//! Main viewer application

use std::f32::consts::TAU;
use std::sync::Arc;

use anyhow::Result;
use egui::{ComboBox, Context};
use glam::Vec3;
use tracing::info;

use super::viewport::Viewport;
use crate::camera::ViewMode;
use crate::renderer::RenderMode;
use crate::scene::{Cuboid, ObjectId, ObjectStyle, PointCloud, Polyline, Tag, Transform};
use crate::settings::Settings;
use crate::Viewer;

pub struct MeshViewApp {
    viewer: Viewer,
    viewport: Viewport,
    show_outliner: bool,
    window_size: Option<(f32, f32)>,
    _trace_guard: Option<tracing_chrome::FlushGuard>,
}

impl MeshViewApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings: Settings,
        trace_guard: Option<tracing_chrome::FlushGuard>,
    ) -> Result<Self> {
        let mut viewer = Viewer::new(settings);

        if let Some(render_state) = cc.wgpu_render_state.as_ref() {
            viewer.attach(
                Arc::new(render_state.device.clone()),
                Arc::new(render_state.queue.clone()),
                render_state.target_format,
            )?;
        }

        populate_demo(&mut viewer)?;
        viewer.focus_selection();

        Ok(Self {
            viewer,
            viewport: Viewport::new(),
            show_outliner: true,
            window_size: None,
            _trace_guard: trace_guard,
        })
    }

    fn menu_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let mut mode = self.viewer.render_mode();
            ComboBox::from_id_salt("render_mode")
                .selected_text(mode.label())
                .show_ui(ui, |ui| {
                    for m in RenderMode::DISPLAY {
                        ui.selectable_value(&mut mode, m, m.label());
                    }
                });
            if mode != self.viewer.render_mode() {
                self.viewer.set_render_mode(mode);
            }

            let current = self.viewer.renderer().camera.view();
            let mut view = current;
            ComboBox::from_id_salt("view_mode")
                .selected_text(view.label())
                .show_ui(ui, |ui| {
                    for v in ViewMode::ALL {
                        ui.selectable_value(&mut view, v, v.label());
                    }
                });
            if view != current {
                self.viewer.set_view(view);
            }

            ui.separator();

            let mut show_grid = self.viewer.renderer().show_grid;
            if ui.checkbox(&mut show_grid, "Grid").changed() {
                self.viewer.set_show_grid(show_grid);
            }
            ui.checkbox(&mut self.show_outliner, "Outliner");

            ui.separator();

            if ui.button("Focus").on_hover_text("Frame selection (F)").clicked() {
                self.viewer.focus_selection();
            }
            if ui.button("Select all").clicked() {
                self.viewer.select_all();
            }
            if ui.button("Deselect").clicked() {
                self.viewer.deselect_all();
            }
            if ui.button("Lock").on_hover_text("Lock selected").clicked() {
                self.for_selected(|viewer, id| viewer.set_locked(id, true));
            }
            if ui.button("Hide").on_hover_text("Hide selected").clicked() {
                self.for_selected(|viewer, id| viewer.set_visible(id, false));
            }
            if ui.button("Show all").clicked() {
                let ids = self.viewer.scene().ids().to_vec();
                for id in ids {
                    let _ = self.viewer.set_visible(id, true);
                    let _ = self.viewer.set_locked(id, false);
                }
            }
        });
    }

    fn for_selected(&mut self, mut f: impl FnMut(&mut Viewer, ObjectId) -> crate::Result<()>) {
        for id in self.viewer.selection() {
            if let Err(e) = f(&mut self.viewer, id) {
                tracing::warn!("{}", e);
            }
        }
        self.viewer.deselect_all();
    }

    fn outliner(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            let rows: Vec<_> = self
                .viewer
                .scene()
                .iter()
                .map(|o| (o.id(), o.name.clone(), o.geometry.type_name(), o.is_selected(), o.is_locked(), o.is_visible()))
                .collect();
            for (id, name, kind, selected, locked, visible) in rows {
                let mut text = format!("{} [{}]", name, kind);
                if locked {
                    text.push_str(" (locked)");
                }
                if !visible {
                    text.push_str(" (hidden)");
                }
                if ui.selectable_label(selected, text).clicked() && !locked {
                    let _ = self.viewer.set_selected(id, !selected);
                }
            }
        });
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let stats = &self.viewport.last_stats;
            ui.label(format!(
                "Objects: {}  Selected: {}  Opaque: {}  Transparent: {}  Tags: {}",
                self.viewer.scene().len(),
                self.viewer.selection().len(),
                stats.opaque,
                stats.transparent,
                stats.tags,
            ));
            if stats.rejected > 0 {
                ui.colored_label(egui::Color32::YELLOW, format!("Rejected: {}", stats.rejected));
            }
            ui.separator();
            ui.label(format!("{:.1} ms", stats.elapsed_ms));
            if let Some(err) = &self.viewport.last_error {
                ui.separator();
                ui.colored_label(egui::Color32::RED, err);
            }
            if let Some((w, h)) = self.viewport.texture_size() {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("{}x{}", w, h));
                });
            }
        });
    }
}

impl eframe::App for MeshViewApp {
    fn update(&mut self, ctx: &Context, frame: &mut eframe::Frame) {
        let _span = tracing::info_span!("viewer_update").entered();
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| self.menu_bar(ui));
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| self.status_bar(ui));

        if self.show_outliner {
            egui::SidePanel::left("outliner")
                .default_width(200.0)
                .show(ctx, |ui| self.outliner(ui));
        }

        let render_state = frame.wgpu_render_state();
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.viewport.show(ui, &mut self.viewer, render_state);
            });

        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.window_size = Some((rect.width(), rect.height()));
        }
    }

    fn on_exit(&mut self) {
        let mut settings = self.viewer.settings().clone();
        if let Some((w, h)) = self.window_size {
            settings.window_width = w;
            settings.window_height = h;
        }
        info!("saving settings");
        settings.save();
    }
}

/// A small scene touching every geometry kind.
fn populate_demo(viewer: &mut Viewer) -> crate::Result<()> {
    let palette = [
        [0.85, 0.35, 0.3, 1.0],
        [0.3, 0.7, 0.4, 1.0],
        [0.3, 0.5, 0.85, 1.0],
    ];
    for (i, color) in palette.iter().enumerate() {
        let id = viewer.add_object(
            format!("cube{}", i),
            Cuboid::cube(1.0),
            ObjectStyle::default().with_face_color(*color),
        );
        viewer.set_transform(id, Transform::from_translation(Vec3::new(i as f32 * 2.0 - 2.0, 0.0, 0.5)))?;
    }

    let glass = viewer.add_object(
        "glass",
        Cuboid { size: Vec3::new(2.0, 1.0, 1.5) },
        ObjectStyle::default()
            .with_face_color([0.6, 0.8, 1.0, 1.0])
            .with_opacity(0.4),
    );
    viewer.set_transform(glass, Transform::from_translation(Vec3::new(0.0, 2.5, 0.75)))?;

    let helix: Vec<Vec3> = (0..=120)
        .map(|i| {
            let t = i as f32 / 120.0;
            Vec3::new((t * TAU * 3.0).cos(), (t * TAU * 3.0).sin(), t * 3.0)
        })
        .collect();
    let spring = viewer.add_object(
        "helix",
        Polyline { points: helix, closed: false },
        ObjectStyle::default().with_line_color([0.95, 0.8, 0.2, 1.0]),
    );
    viewer.set_transform(spring, Transform::from_translation(Vec3::new(0.0, -3.0, 0.0)))?;

    let cloud: Vec<Vec3> = (0..400)
        .map(|i| {
            let a = i as f32 * 2.399_963;
            let r = (i as f32 / 400.0).sqrt() * 1.5;
            Vec3::new(r * a.cos(), r * a.sin(), 0.05 * (a * 0.5).sin())
        })
        .collect();
    let cloud = viewer.add_object(
        "points",
        PointCloud { points: cloud, colors: None },
        ObjectStyle::default().with_points(true),
    );
    viewer.set_transform(cloud, Transform::from_translation(Vec3::new(4.0, 0.0, 0.0)))?;
    viewer.add_child(
        cloud,
        "points_label",
        Tag::new("point cloud", Vec3::new(0.0, 0.0, 1.0)),
        ObjectStyle::default(),
    )?;

    Ok(())
}
