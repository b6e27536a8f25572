//! Render pass encoding.

use wgpu::util::DeviceExt;

use super::order::DrawOrder;
use super::overlay::{drag_box_vertices, DragBox};
use super::resources::LineBuffers;
use super::{GpuState, RenderMode};
use crate::buffers::{BufferManager, DrawSet};

/// Counts reported back to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub opaque: usize,
    pub transparent: usize,
    pub tags: usize,
    /// Objects rejected by the last rebuild
    pub rejected: usize,
    pub elapsed_ms: f32,
}

pub(super) struct ScenePass<'a> {
    pub gpu: &'a GpuState,
    pub buffers: &'a BufferManager,
    pub order: &'a DrawOrder,
    pub grid: Option<&'a LineBuffers>,
    pub mode: RenderMode,
    pub background: [f32; 4],
}

fn clear_color(c: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: c[0] as f64,
        g: c[1] as f64,
        b: c[2] as f64,
        a: c[3] as f64,
    }
}

impl ScenePass<'_> {
    /// Grid, then opaque slots, then transparent slots back to front.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, color: &wgpu::TextureView, depth: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene_render_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color(self.background)),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let Some(objects) = self.buffers.gpu() else {
            return;
        };
        pass.set_bind_group(0, &self.gpu.frame_bind_group, &[]);
        pass.set_bind_group(1, objects.bind_group(), &[]);

        if let Some(grid) = self.grid {
            pass.set_pipeline(&self.gpu.pipelines.grid);
            pass.set_vertex_buffer(0, grid.positions.slice(..));
            pass.set_vertex_buffer(1, grid.colors.slice(..));
            pass.set_vertex_buffer(2, grid.object_index.slice(..));
            pass.set_index_buffer(grid.elements.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..grid.element_count, 0, 0..1);
        }

        let pipelines = &self.gpu.pipelines;
        if !self.order.opaque.is_empty() {
            let shaders = pipelines.shader_set(self.mode, false);
            self.buffers
                .draw(&mut pass, &shaders, self.mode, DrawSet::Slots(&self.order.opaque));
        }
        // one slot at a time keeps the back-to-front order across kinds
        let shaders = pipelines.shader_set(self.mode, true);
        for slot in &self.order.transparent {
            self.buffers
                .draw(&mut pass, &shaders, self.mode, DrawSet::Slots(std::slice::from_ref(slot)));
        }
    }
}

/// Drag box over the finished frame.
pub(super) fn encode_overlay(
    gpu: &GpuState,
    encoder: &mut wgpu::CommandEncoder,
    color: &wgpu::TextureView,
    rect: DragBox,
    viewport: (u32, u32),
) {
    let (fill, outline) = drag_box_vertices(rect, viewport);
    let fill_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("overlay_fill_vertices"),
        contents: bytemuck::cast_slice(&fill),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let outline_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("overlay_outline_vertices"),
        contents: bytemuck::cast_slice(&outline),
        usage: wgpu::BufferUsages::VERTEX,
    });

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("overlay_render_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: color,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(&gpu.pipelines.overlay_fill);
    pass.set_vertex_buffer(0, fill_buffer.slice(..));
    pass.draw(0..fill.len() as u32, 0..1);
    pass.set_pipeline(&gpu.pipelines.overlay_outline);
    pass.set_vertex_buffer(0, outline_buffer.slice(..));
    pass.draw(0..outline.len() as u32, 0..1);
}
