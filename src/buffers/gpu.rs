//! GPU copies of the consolidated arrays.

use wgpu::util::DeviceExt;

use super::{BufferManager, BufferTarget, DrawSet};
use crate::renderer::RenderMode;
use crate::scene::GeometryKind;

/// Vertex streams and index buffer of one geometry kind.
pub struct KindBuffers {
    pub positions: wgpu::Buffer,
    pub colors: wgpu::Buffer,
    pub object_index: wgpu::Buffer,
    pub elements: wgpu::Buffer,
    pub element_count: u32,
}

/// Uploaded buffers plus the bind group exposing transforms and settings.
pub struct GpuBuffers {
    kinds: [KindBuffers; 4],
    transforms: wgpu::Buffer,
    settings: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Pipelines used for one pass, one per primitive type.
pub struct ShaderSet<'p> {
    pub faces: &'p wgpu::RenderPipeline,
    pub lines: &'p wgpu::RenderPipeline,
    pub points: &'p wgpu::RenderPipeline,
    /// Instance-color variants (picking pass)
    pub is_instance: bool,
}

impl ShaderSet<'_> {
    fn for_kind(&self, kind: GeometryKind) -> &wgpu::RenderPipeline {
        match kind {
            GeometryKind::Points => self.points,
            GeometryKind::Lines => self.lines,
            GeometryKind::FrontFaces | GeometryKind::BackFaces => self.faces,
        }
    }
}

/// Buffers can not be empty; pad to `min` bytes.
fn init_buffer(device: &wgpu::Device, label: &str, bytes: &[u8], min: usize, usage: wgpu::BufferUsages) -> wgpu::Buffer {
    let padded;
    let contents = if bytes.len() < min {
        padded = vec![0u8; min];
        &padded[..]
    } else {
        bytes
    };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage,
    })
}

impl GpuBuffers {
    pub(super) fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, manager: &BufferManager) -> Self {
        let vertex = wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST;
        let index = wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST;
        let storage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;

        let kinds = GeometryKind::ALL.map(|kind| {
            let arrays = manager.kind(kind);
            let label = kind.label();
            KindBuffers {
                positions: init_buffer(device, &format!("{label}_positions"), bytemuck::cast_slice(&arrays.positions), 16, vertex),
                colors: init_buffer(device, &format!("{label}_colors"), bytemuck::cast_slice(&arrays.colors), 16, vertex),
                object_index: init_buffer(device, &format!("{label}_object_index"), bytemuck::cast_slice(&arrays.object_index), 16, vertex),
                elements: init_buffer(device, &format!("{label}_elements"), bytemuck::cast_slice(&arrays.elements), 16, index),
                element_count: arrays.element_count(),
            }
        });

        let transforms = init_buffer(device, "object_transforms", bytemuck::cast_slice(manager.transforms()), 64, storage);
        let settings = init_buffer(device, "object_settings", bytemuck::cast_slice(manager.settings()), 32, storage);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("objects_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: transforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: settings.as_entire_binding(),
                },
            ],
        });

        Self {
            kinds,
            transforms,
            settings,
            bind_group,
        }
    }

    pub fn kind(&self, kind: GeometryKind) -> &KindBuffers {
        &self.kinds[kind.index()]
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub(super) fn target(&self, target: BufferTarget) -> &wgpu::Buffer {
        match target {
            BufferTarget::Positions(kind) => &self.kinds[kind.index()].positions,
            BufferTarget::Colors(kind) => &self.kinds[kind.index()].colors,
            BufferTarget::Transforms => &self.transforms,
            BufferTarget::Settings => &self.settings,
        }
    }
}

impl BufferManager {
    /// Encode the planned draws. Bind groups 0 (frame) and 1 (objects) must
    /// already be set on `pass`.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, shaders: &ShaderSet<'_>, mode: RenderMode, set: DrawSet<'_>) {
        let Some(gpu) = self.gpu() else {
            return;
        };
        let commands = self.plan_draws(mode, set);
        tracing::trace!(instance = shaders.is_instance, draws = commands.len(), "buffer draw");

        let mut bound: Option<GeometryKind> = None;
        for cmd in commands {
            if bound != Some(cmd.kind) {
                let kb = gpu.kind(cmd.kind);
                pass.set_pipeline(shaders.for_kind(cmd.kind));
                pass.set_vertex_buffer(0, kb.positions.slice(..));
                pass.set_vertex_buffer(1, kb.colors.slice(..));
                pass.set_vertex_buffer(2, kb.object_index.slice(..));
                pass.set_index_buffer(kb.elements.slice(..), wgpu::IndexFormat::Uint32);
                bound = Some(cmd.kind);
            }
            pass.draw_indexed(cmd.elements, 0, 0..1);
        }
    }
}
