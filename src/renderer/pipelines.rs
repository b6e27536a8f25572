//! Scene pipelines: opaque, transparent and instance variants per primitive.

use flat_shading::{BindGroupLayouts, PipelineConfig};

use super::RenderMode;
use crate::buffers::ShaderSet;
use crate::util::Result;

/// Color format of the offscreen picking target.
pub const INSTANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct Variants {
    pub opaque: wgpu::RenderPipeline,
    pub transparent: wgpu::RenderPipeline,
}

impl Variants {
    fn get(&self, transparent: bool) -> &wgpu::RenderPipeline {
        if transparent {
            &self.transparent
        } else {
            &self.opaque
        }
    }
}

pub struct Pipelines {
    pub faces: Variants,
    pub faces_lighted: Variants,
    pub lines: Variants,
    pub points: Variants,
    pub grid: wgpu::RenderPipeline,
    pub instance_faces: wgpu::RenderPipeline,
    pub instance_lines: wgpu::RenderPipeline,
    pub instance_points: wgpu::RenderPipeline,
    pub overlay_fill: wgpu::RenderPipeline,
    pub overlay_outline: wgpu::RenderPipeline,
}

impl Pipelines {
    /// Display pipelines for `mode`.
    pub fn shader_set(&self, mode: RenderMode, transparent: bool) -> ShaderSet<'_> {
        if mode == RenderMode::Instance {
            return self.instance_set();
        }
        let faces = if mode.is_lit() { &self.faces_lighted } else { &self.faces };
        ShaderSet {
            faces: faces.get(transparent),
            lines: self.lines.get(transparent),
            points: self.points.get(transparent),
            is_instance: false,
        }
    }

    /// Flat instance-color pipelines for the picking pass.
    pub fn instance_set(&self) -> ShaderSet<'_> {
        ShaderSet {
            faces: &self.instance_faces,
            lines: &self.instance_lines,
            points: &self.instance_points,
            is_instance: true,
        }
    }
}

/// Compile both shader modules and build every pipeline. Shader errors are
/// returned, not deferred to the first draw.
pub fn create_pipelines(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    format: wgpu::TextureFormat,
) -> Result<Pipelines> {
    let module = flat_shading::compile_shader(device, "scene_shader", flat_shading::SHADER_SOURCE)?;
    let overlay_module = flat_shading::compile_shader(device, "overlay_shader", flat_shading::OVERLAY_SHADER_SOURCE)?;

    let build = |config: PipelineConfig| flat_shading::create_pipeline(device, layouts, &module, &config);
    let variants = |config: PipelineConfig, label: &'static str, label_t: &'static str| Variants {
        opaque: build(config.clone().with_label(label)),
        transparent: build(config.transparent().with_label(label_t)),
    };

    let faces = variants(PipelineConfig::faces(format), "faces_pipeline", "faces_transparent_pipeline");
    let faces_lighted = variants(
        PipelineConfig::faces(format).lighted(),
        "faces_lighted_pipeline",
        "faces_lighted_transparent_pipeline",
    );
    let lines = variants(PipelineConfig::lines(format), "lines_pipeline", "lines_transparent_pipeline");
    let points = variants(PipelineConfig::points(format), "points_pipeline", "points_transparent_pipeline");
    let grid = build(PipelineConfig::grid(format).with_label("grid_pipeline"));

    let instance_faces = build(PipelineConfig::faces(INSTANCE_FORMAT).instance().with_label("instance_faces_pipeline"));
    let instance_lines = build(PipelineConfig::lines(INSTANCE_FORMAT).instance().with_label("instance_lines_pipeline"));
    let instance_points = build(PipelineConfig::points(INSTANCE_FORMAT).instance().with_label("instance_points_pipeline"));

    let overlay_fill = flat_shading::create_overlay_pipeline(device, &overlay_module, format, wgpu::PrimitiveTopology::TriangleList);
    let overlay_outline = flat_shading::create_overlay_pipeline(device, &overlay_module, format, wgpu::PrimitiveTopology::LineList);

    Ok(Pipelines {
        faces,
        faces_lighted,
        lines,
        points,
        grid,
        instance_faces,
        instance_lines,
        instance_points,
        overlay_fill,
        overlay_outline,
    })
}
