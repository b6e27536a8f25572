//! Flat, lighted and instance-color shading for consolidated geometry buffers.
//!
//! Geometry is drawn from three parallel vertex streams (position, RGBA color,
//! object index). The object index selects a world transform and an
//! [`ObjectSettings`] record from storage buffers, which lets a renderer keep a
//! single buffer set per geometry kind for the whole scene.
//!
//! ## Usage
//!
//! ```ignore
//! use flat_shading::{create_bind_group_layouts, compile_shader, create_pipeline, PipelineConfig};
//!
//! let layouts = create_bind_group_layouts(&device);
//! let module = compile_shader(&device, "scene", flat_shading::SHADER_SOURCE)?;
//! let faces = create_pipeline(&device, &layouts, &module, &PipelineConfig::faces(format));
//! ```

mod uniforms;

pub use uniforms::{mode, visibility, FrameUniform, ObjectSettings, OverlayVertex};

use std::fmt;

/// Embedded scene shader source
pub const SHADER_SOURCE: &str = include_str!("shaders/scene.wgsl");

/// Drag-box overlay shader source (screen space, no bind groups)
pub const OVERLAY_SHADER_SOURCE: &str = r#"
struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_overlay(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(in.position, 0.0, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_overlay(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Shader module failed validation
#[derive(Clone, Debug)]
pub struct ShaderError {
    pub label: String,
    pub message: String,
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shader '{}' failed to compile: {}", self.label, self.message)
    }
}

impl std::error::Error for ShaderError {}

/// Compile a WGSL module, surfacing validation errors instead of the
/// device's uncaptured-error handler.
pub fn compile_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(ShaderError {
            label: label.to_string(),
            message: err.to_string(),
        }),
        None => Ok(module),
    }
}

const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    offset: 0,
    shader_location: 0,
    format: wgpu::VertexFormat::Float32x3,
}];

const COLOR_ATTRS: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    offset: 0,
    shader_location: 1,
    format: wgpu::VertexFormat::Float32x4,
}];

const OBJECT_INDEX_ATTRS: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    offset: 0,
    shader_location: 2,
    format: wgpu::VertexFormat::Uint32,
}];

/// Bytes per vertex in the position stream
pub const POSITION_STRIDE: u64 = 12;
/// Bytes per vertex in the color stream
pub const COLOR_STRIDE: u64 = 16;
/// Bytes per vertex in the object-index stream
pub const OBJECT_INDEX_STRIDE: u64 = 4;

/// Vertex buffer layouts in slot order: positions, colors, object indices.
pub fn vertex_buffer_layouts() -> [wgpu::VertexBufferLayout<'static>; 3] {
    [
        wgpu::VertexBufferLayout {
            array_stride: POSITION_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &POSITION_ATTRS,
        },
        wgpu::VertexBufferLayout {
            array_stride: COLOR_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &COLOR_ATTRS,
        },
        wgpu::VertexBufferLayout {
            array_stride: OBJECT_INDEX_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &OBJECT_INDEX_ATTRS,
        },
    ]
}

const OVERLAY_ATTRS: [wgpu::VertexAttribute; 2] = [
    wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x2,
    },
    wgpu::VertexAttribute {
        offset: 8,
        shader_location: 1,
        format: wgpu::VertexFormat::Float32x4,
    },
];

/// Vertex buffer layout for [`OverlayVertex`]
pub fn overlay_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<OverlayVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &OVERLAY_ATTRS,
    }
}

/// Bind group layouts for the scene shader
pub struct BindGroupLayouts {
    /// Group 0: frame uniform
    pub frame: wgpu::BindGroupLayout,
    /// Group 1: per-object transforms and settings
    pub objects: wgpu::BindGroupLayout,
}

/// Create bind group layouts for the scene pipelines
pub fn create_bind_group_layouts(device: &wgpu::Device) -> BindGroupLayouts {
    let frame_size = std::num::NonZeroU64::new(std::mem::size_of::<FrameUniform>() as u64);

    let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("flat_shading_frame"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: frame_size,
            },
            count: None,
        }],
    });

    let storage = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    let objects = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("flat_shading_objects"),
        // 0: transforms, 1: settings
        entries: &[storage(0), storage(1)],
    });

    BindGroupLayouts { frame, objects }
}

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Debug label for the pipeline (defaults to "flat_shading_pipeline")
    pub label: Option<&'static str>,
    /// Color target format
    pub format: wgpu::TextureFormat,
    /// Depth texture format (None to disable depth)
    pub depth_format: Option<wgpu::TextureFormat>,
    /// Enable alpha blending
    pub blend: bool,
    /// Write to depth buffer (disable for transparency)
    pub depth_write: bool,
    /// Primitive topology (PointList, LineList, TriangleList)
    pub topology: wgpu::PrimitiveTopology,
    /// Cull mode for triangle topologies
    pub cull_mode: Option<wgpu::Face>,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: None,
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
            depth_format: Some(wgpu::TextureFormat::Depth32Float),
            blend: false,
            depth_write: true,
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            vertex_entry: "vs_faces",
            fragment_entry: "fs_flat",
        }
    }
}

impl PipelineConfig {
    /// Triangle pipeline for front/back face buffers
    pub fn faces(format: wgpu::TextureFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// Line-list pipeline
    pub fn lines(format: wgpu::TextureFormat) -> Self {
        Self {
            format,
            topology: wgpu::PrimitiveTopology::LineList,
            cull_mode: None,
            vertex_entry: "vs_lines",
            ..Default::default()
        }
    }

    /// Point-list pipeline
    pub fn points(format: wgpu::TextureFormat) -> Self {
        Self {
            format,
            topology: wgpu::PrimitiveTopology::PointList,
            cull_mode: None,
            vertex_entry: "vs_points",
            ..Default::default()
        }
    }

    /// Renderer-owned grid lines in world space
    pub fn grid(format: wgpu::TextureFormat) -> Self {
        Self {
            blend: true,
            vertex_entry: "vs_grid",
            ..Self::lines(format)
        }
    }

    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// Alpha-blended, no depth write
    pub fn transparent(mut self) -> Self {
        self.blend = true;
        self.depth_write = false;
        self
    }

    /// Lit fragment path (faces only)
    pub fn lighted(mut self) -> Self {
        self.fragment_entry = "fs_lighted";
        self
    }

    /// Flat instance colors, no blending
    pub fn instance(mut self) -> Self {
        self.fragment_entry = "fs_instance";
        self.blend = false;
        self.depth_write = true;
        self
    }
}

/// Create a scene render pipeline from a compiled [`SHADER_SOURCE`] module
pub fn create_pipeline(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    module: &wgpu::ShaderModule,
    config: &PipelineConfig,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("flat_shading_pipeline_layout"),
        bind_group_layouts: &[&layouts.frame, &layouts.objects],
        push_constant_ranges: &[],
    });

    let blend_state = if config.blend {
        Some(wgpu::BlendState::ALPHA_BLENDING)
    } else {
        Some(wgpu::BlendState::REPLACE)
    };

    let is_triangles = config.topology == wgpu::PrimitiveTopology::TriangleList;
    let buffers = vertex_buffer_layouts();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(config.label.unwrap_or("flat_shading_pipeline")),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(config.vertex_entry),
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        primitive: wgpu::PrimitiveState {
            topology: config.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: if is_triangles { config.cull_mode } else { None },
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: config.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: config.depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(config.fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: config.format,
                blend: blend_state,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

/// Create the drag-box overlay pipeline (no depth, alpha blended)
pub fn create_overlay_pipeline(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    topology: wgpu::PrimitiveTopology,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("overlay_pipeline_layout"),
        bind_group_layouts: &[],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("overlay_pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_overlay"),
            compilation_options: Default::default(),
            buffers: &[overlay_vertex_layout()],
        },
        primitive: wgpu::PrimitiveState {
            topology,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_overlay"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}
