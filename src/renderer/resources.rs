//! Size-tracked render targets.

use super::pipelines::DEPTH_FORMAT;

#[derive(Debug)]
pub struct DepthTexture {
    #[allow(dead_code)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
}

impl DepthTexture {
    pub fn new(device: &wgpu::Device, label: &str, (width, height): (u32, u32)) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            size: (width, height),
        }
    }

    /// Recreate `slot` if it is missing or has a different size.
    pub fn ensure<'a>(slot: &'a mut Option<Self>, device: &wgpu::Device, label: &str, size: (u32, u32)) -> &'a Self {
        if slot.as_ref().is_some_and(|d| d.size != size) {
            *slot = None;
        }
        slot.get_or_insert_with(|| Self::new(device, label, size))
    }
}

/// Small vertex + index buffer pair for renderer-owned geometry.
#[derive(Debug)]
pub struct LineBuffers {
    pub positions: wgpu::Buffer,
    pub colors: wgpu::Buffer,
    pub object_index: wgpu::Buffer,
    pub elements: wgpu::Buffer,
    pub element_count: u32,
}
