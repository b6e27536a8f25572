//! Offscreen instance target and synchronous pixel read-back.

use std::sync::mpsc;
use tracing::debug;

use super::{PixelRect, Selector};
use crate::renderer::{DepthTexture, INSTANCE_FORMAT};
use crate::util::{Error, Result};

const BYTES_PER_PIXEL: u32 = 4;

/// Color + depth target of the picking pass, sized to the viewport.
pub struct InstanceTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub depth: DepthTexture,
    pub size: (u32, u32),
}

impl InstanceTarget {
    pub fn new(device: &wgpu::Device, (width, height): (u32, u32)) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("instance_color_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: INSTANCE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth = DepthTexture::new(device, "instance_depth_texture", (width, height));
        Self {
            texture,
            view,
            depth,
            size: (width, height),
        }
    }
}

/// Row pitch of a copy, aligned for `copy_texture_to_buffer`.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Strip row padding from a mapped copy.
pub(crate) fn unpad_rows(data: &[u8], width: u32, height: u32) -> Vec<[u8; 4]> {
    let pitch = padded_bytes_per_row(width) as usize;
    let row = (width * BYTES_PER_PIXEL) as usize;
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height as usize {
        let start = y * pitch;
        let bytes = &data[start..start + row];
        pixels.extend(bytes.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]));
    }
    pixels
}

impl Selector {
    /// Render the instance pass with `draw` and read back `rect`.
    ///
    /// Blocks until the copy has been mapped. The target is cleared to the
    /// background color and depth 1 before `draw` runs.
    #[tracing::instrument(skip_all, fields(x = rect.x, y = rect.y, w = rect.width, h = rect.height))]
    pub fn capture<F>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        viewport: (u32, u32),
        rect: PixelRect,
        draw: F,
    ) -> Result<Vec<[u8; 4]>>
    where
        F: FnOnce(&mut wgpu::RenderPass<'_>),
    {
        if rect.area() == 0 {
            return Ok(Vec::new());
        }
        let slot = self.target_mut();
        if slot.as_ref().is_some_and(|t| t.size != viewport) {
            *slot = None;
        }
        let target = slot.get_or_insert_with(|| InstanceTarget::new(device, viewport));

        let pitch = padded_bytes_per_row(rect.width);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_readback_buffer"),
            size: (pitch * rect.height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("instance_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("instance_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            draw(&mut pass);
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: rect.x,
                    y: rect.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(pitch),
                    rows_per_image: Some(rect.height),
                },
            },
            wgpu::Extent3d {
                width: rect.width,
                height: rect.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| Error::Readback(e.to_string()))?;
        rx.recv()
            .map_err(|e| Error::Readback(e.to_string()))?
            .map_err(|e| Error::Readback(e.to_string()))?;

        let pixels = {
            let data = slice.get_mapped_range();
            unpad_rows(&data, rect.width, rect.height)
        };
        readback.unmap();
        debug!(pixels = pixels.len(), "instance read-back");
        Ok(pixels)
    }
}
