//! Adaptive ground grid on the XY plane.

use glam::Vec3;
use wgpu::util::DeviceExt;

use super::resources::LineBuffers;
use crate::scene::GeometryArrays;

/// Lines per direction.
pub const DIVISIONS: u32 = 20;

const GRID_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 0.35];
const X_AXIS_COLOR: [f32; 4] = [0.8, 0.2, 0.2, 0.8];
const Y_AXIS_COLOR: [f32; 4] = [0.2, 0.7, 0.2, 0.8];

/// Power-of-ten spacing for a camera distance: 5 -> 1, 50 -> 10, 0.5 -> 0.1.
pub fn grid_step(distance: f32) -> f32 {
    10.0_f32.powf(distance.max(0.01).log10().floor())
}

/// Line list covering `DIVISIONS / 2` steps on each side of the origin. The
/// lines through the origin are colored as the X and Y axes.
pub fn grid_lines(step: f32) -> GeometryArrays {
    let half = step * (DIVISIONS / 2) as f32;
    let mut out = GeometryArrays::default();
    let mut push = |a: Vec3, b: Vec3, color: [f32; 4]| {
        let base = out.positions.len() as u32;
        out.positions.push(a.to_array());
        out.positions.push(b.to_array());
        out.colors.extend([color, color]);
        out.elements.extend([base, base + 1]);
    };
    for i in 0..=DIVISIONS {
        let t = -half + i as f32 * step;
        let on_axis = i == DIVISIONS / 2;
        // parallel to X
        push(
            Vec3::new(-half, t, 0.0),
            Vec3::new(half, t, 0.0),
            if on_axis { X_AXIS_COLOR } else { GRID_COLOR },
        );
        // parallel to Y
        push(
            Vec3::new(t, -half, 0.0),
            Vec3::new(t, half, 0.0),
            if on_axis { Y_AXIS_COLOR } else { GRID_COLOR },
        );
    }
    out
}

pub fn upload(device: &wgpu::Device, lines: &GeometryArrays) -> LineBuffers {
    let init = |label: &str, contents: &[u8], usage: wgpu::BufferUsages| {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        })
    };
    let object_index = vec![0u32; lines.positions.len()];
    LineBuffers {
        positions: init("grid_positions", bytemuck::cast_slice(&lines.positions), wgpu::BufferUsages::VERTEX),
        colors: init("grid_colors", bytemuck::cast_slice(&lines.colors), wgpu::BufferUsages::VERTEX),
        object_index: init("grid_object_index", bytemuck::cast_slice(&object_index), wgpu::BufferUsages::VERTEX),
        elements: init("grid_elements", bytemuck::cast_slice(&lines.elements), wgpu::BufferUsages::INDEX),
        element_count: lines.elements.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::GeometryKind;

    #[test]
    fn test_grid_step_power_of_ten() {
        assert_eq!(grid_step(5.0), 1.0);
        assert_eq!(grid_step(50.0), 10.0);
        assert!((grid_step(0.5) - 0.1).abs() < 1e-6);
        assert!((grid_step(0.0) - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_grid_lines_shape() {
        let lines = grid_lines(1.0);
        let n = (DIVISIONS + 1) as usize * 2;
        assert_eq!(lines.positions.len(), n * 2);
        assert!(lines.validate(GeometryKind::Lines).is_ok());
        assert!(lines.positions.iter().all(|p| p[2] == 0.0));
        let extent = lines.positions.iter().map(|p| p[0].abs().max(p[1].abs())).fold(0.0, f32::max);
        assert_eq!(extent, 10.0);
        assert_eq!(lines.colors.iter().filter(|&&c| c == X_AXIS_COLOR).count(), 2);
    }
}
