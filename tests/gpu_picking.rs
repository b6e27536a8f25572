//! Headless GPU tests: instance-color picking and frame rendering.
//!
//! Each test needs a wgpu adapter; on machines without one the test prints a
//! note and returns.

use std::sync::Arc;

use glam::{Vec2, Vec3};
use meshview::picking::{PickRect, SelectionAction};
use meshview::scene::{Cuboid, ObjectStyle, Polyline, Tag, Transform};
use meshview::{ViewMode, Viewer};

const SIZE: u32 = 200;
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn headless() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::default();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default())).ok()?;
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).ok()?;
    Some((Arc::new(device), Arc::new(queue)))
}

/// Viewer looking straight down at the origin: 10 px per world unit
/// in a 200x200 framebuffer.
fn top_viewer() -> Option<Viewer> {
    let Some((device, queue)) = headless() else {
        eprintln!("no GPU adapter, skipping");
        return None;
    };
    let mut viewer = Viewer::default();
    viewer.attach(device, queue, FORMAT).expect("attach");
    viewer.set_view(ViewMode::Top);
    viewer.set_viewport(SIZE, SIZE);
    Some(viewer)
}

fn target(viewer: &Viewer) -> wgpu::TextureView {
    let device = &viewer.renderer().gpu().expect("attached").device;
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("test_target"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[test]
fn test_click_and_empty_pick() {
    let Some(mut viewer) = top_viewer() else {
        return;
    };
    // covers pixels 80..120 on both axes
    let cube = viewer.add_object("cube", Cuboid::cube(4.0), ObjectStyle::default());

    let hits = viewer.pick(PickRect::point(Vec2::new(100.0, 100.0)), 1.0).unwrap();
    assert_eq!(hits, vec![cube]);

    let hits = viewer
        .pick(PickRect::from_corners(Vec2::new(0.0, 0.0), Vec2::new(20.0, 20.0)), 1.0)
        .unwrap();
    assert!(hits.is_empty());

    // outside the framebuffer entirely
    let hits = viewer.pick(PickRect::point(Vec2::new(500.0, 500.0)), 1.0).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn test_drag_select_and_deselect() {
    let Some(mut viewer) = top_viewer() else {
        return;
    };
    let cube = viewer.add_object("cube", Cuboid::cube(4.0), ObjectStyle::default());

    let rect = PickRect::from_corners(Vec2::new(70.0, 70.0), Vec2::new(130.0, 130.0));
    let hits = viewer.request_pick(rect, 1.0, SelectionAction::DragSelect).unwrap();
    assert_eq!(hits, vec![cube]);
    assert_eq!(viewer.selection(), vec![cube]);

    // empty drag leaves the selection alone
    let empty = PickRect::from_corners(Vec2::new(0.0, 0.0), Vec2::new(20.0, 20.0));
    viewer.request_pick(empty, 1.0, SelectionAction::DragSelect).unwrap();
    assert_eq!(viewer.selection(), vec![cube]);

    viewer.request_pick(rect, 1.0, SelectionAction::DragDeselect).unwrap();
    assert!(viewer.selection().is_empty());
}

#[test]
fn test_hidpi_scales_pick_rect() {
    let Some(mut viewer) = top_viewer() else {
        return;
    };
    let cube = viewer.add_object("cube", Cuboid::cube(4.0), ObjectStyle::default());
    // logical (50, 50) at 2x is framebuffer (100, 100)
    let hits = viewer.pick(PickRect::point(Vec2::new(50.0, 50.0)), 2.0).unwrap();
    assert_eq!(hits, vec![cube]);
    // logical (100, 100) at 2x is the far corner, away from the cube
    let hits = viewer.pick(PickRect::point(Vec2::new(98.0, 98.0)), 2.0).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn test_two_objects_and_locking() {
    let Some(mut viewer) = top_viewer() else {
        return;
    };
    let a = viewer.add_object("a", Cuboid::cube(2.0), ObjectStyle::default());
    let b = viewer.add_object("b", Cuboid::cube(2.0), ObjectStyle::default());
    viewer
        .set_transform(b, Transform::from_translation(Vec3::new(6.0, 0.0, 0.0)))
        .unwrap();

    let center = PickRect::point(Vec2::new(100.0, 100.0));
    assert_eq!(viewer.pick(center, 1.0).unwrap(), vec![a]);

    let everything = PickRect::from_corners(Vec2::ZERO, Vec2::splat(SIZE as f32));
    let mut hits = viewer.pick(everything, 1.0).unwrap();
    hits.sort();
    assert_eq!(hits, vec![a, b]);

    viewer.set_locked(a, true).unwrap();
    assert!(viewer.pick(center, 1.0).unwrap().is_empty());
    assert_eq!(viewer.pick(everything, 1.0).unwrap(), vec![b]);

    // a locked object ignores selection actions
    viewer.request_pick(everything, 1.0, SelectionAction::DragSelect).unwrap();
    assert_eq!(viewer.selection(), vec![b]);
}

#[test]
fn test_hidden_objects_are_not_picked() {
    let Some(mut viewer) = top_viewer() else {
        return;
    };
    let cube = viewer.add_object("cube", Cuboid::cube(4.0), ObjectStyle::default());
    let center = PickRect::point(Vec2::new(100.0, 100.0));
    viewer.set_visible(cube, false).unwrap();
    assert!(viewer.pick(center, 1.0).unwrap().is_empty());
    viewer.set_visible(cube, true).unwrap();
    assert_eq!(viewer.pick(center, 1.0).unwrap(), vec![cube]);
}

#[test]
fn test_render_reports_draw_order() {
    let Some(mut viewer) = top_viewer() else {
        return;
    };
    viewer.add_object("solid", Cuboid::cube(1.0), ObjectStyle::default());
    viewer.add_object("glass", Cuboid::cube(2.0), ObjectStyle::default().with_opacity(0.5));
    viewer.add_object(
        "line",
        Polyline {
            points: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            closed: true,
        },
        ObjectStyle::default(),
    );
    viewer.add_object("tag", Tag::new("origin", Vec3::ZERO), ObjectStyle::default());

    let view = target(&viewer);
    let stats = viewer.render(&view, SIZE, SIZE).unwrap();
    assert_eq!(stats.opaque, 2);
    assert_eq!(stats.transparent, 1);
    assert_eq!(stats.tags, 1);
    assert_eq!(stats.rejected, 0);
    assert!(viewer.renderer().is_ready(viewer.scene()));

    // zero-sized frames are skipped
    let stats = viewer.render(&view, 0, SIZE).unwrap();
    assert_eq!(stats.opaque, 0);
}

#[test]
fn test_malformed_geometry_is_rejected_not_fatal() {
    let Some(mut viewer) = top_viewer() else {
        return;
    };
    let good = viewer.add_object("good", Cuboid::cube(4.0), ObjectStyle::default());
    viewer.add_object(
        "bad",
        meshview::scene::Mesh {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            faces: vec![vec![0, 1, 7]],
        },
        ObjectStyle::default(),
    );
    let view = target(&viewer);
    let stats = viewer.render(&view, SIZE, SIZE).unwrap();
    assert_eq!(stats.rejected, 1);
    assert_eq!(
        viewer.pick(PickRect::point(Vec2::new(100.0, 100.0)), 1.0).unwrap(),
        vec![good]
    );
}
