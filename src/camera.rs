//! Orbit camera: Euler rotation around a target, Z up.
//!
//! The camera sits at `target + R * (0, 0, distance)` and looks down its local
//! -Z axis, with `R = Rz(rz) * Ry(ry) * Rx(rx)`. Position, rotation and target
//! are only changed through [`Camera::update`], which recomputes the dependent
//! values inside one guarded transaction.

use glam::{EulerRot, Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::util::Bounds;

/// Smallest distance zoom can reach.
const MIN_DISTANCE: f32 = 1e-6;
/// Lower bound of a single zoom factor, so one huge step cannot invert.
const MIN_ZOOM_FACTOR: f32 = 0.01;
/// Keeps rx away from the poles where rz is undefined.
const POLE_EPSILON: f32 = 1e-4;

/// View presets. Only `Perspective` accepts rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewMode {
    #[default]
    Perspective,
    Top,
    Front,
    Right,
}

impl ViewMode {
    pub const ALL: [ViewMode; 4] = [ViewMode::Perspective, ViewMode::Top, ViewMode::Front, ViewMode::Right];

    /// Preset Euler angles (rx, ry, rz) in radians.
    pub fn preset_rotation(self) -> Vec3 {
        let (rx, rz): (f32, f32) = match self {
            ViewMode::Perspective => (45.0, -45.0),
            ViewMode::Top => (0.0, 0.0),
            ViewMode::Front => (90.0, 0.0),
            ViewMode::Right => (90.0, 90.0),
        };
        Vec3::new(rx.to_radians(), 0.0, rz.to_radians())
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Perspective => "Perspective",
            ViewMode::Top => "Top",
            ViewMode::Front => "Front",
            ViewMode::Right => "Right",
        }
    }
}

/// Scene units; multiplies near/far and the pan step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    #[default]
    Meters,
    Centimeters,
    Millimeters,
}

impl Units {
    pub fn scale(self) -> f32 {
        match self {
            Units::Meters => 1.0,
            Units::Centimeters => 100.0,
            Units::Millimeters => 1000.0,
        }
    }
}

/// One camera transaction. Applied target, then rotation, then position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraUpdate {
    pub target: Option<Vec3>,
    pub rotation: Option<Vec3>,
    pub position: Option<Vec3>,
}

/// Consistent snapshot returned by [`Camera::update`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    pub rotation: Vec3,
    pub target: Vec3,
    pub distance: f32,
}

#[derive(Clone, Debug)]
pub struct Camera {
    position: Vec3,
    /// Euler (rx, ry, rz) in radians
    rotation: Vec3,
    target: Vec3,
    distance: f32,
    view: ViewMode,
    updating: bool,
    revision: u64,

    pub scale: f32,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub pandelta: f32,
    /// Radians per pixel of drag
    pub rotationdelta: f32,
    pub zoomdelta: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl Camera {
    pub fn new(distance: f32) -> Self {
        let mut cam = Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            target: Vec3::ZERO,
            distance: distance.max(MIN_DISTANCE),
            view: ViewMode::Perspective,
            updating: false,
            revision: 0,
            scale: 1.0,
            fov: 45.0,
            near: 0.1,
            far: 1000.0,
            pandelta: 0.01,
            rotationdelta: 0.01,
            zoomdelta: 0.1,
        };
        cam.reset_position(ViewMode::Perspective);
        cam
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    /// Bumped by every state change; lets callers cache derived matrices.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn state(&self) -> CameraState {
        CameraState {
            position: self.position,
            rotation: self.rotation,
            target: self.target,
            distance: self.distance,
        }
    }

    fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_euler(EulerRot::ZYX, self.rotation.z, self.rotation.y, self.rotation.x)
    }

    fn offset(&self) -> Vec3 {
        self.rotation_matrix() * Vec3::new(0.0, 0.0, self.distance)
    }

    /// Apply a change and recompute the dependent properties.
    pub fn update(&mut self, change: CameraUpdate) -> CameraState {
        assert!(!self.updating, "re-entrant camera update");
        self.updating = true;

        if let Some(target) = change.target {
            // keep the relative offset
            self.target = target;
            self.position = target + self.offset();
        }
        if let Some(rotation) = change.rotation {
            self.rotation = rotation;
            self.position = self.target + self.offset();
        }
        if let Some(position) = change.position {
            self.position = position;
            self.derive_rotation();
        }

        self.revision += 1;
        self.updating = false;
        self.state()
    }

    /// Rotation and distance from `position - target`; roll is dropped.
    fn derive_rotation(&mut self) {
        let offset = self.position - self.target;
        let d = offset.length();
        if d < MIN_DISTANCE {
            // degenerate: back off along the current view axis
            self.distance = MIN_DISTANCE;
            self.position = self.target + self.offset();
            return;
        }
        self.distance = d;
        let rx = (offset.z / d).clamp(-1.0, 1.0).acos();
        let rz = if rx.sin().abs() > POLE_EPSILON {
            offset.x.atan2(-offset.y)
        } else {
            self.rotation.z
        };
        self.rotation = Vec3::new(rx, 0.0, rz);
        // re-derive so the stored position is exactly on the orbit
        self.position = self.target + self.offset();
    }

    pub fn set_position(&mut self, position: Vec3) -> CameraState {
        self.update(CameraUpdate {
            position: Some(position),
            ..Default::default()
        })
    }

    pub fn set_rotation(&mut self, rotation: Vec3) -> CameraState {
        self.update(CameraUpdate {
            rotation: Some(rotation),
            ..Default::default()
        })
    }

    pub fn set_target(&mut self, target: Vec3) -> CameraState {
        self.update(CameraUpdate {
            target: Some(target),
            ..Default::default()
        })
    }

    /// Move target and position in the view plane.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let r = self.rotation_matrix();
        let right = r * Vec3::X;
        let up = r * Vec3::Y;
        let step = self.pandelta * self.scale;
        let target = self.target + (-dx * right + dy * up) * step;
        self.set_target(target);
    }

    /// Orbit around the target. Ignored in the orthographic presets.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        if self.view != ViewMode::Perspective {
            return;
        }
        let mut rotation = self.rotation;
        rotation.z -= dx * self.rotationdelta;
        rotation.x = (rotation.x - dy * self.rotationdelta).clamp(POLE_EPSILON, std::f32::consts::PI - POLE_EPSILON);
        self.set_rotation(rotation);
    }

    /// Exponential zoom: positive steps move closer.
    pub fn zoom(&mut self, steps: f32) {
        let factor = (1.0 - steps * self.zoomdelta).max(MIN_ZOOM_FACTOR);
        self.distance = (self.distance * factor).max(MIN_DISTANCE);
        let target = self.target;
        self.set_target(target);
    }

    /// Snap rotation to a preset and re-centre on the origin.
    pub fn reset_position(&mut self, view: ViewMode) {
        self.view = view;
        self.update(CameraUpdate {
            target: Some(Vec3::ZERO),
            rotation: Some(view.preset_rotation()),
            position: None,
        });
    }

    /// Frame the given bounds, keeping the current direction.
    pub fn focus(&mut self, bounds: &Bounds) {
        if bounds.is_empty() {
            return;
        }
        let radius = bounds.radius().max(MIN_DISTANCE);
        let half_fov = (self.fov.to_radians() * 0.5).max(1e-3);
        self.distance = match self.view {
            ViewMode::Perspective => radius / half_fov.sin() * 1.1,
            _ => radius * 1.1,
        };
        self.set_target(bounds.center());
    }

    /// Projection for a viewport of `width` x `height` pixels.
    pub fn projection(&self, width: u32, height: u32) -> Mat4 {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let near = self.near * self.scale;
        let far = self.far * self.scale;
        match self.view {
            ViewMode::Perspective => Mat4::perspective_rh(self.fov.to_radians(), aspect, near, far),
            _ => {
                let h = self.distance;
                let w = h * aspect;
                Mat4::orthographic_rh(-w, w, -h, h, -far, far)
            }
        }
    }

    /// World to camera space: inverse of translate(position) * rotate(rotation).
    pub fn viewworld(&self) -> Mat4 {
        let camera_to_world = Mat4::from_translation(self.position) * Mat4::from_mat3(self.rotation_matrix());
        camera_to_world.inverse()
    }
}
