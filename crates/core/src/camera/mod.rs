//! Per-frame camera derived from elapsed time and, when available, the
//! device rotation. Right-handed; looks down -z.

use std::f32::consts::TAU;

use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::{
    config::CameraConfig,
    orientation::Rotation,
    scene::{CameraPath, Ray},
};

/// What drove the camera rotation this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationSource {
    Sensor,
    Autonomous,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub position: Vec3,
    pub orientation: Quat,
    pub source: RotationSource,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraState {
    /// Travel along the path always applies. The rotation comes from the
    /// sensor when `rotation` is present and from a slow sway otherwise.
    pub fn derive(
        rotation: Option<Rotation>,
        elapsed: f32,
        config: &CameraConfig,
        path: CameraPath,
        aspect: f32,
    ) -> Self {
        let elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
        let travel = (elapsed * config.travel_speed).rem_euclid(path.length.max(f32::EPSILON));
        let position = Vec3::new(0.0, 0.0, path.start_z - travel);

        let (orientation, source) = match rotation {
            Some(rotation) => (
                sensor_orientation(rotation, config.max_sensor_angle),
                RotationSource::Sensor,
            ),
            None => (sway_orientation(elapsed, config), RotationSource::Autonomous),
        };

        Self {
            position,
            orientation,
            source,
            fov_y: config.fov_y_degrees.to_radians(),
            aspect: if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 },
            near: config.near,
            far: config.far,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), self.up())
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// World-space ray through a point in normalised device coordinates
    /// (x right, y up, both in [-1, 1]).
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let tan_half = (self.fov_y * 0.5).tan();
        let dx = ndc.x * tan_half * self.aspect;
        let dy = ndc.y * tan_half;
        Ray::new(self.position, self.right() * dx + self.up() * dy + self.forward())
    }
}

fn sensor_orientation(rotation: Rotation, max_angle: f32) -> Quat {
    let clamp = |angle: f32| angle.clamp(-max_angle, max_angle).to_radians();
    Quat::from_euler(
        EulerRot::YXZ,
        clamp(rotation.alpha),
        clamp(rotation.beta),
        clamp(rotation.gamma),
    )
}

fn sway_orientation(elapsed: f32, config: &CameraConfig) -> Quat {
    let phase = elapsed * config.sway_frequency * TAU;
    let yaw = config.sway_amplitude * phase.sin();
    let pitch = config.sway_amplitude * 0.5 * (phase * 0.7 + 1.3).sin();
    let roll = config.sway_amplitude * 0.25 * (phase * 0.45).sin();
    Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll)
}
