use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{QualityTier, Result, TunnelError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub quality: QualityConfig,
    pub orientation: OrientationConfig,
    pub scene: SceneConfig,
    pub camera: CameraConfig,
    pub audio: AudioConfig,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let blend = self.orientation.blend_factor;
        if !(blend > 0.0 && blend <= 1.0) {
            return Err(TunnelError::invalid(format!(
                "orientation.blend_factor must be in (0, 1], got {blend}"
            )));
        }
        if self.orientation.permission_timeout_seconds <= 0.0 {
            return Err(TunnelError::invalid(
                "orientation.permission_timeout_seconds must be positive",
            ));
        }
        if self.scene.spacing <= 0.0 {
            return Err(TunnelError::invalid("scene.spacing must be positive"));
        }
        if self.scene.tunnel_radial_segments < 3 || self.scene.tunnel_length_segments < 1 {
            return Err(TunnelError::invalid(
                "tunnel needs at least 3 radial and 1 length segment",
            ));
        }
        if self.audio.sample_rate == 0 {
            return Err(TunnelError::invalid("audio.sample_rate must be non-zero"));
        }
        Ok(())
    }
}

/// Inputs to the one-shot capability classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Case-insensitive substrings identifying GPUs allowed to run `High`.
    pub capable_gpus: Vec<String>,
    /// Below this much memory (GiB) the device is treated as `Low`.
    pub low_memory_gb: f32,
    /// At least this much memory (GiB) is required for `High`.
    pub high_memory_gb: f32,
    /// Skips classification entirely when set.
    pub force_tier: Option<QualityTier>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            capable_gpus: ["apple", "nvidia", "geforce", "radeon", "adreno 7", "mali-g7"]
                .into_iter()
                .map(String::from)
                .collect(),
            low_memory_gb: 2.0,
            high_memory_gb: 4.0,
            force_tier: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Per-frame blend toward the calibrated target, in (0, 1].
    pub blend_factor: f32,
    pub permission_timeout_seconds: f32,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            blend_factor: 0.1,
            permission_timeout_seconds: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Particle count per emitter before quality scaling.
    pub base_particle_count: u32,
    pub spiral_radius: f32,
    pub radius_oscillation: f32,
    pub oscillation_frequency: f32,
    /// Angle advance per event, in radians.
    pub angle_step: f32,
    /// Distance along -z between consecutive events.
    pub spacing: f32,
    pub tunnel_radius: f32,
    /// Extra tunnel length past the last event.
    pub tunnel_padding: f32,
    pub tunnel_radial_segments: u32,
    pub tunnel_length_segments: u32,
    pub crystal_size: f32,
    /// Point size multiplier pushed to every emitter.
    pub point_size: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            base_particle_count: 1_500,
            spiral_radius: 3.0,
            radius_oscillation: 0.6,
            oscillation_frequency: 0.9,
            angle_step: 0.75,
            spacing: 8.0,
            tunnel_radius: 7.5,
            tunnel_padding: 30.0,
            tunnel_radial_segments: 48,
            tunnel_length_segments: 96,
            crystal_size: 0.6,
            point_size: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Autonomous travel speed along -z in units per second.
    pub travel_speed: f32,
    /// Amplitude of the autonomous sway, in radians.
    pub sway_amplitude: f32,
    pub sway_frequency: f32,
    /// Clamp applied to sensor-driven yaw, pitch and roll, in degrees.
    pub max_sensor_angle: f32,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            travel_speed: 2.5,
            sway_amplitude: 0.12,
            sway_frequency: 0.25,
            max_sensor_angle: 60.0,
            fov_y_degrees: 70.0,
            near: 0.1,
            far: 400.0,
        }
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub master_gain: f32,
    pub enabled: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            master_gain: 0.4,
            enabled: true,
        }
    }
}
