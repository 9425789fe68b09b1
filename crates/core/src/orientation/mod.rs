//! Device orientation to camera rotation.
//!
//! Sensor callbacks only write into a single-slot register through
//! [`OrientationAdapter::push_sample`]. The render loop reads that register
//! once per frame via [`OrientationAdapter::tick`], which is where calibration
//! and smoothing happen.

use serde::{Deserialize, Serialize};

use crate::config::OrientationConfig;

/// Raw Euler-like angles in degrees as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

impl OrientationSample {
    pub fn new(alpha: f32, beta: f32, gamma: f32) -> Self {
        Self { alpha, beta, gamma }
    }

    fn is_valid(&self) -> bool {
        self.alpha.is_finite() && self.beta.is_finite() && self.gamma.is_finite()
    }
}

/// Calibrated, smoothed rotation in degrees, each axis in (-180, 180].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

impl Rotation {
    pub const ZERO: Rotation = Rotation {
        alpha: 0.0,
        beta: 0.0,
        gamma: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionState {
    Unrequested,
    Pending,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationCapability {
    /// The platform reports orientation events at all.
    pub supported: bool,
    /// Access must be granted explicitly before samples arrive.
    pub requires_permission: bool,
}

impl OrientationCapability {
    pub const UNSUPPORTED: OrientationCapability = OrientationCapability {
        supported: false,
        requires_permission: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrientationStatus {
    pub supported: bool,
    pub permission: PermissionState,
}

#[derive(Debug, Clone)]
pub struct OrientationAdapter {
    capability: OrientationCapability,
    config: OrientationConfig,
    permission: PermissionState,
    requested_at: Option<f32>,
    latest: Option<OrientationSample>,
    calibration: Option<OrientationSample>,
    smoothed: Rotation,
}

impl OrientationAdapter {
    pub fn new(capability: OrientationCapability, config: OrientationConfig) -> Self {
        let permission = if capability.supported && !capability.requires_permission {
            PermissionState::Granted
        } else {
            PermissionState::Unrequested
        };
        Self {
            capability,
            config,
            permission,
            requested_at: None,
            latest: None,
            calibration: None,
            smoothed: Rotation::ZERO,
        }
    }

    pub fn status(&self) -> OrientationStatus {
        OrientationStatus {
            supported: self.capability.supported,
            permission: self.permission,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// Issues the consent request. Only the first call has an effect; a
    /// resolved request is never retried.
    pub fn request_permission(&mut self, now: f32) -> PermissionState {
        if self.capability.supported && self.permission == PermissionState::Unrequested {
            self.permission = if self.capability.requires_permission {
                self.requested_at = Some(now);
                PermissionState::Pending
            } else {
                PermissionState::Granted
            };
            tracing::info!(permission = ?self.permission, "orientation permission requested");
        }
        self.permission
    }

    pub fn resolve_permission(&mut self, granted: bool) {
        if self.permission != PermissionState::Pending {
            return;
        }
        self.permission = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        tracing::info!(permission = ?self.permission, "orientation permission resolved");
    }

    /// Sensor callback entry point. Latest value wins; nothing is processed
    /// here.
    pub fn push_sample(&mut self, sample: OrientationSample) {
        if self.permission == PermissionState::Granted && sample.is_valid() {
            self.latest = Some(sample);
        }
    }

    /// Recaptures the zero reference at the current pose. Without a sample
    /// yet, the next one becomes the reference.
    pub fn calibrate(&mut self) {
        self.calibration = self.latest;
        self.smoothed = Rotation::ZERO;
        tracing::debug!(calibrated = self.calibration.is_some(), "orientation recalibrated");
    }

    /// Advances one frame. Returns `None` whenever the camera should use
    /// autonomous motion instead.
    pub fn tick(&mut self, now: f32) -> Option<Rotation> {
        if self.permission == PermissionState::Pending {
            let waited = self.requested_at.map(|at| now - at).unwrap_or(0.0);
            if waited >= self.config.permission_timeout_seconds {
                tracing::warn!(waited, "orientation permission timed out, treating as denied");
                self.permission = PermissionState::Denied;
            }
        }

        if !self.capability.supported || self.permission != PermissionState::Granted {
            return None;
        }

        let raw = self.latest?;
        let offset = match self.calibration {
            Some(offset) => offset,
            None => {
                self.calibration = Some(raw);
                self.smoothed = Rotation::ZERO;
                raw
            }
        };

        let blend = self.config.blend_factor;
        self.smoothed = Rotation {
            alpha: approach_angle(self.smoothed.alpha, wrap_degrees(raw.alpha - offset.alpha), blend),
            beta: approach_angle(self.smoothed.beta, wrap_degrees(raw.beta - offset.beta), blend),
            gamma: approach_angle(self.smoothed.gamma, wrap_degrees(raw.gamma - offset.gamma), blend),
        };
        Some(self.smoothed)
    }
}

/// Wraps an angle in degrees into (-180, 180]. In-range values pass through
/// unchanged.
pub fn wrap_degrees(angle: f32) -> f32 {
    if angle > -180.0 && angle <= 180.0 {
        return angle;
    }
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Moves `current` toward `target` along the shorter arc by a fixed fraction.
/// Never steps past the target.
fn approach_angle(current: f32, target: f32, blend: f32) -> f32 {
    let delta = wrap_degrees(target - current);
    let next = wrap_degrees(current + delta * blend);
    let remaining = wrap_degrees(target - next);
    if remaining == 0.0 || remaining.signum() != delta.signum() {
        target
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn granted() -> OrientationAdapter {
        OrientationAdapter::new(
            OrientationCapability {
                supported: true,
                requires_permission: false,
            },
            OrientationConfig::default(),
        )
    }

    #[test]
    fn first_sample_becomes_zero_reference() {
        let mut adapter = granted();
        adapter.push_sample(OrientationSample::new(123.0, 40.0, -15.0));

        assert_eq!(adapter.tick(0.0), Some(Rotation::ZERO));
        assert_eq!(adapter.tick(0.016), Some(Rotation::ZERO));
        assert!(adapter.is_calibrated());
    }

    #[test]
    fn explicit_calibration_zeroes_current_pose() {
        let mut adapter = granted();
        adapter.push_sample(OrientationSample::new(0.0, 0.0, 0.0));
        adapter.tick(0.0);
        adapter.push_sample(OrientationSample::new(30.0, 10.0, 5.0));
        for frame in 0..20 {
            adapter.tick(frame as f32 * 0.016);
        }

        adapter.calibrate();
        assert_eq!(adapter.tick(1.0), Some(Rotation::ZERO));
        adapter.push_sample(OrientationSample::new(30.0, 10.0, 5.0));
        assert_eq!(adapter.tick(1.016), Some(Rotation::ZERO));
    }

    #[test]
    fn smoothing_converges_without_overshoot() {
        let mut adapter = granted();
        adapter.push_sample(OrientationSample::new(0.0, 0.0, 0.0));
        adapter.tick(0.0);
        adapter.push_sample(OrientationSample::new(45.0, -20.0, 10.0));

        let mut previous = Rotation::ZERO;
        for frame in 1..=200 {
            let rotation = adapter.tick(frame as f32 * 0.016).unwrap();
            assert!(rotation.alpha >= previous.alpha && rotation.alpha <= 45.0);
            assert!(rotation.beta <= previous.beta && rotation.beta >= -20.0);
            assert!(rotation.gamma >= previous.gamma && rotation.gamma <= 10.0);
            previous = rotation;
        }
        assert!((previous.alpha - 45.0).abs() < 1e-3);
    }

    #[test]
    fn calibration_wraps_across_north() {
        let mut adapter = granted();
        adapter.push_sample(OrientationSample::new(350.0, 0.0, 0.0));
        adapter.tick(0.0);
        adapter.push_sample(OrientationSample::new(10.0, 0.0, 0.0));

        let mut rotation = Rotation::ZERO;
        for frame in 1..=300 {
            rotation = adapter.tick(frame as f32 * 0.016).unwrap();
        }
        assert!((rotation.alpha - 20.0).abs() < 1e-3);
    }

    #[test]
    fn denied_permission_yields_no_rotation() {
        let mut adapter = OrientationAdapter::new(
            OrientationCapability {
                supported: true,
                requires_permission: true,
            },
            OrientationConfig::default(),
        );
        assert_eq!(adapter.request_permission(0.0), PermissionState::Pending);
        adapter.resolve_permission(false);
        adapter.push_sample(OrientationSample::new(10.0, 20.0, 30.0));

        assert_eq!(adapter.tick(0.1), None);
        assert_eq!(
            adapter.status(),
            OrientationStatus {
                supported: true,
                permission: PermissionState::Denied,
            }
        );
        assert_eq!(adapter.request_permission(1.0), PermissionState::Denied);
    }

    #[test]
    fn pending_request_times_out() {
        let config = OrientationConfig {
            permission_timeout_seconds: 2.0,
            ..OrientationConfig::default()
        };
        let mut adapter = OrientationAdapter::new(
            OrientationCapability {
                supported: true,
                requires_permission: true,
            },
            config,
        );
        adapter.request_permission(1.0);
        assert_eq!(adapter.tick(2.5), None);
        assert_eq!(adapter.status().permission, PermissionState::Pending);
        adapter.tick(3.0);
        assert_eq!(adapter.status().permission, PermissionState::Denied);

        adapter.resolve_permission(true);
        assert_eq!(adapter.status().permission, PermissionState::Denied);
    }

    #[test]
    fn unsupported_platform_never_emits() {
        let mut adapter =
            OrientationAdapter::new(OrientationCapability::UNSUPPORTED, OrientationConfig::default());
        assert_eq!(adapter.request_permission(0.0), PermissionState::Unrequested);
        adapter.push_sample(OrientationSample::new(1.0, 2.0, 3.0));
        assert_eq!(adapter.tick(0.0), None);
        assert!(!adapter.status().supported);
    }

    #[test]
    fn ignores_non_finite_samples() {
        let mut adapter = granted();
        adapter.push_sample(OrientationSample::new(f32::NAN, 0.0, 0.0));
        assert_eq!(adapter.tick(0.0), None);
    }

    #[test]
    fn wraps_into_half_open_range() {
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-540.0), 180.0);
        assert_eq!(wrap_degrees(0.0), 0.0);
    }
}
