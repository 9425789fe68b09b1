use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::EventCategory;

/// Shape of the initial velocity distribution for an emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VelocityProfile {
    /// Random direction, speed 1-3 units/s, slight downward bias.
    Explosive,
    /// Upward-biased drift.
    Rising,
    /// Net drift toward the emitter's stream target.
    Streaming,
    /// Isotropic with no net drift and large variance.
    Turbulent,
}

const EXPLOSIVE_DOWNWARD_BIAS: f32 = 0.35;
const STREAM_NOISE: f32 = 0.3;

impl VelocityProfile {
    pub fn for_category(category: EventCategory) -> Self {
        match category {
            EventCategory::HostileAction => Self::Explosive,
            EventCategory::Triumph => Self::Rising,
            EventCategory::Demographic => Self::Streaming,
            EventCategory::Hardship => Self::Turbulent,
        }
    }

    /// Draws one initial velocity. `toward_target` is the unit direction from
    /// the particle to the stream target and is only read by `Streaming`.
    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R, toward_target: Vec3) -> Vec3 {
        match self {
            Self::Explosive => {
                let speed = rng.gen_range(1.0_f32..3.0);
                random_unit(rng) * speed - Vec3::Y * EXPLOSIVE_DOWNWARD_BIAS
            }
            Self::Rising => Vec3::new(
                rng.gen_range(-0.4..0.4),
                rng.gen_range(1.0..2.2),
                rng.gen_range(-0.4..0.4),
            ),
            Self::Streaming => {
                let speed = rng.gen_range(1.5_f32..2.5);
                toward_target * speed + random_unit(rng) * rng.gen_range(0.0..STREAM_NOISE)
            }
            Self::Turbulent => random_unit(rng) * rng.gen_range(0.0_f32..2.5),
        }
    }
}

fn random_unit<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0..1.0);
    let phi: f32 = rng.gen_range(0.0..TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn mean_velocity(profile: VelocityProfile, toward: Vec3) -> (Vec3, Vec<Vec3>) {
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<Vec3> = (0..4_000).map(|_| profile.sample(&mut rng, toward)).collect();
        let mean = samples.iter().copied().sum::<Vec3>() / samples.len() as f32;
        (mean, samples)
    }

    #[test]
    fn category_mapping_is_fixed() {
        for _ in 0..3 {
            assert_eq!(
                VelocityProfile::for_category(EventCategory::HostileAction),
                VelocityProfile::Explosive
            );
            assert_eq!(
                VelocityProfile::for_category(EventCategory::Triumph),
                VelocityProfile::Rising
            );
            assert_eq!(
                VelocityProfile::for_category(EventCategory::Demographic),
                VelocityProfile::Streaming
            );
            assert_eq!(
                VelocityProfile::for_category(EventCategory::Hardship),
                VelocityProfile::Turbulent
            );
        }
    }

    #[test]
    fn explosive_speeds_stay_in_band_with_downward_bias() {
        let (mean, samples) = mean_velocity(VelocityProfile::Explosive, Vec3::ZERO);
        for v in &samples {
            let radial = (*v + Vec3::Y * EXPLOSIVE_DOWNWARD_BIAS).length();
            assert!((1.0 - 1e-4..3.0 + 1e-4).contains(&radial));
        }
        assert!(mean.y < -0.2);
    }

    #[test]
    fn rising_always_moves_up() {
        let (mean, samples) = mean_velocity(VelocityProfile::Rising, Vec3::ZERO);
        assert!(samples.iter().all(|v| v.y >= 1.0));
        assert!(mean.x.abs() < 0.05 && mean.z.abs() < 0.05);
    }

    #[test]
    fn streaming_drifts_toward_target() {
        let toward = Vec3::new(0.0, 0.0, -1.0);
        let (mean, _) = mean_velocity(VelocityProfile::Streaming, toward);
        assert!(mean.dot(toward) > 1.5);
    }

    #[test]
    fn turbulent_has_no_net_drift() {
        let (mean, samples) = mean_velocity(VelocityProfile::Turbulent, Vec3::X);
        assert!(mean.length() < 0.1);
        let variance =
            samples.iter().map(|v| v.length_squared()).sum::<f32>() / samples.len() as f32;
        assert!(variance > 1.0);
    }
}
