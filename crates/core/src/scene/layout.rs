use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    config::SceneConfig, particles::EmitterSpec, EventCategory, EventSnapshot, QualityProfile,
};

/// Where one event sits in the tunnel and what its emitter looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrystalPlacement {
    pub index: usize,
    pub event_id: String,
    pub category: EventCategory,
    pub position: Vec3,
    pub color: [f32; 3],
    pub emitter: EmitterSpec,
}

/// Segment of the tunnel the camera travels along, looping at the end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPath {
    pub start_z: f32,
    pub length: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneLayout {
    placements: Vec<CrystalPlacement>,
    spacing: f32,
    tunnel_length: f32,
    camera_path: CameraPath,
}

impl SceneLayout {
    /// Places one crystal and emitter per event on a loose spiral receding
    /// along -z. Pure: the same inputs always produce the same layout.
    pub fn compose(events: &EventSnapshot, profile: &QualityProfile, config: &SceneConfig) -> Self {
        let capacity = profile.particle_count(config.base_particle_count);

        let placements = events
            .events()
            .iter()
            .enumerate()
            .map(|(index, event)| {
                let i = index as f32;
                let angle = i * config.angle_step;
                let radius =
                    config.spiral_radius + config.radius_oscillation * (i * config.oscillation_frequency).sin();
                let depth = -i * config.spacing;
                let position = Vec3::new(radius * angle.cos(), radius * angle.sin(), depth);

                CrystalPlacement {
                    index,
                    event_id: event.id.clone(),
                    category: event.category,
                    position,
                    color: event.category.color(),
                    emitter: EmitterSpec {
                        origin: position,
                        category: event.category,
                        capacity,
                        seed: placement_seed(index, &event.id),
                        stream_target: Vec3::new(0.0, 0.0, depth - config.spacing),
                    },
                }
            })
            .collect::<Vec<_>>();

        let span = placements.len().saturating_sub(1) as f32 * config.spacing;
        Self {
            placements,
            spacing: config.spacing,
            tunnel_length: span + config.spacing * 2.0 + config.tunnel_padding,
            camera_path: CameraPath {
                start_z: config.spacing,
                length: span + config.spacing,
            },
        }
    }

    pub fn placements(&self) -> &[CrystalPlacement] {
        &self.placements
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn tunnel_length(&self) -> f32 {
        self.tunnel_length
    }

    pub fn camera_path(&self) -> CameraPath {
        self.camera_path
    }

    /// Index of the placement nearest to a camera at depth `camera_z`.
    pub fn nearest(&self, camera_z: f32) -> Option<usize> {
        if self.placements.is_empty() || !camera_z.is_finite() {
            return None;
        }
        let last = (self.placements.len() - 1) as f32;
        Some((-camera_z / self.spacing).round().clamp(0.0, last) as usize)
    }

    /// Signed distance along z from the camera to placement `index`.
    pub fn depth_offset(&self, index: usize, camera_z: f32) -> Option<f32> {
        self.placements.get(index).map(|p| p.position.z - camera_z)
    }
}

/// FNV-1a over the event id, mixed with the index. Stable across mounts and
/// builds.
fn placement_seed(index: usize, id: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = id
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME));
    hash ^ (index as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Event, QualityTier};

    fn snapshot(count: usize) -> EventSnapshot {
        let events = (0..count)
            .map(|i| {
                Event::new(
                    format!("event-{i}"),
                    EventCategory::ALL[i % EventCategory::ALL.len()],
                    i as i64 * 100,
                )
            })
            .collect();
        EventSnapshot::new(events).unwrap()
    }

    #[test]
    fn places_one_crystal_per_event_along_negative_z() {
        let config = SceneConfig::default();
        let layout = SceneLayout::compose(&snapshot(5), &QualityTier::Medium.profile(), &config);

        assert_eq!(layout.len(), 5);
        for (i, placement) in layout.placements().iter().enumerate() {
            assert_eq!(placement.index, i);
            assert_eq!(placement.position.z, -(i as f32) * config.spacing);
            let radius = placement.position.truncate().length();
            assert!((radius - config.spiral_radius).abs() <= config.radius_oscillation + 1e-4);
            assert_eq!(placement.color, placement.category.color());
        }
    }

    #[test]
    fn emitter_capacity_follows_quality_profile() {
        let config = SceneConfig {
            base_particle_count: 1_000,
            ..SceneConfig::default()
        };
        let low = SceneLayout::compose(&snapshot(3), &QualityTier::Low.profile(), &config);
        let high = SceneLayout::compose(&snapshot(3), &QualityTier::High.profile(), &config);

        assert!(low.placements().iter().all(|p| p.emitter.capacity == 300));
        assert!(high.placements().iter().all(|p| p.emitter.capacity == 1_000));
    }

    #[test]
    fn seeds_are_distinct_and_stable() {
        let config = SceneConfig::default();
        let profile = QualityTier::High.profile();
        let a = SceneLayout::compose(&snapshot(12), &profile, &config);
        let b = SceneLayout::compose(&snapshot(12), &profile, &config);
        assert_eq!(a, b);

        let mut seeds: Vec<u64> = a.placements().iter().map(|p| p.emitter.seed).collect();
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), 12);
    }

    #[test]
    fn nearest_clamps_to_event_range() {
        let config = SceneConfig::default();
        let layout = SceneLayout::compose(&snapshot(4), &QualityTier::Low.profile(), &config);

        assert_eq!(layout.nearest(10.0), Some(0));
        assert_eq!(layout.nearest(-config.spacing * 1.4), Some(1));
        assert_eq!(layout.nearest(-config.spacing * 1.6), Some(2));
        assert_eq!(layout.nearest(-1_000.0), Some(3));

        let empty = SceneLayout::compose(&snapshot(0), &QualityTier::Low.profile(), &config);
        assert_eq!(empty.nearest(0.0), None);
    }
}
