use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::VelocityProfile;
use crate::EventCategory;

const POSITION_JITTER: f32 = 0.6;
const LIFETIME_RANGE: std::ops::Range<f32> = 2.0..5.0;
const COLOR_VARIANCE: f32 = 0.08;

/// Static per-particle attributes, uploaded once as an instance buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleRecord {
    pub position: [f32; 3],
    pub scale: f32,
    pub velocity: [f32; 3],
    pub lifetime: f32,
    pub color: [f32; 3],
    /// Per-particle random value in [0, 1) for shading variance.
    pub seed: f32,
}

/// Everything needed to populate one emitter's buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterSpec {
    pub origin: Vec3,
    pub category: EventCategory,
    pub capacity: u32,
    pub seed: u64,
    /// World point `Streaming` particles drift toward.
    pub stream_target: Vec3,
}

impl EmitterSpec {
    pub fn profile(&self) -> VelocityProfile {
        VelocityProfile::for_category(self.category)
    }
}

/// Evaluated state of one particle at a given time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSample {
    pub position: Vec3,
    pub age: f32,
    pub opacity: f32,
}

/// Fixed-capacity particle storage. The length is decided at creation and
/// never changes; expired particles wrap back to age zero instead of being
/// removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleBuffer {
    records: Box<[ParticleRecord]>,
}

impl ParticleBuffer {
    /// Deterministically fills a buffer from the emitter's seed.
    pub fn generate(spec: &EmitterSpec) -> Self {
        let mut rng = StdRng::seed_from_u64(spec.seed);
        let profile = spec.profile();
        let base_color = Vec3::from(spec.category.color());

        let records = (0..spec.capacity)
            .map(|_| {
                let jitter = Vec3::new(
                    rng.gen_range(-POSITION_JITTER..POSITION_JITTER),
                    rng.gen_range(-POSITION_JITTER..POSITION_JITTER),
                    rng.gen_range(-POSITION_JITTER..POSITION_JITTER),
                );
                let position = spec.origin + jitter;
                let toward_target = (spec.stream_target - position).normalize_or_zero();
                let velocity = profile.sample(&mut rng, toward_target);
                let tint = Vec3::new(
                    rng.gen_range(-COLOR_VARIANCE..COLOR_VARIANCE),
                    rng.gen_range(-COLOR_VARIANCE..COLOR_VARIANCE),
                    rng.gen_range(-COLOR_VARIANCE..COLOR_VARIANCE),
                );
                ParticleRecord {
                    position: position.to_array(),
                    scale: rng.gen_range(0.6..1.4),
                    velocity: velocity.to_array(),
                    lifetime: rng.gen_range(LIFETIME_RANGE),
                    color: (base_color + tint).clamp(Vec3::ZERO, Vec3::ONE).to_array(),
                    seed: rng.gen(),
                }
            })
            .collect();

        Self { records }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[ParticleRecord] {
        &self.records
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }

    /// CPU evaluation of the particle vertex shader for `index` at time `t`.
    pub fn sample(&self, index: usize, t: f32) -> Option<ParticleSample> {
        let record = self.records.get(index)?;
        let age = age_at(t, record.lifetime);
        Some(ParticleSample {
            position: Vec3::from(record.position) + Vec3::from(record.velocity) * age,
            age,
            opacity: opacity_at(t, record.lifetime),
        })
    }
}

/// `t mod lifetime`, always in `[0, lifetime)`.
pub fn age_at(t: f32, lifetime: f32) -> f32 {
    if !(lifetime > 0.0) || !t.is_finite() {
        return 0.0;
    }
    let age = t.rem_euclid(lifetime);
    if age >= lifetime {
        0.0
    } else {
        age
    }
}

/// `1 - age / lifetime`, always in `(0, 1]`.
pub fn opacity_at(t: f32, lifetime: f32) -> f32 {
    if !(lifetime > 0.0) {
        return 1.0;
    }
    (1.0 - age_at(t, lifetime) / lifetime).clamp(f32::EPSILON, 1.0)
}
