//! Device capability classification.
//!
//! The controller runs once per session. Its [`QualityProfile`] is the only
//! place particle counts and pixel density are derived from; nothing else in
//! the crate reads raw device parameters.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{config::QualityConfig, Result, TunnelError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    /// Particle-count multiplier, non-decreasing from `Low` to `High`.
    pub fn scale(self) -> f32 {
        match self {
            Self::Low => 0.3,
            Self::Medium => 0.6,
            Self::High => 1.0,
        }
    }

    pub fn pixel_ratio_cap(self) -> f32 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 1.5,
            Self::High => 2.0,
        }
    }

    pub fn profile(self) -> QualityProfile {
        QualityProfile {
            tier: self,
            scale: self.scale(),
            pixel_ratio_cap: self.pixel_ratio_cap(),
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

impl FromStr for QualityTier {
    type Err = TunnelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(TunnelError::invalid(format!("unknown quality tier `{other}`"))),
        }
    }
}

/// Resource budget derived from a tier. Immutable for the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub tier: QualityTier,
    pub scale: f32,
    pub pixel_ratio_cap: f32,
}

impl QualityProfile {
    pub fn particle_count(&self, base_count: u32) -> u32 {
        (base_count as f32 * self.scale).round() as u32
    }

    pub fn pixel_ratio(&self, device_ratio: f32) -> f32 {
        if device_ratio.is_finite() && device_ratio > 0.0 {
            device_ratio.min(self.pixel_ratio_cap)
        } else {
            1.0
        }
    }
}

/// One-shot capability probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProbe {
    /// Approximate device memory in GiB, when the platform reports it.
    pub memory_gb: Option<f32>,
    pub pixel_ratio: f32,
    /// Renderer / adapter name string.
    pub gpu_renderer: Option<String>,
}

impl DeviceProbe {
    pub fn from_adapter_info(
        info: &wgpu::AdapterInfo,
        pixel_ratio: f32,
        memory_gb: Option<f32>,
    ) -> Self {
        let name = info.name.trim();
        let gpu_renderer = match info.device_type {
            // Software rasterisers are never treated as identified hardware.
            wgpu::DeviceType::Cpu => None,
            _ if name.is_empty() => None,
            _ => Some(name.to_string()),
        };
        Self {
            memory_gb,
            pixel_ratio,
            gpu_renderer,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QualityController {
    config: QualityConfig,
}

impl QualityController {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Classifies a probe. Pure: the same probe always yields the same tier.
    pub fn classify(&self, probe: &DeviceProbe) -> QualityProfile {
        if let Some(tier) = self.config.force_tier {
            tracing::debug!(%tier, "quality tier forced by configuration");
            return tier.profile();
        }

        let memory = probe.memory_gb.filter(|gb| gb.is_finite() && *gb > 0.0);
        let low_memory = memory.map(|gb| gb < self.config.low_memory_gb).unwrap_or(false);

        let tier = match probe.gpu_renderer.as_deref() {
            _ if low_memory => QualityTier::Low,
            None => QualityTier::Medium,
            Some(renderer) if self.is_capable(renderer) => {
                if memory.map(|gb| gb >= self.config.high_memory_gb).unwrap_or(true) {
                    QualityTier::High
                } else {
                    QualityTier::Medium
                }
            }
            Some(_) => QualityTier::Medium,
        };

        tracing::debug!(
            %tier,
            gpu = probe.gpu_renderer.as_deref().unwrap_or("unknown"),
            memory_gb = ?probe.memory_gb,
            "classified device capability"
        );
        tier.profile()
    }

    fn is_capable(&self, renderer: &str) -> bool {
        let renderer = renderer.to_ascii_lowercase();
        self.config
            .capable_gpus
            .iter()
            .any(|needle| renderer.contains(&needle.to_ascii_lowercase()))
    }
}

impl Default for QualityController {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(gpu: Option<&str>, memory_gb: Option<f32>) -> DeviceProbe {
        DeviceProbe {
            memory_gb,
            pixel_ratio: 3.0,
            gpu_renderer: gpu.map(String::from),
        }
    }

    #[test]
    fn scales_are_monotonic() {
        assert!(QualityTier::Low.scale() <= QualityTier::Medium.scale());
        assert!(QualityTier::Medium.scale() <= QualityTier::High.scale());
        assert!(QualityTier::Low.pixel_ratio_cap() <= QualityTier::High.pixel_ratio_cap());
    }

    #[test]
    fn particle_count_rounds_scaled_base() {
        for tier in [QualityTier::Low, QualityTier::Medium, QualityTier::High] {
            let profile = tier.profile();
            for base in [0_u32, 1, 7, 1_500, 10_001] {
                let expected = (base as f32 * tier.scale()).round() as u32;
                assert_eq!(profile.particle_count(base), expected);
            }
        }
        assert_eq!(QualityTier::High.profile().particle_count(1_500), 1_500);
        assert_eq!(QualityTier::Low.profile().particle_count(1_000), 300);
    }

    #[test]
    fn unknown_gpu_never_classifies_high() {
        let controller = QualityController::default();
        assert_eq!(controller.classify(&probe(None, Some(16.0))).tier, QualityTier::Medium);
        assert_eq!(controller.classify(&probe(None, None)).tier, QualityTier::Medium);
        assert_eq!(controller.classify(&probe(None, Some(1.0))).tier, QualityTier::Low);
    }

    #[test]
    fn capable_gpu_matches_case_insensitively() {
        let controller = QualityController::default();
        let profile = controller.classify(&probe(Some("NVIDIA GeForce RTX 4070"), Some(8.0)));
        assert_eq!(profile.tier, QualityTier::High);

        let limited = controller.classify(&probe(Some("Apple M1"), Some(3.0)));
        assert_eq!(limited.tier, QualityTier::Medium);

        let generic = controller.classify(&probe(Some("Intel(R) UHD Graphics 620"), Some(8.0)));
        assert_eq!(generic.tier, QualityTier::Medium);
    }

    #[test]
    fn classification_is_deterministic() {
        let controller = QualityController::default();
        let sample = probe(Some("Adreno 730"), None);
        assert_eq!(controller.classify(&sample), controller.classify(&sample));
    }

    #[test]
    fn pixel_ratio_is_capped_per_tier() {
        assert_eq!(QualityTier::Low.profile().pixel_ratio(3.0), 1.0);
        assert_eq!(QualityTier::High.profile().pixel_ratio(1.25), 1.25);
        assert_eq!(QualityTier::Medium.profile().pixel_ratio(f32::NAN), 1.0);
    }

    #[test]
    fn forced_tier_skips_probe() {
        let controller = QualityController::new(QualityConfig {
            force_tier: Some(QualityTier::Low),
            ..QualityConfig::default()
        });
        let profile = controller.classify(&probe(Some("NVIDIA"), Some(32.0)));
        assert_eq!(profile.tier, QualityTier::Low);
    }

    fn adapter(name: &str, device_type: wgpu::DeviceType) -> wgpu::AdapterInfo {
        wgpu::AdapterInfo {
            name: name.to_string(),
            vendor: 0,
            device: 0,
            device_type,
            driver: String::new(),
            driver_info: String::new(),
            backend: wgpu::Backend::Vulkan,
        }
    }

    #[test]
    fn software_or_unnamed_adapters_are_unidentified() {
        let controller = QualityController::default();

        let cpu = DeviceProbe::from_adapter_info(
            &adapter("NVIDIA GeForce RTX 4070", wgpu::DeviceType::Cpu),
            2.0,
            Some(16.0),
        );
        assert_eq!(cpu.gpu_renderer, None);
        assert_eq!(controller.classify(&cpu).tier, QualityTier::Medium);

        let unnamed = DeviceProbe::from_adapter_info(
            &adapter("   ", wgpu::DeviceType::DiscreteGpu),
            2.0,
            None,
        );
        assert_eq!(unnamed.gpu_renderer, None);
        assert_eq!(controller.classify(&unnamed).tier, QualityTier::Medium);
    }

    #[test]
    fn hardware_adapter_name_is_trimmed() {
        let probe = DeviceProbe::from_adapter_info(
            &adapter(" NVIDIA GeForce RTX 4070 ", wgpu::DeviceType::DiscreteGpu),
            1.5,
            Some(8.0),
        );
        assert_eq!(probe.gpu_renderer.as_deref(), Some("NVIDIA GeForce RTX 4070"));
        assert_eq!(probe.pixel_ratio, 1.5);
        assert_eq!(QualityController::default().classify(&probe).tier, QualityTier::High);
    }
}
