use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{Result, TunnelError};

/// Windowed FFT over rendered tones. Used to verify that the synthesiser
/// produces the pitch each category is tuned to.
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Magnitude of every bin from DC up to Nyquist.
    pub fn magnitudes(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        if samples.len() < 2 {
            return Err(TunnelError::invalid(
                "spectrum analysis requires at least two samples",
            ));
        }

        let len = samples.len();
        let fft = self.prepare_fft(len);
        for (index, value) in samples.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        Ok(fft.spectrum.iter().map(|bin| bin.norm()).collect())
    }

    /// Frequency in Hz of the strongest bin, ignoring DC. Returns 0 for
    /// silence.
    pub fn dominant_frequency(&mut self, samples: &[f32]) -> Result<f32> {
        let magnitudes = self.magnitudes(samples)?;
        let bin_hz = self.sample_rate as f32 / samples.len() as f32;

        let peak = magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .fold((0, 0.0_f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });

        if peak.1 <= f32::EPSILON {
            Ok(0.0)
        } else {
            Ok(peak.0 as f32 * bin_hz)
        }
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        let fft = match self.fft.take() {
            Some(fft) if fft.size == size => fft,
            _ => {
                let plan = self.planner.plan_fft_forward(size);
                FftResources {
                    size,
                    scratch: plan.make_scratch_vec(),
                    spectrum: plan.make_output_vec(),
                    input: plan.make_input_vec(),
                    plan,
                }
            }
        };
        self.fft.insert(fft)
    }
}

/// One-shot helper around [`SpectrumAnalyzer::dominant_frequency`].
pub fn dominant_frequency(samples: &[f32], sample_rate: u32) -> Result<f32> {
    SpectrumAnalyzer::new(sample_rate).dominant_frequency(samples)
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("sample_rate", &self.sample_rate)
            .field("fft_size", &self.fft.as_ref().map(|fft| fft.size))
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{ToneSpec, ToneSynth},
        config::AudioConfig,
        EventCategory,
    };

    #[test]
    fn finds_pure_sine_frequency() {
        let rate = 8_000;
        let samples: Vec<f32> = (0..4_000)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / rate as f32).sin())
            .collect();
        let hz = dominant_frequency(&samples, rate).unwrap();
        assert!((hz - 440.0).abs() <= 2.0, "got {hz}");
    }

    #[test]
    fn silence_has_no_dominant_frequency() {
        assert_eq!(dominant_frequency(&[0.0; 256], 48_000).unwrap(), 0.0);
    }

    #[test]
    fn rejects_tiny_blocks() {
        assert!(matches!(
            dominant_frequency(&[1.0], 48_000),
            Err(TunnelError::InvalidInput(_))
        ));
    }

    #[test]
    fn category_tones_peak_near_their_base_pitch() {
        let synth = ToneSynth::muted(AudioConfig::default());
        let mut analyzer = SpectrumAnalyzer::new(AudioConfig::default().sample_rate);

        for category in [EventCategory::Triumph, EventCategory::Hardship] {
            let spec = ToneSpec::for_category(category);
            let tone = synth.render(category.as_str(), &spec);
            let hz = analyzer.dominant_frequency(&tone.samples).unwrap();
            let error = (hz - spec.base_frequency).abs() / spec.base_frequency;
            assert!(error < 0.05, "{category}: {hz} Hz vs {}", spec.base_frequency);
        }
    }
}
