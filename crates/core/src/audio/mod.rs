//! Procedural tones for crystal interaction.
//!
//! Every sound is synthesised from oscillators and an ADSR envelope; there is
//! no sample playback. Rendered tones are handed to an [`AudioSink`], the
//! host's output device. A failing sink is logged and otherwise ignored.

pub mod analysis;

use std::f32::consts::TAU;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{config::AudioConfig, EventCategory, Result};

pub use analysis::{dominant_frequency, SpectrumAnalyzer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
}

impl Waveform {
    /// Evaluates the waveform at `phase` in cycles.
    fn at(self, phase: f32) -> f32 {
        let p = phase.fract();
        match self {
            Self::Sine => (p * TAU).sin(),
            Self::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
            Self::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Attack, decay and release in seconds; sustain as a level in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Envelope {
    /// Gain at time `t` of a note held for `hold` seconds before release.
    pub fn gain_at(&self, t: f32, hold: f32) -> f32 {
        let held = if t < self.attack {
            t / self.attack.max(f32::EPSILON)
        } else if t < self.attack + self.decay {
            let k = (t - self.attack) / self.decay.max(f32::EPSILON);
            1.0 + (self.sustain - 1.0) * k
        } else {
            self.sustain
        };

        if t <= hold {
            held
        } else {
            let k = ((t - hold) / self.release.max(f32::EPSILON)).min(1.0);
            self.gain_at(hold, hold) * (1.0 - k)
        }
    }
}

/// Full description of one synthesised sound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneSpec {
    pub base_frequency: f32,
    pub waveform: Waveform,
    pub envelope: Envelope,
    /// Time the note is held before release starts.
    pub hold: f32,
    /// Relative pitch change across the note; 0.12 ends 12 % higher.
    pub glide: f32,
    /// Frequency ratio and gain of an optional second partial.
    pub partial: Option<(f32, f32)>,
    pub vibrato: f32,
    pub noise: f32,
    /// Delay and gain of a single echo repeat.
    pub echo: Option<(f32, f32)>,
    pub gain: f32,
}

impl ToneSpec {
    pub fn duration(&self) -> f32 {
        let echo = self.echo.map(|(delay, _)| delay).unwrap_or(0.0);
        self.hold + self.envelope.release + echo
    }

    pub fn for_category(category: EventCategory) -> Self {
        match category {
            EventCategory::Triumph => Self {
                base_frequency: 523.25,
                waveform: Waveform::Triangle,
                envelope: Envelope { attack: 0.01, decay: 0.15, sustain: 0.5, release: 0.4 },
                hold: 0.25,
                glide: 0.0,
                partial: Some((1.5, 0.3)),
                vibrato: 0.0,
                noise: 0.0,
                echo: None,
                gain: 0.8,
            },
            EventCategory::Hardship => Self {
                base_frequency: 196.0,
                waveform: Waveform::Sine,
                envelope: Envelope { attack: 0.12, decay: 0.3, sustain: 0.6, release: 0.6 },
                hold: 0.5,
                glide: 0.0,
                partial: Some((1.2, 0.2)),
                vibrato: 0.004,
                noise: 0.0,
                echo: None,
                gain: 0.9,
            },
            EventCategory::HostileAction => Self {
                base_frequency: 110.0,
                waveform: Waveform::Square,
                envelope: Envelope { attack: 0.003, decay: 0.2, sustain: 0.25, release: 0.25 },
                hold: 0.2,
                glide: -0.1,
                partial: None,
                vibrato: 0.0,
                noise: 0.12,
                echo: None,
                gain: 0.5,
            },
            EventCategory::Demographic => Self {
                base_frequency: 329.63,
                waveform: Waveform::Sine,
                envelope: Envelope { attack: 0.05, decay: 0.2, sustain: 0.4, release: 0.5 },
                hold: 0.35,
                glide: 0.12,
                partial: Some((2.0, 0.15)),
                vibrato: 0.0,
                noise: 0.0,
                echo: None,
                gain: 0.8,
            },
        }
    }

    pub fn for_echo(kind: EchoKind) -> Self {
        let quiet = Envelope { attack: 0.005, decay: 0.05, sustain: 0.3, release: 0.08 };
        match kind {
            EchoKind::Hover => Self {
                base_frequency: 880.0,
                waveform: Waveform::Sine,
                envelope: quiet,
                hold: 0.04,
                glide: 0.0,
                partial: None,
                vibrato: 0.0,
                noise: 0.0,
                echo: None,
                gain: 0.3,
            },
            EchoKind::Select => Self {
                base_frequency: 660.0,
                waveform: Waveform::Triangle,
                envelope: quiet,
                hold: 0.08,
                glide: 0.05,
                partial: Some((2.0, 0.2)),
                vibrato: 0.0,
                noise: 0.0,
                echo: Some((0.12, 0.45)),
                gain: 0.45,
            },
            EchoKind::Dismiss => Self {
                base_frequency: 440.0,
                waveform: Waveform::Sine,
                envelope: quiet,
                hold: 0.08,
                glide: -0.2,
                partial: None,
                vibrato: 0.0,
                noise: 0.0,
                echo: None,
                gain: 0.35,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EchoKind {
    Hover,
    Select,
    Dismiss,
}

/// Rendered mono PCM samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Tone {
    pub label: &'static str,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl Tone {
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }
}

/// Output collaborator receiving rendered tones.
pub trait AudioSink {
    fn play(&mut self, tone: &Tone) -> Result<()>;
}

pub struct ToneSynth {
    config: AudioConfig,
    sink: Option<Box<dyn AudioSink>>,
    played: u64,
}

impl ToneSynth {
    pub fn new(config: AudioConfig, sink: Box<dyn AudioSink>) -> Self {
        Self {
            config,
            sink: Some(sink),
            played: 0,
        }
    }

    /// A synthesiser for hosts without audio output. Every play is a no-op.
    pub fn muted(config: AudioConfig) -> Self {
        Self {
            config,
            sink: None,
            played: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.sink.is_some()
    }

    /// Number of tones successfully delivered to the sink.
    pub fn played(&self) -> u64 {
        self.played
    }

    pub fn play_category_tone(&mut self, category: EventCategory) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let tone = self.render(category.as_str(), &ToneSpec::for_category(category));
        self.deliver(&tone)
    }

    pub fn play_ui_echo(&mut self, kind: EchoKind) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let label = match kind {
            EchoKind::Hover => "echo-hover",
            EchoKind::Select => "echo-select",
            EchoKind::Dismiss => "echo-dismiss",
        };
        let tone = self.render(label, &ToneSpec::for_echo(kind));
        self.deliver(&tone)
    }

    /// Synthesises a tone without playing it. Deterministic.
    pub fn render(&self, label: &'static str, spec: &ToneSpec) -> Tone {
        let sample_rate = self.config.sample_rate.max(1);
        let rate = sample_rate as f32;
        let dry_len = ((spec.hold + spec.envelope.release) * rate).ceil() as usize;
        let total_len = (spec.duration() * rate).ceil() as usize;
        let dry_duration = dry_len.max(1) as f32 / rate;

        let mut rng = StdRng::seed_from_u64(u64::from(spec.base_frequency.to_bits()));
        let mut phase = 0.0_f32;
        let mut partial_phase = 0.0_f32;
        let mut samples = vec![0.0_f32; total_len.max(dry_len)];

        for (i, sample) in samples.iter_mut().enumerate().take(dry_len) {
            let t = i as f32 / rate;
            let vibrato = 1.0 + spec.vibrato * (t * TAU * 5.5).sin();
            let frequency = spec.base_frequency * (1.0 + spec.glide * t / dry_duration) * vibrato;

            let mut value = spec.waveform.at(phase);
            if let Some((ratio, gain)) = spec.partial {
                value += gain * Waveform::Sine.at(partial_phase);
                partial_phase += frequency * ratio / rate;
            }
            if spec.noise > 0.0 {
                value += spec.noise * rng.gen_range(-1.0_f32..1.0);
            }
            phase = (phase + frequency / rate).fract();
            partial_phase = partial_phase.fract();

            *sample = value * spec.envelope.gain_at(t, spec.hold) * spec.gain * self.config.master_gain;
        }

        if let Some((delay, gain)) = spec.echo {
            let offset = (delay * rate) as usize;
            for i in (offset..samples.len()).rev() {
                samples[i] += samples[i - offset] * gain;
            }
        }

        Tone {
            label,
            sample_rate,
            samples,
        }
    }

    fn deliver(&mut self, tone: &Tone) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };
        match sink.play(tone) {
            Ok(()) => {
                self.played += 1;
                true
            }
            Err(err) => {
                tracing::warn!(%err, tone = tone.label, "audio sink rejected tone; continuing silently");
                false
            }
        }
    }
}

impl std::fmt::Debug for ToneSynth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToneSynth")
            .field("config", &self.config)
            .field("has_sink", &self.sink.is_some())
            .field("played", &self.played)
            .finish()
    }
}
