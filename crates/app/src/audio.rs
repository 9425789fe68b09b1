use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use timeline_tunnel_core::{AudioSink, Tone, TunnelError};

struct Voice {
    samples: Arc<[f32]>,
    position: usize,
}

/// Mixes rendered tones into the default output device.
pub struct CpalSink {
    voices: Arc<Mutex<Vec<Voice>>>,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl CpalSink {
    /// Opens the default output device. Returns `None` when there is no
    /// device or it does not take f32 samples.
    pub fn open() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        let supported = device.default_output_config().ok()?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            tracing::warn!(format = ?supported.sample_format(), "unsupported output sample format");
            return None;
        }
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.into();

        let voices: Arc<Mutex<Vec<Voice>>> = Arc::new(Mutex::new(Vec::new()));
        let mixer = Arc::clone(&voices);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    data.fill(0.0);
                    let Ok(mut voices) = mixer.lock() else {
                        return;
                    };
                    for frame in data.chunks_mut(channels.max(1)) {
                        let mut sample = 0.0_f32;
                        for voice in voices.iter_mut() {
                            if let Some(s) = voice.samples.get(voice.position) {
                                sample += *s;
                                voice.position += 1;
                            }
                        }
                        frame.fill(sample.clamp(-1.0, 1.0));
                    }
                    voices.retain(|voice| voice.position < voice.samples.len());
                },
                |err| tracing::warn!(%err, "audio stream error"),
                None,
            )
            .ok()?;
        stream.play().ok()?;

        tracing::info!(sample_rate, channels, "audio output ready");
        Some(Self {
            voices,
            sample_rate,
            _stream: stream,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioSink for CpalSink {
    fn play(&mut self, tone: &Tone) -> timeline_tunnel_core::Result<()> {
        if tone.sample_rate != self.sample_rate {
            return Err(TunnelError::invalid(format!(
                "tone rendered at {} Hz, device runs at {} Hz",
                tone.sample_rate, self.sample_rate
            )));
        }
        let mut voices = self
            .voices
            .lock()
            .map_err(|_| TunnelError::msg("audio mixer lock poisoned"))?;
        voices.push(Voice {
            samples: tone.samples.as_slice().into(),
            position: 0,
        });
        Ok(())
    }
}
