//! Audio loopback effect: frequency-band energy mapped to a composite color.

use rand::Rng;

use crate::audio::{bands_from_boundaries, FrequencyColorEngine};
use crate::lifecycle::{Effect, EffectContext, TickOutcome};
use crate::options::{EffectOptions, OptionField, OptionSchema};
use crate::registry::EffectDescriptor;
use crate::{EffectError, Result};

const DEFAULT_SLEEP_S: f32 = 0.01;
const DEFAULT_SAMPLE_RATE: i64 = 44_100;
const DEFAULT_CHUNK_SIZE: i64 = 1024;
const DEFAULT_FREQUENCY_BANDS: [i64; 6] = [60, 250, 500, 2000, 4000, 8000];

/// Span of the per-device brightness variation when `per_device` is set.
const VARIATION_FLOOR: f32 = 0.85;

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new(
        "AudioLoopback",
        "Blend band colors by spectral energy of the system audio",
        OptionSchema::base_with_sleep(DEFAULT_SLEEP_S)
            .field(OptionField::int("sample_rate", DEFAULT_SAMPLE_RATE))
            .field(OptionField::int("chunk_size", DEFAULT_CHUNK_SIZE))
            .field(OptionField::int_list(
                "frequency_bands",
                &DEFAULT_FREQUENCY_BANDS,
            ))
            .field(OptionField::bool("per_device", false)),
        |options| Box::new(AudioLoopbackEffect::from_options(options)),
    )
}

pub struct AudioLoopbackEffect {
    sample_rate: u32,
    chunk_size: usize,
    boundaries: Vec<i64>,
    per_device: bool,
    engine: Option<FrequencyColorEngine>,
}

impl AudioLoopbackEffect {
    pub fn from_options(options: &EffectOptions) -> Self {
        let sample_rate = options
            .int("sample_rate")
            .unwrap_or(DEFAULT_SAMPLE_RATE)
            .max(1) as u32;
        let boundaries = options
            .int_list("frequency_bands")
            .map(<[i64]>::to_vec)
            .unwrap_or_else(|| DEFAULT_FREQUENCY_BANDS.to_vec());
        Self {
            sample_rate,
            chunk_size: options.int("chunk_size").unwrap_or(DEFAULT_CHUNK_SIZE).max(2) as usize,
            boundaries,
            per_device: options.bool("per_device").unwrap_or(false),
            engine: None,
        }
    }
}

impl Effect for AudioLoopbackEffect {
    fn start(&mut self, ctx: &mut EffectContext<'_>) -> Result<()> {
        if !ctx.has_audio() {
            return Err(EffectError::Capture("no audio source installed".into()));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        let bands = bands_from_boundaries(&self.boundaries, nyquist)
            .map_err(|e| e.for_option("frequency_bands"))?;
        self.engine = Some(FrequencyColorEngine::new(self.sample_rate, bands));
        Ok(())
    }

    fn tick(&mut self, ctx: &mut EffectContext<'_>) -> Result<TickOutcome> {
        let Some(frame) = ctx.read_audio(self.chunk_size)? else {
            // Nothing new from the capture: keep the previous colors.
            return Ok(TickOutcome::Continue);
        };
        let Some(engine) = self.engine.as_mut() else {
            return Ok(TickOutcome::Continue);
        };
        let composite = engine.composite(&frame)?;

        if self.per_device {
            // Each device gets its own frame-local variation of the blend.
            let targets = ctx.targets().to_vec();
            let mut rng = rand::thread_rng();
            for device in &targets {
                let variation = rng.gen_range(VARIATION_FLOOR..=1.0);
                ctx.fill_device(device, composite.scaled(variation))?;
            }
        } else {
            ctx.fill(composite)?;
        }
        Ok(TickOutcome::Continue)
    }

    fn stop(&mut self, ctx: &mut EffectContext<'_>) -> Result<()> {
        ctx.blackout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    use crate::audio::{AudioFrame, AudioSource};
    use crate::color::Color;
    use crate::lifecycle::StopSignal;
    use crate::sink::{DeviceSink, MemorySink};

    struct ScriptedSource {
        frames: Vec<Option<AudioFrame>>,
    }

    impl AudioSource for ScriptedSource {
        fn read_frame(&mut self, _sample_count: usize) -> Result<Option<AudioFrame>> {
            if self.frames.is_empty() {
                Ok(None)
            } else {
                Ok(self.frames.remove(0))
            }
        }
    }

    fn tone(len: usize, sample_rate: u32, frequency_hz: f32) -> AudioFrame {
        AudioFrame::new(
            (0..len)
                .map(|i| (TAU * frequency_hz * i as f32 / sample_rate as f32).sin())
                .collect(),
        )
    }

    #[test]
    fn bass_tone_turns_the_targets_red() {
        let mut sink = MemorySink::new(2);
        sink.connect().unwrap();
        let observer = sink.clone();

        let mut source = ScriptedSource {
            frames: vec![Some(tone(2048, 44_100, 120.0))],
        };
        let options = descriptor().schema().merge(&[]).unwrap();
        let mut effect = AudioLoopbackEffect::from_options(&options);
        let mut ctx =
            EffectContext::new(&mut sink, &options, StopSignal::new())
                .unwrap()
                .with_audio(&mut source);
        effect.start(&mut ctx).unwrap();
        effect.tick(&mut ctx).unwrap();

        assert_eq!(observer.current(), vec![Color::new(255, 0, 0); 2]);
    }

    #[test]
    fn silence_after_a_tone_holds_the_composite() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let observer = sink.clone();

        let mut source = ScriptedSource {
            frames: vec![
                Some(tone(2048, 44_100, 120.0)),
                Some(AudioFrame::new(vec![0.0; 2048])),
            ],
        };
        let options = descriptor().schema().merge(&[]).unwrap();
        let mut effect = AudioLoopbackEffect::from_options(&options);
        let mut ctx =
            EffectContext::new(&mut sink, &options, StopSignal::new())
                .unwrap()
                .with_audio(&mut source);
        effect.start(&mut ctx).unwrap();
        effect.tick(&mut ctx).unwrap();
        let lit = observer.current()[0];
        effect.tick(&mut ctx).unwrap();

        assert_eq!(observer.current()[0], lit);
        assert_ne!(lit, Color::BLACK);
    }

    #[test]
    fn per_device_variation_stays_within_the_band_hue() {
        let mut sink = MemorySink::new(3);
        sink.connect().unwrap();
        let observer = sink.clone();

        let mut source = ScriptedSource {
            frames: vec![Some(tone(2048, 44_100, 120.0))],
        };
        let options = descriptor()
            .schema()
            .merge(&[("per_device".to_string(), "true".to_string())])
            .unwrap();
        let mut effect = AudioLoopbackEffect::from_options(&options);
        let mut ctx =
            EffectContext::new(&mut sink, &options, StopSignal::new())
                .unwrap()
                .with_audio(&mut source);
        effect.start(&mut ctx).unwrap();
        effect.tick(&mut ctx).unwrap();

        for color in observer.current() {
            assert!(color.r >= (255.0 * VARIATION_FLOOR) as u8 - 1);
            assert_eq!(color.g, 0);
            assert_eq!(color.b, 0);
        }
    }

    #[test]
    fn malformed_bands_fail_at_start() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();

        let mut source = ScriptedSource { frames: Vec::new() };
        let options = descriptor()
            .schema()
            .merge(&[("frequency_bands".to_string(), "[500,60]".to_string())])
            .unwrap();
        let mut effect = AudioLoopbackEffect::from_options(&options);
        let mut ctx =
            EffectContext::new(&mut sink, &options, StopSignal::new())
                .unwrap()
                .with_audio(&mut source);
        let err = effect.start(&mut ctx).unwrap_err();
        assert!(
            matches!(err, EffectError::InvalidOption { ref field, .. } if field == "frequency_bands")
        );
    }
}
