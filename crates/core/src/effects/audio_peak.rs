//! Audio effect: flash on amplitude peaks, fading between them.

use std::time::Instant;

use crate::audio::{rms, PeakDetector, PeakEvent};
use crate::color::{random_color, Color};
use crate::lifecycle::{Effect, EffectContext, TickOutcome};
use crate::options::{EffectOptions, OptionField, OptionSchema};
use crate::registry::EffectDescriptor;
use crate::{EffectError, Result};

const DEFAULT_SLEEP_S: f32 = 0.01;
const DEFAULT_SAMPLE_RATE: i64 = 44_100;
const DEFAULT_CHUNK_SIZE: i64 = 1024;
const DEFAULT_PEAK_THRESHOLD: f32 = 0.05;
const DEFAULT_PEAK_DURATION_S: f32 = 0.1;
const DEFAULT_FADE_DURATION_S: f32 = 0.2;

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new(
        "Audio",
        "Flash a random color on every amplitude peak",
        OptionSchema::base_with_sleep(DEFAULT_SLEEP_S)
            .field(OptionField::int("sample_rate", DEFAULT_SAMPLE_RATE))
            .field(OptionField::int("chunk_size", DEFAULT_CHUNK_SIZE))
            .field(OptionField::float("peak_threshold", DEFAULT_PEAK_THRESHOLD))
            .field(OptionField::float("peak_duration", DEFAULT_PEAK_DURATION_S))
            .field(OptionField::float("fade_duration", DEFAULT_FADE_DURATION_S)),
        |options| Box::new(AudioPeakEffect::from_options(options)),
    )
}

/// The flash color is re-drawn on every detected peak.
pub struct AudioPeakEffect {
    chunk_size: usize,
    detector: PeakDetector,
    flash: Color,
    epoch: Instant,
}

impl AudioPeakEffect {
    pub fn from_options(options: &EffectOptions) -> Self {
        let threshold = options
            .float("peak_threshold")
            .unwrap_or(DEFAULT_PEAK_THRESHOLD);
        let hold = options
            .float("peak_duration")
            .unwrap_or(DEFAULT_PEAK_DURATION_S);
        let fade = options
            .float("fade_duration")
            .unwrap_or(DEFAULT_FADE_DURATION_S);
        Self {
            chunk_size: options.int("chunk_size").unwrap_or(DEFAULT_CHUNK_SIZE).max(2) as usize,
            detector: PeakDetector::new(threshold, hold, fade),
            flash: Color::BLACK,
            epoch: Instant::now(),
        }
    }
}

impl Effect for AudioPeakEffect {
    fn start(&mut self, ctx: &mut EffectContext<'_>) -> Result<()> {
        if !ctx.has_audio() {
            return Err(EffectError::Capture("no audio source installed".into()));
        }
        self.epoch = Instant::now();
        Ok(())
    }

    fn tick(&mut self, ctx: &mut EffectContext<'_>) -> Result<TickOutcome> {
        // A source with nothing new this tick is skipped, not waited on.
        let Some(frame) = ctx.read_audio(self.chunk_size)? else {
            return Ok(TickOutcome::Continue);
        };
        let level = rms(&frame.samples);
        let now = self.epoch.elapsed().as_secs_f32();
        match self.detector.update(level, now) {
            PeakEvent::Triggered => {
                self.flash = random_color();
                ctx.fill(self.flash)?;
            }
            PeakEvent::Holding => ctx.fill(self.flash)?,
            PeakEvent::Fading(factor) => ctx.fill(self.flash.scaled(factor))?,
            PeakEvent::Quiet => ctx.blackout()?,
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
    use crate::audio::{AudioFrame, AudioSource};
    use crate::lifecycle::StopSignal;
    use crate::sink::{DeviceSink, MemorySink};

    /// Replays scripted frames; `None` entries model a capture with nothing
    /// new to deliver.
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

    #[test]
    fn start_requires_an_audio_source() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let options = descriptor().schema().merge(&[]).unwrap();
        let mut effect = AudioPeakEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new()).unwrap();
        assert!(matches!(
            effect.start(&mut ctx),
            Err(EffectError::Capture(_))
        ));
    }

    #[test]
    fn loud_frame_triggers_a_flash_and_quiet_frames_keep_dark() {
        let mut sink = MemorySink::new(2);
        sink.connect().unwrap();
        let observer = sink.clone();

        let mut source = ScriptedSource {
            frames: vec![
                Some(AudioFrame::new(vec![0.0; 64])),
                None,
                Some(AudioFrame::new(vec![0.8; 64])),
            ],
        };
        let options = descriptor().schema().merge(&[]).unwrap();
        let mut effect = AudioPeakEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new())
            .unwrap()
            .with_audio(&mut source);

        effect.start(&mut ctx).unwrap();
        // Quiet frame: both devices dark.
        effect.tick(&mut ctx).unwrap();
        assert_eq!(observer.current(), vec![Color::BLACK; 2]);
        let after_quiet = observer.pushes().len();

        // Empty read: tick is skipped without pushing.
        effect.tick(&mut ctx).unwrap();
        assert_eq!(observer.pushes().len(), after_quiet);

        // Loud frame: a flash lands on every target.
        effect.tick(&mut ctx).unwrap();
        let current = observer.current();
        assert_eq!(current[0], current[1]);
        assert_ne!(current[0], Color::BLACK);
    }
}
