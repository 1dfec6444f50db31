//! Breathing effect: a color fading smoothly in and out.

use std::f32::consts::TAU;

use crate::color::{Color, ColorSpec};
use crate::lifecycle::{Effect, EffectContext, TickOutcome};
use crate::options::{EffectOptions, OptionField, OptionSchema};
use crate::registry::EffectDescriptor;
use crate::Result;

const DEFAULT_SLEEP_S: f32 = 0.05;
const DEFAULT_COLOR: ColorSpec = ColorSpec::Fixed(Color::WHITE);
const DEFAULT_SPEED: f32 = 2.0;
const DEFAULT_MIN_BRIGHTNESS: f32 = 0.1;

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new(
        "Breathing",
        "Fade one color in and out at a fixed rate",
        OptionSchema::base_with_sleep(DEFAULT_SLEEP_S)
            .field(OptionField::color("color", DEFAULT_COLOR))
            .field(OptionField::float("breathing_speed", DEFAULT_SPEED))
            .field(OptionField::brightness(
                "min_brightness",
                DEFAULT_MIN_BRIGHTNESS,
            )),
        |options| Box::new(BreathingEffect::from_options(options)),
    )
}

/// `color=random` is resolved once, at start. The phase advances by the tick
/// delay rather than wall time, so the brightness trace is smooth and
/// reproducible at any scheduling jitter.
pub struct BreathingEffect {
    color: ColorSpec,
    base: Color,
    speed: f32,
    min_brightness: f32,
    step_s: f32,
    phase_cycles: f32,
}

impl BreathingEffect {
    pub fn from_options(options: &EffectOptions) -> Self {
        Self {
            color: options.color_spec("color").unwrap_or(DEFAULT_COLOR),
            base: Color::BLACK,
            speed: options.float("breathing_speed").unwrap_or(DEFAULT_SPEED),
            min_brightness: options
                .brightness("min_brightness")
                .unwrap_or(DEFAULT_MIN_BRIGHTNESS),
            step_s: options.sleep().as_secs_f32(),
            phase_cycles: 0.0,
        }
    }

    fn brightness(&self) -> f32 {
        let wave = ((TAU * self.phase_cycles).sin() + 1.0) / 2.0;
        self.min_brightness + (1.0 - self.min_brightness) * wave
    }
}

impl Effect for BreathingEffect {
    fn start(&mut self, _ctx: &mut EffectContext<'_>) -> Result<()> {
        self.base = self.color.resolve();
        self.phase_cycles = 0.0;
        Ok(())
    }

    fn tick(&mut self, ctx: &mut EffectContext<'_>) -> Result<TickOutcome> {
        ctx.fill(self.base.scaled(self.brightness()))?;
        self.phase_cycles += self.speed * self.step_s;
        Ok(TickOutcome::Continue)
    }

    fn stop(&mut self, _ctx: &mut EffectContext<'_>) -> Result<()> {
        // The last color deliberately persists past the run.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::StopSignal;
    use crate::sink::{DeviceSink, MemorySink};

    /// One full cycle at 1 cycle/s with the default 50 ms step: the red
    /// channel must dip to the configured minimum and recover to maximum
    /// exactly once, without jumps larger than one smooth step.
    #[test]
    fn one_cycle_reaches_min_and_max_once() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let observer = sink.clone();

        let options = descriptor()
            .schema()
            .merge(&[
                ("color".to_string(), "red".to_string()),
                ("breathing_speed".to_string(), "1.0".to_string()),
                ("min_brightness".to_string(), "0.1".to_string()),
            ])
            .unwrap();
        let mut effect = BreathingEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new()).unwrap();

        effect.start(&mut ctx).unwrap();
        // 20 ticks of 0.05 s = one full 1 Hz cycle, plus one closing sample.
        for _ in 0..21 {
            effect.tick(&mut ctx).unwrap();
        }

        let trace: Vec<u8> = observer.pushes().iter().map(|(_, c)| c.r).collect();
        let min = *trace.iter().min().unwrap();
        let max = *trace.iter().max().unwrap();
        let expected_min = (255.0 * 0.1) as u8;
        assert!(min <= expected_min + 2, "min {min} too high");
        assert!(max >= 254, "max {max} too low");

        let minima = trace.iter().filter(|&&r| r <= min + 1).count();
        let maxima = trace.iter().filter(|&&r| r >= max - 1).count();
        assert!(minima <= 2, "expected one dip, trace {trace:?}");
        assert!(maxima <= 3, "expected one peak, trace {trace:?}");

        // Smooth: adjacent samples never jump more than one step of the sine.
        for pair in trace.windows(2) {
            let jump = (i16::from(pair[0]) - i16::from(pair[1])).unsigned_abs();
            assert!(jump <= 80, "discontinuity in trace {trace:?}");
        }
    }

    #[test]
    fn green_channel_stays_zero_for_red_breathing() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let observer = sink.clone();

        let options = descriptor()
            .schema()
            .merge(&[("color".to_string(), "red".to_string())])
            .unwrap();
        let mut effect = BreathingEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new()).unwrap();
        effect.start(&mut ctx).unwrap();
        for _ in 0..5 {
            effect.tick(&mut ctx).unwrap();
        }
        assert!(observer.pushes().iter().all(|(_, c)| c.g == 0 && c.b == 0));
    }
}
