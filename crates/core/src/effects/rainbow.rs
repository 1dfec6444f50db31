//! Rainbow effect: cycling the fixed rainbow sequence, discrete or smooth.

use std::time::Duration;

use crate::color::{lerp_color, RAINBOW_COLORS};
use crate::lifecycle::{Effect, EffectContext, TickOutcome};
use crate::options::{EffectOptions, OptionField, OptionSchema};
use crate::registry::EffectDescriptor;
use crate::Result;

const DEFAULT_SLEEP_S: f32 = 0.2;
const DEFAULT_SMOOTH: bool = true;
const DEFAULT_STEPS_PER_COLOR: i64 = 30;
const DEFAULT_TRANSITION_DELAY_S: f32 = 0.03;

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new(
        "Rainbow",
        "Cycle the rainbow, stepping or blending between hues",
        OptionSchema::base_with_sleep(DEFAULT_SLEEP_S)
            .field(OptionField::bool("smooth_transition", DEFAULT_SMOOTH))
            .field(OptionField::int("steps_per_color", DEFAULT_STEPS_PER_COLOR))
            .field(OptionField::float(
                "transition_delay",
                DEFAULT_TRANSITION_DELAY_S,
            )),
        |options| Box::new(RainbowEffect::from_options(options)),
    )
}

pub struct RainbowEffect {
    smooth: bool,
    steps_per_color: usize,
    transition_delay: Duration,
    color_index: usize,
    step: usize,
}

impl RainbowEffect {
    pub fn from_options(options: &EffectOptions) -> Self {
        let steps = options
            .int("steps_per_color")
            .unwrap_or(DEFAULT_STEPS_PER_COLOR)
            .max(1) as usize;
        let delay = options
            .float("transition_delay")
            .unwrap_or(DEFAULT_TRANSITION_DELAY_S)
            .max(0.0);
        Self {
            smooth: options.bool("smooth_transition").unwrap_or(DEFAULT_SMOOTH),
            steps_per_color: steps,
            transition_delay: Duration::from_secs_f32(delay),
            color_index: 0,
            step: 0,
        }
    }
}

impl Effect for RainbowEffect {
    fn start(&mut self, _ctx: &mut EffectContext<'_>) -> Result<()> {
        self.color_index = 0;
        self.step = 0;
        Ok(())
    }

    fn tick(&mut self, ctx: &mut EffectContext<'_>) -> Result<TickOutcome> {
        let current = RAINBOW_COLORS[self.color_index];
        if !self.smooth {
            ctx.fill(current)?;
            self.color_index = (self.color_index + 1) % RAINBOW_COLORS.len();
            return Ok(TickOutcome::Continue);
        }

        let next = RAINBOW_COLORS[(self.color_index + 1) % RAINBOW_COLORS.len()];
        let t = self.step as f32 / self.steps_per_color as f32;
        ctx.fill(lerp_color(current, next, t))?;

        self.step += 1;
        if self.step >= self.steps_per_color {
            self.step = 0;
            self.color_index = (self.color_index + 1) % RAINBOW_COLORS.len();
        }
        Ok(TickOutcome::ContinueAfter(self.transition_delay))
    }

    fn stop(&mut self, ctx: &mut EffectContext<'_>) -> Result<()> {
        ctx.blackout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::lifecycle::StopSignal;
    use crate::sink::{DeviceSink, MemorySink};

    #[test]
    fn discrete_mode_walks_the_sequence_and_wraps() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let observer = sink.clone();

        let options = descriptor()
            .schema()
            .merge(&[("smooth_transition".to_string(), "false".to_string())])
            .unwrap();
        let mut effect = RainbowEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new()).unwrap();
        effect.start(&mut ctx).unwrap();
        for _ in 0..RAINBOW_COLORS.len() + 1 {
            assert_eq!(effect.tick(&mut ctx).unwrap(), TickOutcome::Continue);
        }

        let pushed: Vec<Color> = observer.pushes().iter().map(|(_, c)| *c).collect();
        assert_eq!(&pushed[..RAINBOW_COLORS.len()], &RAINBOW_COLORS[..]);
        // Wrapped back to the first color.
        assert_eq!(pushed[RAINBOW_COLORS.len()], RAINBOW_COLORS[0]);
    }

    #[test]
    fn smooth_mode_interpolates_and_uses_the_transition_delay() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let observer = sink.clone();

        let options = descriptor()
            .schema()
            .merge(&[("steps_per_color".to_string(), "2".to_string())])
            .unwrap();
        let mut effect = RainbowEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new()).unwrap();
        effect.start(&mut ctx).unwrap();

        let outcome = effect.tick(&mut ctx).unwrap();
        assert_eq!(
            outcome,
            TickOutcome::ContinueAfter(Duration::from_secs_f32(DEFAULT_TRANSITION_DELAY_S))
        );
        effect.tick(&mut ctx).unwrap();
        effect.tick(&mut ctx).unwrap();

        let pushed: Vec<Color> = observer.pushes().iter().map(|(_, c)| *c).collect();
        assert_eq!(pushed[0], RAINBOW_COLORS[0]);
        assert_eq!(
            pushed[1],
            lerp_color(RAINBOW_COLORS[0], RAINBOW_COLORS[1], 0.5)
        );
        // Third tick begins the next pair.
        assert_eq!(pushed[2], RAINBOW_COLORS[1]);
    }
}
