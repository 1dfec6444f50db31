//! Police lights effect: double blue flashes alternating with double red.

use std::time::Duration;

use crate::color::Color;
use crate::lifecycle::{Effect, EffectContext, TickOutcome};
use crate::options::{EffectOptions, OptionField, OptionSchema};
use crate::registry::EffectDescriptor;
use crate::Result;

const DEFAULT_SLEEP_S: f32 = 0.1;
const DEFAULT_FLASH_DURATION_MS: i64 = 100;
const DEFAULT_PAUSE_DURATION_S: f32 = 0.5;

const BLUE: Color = Color::new(0, 0, 255);
const RED: Color = Color::new(255, 0, 0);

/// Gap between the two flashes of one burst.
const INTER_FLASH: Duration = Duration::from_millis(50);

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new(
        "PoliceLights",
        "Alternate double blue and double red flashes",
        OptionSchema::base_with_sleep(DEFAULT_SLEEP_S)
            .field(OptionField::int(
                "flash_duration_ms",
                DEFAULT_FLASH_DURATION_MS,
            ))
            .field(OptionField::float(
                "pause_duration_s",
                DEFAULT_PAUSE_DURATION_S,
            )),
        |options| Box::new(PoliceLightsEffect::from_options(options)),
    )
}

pub struct PoliceLightsEffect {
    flash: Duration,
    pause: Duration,
}

impl PoliceLightsEffect {
    pub fn from_options(options: &EffectOptions) -> Self {
        let flash_ms = options
            .int("flash_duration_ms")
            .unwrap_or(DEFAULT_FLASH_DURATION_MS)
            .max(0) as u64;
        let pause_s = options
            .float("pause_duration_s")
            .unwrap_or(DEFAULT_PAUSE_DURATION_S)
            .max(0.0);
        Self {
            flash: Duration::from_millis(flash_ms),
            pause: Duration::from_secs_f32(pause_s),
        }
    }

    /// Two flash-then-dark pulses of one color. Returns early on stop.
    fn burst(&self, ctx: &mut EffectContext<'_>, color: Color) -> Result<bool> {
        for _ in 0..2 {
            ctx.fill(color)?;
            if ctx.wait(self.flash) {
                return Ok(true);
            }
            ctx.blackout()?;
            if ctx.wait(INTER_FLASH) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Effect for PoliceLightsEffect {
    fn start(&mut self, _ctx: &mut EffectContext<'_>) -> Result<()> {
        Ok(())
    }

    fn tick(&mut self, ctx: &mut EffectContext<'_>) -> Result<TickOutcome> {
        if self.burst(ctx, BLUE)? || ctx.wait(self.pause) {
            return Ok(TickOutcome::Continue);
        }
        if self.burst(ctx, RED)? || ctx.wait(self.pause) {
            return Ok(TickOutcome::Continue);
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
    use crate::lifecycle::StopSignal;
    use crate::sink::{DeviceSink, MemorySink};

    #[test]
    fn one_cycle_is_two_blue_then_two_red_bursts() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let observer = sink.clone();

        let options = descriptor()
            .schema()
            .merge(&[
                ("flash_duration_ms".to_string(), "1".to_string()),
                ("pause_duration_s".to_string(), "0.001".to_string()),
            ])
            .unwrap();
        let mut effect = PoliceLightsEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new()).unwrap();
        effect.start(&mut ctx).unwrap();
        effect.tick(&mut ctx).unwrap();

        let colors: Vec<Color> = observer.pushes().iter().map(|(_, c)| *c).collect();
        assert_eq!(
            colors,
            vec![
                BLUE,
                Color::BLACK,
                BLUE,
                Color::BLACK,
                RED,
                Color::BLACK,
                RED,
                Color::BLACK,
            ]
        );
    }

    #[test]
    fn stop_mid_burst_short_circuits_the_tick() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let observer = sink.clone();

        let options = descriptor().schema().merge(&[]).unwrap();
        let mut effect = PoliceLightsEffect::from_options(&options);
        let signal = StopSignal::new();
        signal.trigger();
        let mut ctx = EffectContext::new(&mut sink, &options, signal).unwrap();
        effect.start(&mut ctx).unwrap();
        let outcome = effect.tick(&mut ctx).unwrap();
        assert_eq!(outcome, TickOutcome::Continue);
        // Only the first blue flash went out before the stop cut the waits.
        assert_eq!(observer.pushes().len(), 1);
    }
}
