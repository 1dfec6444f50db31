//! Desktop effect: tint the devices after the captured screen content.

use std::time::Duration;

use crate::color::{lerp_color, Color};
use crate::lifecycle::{Effect, EffectContext, TickOutcome};
use crate::options::{EffectOptions, OptionField, OptionSchema};
use crate::registry::EffectDescriptor;
use crate::screen::{average_color, dominant_color};
use crate::{EffectError, Result};

const DEFAULT_SLEEP_S: f32 = 0.1;
const DEFAULT_CAPTURE_INTERVAL_MS: i64 = 100;
const DEFAULT_COLOR_SAMPLING: &str = "dominant";
const DEFAULT_COLOR_TOLERANCE: i64 = 30;
const DEFAULT_SMOOTH_TRANSITIONS: bool = true;
const DEFAULT_TRANSITION_DURATION_MS: i64 = 200;

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new(
        "Desktop",
        "Follow the dominant or average color of the screen",
        OptionSchema::base_with_sleep(DEFAULT_SLEEP_S)
            .field(OptionField::int(
                "capture_interval_ms",
                DEFAULT_CAPTURE_INTERVAL_MS,
            ))
            .field(OptionField::text("color_sampling", DEFAULT_COLOR_SAMPLING))
            .field(OptionField::int("color_tolerance", DEFAULT_COLOR_TOLERANCE))
            .field(OptionField::bool(
                "smooth_transitions",
                DEFAULT_SMOOTH_TRANSITIONS,
            ))
            .field(OptionField::int(
                "transition_duration_ms",
                DEFAULT_TRANSITION_DURATION_MS,
            )),
        |options| Box::new(DesktopEffect::from_options(options)),
    )
}

pub struct DesktopEffect {
    capture_interval: Duration,
    use_average: bool,
    tolerance: u8,
    smooth: bool,
    transition: Duration,
    current: Color,
}

impl DesktopEffect {
    pub fn from_options(options: &EffectOptions) -> Self {
        let interval_ms = options
            .int("capture_interval_ms")
            .unwrap_or(DEFAULT_CAPTURE_INTERVAL_MS)
            .max(1) as u64;
        let sampling = options
            .get("color_sampling")
            .map(|value| value.to_string())
            .unwrap_or_else(|| DEFAULT_COLOR_SAMPLING.to_string());
        let tolerance = options
            .int("color_tolerance")
            .unwrap_or(DEFAULT_COLOR_TOLERANCE)
            .clamp(1, 255) as u8;
        let transition_ms = options
            .int("transition_duration_ms")
            .unwrap_or(DEFAULT_TRANSITION_DURATION_MS)
            .max(1) as u64;
        Self {
            capture_interval: Duration::from_millis(interval_ms),
            use_average: sampling.eq_ignore_ascii_case("average"),
            tolerance,
            smooth: options
                .bool("smooth_transitions")
                .unwrap_or(DEFAULT_SMOOTH_TRANSITIONS),
            transition: Duration::from_millis(transition_ms),
            current: Color::BLACK,
        }
    }

    /// Fraction of the way toward the target to move per capture interval.
    fn blend_step(&self) -> f32 {
        (self.capture_interval.as_secs_f32() / self.transition.as_secs_f32()).min(1.0)
    }
}

impl Effect for DesktopEffect {
    fn start(&mut self, ctx: &mut EffectContext<'_>) -> Result<()> {
        if !ctx.has_screen() {
            return Err(EffectError::Capture("no screen source installed".into()));
        }
        self.current = Color::BLACK;
        Ok(())
    }

    fn tick(&mut self, ctx: &mut EffectContext<'_>) -> Result<TickOutcome> {
        let Some(frame) = ctx.read_screen()? else {
            // No fresh capture: keep showing the last color.
            return Ok(TickOutcome::ContinueAfter(self.capture_interval));
        };
        let target = if self.use_average {
            average_color(&frame)
        } else {
            dominant_color(&frame, self.tolerance)
        };

        self.current = if self.smooth {
            lerp_color(self.current, target, self.blend_step())
        } else {
            target
        };
        ctx.fill(self.current)?;
        Ok(TickOutcome::ContinueAfter(self.capture_interval))
    }

    fn stop(&mut self, ctx: &mut EffectContext<'_>) -> Result<()> {
        ctx.blackout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::StopSignal;
    use crate::screen::{PixelFrame, PixelSource};
    use crate::sink::{DeviceSink, MemorySink};

    struct ScriptedScreen {
        frames: Vec<Option<PixelFrame>>,
    }

    impl PixelSource for ScriptedScreen {
        fn capture_frame(&mut self) -> Result<Option<PixelFrame>> {
            if self.frames.is_empty() {
                Ok(None)
            } else {
                Ok(self.frames.remove(0))
            }
        }
    }

    fn solid_frame(color: Color) -> PixelFrame {
        PixelFrame::new(4, 2, vec![color; 8])
    }

    #[test]
    fn start_requires_a_screen_source() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let options = descriptor().schema().merge(&[]).unwrap();
        let mut effect = DesktopEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new()).unwrap();
        assert!(matches!(
            effect.start(&mut ctx),
            Err(EffectError::Capture(_))
        ));
    }

    #[test]
    fn hard_transitions_apply_the_captured_color_directly() {
        let mut sink = MemorySink::new(2);
        sink.connect().unwrap();
        let observer = sink.clone();

        let red = Color::new(200, 10, 10);
        let mut screen = ScriptedScreen {
            frames: vec![Some(solid_frame(red))],
        };
        let options = descriptor()
            .schema()
            .merge(&[("smooth_transitions".to_string(), "false".to_string())])
            .unwrap();
        let mut effect = DesktopEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new())
            .unwrap()
            .with_screen(&mut screen);
        effect.start(&mut ctx).unwrap();
        let outcome = effect.tick(&mut ctx).unwrap();

        assert_eq!(
            outcome,
            TickOutcome::ContinueAfter(Duration::from_millis(100))
        );
        assert_eq!(observer.current(), vec![red; 2]);
    }

    #[test]
    fn smooth_transitions_approach_the_target_gradually() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let observer = sink.clone();

        let white = Color::WHITE;
        let mut screen = ScriptedScreen {
            frames: vec![Some(solid_frame(white)), Some(solid_frame(white))],
        };
        let options = descriptor().schema().merge(&[]).unwrap();
        let mut effect = DesktopEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new())
            .unwrap()
            .with_screen(&mut screen);
        effect.start(&mut ctx).unwrap();

        effect.tick(&mut ctx).unwrap();
        let first = observer.current()[0];
        effect.tick(&mut ctx).unwrap();
        let second = observer.current()[0];

        // Half-way after the first capture, closer after the second.
        assert!(first.r > 0 && first.r < 255);
        assert!(second.r > first.r);
    }

    #[test]
    fn missed_capture_keeps_the_previous_color() {
        let mut sink = MemorySink::new(1);
        sink.connect().unwrap();
        let observer = sink.clone();

        let mut screen = ScriptedScreen {
            frames: vec![Some(solid_frame(Color::new(0, 80, 0))), None],
        };
        let options = descriptor()
            .schema()
            .merge(&[("smooth_transitions".to_string(), "false".to_string())])
            .unwrap();
        let mut effect = DesktopEffect::from_options(&options);
        let mut ctx = EffectContext::new(&mut sink, &options, StopSignal::new())
            .unwrap()
            .with_screen(&mut screen);
        effect.start(&mut ctx).unwrap();
        effect.tick(&mut ctx).unwrap();
        let pushes_after_first = observer.pushes().len();
        effect.tick(&mut ctx).unwrap();

        assert_eq!(observer.pushes().len(), pushes_after_first);
        assert_eq!(observer.current(), vec![Color::new(0, 80, 0)]);
    }
}
