//! Lightning effect: bright strikes that fade out over a random duration.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::color::{lerp_color, Color, ColorSpec};
use crate::lifecycle::{Effect, EffectContext, TickOutcome};
use crate::options::{EffectOptions, OptionField, OptionSchema};
use crate::registry::EffectDescriptor;
use crate::sink::Device;
use crate::Result;

const DEFAULT_SLEEP_S: f32 = 0.5;
const DEFAULT_COLOR: ColorSpec = ColorSpec::Fixed(Color::WHITE);
const DEFAULT_TARGET_MODE: &str = "random";
const DEFAULT_FADE_MIN_MS: i64 = 100;
const DEFAULT_FADE_MAX_MS: i64 = 500;
const DEFAULT_FLASH_DURATION_MS: i64 = 50;

/// Step size of the fade animation.
const FADE_STEP: Duration = Duration::from_millis(10);

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new(
        "Lightning",
        "Flash like a lightning strike, then fade to black",
        OptionSchema::base_with_sleep(DEFAULT_SLEEP_S)
            .field(OptionField::color("color", DEFAULT_COLOR))
            .field(OptionField::text("target_mode", DEFAULT_TARGET_MODE))
            .field(OptionField::int("fade_min_ms", DEFAULT_FADE_MIN_MS))
            .field(OptionField::int("fade_max_ms", DEFAULT_FADE_MAX_MS))
            .field(OptionField::int(
                "flash_duration_ms",
                DEFAULT_FLASH_DURATION_MS,
            )),
        |options| Box::new(LightningEffect::from_options(options)),
    )
}

/// One tick is one complete strike: flash at full intensity, then fade. The
/// strike color (`random` re-draws per strike) and the struck devices
/// (`target_mode=random` picks a single one) are re-chosen every time.
pub struct LightningEffect {
    color: ColorSpec,
    single_target: bool,
    fade_min_ms: u64,
    fade_max_ms: u64,
    flash_duration: Duration,
}

impl LightningEffect {
    pub fn from_options(options: &EffectOptions) -> Self {
        let fade_min = options
            .int("fade_min_ms")
            .unwrap_or(DEFAULT_FADE_MIN_MS)
            .max(0) as u64;
        let fade_max = options
            .int("fade_max_ms")
            .unwrap_or(DEFAULT_FADE_MAX_MS)
            .max(0) as u64;
        let flash_ms = options
            .int("flash_duration_ms")
            .unwrap_or(DEFAULT_FLASH_DURATION_MS)
            .max(0) as u64;
        let mode = options
            .get("target_mode")
            .map(|value| value.to_string())
            .unwrap_or_else(|| DEFAULT_TARGET_MODE.to_string());
        Self {
            color: options.color_spec("color").unwrap_or(DEFAULT_COLOR),
            single_target: mode.eq_ignore_ascii_case("random"),
            fade_min_ms: fade_min.min(fade_max),
            fade_max_ms: fade_max.max(fade_min),
            flash_duration: Duration::from_millis(flash_ms),
        }
    }

    fn strike_targets(&self, ctx: &EffectContext<'_>) -> Vec<Device> {
        if self.single_target {
            ctx.random_target().into_iter().collect()
        } else {
            ctx.targets().to_vec()
        }
    }
}

impl Effect for LightningEffect {
    fn start(&mut self, _ctx: &mut EffectContext<'_>) -> Result<()> {
        Ok(())
    }

    fn tick(&mut self, ctx: &mut EffectContext<'_>) -> Result<TickOutcome> {
        let targets = self.strike_targets(ctx);
        if targets.is_empty() {
            return Ok(TickOutcome::Continue);
        }
        let flash = self.color.resolve();

        // The flash goes out at full intensity; only the fade is clamped.
        for device in &targets {
            ctx.fill_device_unclamped(device, flash)?;
        }
        if ctx.wait(self.flash_duration) {
            return Ok(TickOutcome::Continue);
        }

        let fade_ms = rand::thread_rng().gen_range(self.fade_min_ms..=self.fade_max_ms);
        let fade = Duration::from_millis(fade_ms.max(1));
        let begun = Instant::now();
        loop {
            let progress = (begun.elapsed().as_secs_f32() / fade.as_secs_f32()).min(1.0);
            let faded = lerp_color(flash, Color::BLACK, progress);
            for device in &targets {
                ctx.fill_device(device, faded)?;
            }
            if progress >= 1.0 {
                break;
            }
            if ctx.wait(FADE_STEP) {
                return Ok(TickOutcome::Continue);
            }
        }
        Ok(TickOutcome::Continue)
    }

    fn stop(&mut self, ctx: &mut EffectContext<'_>) -> Result<()> {
        ctx.blackout()
    }
}
