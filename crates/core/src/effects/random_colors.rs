//! Random colors effect: fresh palette draws per iteration.

use rand::seq::SliceRandom;

use crate::color::{ColorSpec, NAMED_COLORS};
use crate::lifecycle::{Effect, EffectContext, TickOutcome};
use crate::options::{EffectOptions, OptionField, OptionSchema};
use crate::registry::EffectDescriptor;
use crate::Result;

const DEFAULT_SLEEP_S: f32 = 0.5;
const DEFAULT_PER_DEVICE: bool = true;

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new(
        "RandomColors",
        "Recolor the targets randomly from a palette",
        OptionSchema::base_with_sleep(DEFAULT_SLEEP_S)
            .field(OptionField::bool("per_device", DEFAULT_PER_DEVICE))
            .field(OptionField::color_list("palette", Vec::new())),
        |options| Box::new(RandomColorsEffect::from_options(options)),
    )
}

/// Draws a fresh color every iteration; `random` entries in the palette
/// re-draw on every pick as well.
pub struct RandomColorsEffect {
    per_device: bool,
    palette: Vec<ColorSpec>,
}

impl RandomColorsEffect {
    pub fn from_options(options: &EffectOptions) -> Self {
        Self {
            per_device: options.bool("per_device").unwrap_or(DEFAULT_PER_DEVICE),
            palette: options
                .color_list("palette")
                .map(<[ColorSpec]>::to_vec)
                .unwrap_or_default(),
        }
    }

    fn pick(&self) -> ColorSpec {
        self.palette
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or(ColorSpec::Random)
    }
}

impl Effect for RandomColorsEffect {
    fn start(&mut self, _ctx: &mut EffectContext<'_>) -> Result<()> {
        if self.palette.is_empty() {
            // Default palette: every named color except black.
            self.palette = NAMED_COLORS
                .iter()
                .filter(|(name, _)| *name != "black")
                .map(|(_, color)| ColorSpec::Fixed(*color))
                .collect();
        }
        Ok(())
    }

    fn tick(&mut self, ctx: &mut EffectContext<'_>) -> Result<TickOutcome> {
        if self.per_device {
            let targets = ctx.targets().to_vec();
            for device in &targets {
                let color = self.pick().resolve();
                ctx.fill_device(device, color)?;
            }
        } else {
            ctx.fill(self.pick().resolve())?;
        }
        Ok(TickOutcome::Continue)
    }

    fn stop(&mut self, ctx: &mut EffectContext<'_>) -> Result<()> {
        ctx.blackout()
    }
}
