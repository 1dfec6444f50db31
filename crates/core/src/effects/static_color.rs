//! Static effect: one color, held.

use crate::color::{Color, ColorSpec};
use crate::lifecycle::{Effect, EffectContext, TickOutcome};
use crate::options::{EffectOptions, OptionField, OptionSchema};
use crate::registry::EffectDescriptor;
use crate::Result;

const DEFAULT_SLEEP_S: f32 = 1.0;
const DEFAULT_COLOR: ColorSpec = ColorSpec::Fixed(Color::WHITE);

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new(
        "Static",
        "Set the targets to one color and keep it",
        OptionSchema::base_with_sleep(DEFAULT_SLEEP_S)
            .field(OptionField::color("color", DEFAULT_COLOR)),
        |options| Box::new(StaticEffect::from_options(options)),
    )
}

/// `color=random` is resolved once, at start.
pub struct StaticEffect {
    color: ColorSpec,
    applied: Color,
}

impl StaticEffect {
    pub fn from_options(options: &EffectOptions) -> Self {
        Self {
            color: options.color_spec("color").unwrap_or(DEFAULT_COLOR),
            applied: Color::BLACK,
        }
    }
}

impl Effect for StaticEffect {
    fn start(&mut self, ctx: &mut EffectContext<'_>) -> Result<()> {
        self.applied = self.color.resolve();
        ctx.fill(self.applied)
    }

    fn tick(&mut self, ctx: &mut EffectContext<'_>) -> Result<TickOutcome> {
        // Re-push every iteration so devices rejoining mid-run converge.
        ctx.fill(self.applied)?;
        Ok(TickOutcome::Continue)
    }

    fn stop(&mut self, _ctx: &mut EffectContext<'_>) -> Result<()> {
        // The color deliberately persists past the run.
        Ok(())
    }
}
