//! Built-in effects.
//!
//! Each module owns one effect: its options schema, its descriptor and its
//! lifecycle hooks. `builtin_descriptors` fixes the registration order the
//! registry and the front end present to users.

pub mod audio_loopback;
pub mod audio_peak;
pub mod breathing;
pub mod desktop;
pub mod lightning;
pub mod police_lights;
pub mod rainbow;
pub mod random_colors;
pub mod static_color;

use crate::registry::EffectDescriptor;

/// Every built-in effect, in registration order.
pub fn builtin_descriptors() -> Vec<EffectDescriptor> {
    vec![
        static_color::descriptor(),
        breathing::descriptor(),
        rainbow::descriptor(),
        random_colors::descriptor(),
        lightning::descriptor(),
        police_lights::descriptor(),
        desktop::descriptor(),
        audio_peak::descriptor(),
        audio_loopback::descriptor(),
    ]
}
