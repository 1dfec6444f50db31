//! Core effect runtime engine for addressable RGB lighting.
//!
//! The crate turns arbitrary effect implementations into uniformly
//! controllable units: a read-only registry describes them, a lifecycle state
//! machine drives one at a time against an abstract device sink, and a shared
//! configuration layer parses the colors, brightness values and device
//! selections they all share. The most demanding effect, audio-loopback
//! frequency-mapped color synthesis, lives in [`audio`] together with the
//! spectral analysis it is built on. Transports and capture drivers stay
//! outside, behind the [`sink::DeviceSink`], [`audio::AudioSource`] and
//! [`screen::PixelSource`] traits.

pub mod audio;
pub mod color;
pub mod controller;
pub mod effects;
pub mod error;
pub mod lifecycle;
pub mod options;
pub mod registry;
pub mod screen;
pub mod sink;
pub mod targeting;

pub use audio::{
    bands_from_boundaries, rms, AudioFrame, AudioSource, FrequencyBand, FrequencyColorEngine,
    PeakDetector, PeakEvent, SpectrumAnalyzer,
};
pub use color::{
    lerp_color, parse_brightness, parse_color, Color, ColorSpec, NAMED_COLORS, RAINBOW_COLORS,
};
pub use controller::{Controller, StopHandle};
pub use effects::builtin_descriptors;
pub use error::{EffectError, Result};
pub use lifecycle::{
    Effect, EffectContext, EffectLifecycle, LifecycleState, StopSignal, TickOutcome,
};
pub use options::{EffectOptions, OptionField, OptionKind, OptionSchema, OptionValue};
pub use registry::{EffectDescriptor, EffectInfo, EffectRegistry, OptionInfo};
pub use screen::{average_color, dominant_color, PixelFrame, PixelSource};
pub use sink::{Device, DeviceSink, MemorySink};
pub use targeting::DeviceSelector;
