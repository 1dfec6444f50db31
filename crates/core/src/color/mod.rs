use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{EffectError, Result};

/// One RGB triple as pushed to the device sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scales every channel by `factor`, clamping to the valid range.
    pub fn scaled(self, factor: f32) -> Self {
        let scale = |channel: u8| (f32::from(channel) * factor).clamp(0.0, 255.0) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Named palette available to `parse_color`. Lookup is case-insensitive.
pub const NAMED_COLORS: &[(&str, Color)] = &[
    ("red", Color::new(255, 0, 0)),
    ("orange", Color::new(255, 127, 0)),
    ("yellow", Color::new(255, 255, 0)),
    ("green", Color::new(0, 255, 0)),
    ("blue", Color::new(0, 0, 255)),
    ("indigo", Color::new(75, 0, 130)),
    ("violet", Color::new(148, 0, 211)),
    ("white", Color::WHITE),
    ("black", Color::BLACK),
    ("cyan", Color::new(0, 255, 255)),
    ("magenta", Color::new(255, 0, 255)),
    ("pink", Color::new(255, 192, 203)),
    ("brown", Color::new(165, 42, 42)),
    ("gray", Color::new(128, 128, 128)),
    ("light_gray", Color::new(211, 211, 211)),
    ("dark_gray", Color::new(169, 169, 169)),
    ("light_blue", Color::new(173, 216, 230)),
];

/// Cyclic hue progression used by effects that walk the rainbow; index
/// arithmetic wraps modulo the sequence length.
pub const RAINBOW_COLORS: [Color; 7] = [
    Color::new(255, 0, 0),
    Color::new(255, 127, 0),
    Color::new(255, 255, 0),
    Color::new(0, 255, 0),
    Color::new(0, 0, 255),
    Color::new(75, 0, 130),
    Color::new(148, 0, 211),
];

/// Looks up a palette color by name, case-insensitively.
pub fn named_color(name: &str) -> Option<Color> {
    let lowered = name.to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(candidate, _)| *candidate == lowered)
        .map(|(_, color)| *color)
}

/// Draws a uniformly random color, each channel independent.
pub fn random_color() -> Color {
    let mut rng = rand::thread_rng();
    Color::new(rng.gen(), rng.gen(), rng.gen())
}

/// A color specification as written in an option value. `Random` keeps the
/// deferred draw so each effect can pick its own re-draw policy (once at
/// start, or per iteration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpec {
    Fixed(Color),
    Random,
}

impl ColorSpec {
    /// Parses a color specification: a palette name, `#RRGGBB`, an `R,G,B`
    /// triple (components clamped to 0..=255), or `random`.
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        if trimmed.eq_ignore_ascii_case("random") {
            return Ok(Self::Random);
        }
        if let Some(color) = named_color(trimmed) {
            return Ok(Self::Fixed(color));
        }
        if let Some(hex) = trimmed.strip_prefix('#') {
            return parse_hex(hex)
                .ok_or_else(|| EffectError::InvalidColorFormat(spec.to_string()))
                .map(Self::Fixed);
        }
        if trimmed.contains(',') {
            return parse_triple(trimmed)
                .ok_or_else(|| EffectError::InvalidColorFormat(spec.to_string()))
                .map(Self::Fixed);
        }
        Err(EffectError::InvalidColorFormat(spec.to_string()))
    }

    /// Resolves the specification to a concrete color, drawing anew on every
    /// call for `Random`.
    pub fn resolve(&self) -> Color {
        match self {
            Self::Fixed(color) => *color,
            Self::Random => random_color(),
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(self, Self::Random)
    }
}

impl std::fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(color) => write!(f, "{color}"),
            Self::Random => write!(f, "random"),
        }
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::new(r, g, b))
}

fn parse_triple(triple: &str) -> Option<Color> {
    let mut channels = [0_u8; 3];
    let mut count = 0;
    for part in triple.split(',') {
        if count == channels.len() {
            return None;
        }
        let value: i64 = part.trim().parse().ok()?;
        channels[count] = value.clamp(0, 255) as u8;
        count += 1;
    }
    if count != channels.len() {
        return None;
    }
    Some(Color::new(channels[0], channels[1], channels[2]))
}

/// Parses a color specification to a concrete color. `random` is drawn once,
/// at parse time.
pub fn parse_color(spec: &str) -> Result<Color> {
    Ok(ColorSpec::parse(spec)?.resolve())
}

/// Parses a brightness: a float literal, a percentage (`NN%`), or `random`
/// (drawn once, at parse time). The result is clamped to `[0, 1]`.
pub fn parse_brightness(spec: &str) -> Result<f32> {
    let trimmed = spec.trim();
    if trimmed.eq_ignore_ascii_case("random") {
        return Ok(rand::thread_rng().gen::<f32>());
    }
    let (literal, divisor) = match trimmed.strip_suffix('%') {
        Some(percent) => (percent.trim(), 100.0),
        None => (trimmed, 1.0),
    };
    let value: f32 = literal
        .parse()
        .map_err(|_| EffectError::InvalidBrightnessFormat(spec.to_string()))?;
    if !value.is_finite() {
        return Err(EffectError::InvalidBrightnessFormat(spec.to_string()));
    }
    Ok((value / divisor).clamp(0.0, 1.0))
}

/// Per-channel linear interpolation between `a` and `b`; `t` is clamped to
/// `[0, 1]` before use.
pub fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |from: u8, to: u8| (f32::from(from) + (f32::from(to) - f32::from(from)) * t) as u8;
    Color::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
}
