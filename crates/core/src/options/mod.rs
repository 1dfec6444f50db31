use std::collections::HashMap;
use std::time::Duration;

use crate::color::{parse_brightness, ColorSpec};
use crate::targeting::DeviceSelector;
use crate::{EffectError, Result};

/// The closed set of value kinds an option field can declare. Every kind owns
/// its parser and its accepted-format description for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Float,
    Int,
    Bool,
    Color,
    Brightness,
    Text,
    /// Bracketed list of non-negative integers, e.g. `[60,250,500]`.
    IntList,
    /// Bracketed list of color specifications, e.g. `[red,#00FF00]`.
    ColorList,
}

impl OptionKind {
    /// Human-readable description of the formats the kind accepts, surfaced
    /// through `describe`.
    pub fn accepted_formats(self) -> &'static str {
        match self {
            Self::Float => "decimal number",
            Self::Int => "integer",
            Self::Bool => "true/false, yes/no, on/off, 1/0",
            Self::Color => "color name, #RRGGBB, R,G,B, or random",
            Self::Brightness => "decimal in [0,1], NN%, or random",
            Self::Text => "text",
            Self::IntList => "[n,n,...], all, or empty",
            Self::ColorList => "[color,color,...] or empty",
        }
    }
}

/// A parsed option value. Values are produced by the merge and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Float(f32),
    Int(i64),
    Bool(bool),
    Color(ColorSpec),
    Brightness(f32),
    Text(String),
    IntList(Vec<i64>),
    ColorList(Vec<ColorSpec>),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            Self::Float(_) => OptionKind::Float,
            Self::Int(_) => OptionKind::Int,
            Self::Bool(_) => OptionKind::Bool,
            Self::Color(_) => OptionKind::Color,
            Self::Brightness(_) => OptionKind::Brightness,
            Self::Text(_) => OptionKind::Text,
            Self::IntList(_) => OptionKind::IntList,
            Self::ColorList(_) => OptionKind::ColorList,
        }
    }

    /// Applies the kind's parser to a raw override string.
    pub fn parse(kind: OptionKind, raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        match kind {
            OptionKind::Float => parse_float(trimmed).map(Self::Float),
            OptionKind::Int => trimmed
                .parse()
                .map(Self::Int)
                .map_err(|_| EffectError::InvalidValue {
                    expected: "integer",
                    value: raw.to_string(),
                }),
            OptionKind::Bool => parse_bool(trimmed).map(Self::Bool),
            OptionKind::Color => ColorSpec::parse(trimmed).map(Self::Color),
            OptionKind::Brightness => parse_brightness(trimmed).map(Self::Brightness),
            OptionKind::Text => Ok(Self::Text(trimmed.to_string())),
            OptionKind::IntList => parse_int_list(trimmed).map(Self::IntList),
            OptionKind::ColorList => parse_color_list(trimmed).map(Self::ColorList),
        }
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Color(v) => write!(f, "{v}"),
            Self::Brightness(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::IntList(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Self::ColorList(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

fn parse_float(raw: &str) -> Result<f32> {
    let value: f32 = raw.parse().map_err(|_| EffectError::InvalidValue {
        expected: "decimal number",
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(EffectError::InvalidValue {
            expected: "decimal number",
            value: raw.to_string(),
        });
    }
    Ok(value)
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(EffectError::InvalidValue {
            expected: "boolean",
            value: raw.to_string(),
        }),
    }
}

fn bracket_items(raw: &str) -> Option<Vec<&str>> {
    let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    Some(inner.split(',').map(str::trim).collect())
}

fn parse_int_list(raw: &str) -> Result<Vec<i64>> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return Ok(Vec::new());
    }
    let items = bracket_items(raw).ok_or(EffectError::InvalidValue {
        expected: "integer list",
        value: raw.to_string(),
    })?;
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        let value: i64 = item.parse().map_err(|_| EffectError::InvalidValue {
            expected: "integer list",
            value: raw.to_string(),
        })?;
        if value < 0 {
            return Err(EffectError::InvalidValue {
                expected: "non-negative integer list",
                value: raw.to_string(),
            });
        }
        values.push(value);
    }
    Ok(values)
}

fn parse_color_list(raw: &str) -> Result<Vec<ColorSpec>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let items = bracket_items(raw).ok_or(EffectError::InvalidValue {
        expected: "color list",
        value: raw.to_string(),
    })?;
    items.into_iter().map(ColorSpec::parse).collect()
}

/// One field of an effect's options schema: name, kind, default.
#[derive(Debug, Clone)]
pub struct OptionField {
    name: &'static str,
    kind: OptionKind,
    default: OptionValue,
}

impl OptionField {
    pub fn new(name: &'static str, kind: OptionKind, default: OptionValue) -> Self {
        debug_assert_eq!(default.kind(), kind);
        Self {
            name,
            kind,
            default,
        }
    }

    pub fn float(name: &'static str, default: f32) -> Self {
        Self::new(name, OptionKind::Float, OptionValue::Float(default))
    }

    pub fn int(name: &'static str, default: i64) -> Self {
        Self::new(name, OptionKind::Int, OptionValue::Int(default))
    }

    pub fn bool(name: &'static str, default: bool) -> Self {
        Self::new(name, OptionKind::Bool, OptionValue::Bool(default))
    }

    pub fn color(name: &'static str, default: ColorSpec) -> Self {
        Self::new(name, OptionKind::Color, OptionValue::Color(default))
    }

    pub fn brightness(name: &'static str, default: f32) -> Self {
        Self::new(name, OptionKind::Brightness, OptionValue::Brightness(default))
    }

    pub fn text(name: &'static str, default: &str) -> Self {
        Self::new(name, OptionKind::Text, OptionValue::Text(default.to_string()))
    }

    pub fn int_list(name: &'static str, default: &[i64]) -> Self {
        Self::new(name, OptionKind::IntList, OptionValue::IntList(default.to_vec()))
    }

    pub fn color_list(name: &'static str, default: Vec<ColorSpec>) -> Self {
        Self::new(name, OptionKind::ColorList, OptionValue::ColorList(default))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn default(&self) -> &OptionValue {
        &self.default
    }
}

/// Ordered set of option fields for one effect. The base schema carries the
/// fields every effect understands; effect modules extend it.
#[derive(Debug, Clone)]
pub struct OptionSchema {
    fields: Vec<OptionField>,
}

impl OptionSchema {
    /// The common fields with the stock inter-iteration delay.
    pub fn base() -> Self {
        Self::base_with_sleep(0.1)
    }

    /// The common fields with an effect-specific default delay.
    pub fn base_with_sleep(sleep_s: f32) -> Self {
        Self {
            fields: vec![
                OptionField::float("sleep_s", sleep_s),
                OptionField::int_list("devices", &[]),
                OptionField::brightness("max_brightness", 1.0),
            ],
        }
    }

    /// Appends a field, builder style.
    pub fn field(mut self, field: OptionField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[OptionField] {
        &self.fields
    }

    /// Builds the final options: defaults, with each override run through its
    /// field's parser. Unknown keys and malformed values fail the merge; no
    /// partially merged options ever escape.
    pub fn merge(&self, overrides: &[(String, String)]) -> Result<EffectOptions> {
        for (key, _) in overrides {
            if !self.fields.iter().any(|field| field.name == key) {
                return Err(EffectError::UnknownOption(key.clone()));
            }
        }

        let mut values = HashMap::with_capacity(self.fields.len());
        for field in &self.fields {
            let raw = overrides
                .iter()
                .rev()
                .find(|(key, _)| key == field.name)
                .map(|(_, value)| value.as_str());
            let value = match raw {
                Some(raw) => {
                    OptionValue::parse(field.kind, raw).map_err(|e| e.for_option(field.name))?
                }
                None => field.default.clone(),
            };
            values.insert(field.name.to_string(), value);
        }
        Ok(EffectOptions { values })
    }
}

/// Immutable configuration bag bound to one running effect. Always carries
/// `sleep_s`, `devices` and `max_brightness`.
#[derive(Debug, Clone)]
pub struct EffectOptions {
    values: HashMap<String, OptionValue>,
}

impl EffectOptions {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(OptionValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(OptionValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(OptionValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn color_spec(&self, name: &str) -> Option<ColorSpec> {
        match self.values.get(name) {
            Some(OptionValue::Color(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn brightness(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(OptionValue::Brightness(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn int_list(&self, name: &str) -> Option<&[i64]> {
        match self.values.get(name) {
            Some(OptionValue::IntList(v)) => Some(v),
            _ => None,
        }
    }

    pub fn color_list(&self, name: &str) -> Option<&[ColorSpec]> {
        match self.values.get(name) {
            Some(OptionValue::ColorList(v)) => Some(v),
            _ => None,
        }
    }

    /// The inter-iteration delay; never negative.
    pub fn sleep(&self) -> Duration {
        Duration::from_secs_f32(self.float("sleep_s").unwrap_or(0.1).max(0.0))
    }

    /// The final uniform brightness scalar applied at push time.
    pub fn max_brightness(&self) -> f32 {
        self.brightness("max_brightness").unwrap_or(1.0)
    }

    /// The configured device selection; an empty list means every device.
    pub fn devices(&self) -> DeviceSelector {
        let indices = self
            .int_list("devices")
            .map(|values| values.iter().map(|v| *v as usize).collect())
            .unwrap_or_default();
        DeviceSelector::from_indices(indices)
    }
}
