use serde::Serialize;

use crate::lifecycle::Effect;
use crate::options::{EffectOptions, OptionSchema};
use crate::{EffectError, Result};

/// Registry metadata for one effect: its name, a one-line summary, its
/// options schema and a constructor over merged options.
#[derive(Clone)]
pub struct EffectDescriptor {
    name: &'static str,
    summary: &'static str,
    schema: OptionSchema,
    build: fn(&EffectOptions) -> Box<dyn Effect>,
}

impl EffectDescriptor {
    pub fn new(
        name: &'static str,
        summary: &'static str,
        schema: OptionSchema,
        build: fn(&EffectOptions) -> Box<dyn Effect>,
    ) -> Self {
        Self {
            name,
            summary,
            schema,
            build,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn summary(&self) -> &'static str {
        self.summary
    }

    pub fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    /// Merges the schema defaults with caller overrides (§ the option string
    /// format: already split into key/value pairs by the front end).
    pub fn merge_options(&self, overrides: &[(String, String)]) -> Result<EffectOptions> {
        self.schema.merge(overrides)
    }

    /// Builds a fresh effect instance bound to merged options.
    pub fn instantiate(&self, options: &EffectOptions) -> Box<dyn Effect> {
        (self.build)(options)
    }

    /// Introspection view of the descriptor.
    pub fn info(&self) -> EffectInfo {
        EffectInfo {
            name: self.name.to_string(),
            summary: self.summary.to_string(),
            options: self
                .schema
                .fields()
                .iter()
                .map(|field| OptionInfo {
                    name: field.name().to_string(),
                    default: field.default().to_string(),
                    accepted: field.kind().accepted_formats().to_string(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for EffectDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectDescriptor")
            .field("name", &self.name)
            .field("summary", &self.summary)
            .field("options", &self.schema.fields().len())
            .finish()
    }
}

/// Introspection surface of one effect, as presented by the front end.
#[derive(Debug, Clone, Serialize)]
pub struct EffectInfo {
    pub name: String,
    pub summary: String,
    pub options: Vec<OptionInfo>,
}

/// One option field: default value and the formats its parser accepts.
#[derive(Debug, Clone, Serialize)]
pub struct OptionInfo {
    pub name: String,
    pub default: String,
    pub accepted: String,
}

/// Name → descriptor mapping, built once at startup and read-only afterwards.
/// Lookup preserves registration order, which is the order `list` reports.
#[derive(Debug, Default)]
pub struct EffectRegistry {
    entries: Vec<EffectDescriptor>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in effect.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        for descriptor in crate::effects::builtin_descriptors() {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Adds one descriptor, failing fast on a duplicate name so integrity
    /// violations surface at startup rather than at run time.
    pub fn register(&mut self, descriptor: EffectDescriptor) -> Result<()> {
        if self
            .entries
            .iter()
            .any(|existing| existing.name() == descriptor.name())
        {
            return Err(EffectError::DuplicateEffect(descriptor.name().to_string()));
        }
        self.entries.push(descriptor);
        Ok(())
    }

    /// Effect names in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.entries.iter().map(EffectDescriptor::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn resolve(&self, name: &str) -> Result<&EffectDescriptor> {
        self.entries
            .iter()
            .find(|descriptor| descriptor.name() == name)
            .ok_or_else(|| EffectError::UnknownEffect(name.to_string()))
    }

    pub fn describe(&self, name: &str) -> Result<EffectInfo> {
        self.resolve(name).map(EffectDescriptor::info)
    }
}
