/// Result alias that carries the crate-wide [`EffectError`] type.
pub type Result<T> = std::result::Result<T, EffectError>;

/// Common error type for the effect engine.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    /// The device sink could not be reached. Fatal to the run; retry policy
    /// is left to the caller.
    #[error("connection to device sink failed: {0}")]
    Connection(String),

    /// No effect registered under the requested name.
    #[error("unknown effect `{0}`")]
    UnknownEffect(String),

    /// An override key that no field of the effect's schema matches.
    #[error("unknown option `{0}`")]
    UnknownOption(String),

    /// A device index outside the sink's device list. Reported per index and
    /// dropped; the remaining selection proceeds.
    #[error("device index {index} out of range ({available} devices available)")]
    UnknownDevice { index: usize, available: usize },

    #[error("invalid color `{0}`")]
    InvalidColorFormat(String),

    #[error("invalid brightness `{0}`")]
    InvalidBrightnessFormat(String),

    /// A value that failed its kind parser, outside of color/brightness.
    #[error("invalid {expected} `{value}`")]
    InvalidValue {
        expected: &'static str,
        value: String,
    },

    /// A malformed option value, annotated with the field it was meant for.
    #[error("invalid value for option `{field}`: {source}")]
    InvalidOption {
        field: String,
        #[source]
        source: Box<EffectError>,
    },

    /// Two effects registered under the same name. Raised while the registry
    /// is built, never at run time.
    #[error("effect `{0}` is already registered")]
    DuplicateEffect(String),

    /// Transient capture failure; the current iteration is skipped.
    #[error("capture error: {0}")]
    Capture(String),

    /// The sink dropped mid-run. Ends the run through an orderly teardown.
    #[error("device sink disconnected")]
    SinkDisconnected,

    /// Spectrum computation failure.
    #[error("fft error: {0}")]
    Fft(#[from] realfft::FftError),

    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl EffectError {
    /// Whether a failure inside the iteration hook should end the run
    /// instead of skipping the current tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SinkDisconnected | Self::Connection(_))
    }

    /// Annotates an error with the option field it was produced for.
    pub fn for_option(self, field: &str) -> Self {
        Self::InvalidOption {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fatal_errors() {
        assert!(EffectError::SinkDisconnected.is_fatal());
        assert!(EffectError::Connection("refused".into()).is_fatal());
        assert!(!EffectError::Capture("glitch".into()).is_fatal());
        assert!(!EffectError::UnknownEffect("Nope".into()).is_fatal());
    }

    #[test]
    fn option_annotation_names_the_field() {
        let err = EffectError::InvalidColorFormat("blurple".into()).for_option("color");
        let rendered = format!("{err}");
        assert!(rendered.contains("color"));
        assert!(rendered.contains("blurple"));
    }
}
