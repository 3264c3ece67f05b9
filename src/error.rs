use thiserror::Error;

/// A tool control descriptor that cannot be bound. These are setup-time
/// programming errors, reported when the control set is built.
#[derive(Debug, Error, PartialEq)]
pub enum ControlError {
    #[error("control #{index} has an empty name")]
    MissingName { index: usize },

    #[error("control '{0}' is declared twice")]
    DuplicateName(String),

    #[error("slider '{name}' has an invalid range {min}..{max} (step {step})")]
    InvalidRange { name: String, min: f32, max: f32, step: f32 },

    #[error("toggle '{0}' has no options")]
    NoOptions(String),

    #[error("no control named '{0}'")]
    UnknownControl(String),

    #[error("control '{name}' is a {actual}, not a {expected}")]
    WrongKind { name: String, expected: &'static str, actual: &'static str },
}

/// Failure while encoding the main surface for export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Problems reading or writing engine settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected key=value, got '{text}'")]
    Syntax { line: usize, text: String },

    #[error("line {line}: invalid value '{value}' for {key}")]
    InvalidValue { line: usize, key: String, value: String },

    #[error("no settings directory available on this platform")]
    NoConfigDir,
}
