//! Error types for packspec

use thiserror::Error;

/// Result type for packspec operations
pub type Result<T> = std::result::Result<T, PackspecError>;

/// Errors that can occur while loading or running a specification.
///
/// Only [`PackspecError::Raised`] is attributed to a single feature: the
/// execution engine catches it and turns it into the `"ERROR"` result. Every
/// other variant aborts the specification it occurred in.
#[derive(Error, Debug)]
pub enum PackspecError {
    /// Exception raised by invoked code
    #[error("{0}")]
    Raised(String),

    /// Malformed feature entry
    #[error("Parse error: {0}")]
    Parse(String),

    /// Feature with neither an assignable target nor a readable property
    #[error("Invalid feature '{0}': no assignable target or readable property")]
    InvalidFeature(String),

    /// No registered package answers to the imported identifier
    #[error("Import failed: no package named '{0}'")]
    ImportFailed(String),

    /// Specification asks for an extension set nobody registered
    #[error("Unknown extension: {0}")]
    UnknownExtension(String),

    /// Assignment target could not be resolved
    #[error("Cannot assign {path}: {message}")]
    Assignment { path: String, message: String },

    /// A feature failed while running in exit-first mode
    #[error("Feature failed: {0}")]
    FeatureFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Grammar pattern failed to compile
    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl PackspecError {
    /// Build an exception raised by invoked code
    pub fn raise(message: impl Into<String>) -> Self {
        PackspecError::Raised(message.into())
    }

    /// Whether this error belongs to a single feature rather than the whole run
    pub fn is_raised(&self) -> bool {
        matches!(self, PackspecError::Raised(_))
    }
}
