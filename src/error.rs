use thiserror::Error;

/// Failures that abort a single identification or enrollment attempt.
///
/// "No match above threshold" and operator cancellation are not errors; they
/// are reported as [`crate::service::Outcome`] variants.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Frame or mask is empty or otherwise unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No foreground shape large enough to describe (empty lens, no contact).
    #[error("no feature found: {0}")]
    NoFeatureFound(String),

    /// Template text could not be decoded into a feature set.
    #[error("malformed template: {0}")]
    MalformedTemplate(String),

    /// Camera absent, busy, or stopped delivering frames.
    #[error("camera device error: {0}")]
    Device(String),

    /// Record store read or write failed.
    #[error("record store error: {0}")]
    Store(String),

    /// Enrollment requested for a student the record store does not know.
    #[error("unknown student: {0}")]
    UnknownStudent(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
