/// Convenience result type used across cutline.
pub type CutlineResult<T> = Result<T, CutlineError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum CutlineError {
    /// Invalid caller input that cannot be clamped into range.
    #[error("validation error: {0}")]
    Validation(String),

    /// A scene, layer, block, or keyframe id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The timeline has no renderable content (zero or negative duration).
    #[error("invalid timeline: {0}")]
    InvalidTimeline(String),

    /// A source asset is missing or unreadable.
    #[error("asset unavailable: {0}")]
    AssetUnavailable(String),

    /// Image decode, resize, or transform failed.
    #[error("compositing failure: {0}")]
    CompositingFailure(String),

    /// The external encoder failed or returned a non-zero status.
    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    /// An edit would break the main-track or per-layer ordering invariants.
    #[error("structural invariant violation: {0}")]
    StructuralInvariantViolation(String),

    /// The caller cancelled a running export.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CutlineError {
    /// Build a [`CutlineError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CutlineError::NotFound`] value.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a [`CutlineError::InvalidTimeline`] value.
    pub fn invalid_timeline(msg: impl Into<String>) -> Self {
        Self::InvalidTimeline(msg.into())
    }

    /// Build a [`CutlineError::AssetUnavailable`] value.
    pub fn asset_unavailable(msg: impl Into<String>) -> Self {
        Self::AssetUnavailable(msg.into())
    }

    /// Build a [`CutlineError::CompositingFailure`] value.
    pub fn compositing(msg: impl Into<String>) -> Self {
        Self::CompositingFailure(msg.into())
    }

    /// Build a [`CutlineError::EncodingFailure`] value.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::EncodingFailure(msg.into())
    }

    /// Build a [`CutlineError::StructuralInvariantViolation`] value.
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::StructuralInvariantViolation(msg.into())
    }

    /// Build a [`CutlineError::Cancelled`] value.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Build a [`CutlineError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for CutlineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
