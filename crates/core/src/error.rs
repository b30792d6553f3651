use crate::ShapeKind;

/// Result alias that carries the custom [`MorphError`] type.
pub type Result<T> = std::result::Result<T, MorphError>;

/// Common error type for the core crate.
///
/// None of these are fatal to the hosting process. The sequencer recovers
/// from `CreationFailed` and `AnimationCancelled` locally and folds
/// `ReentrantTrigger` into its trigger policy.
#[derive(Debug, thiserror::Error)]
pub enum MorphError {
    /// The shape factory could not produce a replacement shape.
    #[error("failed to create {kind:?} shape: {reason}")]
    CreationFailed { kind: ShapeKind, reason: String },
    /// The animator resolved a fade as cancelled, usually because the owning
    /// view was disposed mid-fade.
    #[error("animation was cancelled")]
    AnimationCancelled,
    /// A trigger arrived while a morph cycle was still in flight.
    #[error("a morph is already in flight")]
    ReentrantTrigger,
    /// The sequencer has been disposed and no longer accepts work.
    #[error("sequencer has been disposed")]
    Disposed,
    /// A shared lock was poisoned by a panicking holder.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    /// Configuration could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl MorphError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn creation_failed(kind: ShapeKind, reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            kind,
            reason: reason.into(),
        }
    }
}

impl From<&str> for MorphError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MorphError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
