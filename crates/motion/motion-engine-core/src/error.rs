//! Error types for the motion engine

use serde::{Deserialize, Serialize};

use crate::ids::AnimationId;
use crate::recovery::ErrorType;

/// Every failure the engine can report, at construction time or mid-flight.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnimationError {
    /// Target element is not attached to a live surface
    #[error("Invalid element: {reason}")]
    InvalidElement { reason: String },

    /// A configuration value failed validation
    #[error("Invalid {field}: {value} ({reason})")]
    InvalidConfig {
        field: String,
        value: f64,
        reason: String,
    },

    /// Keyframe animation needs at least two frames
    #[error("Keyframe animation requires at least 2 keyframes, got {count}")]
    NotEnoughKeyframes { count: usize },

    /// No queued animation with this id
    #[error("Animation not found: {id}")]
    AnimationNotFound { id: AnimationId },

    /// Element went away while an animator was still driving it
    #[error("Element detached during animation {id}")]
    ElementDetached { id: AnimationId },

    /// Easing function failed or produced a non-finite value
    #[error("Easing '{name}' failed: {reason}")]
    EasingFailed { name: String, reason: String },

    /// Computed transform matrix could not be parsed
    #[error("Transform parse error: {reason}")]
    TransformParse { reason: String },

    /// Frame work blew past the budget the engine could recover
    #[error("Performance degraded: {metric} = {value} (threshold: {threshold})")]
    PerformanceDegraded {
        metric: String,
        value: f64,
        threshold: f64,
    },

    /// Engine-level failure (frame loop, scheduler bookkeeping)
    #[error("Engine error: {message}")]
    Engine { message: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },
}

impl AnimationError {
    /// Create a generic engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Shorthand for a rejected config value
    pub fn invalid_config(field: impl Into<String>, value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            value,
            reason: reason.into(),
        }
    }

    /// Whether the recovery manager should attempt a repair before falling back.
    ///
    /// Construction-time failures are never recoverable: they are returned to the
    /// caller synchronously.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ElementDetached { .. }
                | Self::EasingFailed { .. }
                | Self::TransformParse { .. }
                | Self::PerformanceDegraded { .. }
                | Self::Engine { .. }
        )
    }

    /// Recovery taxonomy bucket for this error
    #[inline]
    pub fn category(&self) -> ErrorType {
        match self {
            Self::InvalidElement { .. }
            | Self::InvalidConfig { .. }
            | Self::NotEnoughKeyframes { .. }
            | Self::ElementDetached { .. }
            | Self::EasingFailed { .. } => ErrorType::Animation,
            Self::TransformParse { .. } => ErrorType::Transform,
            Self::PerformanceDegraded { .. } => ErrorType::Performance,
            Self::AnimationNotFound { .. } | Self::Engine { .. } | Self::SerializationError { .. } => {
                ErrorType::Engine
            }
        }
    }
}

impl From<serde_json::Error> for AnimationError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            reason: err.to_string(),
        }
    }
}
