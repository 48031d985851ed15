//! Motion Engine Core
//!
//! A frame-driven animation engine: tweens, springs, keyframes and free-body
//! physics advanced against host elements under a live performance budget, with
//! typed error recovery. Single-threaded; the host drives it one display refresh
//! at a time through [`MotionEngine::on_frame`].

pub mod animator;
pub mod config;
pub mod easing;
pub mod element;
pub mod engine;
pub mod error;
pub mod event;
pub mod ids;
pub mod profiler;
pub mod recovery;
pub mod scheduler;
pub mod time;
pub mod transform;

// Re-export common types for convenience
pub use animator::{
    Animator, AnimatorKind, AnimatorState, KeyframeAnimator, PhysicsAnimator, SpringAnimator,
    TickOutcome, TweenAnimator,
};
pub use config::{
    AnimationConfig, AnimationOptions, Boundary, Direction, EngineConfig, FillMode,
    PerformanceMode, PhysicsConfig, ProfilerConfig, RecoveryConfig, Repeat, SchedulerConfig,
    SpringConfig, TransformCacheConfig, PHYSICS_HARD_CAP_MS,
};
pub use easing::{CubicBezier, Easing, EasingFunction, EasingLibrary, FnEasing, SpringEasing};
pub use element::{Element, ElementRef, HeadlessElement, Rect, RenderHint, Viewport};
pub use engine::{EngineDiagnostics, FrameRequester, MotionEngine, Visibility};
pub use error::AnimationError;
pub use event::{AnimationEvent, AnimationOutcome, Completion, EngineNotice, EventKind};
pub use ids::{AnimationId, ErrorId, IdAllocator};
pub use profiler::{PerformanceMetrics, PerformanceProfiler};
pub use recovery::{
    ErrorContext, ErrorRecord, ErrorType, FallbackAction, RecoveryManager, RecoveryStrategy,
    Severity,
};
pub use scheduler::{AnimationQueueItem, AnimationScheduler, PriorityBand};
pub use time::{Clock, ClockRef, ManualClock, SystemClock};
pub use transform::{Channel, Transform, TransformProcessor};

/// Motion engine result type
pub type Result<T> = core::result::Result<T, AnimationError>;
