//! Core library for the Shape Morph demo.
//!
//! A single shape morphs between a circle and a rectangle whenever the
//! pointer is pressed or released. The [`MorphSequencer`] owns the current
//! shape and drives the fade-out, swap and fade-in through two collaborators:
//! an [`Animator`] for timed opacity transitions and a [`ShapeFactory`] that
//! creates and removes shapes on the rendering surface. [`SvgStage`] and
//! [`TimedAnimator`] are in-process implementations of both.

pub mod animator;
pub mod config;
pub mod error;
pub mod events;
pub mod factory;
pub mod sequencer;
pub mod shape;
pub mod stage;

pub use animator::{Animator, Fade, FadeOutcome, OpacityTarget, TimedAnimator};
pub use config::{CanvasConfig, FadeConfig, MorphConfig, TriggerPolicy};
pub use error::{MorphError, Result};
pub use events::{parse_script, PointerEvent, TriggerEdges};
pub use factory::ShapeFactory;
pub use sequencer::{Attachment, MorphSequencer, TriggerOutcome};
pub use shape::{
    MorphPhase, MorphState, Position, Shape, ShapeGeometry, ShapeId, ShapeKind, Size,
};
pub use stage::{StageElement, SvgStage};
pub use tokio_util::sync::CancellationToken;
