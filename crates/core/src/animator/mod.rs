//! Timed opacity transitions.
//!
//! The sequencer never touches opacity itself. It asks an [`Animator`] to run
//! a [`Fade`] and resumes when the returned future resolves.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::{Shape, ShapeId};

/// A single opacity transition request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub from: f32,
    pub to: f32,
    pub duration: Duration,
    pub delay: Duration,
}

impl Fade {
    pub fn out(duration: Duration) -> Self {
        Self {
            from: 1.0,
            to: 0.0,
            duration,
            delay: Duration::ZERO,
        }
    }

    pub fn into_view(duration: Duration) -> Self {
        Self {
            from: 0.0,
            to: 1.0,
            duration,
            delay: Duration::ZERO,
        }
    }

    /// Opacity after the fraction `t` (clamped to `[0, 1]`) of the fade.
    pub fn opacity_at(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// How a fade ended. Every call to [`Animator::fade`] resolves exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    Completed,
    Cancelled,
}

/// Runs timed opacity transitions on displayed shapes.
#[async_trait]
pub trait Animator: Send + Sync {
    /// Fades `shape` as described by `fade`.
    ///
    /// Implementations must resolve with [`FadeOutcome::Cancelled`] once
    /// `cancel` fires instead of never resolving.
    async fn fade(&self, shape: &Shape, fade: Fade, cancel: &CancellationToken) -> FadeOutcome;
}

/// Receives the opacity values produced by [`TimedAnimator`].
pub trait OpacityTarget: Send + Sync {
    fn set_opacity(&self, id: ShapeId, opacity: f32);
}

/// Animator driven by the tokio timer.
///
/// The fade is split into evenly spaced frames no longer than
/// `frame_interval`; the last frame always lands exactly on `to`.
pub struct TimedAnimator {
    target: Arc<dyn OpacityTarget>,
    frame_interval: Duration,
}

impl TimedAnimator {
    pub fn new(target: Arc<dyn OpacityTarget>, frame_interval: Duration) -> Self {
        Self {
            target,
            frame_interval: frame_interval.max(Duration::from_millis(1)),
        }
    }

    fn frame_count(&self, duration: Duration) -> u32 {
        let frames = (duration.as_secs_f64() / self.frame_interval.as_secs_f64()).ceil();
        (frames as u32).max(1)
    }
}

#[async_trait]
impl Animator for TimedAnimator {
    async fn fade(&self, shape: &Shape, fade: Fade, cancel: &CancellationToken) -> FadeOutcome {
        if cancel.is_cancelled() {
            return FadeOutcome::Cancelled;
        }

        self.target.set_opacity(shape.id, fade.from);

        if !fade.delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return FadeOutcome::Cancelled,
                _ = sleep(fade.delay) => {}
            }
        }

        if fade.duration.is_zero() {
            self.target.set_opacity(shape.id, fade.to);
            return FadeOutcome::Completed;
        }

        let start = Instant::now();
        let frames = self.frame_count(fade.duration);
        for frame in 1..=frames {
            let deadline = start + fade.duration * frame / frames;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(shape = %shape.id, frame, "fade cancelled");
                    return FadeOutcome::Cancelled;
                }
                _ = sleep_until(deadline) => {}
            }
            self.target
                .set_opacity(shape.id, fade.opacity_at(frame as f32 / frames as f32));
        }

        FadeOutcome::Completed
    }
}

impl std::fmt::Debug for TimedAnimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedAnimator")
            .field("frame_interval", &self.frame_interval)
            .finish()
    }
}
