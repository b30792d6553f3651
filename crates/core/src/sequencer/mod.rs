//! The shape morph sequencer.
//!
//! A morph runs three strictly ordered phases: the current shape fades out,
//! it is swapped for a shape of the opposite kind created invisible at the same
//! anchor, and the replacement fades in. Each phase starts only after the
//! previous one has completed.
//!
//! At most one morph is in flight. Triggers that arrive in the meantime are
//! handled by the configured [`TriggerPolicy`].

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::{sync::mpsc, task::JoinHandle, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    Animator, Fade, FadeConfig, FadeOutcome, MorphConfig, MorphError, MorphPhase, MorphState,
    PointerEvent, Result, Shape, ShapeFactory, ShapeKind, TriggerEdges, TriggerPolicy,
};

/// How a call to [`MorphSequencer::trigger`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The morph ran to completion. `cycles` counts the coalesced follow-ups
    /// this call ran on behalf of other callers, plus its own cycle.
    Completed { cycles: usize },
    /// A morph was in flight and the trigger was dropped.
    Debounced,
    /// A morph was in flight and the trigger was queued behind it.
    Coalesced,
    /// The replacement could not be created; the previous shape is current
    /// and visible again. `cycles` counts the cycles this call completed
    /// before the failing one.
    RolledBack { cycles: usize },
    /// The view was disposed mid-morph; remaining phases were skipped.
    /// `cycles` counts the cycles this call completed before that.
    Cancelled { cycles: usize },
}

/// Coordinates the fade-out, swap and fade-in of a single morphing shape.
pub struct MorphSequencer {
    animator: Arc<dyn Animator>,
    factory: Arc<dyn ShapeFactory>,
    fade: FadeConfig,
    policy: TriggerPolicy,
    triggers: TriggerEdges,
    state: Mutex<MorphState>,
    cancel: CancellationToken,
}

impl MorphSequencer {
    /// Creates the sequencer together with its initial, visible circle.
    pub fn new(
        animator: Arc<dyn Animator>,
        factory: Arc<dyn ShapeFactory>,
        config: &MorphConfig,
    ) -> Result<Self> {
        let initial = factory.create(ShapeKind::Circle, true, config.geometry.origin)?;
        tracing::info!(shape = %initial.id, policy = ?config.policy, "morph sequencer ready");
        Ok(Self {
            animator,
            factory,
            fade: config.fade.clone(),
            policy: config.policy,
            triggers: config.triggers,
            state: Mutex::new(MorphState::new(initial)),
            cancel: CancellationToken::new(),
        })
    }

    pub fn current_kind(&self) -> Result<ShapeKind> {
        Ok(self.lock_state()?.current.kind)
    }

    pub fn current_shape(&self) -> Result<Shape> {
        Ok(self.lock_state()?.current.clone())
    }

    pub fn phase(&self) -> Result<MorphPhase> {
        Ok(self.lock_state()?.phase)
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Morphs the current shape into the opposite kind.
    ///
    /// Resolves once the morph (and any follow-up coalesced while it ran) has
    /// completed, or immediately when the trigger is debounced or coalesced.
    /// Returns [`MorphError::Disposed`] after [`dispose`](Self::dispose).
    ///
    /// Dropping the returned future mid-morph abandons the cycle: the
    /// sequencer goes back to `Idle` and a pending follow-up is discarded.
    pub async fn trigger(&self) -> Result<TriggerOutcome> {
        let mut guard = match self.begin() {
            Ok(guard) => guard,
            Err(MorphError::ReentrantTrigger) => return self.defer(),
            Err(err) => return Err(err),
        };

        let mut cycles = 0;
        loop {
            let result = self.run_cycle().await;

            let mut state = self.lock_state()?;
            match result {
                Ok(()) => {
                    cycles += 1;
                    if state.pending && !state.disposed {
                        state.pending = false;
                        state.phase = MorphPhase::FadingOut;
                        tracing::debug!("running coalesced trigger");
                        continue;
                    }
                    state.phase = MorphPhase::Idle;
                    guard.disarm();
                    return Ok(TriggerOutcome::Completed { cycles });
                }
                Err(err) => {
                    state.phase = MorphPhase::Idle;
                    state.pending = false;
                    guard.disarm();
                    return match err {
                        MorphError::CreationFailed { .. } => {
                            Ok(TriggerOutcome::RolledBack { cycles })
                        }
                        MorphError::AnimationCancelled => {
                            tracing::debug!(cycles, "morph aborted");
                            Ok(TriggerOutcome::Cancelled { cycles })
                        }
                        other => Err(other),
                    };
                }
            }
        }
    }

    /// Routes a pointer event: configured edges trigger a morph, hover events
    /// switch the highlight. Returns the trigger outcome when a morph was
    /// requested.
    pub async fn handle_event(&self, event: PointerEvent) -> Result<Option<TriggerOutcome>> {
        match event {
            PointerEvent::Enter => self.set_hovered(true).map(|_| None),
            PointerEvent::Leave => self.set_hovered(false).map(|_| None),
            edge if self.triggers.triggers(edge) => self.trigger().await.map(Some),
            _ => Ok(None),
        }
    }

    /// Applies the hover highlight to the current shape. The flag carries over
    /// to replacements created while the pointer stays inside.
    pub fn set_hovered(&self, hovered: bool) -> Result<()> {
        let mut state = self.lock_state()?;
        if state.disposed {
            return Err(MorphError::Disposed);
        }
        state.highlighted = hovered;
        self.factory.set_highlight(&state.current, hovered);
        Ok(())
    }

    /// Subscribes to a trigger source.
    ///
    /// Hover events are applied in arrival order. Each trigger edge runs on
    /// its own task so that triggers arriving mid-morph reach the policy
    /// instead of waiting in the channel. Must be called inside a tokio
    /// runtime.
    pub fn attach(self: &Arc<Self>, mut events: mpsc::Receiver<PointerEvent>) -> Attachment {
        let sequencer = Arc::clone(self);
        let stop = self.cancel.child_token();
        let pump_stop = stop.clone();

        let pump = tokio::spawn(async move {
            let mut inflight: JoinSet<Result<TriggerOutcome>> = JoinSet::new();
            loop {
                tokio::select! {
                    biased;
                    _ = pump_stop.cancelled() => {
                        inflight.detach_all();
                        tracing::debug!("trigger source detached");
                        return;
                    }
                    Some(joined) = inflight.join_next() => log_joined(joined),
                    event = events.recv() => match event {
                        Some(PointerEvent::Enter) | Some(PointerEvent::Leave) => {
                            let hovered = event == Some(PointerEvent::Enter);
                            if let Err(err) = sequencer.set_hovered(hovered) {
                                tracing::debug!(%err, "hover event dropped");
                            }
                        }
                        Some(edge) if sequencer.triggers.triggers(edge) => {
                            let sequencer = Arc::clone(&sequencer);
                            inflight.spawn(async move { sequencer.trigger().await });
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }

            // Source closed: let in-flight morphs settle.
            loop {
                tokio::select! {
                    biased;
                    _ = pump_stop.cancelled() => {
                        inflight.detach_all();
                        return;
                    }
                    joined = inflight.join_next() => match joined {
                        Some(joined) => log_joined(joined),
                        None => return,
                    },
                }
            }
        });

        Attachment { stop, pump }
    }

    /// Tears the sequencer down. Any in-flight fade resolves as cancelled and
    /// no further stage mutation happens. Calling it again is a no-op.
    pub fn dispose(&self) {
        self.cancel.cancel();
        match self.lock_state() {
            Ok(mut state) => {
                if !state.disposed {
                    state.disposed = true;
                    state.pending = false;
                    tracing::info!(phase = ?state.phase, "morph sequencer disposed");
                }
            }
            Err(err) => tracing::warn!(%err, "dispose could not reach sequencer state"),
        }
    }

    fn begin(&self) -> Result<CycleGuard<'_>> {
        let mut state = self.lock_state()?;
        if state.disposed {
            return Err(MorphError::Disposed);
        }
        if !state.is_idle() {
            return Err(MorphError::ReentrantTrigger);
        }
        state.phase = MorphPhase::FadingOut;
        Ok(CycleGuard {
            sequencer: self,
            armed: true,
        })
    }

    fn defer(&self) -> Result<TriggerOutcome> {
        let mut state = self.lock_state()?;
        tracing::debug!(phase = ?state.phase, policy = ?self.policy, "trigger arrived mid-morph");
        Ok(match self.policy {
            TriggerPolicy::Debounce => TriggerOutcome::Debounced,
            TriggerPolicy::Coalesce => {
                state.pending = true;
                TriggerOutcome::Coalesced
            }
        })
    }

    async fn run_cycle(&self) -> Result<()> {
        let old = self.lock_live()?.current.clone();
        let target = old.kind.opposite();
        tracing::debug!(from = %old.kind, to = %target, "morph started");

        self.await_fade(
            &old,
            Fade::out(self.fade.duration()).with_delay(self.fade.delay()),
        )
        .await?;

        let old = {
            let mut state = self.lock_live()?;
            state.current.visible = false;
            state.phase = MorphPhase::Swapped;
            state.current.clone()
        };

        let replacement = match self.factory.create(target, false, old.position) {
            Ok(shape) => shape,
            Err(err) => {
                let err = match err {
                    err @ MorphError::CreationFailed { .. } => err,
                    other => MorphError::creation_failed(target, other.to_string()),
                };
                tracing::warn!(%err, "restoring previous shape");
                self.restore(&old).await;
                return Err(err);
            }
        };

        {
            let mut state = self.lock_state()?;
            if state.disposed || self.cancel.is_cancelled() {
                drop(state);
                self.factory.remove(&replacement);
                return Err(MorphError::AnimationCancelled);
            }
            self.factory.remove(&old);
            if state.highlighted {
                self.factory.set_highlight(&replacement, true);
            }
            state.current = replacement.clone();
            state.phase = MorphPhase::FadingIn;
        }

        self.await_fade(
            &replacement,
            Fade::into_view(self.fade.duration()).with_delay(self.fade.delay()),
        )
        .await?;

        self.lock_live()?.current.visible = true;
        tracing::debug!(kind = %target, shape = %replacement.id, "morph completed");
        Ok(())
    }

    /// Snaps a faded-out shape back to full opacity.
    async fn restore(&self, shape: &Shape) {
        if self.await_fade(shape, Fade::into_view(Default::default())).await.is_ok() {
            if let Ok(mut state) = self.lock_state() {
                state.current.visible = true;
            }
        }
    }

    async fn await_fade(&self, shape: &Shape, fade: Fade) -> Result<()> {
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => FadeOutcome::Cancelled,
            outcome = self.animator.fade(shape, fade, &self.cancel) => outcome,
        };

        match outcome {
            FadeOutcome::Completed if !self.cancel.is_cancelled() => Ok(()),
            _ => Err(MorphError::AnimationCancelled),
        }
    }

    /// Locks the state, failing with `AnimationCancelled` once disposed.
    fn lock_live(&self) -> Result<MutexGuard<'_, MorphState>> {
        let state = self.lock_state()?;
        if state.disposed {
            return Err(MorphError::AnimationCancelled);
        }
        Ok(state)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, MorphState>> {
        self.state
            .lock()
            .map_err(|_| MorphError::Poisoned("morph state"))
    }
}

/// Returns the sequencer to `Idle` if a cycle is abandoned before it
/// settles, e.g. when the caller drops the `trigger` future.
struct CycleGuard<'a> {
    sequencer: &'a MorphSequencer,
    armed: bool,
}

impl CycleGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.sequencer.lock_state() {
            tracing::debug!(phase = ?state.phase, "morph abandoned mid-cycle");
            state.phase = MorphPhase::Idle;
            state.pending = false;
        }
    }
}

fn log_joined(joined: std::result::Result<Result<TriggerOutcome>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(outcome)) => tracing::debug!(?outcome, "trigger settled"),
        Ok(Err(err)) => tracing::debug!(%err, "trigger rejected"),
        Err(err) => tracing::warn!(%err, "trigger task failed"),
    }
}

impl std::fmt::Debug for MorphSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MorphSequencer")
            .field("policy", &self.policy)
            .field("fade", &self.fade)
            .field("disposed", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Subscription of a sequencer to a trigger source.
#[derive(Debug)]
pub struct Attachment {
    stop: CancellationToken,
    pump: JoinHandle<()>,
}

impl Attachment {
    /// Stops listening for events. Morphs already in flight run to completion.
    pub fn detach(&self) {
        self.stop.cancel();
    }

    /// Waits until the source has closed and every in-flight morph settled,
    /// or until the attachment was detached.
    pub async fn join(self) -> Result<()> {
        self.pump
            .await
            .map_err(|err| MorphError::msg(format!("event pump failed: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU64, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;
    use crate::{Position, ShapeGeometry, ShapeId};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Fade {
            kind: ShapeKind,
            from: f32,
            to: f32,
            duration: Duration,
        },
        Create {
            kind: ShapeKind,
            visible: bool,
            position: Position,
        },
        Remove(ShapeKind),
        Highlight(ShapeKind, bool),
    }

    type Log = Arc<Mutex<Vec<Call>>>;

    fn fade_call(shape: &Shape, fade: &Fade) -> Call {
        Call::Fade {
            kind: shape.kind,
            from: fade.from,
            to: fade.to,
            duration: fade.duration,
        }
    }

    /// Resolves each fade after sleeping for its duration.
    struct SleepingAnimator {
        log: Log,
    }

    #[async_trait]
    impl Animator for SleepingAnimator {
        async fn fade(&self, shape: &Shape, fade: Fade, cancel: &CancellationToken) -> FadeOutcome {
            self.log.lock().unwrap().push(fade_call(shape, &fade));
            tokio::select! {
                _ = cancel.cancelled() => FadeOutcome::Cancelled,
                _ = tokio::time::sleep(fade.duration) => FadeOutcome::Completed,
            }
        }
    }

    /// Hands every fade to the test, which decides when and how it ends.
    struct GatedAnimator {
        log: Log,
        requests: mpsc::UnboundedSender<oneshot::Sender<FadeOutcome>>,
    }

    #[async_trait]
    impl Animator for GatedAnimator {
        async fn fade(&self, shape: &Shape, fade: Fade, _cancel: &CancellationToken) -> FadeOutcome {
            self.log.lock().unwrap().push(fade_call(shape, &fade));
            let (tx, rx) = oneshot::channel();
            if self.requests.send(tx).is_err() {
                return FadeOutcome::Cancelled;
            }
            rx.await.unwrap_or(FadeOutcome::Cancelled)
        }
    }

    struct RecordingFactory {
        log: Log,
        next_id: AtomicU64,
        fail_next: Mutex<Option<String>>,
        dispose_on_create: Mutex<Option<Arc<MorphSequencer>>>,
    }

    impl RecordingFactory {
        fn new(log: Log) -> Self {
            Self {
                log,
                next_id: AtomicU64::new(0),
                fail_next: Mutex::new(None),
                dispose_on_create: Mutex::new(None),
            }
        }
    }

    impl ShapeFactory for RecordingFactory {
        fn create(&self, kind: ShapeKind, visible: bool, position: Position) -> Result<Shape> {
            self.log.lock().unwrap().push(Call::Create {
                kind,
                visible,
                position,
            });
            if let Some(reason) = self.fail_next.lock().unwrap().take() {
                return Err(MorphError::creation_failed(kind, reason));
            }
            if let Some(sequencer) = self.dispose_on_create.lock().unwrap().take() {
                sequencer.dispose();
            }
            Ok(Shape {
                id: ShapeId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
                kind,
                visible,
                position,
                size: ShapeGeometry::default().size_of(kind),
            })
        }

        fn remove(&self, shape: &Shape) {
            self.log.lock().unwrap().push(Call::Remove(shape.kind));
        }

        fn set_highlight(&self, shape: &Shape, highlighted: bool) {
            self.log
                .lock()
                .unwrap()
                .push(Call::Highlight(shape.kind, highlighted));
        }
    }

    fn config(policy: TriggerPolicy) -> MorphConfig {
        MorphConfig {
            policy,
            ..MorphConfig::default()
        }
    }

    fn sleeping(policy: TriggerPolicy) -> (Arc<MorphSequencer>, Arc<RecordingFactory>, Log) {
        let log = Log::default();
        let factory = Arc::new(RecordingFactory::new(log.clone()));
        let animator = Arc::new(SleepingAnimator { log: log.clone() });
        let sequencer =
            MorphSequencer::new(animator, factory.clone(), &config(policy)).unwrap();
        log.lock().unwrap().clear();
        (Arc::new(sequencer), factory, log)
    }

    fn gated() -> (
        Arc<MorphSequencer>,
        mpsc::UnboundedReceiver<oneshot::Sender<FadeOutcome>>,
        Log,
    ) {
        let log = Log::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let factory = Arc::new(RecordingFactory::new(log.clone()));
        let animator = Arc::new(GatedAnimator {
            log: log.clone(),
            requests: tx,
        });
        let sequencer =
            MorphSequencer::new(animator, factory, &config(TriggerPolicy::Coalesce)).unwrap();
        log.lock().unwrap().clear();
        (Arc::new(sequencer), rx, log)
    }

    fn creates(log: &Log) -> usize {
        log.lock()
            .unwrap()
            .iter()
            .filter(|call| matches!(call, Call::Create { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn kind_alternates_with_each_completed_trigger() {
        let (sequencer, _, _) = sleeping(TriggerPolicy::Debounce);
        assert_eq!(sequencer.current_kind().unwrap(), ShapeKind::Circle);

        for n in 1..=5 {
            let outcome = sequencer.trigger().await.unwrap();
            assert_eq!(outcome, TriggerOutcome::Completed { cycles: 1 });
            let expected = if n % 2 == 0 {
                ShapeKind::Circle
            } else {
                ShapeKind::Rectangle
            };
            assert_eq!(sequencer.current_kind().unwrap(), expected);
            assert_eq!(sequencer.phase().unwrap(), MorphPhase::Idle);
            assert!(sequencer.current_shape().unwrap().visible);
        }
    }

    #[tokio::test]
    async fn phases_follow_fade_out_swap_fade_in() {
        let (sequencer, mut fades, log) = gated();
        let task = tokio::spawn({
            let sequencer = Arc::clone(&sequencer);
            async move { sequencer.trigger().await }
        });

        let fade_out = fades.recv().await.unwrap();
        assert_eq!(sequencer.phase().unwrap(), MorphPhase::FadingOut);
        assert_eq!(
            log.lock().unwrap().clone(),
            vec![Call::Fade {
                kind: ShapeKind::Circle,
                from: 1.0,
                to: 0.0,
                duration: Duration::from_millis(200),
            }]
        );
        assert_eq!(creates(&log), 0);
        fade_out.send(FadeOutcome::Completed).unwrap();

        let fade_in = fades.recv().await.unwrap();
        assert_eq!(sequencer.phase().unwrap(), MorphPhase::FadingIn);
        assert_eq!(
            log.lock().unwrap()[1..].to_vec(),
            vec![
                Call::Create {
                    kind: ShapeKind::Rectangle,
                    visible: false,
                    position: Position::new(0.0, 0.0),
                },
                Call::Remove(ShapeKind::Circle),
                Call::Fade {
                    kind: ShapeKind::Rectangle,
                    from: 0.0,
                    to: 1.0,
                    duration: Duration::from_millis(200),
                },
            ]
        );
        assert!(!sequencer.current_shape().unwrap().visible);
        fade_in.send(FadeOutcome::Completed).unwrap();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, TriggerOutcome::Completed { cycles: 1 });
        assert_eq!(sequencer.current_kind().unwrap(), ShapeKind::Rectangle);
        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_runs_a_single_cycle_for_rapid_triggers() {
        let (sequencer, _, log) = sleeping(TriggerPolicy::Debounce);

        let (a, b, c) = tokio::join!(sequencer.trigger(), sequencer.trigger(), sequencer.trigger());

        assert_eq!(a.unwrap(), TriggerOutcome::Completed { cycles: 1 });
        assert_eq!(b.unwrap(), TriggerOutcome::Debounced);
        assert_eq!(c.unwrap(), TriggerOutcome::Debounced);
        assert_eq!(creates(&log), 1);
        assert_eq!(sequencer.current_kind().unwrap(), ShapeKind::Rectangle);
    }

    #[tokio::test(start_paused = true)]
    async fn coalesce_runs_exactly_one_follow_up() {
        let (sequencer, _, log) = sleeping(TriggerPolicy::Coalesce);

        let (a, b, c) = tokio::join!(sequencer.trigger(), sequencer.trigger(), sequencer.trigger());

        assert_eq!(a.unwrap(), TriggerOutcome::Completed { cycles: 2 });
        assert_eq!(b.unwrap(), TriggerOutcome::Coalesced);
        assert_eq!(c.unwrap(), TriggerOutcome::Coalesced);
        assert_eq!(creates(&log), 2);
        assert_eq!(sequencer.current_kind().unwrap(), ShapeKind::Circle);
        assert_eq!(sequencer.phase().unwrap(), MorphPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn creation_failure_restores_previous_shape() {
        let (sequencer, factory, log) = sleeping(TriggerPolicy::Coalesce);
        *factory.fail_next.lock().unwrap() = Some("no canvas".to_string());

        let outcome = sequencer.trigger().await.unwrap();

        assert_eq!(outcome, TriggerOutcome::RolledBack { cycles: 0 });
        let current = sequencer.current_shape().unwrap();
        assert_eq!(current.kind, ShapeKind::Circle);
        assert!(current.visible);
        assert_eq!(sequencer.phase().unwrap(), MorphPhase::Idle);

        let calls = log.lock().unwrap().clone();
        assert!(!calls.contains(&Call::Remove(ShapeKind::Circle)));
        assert_eq!(
            calls.last(),
            Some(&Call::Fade {
                kind: ShapeKind::Circle,
                from: 0.0,
                to: 1.0,
                duration: Duration::ZERO,
            })
        );

        let outcome = sequencer.trigger().await.unwrap();
        assert_eq!(outcome, TriggerOutcome::Completed { cycles: 1 });
        assert_eq!(sequencer.current_kind().unwrap(), ShapeKind::Rectangle);
    }

    #[tokio::test(start_paused = true)]
    async fn coalesced_follow_up_rollback_reports_completed_cycles() {
        let (sequencer, factory, _) = sleeping(TriggerPolicy::Coalesce);

        let (a, b, _) = tokio::join!(sequencer.trigger(), sequencer.trigger(), async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            *factory.fail_next.lock().unwrap() = Some("no canvas".to_string());
        });

        assert_eq!(a.unwrap(), TriggerOutcome::RolledBack { cycles: 1 });
        assert_eq!(b.unwrap(), TriggerOutcome::Coalesced);
        let current = sequencer.current_shape().unwrap();
        assert_eq!(current.kind, ShapeKind::Rectangle);
        assert!(current.visible);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trigger_returns_the_sequencer_to_idle() {
        let (sequencer, _, _) = sleeping(TriggerPolicy::Coalesce);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), sequencer.trigger()).await;
        assert!(timed_out.is_err());
        assert_eq!(sequencer.phase().unwrap(), MorphPhase::Idle);

        let outcome = sequencer.trigger().await.unwrap();
        assert_eq!(outcome, TriggerOutcome::Completed { cycles: 1 });
        assert_eq!(sequencer.current_kind().unwrap(), ShapeKind::Rectangle);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_trigger_task_discards_pending_follow_up() {
        let (sequencer, _, log) = sleeping(TriggerPolicy::Coalesce);
        let task = tokio::spawn({
            let sequencer = Arc::clone(&sequencer);
            async move { sequencer.trigger().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            sequencer.trigger().await.unwrap(),
            TriggerOutcome::Coalesced
        );

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        let state = sequencer.lock_state().unwrap().clone();
        assert_eq!(state.phase, MorphPhase::Idle);
        assert!(!state.pending);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(creates(&log), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_during_swap_keeps_the_old_shape_current() {
        let (sequencer, factory, log) = sleeping(TriggerPolicy::Coalesce);
        let initial = sequencer.current_shape().unwrap();
        *factory.dispose_on_create.lock().unwrap() = Some(Arc::clone(&sequencer));

        let outcome = sequencer.trigger().await.unwrap();

        assert_eq!(outcome, TriggerOutcome::Cancelled { cycles: 0 });
        assert_eq!(sequencer.current_shape().unwrap().id, initial.id);
        let calls = log.lock().unwrap().clone();
        assert_eq!(
            calls[1..].to_vec(),
            vec![
                Call::Create {
                    kind: ShapeKind::Rectangle,
                    visible: false,
                    position: Position::new(0.0, 0.0),
                },
                Call::Remove(ShapeKind::Rectangle),
            ]
        );
        assert!(!calls.contains(&Call::Remove(ShapeKind::Circle)));
    }

    #[tokio::test]
    async fn dispose_mid_fade_cancels_without_further_mutation() {
        let (sequencer, mut fades, log) = gated();
        let task = tokio::spawn({
            let sequencer = Arc::clone(&sequencer);
            async move { sequencer.trigger().await }
        });

        let _pending_fade_out = fades.recv().await.unwrap();
        sequencer.dispose();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, TriggerOutcome::Cancelled { cycles: 0 });
        assert_eq!(creates(&log), 0);
        assert_eq!(sequencer.current_kind().unwrap(), ShapeKind::Circle);
        assert!(matches!(
            sequencer.trigger().await,
            Err(MorphError::Disposed)
        ));
    }

    #[tokio::test]
    async fn animator_cancellation_aborts_remaining_phases() {
        let (sequencer, mut fades, log) = gated();
        let task = tokio::spawn({
            let sequencer = Arc::clone(&sequencer);
            async move { sequencer.trigger().await }
        });

        fades
            .recv()
            .await
            .unwrap()
            .send(FadeOutcome::Cancelled)
            .unwrap();

        assert_eq!(
            task.await.unwrap().unwrap(),
            TriggerOutcome::Cancelled { cycles: 0 }
        );
        assert_eq!(creates(&log), 0);
        assert_eq!(sequencer.phase().unwrap(), MorphPhase::Idle);
    }

    #[test]
    fn dispose_is_idempotent() {
        let (sequencer, _, _) = sleeping(TriggerPolicy::Debounce);
        sequencer.dispose();
        sequencer.dispose();
        assert!(sequencer.is_disposed());
        assert!(matches!(
            sequencer.set_hovered(true),
            Err(MorphError::Disposed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hover_highlight_follows_the_replacement() {
        let (sequencer, _, log) = sleeping(TriggerPolicy::Coalesce);

        assert_eq!(sequencer.handle_event(PointerEvent::Enter).await.unwrap(), None);
        let outcome = sequencer.handle_event(PointerEvent::Down).await.unwrap();
        assert_eq!(outcome, Some(TriggerOutcome::Completed { cycles: 1 }));

        let calls = log.lock().unwrap().clone();
        assert_eq!(calls[0], Call::Highlight(ShapeKind::Circle, true));
        assert!(calls.contains(&Call::Highlight(ShapeKind::Rectangle, true)));
    }

    #[tokio::test(start_paused = true)]
    async fn attached_source_coalesces_press_and_release() {
        let (sequencer, _, log) = sleeping(TriggerPolicy::Coalesce);
        let (tx, rx) = mpsc::channel(8);
        let attachment = sequencer.attach(rx);

        tx.send(PointerEvent::Down).await.unwrap();
        tx.send(PointerEvent::Up).await.unwrap();
        drop(tx);
        attachment.join().await.unwrap();

        assert_eq!(creates(&log), 2);
        assert_eq!(sequencer.current_kind().unwrap(), ShapeKind::Circle);
        assert_eq!(sequencer.phase().unwrap(), MorphPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_source_stops_delivering_triggers() {
        let (sequencer, _, log) = sleeping(TriggerPolicy::Coalesce);
        let (tx, rx) = mpsc::channel(8);
        let attachment = sequencer.attach(rx);

        attachment.detach();
        attachment.join().await.unwrap();
        let _ = tx.send(PointerEvent::Down).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(creates(&log), 0);
        assert_eq!(sequencer.current_kind().unwrap(), ShapeKind::Circle);
    }
}
