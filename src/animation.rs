//! Time-based animation driver.
//!
//! An [`Animator`] holds any number of [`AnimationRun`]s and advances them once per
//! frame. Each run reports its progress as `elapsed / duration` and fires its
//! completion callback exactly once, on the first frame where the elapsed time
//! reaches the duration. That final progress value is reported unclamped, so it is
//! usually slightly above `1.0`; the built-in effects clamp when they apply it.

use crate::overlay::OverlayHandle;
use crate::ui::Length;

type ProgressFn = Box<dyn FnMut(f32)>;
type CompleteFn = Box<dyn FnOnce()>;

/// Easing functions for the built-in effects.
///
/// These control the acceleration curve of an animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    /// Constant speed throughout.
    #[default]
    Linear,
    /// Start slow, accelerate.
    EaseIn,
    /// Start fast, decelerate.
    EaseOut,
    /// Start slow, speed up, then slow down.
    EaseInOut,
}

impl Easing {
    /// Apply the easing function to a linear progress value (clamped to 0.0..=1.0).
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

/// One percent-based animation loop.
pub struct AnimationRun {
    start_time: f32,
    duration: f32,
    on_progress: ProgressFn,
    on_complete: Option<CompleteFn>,
}

impl AnimationRun {
    fn new(start_time: f32, duration: f32, on_progress: ProgressFn, on_complete: CompleteFn) -> Self {
        Self {
            start_time,
            duration,
            on_progress,
            on_complete: Some(on_complete),
        }
    }

    /// Report progress for `now`. Returns `true` once the run has completed.
    fn step(&mut self, now: f32) -> bool {
        if !(self.duration > 0.0 && self.duration.is_finite()) {
            (self.on_progress)(1.0);
            self.complete();
            return true;
        }

        let elapsed = now - self.start_time;
        (self.on_progress)(elapsed / self.duration);

        if elapsed >= self.duration {
            self.complete();
            true
        } else {
            false
        }
    }

    fn complete(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete();
        }
    }
}

impl std::fmt::Debug for AnimationRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationRun")
            .field("start_time", &self.start_time)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

/// Frame-synchronized scheduler for [`AnimationRun`]s.
///
/// Call [`tick`](Self::tick) once per frame with the current time in seconds.
/// Time never moves backwards inside an animator: an earlier timestamp is treated
/// as a repeat of the latest one, which keeps every run's progress non-decreasing.
#[derive(Debug, Default)]
pub struct Animator {
    now: f32,
    runs: Vec<AnimationRun>,
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the latest tick.
    pub fn now(&self) -> f32 {
        self.now
    }

    /// Start a run at the current time.
    ///
    /// The first progress step happens immediately with `0.0`. A run cannot be
    /// stopped once started; it always proceeds to completion.
    pub fn run(
        &mut self,
        duration: f32,
        on_progress: impl FnMut(f32) + 'static,
        on_complete: impl FnOnce() + 'static,
    ) {
        let mut run = AnimationRun::new(
            self.now,
            duration,
            Box::new(on_progress),
            Box::new(on_complete),
        );
        if !run.step(self.now) {
            self.runs.push(run);
        }
    }

    /// Advance every scheduled run to `now`.
    pub fn tick(&mut self, now: f32) {
        if now > self.now {
            self.now = now;
        }
        let now = self.now;
        self.runs.retain_mut(|run| !run.step(now));
    }

    pub fn active_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn is_idle(&self) -> bool {
        self.runs.is_empty()
    }

    /// Drop every scheduled run without calling its completion.
    pub(crate) fn halt_all(&mut self) -> usize {
        let halted = self.runs.len();
        self.runs.clear();
        halted
    }
}

/// Fade an overlay from opaque to transparent, then remove it.
pub fn fade_out(animator: &mut Animator, overlay: OverlayHandle, duration: f32, easing: Easing) {
    let target = overlay.clone();
    animator.run(
        duration,
        move |percent| target.set_opacity(1.0 - easing.apply(percent)),
        move || {
            overlay.remove();
        },
    );
}

/// Slide an overlay upwards until it has left the view, then remove it.
pub fn slide_to_top(
    animator: &mut Animator,
    overlay: OverlayHandle,
    duration: f32,
    easing: Easing,
) {
    let target = overlay.clone();
    animator.run(
        duration,
        move |percent| target.set_bottom(Length::Percent(easing.apply(percent) * 100.0)),
        move || {
            overlay.remove();
        },
    );
}
