//! Time-driven tweens.
//!
//! A [`Tweener`] owns every running tween and advances them from an
//! externally supplied clock; nothing here reads wall-clock time. Each
//! tween writes its value into a caller-owned context `C` through an
//! update callback, so the registry never holds references into the
//! objects it animates.

use log::trace;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::error::{EyeError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    SineInOut,
}

impl Easing {
    /// Map linear progress to eased progress. Input is clamped to [0, 1],
    /// and every curve is monotonic with `apply(0) == 0`, `apply(1) == 1`.
    pub fn apply(self, t: f32) -> f32 {
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
            Easing::SineInOut => 0.5 * (1.0 - (std::f32::consts::PI * t).cos()),
        }
    }
}

/// Values a tween can interpolate.
pub trait Tweenable: Copy + 'static {
    /// Point at fraction `t` on the straight path from `self` to `to`.
    fn lerp(self, to: Self, t: f32) -> Self;
}

impl Tweenable for f32 {
    fn lerp(self, to: Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl<const N: usize> Tweenable for [f32; N] {
    fn lerp(self, to: Self, t: f32) -> Self {
        let mut out = self;
        for (o, target) in out.iter_mut().zip(to) {
            *o += (target - *o) * t;
        }
        out
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Repeat {
    /// Play once and stop on the target value.
    #[default]
    Once,
    /// Bounce between source and target until stopped.
    YoyoForever,
}

new_key_type! {
    /// Handle to a running tween. Stale handles are harmless.
    pub struct TweenId;
}

enum Progress {
    Running,
    Finished,
}

trait Drive<C> {
    fn drive(&mut self, now_ms: f64, ctx: &mut C) -> Progress;
}

struct Tween<C, V> {
    from: V,
    to: V,
    duration_ms: f64,
    easing: Easing,
    repeat: Repeat,
    started_at: f64,
    on_update: Box<dyn FnMut(&mut C, V)>,
}

impl<C, V: Tweenable> Drive<C> for Tween<C, V> {
    fn drive(&mut self, now_ms: f64, ctx: &mut C) -> Progress {
        let elapsed = (now_ms - self.started_at).max(0.0);
        match self.repeat {
            Repeat::Once => {
                if elapsed >= self.duration_ms {
                    (self.on_update)(ctx, self.to);
                    return Progress::Finished;
                }
                let t = self.easing.apply((elapsed / self.duration_ms) as f32);
                (self.on_update)(ctx, self.from.lerp(self.to, t));
                Progress::Running
            }
            Repeat::YoyoForever => {
                let cycles = elapsed / self.duration_ms;
                let whole = cycles.floor();
                let t = self.easing.apply((cycles - whole) as f32);
                let value = if (whole as u64) % 2 == 0 {
                    self.from.lerp(self.to, t)
                } else {
                    self.to.lerp(self.from, t)
                };
                (self.on_update)(ctx, value);
                Progress::Running
            }
        }
    }
}

/// Registry of running tweens, advanced once per frame by the host.
pub struct Tweener<C> {
    now_ms: f64,
    tweens: SlotMap<TweenId, Box<dyn Drive<C>>>,
}

impl<C: 'static> Tweener<C> {
    pub fn new() -> Self {
        Self {
            now_ms: 0.0,
            tweens: SlotMap::with_key(),
        }
    }

    /// Current registry clock in milliseconds.
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Start animating from `from` to `to` over `duration_ms`.
    ///
    /// The tween's clock starts at the registry's current time; the first
    /// `on_update` fires on the next [`advance`](Self::advance).
    pub fn start<V, F>(
        &mut self,
        from: V,
        to: V,
        duration_ms: f32,
        easing: Easing,
        repeat: Repeat,
        on_update: F,
    ) -> Result<TweenId>
    where
        V: Tweenable,
        F: FnMut(&mut C, V) + 'static,
    {
        if !(duration_ms.is_finite() && duration_ms > 0.0) {
            return Err(EyeError::InvalidDuration(duration_ms));
        }
        let id = self.tweens.insert(Box::new(Tween {
            from,
            to,
            duration_ms: f64::from(duration_ms),
            easing,
            repeat,
            started_at: self.now_ms,
            on_update: Box::new(on_update),
        }));
        trace!("tween {id:?} started ({duration_ms} ms, {easing:?}, {repeat:?})");
        Ok(id)
    }

    /// Stop a tween. Idempotent; returns whether it was still running.
    ///
    /// After this returns the tween's callback never fires again.
    pub fn stop(&mut self, id: TweenId) -> bool {
        let stopped = self.tweens.remove(id).is_some();
        if stopped {
            trace!("tween {id:?} stopped");
        }
        stopped
    }

    pub fn is_running(&self, id: TweenId) -> bool {
        self.tweens.contains_key(id)
    }

    pub fn running_count(&self) -> usize {
        self.tweens.len()
    }

    /// Stop every tween, returning how many were running.
    pub fn clear(&mut self) -> usize {
        let count = self.tweens.len();
        self.tweens.clear();
        count
    }

    /// Move the clock to `now_ms` and update every running tween.
    ///
    /// Time never moves backward: an earlier (or NaN) `now_ms` re-evaluates
    /// tweens at the current clock instead.
    pub fn advance(&mut self, now_ms: f64, ctx: &mut C) {
        self.now_ms = self.now_ms.max(now_ms);
        let now = self.now_ms;

        let mut finished = Vec::new();
        for (id, tween) in self.tweens.iter_mut() {
            if let Progress::Finished = tween.drive(now, ctx) {
                finished.push(id);
            }
        }
        for id in finished {
            self.tweens.remove(id);
            trace!("tween {id:?} finished");
        }
    }

    /// Advance by `delta_secs` (negative or NaN deltas count as zero).
    pub fn tick(&mut self, delta_secs: f32, ctx: &mut C) {
        let delta_ms = f64::from(delta_secs.max(0.0)) * 1000.0;
        self.advance(self.now_ms + delta_ms, ctx);
    }
}

impl<C: 'static> Default for Tweener<C> {
    fn default() -> Self {
        Self::new()
    }
}
