use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};

use crate::config::EyeConfig;
use crate::error::Result;
use crate::geometry::{Geometry, GeometryId, GeometryKind};
use crate::morph::with_bob;
use crate::state::{EmotionState, Side};
use crate::tween::{Easing, Repeat, TweenId, Tweener};

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Visible transform state of one eye, written by the tween callbacks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeMesh {
    /// Fixed anchor of the eye in scene space.
    pub base_position: [f32; 3],
    pub scale: [f32; 3],
    /// Offset from `base_position` on the x/y plane.
    pub offset: [f32; 2],
    /// Blend weight of the bob morph target.
    pub morph_influence: f32,
}

impl EyeMesh {
    pub fn translation(&self) -> [f32; 3] {
        [
            self.base_position[0] + self.offset[0],
            self.base_position[1] + self.offset[1],
            self.base_position[2],
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u64);

impl MaterialId {
    fn next() -> Self {
        Self(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Flat-colored surface of an eye.
#[derive(Debug, PartialEq)]
pub struct EyeMaterial {
    id: MaterialId,
    pub color: [f32; 3],
}

impl EyeMaterial {
    pub fn new(color: [f32; 3]) -> Self {
        Self {
            id: MaterialId::next(),
            color,
        }
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }
}

/// A resource an eye no longer uses; the renderer frees its GPU side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Released {
    Geometry(GeometryId),
    Material(MaterialId),
}

/// Which tween channels currently hold a running tween.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActiveChannels {
    pub scale: bool,
    pub position: bool,
    pub bob: bool,
}

/// What the bob channel is doing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum Bob {
    #[default]
    Still,
    /// Easing the influence from wherever it was down to 0. When `then`
    /// holds an amplitude, a bob cycle starts once the ease finishes.
    Settling { id: TweenId, then: Option<f32> },
    Cycling { id: TweenId, amplitude: f32 },
}

impl Bob {
    fn tween(self) -> Option<TweenId> {
        match self {
            Bob::Still => None,
            Bob::Settling { id, .. } | Bob::Cycling { id, .. } => Some(id),
        }
    }

    /// Amplitude this channel is cycling at, or heading for.
    fn amplitude(self) -> Option<f32> {
        match self {
            Bob::Still => None,
            Bob::Settling { then, .. } => then,
            Bob::Cycling { amplitude, .. } => Some(amplitude),
        }
    }
}

/// One slot per animated property. A slot is always emptied (and its
/// tween stopped) before a new tween is stored in it.
#[derive(Default)]
struct Channels {
    scale: Option<TweenId>,
    position: Option<TweenId>,
    bob: Bob,
}

fn cancel(tweens: &mut Tweener<EyeMesh>, slot: &mut Option<TweenId>) {
    if let Some(id) = slot.take() {
        tweens.stop(id);
    }
}

#[derive(Clone, Copy, Debug)]
struct Timing {
    segments: u32,
    bob_offset: f32,
    transition_ms: f32,
    bob_period_ms: f32,
}

/// One animated eye: its mesh, material and tween channels.
pub struct Eye {
    side: Side,
    state: EmotionState,
    mesh: EyeMesh,
    geometry: Geometry,
    material: EyeMaterial,
    tweens: Tweener<EyeMesh>,
    channels: Channels,
    released: Vec<Released>,
    timing: Timing,
}

impl Eye {
    /// Build an eye on `side`, already resting in the idle pose.
    pub fn new(side: Side, config: &EyeConfig) -> Result<Self> {
        config.validate()?;

        let timing = Timing {
            segments: config.geometry.segments,
            bob_offset: config.geometry.bob_offset,
            transition_ms: config.animation.transition_ms,
            bob_period_ms: config.animation.bob_period_ms,
        };
        let state = EmotionState::Idle;
        let pose = state.pose();
        let geometry = with_bob(
            Geometry::generate(pose.geometry, timing.segments)?,
            timing.bob_offset,
        );

        let mut eye = Self {
            side,
            state,
            mesh: EyeMesh {
                base_position: [side.sign() * config.pair.eye_spacing, 0.0, 0.0],
                scale: pose.scale,
                offset: pose.offset_for(side),
                morph_influence: 0.0,
            },
            geometry,
            material: EyeMaterial::new(config.material.color),
            tweens: Tweener::new(),
            channels: Channels::default(),
            released: Vec::new(),
            timing,
        };
        eye.apply_bob(pose.bob)?;
        Ok(eye)
    }

    /// Transition toward the pose of `state`.
    ///
    /// Running scale and position tweens are cancelled and restarted from
    /// the values they had reached, so motion stays continuous.
    pub fn set_state(&mut self, state: EmotionState) -> Result<()> {
        let pose = state.pose();
        debug!("{:?} eye: {} -> {}", self.side, self.state, state);

        cancel(&mut self.tweens, &mut self.channels.scale);
        self.channels.scale = Some(self.tweens.start(
            self.mesh.scale,
            pose.scale,
            self.timing.transition_ms,
            Easing::EaseOut,
            Repeat::Once,
            |mesh: &mut EyeMesh, scale| mesh.scale = scale,
        )?);

        if pose.geometry != self.geometry.kind() {
            self.mount_geometry(pose.geometry)?;
        }

        cancel(&mut self.tweens, &mut self.channels.position);
        self.channels.position = Some(self.tweens.start(
            self.mesh.offset,
            pose.offset_for(self.side),
            self.timing.transition_ms,
            Easing::EaseOut,
            Repeat::Once,
            |mesh: &mut EyeMesh, offset| mesh.offset = offset,
        )?);

        self.apply_bob(pose.bob)?;
        self.state = state;
        Ok(())
    }

    /// Swap in a freshly generated geometry, queueing the old one for release.
    fn mount_geometry(&mut self, kind: GeometryKind) -> Result<()> {
        let next = with_bob(
            Geometry::generate(kind, self.timing.segments)?,
            self.timing.bob_offset,
        );
        let previous = std::mem::replace(&mut self.geometry, next);
        debug!(
            "{:?} eye: geometry {:?} -> {:?}",
            self.side,
            previous.kind(),
            kind
        );
        self.released.push(Released::Geometry(previous.id()));
        Ok(())
    }

    /// Start, keep, or stop the bob channel for `amplitude`.
    ///
    /// The influence is never reset directly: a lifted eye eases back to
    /// rest before a new cycle starts or before it holds still.
    fn apply_bob(&mut self, amplitude: Option<f32>) -> Result<()> {
        let current = self.channels.bob;
        if amplitude.is_some() && current.amplitude() == amplitude {
            if let Some(id) = current.tween() {
                if self.tweens.is_running(id) {
                    return Ok(());
                }
            }
        }

        if let Some(id) = current.tween() {
            self.tweens.stop(id);
        }
        self.channels.bob = Bob::Still;

        let influence = self.mesh.morph_influence;
        if influence == 0.0 {
            if let Some(amplitude) = amplitude {
                self.start_bob_cycle(amplitude)?;
            }
            return Ok(());
        }

        let id = self.tweens.start(
            influence,
            0.0,
            self.timing.transition_ms,
            Easing::EaseOut,
            Repeat::Once,
            |mesh: &mut EyeMesh, influence| mesh.morph_influence = influence,
        )?;
        self.channels.bob = Bob::Settling {
            id,
            then: amplitude,
        };
        Ok(())
    }

    fn start_bob_cycle(&mut self, amplitude: f32) -> Result<()> {
        let id = self.tweens.start(
            0.0,
            amplitude,
            self.timing.bob_period_ms,
            Easing::SineInOut,
            Repeat::YoyoForever,
            |mesh: &mut EyeMesh, influence| mesh.morph_influence = influence,
        )?;
        self.channels.bob = Bob::Cycling { id, amplitude };
        Ok(())
    }

    /// Drive this eye's tweens forward by `delta_secs`.
    pub fn update(&mut self, delta_secs: f32) {
        self.tweens.tick(delta_secs, &mut self.mesh);

        if let Bob::Settling { id, then } = self.channels.bob {
            if !self.tweens.is_running(id) {
                self.channels.bob = Bob::Still;
                if let Some(amplitude) = then {
                    if let Err(e) = self.start_bob_cycle(amplitude) {
                        warn!("{:?} eye: bob not restarted: {e}", self.side);
                    }
                }
            }
        }
    }

    pub fn state(&self) -> EmotionState {
        self.state
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn mesh(&self) -> &EyeMesh {
        &self.mesh
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn material(&self) -> &EyeMaterial {
        &self.material
    }

    /// Amplitude of the running bob, if any.
    pub fn bob_amplitude(&self) -> Option<f32> {
        let bob = self.channels.bob;
        bob.tween()
            .filter(|id| self.tweens.is_running(*id))
            .and(bob.amplitude())
    }

    pub fn active_channels(&self) -> ActiveChannels {
        let live = |slot: Option<TweenId>| slot.is_some_and(|id| self.tweens.is_running(id));
        ActiveChannels {
            scale: live(self.channels.scale),
            position: live(self.channels.position),
            bob: live(self.channels.bob.tween()),
        }
    }

    /// Number of tweens this eye owns that are still running.
    pub fn running_tweens(&self) -> usize {
        self.tweens.running_count()
    }

    /// Take the resources released since the last call.
    pub fn drain_released(&mut self) -> Vec<Released> {
        std::mem::take(&mut self.released)
    }

    /// Stop every tween and release all resources.
    ///
    /// Consumes the eye, so nothing can render or animate it afterward and
    /// each resource appears in the returned list exactly once.
    pub fn dispose(mut self) -> Vec<Released> {
        let stopped = self.tweens.clear();
        self.channels = Channels::default();
        self.released.push(Released::Geometry(self.geometry.id()));
        self.released.push(Released::Material(self.material.id()));
        debug!(
            "{:?} eye disposed ({stopped} tweens stopped, {} resources released)",
            self.side,
            self.released.len()
        );
        self.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eye(side: Side) -> Eye {
        Eye::new(side, &EyeConfig::default()).unwrap()
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_new_eye_rests_in_idle() {
        let eye = eye(Side::Left);
        let pose = EmotionState::Idle.pose();
        assert_eq!(eye.state(), EmotionState::Idle);
        assert_eq!(eye.mesh().scale, pose.scale);
        assert_eq!(eye.mesh().base_position, [-1.3, 0.0, 0.0]);
        assert_eq!(eye.geometry().kind(), GeometryKind::Base);
        assert!(eye.geometry().morph_target().is_some());
        assert_eq!(
            eye.active_channels(),
            ActiveChannels {
                scale: false,
                position: false,
                bob: true
            }
        );
        assert_eq!(eye.bob_amplitude(), pose.bob);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EyeConfig::default();
        config.geometry.segments = 0;
        assert!(Eye::new(Side::Right, &config).is_err());

        let mut config = EyeConfig::default();
        config.animation.transition_ms = 0.0;
        assert!(Eye::new(Side::Right, &config).is_err());
    }

    #[test]
    fn test_set_state_starts_one_tween_per_channel() {
        let mut eye = eye(Side::Right);
        for _ in 0..5 {
            eye.set_state(EmotionState::Surprised).unwrap();
            eye.set_state(EmotionState::Listening).unwrap();
        }
        assert_eq!(
            eye.active_channels(),
            ActiveChannels {
                scale: true,
                position: true,
                bob: true
            }
        );
        assert_eq!(eye.running_tweens(), 3);
    }

    #[test]
    fn test_transition_converges() {
        let mut eye = eye(Side::Left);
        eye.set_state(EmotionState::Angry).unwrap();
        eye.update(0.5);
        let pose = EmotionState::Angry.pose();
        assert_eq!(eye.mesh().scale, pose.scale);
        assert_eq!(eye.mesh().offset, pose.offset_for(Side::Left));
        assert!(!eye.active_channels().scale);
        assert!(!eye.active_channels().position);
    }

    #[test]
    fn test_retarget_is_continuous() {
        let mut eye = eye(Side::Left);
        eye.set_state(EmotionState::Surprised).unwrap();
        eye.update(0.2);
        let before = eye.mesh().scale;

        eye.set_state(EmotionState::Sleepy).unwrap();
        assert_eq!(eye.mesh().scale, before);

        eye.update(1.0 / 60.0);
        let after = eye.mesh().scale;
        let step = (0..3).map(|i| (after[i] - before[i]).abs()).fold(0.0, f32::max);
        assert!(step < 0.1, "jumped by {step}");
    }

    #[test]
    fn test_geometry_swaps_only_on_variant_change() {
        let mut eye = eye(Side::Left);
        let base_id = eye.geometry().id();

        eye.set_state(EmotionState::Surprised).unwrap();
        assert_eq!(eye.geometry().id(), base_id);
        assert!(eye.drain_released().is_empty());

        eye.set_state(EmotionState::Anxious).unwrap();
        assert_eq!(eye.geometry().kind(), GeometryKind::Anxious);
        assert!(eye.geometry().morph_target().is_some());
        assert_eq!(eye.drain_released(), vec![Released::Geometry(base_id)]);
        assert!(eye.drain_released().is_empty());
    }

    #[test]
    fn test_reactive_state_settles_bob_to_rest() {
        let mut eye = eye(Side::Right);
        eye.update(1.0);
        let lifted = eye.mesh().morph_influence;
        assert!(lifted > 0.99);

        eye.set_state(EmotionState::Angry).unwrap();
        assert_eq!(eye.mesh().morph_influence, lifted);
        assert_eq!(eye.bob_amplitude(), None);
        assert!(eye.active_channels().bob);

        let mut prev = lifted;
        for _ in 0..40 {
            eye.update(1.0 / 60.0);
            let influence = eye.mesh().morph_influence;
            assert!(influence <= prev && influence >= 0.0);
            assert!(prev - influence < 0.1, "dropped {prev} -> {influence}");
            prev = influence;
        }
        assert_eq!(eye.mesh().morph_influence, 0.0);
        assert!(!eye.active_channels().bob);

        for _ in 0..120 {
            eye.update(1.0 / 60.0);
            assert_eq!(eye.mesh().morph_influence, 0.0);
        }
        assert_eq!(eye.running_tweens(), 0);
    }

    #[test]
    fn test_amplitude_change_keeps_influence_continuous() {
        let mut eye = eye(Side::Left);
        eye.update(1.0);
        let mut prev = eye.mesh().morph_influence;
        assert!(prev > 0.99);

        eye.set_state(EmotionState::Listening).unwrap();
        assert_eq!(eye.mesh().morph_influence, prev);
        assert_eq!(eye.bob_amplitude(), Some(0.5));

        let mut peak_after_settle = 0.0f32;
        for frame in 0..200 {
            eye.update(1.0 / 60.0);
            let influence = eye.mesh().morph_influence;
            assert!((influence - prev).abs() < 0.1, "jumped {prev} -> {influence}");
            prev = influence;
            if frame > 40 {
                peak_after_settle = peak_after_settle.max(influence);
            }
        }
        assert!(peak_after_settle <= 0.5 + 1e-6);
        assert!(peak_after_settle > 0.45);
        assert_eq!(eye.bob_amplitude(), Some(0.5));
    }

    #[test]
    fn test_resting_again_while_settling_restarts_cycle() {
        let mut eye = eye(Side::Right);
        eye.update(0.5);
        eye.set_state(EmotionState::Surprised).unwrap();
        eye.update(0.1);
        assert!(eye.mesh().morph_influence > 0.0);

        eye.set_state(EmotionState::Idle).unwrap();
        assert_eq!(eye.bob_amplitude(), Some(1.0));
        assert_eq!(eye.running_tweens(), 3);
        eye.update(0.6);
        assert!(eye.active_channels().bob);
        assert_eq!(eye.bob_amplitude(), Some(1.0));
    }

    #[test]
    fn test_resting_transition_updates_bob_amplitude() {
        let mut eye = eye(Side::Right);
        eye.set_state(EmotionState::Thinking).unwrap();
        assert_eq!(eye.bob_amplitude(), EmotionState::Thinking.pose().bob);

        let mut peak = 0.0f32;
        for _ in 0..180 {
            eye.update(1.0 / 60.0);
            peak = peak.max(eye.mesh().morph_influence);
        }
        let amplitude = EmotionState::Thinking.pose().bob.unwrap();
        assert!(peak <= amplitude + 1e-6);
        assert!(peak > amplitude * 0.9);
    }

    #[test]
    fn test_directional_offset_mirrors() {
        let mut left = eye(Side::Left);
        let mut right = eye(Side::Right);
        left.set_state(EmotionState::Angry).unwrap();
        right.set_state(EmotionState::Angry).unwrap();
        left.update(1.0);
        right.update(1.0);
        assert_close(&[left.mesh().offset[0]], &[-right.mesh().offset[0]]);
        assert!(left.mesh().translation()[0] > -1.3);
        assert!(right.mesh().translation()[0] < 1.3);
    }

    #[test]
    fn test_dispose_releases_each_resource_once() {
        let mut eye = eye(Side::Left);
        eye.set_state(EmotionState::Listening).unwrap();
        let old = eye.drain_released();
        assert_eq!(old.len(), 1);

        let geometry = eye.geometry().id();
        let material = eye.material().id();
        let released = eye.dispose();
        assert_eq!(
            released,
            vec![Released::Geometry(geometry), Released::Material(material)]
        );
    }

    #[test]
    fn test_dispose_includes_undrained_releases() {
        let mut eye = eye(Side::Left);
        let first = eye.geometry().id();
        eye.set_state(EmotionState::Anxious).unwrap();
        let released = eye.dispose();
        assert_eq!(released.len(), 3);
        assert_eq!(released[0], Released::Geometry(first));
    }
}
