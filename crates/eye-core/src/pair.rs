use log::debug;

use crate::config::EyeConfig;
use crate::error::Result;
use crate::eye::{Eye, Released};
use crate::state::{EmotionState, Side};

/// Two eyes driven as one face.
pub struct EyePair {
    left: Eye,
    right: Eye,
}

impl EyePair {
    pub fn new(config: &EyeConfig) -> Result<Self> {
        Ok(Self {
            left: Eye::new(Side::Left, config)?,
            right: Eye::new(Side::Right, config)?,
        })
    }

    /// Forward `state` to both eyes.
    pub fn set_state(&mut self, state: EmotionState) -> Result<()> {
        self.left.set_state(state)?;
        self.right.set_state(state)?;
        Ok(())
    }

    /// Inbound state signal by name, e.g. from a voice session.
    ///
    /// Unknown names are rejected without touching either eye.
    pub fn on_state_change(&mut self, name: &str) -> Result<EmotionState> {
        let state = name.parse::<EmotionState>()?;
        debug!("state signal: {state}");
        self.set_state(state)?;
        Ok(state)
    }

    /// Advance both eyes by one frame.
    pub fn update(&mut self, delta_secs: f32) {
        self.left.update(delta_secs);
        self.right.update(delta_secs);
    }

    pub fn state(&self) -> EmotionState {
        self.left.state()
    }

    pub fn left(&self) -> &Eye {
        &self.left
    }

    pub fn right(&self) -> &Eye {
        &self.right
    }

    pub fn eyes(&self) -> [&Eye; 2] {
        [&self.left, &self.right]
    }

    pub fn drain_released(&mut self) -> Vec<Released> {
        let mut released = self.left.drain_released();
        released.extend(self.right.drain_released());
        released
    }

    /// Dispose both eyes and hand back everything they released.
    pub fn dispose(self) -> Vec<Released> {
        let mut released = self.left.dispose();
        released.extend(self.right.dispose());
        released
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::error::EyeError;
    use crate::geometry::GeometryKind;

    #[test]
    fn test_eyes_sit_symmetrically() {
        let pair = EyePair::new(&EyeConfig::default()).unwrap();
        assert_eq!(pair.left().side(), Side::Left);
        assert_eq!(pair.right().side(), Side::Right);
        assert_eq!(
            pair.left().mesh().base_position[0],
            -pair.right().mesh().base_position[0]
        );
        assert_ne!(pair.left().geometry().id(), pair.right().geometry().id());
        assert_ne!(pair.left().material().id(), pair.right().material().id());
    }

    #[test]
    fn test_state_reaches_both_eyes() {
        let mut pair = EyePair::new(&EyeConfig::default()).unwrap();
        pair.set_state(EmotionState::Listening).unwrap();
        pair.update(0.5);
        for eye in pair.eyes() {
            assert_eq!(eye.state(), EmotionState::Listening);
            assert_eq!(eye.mesh().scale, EmotionState::Listening.pose().scale);
            assert_eq!(eye.geometry().kind(), GeometryKind::Listening);
        }
        assert_eq!(pair.state(), EmotionState::Listening);
    }

    #[test]
    fn test_named_signal() {
        let mut pair = EyePair::new(&EyeConfig::default()).unwrap();
        assert_eq!(
            pair.on_state_change("talking-rest").unwrap(),
            EmotionState::TalkingRest
        );
        assert_eq!(pair.state(), EmotionState::TalkingRest);

        let err = pair.on_state_change("happy").unwrap_err();
        assert!(matches!(err, EyeError::UnknownState(_)));
        assert_eq!(pair.state(), EmotionState::TalkingRest);
    }

    #[test]
    fn test_dispose_releases_both_eyes() {
        let mut pair = EyePair::new(&EyeConfig::default()).unwrap();
        pair.set_state(EmotionState::Anxious).unwrap();
        assert_eq!(pair.drain_released().len(), 2);
        let released = pair.dispose();
        assert_eq!(released.len(), 4);
        let unique: HashSet<_> = released.iter().copied().collect();
        assert_eq!(unique.len(), 4);
    }
}
