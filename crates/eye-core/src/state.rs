use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EyeError;
use crate::geometry::GeometryKind;

/// Discrete activity/mood label driving the eyes' appearance.
///
/// Any state is reachable from any other; the machine is a lookup keyed
/// by state rather than a sequence of allowed transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmotionState {
    #[default]
    Idle,
    Listening,
    Thinking,
    TalkingRest,
    Surprised,
    Sleepy,
    Angry,
    Anxious,
}

impl EmotionState {
    pub const COUNT: usize = 8;

    /// All states in declaration order.
    pub const ALL: [EmotionState; Self::COUNT] = [
        EmotionState::Idle,
        EmotionState::Listening,
        EmotionState::Thinking,
        EmotionState::TalkingRest,
        EmotionState::Surprised,
        EmotionState::Sleepy,
        EmotionState::Angry,
        EmotionState::Anxious,
    ];

    /// Wire name, identical to the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            EmotionState::Idle => "idle",
            EmotionState::Listening => "listening",
            EmotionState::Thinking => "thinking",
            EmotionState::TalkingRest => "talking-rest",
            EmotionState::Surprised => "surprised",
            EmotionState::Sleepy => "sleepy",
            EmotionState::Angry => "angry",
            EmotionState::Anxious => "anxious",
        }
    }

    /// The static pose for this state.
    ///
    /// Scale is applied per axis to the unit sphere. The x component of
    /// the offset is an inward bias: positive values move an eye toward
    /// the other one, so the pair mirrors automatically.
    pub fn pose(self) -> Pose {
        match self {
            EmotionState::Idle => Pose {
                scale: [1.1, 1.1, 1.0],
                offset: [0.0, 0.0],
                geometry: GeometryKind::Base,
                bob: Some(1.0),
            },
            EmotionState::Listening => Pose {
                scale: [1.3, 1.4, 1.0],
                offset: [0.0, 0.1],
                geometry: GeometryKind::Listening,
                bob: Some(0.5),
            },
            EmotionState::Thinking => Pose {
                scale: [1.0, 1.2, 1.0],
                offset: [-0.15, 0.25],
                geometry: GeometryKind::Base,
                bob: Some(0.3),
            },
            EmotionState::TalkingRest => Pose {
                scale: [1.2, 1.5, 1.0],
                offset: [0.0, 0.0],
                geometry: GeometryKind::Base,
                bob: Some(0.8),
            },
            EmotionState::Surprised => Pose {
                scale: [1.2, 2.0, 1.0],
                offset: [0.0, 0.15],
                geometry: GeometryKind::Base,
                bob: None,
            },
            EmotionState::Sleepy => Pose {
                scale: [1.2, 0.8, 1.0],
                offset: [0.0, -0.2],
                geometry: GeometryKind::Base,
                bob: None,
            },
            EmotionState::Angry => Pose {
                scale: [1.5, 1.2, 1.0],
                offset: [0.15, -0.1],
                geometry: GeometryKind::Base,
                bob: None,
            },
            EmotionState::Anxious => Pose {
                scale: [1.1, 1.3, 1.0],
                offset: [-0.1, 0.05],
                geometry: GeometryKind::Anxious,
                bob: None,
            },
        }
    }

    /// Resting/attentive states bob continuously; reactive ones hold still.
    pub fn is_resting(self) -> bool {
        self.pose().bob.is_some()
    }
}

impl fmt::Display for EmotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EmotionState {
    type Err = EyeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        EmotionState::ALL
            .into_iter()
            .find(|state| state.name() == trimmed)
            .ok_or_else(|| EyeError::UnknownState(s.to_string()))
    }
}

/// Target geometry, transform and motion for one state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Non-uniform scale of the eye mesh.
    pub scale: [f32; 3],
    /// `[inward bias, vertical]` relative to the eye's base position.
    pub offset: [f32; 2],
    pub geometry: GeometryKind,
    /// Bob amplitude (peak morph influence), `None` for reactive states.
    pub bob: Option<f32>,
}

impl Pose {
    /// Resolve the directional offset for an eye on `side`.
    pub fn offset_for(&self, side: Side) -> [f32; 2] {
        [self.offset[0] * side.inward(), self.offset[1]]
    }
}

/// Which side of the face an eye sits on, from the viewer's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Sign of the eye's base x coordinate.
    pub fn sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    /// Sign of the x direction pointing toward the other eye.
    pub fn inward(self) -> f32 {
        -self.sign()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_state_has_finite_pose() {
        for state in EmotionState::ALL {
            let pose = state.pose();
            assert!(pose.scale.iter().all(|v| v.is_finite() && *v > 0.0), "{state}");
            assert!(pose.offset.iter().all(|v| v.is_finite()), "{state}");
            if let Some(amplitude) = pose.bob {
                assert!(amplitude > 0.0 && amplitude <= 1.0, "{state}");
            }
        }
    }

    #[test]
    fn test_resting_and_reactive_split() {
        let resting: Vec<_> = EmotionState::ALL
            .into_iter()
            .filter(|s| s.is_resting())
            .collect();
        assert_eq!(
            resting,
            vec![
                EmotionState::Idle,
                EmotionState::Listening,
                EmotionState::Thinking,
                EmotionState::TalkingRest,
            ]
        );
    }

    #[test]
    fn test_geometry_variants() {
        assert_eq!(EmotionState::Listening.pose().geometry, GeometryKind::Listening);
        assert_eq!(EmotionState::Anxious.pose().geometry, GeometryKind::Anxious);
        assert_eq!(EmotionState::Surprised.pose().geometry, GeometryKind::Base);
    }

    #[test]
    fn test_parse_names() {
        for state in EmotionState::ALL {
            assert_eq!(state.name().parse::<EmotionState>().unwrap(), state);
        }
        assert_eq!(" sleepy\n".parse::<EmotionState>().unwrap(), EmotionState::Sleepy);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "normal".parse::<EmotionState>().unwrap_err();
        assert!(matches!(err, EyeError::UnknownState(ref s) if s == "normal"));
        assert!("".parse::<EmotionState>().is_err());
        assert!("Idle".parse::<EmotionState>().is_err());
    }

    #[test]
    fn test_serde_matches_name() {
        for state in EmotionState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.name()));
        }
        assert!(serde_json::from_str::<EmotionState>("\"bored\"").is_err());
    }

    #[test]
    fn test_directional_offset_mirrors_by_side() {
        let pose = EmotionState::Angry.pose();
        let left = pose.offset_for(Side::Left);
        let right = pose.offset_for(Side::Right);
        // Angry pulls both eyes toward the centre.
        assert!(left[0] > 0.0);
        assert!(right[0] < 0.0);
        assert_eq!(left[0], -right[0]);
        assert_eq!(left[1], right[1]);
    }
}
