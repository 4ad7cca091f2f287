use serde::{Deserialize, Serialize};

use crate::error::{EyeError, Result};
use crate::morph::DEFAULT_BOB_OFFSET;

// ============================================================
// Serializable config types
// ============================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    pub version: u32,
    pub pair: PairConfig,
    pub geometry: GeometryConfig,
    pub animation: AnimationConfig,
    pub material: MaterialConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairConfig {
    /// Eyes sit at `±eye_spacing` on the horizontal axis.
    pub eye_spacing: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Latitude and longitude segment count of the sphere grid.
    pub segments: u32,
    /// Vertical displacement of the bob morph target.
    pub bob_offset: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Duration of scale and position transitions.
    pub transition_ms: f32,
    /// Duration of one half-cycle of the bob yoyo.
    pub bob_period_ms: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    pub color: [f32; 3],
    pub bg_color: [f32; 3],
}

// ============================================================
// Defaults
// ============================================================

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            pair: PairConfig::default(),
            geometry: GeometryConfig::default(),
            animation: AnimationConfig::default(),
            material: MaterialConfig::default(),
        }
    }
}

impl Default for PairConfig {
    fn default() -> Self {
        Self { eye_spacing: 1.3 }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            segments: 32,
            bob_offset: DEFAULT_BOB_OFFSET,
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            transition_ms: 500.0,
            bob_period_ms: 1000.0,
        }
    }
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            bg_color: [0.0, 0.0, 0.0],
        }
    }
}

// ============================================================
// EyeConfig: persistence and validation
// ============================================================

impl EyeConfig {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version > Self::CURRENT_VERSION {
            return Err(EyeError::InvalidConfig(format!(
                "unsupported version {} (newest known is {})",
                self.version,
                Self::CURRENT_VERSION
            )));
        }
        if self.geometry.segments == 0 {
            return Err(EyeError::ZeroSegments);
        }
        for duration in [self.animation.transition_ms, self.animation.bob_period_ms] {
            if !(duration.is_finite() && duration > 0.0) {
                return Err(EyeError::InvalidDuration(duration));
            }
        }
        if !self.pair.eye_spacing.is_finite() {
            return Err(EyeError::InvalidConfig("eye_spacing must be finite".into()));
        }
        if !self.geometry.bob_offset.is_finite() {
            return Err(EyeError::InvalidConfig("bob_offset must be finite".into()));
        }
        let mut colors = self.material.color.iter().chain(&self.material.bg_color);
        if colors.any(|c| !(0.0..=1.0).contains(c)) {
            return Err(EyeError::InvalidConfig(
                "colors must be in the 0..1 range".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EyeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.version, EyeConfig::CURRENT_VERSION);
        assert_eq!(config.pair.eye_spacing, 1.3);
        assert_eq!(config.geometry.segments, 32);
        assert_eq!(config.animation.transition_ms, 500.0);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = EyeConfig::default();
        config.material.color = [0.9, 0.8, 0.7];
        config.animation.bob_period_ms = 750.0;
        let json = config.to_json().unwrap();
        assert_eq!(EyeConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EyeConfig::from_json(r#"{ "geometry": { "segments": 12 } }"#).unwrap();
        assert_eq!(config.geometry.segments, 12);
        assert_eq!(config.geometry.bob_offset, DEFAULT_BOB_OFFSET);
        assert_eq!(config.animation, AnimationConfig::default());
    }

    #[test]
    fn test_rejects_zero_segments() {
        let result = EyeConfig::from_json(r#"{ "geometry": { "segments": 0 } }"#);
        assert!(matches!(result, Err(EyeError::ZeroSegments)));
    }

    #[test]
    fn test_rejects_non_positive_durations() {
        let result = EyeConfig::from_json(r#"{ "animation": { "transition_ms": -5.0 } }"#);
        assert!(matches!(result, Err(EyeError::InvalidDuration(_))));
        let result = EyeConfig::from_json(r#"{ "animation": { "bob_period_ms": 0.0 } }"#);
        assert!(matches!(result, Err(EyeError::InvalidDuration(_))));
    }

    #[test]
    fn test_rejects_future_version_and_bad_colors() {
        let result = EyeConfig::from_json(r#"{ "version": 99 }"#);
        assert!(matches!(result, Err(EyeError::InvalidConfig(_))));
        let result = EyeConfig::from_json(r#"{ "material": { "color": [2.0, 0.0, 0.0] } }"#);
        assert!(matches!(result, Err(EyeError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            EyeConfig::from_json("{ not json"),
            Err(EyeError::Json(_))
        ));
    }
}
