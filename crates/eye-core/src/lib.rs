pub mod config;
pub mod error;
pub mod eye;
pub mod geometry;
pub mod morph;
pub mod pair;
pub mod renderer;
pub mod state;
pub mod tween;

#[cfg(feature = "gui")]
pub mod gui;

pub use config::EyeConfig;
pub use error::{EyeError, Result};
pub use eye::{ActiveChannels, Eye, EyeMaterial, EyeMesh, MaterialId, Released};
pub use geometry::{Geometry, GeometryId, GeometryKind, Vertex};
pub use morph::{with_bob, MorphTarget};
pub use pair::EyePair;
pub use renderer::{EyeRenderer, EyeUniforms};
pub use state::{EmotionState, Pose, Side};
pub use tween::{Easing, Repeat, TweenId, Tweenable, Tweener};
