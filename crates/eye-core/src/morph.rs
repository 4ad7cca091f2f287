//! Morph targets: alternate vertex positions blended in by a scalar influence.

use crate::geometry::{Geometry, Vertex};

/// Vertical displacement of the bob pose, in unit-sphere space.
pub const DEFAULT_BOB_OFFSET: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A second position set sharing the topology of its base geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphTarget {
    positions: Vec<[f32; 3]>,
}

impl MorphTarget {
    pub fn from_positions(positions: Vec<[f32; 3]>) -> Self {
        Self { positions }
    }

    /// Every vertex of `geometry` moved by `offset` along `axis` only.
    pub fn displaced(geometry: &Geometry, axis: Axis, offset: f32) -> Self {
        let k = axis.index();
        let positions = geometry
            .vertices()
            .iter()
            .map(|v| {
                let mut p = v.position;
                p[k] += offset;
                p
            })
            .collect();
        Self { positions }
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// CPU reference of the per-vertex blend the vertex shader performs:
    /// `rest + (target - rest) * influence`, with influence clamped to [0, 1].
    pub fn blend(&self, rest: &[Vertex], influence: f32) -> Vec<[f32; 3]> {
        let t = influence.clamp(0.0, 1.0);
        rest.iter()
            .zip(&self.positions)
            .map(|(v, target)| {
                [
                    v.position[0] + (target[0] - v.position[0]) * t,
                    v.position[1] + (target[1] - v.position[1]) * t,
                    v.position[2] + (target[2] - v.position[2]) * t,
                ]
            })
            .collect()
    }
}

/// Attach the "bob" pose: the same mesh lifted by `offset` on the vertical axis.
pub fn with_bob(mut geometry: Geometry, offset: f32) -> Geometry {
    let target = MorphTarget::displaced(&geometry, Axis::Y, offset);
    geometry.set_morph_target(target);
    geometry
}
