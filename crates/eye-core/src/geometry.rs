//! Procedural eye meshes.
//!
//! Every variant samples the same latitude/longitude grid, so all of them
//! share topology and differ only in the radius used at each sample.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{EyeError, Result};
use crate::morph::MorphTarget;

/// Ripple strength of the anxious variant.
const ANXIOUS_RIPPLE: f32 = 0.1;
/// Forward bulge strength of the listening variant.
const LISTENING_FOCUS: f32 = 0.05;

/// Faces whose edge sine falls below this are treated as zero-area.
const DEGENERATE_SINE: f32 = 1e-5;

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

/// Vertex layout shared with the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Which silhouette a geometry was generated for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeometryKind {
    /// Plain unit sphere.
    Base,
    /// Rippled, tense silhouette.
    Anxious,
    /// Sphere with an asymmetric, alert bulge.
    Listening,
}

impl GeometryKind {
    /// Radius of the surface at polar angle `theta` and azimuth `phi`.
    pub fn radius(self, theta: f32, phi: f32) -> f32 {
        match self {
            GeometryKind::Base => 1.0,
            GeometryKind::Anxious => {
                1.0 + ANXIOUS_RIPPLE * (4.0 * theta).sin() * (3.0 * phi).cos()
            }
            GeometryKind::Listening => 1.0 + LISTENING_FOCUS * phi.cos() * theta.sin(),
        }
    }
}

/// Process-unique identity of a generated geometry.
///
/// Renderers key GPU buffers by this id; it is never reused, so a
/// released id can be dropped from any cache without ambiguity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(u64);

impl GeometryId {
    fn next() -> Self {
        Self(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Immutable indexed triangle mesh with an optional morph target.
///
/// Not `Clone`: a geometry is owned by exactly one eye.
#[derive(Debug)]
pub struct Geometry {
    id: GeometryId,
    kind: GeometryKind,
    segments: u32,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    morph: Option<MorphTarget>,
}

impl Geometry {
    /// Sample the sphere grid for `kind` at `segments` × `segments` resolution.
    ///
    /// Produces `(segments + 1)²` vertices and `2 · segments²` triangles
    /// wound counter-clockwise when seen from outside. Positions are a pure
    /// function of `(kind, segments)`.
    pub fn generate(kind: GeometryKind, segments: u32) -> Result<Self> {
        if segments == 0 {
            return Err(EyeError::ZeroSegments);
        }

        let row = segments + 1;
        let mut vertices = Vec::with_capacity((row * row) as usize);
        for i in 0..=segments {
            let theta = (i as f32 / segments as f32) * PI;
            // Poles sit exactly on the axis; sin(PI) is not exactly zero in f32.
            let (sin_theta, cos_theta) = if i == 0 {
                (0.0, 1.0)
            } else if i == segments {
                (0.0, -1.0)
            } else {
                theta.sin_cos()
            };
            for j in 0..=segments {
                let phi = (j as f32 / segments as f32) * 2.0 * PI;
                let r = kind.radius(theta, phi);
                vertices.push(Vertex {
                    position: [
                        r * sin_theta * phi.cos(),
                        r * sin_theta * phi.sin(),
                        r * cos_theta,
                    ],
                    normal: [0.0; 3],
                });
            }
        }

        let mut indices = Vec::with_capacity((segments * segments * 6) as usize);
        for i in 0..segments {
            for j in 0..segments {
                let a = i * row + j;
                let b = a + 1;
                let c = (i + 1) * row + j;
                let d = c + 1;

                indices.extend_from_slice(&[a, d, b]);
                indices.extend_from_slice(&[a, c, d]);
            }
        }

        let mut geometry = Self {
            id: GeometryId::next(),
            kind,
            segments,
            vertices,
            indices,
            morph: None,
        };
        geometry.compute_vertex_normals();
        Ok(geometry)
    }

    /// Area-weighted smooth normals accumulated from the faces.
    fn compute_vertex_normals(&mut self) {
        let mut sums = vec![[0.0f32; 3]; self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let p0 = self.vertices[i0].position;
            let p1 = self.vertices[i1].position;
            let p2 = self.vertices[i2].position;

            let e1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
            let e2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];
            let n = [
                e1[1] * e2[2] - e1[2] * e2[1],
                e1[2] * e2[0] - e1[0] * e2[2],
                e1[0] * e2[1] - e1[1] * e2[0],
            ];
            // Pole-collapsed triangles carry no direction, only rounding noise.
            if length(n) <= DEGENERATE_SINE * length(e1) * length(e2) {
                continue;
            }

            for idx in [i0, i1, i2] {
                sums[idx][0] += n[0];
                sums[idx][1] += n[1];
                sums[idx][2] += n[2];
            }
        }

        for (vertex, sum) in self.vertices.iter_mut().zip(sums) {
            // Seam and pole duplicates can end up with no usable face.
            let source = if length(sum) > 1e-12 { sum } else { vertex.position };
            let len = length(source);
            vertex.normal = if len > 1e-12 {
                [source[0] / len, source[1] / len, source[2] / len]
            } else {
                [0.0, 0.0, 1.0]
            };
        }
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn segments(&self) -> u32 {
        self.segments
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn morph_target(&self) -> Option<&MorphTarget> {
        self.morph.as_ref()
    }

    /// Attach (or replace) the morph target. It must cover every vertex.
    pub(crate) fn set_morph_target(&mut self, target: MorphTarget) {
        debug_assert_eq!(target.len(), self.vertices.len());
        self.morph = Some(target);
    }
}

fn length(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
