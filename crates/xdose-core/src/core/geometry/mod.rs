//! # Crystal Geometry Module
//!
//! Shapes a crystal can take, the voxel grid that discretises it and the depth
//! finding that traces rays from interior points to the crystal surface.
//!
//! ## Architecture
//!
//! - **Mesh** ([`mesh`]) - Closed polyhedral solids, possibly non-convex, intersected
//!   through an explicit ordered crossing list and a parity scan
//! - **Primitives** ([`primitives`]) - Cuboid, sphere and cylinder with closed-form exit
//!   distances
//! - **Voxel Grid** ([`grid`]) - Integer lattice covering the crystal bounding box
//! - **Crystal** ([`crystal`]) - Oriented shape plus grid, and the per-angle
//!   [`crystal::DepthSnapshot`] used by the dose engine

pub mod crystal;
pub mod grid;
pub mod mesh;
pub mod primitives;

use nalgebra::{Point3, Vector3};
use thiserror::Error;

/// Tolerance used when deciding whether a point lies inside an analytic primitive.
pub(crate) const CONTAINMENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| {
            (min.inf(p), max.sup(p))
        });
        Some(Self { min, max })
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|axis| {
            point[axis] >= self.min[axis] - CONTAINMENT_EPSILON
                && point[axis] <= self.max[axis] + CONTAINMENT_EPSILON
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Ray parity scan ended inside the solid (last face crossed: {face:?}); the mesh is not watertight")]
    UnterminatedParity { face: Option<usize> },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Mesh has no vertices")]
    EmptyVertices,
    #[error("Mesh has no faces")]
    EmptyFaces,
    #[error("Face {face} has {count} vertices; at least 3 are required")]
    TooFewVertices { face: usize, count: usize },
    #[error("Face {face} references vertex {vertex}, but only {vertex_count} vertices exist")]
    VertexOutOfRange {
        face: usize,
        vertex: usize,
        vertex_count: usize,
    },
    #[error("Face {face} is degenerate (zero area)")]
    DegenerateFace { face: usize },
    #[error("Face {face} is not star-shaped from its first vertex and cannot be fan-triangulated")]
    UntriangulableFace { face: usize },
    #[error("Mesh is not watertight: edge {from} -> {to} is not matched by exactly one reversed edge")]
    OpenSurface { from: usize, to: usize },
    #[error("Mesh encloses no volume")]
    ZeroVolume,
    #[error("Invalid dimension '{name}': {value} (must be positive and finite)")]
    InvalidDimension { name: &'static str, value: f64 },
    #[error("Invalid voxel resolution: {0} (must be positive and finite)")]
    InvalidResolution(f64),
    #[error("No voxel of the grid lies inside the crystal; increase the resolution")]
    NoInteriorVoxels,
}
