//! # Core Module
//!
//! The physical and geometric building blocks of a dose calculation.
//!
//! ## Architecture
//!
//! - **Crystal Geometry** ([`geometry`]) - Meshes, analytic primitives, the voxel grid and
//!   depth finding along the beam direction
//! - **Beam** ([`beam`]) - Tophat and Gaussian flux profiles
//! - **Wedge** ([`wedge`]) - Rotation series enumeration and beam-frame transforms
//! - **Coefficients** ([`coefficients`]) - Composition-derived absorption, elastic and
//!   attenuation coefficients
//! - **Reference Data** ([`data`]) - Element properties and tabulated cross sections
//!
//! Everything in this layer is either immutable after construction or a pure function
//! of its inputs; mutable dose state lives in [`crate::engine`].

pub mod beam;
pub mod coefficients;
pub mod data;
pub mod geometry;
pub mod utils;
pub mod wedge;
