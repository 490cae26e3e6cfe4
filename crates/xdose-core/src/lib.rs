//! # xdose Core Library
//!
//! Estimates the spatial distribution of absorbed X-ray dose inside a macromolecular
//! crystal of arbitrary shape during a rotation ("wedge") diffraction experiment.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless models and physics: crystal geometry and
//!   ray-depth finding, beam profiles, rotation wedges, tabulated cross sections and
//!   the absorption/elastic/attenuation coefficient calculators.
//!
//! - **[`engine`]: The Logic Core.** The stateful voxel × angle dose accumulation loop,
//!   configuration, progress reporting and the error taxonomy of a run.
//!
//! - **[`workflows`]: The Public API.** Ties `core` and `engine` together to run a
//!   complete experiment from structured configuration to a finalized dose grid.

pub mod core;
pub mod engine;
pub mod workflows;
