//! # Engine Module
//!
//! The stateful layer of a dose calculation: it owns the per-voxel accumulators and
//! drives them through every angle step of every exposure.
//!
//! ## Overview
//!
//! For each angle step the engine builds an immutable depth snapshot, then visits every
//! interior voxel: the voxel is moved into the beam frame, the beam intensity at its
//! position is attenuated by the path length back to the crystal surface, and the
//! resulting fluence deposits dose and scatters elastically according to the current
//! coefficients. Voxels are independent within a step and are processed in parallel
//! when the `parallel` feature is enabled.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Experiment description and its builder
//! - **Dose Accumulation** ([`dose`]) - The voxel × angle loop and per-voxel accumulators
//! - **Decay Models** ([`decay`]) - Relative diffraction efficiency for dose weighting
//! - **Summary Statistics** ([`summary`]) - Read-only derivations over a finished grid
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Run-level error taxonomy with voxel/angle context

pub mod config;
pub mod decay;
pub mod dose;
pub mod error;
pub mod progress;
pub mod summary;
