//! # Workflows Module
//!
//! High-level entry points that run a complete dose calculation from an
//! [`ExperimentConfig`](crate::engine::config::ExperimentConfig) to a finalized
//! [`DoseResult`](crate::engine::summary::DoseResult).
//!
//! ## Overview
//!
//! A workflow builds the crystal and its voxel grid, resolves the composition into a
//! coefficient source, then drives the dose engine through every exposure in order.
//! Coefficients are recomputed only when the photon energy changes between exposures.
//! Any failure aborts the whole run.
//!
//! ## Architecture
//!
//! - **Exposure Workflow** ([`expose`]) - Multi-exposure dose accumulation into a
//!   single crystal, followed by summary statistics.

pub mod expose;
