//! # Constants and type definitions for ensemble-lc
//!
//! This module centralizes the **pipeline defaults**, **calibrated detector
//! thresholds**, and **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Default configuration values for the ensemble pipeline
//! - Empirically calibrated scattered-light verdict thresholds
//! - Photometric calibration constants for flux ↔ magnitude conversion
//! - Core type aliases used across the crate
//!
//! These definitions are used by the orchestrator, the scattered-light
//! detector, and the variability statistics estimators.

/// Time offset within an observation, in days
pub type Day = f64;

/// Flux in electrons per second
pub type Flux = f64;

/// Magnitude in the instrument band
pub type Magnitude = f64;

/// Angle in degrees
pub type Degree = f64;

/// Logarithmic age, log10(age / yr)
pub type Dex = f64;

// -------------------------------------------------------------------------------------------------
// Pipeline defaults
// -------------------------------------------------------------------------------------------------

/// Default percentile used in the upper-limit calculation of the corrector
pub const DEFAULT_PERCENTILE: u32 = 80;

/// Default cutout side length in pixels
pub const DEFAULT_CUTOUT_SIZE: usize = 99;

/// Default stride at which residual frames are sampled for scattered light
pub const DEFAULT_SCATTERED_LIGHT_STRIDE: usize = 5;

/// Default number of principal components used by the corrector
pub const DEFAULT_N_PCA: usize = 6;

// -------------------------------------------------------------------------------------------------
// Scattered-light verdict thresholds
// -------------------------------------------------------------------------------------------------
// Calibrated by eye against known contaminated sectors; not derived.

/// Maximum allowed absolute plane intercept before a frame is flagged
pub const SCATTERED_LIGHT_INTERCEPT_LIMIT: f64 = 2.5;

/// Maximum allowed absolute plane slope (both axes) before a frame is flagged
pub const SCATTERED_LIGHT_SLOPE_LIMIT: f64 = 0.02;

// -------------------------------------------------------------------------------------------------
// Photometric calibration
// -------------------------------------------------------------------------------------------------

/// Calibration magnitude of the instrument band
pub const CALIBRATION_MAG: Magnitude = 10.0;

/// Flux corresponding to [`CALIBRATION_MAG`], in electrons per second
pub const CALIBRATION_FLUX: Flux = 15_000.0;

/// Minimum time separation (days) for two samples to count as a Stetson pair
///
/// Consecutive samples closer than this are treated as a single measurement
/// rather than a correlated pair, so the index degrades gracefully for
/// near-simultaneous cadences.
pub const STETSON_MIN_PAIR_SEPARATION: Day = 1e-4;
