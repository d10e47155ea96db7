//! # ensemble-lc
//!
//! Quality-gated ensemble lightcurves from repeated cutout observations of a
//! fixed sky location, plus the scattered-light detector the gating relies
//! on and the variability statistics used to characterize the output.
//!
//! The pipeline iterates a candidate observation list, applies three quality
//! gates per candidate (download, detector-edge proximity, residual
//! scattered light), persists the surviving corrected lightcurves to a
//! single artifact per location, and can reload that artifact without
//! re-running anything. See [`ensemble::EnsembleLightcurves`] for the
//! orchestrator, [`scattered_light::ScatteredLightDetector`] for the veto
//! signal, and [`stats`] for the variability estimators.

pub mod config;
pub mod constants;
pub mod ensemble;
pub mod errors;
pub mod lightcurve;
pub mod persistence;
pub mod plotting;
pub mod scattered_light;
pub mod stats;
