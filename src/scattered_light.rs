//! # Scattered-light detector
//!
//! Residual scattered light shows up as a large-scale gradient or offset in
//! the difference between the quality-checked pixel cube and the normalized
//! full model. This module fits a best-fit plane `z = a*x + b*y + c` to
//! residual frames sampled at a fixed stride and reduces the coefficients to
//! a boolean contamination verdict.
//!
//! The fit is an ordinary least-squares solve over the flattened pixel
//! coordinate lattice; any solver yielding the three coefficients would do,
//! here it is the SVD of the (fixed) design matrix, factored once per call
//! and reused for every sampled frame.
//!
//! Residual frames are materialized one at a time and dropped as soon as
//! their coefficients are extracted, so repeated invocation across many
//! observations holds at most one frame plus the design factorization.

use nalgebra::{DMatrix, DVector, SVD};

use crate::constants::{SCATTERED_LIGHT_INTERCEPT_LIMIT, SCATTERED_LIGHT_SLOPE_LIMIT};
use crate::errors::EnsembleError;
use crate::lightcurve::PixelCube;

/// Plane-fit contamination detector over sampled residual frames.
///
/// # Fields
///
/// * `grid_size` - Side length of the pixel frames
/// * `stride` - Sampling stride over the frame stack; a stride larger than
///   the stack degenerates to a single sample at index 0
/// * `intercept_limit` - Verdict threshold on `max|c|`
/// * `slope_limit` - Verdict threshold on `max|a|` and `max|b|`
/// * `debug` - When set, the verdict is always clean (testing escape hatch)
#[derive(Debug, Clone)]
pub struct ScatteredLightDetector {
    grid_size: usize,
    stride: usize,
    intercept_limit: f64,
    slope_limit: f64,
    debug: bool,
}

impl ScatteredLightDetector {
    /// Create a detector with the documented default thresholds.
    pub fn new(grid_size: usize, stride: usize, debug: bool) -> Self {
        ScatteredLightDetector {
            grid_size,
            stride: stride.max(1),
            intercept_limit: SCATTERED_LIGHT_INTERCEPT_LIMIT,
            slope_limit: SCATTERED_LIGHT_SLOPE_LIMIT,
            debug,
        }
    }

    /// Override the verdict thresholds.
    ///
    /// The defaults are empirically calibrated constants; overriding them is
    /// meant for recalibration, not per-run tuning.
    pub fn with_thresholds(mut self, intercept_limit: f64, slope_limit: f64) -> Self {
        self.intercept_limit = intercept_limit;
        self.slope_limit = slope_limit;
        self
    }

    /// Run the detector against an observation's quality-checked cube and
    /// normalized full model.
    ///
    /// Residuals (observed − modeled flux) are computed only at the sampled
    /// indices `0, stride, 2*stride, …`.
    ///
    /// Return
    /// ----------
    /// * `Ok(true)` if the residuals indicate scattered-light contamination.
    pub fn detect(&self, quality: &PixelCube, model: &PixelCube) -> Result<bool, EnsembleError> {
        if self.debug {
            return Ok(false);
        }
        if quality.is_empty() {
            return Err(EnsembleError::EmptyResidualStack);
        }
        if quality.len() != model.len() {
            return Err(EnsembleError::CubeModelMismatch {
                cube: quality.len(),
                model: model.len(),
            });
        }

        let svd = self.design_svd();
        let mut maxima = CoefficientMaxima::default();
        for i in (0..quality.len()).step_by(self.stride) {
            let residual = &quality.frames[i] - &model.frames[i];
            maxima.update(self.fit_plane(&svd, &residual)?);
        }
        Ok(self.verdict(&maxima))
    }

    /// Run the detector against an already-computed residual stack.
    pub fn detect_residuals(&self, residuals: &[DMatrix<f64>]) -> Result<bool, EnsembleError> {
        if self.debug {
            return Ok(false);
        }
        if residuals.is_empty() {
            return Err(EnsembleError::EmptyResidualStack);
        }

        let svd = self.design_svd();
        let mut maxima = CoefficientMaxima::default();
        for frame in residuals.iter().step_by(self.stride) {
            maxima.update(self.fit_plane(&svd, frame)?);
        }
        Ok(self.verdict(&maxima))
    }

    fn verdict(&self, maxima: &CoefficientMaxima) -> bool {
        maxima.intercept > self.intercept_limit
            || (maxima.slope_x > self.slope_limit && maxima.slope_y > self.slope_limit)
    }

    /// Factor the plane design matrix `[x, y, 1]` over the pixel lattice.
    fn design_svd(&self) -> SVD<f64, nalgebra::Dyn, nalgebra::Dyn> {
        let n_pix = self.grid_size * self.grid_size;
        let design = DMatrix::from_fn(n_pix, 3, |pix, col| {
            let row = pix / self.grid_size;
            let col_idx = pix % self.grid_size;
            match col {
                0 => col_idx as f64, // x
                1 => row as f64,     // y
                _ => 1.0,
            }
        });
        design.svd(true, true)
    }

    /// Least-squares plane coefficients `(a, b, c)` for one residual frame.
    fn fit_plane(
        &self,
        svd: &SVD<f64, nalgebra::Dyn, nalgebra::Dyn>,
        frame: &DMatrix<f64>,
    ) -> Result<(f64, f64, f64), EnsembleError> {
        if frame.nrows() != self.grid_size || frame.ncols() != self.grid_size {
            return Err(EnsembleError::FrameShapeMismatch {
                expected: self.grid_size,
                got_rows: frame.nrows(),
                got_cols: frame.ncols(),
            });
        }

        // flatten in the same (row, col) order as the design matrix
        let z = DVector::from_fn(self.grid_size * self.grid_size, |pix, _| {
            frame[(pix / self.grid_size, pix % self.grid_size)]
        });
        let coeffs = svd
            .solve(&z, 1e-12)
            .map_err(|e| EnsembleError::PlaneFitFailed(e.to_string()))?;
        Ok((coeffs[0], coeffs[1], coeffs[2]))
    }
}

/// Running maxima of the absolute plane coefficients across sampled frames.
#[derive(Debug, Default)]
struct CoefficientMaxima {
    slope_x: f64,
    slope_y: f64,
    intercept: f64,
}

impl CoefficientMaxima {
    fn update(&mut self, (a, b, c): (f64, f64, f64)) {
        self.slope_x = self.slope_x.max(a.abs());
        self.slope_y = self.slope_y.max(b.abs());
        self.intercept = self.intercept.max(c.abs());
    }
}

#[cfg(test)]
mod scattered_light_tests {
    use super::*;

    const GRID: usize = 20;

    fn plane_frame(a: f64, b: f64, c: f64) -> DMatrix<f64> {
        DMatrix::from_fn(GRID, GRID, |row, col| a * col as f64 + b * row as f64 + c)
    }

    #[test]
    fn test_zero_residuals_are_clean() {
        let detector = ScatteredLightDetector::new(GRID, 5, false);
        let stack = vec![DMatrix::zeros(GRID, GRID); 12];
        assert!(!detector.detect_residuals(&stack).unwrap());
    }

    #[test]
    fn test_strong_gradient_is_contaminated() {
        let detector = ScatteredLightDetector::new(GRID, 5, false);
        let stack = vec![plane_frame(0.05, 0.05, 0.0); 12];
        assert!(detector.detect_residuals(&stack).unwrap());
    }

    #[test]
    fn test_single_axis_gradient_is_clean() {
        // both slopes must exceed the limit for the slope branch to fire
        let detector = ScatteredLightDetector::new(GRID, 5, false);
        let stack = vec![plane_frame(0.05, 0.0, 0.0); 12];
        assert!(!detector.detect_residuals(&stack).unwrap());
    }

    #[test]
    fn test_large_offset_is_contaminated() {
        let detector = ScatteredLightDetector::new(GRID, 5, false);
        let stack = vec![plane_frame(0.0, 0.0, 3.0); 12];
        assert!(detector.detect_residuals(&stack).unwrap());
    }

    #[test]
    fn test_contamination_only_at_unsampled_step_is_missed() {
        // stride 5 samples indices 0 and 5; a contaminated frame at index 3
        // is never fitted
        let detector = ScatteredLightDetector::new(GRID, 5, false);
        let mut stack = vec![DMatrix::zeros(GRID, GRID); 6];
        stack[3] = plane_frame(0.0, 0.0, 10.0);
        assert!(!detector.detect_residuals(&stack).unwrap());
        stack[5] = plane_frame(0.0, 0.0, 10.0);
        assert!(detector.detect_residuals(&stack).unwrap());
    }

    #[test]
    fn test_stride_longer_than_stack_samples_first_frame() {
        let detector = ScatteredLightDetector::new(GRID, 100, false);
        let stack = vec![plane_frame(0.0, 0.0, 3.0); 3];
        assert!(detector.detect_residuals(&stack).unwrap());
    }

    #[test]
    fn test_debug_disables_the_detector() {
        let detector = ScatteredLightDetector::new(GRID, 5, true);
        let stack = vec![plane_frame(1.0, 1.0, 100.0); 12];
        assert!(!detector.detect_residuals(&stack).unwrap());
    }

    #[test]
    fn test_detect_from_cube_and_model() {
        let detector = ScatteredLightDetector::new(GRID, 5, false);
        let quality = PixelCube::new(vec![plane_frame(0.05, 0.05, 1.0); 8]);
        let clean_model = PixelCube::new(vec![plane_frame(0.05, 0.05, 1.0); 8]);
        assert!(!detector.detect(&quality, &clean_model).unwrap());

        let flat_model = PixelCube::new(vec![plane_frame(0.0, 0.0, 1.0); 8]);
        assert!(detector.detect(&quality, &flat_model).unwrap());
    }

    #[test]
    fn test_frame_shape_mismatch() {
        let detector = ScatteredLightDetector::new(GRID, 5, false);
        let stack = vec![DMatrix::zeros(GRID + 1, GRID)];
        assert!(matches!(
            detector.detect_residuals(&stack),
            Err(EnsembleError::FrameShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_stack_is_an_error() {
        let detector = ScatteredLightDetector::new(GRID, 5, false);
        assert!(matches!(
            detector.detect_residuals(&[]),
            Err(EnsembleError::EmptyResidualStack)
        ));
    }
}
