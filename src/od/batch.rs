/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Batch least-squares estimator (spec §4.7): accumulates the weighted
//! normal equations over an entire measurement arc and solves for a single
//! correction to the epoch state, the classical differential-correction
//! scheme of Tapley/Born/Schutz.

use crate::errors::{AstroError, AstroResult};
use nalgebra::{DMatrix, DVector};

/// Accumulates `H^T R^-1 H` and `H^T R^-1 y` across an arc of measurements,
/// each mapped back to the epoch state through its STM before accumulation.
pub struct BatchAccumulator {
    info: DMatrix<f64>,
    rhs: DVector<f64>,
    state_size: usize,
    measurement_count: u32,
}

impl BatchAccumulator {
    /// Starts accumulation seeded with the prior information `(info0, rhs0)`,
    /// typically `(P0^-1, P0^-1 x0bar)` (zero when there is no a priori).
    pub fn new(state_size: usize, info0: DMatrix<f64>, rhs0: DVector<f64>) -> Self {
        Self {
            info: info0,
            rhs: rhs0,
            state_size,
            measurement_count: 0,
        }
    }

    /// Starts accumulation with no a priori information (all zero).
    pub fn new_uninformative(state_size: usize) -> Self {
        Self::new(state_size, DMatrix::zeros(state_size, state_size), DVector::zeros(state_size))
    }

    pub fn measurement_count(&self) -> u32 {
        self.measurement_count
    }

    /// Folds in one measurement's contribution: `H~` is mapped to the epoch
    /// by the STM `Phi` (`H = H~ Phi`), `residual = z - z_comp`, `r_diag` is
    /// the measurement noise variance vector.
    pub fn accumulate(&mut self, h_tilde: &DMatrix<f64>, phi: &DMatrix<f64>, residual: &DVector<f64>, r_diag: &DVector<f64>) {
        let h = h_tilde * phi;
        let r_inv_diag: DVector<f64> = r_diag.map(|v| 1.0 / v);
        let r_inv = DMatrix::from_diagonal(&r_inv_diag);
        self.info += h.transpose() * &r_inv * &h;
        self.rhs += h.transpose() * &r_inv * residual;
        self.measurement_count += 1;
    }

    /// Solves `info * dx = rhs` for the epoch-state correction and returns
    /// it together with its covariance `info^-1`.
    pub fn solve(&self) -> AstroResult<(DVector<f64>, DMatrix<f64>)> {
        let covariance = self
            .info
            .clone()
            .try_inverse()
            .ok_or(AstroError::SingularStm)?;
        let dx = &covariance * &self.rhs;
        Ok((dx, covariance))
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_a_known_offset_from_noiseless_measurements() {
        let mut batch = BatchAccumulator::new_uninformative(2);
        let phi = DMatrix::<f64>::identity(2, 2);
        let true_dx = DVector::from_vec(vec![0.25, -0.1]);
        let r_diag = DVector::from_vec(vec![1e-6, 1e-6]);

        for k in 0..5 {
            let mut h = DMatrix::<f64>::zeros(1, 2);
            h[(0, 0)] = 1.0;
            h[(0, 1)] = k as f64;
            let residual = DVector::from_vec(vec![h.row(0).dot(&true_dx.transpose())]);
            batch.accumulate(&h, &phi, &residual, &r_diag);
        }

        let (dx, _p) = batch.solve().unwrap();
        assert!((dx[0] - true_dx[0]).abs() < 1e-6);
        assert!((dx[1] - true_dx[1]).abs() < 1e-6);
    }

    #[test]
    fn singular_normal_equations_are_reported() {
        let batch = BatchAccumulator::new_uninformative(3);
        assert!(batch.solve().is_err());
    }
}
