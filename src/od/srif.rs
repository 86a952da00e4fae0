/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! The square-root information filter (spec §4.7): carries an
//! upper-triangular information factor `R_inf` and information vector `b`
//! in place of a covariance, and incorporates each measurement via a
//! Householder QR of the stacked (prior, measurement) system.

use crate::errors::{AstroError, AstroResult};
use nalgebra::{DMatrix, DVector};

/// Information-form state (spec §4.7): `R_inf` is upper-triangular such
/// that the implied covariance is `(R_inf^T R_inf)^-1`, and `b` is the
/// information vector such that the implied state is `R_inf^-1 b`.
pub struct Srif {
    pub r_inf: DMatrix<f64>,
    pub b: DVector<f64>,
    state_size: usize,
}

impl Srif {
    /// Builds an SRIF state from an initial covariance `p0` via Cholesky
    /// factorization: `R_inf = L^-T` where `p0 = L L^T`.
    pub fn from_covariance(p0: &DMatrix<f64>) -> AstroResult<Self> {
        let n = p0.nrows();
        let chol = nalgebra::Cholesky::new(p0.clone()).ok_or(AstroError::NonPsdCovariance)?;
        let l = chol.l();
        let l_inv = l
            .try_inverse()
            .ok_or_else(|| AstroError::NotFinite { context: "Cholesky factor of P0 is singular".into() })?;
        let r_inf = l_inv.transpose();
        Ok(Self {
            r_inf,
            b: DVector::zeros(n),
            state_size: n,
        })
    }

    /// Current best estimate `x = R_inf^-1 b`, solved via back-substitution
    /// on the upper-triangular `R_inf`.
    pub fn state_estimate(&self) -> AstroResult<DVector<f64>> {
        let decomp = self.r_inf.clone().lu();
        decomp
            .solve(&self.b)
            .ok_or(AstroError::SingularStm)
    }

    /// The implied covariance `(R_inf^T R_inf)^-1`.
    pub fn covariance(&self) -> AstroResult<DMatrix<f64>> {
        let info = self.r_inf.transpose() * &self.r_inf;
        info.try_inverse().ok_or(AstroError::SingularStm)
    }

    /// Time update: propagates the information state through the STM's
    /// inverse, `R_inf' = R_inf Phi^-1`, `b` unchanged (process noise is
    /// not modeled in information form here; SNC is applied in the
    /// covariance-form filter instead, per spec §4.7's driver design).
    pub fn time_update(&mut self, phi: &DMatrix<f64>) -> AstroResult<()> {
        let phi_inv = phi.clone().try_inverse().ok_or(AstroError::SingularStm)?;
        self.r_inf = &self.r_inf * phi_inv;
        Ok(())
    }

    /// Measurement update via Householder QR (spec §4.7): stacks
    /// `[R_inf, b; H~ / sqrt(R), z_scaled]`-equivalent whitened rows and
    /// re-triangularizes.
    pub fn measurement_update(&mut self, h_tilde: &DMatrix<f64>, residual: &DVector<f64>, r_diag: &DVector<f64>) -> AstroResult<()> {
        let m = h_tilde.nrows();
        let mut stacked_a = DMatrix::<f64>::zeros(self.state_size + m, self.state_size);
        let mut stacked_y = DVector::<f64>::zeros(self.state_size + m);
        stacked_a.view_mut((0, 0), (self.state_size, self.state_size)).copy_from(&self.r_inf);
        stacked_y.rows_mut(0, self.state_size).copy_from(&self.b);

        for row in 0..m {
            let sigma = r_diag[row].sqrt();
            if sigma <= 0.0 {
                return Err(AstroError::NotFinite { context: "non-positive measurement variance".into() });
            }
            for col in 0..self.state_size {
                stacked_a[(self.state_size + row, col)] = h_tilde[(row, col)] / sigma;
            }
            stacked_y[self.state_size + row] = residual[row] / sigma;
        }

        let qr = stacked_a.qr();
        let r = qr.r();
        let q_t_y = qr.q().transpose() * stacked_y;

        self.r_inf = r;
        self.b = q_t_y;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_covariance_round_trips_to_the_same_covariance() {
        let p0 = DMatrix::<f64>::identity(6, 6) * 4.0;
        let srif = Srif::from_covariance(&p0).unwrap();
        let recovered = srif.covariance().unwrap();
        for i in 0..6 {
            assert!((recovered[(i, i)] - 4.0).abs() < 1e-9);
        }
    }

    #[test]
    fn measurement_update_reduces_information_state_residual() {
        let p0 = DMatrix::<f64>::identity(6, 6) * 100.0;
        let mut srif = Srif::from_covariance(&p0).unwrap();
        let mut h = DMatrix::<f64>::zeros(2, 6);
        h[(0, 0)] = 1.0;
        h[(1, 3)] = 1.0;
        let residual = DVector::from_vec(vec![1.0, 0.01]);
        let r_diag = DVector::from_vec(vec![1e-3, 1e-6]);
        srif.measurement_update(&h, &residual, &r_diag).unwrap();
        let x = srif.state_estimate().unwrap();
        assert!(x[0].abs() > 0.0);
    }
}
