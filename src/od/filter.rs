/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! The hybrid CKF/EKF sequential estimator (spec §4.7): a classical linear
//! Kalman filter that can be switched into extended mode, folding its
//! deviation state into the reference trajectory after a configured number
//! of measurements and reverting to classical mode when measurements grow
//! sparse.

use crate::errors::{AstroError, AstroResult};
use hifitime::Epoch;
use nalgebra::{DMatrix, DVector};

/// Which linearization mode the filter is currently operating in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Ckf,
    Ekf,
}

/// EKF trigger/disable configuration (spec §4.7).
#[derive(Debug, Clone, Copy)]
pub struct EkfConfig {
    /// Switch to EKF after this many measurements have been processed.
    pub trigger_count: u32,
    /// Revert to CKF when the gap since the last measurement exceeds this.
    pub disable_dt_s: f64,
}

/// The filter's state-machine phase (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EkfState {
    CkfIdle,
    CkfMeasuring,
    EkfActive,
    Done,
}

/// Hybrid extended/classical Kalman filter (spec §4.7). `x` is the
/// deviation state relative to the reference trajectory; in EKF mode the
/// caller folds it into the reference after each `update` and the filter
/// resets `x` to zero via [`take_and_reset_deviation`].
///
/// [`take_and_reset_deviation`]: HybridKalmanFilter::take_and_reset_deviation
pub struct HybridKalmanFilter {
    pub x: DVector<f64>,
    pub p: DMatrix<f64>,
    state_size: usize,
    ekf_config: Option<EkfConfig>,
    phase: EkfState,
    measurement_count: u32,
    last_measurement_epoch: Option<Epoch>,
}

impl HybridKalmanFilter {
    pub fn new(state_size: usize, p0: DMatrix<f64>, ekf_config: Option<EkfConfig>) -> Self {
        Self {
            x: DVector::zeros(state_size),
            p: p0,
            state_size,
            ekf_config,
            phase: EkfState::CkfIdle,
            measurement_count: 0,
            last_measurement_epoch: None,
        }
    }

    pub fn phase(&self) -> EkfState {
        self.phase
    }

    pub fn kind(&self) -> FilterKind {
        if self.phase == EkfState::EkfActive {
            FilterKind::Ekf
        } else {
            FilterKind::Ckf
        }
    }

    /// Time update: carries `x` and `p` forward through the STM `phi`,
    /// optionally augmenting `p` by a process-noise matrix (SNC, spec
    /// §4.7).
    pub fn predict(&mut self, phi: &DMatrix<f64>, process_noise: Option<&DMatrix<f64>>) {
        self.x = phi * &self.x;
        self.p = phi * &self.p * phi.transpose();
        if let Some(q) = process_noise {
            self.p += q;
        }
    }

    /// Measurement update (spec §4.7): innovation `y = z - z_comp`, gain
    /// `K = P H~^T (H~ P H~^T + R)^-1`, state/covariance update in Joseph
    /// form to preserve symmetry and positive semi-definiteness. Advances
    /// the CKF/EKF state machine and returns `(prefit, postfit)` residuals.
    pub fn update(
        &mut self,
        epoch: Epoch,
        h_tilde: &DMatrix<f64>,
        z: &DVector<f64>,
        z_comp: &DVector<f64>,
        r_diag: &DVector<f64>,
    ) -> AstroResult<(DVector<f64>, DVector<f64>)> {
        self.advance_phase(epoch);

        let r = DMatrix::from_diagonal(r_diag);
        let s = h_tilde * &self.p * h_tilde.transpose() + &r;
        let s_inv = s
            .try_inverse()
            .ok_or_else(|| AstroError::NotFinite { context: "innovation covariance S is singular".into() })?;
        let k = &self.p * h_tilde.transpose() * s_inv;

        let prefit = z - z_comp;
        self.x = &self.x + &k * &prefit;

        let identity = DMatrix::<f64>::identity(self.state_size, self.state_size);
        let ikh = &identity - &k * h_tilde;
        self.p = &ikh * &self.p * ikh.transpose() + &k * &r * k.transpose();
        if !self.p.iter().all(|v| v.is_finite()) {
            return Err(AstroError::NonPsdCovariance);
        }

        let postfit = &prefit - h_tilde * &self.x;

        self.measurement_count += 1;
        self.last_measurement_epoch = Some(epoch);
        Ok((prefit, postfit))
    }

    fn advance_phase(&mut self, epoch: Epoch) {
        match self.phase {
            EkfState::CkfIdle => self.phase = EkfState::CkfMeasuring,
            EkfState::CkfMeasuring => {
                if let Some(cfg) = &self.ekf_config {
                    if self.measurement_count + 1 >= cfg.trigger_count {
                        self.phase = EkfState::EkfActive;
                    }
                }
            }
            EkfState::EkfActive => {
                if let (Some(cfg), Some(last)) = (&self.ekf_config, self.last_measurement_epoch) {
                    if (epoch - last).to_seconds().abs() > cfg.disable_dt_s {
                        self.phase = EkfState::CkfMeasuring;
                    }
                }
            }
            EkfState::Done => {}
        }
    }

    /// Takes the deviation state for the caller to fold into the reference
    /// trajectory (EKF mode only) and resets it to zero (spec §4.7).
    pub fn take_and_reset_deviation(&mut self) -> DVector<f64> {
        std::mem::replace(&mut self.x, DVector::zeros(self.state_size))
    }

    /// Marks the filter `Done` (measurement stream closed, spec §4.7).
    pub fn finish(&mut self) {
        self.phase = EkfState::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hifitime::TimeUnitHelper;

    fn epoch(offset_s: f64) -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(2020, 1, 1) + offset_s.seconds()
    }

    #[test]
    fn phase_machine_follows_the_spec_transitions() {
        let mut filter = HybridKalmanFilter::new(
            6,
            DMatrix::identity(6, 6),
            Some(EkfConfig { trigger_count: 2, disable_dt_s: 100.0 }),
        );
        assert_eq!(filter.phase(), EkfState::CkfIdle);

        let h = DMatrix::<f64>::identity(2, 6);
        let z = DVector::from_vec(vec![1.0, 0.1]);
        let zc = DVector::from_vec(vec![0.0, 0.0]);
        let r = DVector::from_vec(vec![1e-3, 1e-6]);

        filter.update(epoch(0.0), &h, &z, &zc, &r).unwrap();
        assert_eq!(filter.phase(), EkfState::CkfMeasuring);

        filter.update(epoch(10.0), &h, &z, &zc, &r).unwrap();
        assert_eq!(filter.phase(), EkfState::EkfActive);

        filter.update(epoch(10.0 + 1000.0), &h, &z, &zc, &r).unwrap();
        assert_eq!(filter.phase(), EkfState::CkfMeasuring);

        filter.finish();
        assert_eq!(filter.phase(), EkfState::Done);
    }

    #[test]
    fn update_shrinks_covariance_trace() {
        let mut filter = HybridKalmanFilter::new(6, DMatrix::<f64>::identity(6, 6) * 100.0, None);
        let mut h = DMatrix::<f64>::zeros(2, 6);
        h[(0, 0)] = 1.0;
        h[(1, 3)] = 1.0;
        let z = DVector::from_vec(vec![0.0, 0.0]);
        let zc = DVector::from_vec(vec![0.0, 0.0]);
        let r = DVector::from_vec(vec![1e-3, 1e-6]);

        let trace_before = filter.p.trace();
        filter.update(epoch(0.0), &h, &z, &zc, &r).unwrap();
        assert!(filter.p.trace() < trace_before);
    }
}
