/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Rauch-Tung-Striebel backward smoother (spec §4.7): replays a forward
//! filter's cached predict/update records to produce smoothed state and
//! covariance estimates over the whole arc.

use crate::errors::{AstroError, AstroResult};
use nalgebra::{DMatrix, DVector};

/// One forward-pass step's cached quantities, recorded at `update` time (or
/// at a predict-only step with `x_filt == x_pred`, `p_filt == p_pred`).
#[derive(Debug, Clone)]
pub struct SmootherRecord {
    /// Filtered (post-update) state at this step.
    pub x_filt: DVector<f64>,
    /// Filtered (post-update) covariance at this step.
    pub p_filt: DMatrix<f64>,
    /// Predicted state at the *next* step, propagated from this one.
    pub x_pred_next: DVector<f64>,
    /// Predicted covariance at the next step.
    pub p_pred_next: DMatrix<f64>,
    /// STM from this step to the next.
    pub phi_to_next: DMatrix<f64>,
}

/// Runs the backward RTS recursion over `records`, returning one smoothed
/// `(x, P)` pair per record, ordered the same way (spec §4.7). The final
/// record's smoothed estimate equals its filtered estimate.
pub fn smooth(records: &[SmootherRecord]) -> AstroResult<Vec<(DVector<f64>, DMatrix<f64>)>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let n = records.len();
    let mut smoothed = vec![(DVector::<f64>::zeros(0), DMatrix::<f64>::zeros(0, 0)); n];
    smoothed[n - 1] = (records[n - 1].x_filt.clone(), records[n - 1].p_filt.clone());

    for k in (0..n - 1).rev() {
        let record = &records[k];
        let p_pred_inv = record
            .p_pred_next
            .clone()
            .try_inverse()
            .ok_or(AstroError::SingularStm)?;
        let smoother_gain = &record.p_filt * record.phi_to_next.transpose() * &p_pred_inv;

        let (x_next_smoothed, p_next_smoothed) = &smoothed[k + 1];
        let x_smoothed = &record.x_filt + &smoother_gain * (x_next_smoothed - &record.x_pred_next);
        let p_smoothed = &record.p_filt
            + &smoother_gain * (p_next_smoothed - &record.p_pred_next) * smoother_gain.transpose();

        smoothed[k] = (x_smoothed, p_smoothed);
    }

    Ok(smoothed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(smooth(&[]).unwrap().is_empty());
    }

    #[test]
    fn last_record_is_passed_through_unchanged() {
        let records = vec![SmootherRecord {
            x_filt: DVector::from_vec(vec![1.0, 2.0]),
            p_filt: DMatrix::<f64>::identity(2, 2),
            x_pred_next: DVector::zeros(2),
            p_pred_next: DMatrix::<f64>::identity(2, 2),
            phi_to_next: DMatrix::<f64>::identity(2, 2),
        }];
        let smoothed = smooth(&records).unwrap();
        assert_eq!(smoothed.len(), 1);
        assert_eq!(smoothed[0].0, records[0].x_filt);
    }

    #[test]
    fn two_step_smoothing_reduces_covariance_trace_at_the_earlier_step() {
        let phi = DMatrix::<f64>::identity(2, 2);
        let p_filt0 = DMatrix::<f64>::identity(2, 2) * 4.0;
        let p_pred1 = DMatrix::<f64>::identity(2, 2) * 4.0;
        let p_filt1 = DMatrix::<f64>::identity(2, 2) * 1.0;

        let records = vec![
            SmootherRecord {
                x_filt: DVector::from_vec(vec![0.0, 0.0]),
                p_filt: p_filt0,
                x_pred_next: DVector::from_vec(vec![0.0, 0.0]),
                p_pred_next: p_pred1,
                phi_to_next: phi.clone(),
            },
            SmootherRecord {
                x_filt: DVector::from_vec(vec![1.0, 1.0]),
                p_filt: p_filt1,
                x_pred_next: DVector::zeros(2),
                p_pred_next: DMatrix::<f64>::identity(2, 2),
                phi_to_next: phi,
            },
        ];

        let smoothed = smooth(&records).unwrap();
        assert!(smoothed[0].1.trace() <= records[0].p_filt.trace());
    }
}
