/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! State-noise compensation (spec §4.7, glossary: SNC): augments the
//! predicted covariance with process noise when consecutive measurements
//! are close enough in time to justify it, optionally rotated from the
//! RIC (radial/in-track/cross-track) frame into inertial.

use nalgebra::{Matrix3, Matrix6, Vector3};

/// Which frame the configured process-noise sigma is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SncFrame {
    Inertial,
    Ric,
}

/// SNC configuration (spec §4.7).
#[derive(Debug, Clone, Copy)]
pub struct SncConfig {
    pub enabled: bool,
    /// Only applied when the gap since the last measurement is below this.
    pub dt_threshold_s: f64,
    pub sigma_accel_km_s2: f64,
    pub frame: SncFrame,
}

impl Default for SncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dt_threshold_s: 60.0,
            sigma_accel_km_s2: 1e-9,
            frame: SncFrame::Ric,
        }
    }
}

/// Builds the RIC direction cosine matrix `(R_hat, H_hat, R_hat x H_hat)`
/// from the current reference position/velocity (spec §4.7).
pub fn ric_rotation(r: Vector3<f64>, v: Vector3<f64>) -> Matrix3<f64> {
    let r_hat = r.normalize();
    let h_hat = r.cross(&v).normalize();
    let cross_hat = r_hat.cross(&h_hat);
    Matrix3::from_columns(&[r_hat, cross_hat, h_hat])
}

/// Computes `Gamma Q Gamma^T` where `Gamma = [1/2 dt^2 I3; dt I3]` (spec
/// §4.7), returning `None` when `config` disables SNC or `dt` exceeds the
/// configured threshold.
pub fn process_noise(config: &SncConfig, dt_s: f64, r: Vector3<f64>, v: Vector3<f64>) -> Option<Matrix6<f64>> {
    if !config.enabled || dt_s > config.dt_threshold_s {
        return None;
    }
    let q_ric = Matrix3::identity() * config.sigma_accel_km_s2.powi(2);
    let q = match config.frame {
        SncFrame::Inertial => q_ric,
        SncFrame::Ric => {
            let rot = ric_rotation(r, v);
            rot * q_ric * rot.transpose()
        }
    };

    let gamma_top = Matrix3::identity() * (0.5 * dt_s * dt_s);
    let gamma_bottom = Matrix3::identity() * dt_s;

    let top_left = gamma_top * q * gamma_top.transpose();
    let top_right = gamma_top * q * gamma_bottom.transpose();
    let bottom_left = gamma_bottom * q * gamma_top.transpose();
    let bottom_right = gamma_bottom * q * gamma_bottom.transpose();

    let mut out = Matrix6::zeros();
    for i in 0..3 {
        for j in 0..3 {
            out[(i, j)] = top_left[(i, j)];
            out[(i, j + 3)] = top_right[(i, j)];
            out[(i + 3, j)] = bottom_left[(i, j)];
            out[(i + 3, j + 3)] = bottom_right[(i, j)];
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_config_yields_no_process_noise() {
        let config = SncConfig::default();
        let r = Vector3::new(7000.0, 0.0, 0.0);
        let v = Vector3::new(0.0, 7.5, 0.0);
        assert!(process_noise(&config, 10.0, r, v).is_none());
    }

    #[test]
    fn enabled_config_below_threshold_yields_a_symmetric_matrix() {
        let config = SncConfig {
            enabled: true,
            dt_threshold_s: 60.0,
            sigma_accel_km_s2: 1e-6,
            frame: SncFrame::Ric,
        };
        let r = Vector3::new(7000.0, 0.0, 0.0);
        let v = Vector3::new(0.0, 7.5, 0.0);
        let q = process_noise(&config, 10.0, r, v).unwrap();
        for i in 0..6 {
            for j in 0..6 {
                assert!((q[(i, j)] - q[(j, i)]).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn ric_rotation_is_orthonormal() {
        let r = Vector3::new(7000.0, 100.0, 0.0);
        let v = Vector3::new(-0.1, 7.5, 0.2);
        let rot = ric_rotation(r, v);
        let should_be_identity = rot.transpose() * rot;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((should_be_identity[(i, j)] - expected).abs() < 1e-9);
            }
        }
    }
}
