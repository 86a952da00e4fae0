/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Per-station topocentric range / range-rate measurement model (spec §3,
//! §4.7): visibility masking plus the 2x6 measurement Jacobian H-tilde,
//! following the classical Tapley/Born/Schutz range and range-rate partials.

use crate::od::station::Station;
use hifitime::Epoch;
use nalgebra::{Matrix2x6, Vector3, Vector6};

/// A single range/range-rate observation (spec §3: Measurement).
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    pub epoch: Epoch,
    pub theta_gst_rad: f64,
    pub range_km: f64,
    pub range_rate_km_s: f64,
    pub visible: bool,
    pub h_tilde: Matrix2x6<f64>,
}

/// Computes range, range-rate, and H-tilde for `rv` (spacecraft inertial
/// position/velocity, km and km/s) as seen by `station` at `theta_gst_rad`.
/// `visible` reflects the station's elevation mask; an invisible
/// measurement still carries a well-formed (range, range-rate, H-tilde) so
/// callers can inspect what *would* have been observed.
pub fn simulate(station: &Station, epoch: Epoch, theta_gst_rad: f64, rv: Vector6<f64>) -> Measurement {
    let r = rv.fixed_rows::<3>(0).into_owned();
    let v = rv.fixed_rows::<3>(3).into_owned();
    let (station_r, station_v) = station.inertial_state(theta_gst_rad);

    let rho_vec = r - station_r;
    let rho_dot_vec = v - station_v;
    let range = rho_vec.norm();
    let range_rate = rho_vec.dot(&rho_dot_vec) / range;

    let h_tilde = range_rate_jacobian(rho_vec, rho_dot_vec, range, range_rate);
    let visible = station.is_visible(r, theta_gst_rad);

    Measurement {
        epoch,
        theta_gst_rad,
        range_km: range,
        range_rate_km_s: range_rate,
        visible,
        h_tilde,
    }
}

/// The classical range/range-rate partials with respect to (R, V):
/// d(range)/dR = rho_hat, d(range)/dV = 0;
/// d(range_rate)/dR = (rho_dot - range_rate * rho_hat) / range, d(range_rate)/dV = rho_hat.
fn range_rate_jacobian(rho: Vector3<f64>, rho_dot: Vector3<f64>, range: f64, range_rate: f64) -> Matrix2x6<f64> {
    let rho_hat = rho / range;
    let d_rangerate_dr = (rho_dot - rho_hat * range_rate) / range;

    let mut h = Matrix2x6::zeros();
    for i in 0..3 {
        h[(0, i)] = rho_hat[i];
        h[(1, i)] = d_rangerate_dr[i];
        h[(1, i + 3)] = rho_hat[i];
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::od::station::Station;

    #[test]
    fn overhead_range_matches_altitude_difference() {
        let station = Station::new("EQ", 0.0, 0.0, 0.0, 5.0, 1e-3, 1e-6, None);
        let (station_r, _) = station.inertial_state(0.0);
        let alt = 500.0;
        let r = station_r.normalize() * (station_r.norm() + alt);
        let rv = Vector6::new(r.x, r.y, r.z, 0.0, 0.0, 0.0);
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let m = simulate(&station, epoch, 0.0, rv);
        assert!((m.range_km - alt).abs() < 1e-6);
        assert!(m.visible);
    }

    #[test]
    fn range_partial_is_unit_line_of_sight() {
        let station = Station::new("EQ", 0.0, 0.0, 0.0, 5.0, 1e-3, 1e-6, None);
        let (station_r, _) = station.inertial_state(0.0);
        let r = station_r.normalize() * (station_r.norm() + 500.0);
        let rv = Vector6::new(r.x, r.y, r.z, 0.1, 0.0, 7.5);
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let m = simulate(&station, epoch, 0.0, rv);
        let row0 = m.h_tilde.fixed_view::<1, 3>(0, 0).into_owned().transpose();
        assert!((row0.norm() - 1.0).abs() < 1e-9);
    }
}
