/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Universal-variable Lambert solver (spec §4.3) and a two-body Kepler
//! propagator used by the analytic ephemeris fixture.

use crate::cosmic::body::CelestialBody;
use crate::cosmic::orbit::Orbit;
use crate::errors::{AstroError, AstroResult};
use hifitime::TimeUnitHelper;
use nalgebra::Vector3;
use std::f64::consts::PI;

/// Which branch of the Lambert problem to solve (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    /// Short way, zero revolutions.
    Type1,
    /// Long way, zero revolutions.
    Type2,
    /// Short way, one revolution.
    Type3,
    /// Long way, one revolution.
    Type4,
    /// Solve Type1 and Type2, keep the branch with the smaller departure
    /// velocity magnitude as a proxy for minimal single-revolution v-infinity
    /// (the Lambert solver itself has no access to the departure body's
    /// heliocentric velocity, so this is the closest local criterion; the
    /// PCP generator, which does hold that context, may re-rank by true v∞).
    Auto,
}

/// Maximum root-finding iterations, and the minimum that must run before a
/// converged bracket is trusted (spec §4.3: "a minimum iteration count of
/// 32 guards against early false convergence").
const DEFAULT_MAX_ITERATIONS: u32 = 1000;
const MIN_ITERATIONS: u32 = 32;
const BISECTION_TOL_S: f64 = 1e-6;

/// A converged Lambert solution: departure/arrival velocities and the
/// universal-variable auxiliary psi at convergence.
#[derive(Debug, Clone, Copy)]
pub struct LambertSolution {
    pub v_depart: Vector3<f64>,
    pub v_arrive: Vector3<f64>,
    pub psi: f64,
    pub iterations: u32,
}

/// Solves the universal-variable two-point boundary value problem (spec
/// §4.3). Fails on non-positive time of flight, a zero-length position
/// vector, non-convergence within `max_iterations`, or an imaginary
/// transfer geometry.
pub fn solve(
    r_i: Vector3<f64>,
    r_f: Vector3<f64>,
    time_of_flight_s: f64,
    mu: f64,
    transfer_type: TransferType,
    max_iterations: Option<u32>,
) -> AstroResult<LambertSolution> {
    if time_of_flight_s <= 0.0 {
        return Err(AstroError::NonPositiveTimeOfFlight(time_of_flight_s));
    }
    let r_i_mag = r_i.norm();
    let r_f_mag = r_f.norm();
    if r_i_mag < f64::EPSILON || r_f_mag < f64::EPSILON {
        return Err(AstroError::ZeroRadius);
    }

    match transfer_type {
        TransferType::Auto => {
            let short = solve_branch(r_i, r_f, time_of_flight_s, mu, false, 0, max_iterations);
            let long = solve_branch(r_i, r_f, time_of_flight_s, mu, true, 0, max_iterations);
            match (short, long) {
                (Ok(s), Ok(l)) => Ok(if s.v_depart.norm() <= l.v_depart.norm() { s } else { l }),
                (Ok(s), Err(_)) => Ok(s),
                (Err(_), Ok(l)) => Ok(l),
                (Err(e), Err(_)) => Err(e),
            }
        }
        TransferType::Type1 => solve_branch(r_i, r_f, time_of_flight_s, mu, false, 0, max_iterations),
        TransferType::Type2 => solve_branch(r_i, r_f, time_of_flight_s, mu, true, 0, max_iterations),
        TransferType::Type3 => solve_branch(r_i, r_f, time_of_flight_s, mu, false, 1, max_iterations),
        TransferType::Type4 => solve_branch(r_i, r_f, time_of_flight_s, mu, true, 1, max_iterations),
    }
}

fn solve_branch(
    r_i: Vector3<f64>,
    r_f: Vector3<f64>,
    dt: f64,
    mu: f64,
    long_way: bool,
    revolutions: u32,
    max_iterations: Option<u32>,
) -> AstroResult<LambertSolution> {
    let max_iterations = max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS).max(MIN_ITERATIONS);
    let r_i_mag = r_i.norm();
    let r_f_mag = r_f.norm();

    let cos_dnu = (r_i.dot(&r_f) / (r_i_mag * r_f_mag)).clamp(-1.0, 1.0);
    let cross_z = r_i.x * r_f.y - r_i.y * r_f.x;
    let short_way_geometrically = cross_z >= 0.0;
    let use_short = short_way_geometrically != long_way;

    let a_param = if use_short {
        (r_i_mag * r_f_mag * (1.0 + cos_dnu)).sqrt()
    } else {
        -(r_i_mag * r_f_mag * (1.0 + cos_dnu)).sqrt()
    };
    if a_param.abs() < f64::EPSILON {
        return Err(AstroError::LambertGeometry);
    }

    let n = revolutions as f64;
    let z_low = (2.0 * n * PI).powi(2);
    let z_high = (2.0 * (n + 1.0) * PI).powi(2) - 1e-6;

    let tof_at = |z: f64| -> Option<f64> {
        let (c, s) = stumpff(z);
        if c.abs() < f64::EPSILON {
            return None;
        }
        let y = r_i_mag + r_f_mag + a_param * (z * s - 1.0) / c.sqrt();
        if y < 0.0 {
            return None;
        }
        let chi = (y / c).sqrt();
        Some((chi.powi(3) * s + a_param * y.sqrt()) / mu.sqrt())
    };

    let mut lo = z_low;
    let mut hi = z_high;
    let mut t_lo = tof_at(lo);
    let mut t_hi = tof_at(hi);

    // Expand/seed the bracket if the initial endpoints are infeasible
    // (non-real y); shrink toward the interior in small steps.
    let mut shrink = 0.0;
    while (t_lo.is_none() || t_hi.is_none()) && shrink < 0.49 {
        shrink += 0.01;
        lo = z_low + shrink * (z_high - z_low);
        hi = z_high - shrink * (z_high - z_low);
        t_lo = tof_at(lo);
        t_hi = tof_at(hi);
    }
    let (mut lo, mut hi, t_lo_val, t_hi_val) = match (t_lo, t_hi) {
        (Some(a), Some(b)) => (lo, hi, a, b),
        _ => return Err(AstroError::LambertGeometry),
    };
    if (t_lo_val - dt) * (t_hi_val - dt) > 0.0 {
        return Err(AstroError::LambertGeometry);
    }

    let mut iterations = 0u32;
    let (mut z, mut y, mut t_mid) = (0.0, 0.0, 0.0);
    loop {
        z = 0.5 * (lo + hi);
        let (c, s) = stumpff(z);
        y = r_i_mag + r_f_mag + a_param * (z * s - 1.0) / c.sqrt();
        if y < 0.0 {
            return Err(AstroError::LambertGeometry);
        }
        let chi = (y / c).sqrt();
        t_mid = (chi.powi(3) * s + a_param * y.sqrt()) / mu.sqrt();
        iterations += 1;

        let converged = (t_mid - dt).abs() < BISECTION_TOL_S && iterations >= MIN_ITERATIONS;
        if converged {
            break;
        }
        if iterations >= max_iterations {
            return Err(AstroError::LambertNotConverged { iterations });
        }
        if (t_mid - dt).signum() == (tof_at(lo).unwrap() - dt).signum() {
            lo = z;
        } else {
            hi = z;
        }
    }

    let f = 1.0 - y / r_i_mag;
    let g = a_param * (y / mu).sqrt();
    let g_dot = 1.0 - y / r_f_mag;

    let v_depart = (r_f - f * r_i) / g;
    let v_arrive = (g_dot * r_f - r_i) / g;

    Ok(LambertSolution {
        v_depart,
        v_arrive,
        psi: z,
        iterations,
    })
}

/// Stumpff functions `(C(z), S(z))` used by the universal-variable
/// formulation (Vallado, *Fundamentals of Astrodynamics and Applications*).
fn stumpff(z: f64) -> (f64, f64) {
    if z > 1e-8 {
        let sz = z.sqrt();
        (
            (1.0 - sz.cos()) / z,
            (sz - sz.sin()) / sz.powi(3),
        )
    } else if z < -1e-8 {
        let sz = (-z).sqrt();
        (
            (sz.cosh() - 1.0) / (-z),
            (sz.sinh() - sz) / sz.powi(3),
        )
    } else {
        (0.5, 1.0 / 6.0)
    }
}

/// Analytically propagates a two-body Keplerian orbit forward by `dt_s`
/// seconds, solving Kepler's equation for the eccentric anomaly via Newton
/// iteration. Used by the analytic ephemeris fixture and anywhere an
/// unperturbed closed-form propagation suffices.
pub fn propagate_kepler(orbit: &Orbit, dt_s: f64) -> AstroResult<Orbit> {
    let (_sma, ecc, inc, raan, argp, ta0) = orbit.oe();
    let body: CelestialBody = orbit.central_body;
    let sma = orbit.sma();
    if !orbit.is_bound() {
        return Err(AstroError::UnboundOrbit);
    }
    let n = (body.gm / sma.powi(3)).sqrt();

    let e0 = true_anomaly_to_eccentric(ta0, ecc);
    let m0 = e0 - ecc * e0.sin();
    let m1 = m0 + n * dt_s;

    let e1 = solve_kepler(m1, ecc)?;
    let ta1 = eccentric_to_true_anomaly(e1, ecc);

    let new_epoch = orbit.epoch() + dt_s.seconds();
    Ok(Orbit::from_oe(sma, ecc, inc, raan, argp, ta1, new_epoch, body))
}

fn true_anomaly_to_eccentric(ta: f64, ecc: f64) -> f64 {
    let (sin_ta, cos_ta) = ta.sin_cos();
    let denom = 1.0 + ecc * cos_ta;
    let sin_e = (1.0 - ecc * ecc).sqrt() * sin_ta / denom;
    let cos_e = (ecc + cos_ta) / denom;
    sin_e.atan2(cos_e)
}

fn eccentric_to_true_anomaly(e: f64, ecc: f64) -> f64 {
    let (sin_e, cos_e) = e.sin_cos();
    let sin_ta = (1.0 - ecc * ecc).sqrt() * sin_e / (1.0 - ecc * cos_e);
    let cos_ta = (cos_e - ecc) / (1.0 - ecc * cos_e);
    sin_ta.atan2(cos_ta)
}

/// Newton iteration for Kepler's equation `M = E - e sin(E)`, seeded at `M`.
fn solve_kepler(m: f64, ecc: f64) -> AstroResult<f64> {
    let m = m.rem_euclid(2.0 * PI);
    let mut e = if ecc < 0.8 { m } else { PI };
    for iter in 0..100 {
        let f = e - ecc * e.sin() - m;
        let fp = 1.0 - ecc * e.cos();
        let delta = f / fp;
        e -= delta;
        if delta.abs() < 1e-12 {
            return Ok(e);
        }
        if iter == 99 {
            return Err(AstroError::LambertNotConverged { iterations: 100 });
        }
    }
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmic::body::lookup;
    use hifitime::Epoch;

    #[test]
    fn vallado_7_12_short_way() {
        let r_i = Vector3::new(15_945.34, 0.0, 0.0);
        let r_f = Vector3::new(12_214.83899, 10_249.46731, 0.0);
        let dt = 76.0 * 60.0;
        let earth = lookup("Earth").unwrap();
        let sol = solve(r_i, r_f, dt, earth.gm, TransferType::Type1, None).unwrap();
        assert!((sol.v_depart.x - 2.058913).abs() < 1e-3, "vx={}", sol.v_depart.x);
        assert!((sol.v_depart.y - 2.915965).abs() < 1e-3, "vy={}", sol.v_depart.y);
        assert!((sol.v_arrive.x - (-3.451565)).abs() < 1e-3, "vfx={}", sol.v_arrive.x);
        assert!((sol.v_arrive.y - 0.910315).abs() < 1e-3, "vfy={}", sol.v_arrive.y);
    }

    #[test]
    fn non_positive_tof_is_rejected() {
        let earth = lookup("Earth").unwrap();
        let r = Vector3::new(7000.0, 0.0, 0.0);
        let r2 = Vector3::new(0.0, 7000.0, 0.0);
        let err = solve(r, r2, 0.0, earth.gm, TransferType::Type1, None).unwrap_err();
        assert_eq!(err, AstroError::NonPositiveTimeOfFlight(0.0));
    }

    #[test]
    fn zero_radius_is_rejected() {
        let earth = lookup("Earth").unwrap();
        let r = Vector3::zeros();
        let r2 = Vector3::new(7000.0, 0.0, 0.0);
        let err = solve(r, r2, 100.0, earth.gm, TransferType::Type1, None).unwrap_err();
        assert_eq!(err, AstroError::ZeroRadius);
    }

    #[test]
    fn lambert_round_trip_reaches_target_within_10_km() {
        let earth = lookup("Earth").unwrap();
        let r_i = Vector3::new(15_945.34, 0.0, 0.0);
        let r_f = Vector3::new(12_214.83899, 10_249.46731, 0.0);
        let dt = 76.0 * 60.0;
        let sol = solve(r_i, r_f, dt, earth.gm, TransferType::Type1, None).unwrap();

        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let orbit = Orbit::from_rv(r_i, sol.v_depart, epoch, earth).unwrap();
        let propagated = propagate_kepler(&orbit, dt).unwrap();
        let (r_reached, _v) = propagated.rv();
        assert!((r_reached - r_f).norm() < 10.0, "miss distance {} km", (r_reached - r_f).norm());
    }
}
