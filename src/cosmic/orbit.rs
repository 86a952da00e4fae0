/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use crate::cosmic::body::CelestialBody;
use crate::cosmic::ephemeris::EphemerisProvider;
use crate::cosmic::frame::{ecliptic_to_equatorial, equatorial_to_ecliptic};
use crate::errors::{AstroError, AstroResult};
use hifitime::Epoch;
use nalgebra::Vector3;
use std::cell::RefCell;
use std::f64::consts::PI;

const ANGLE_DEGENERACY_TOL: f64 = 1e-10;
const ECC_DEGENERACY_TOL: f64 = 1e-10;

const DISTANCE_EPS: f64 = 1e-3;
const ANGLE_EPS: f64 = 1e-6;
const ECC_EPS: f64 = 1e-8;

/// A self-consistent Keplerian state (spec §3: Orbit).
///
/// The truth representation is the classical-element tuple `(a, e, i, raan,
/// argp, ta)`; a lazily computed Cartesian `(R, V)` pair is cached in a
/// `RefCell` and recomputed whenever the cache is empty. Following spec §9's
/// guidance, there is no setter-style mutation API: every "modification"
/// constructs a new `Orbit`, which starts with an empty cache, so explicit
/// invalidation logic is unnecessary.
#[derive(Debug, Clone)]
pub struct Orbit {
    sma: f64,
    ecc: f64,
    inc: f64,
    raan: f64,
    argp: f64,
    ta: f64,
    epoch: Epoch,
    pub central_body: CelestialBody,
    rv_cache: RefCell<Option<(Vector3<f64>, Vector3<f64>)>>,
}

impl Orbit {
    /// Builds an orbit from classical elements. Angles are in radians and
    /// are reduced modulo 2*pi on construction and on every access.
    pub fn from_oe(
        sma: f64,
        ecc: f64,
        inc: f64,
        raan: f64,
        argp: f64,
        ta: f64,
        epoch: Epoch,
        central_body: CelestialBody,
    ) -> Self {
        Self {
            sma,
            ecc,
            inc: reduce_angle(inc),
            raan: reduce_angle(raan),
            argp: reduce_angle(argp),
            ta: reduce_angle(ta),
            epoch,
            central_body,
            rv_cache: RefCell::new(None),
        }
    }

    /// Builds an orbit from a Cartesian (R, V) state, handling the three
    /// degenerate geometries called out in spec §3:
    /// - circular-equatorial: raan = argp = 0, ta = true longitude lambda_true
    /// - circular-inclined: argp = 0, ta = argument of latitude u
    /// - elliptical-equatorial: raan = 0, argp = longitude of periapsis varpi
    pub fn from_rv(r: Vector3<f64>, v: Vector3<f64>, epoch: Epoch, central_body: CelestialBody) -> AstroResult<Self> {
        let rmag = r.norm();
        if rmag < f64::EPSILON {
            return Err(AstroError::ZeroRadius);
        }
        let mu = central_body.gm;
        let h = r.cross(&v);
        let hmag = h.norm();
        let n = Vector3::new(-h.y, h.x, 0.0);
        let nmag = n.norm();

        let e_vec = ((v.norm_squared() - mu / rmag) * r - (r.dot(&v)) * v) / mu;
        let ecc = e_vec.norm();

        let energy = v.norm_squared() / 2.0 - mu / rmag;
        let sma = if (ecc - 1.0).abs() > 1e-12 {
            -mu / (2.0 * energy)
        } else {
            f64::INFINITY
        };

        let inc = (h.z / hmag).clamp(-1.0, 1.0).acos();

        let equatorial = inc < ANGLE_DEGENERACY_TOL || (PI - inc) < ANGLE_DEGENERACY_TOL;
        let circular = ecc < ECC_DEGENERACY_TOL;
        let retrograde = inc > PI / 2.0;

        let (raan, argp, ta) = if equatorial && circular {
            let mut lambda_true = (r.x / rmag).clamp(-1.0, 1.0).acos();
            if r.y < 0.0 {
                lambda_true = 2.0 * PI - lambda_true;
            }
            if retrograde {
                lambda_true = 2.0 * PI - lambda_true;
            }
            (0.0, 0.0, lambda_true)
        } else if equatorial {
            let mut varpi = (e_vec.x / ecc).clamp(-1.0, 1.0).acos();
            if e_vec.y < 0.0 {
                varpi = 2.0 * PI - varpi;
            }
            if retrograde {
                varpi = 2.0 * PI - varpi;
            }
            let ta = true_anomaly_between(&e_vec, &r, &v, ecc, rmag);
            (0.0, varpi, ta)
        } else if circular {
            let mut raan = (n.x / nmag).clamp(-1.0, 1.0).acos();
            if n.y < 0.0 {
                raan = 2.0 * PI - raan;
            }
            let mut u = (n.dot(&r) / (nmag * rmag)).clamp(-1.0, 1.0).acos();
            if r.z < 0.0 {
                u = 2.0 * PI - u;
            }
            (raan, 0.0, u)
        } else {
            let mut raan = (n.x / nmag).clamp(-1.0, 1.0).acos();
            if n.y < 0.0 {
                raan = 2.0 * PI - raan;
            }
            let mut argp = (n.dot(&e_vec) / (nmag * ecc)).clamp(-1.0, 1.0).acos();
            if e_vec.z < 0.0 {
                argp = 2.0 * PI - argp;
            }
            let ta = true_anomaly_between(&e_vec, &r, &v, ecc, rmag);
            (raan, argp, ta)
        };

        let orbit = Self {
            sma,
            ecc,
            inc,
            raan: reduce_angle(raan),
            argp: reduce_angle(argp),
            ta: reduce_angle(ta),
            epoch,
            central_body,
            rv_cache: RefCell::new(Some((r, v))),
        };
        Ok(orbit)
    }

    /// Returns the classical elements `(a, e, i, raan, argp, ta)`, radians.
    pub fn oe(&self) -> (f64, f64, f64, f64, f64, f64) {
        (
            self.sma,
            self.ecc,
            reduce_angle(self.inc),
            reduce_angle(self.raan),
            reduce_angle(self.argp),
            reduce_angle(self.ta),
        )
    }

    pub fn sma(&self) -> f64 {
        self.sma
    }
    pub fn ecc(&self) -> f64 {
        self.ecc
    }
    pub fn inc(&self) -> f64 {
        reduce_angle(self.inc)
    }
    pub fn raan(&self) -> f64 {
        reduce_angle(self.raan)
    }
    pub fn argp(&self) -> f64 {
        reduce_angle(self.argp)
    }
    pub fn ta(&self) -> f64 {
        reduce_angle(self.ta)
    }
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_bound(&self) -> bool {
        self.ecc < 1.0 && self.sma > 0.0
    }

    /// Returns the Cartesian `(R, V)` pair, computing and caching it on
    /// first access via the perifocal-frame construction.
    pub fn rv(&self) -> (Vector3<f64>, Vector3<f64>) {
        if let Some(cached) = *self.rv_cache.borrow() {
            return cached;
        }
        let mu = self.central_body.gm;
        let p = self.sma * (1.0 - self.ecc * self.ecc);
        let (sin_ta, cos_ta) = self.ta.sin_cos();
        let denom = 1.0 + self.ecc * cos_ta;
        let r_pf = Vector3::new(p * cos_ta / denom, p * sin_ta / denom, 0.0);
        let v_pf = Vector3::new(-(mu / p).sqrt() * sin_ta, (mu / p).sqrt() * (self.ecc + cos_ta), 0.0);

        let rot = rotation_313(self.raan, self.inc, self.argp);
        let r = rot * r_pf;
        let v = rot * v_pf;
        *self.rv_cache.borrow_mut() = Some((r, v));
        (r, v)
    }

    pub fn radius(&self) -> Vector3<f64> {
        self.rv().0
    }
    pub fn velocity(&self) -> Vector3<f64> {
        self.rv().1
    }
    pub fn rmag(&self) -> f64 {
        self.radius().norm()
    }

    pub fn radius_of_periapsis(&self) -> f64 {
        self.sma * (1.0 - self.ecc)
    }

    pub fn radius_of_apoapsis(&self) -> f64 {
        self.sma * (1.0 + self.ecc)
    }

    /// Orbital period, seconds. Only meaningful for bound orbits.
    pub fn period(&self) -> AstroResult<f64> {
        if !self.is_bound() {
            return Err(AstroError::UnboundOrbit);
        }
        Ok(2.0 * PI * (self.sma.powi(3) / self.central_body.gm).sqrt())
    }

    /// Specific orbital energy, xi = -mu / (2a), km^2/s^2.
    pub fn energy(&self) -> f64 {
        -self.central_body.gm / (2.0 * self.sma)
    }

    /// Specific angular momentum magnitude, km^2/s.
    pub fn angular_momentum(&self) -> f64 {
        (self.central_body.gm * self.sma * (1.0 - self.ecc * self.ecc)).sqrt()
    }

    /// (sin E, cos E) of the eccentric anomaly from the true anomaly, via the
    /// half-angle identity (spec §4.2).
    pub fn sin_cos_e(&self) -> (f64, f64) {
        let (sin_ta, cos_ta) = self.ta.sin_cos();
        let denom = 1.0 + self.ecc * cos_ta;
        let sin_e = (1.0 - self.ecc * self.ecc).sqrt() * sin_ta / denom;
        let cos_e = (self.ecc + cos_ta) / denom;
        (sin_e, cos_e)
    }

    /// Re-expresses this orbit about `target_body`, using the ephemeris
    /// provider to add/subtract the heliocentric state of both bodies
    /// (spec §3: Frame change). Fails if `target_body` equals the current
    /// central body.
    pub fn reframe(
        &self,
        target_body: CelestialBody,
        ephemeris: &dyn EphemerisProvider,
    ) -> AstroResult<Orbit> {
        if target_body.name == self.central_body.name {
            return Err(AstroError::ReframeToSelf);
        }
        let (r, v) = self.rv();
        let (from_helio_r, from_helio_v) = ephemeris.helio_state(self.central_body.name, self.epoch)?;
        let (from_helio_r, from_helio_v) = ecliptic_to_equatorial(from_helio_r, from_helio_v, &self.central_body);

        let (to_helio_r, to_helio_v) = ephemeris.helio_state(target_body.name, self.epoch)?;
        let (to_helio_r, to_helio_v) = ecliptic_to_equatorial(to_helio_r, to_helio_v, &target_body);

        let r_helio = r + from_helio_r;
        let v_helio = v + from_helio_v;
        let r_new = r_helio - to_helio_r;
        let v_new = v_helio - to_helio_v;

        Orbit::from_rv(r_new, v_new, self.epoch, target_body)
    }

    /// Re-expresses a heliocentric-ecliptic (R, V) into this orbit's central
    /// body's equatorial frame. Used by callers holding raw ephemeris output.
    pub fn to_heliocentric_ecliptic(&self) -> (Vector3<f64>, Vector3<f64>) {
        let (r, v) = self.rv();
        equatorial_to_ecliptic(r, v, &self.central_body)
    }

    /// Strict equality within the per-element tolerances of spec §4.2:
    /// distance eps = 1e-3 km (applied to `a`), angle eps = 1e-6 rad
    /// (applied to i, raan, argp, ta with 2*pi wraparound), eccentricity
    /// eps = 1e-8.
    pub fn approx_eq(&self, other: &Orbit) -> bool {
        if self.central_body.name != other.central_body.name {
            return false;
        }
        (self.sma - other.sma).abs() < DISTANCE_EPS
            && (self.ecc - other.ecc).abs() < ECC_EPS
            && angle_close(self.inc, other.inc)
            && angle_close(self.raan, other.raan)
            && angle_close(self.argp, other.argp)
            && angle_close(self.ta, other.ta)
    }
}

fn angle_close(a: f64, b: f64) -> bool {
    let diff = (reduce_angle(a) - reduce_angle(b)).rem_euclid(2.0 * PI);
    let diff = diff.min(2.0 * PI - diff);
    diff < ANGLE_EPS
}

fn reduce_angle(a: f64) -> f64 {
    a.rem_euclid(2.0 * PI)
}

fn true_anomaly_between(e_vec: &Vector3<f64>, r: &Vector3<f64>, v: &Vector3<f64>, ecc: f64, rmag: f64) -> f64 {
    let mut ta = (e_vec.dot(r) / (ecc * rmag)).clamp(-1.0, 1.0).acos();
    if r.dot(v) < 0.0 {
        ta = 2.0 * PI - ta;
    }
    ta
}

/// 3-1-3 Euler rotation matrix R3(-raan) * R1(-inc) * R3(-argp), mapping the
/// perifocal frame into the central body's equatorial frame.
fn rotation_313(raan: f64, inc: f64, argp: f64) -> nalgebra::Matrix3<f64> {
    let (so, co) = raan.sin_cos();
    let (si, ci) = inc.sin_cos();
    let (sw, cw) = argp.sin_cos();

    nalgebra::Matrix3::new(
        co * cw - so * sw * ci,
        -co * sw - so * cw * ci,
        so * si,
        so * cw + co * sw * ci,
        -so * sw + co * cw * ci,
        -co * si,
        sw * si,
        cw * si,
        ci,
    )
}
