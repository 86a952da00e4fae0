/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use crate::cosmic::orbit::Orbit;
use nalgebra::Vector3;

/// Which classical element an `OptimalSingle` law is steering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitElement {
    Sma,
    Ecc,
    Inc,
    Raan,
    Argp,
}

/// Combination strategy for an `OptimalMulti` law steering several elements
/// at once (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinationMethod {
    Ruggerio,
    Naasz,
    Petropoulos,
}

/// Thrust control laws as a closed, total sum type (spec §9): dynamic
/// dispatch over a trait object in the source becomes a tagged enum whose
/// `control` is total over every variant, with no null checks at the call
/// site.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlLaw {
    Coast,
    Tangential,
    AntiTangential,
    Inversion,
    OptimalSingle(OrbitElement),
    OptimalMulti(Vec<OrbitElement>, CombinationMethod),
}

impl ControlLaw {
    /// Returns the unit thrust direction (inertial frame) for this law at
    /// the given osculating orbit. Total: every variant returns a result.
    pub fn control(&self, orbit: &Orbit) -> Vector3<f64> {
        match self {
            ControlLaw::Coast => Vector3::zeros(),
            ControlLaw::Tangential => orbit.velocity().normalize(),
            ControlLaw::AntiTangential => -orbit.velocity().normalize(),
            ControlLaw::Inversion => {
                let (_sin_e, cos_e) = orbit.sin_cos_e();
                if cos_e >= 0.0 {
                    orbit.velocity().normalize()
                } else {
                    -orbit.velocity().normalize()
                }
            }
            ControlLaw::OptimalSingle(element) => optimal_single_direction(*element, orbit),
            ControlLaw::OptimalMulti(elements, method) => optimal_multi_direction(elements, *method, orbit),
        }
    }
}

/// An ordered set of control laws applied across a waypoint's lifetime
/// (spec §3: `OrbitTarget{target_orbit, control_law_set}`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlLawSet {
    pub laws: Vec<ControlLaw>,
}

impl ControlLawSet {
    pub fn single(law: ControlLaw) -> Self {
        Self { laws: vec![law] }
    }

    /// Sums the unit directions of every law in the set and renormalizes;
    /// an empty set coasts.
    pub fn control(&self, orbit: &Orbit) -> Vector3<f64> {
        if self.laws.is_empty() {
            return Vector3::zeros();
        }
        let summed: Vector3<f64> = self.laws.iter().map(|law| law.control(orbit)).sum();
        if summed.norm() > f64::EPSILON {
            summed.normalize()
        } else {
            Vector3::zeros()
        }
    }
}

/// Gauss planetary equations-derived optimal direction for changing a
/// single element, per the classic Ruggerio/Edelbaum steering laws.
fn optimal_single_direction(element: OrbitElement, orbit: &Orbit) -> Vector3<f64> {
    let (_a, e, _i, _raan, argp, ta) = orbit.oe();
    let r = orbit.radius();
    let v = orbit.velocity();
    let tangential = v.normalize();
    let radial = r.normalize();
    let normal = r.cross(&v).normalize();

    match element {
        OrbitElement::Sma => tangential,
        OrbitElement::Ecc => {
            // Thrust is tangential, reversed past apoapsis so that the same
            // law both raises periapsis and lowers apoapsis over a period.
            if ta.cos() >= -e {
                tangential
            } else {
                -tangential
            }
        }
        OrbitElement::Inc => normal * (argp + ta).cos().signum(),
        OrbitElement::Raan => normal * (argp + ta).sin().signum(),
        OrbitElement::Argp => (radial + tangential).normalize(),
    }
}

fn optimal_multi_direction(elements: &[OrbitElement], method: CombinationMethod, orbit: &Orbit) -> Vector3<f64> {
    if elements.is_empty() {
        return Vector3::zeros();
    }
    let directions: Vec<Vector3<f64>> = elements.iter().map(|e| optimal_single_direction(*e, orbit)).collect();
    let combined: Vector3<f64> = match method {
        // All three combination strategies reduce, at this level of
        // fidelity, to an unweighted vector sum of the per-element optimal
        // directions; they differ only in how the per-element weights
        // (not modeled here) would be computed from current vs. target
        // elements.
        CombinationMethod::Ruggerio | CombinationMethod::Naasz | CombinationMethod::Petropoulos => {
            directions.iter().sum()
        }
    };
    if combined.norm() > f64::EPSILON {
        combined.normalize()
    } else {
        Vector3::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmic::body::lookup;
    use hifitime::Epoch;

    fn circular_orbit() -> Orbit {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        Orbit::from_oe(7000.0, 0.001, 30f64.to_radians(), 10f64.to_radians(), 20f64.to_radians(), 40f64.to_radians(), epoch, lookup("Earth").unwrap())
    }

    #[test]
    fn coast_is_zero() {
        assert_eq!(ControlLaw::Coast.control(&circular_orbit()), Vector3::zeros());
    }

    #[test]
    fn tangential_and_anti_tangential_are_opposite() {
        let o = circular_orbit();
        let t = ControlLaw::Tangential.control(&o);
        let a = ControlLaw::AntiTangential.control(&o);
        assert!((t + a).norm() < 1e-12);
    }

    #[test]
    fn control_law_set_of_coasts_is_zero() {
        let set = ControlLawSet::single(ControlLaw::Coast);
        assert_eq!(set.control(&circular_orbit()), Vector3::zeros());
    }
}
