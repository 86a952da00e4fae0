/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use crate::cosmic::body::CelestialBody;
use nalgebra::{Matrix3, Vector3};

/// The frame convention in which a position/velocity pair is expressed.
///
/// Spec §9's Open Question resolution: the boundary between the ephemeris
/// provider (always ecliptic J2000, per spec §6) and propagation (always
/// equatorial) is an *explicit* rotation performed exactly once, never a
/// silent mix of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    EclipticJ2000,
    EquatorialOfDate,
}

/// Rotate a heliocentric ecliptic-J2000 (R, V) pair into the equatorial frame
/// of `body`, using `body.axial_tilt` (obliquity) as the single rotation
/// angle about the ecliptic X axis.
pub fn ecliptic_to_equatorial(
    r_ecl: Vector3<f64>,
    v_ecl: Vector3<f64>,
    body: &CelestialBody,
) -> (Vector3<f64>, Vector3<f64>) {
    let rot = obliquity_rotation(body.axial_tilt);
    (rot * r_ecl, rot * v_ecl)
}

/// Inverse of [`ecliptic_to_equatorial`].
pub fn equatorial_to_ecliptic(
    r_eq: Vector3<f64>,
    v_eq: Vector3<f64>,
    body: &CelestialBody,
) -> (Vector3<f64>, Vector3<f64>) {
    let rot = obliquity_rotation(body.axial_tilt).transpose();
    (rot * r_eq, rot * v_eq)
}

fn obliquity_rotation(tilt_rad: f64) -> Matrix3<f64> {
    let (s, c) = tilt_rad.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn round_trip_is_identity() {
        let earth = CelestialBody {
            name: "Earth",
            gm: 398_600.4,
            eq_radius: 6378.1,
            soi_radius: 924_000.0,
            axial_tilt: 0.409_09,
            j2: 0.0010826,
            j3: 0.0,
            j4: 0.0,
        };
        let r = Vector3::new(1.0e8, 2.0e7, -3.0e6);
        let v = Vector3::new(10.0, -5.0, 2.0);
        let (r_eq, v_eq) = ecliptic_to_equatorial(r, v, &earth);
        let (r_back, v_back) = equatorial_to_ecliptic(r_eq, v_eq, &earth);
        assert_abs_diff_eq!(r, r_back, epsilon = 1e-9);
        assert_abs_diff_eq!(v, v_back, epsilon = 1e-9);
    }

    #[test]
    fn zero_tilt_is_identity() {
        let sun = CelestialBody {
            name: "Sun",
            gm: 1.327e11,
            eq_radius: 696_000.0,
            soi_radius: f64::INFINITY,
            axial_tilt: 0.0,
            j2: 0.0,
            j3: 0.0,
            j4: 0.0,
        };
        let r = Vector3::new(1.0, 2.0, 3.0);
        let v = Vector3::new(0.1, 0.2, 0.3);
        let (r_eq, v_eq) = ecliptic_to_equatorial(r, v, &sun);
        assert_abs_diff_eq!(r, r_eq, epsilon = 1e-12);
        assert_abs_diff_eq!(v, v_eq, epsilon = 1e-12);
    }
}
