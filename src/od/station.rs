/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Ground station data model (spec §3: Station): geodetic placement,
//! measurement noise, and the derived ECEF state used by the measurement
//! simulator.

use crate::cosmic::body::{lookup, CelestialBody};
use nalgebra::Vector3;
use std::f64::consts::PI;

/// A tracking station (spec §3). `ecef_position_km` is computed once at
/// construction from the geodetic coordinates using a spherical-body
/// approximation (this crate does not model oblate-body ECEF conversion;
/// `body.eq_radius` stands in for the reference ellipsoid).
#[derive(Debug, Clone)]
pub struct Station {
    pub name: String,
    pub altitude_km: f64,
    pub min_elevation_deg: f64,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub range_sigma_km: f64,
    pub range_rate_sigma_km_s: f64,
    pub body: CelestialBody,
    ecef_position_km: Vector3<f64>,
}

/// Earth's mean sidereal rotation rate, rad/s; used to derive the station's
/// ECEF velocity (zero in the rotating frame, but callers that want the
/// inertial velocity need the body's rotation rate to rotate by theta_GST).
pub const EARTH_ROTATION_RATE_RAD_S: f64 = 7.292_115_146_706_4e-5;

impl Station {
    /// Builds a station over `body` (defaults to Earth per spec §3 when the
    /// caller passes `None`).
    pub fn new(
        name: impl Into<String>,
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_km: f64,
        min_elevation_deg: f64,
        range_sigma_km: f64,
        range_rate_sigma_km_s: f64,
        body: Option<CelestialBody>,
    ) -> Self {
        let body = body.unwrap_or_else(|| lookup("Earth").expect("built-in registry always has Earth"));
        let ecef_position_km = geodetic_to_ecef(latitude_deg, longitude_deg, altitude_km, body.eq_radius);
        Self {
            name: name.into(),
            altitude_km,
            min_elevation_deg,
            latitude_deg,
            longitude_deg,
            range_sigma_km,
            range_rate_sigma_km_s,
            body,
            ecef_position_km,
        }
    }

    pub fn ecef_position_km(&self) -> Vector3<f64> {
        self.ecef_position_km
    }

    /// Rotates the station's fixed ECEF position into the body-inertial
    /// (equatorial) frame at Greenwich sidereal angle `theta_gst_rad`, and
    /// returns the corresponding inertial velocity from the body's rotation.
    pub fn inertial_state(&self, theta_gst_rad: f64) -> (Vector3<f64>, Vector3<f64>) {
        let (s, c) = theta_gst_rad.sin_cos();
        let r = Vector3::new(
            c * self.ecef_position_km.x - s * self.ecef_position_km.y,
            s * self.ecef_position_km.x + c * self.ecef_position_km.y,
            self.ecef_position_km.z,
        );
        let omega = Vector3::z() * EARTH_ROTATION_RATE_RAD_S;
        let v = omega.cross(&r);
        (r, v)
    }

    /// Elevation of `target` (inertial position, km) as seen from this
    /// station at `theta_gst_rad`, degrees.
    pub fn elevation_deg(&self, target: Vector3<f64>, theta_gst_rad: f64) -> f64 {
        let (station_r, _) = self.inertial_state(theta_gst_rad);
        let los = target - station_r;
        let up = station_r.normalize();
        (los.dot(&up) / los.norm()).clamp(-1.0, 1.0).asin().to_degrees()
    }

    /// Visibility test (spec §3): elevation >= min_elevation.
    pub fn is_visible(&self, target: Vector3<f64>, theta_gst_rad: f64) -> bool {
        self.elevation_deg(target, theta_gst_rad) >= self.min_elevation_deg
    }
}

fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, altitude_km: f64, body_radius_km: f64) -> Vector3<f64> {
    let lat = lat_deg * PI / 180.0;
    let lon = lon_deg * PI / 180.0;
    let r = body_radius_km + altitude_km;
    Vector3::new(
        r * lat.cos() * lon.cos(),
        r * lat.cos() * lon.sin(),
        r * lat.sin(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equatorial_station_has_zero_z() {
        let station = Station::new("EQ", 0.0, 0.0, 0.0, 5.0, 1e-3, 1e-6, None);
        assert!(station.ecef_position_km().z.abs() < 1e-9);
    }

    #[test]
    fn polar_station_lies_on_the_z_axis() {
        let station = Station::new("POLE", 90.0, 0.0, 0.0, 5.0, 1e-3, 1e-6, None);
        assert!(station.ecef_position_km().x.abs() < 1e-6);
        assert!(station.ecef_position_km().y.abs() < 1e-6);
        assert!(station.ecef_position_km().z > 0.0);
    }

    #[test]
    fn overhead_target_is_visible_at_ninety_degrees() {
        let station = Station::new("EQ", 0.0, 0.0, 0.0, 5.0, 1e-3, 1e-6, None);
        let (station_r, _) = station.inertial_state(0.0);
        let overhead = station_r.normalize() * (station_r.norm() + 500.0);
        assert!((station.elevation_deg(overhead, 0.0) - 90.0).abs() < 1e-6);
        assert!(station.is_visible(overhead, 0.0));
    }

    #[test]
    fn far_side_target_is_not_visible() {
        let station = Station::new("EQ", 0.0, 0.0, 0.0, 5.0, 1e-3, 1e-6, None);
        let (station_r, _) = station.inertial_state(0.0);
        let behind_earth = -station_r.normalize() * (station_r.norm() + 500.0);
        assert!(!station.is_visible(behind_earth, 0.0));
    }
}
