/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use crate::errors::{AstroError, AstroResult};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// A celestial body's identity and physical constants (spec §3: CelestialBody).
///
/// Invariants: `gm > 0.0`, `eq_radius > 0.0`. The Sun's `soi_radius` is
/// `f64::INFINITY` rather than a numeric sentinel (spec §9's "numeric
/// sentinels become explicit optional values" is honored by using an
/// unambiguous mathematical value instead of -1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CelestialBody {
    pub name: &'static str,
    /// Gravitational parameter, km^3/s^2.
    pub gm: f64,
    /// Equatorial radius, km.
    pub eq_radius: f64,
    /// Sphere-of-influence radius with respect to the Sun, km.
    pub soi_radius: f64,
    /// Axial tilt (obliquity) with respect to the ecliptic, radians.
    pub axial_tilt: f64,
    /// Zonal harmonics J2..J4 (J1 is always zero by definition).
    pub j2: f64,
    pub j3: f64,
    pub j4: f64,
}

impl CelestialBody {
    pub fn validate(&self) -> AstroResult<()> {
        if self.gm <= 0.0 {
            return Err(AstroError::Config(format!(
                "{}: gm must be positive, got {}",
                self.name, self.gm
            )));
        }
        if self.eq_radius <= 0.0 {
            return Err(AstroError::Config(format!(
                "{}: eq_radius must be positive, got {}",
                self.name, self.eq_radius
            )));
        }
        Ok(())
    }
}

/// Canonical identifiers for the bodies carried in the built-in registry.
/// Mirrors the teacher's `cosmic::Bodies` enum used to index ephemeris paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, enum_iterator::Sequence)]
pub enum Bodies {
    Sun,
    Mercury,
    Venus,
    Earth,
    Luna,
    Mars,
    JupiterBarycenter,
    SaturnBarycenter,
    UranusBarycenter,
    NeptuneBarycenter,
    Pluto,
}

impl Bodies {
    pub fn name(&self) -> &'static str {
        match self {
            Bodies::Sun => "Sun",
            Bodies::Mercury => "Mercury",
            Bodies::Venus => "Venus",
            Bodies::Earth => "Earth",
            Bodies::Luna => "Luna",
            Bodies::Mars => "Mars",
            Bodies::JupiterBarycenter => "Jupiter Barycenter",
            Bodies::SaturnBarycenter => "Saturn Barycenter",
            Bodies::UranusBarycenter => "Uranus Barycenter",
            Bodies::NeptuneBarycenter => "Neptune Barycenter",
            Bodies::Pluto => "Pluto",
        }
    }
}

lazy_static! {
    /// Built-in registry of the solar-system bodies' physical constants.
    /// Values are IAU/DE-published constants; this registry supplies
    /// constants only, never heliocentric state (that comes from the
    /// caller-supplied `EphemerisProvider`, spec §6).
    static ref REGISTRY: HashMap<&'static str, CelestialBody> = {
        let mut m = HashMap::new();
        m.insert(
            "Sun",
            CelestialBody {
                name: "Sun",
                gm: 132_712_440_018.0,
                eq_radius: 696_000.0,
                soi_radius: f64::INFINITY,
                axial_tilt: 0.0,
                j2: 0.0,
                j3: 0.0,
                j4: 0.0,
            },
        );
        m.insert(
            "Mercury",
            CelestialBody {
                name: "Mercury",
                gm: 22_032.09,
                eq_radius: 2_439.7,
                soi_radius: 112_000.0,
                axial_tilt: 0.034_906_585,
                j2: 0.00006,
                j3: 0.0,
                j4: 0.0,
            },
        );
        m.insert(
            "Venus",
            CelestialBody {
                name: "Venus",
                gm: 324_858.592,
                eq_radius: 6_051.8,
                soi_radius: 616_000.0,
                axial_tilt: 3.096_587,
                j2: 0.000027,
                j3: 0.0,
                j4: 0.0,
            },
        );
        m.insert(
            "Earth",
            CelestialBody {
                name: "Earth",
                gm: 398_600.435_436,
                eq_radius: 6_378.1366,
                soi_radius: 924_000.0,
                axial_tilt: 0.409_092_6,
                j2: 0.001_082_63,
                j3: -0.000_002_54,
                j4: -0.000_001_61,
            },
        );
        m.insert(
            "Luna",
            CelestialBody {
                name: "Luna",
                gm: 4_902.800_066,
                eq_radius: 1_737.4,
                soi_radius: 66_100.0,
                axial_tilt: 0.026_92,
                j2: 0.0002027,
                j3: 0.0,
                j4: 0.0,
            },
        );
        m.insert(
            "Mars",
            CelestialBody {
                name: "Mars",
                gm: 42_828.375_214,
                eq_radius: 3_396.19,
                soi_radius: 577_000.0,
                axial_tilt: 0.439_648_6,
                j2: 0.001_960_45,
                j3: 0.0000315,
                j4: -0.0000015,
            },
        );
        m.insert(
            "Jupiter Barycenter",
            CelestialBody {
                name: "Jupiter Barycenter",
                gm: 126_712_764.8,
                eq_radius: 71_492.0,
                soi_radius: 48_200_000.0,
                axial_tilt: 0.054_67,
                j2: 0.014_736,
                j3: 0.0,
                j4: -0.000_587,
            },
        );
        m.insert(
            "Saturn Barycenter",
            CelestialBody {
                name: "Saturn Barycenter",
                gm: 37_940_585.2,
                eq_radius: 60_268.0,
                soi_radius: 54_800_000.0,
                axial_tilt: 0.466_351,
                j2: 0.016_298,
                j3: 0.0,
                j4: -0.000_915,
            },
        );
        m.insert(
            "Uranus Barycenter",
            CelestialBody {
                name: "Uranus Barycenter",
                gm: 5_794_548.6,
                eq_radius: 25_559.0,
                soi_radius: 51_800_000.0,
                axial_tilt: 1.706_32,
                j2: 0.003_34,
                j3: 0.0,
                j4: -0.000_031,
            },
        );
        m.insert(
            "Neptune Barycenter",
            CelestialBody {
                name: "Neptune Barycenter",
                gm: 6_836_527.1,
                eq_radius: 24_764.0,
                soi_radius: 86_600_000.0,
                axial_tilt: 0.493_98,
                j2: 0.003_411,
                j3: 0.0,
                j4: -0.0000352,
            },
        );
        m.insert(
            "Pluto",
            CelestialBody {
                name: "Pluto",
                gm: 869.6,
                eq_radius: 1_188.3,
                soi_radius: 3_100_000.0,
                axial_tilt: 2.132_7,
                j2: 0.0,
                j3: 0.0,
                j4: 0.0,
            },
        );
        m
    };
}

/// Look up a body by name in the built-in registry.
pub fn lookup(name: &str) -> AstroResult<CelestialBody> {
    REGISTRY
        .get(name)
        .copied()
        .ok_or_else(|| AstroError::UnknownBody(name.to_string()))
}

impl From<Bodies> for CelestialBody {
    fn from(b: Bodies) -> Self {
        lookup(b.name()).expect("built-in registry must contain every Bodies variant")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_variant() {
        for body in enum_iterator::all::<Bodies>() {
            let cb: CelestialBody = body.into();
            assert!(cb.validate().is_ok(), "{} failed validation", cb.name);
        }
    }

    #[test]
    fn sun_soi_is_infinite() {
        let sun = lookup("Sun").unwrap();
        assert!(sun.soi_radius.is_infinite());
    }

    #[test]
    fn unknown_body_is_a_config_error() {
        match lookup("Planet Nine") {
            Err(AstroError::UnknownBody(name)) => assert_eq!(name, "Planet Nine"),
            other => panic!("expected UnknownBody, got {:?}", other),
        }
    }
}
