/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use crate::errors::{AstroError, AstroResult};
use hifitime::Epoch;
use nalgebra::Vector3;
use std::collections::HashMap;
use std::sync::RwLock;

/// External collaborator (spec §6): maps `(body, epoch)` to heliocentric
/// position/velocity in the ecliptic J2000 frame, km and km/s. Scenario
/// parsing and kernel loading are out of scope; only the query interface
/// lives in this crate.
pub trait EphemerisProvider: Send + Sync {
    fn helio_state(&self, body: &str, epoch: Epoch) -> AstroResult<(Vector3<f64>, Vector3<f64>)>;
}

/// A memoizing arena over an inner [`EphemerisProvider`], safe for
/// concurrent reads (spec §5: "Ephemeris provider is read-only and must be
/// safe for concurrent reads... any caching is... guarded by a
/// reader-writer lock; writers are transient").
///
/// This mirrors the teacher's `Cosm` memoizing-arena role without
/// reproducing its binary-kernel loading machinery (out of scope).
pub struct Session<P: EphemerisProvider> {
    inner: P,
    cache: RwLock<HashMap<(String, i64), (Vector3<f64>, Vector3<f64>)>>,
}

impl<P: EphemerisProvider> Session<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn key(body: &str, epoch: Epoch) -> (String, i64) {
        (body.to_string(), epoch.to_tai_seconds().round() as i64)
    }
}

impl<P: EphemerisProvider> EphemerisProvider for Session<P> {
    fn helio_state(&self, body: &str, epoch: Epoch) -> AstroResult<(Vector3<f64>, Vector3<f64>)> {
        let key = Self::key(body, epoch);
        if let Some(state) = self.cache.read().unwrap().get(&key) {
            return Ok(*state);
        }
        let state = self.inner.helio_state(body, epoch)?;
        self.cache.write().unwrap().insert(key, state);
        Ok(state)
    }
}

/// A fixture provider for tests and examples: a fixed table of per-body
/// Keplerian heliocentric orbits propagated analytically to the requested
/// epoch via mean-motion (two-body, no perturbations). Not meant for
/// mission-grade accuracy; it exists so the rest of the crate can be
/// exercised without a real ephemeris backend.
pub struct AnalyticTwoBodyEphemeris {
    bodies: HashMap<String, crate::cosmic::orbit::Orbit>,
}

impl AnalyticTwoBodyEphemeris {
    pub fn new() -> Self {
        Self { bodies: HashMap::new() }
    }

    pub fn with_body(mut self, name: &str, orbit: crate::cosmic::orbit::Orbit) -> Self {
        self.bodies.insert(name.to_string(), orbit);
        self
    }
}

impl Default for AnalyticTwoBodyEphemeris {
    fn default() -> Self {
        Self::new()
    }
}

impl EphemerisProvider for AnalyticTwoBodyEphemeris {
    fn helio_state(&self, body: &str, epoch: Epoch) -> AstroResult<(Vector3<f64>, Vector3<f64>)> {
        let orbit = self.bodies.get(body).ok_or(AstroError::EphemerisUnavailable)?;
        let dt = (epoch - orbit.epoch()).to_seconds();
        let propagated = crate::md::lambert::propagate_kepler(orbit, dt)?;
        Ok(propagated.to_heliocentric_ecliptic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmic::body::lookup;
    use crate::cosmic::orbit::Orbit;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: AtomicU32,
    }

    impl EphemerisProvider for CountingProvider {
        fn helio_state(&self, _body: &str, _epoch: Epoch) -> AstroResult<(Vector3<f64>, Vector3<f64>)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)))
        }
    }

    #[test]
    fn session_memoizes_repeated_queries() {
        let provider = CountingProvider { calls: AtomicU32::new(0) };
        let session = Session::new(provider);
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        session.helio_state("Earth", epoch).unwrap();
        session.helio_state("Earth", epoch).unwrap();
        session.helio_state("Earth", epoch).unwrap();
        assert_eq!(session.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn analytic_ephemeris_round_trips_at_zero_offset() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let sun = lookup("Sun").unwrap();
        let earth_orbit = Orbit::from_oe(149_598_023.0, 0.0167, 0.0, 0.0, 102.9f64.to_radians(), 0.0, epoch, sun);
        let provider = AnalyticTwoBodyEphemeris::new().with_body("Earth", earth_orbit.clone());
        let (r, _v) = provider.helio_state("Earth", epoch).unwrap();
        assert!((r.norm() - earth_orbit.rmag()).abs() < 1.0);
    }
}
